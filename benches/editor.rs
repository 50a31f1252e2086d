//! Benchmarks for the instruction editor.
//!
//! Bodies are synthesized as runs of small blocks, each guarded by a forward branch, so every
//! edit has labels to keep in place:
//! - decoding into the editor
//! - inserting at the front
//! - removing a span
//! - assembling back to bytes

extern crate abcpatch;

use abcpatch::{
    assembly::{opcodes, Instruction},
    editor::CodeEditor,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

/// `blocks` copies of: getlocal_1; iffalse +2; pushbyte 1; pop; then returnvoid.
fn guarded_blocks(blocks: usize) -> Vec<u8> {
    let mut code = Vec::with_capacity(blocks * 8 + 1);
    for _ in 0..blocks {
        code.extend([0xD1, 0x12, 0x03, 0x00, 0x00, 0x24, 0x01, 0x29]);
    }
    code.push(0x47);
    code
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("editor_decode");
    for blocks in [16, 256, 4096] {
        let code = guarded_blocks(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &code, |b, code| {
            b.iter(|| black_box(CodeEditor::from_code(black_box(code), &[]).unwrap()));
        });
    }
    group.finish();
}

fn bench_insert_front(c: &mut Criterion) {
    let code = guarded_blocks(1024);
    let editor = CodeEditor::from_code(&code, &[]).unwrap();

    c.bench_function("editor_insert_front", |b| {
        b.iter(|| {
            let mut editor = editor.clone();
            editor
                .insert_at(
                    0,
                    vec![
                        Instruction::simple(opcodes::PUSHTRUE),
                        Instruction::simple(opcodes::RETURNVALUE),
                    ],
                )
                .unwrap();
            black_box(editor)
        });
    });
}

fn bench_remove_block(c: &mut Criterion) {
    let code = guarded_blocks(1024);
    let editor = CodeEditor::from_code(&code, &[]).unwrap();

    // the first whole block: nothing outside it lands inside
    c.bench_function("editor_remove_block", |b| {
        b.iter(|| {
            let mut editor = editor.clone();
            editor.remove_range(0, 4).unwrap();
            black_box(editor)
        });
    });
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("editor_assemble");
    for blocks in [16, 256, 4096] {
        let mut editor = CodeEditor::from_code(&guarded_blocks(blocks), &[]).unwrap();
        editor.insert_at(0, vec![Instruction::simple(opcodes::NOP)]).unwrap();
        group.bench_function(BenchmarkId::from_parameter(blocks), |b| {
            b.iter(|| black_box(editor.to_bytes().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_insert_front,
    bench_remove_block,
    bench_assemble
);
criterion_main!(benches);
