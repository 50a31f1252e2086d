//! Benchmarks for the bytecode unit and container codecs.

extern crate abcpatch;

use abcpatch::{
    abc::{MethodBody, MethodFlags, MethodInfo, Multiname, Namespace, NamespaceKind},
    assembly::decode_code,
    file::movie::Compression,
    AbcFile, Movie,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

/// A unit with `methods` string-returning methods, each with its own name and literal.
fn synthetic_unit(methods: usize) -> AbcFile {
    let mut unit = AbcFile::default();
    let package = unit.pool.intern_string("");
    let namespace = unit.pool.add_namespace(Namespace {
        kind: NamespaceKind::Package,
        name: package,
    });
    let string_type = unit.pool.intern_string("String");
    let string_type = unit.pool.add_multiname(Multiname::QName {
        namespace,
        name: string_type,
        attribute: false,
    });

    for index in 0..methods {
        let name = unit.pool.intern_string(&format!("_-{index:X}"));
        let literal = unit.pool.intern_string(&format!("literal {index}"));
        let method = unit.add_method(MethodInfo {
            return_type: string_type,
            param_types: vec![string_type],
            name,
            flags: MethodFlags::empty(),
            options: Vec::new(),
            param_names: Vec::new(),
        });
        // iffalse skips pushstring and its returnvalue
        let literal = u30(literal);
        let mut code = vec![0xD0, 0x30, 0xD1, 0x12, literal.len() as u8 + 2, 0x00, 0x00, 0x2C];
        code.extend(literal);
        code.push(0x48);
        code.extend([0xD1, 0x48]);
        unit.add_body(MethodBody {
            method,
            max_stack: 1,
            local_count: 2,
            init_scope_depth: 0,
            max_scope_depth: 1,
            code,
            exceptions: Vec::new(),
            traits: Vec::new(),
        });
    }
    unit
}

fn u30(mut value: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            bytes.push(byte);
            return bytes;
        }
        bytes.push(byte | 0x80);
    }
}

fn bench_unit_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("unit_parse");
    for methods in [64, 1024, 8192] {
        let bytes = synthetic_unit(methods).to_bytes();
        group.bench_with_input(BenchmarkId::from_parameter(methods), &bytes, |b, bytes| {
            b.iter(|| black_box(AbcFile::parse(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

fn bench_unit_write(c: &mut Criterion) {
    let unit = synthetic_unit(1024);
    c.bench_function("unit_write", |b| {
        b.iter(|| black_box(unit.to_bytes()));
    });
}

fn bench_decode_bodies(c: &mut Criterion) {
    let unit = synthetic_unit(1024);
    c.bench_function("unit_decode_bodies", |b| {
        b.iter(|| {
            for body in unit.bodies() {
                black_box(decode_code(black_box(&body.code)).unwrap());
            }
        });
    });
}

fn bench_movie_compression(c: &mut Criterion) {
    let mut movie = Movie::new(10);
    movie.add_unit("frame1", synthetic_unit(1024));

    let mut group = c.benchmark_group("movie_roundtrip");
    for compression in [Compression::None, Compression::Zlib, Compression::Lzma] {
        let bytes = movie.to_bytes_with(compression).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(compression), &bytes, |b, bytes| {
            b.iter(|| black_box(Movie::from_mem(bytes.clone()).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_unit_parse,
    bench_unit_write,
    bench_decode_bodies,
    bench_movie_compression
);
criterion_main!(benches);
