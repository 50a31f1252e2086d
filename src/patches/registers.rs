//! Debug register renaming.
//!
//! Debug records name local registers after the source variables, which obfuscated builds
//! replace with garbage. Every register record is repointed at `_local<register>`.
//!
//! Bodies with exception ranges or a `lookupswitch` are left alone and counted, so that no
//! bulk edit touches protected or switch-dispatched code.

use crate::{
    abc::AbcFile,
    assembly::{opcodes, Instruction, Operand},
    editor::CodeEditor,
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
};

/// Counts of one renaming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    /// Debug records repointed
    pub renamed: usize,
    /// Bodies rewritten
    pub bodies: usize,
    /// Bodies skipped for exception ranges, switches or undecodable code
    pub skipped: usize,
}

/// Rename the debug registers of every body in every unit of `movie`.
pub fn apply(movie: &mut Movie, events: &EventLog) -> RegisterSummary {
    let mut summary = RegisterSummary::default();
    for (index, unit) in movie.units_mut().enumerate() {
        rename_unit(unit, index, events, &mut summary);
    }
    log::info!(
        "Renamed {} debug registers in {} bodies, skipped {}",
        summary.renamed,
        summary.bodies,
        summary.skipped
    );
    summary
}

fn rename_unit(unit: &mut AbcFile, index: usize, events: &EventLog, summary: &mut RegisterSummary) {
    for position in 0..unit.bodies().len() {
        let body = &unit.bodies()[position];
        let method = MethodRef::new(index, body.method);
        if body.has_exceptions() {
            summary.skipped += 1;
            continue;
        }
        let mut editor = match CodeEditor::from_body(body) {
            Ok(editor) if !editor.has_switch() => editor,
            Ok(_) => {
                summary.skipped += 1;
                continue;
            }
            Err(error) => {
                log::warn!("Skipping {method}: {error}");
                summary.skipped += 1;
                continue;
            }
        };

        let mut renamed = 0;
        for at in 0..editor.len() {
            let Some(Instruction {
                opcode: opcodes::DEBUG,
                operand: Operand::Debug { kind, register, extra, .. },
                ..
            }) = editor.get(at).cloned()
            else {
                continue;
            };
            if kind != opcodes::DEBUG_KIND_REGISTER {
                continue;
            }
            let name = unit.pool.intern_string(&format!("_local{register}"));
            let debug = Instruction {
                offset: 0,
                opcode: opcodes::DEBUG,
                operand: Operand::Debug {
                    kind,
                    name,
                    register,
                    extra,
                },
            };
            if editor.replace_at(at, debug).is_ok() {
                renamed += 1;
            }
        }
        if renamed == 0 {
            continue;
        }

        let body = &mut unit.bodies_mut()[position];
        match editor.write_to(body) {
            Ok(()) => {
                summary.renamed += renamed;
                summary.bodies += 1;
                events
                    .record(EventKind::RegisterRenamed)
                    .method(method)
                    .message(format!("{renamed} registers"));
            }
            Err(error) => {
                log::warn!("Skipping {method}: {error}");
                summary.skipped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abc::ExceptionInfo, assembly::decode_code, test::UnitBuilder};

    // debug register 1 named "\u{E001}", debug register 2; jump over them; returnvoid
    fn debug_code(name: u8) -> Vec<u8> {
        vec![
            0x10, 0x0A, 0x00, 0x00, // jump +10
            0xEF, 0x01, name, 0x01, 0x00, // debug reg 1
            0xEF, 0x01, name, 0x02, 0x00, // debug reg 2
            0x47,
        ]
    }

    #[test]
    fn test_rename_registers() {
        let mut builder = UnitBuilder::new();
        let garbage = builder.string("\u{E001}");
        let unit = builder
            .class("A", |c| {
                c.method("_-1", &[], "void", &debug_code(garbage as u8))
                    .method("_-2", &[], "void", &debug_code(garbage as u8))
                    .exceptions(vec![ExceptionInfo {
                        from: 0,
                        to: 4,
                        target: 14,
                        exc_type: 0,
                        var_name: 0,
                    }])
                    .method("_-3", &[], "void", &[0x1B, 0x08, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x47])
            })
            .build();
        let mut movie = Movie::new(10);
        movie.add_unit("a", unit);
        let events = EventLog::new();

        let summary = apply(&mut movie, &events);
        assert_eq!(summary.renamed, 2);
        assert_eq!(summary.bodies, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(events.count_kind(EventKind::RegisterRenamed), 1);

        let abc = movie.unit(0).unwrap();
        let first = abc.instances[0].traits[0].method().unwrap();
        let code = decode_code(&abc.body(first).unwrap().code).unwrap();
        let names: Vec<&str> = code
            .iter()
            .filter_map(|i| match i.operand {
                Operand::Debug { name, .. } => abc.pool.string(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["_local1", "_local2"]);
        // the jump still lands on returnvoid
        assert_eq!(code[0].branch_targets(), vec![code[3].offset]);

        let protected = abc.instances[0].traits[1].method().unwrap();
        assert_eq!(abc.body(protected).unwrap().code, debug_code(garbage as u8));
    }
}
