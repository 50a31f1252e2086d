//! Handshake disabling.
//!
//! The handshake class guards the call that starts the key exchange with a conditional
//! forward jump. Retargeting that jump to the instruction right after it makes both arms
//! land on the guarded block: the condition is still evaluated and popped, but the block
//! always runs.

use crate::{
    assembly::{opcodes, FlowType},
    config::GameLayout,
    editor::CodeEditor,
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
    locator::{find_methods, MethodSignature, TraitOwner},
    Error, Result,
};

use super::{class, commit, stage, unit, unit_mut};

/// The guarded method and the position of its guarding jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTarget {
    /// Method holding the jump
    pub method: MethodRef,
    /// Instruction position of the jump
    pub jump: usize,
}

/// Position of the first forward conditional jump of `editor`, if the block it skips
/// contains a `callpropvoid`.
#[must_use]
pub fn guarding_jump(editor: &CodeEditor) -> Option<usize> {
    let jump = (0..editor.len()).find(|position| {
        editor.get(*position).is_some_and(|i| i.flow_type() == FlowType::ConditionalBranch)
            && editor
                .jump_scope(*position)
                .is_ok_and(|scope| scope.start == position + 1)
    })?;
    editor
        .get_body(jump)
        .ok()?
        .iter()
        .any(|i| i.opcode == opcodes::CALLPROPVOID)
        .then_some(jump)
}

/// Find the first one-parameter `void` method of the handshake class with a guarding jump.
///
/// # Errors
/// Returns [`Error::NotFound`] if the class or such a method is missing.
pub fn locate(movie: &Movie, layout: &GameLayout) -> Result<HandshakeTarget> {
    let index = layout.communication_unit;
    let abc = unit(movie, index)?;
    let handshake = class(abc, &layout.handshake_class)?;

    find_methods(
        abc,
        TraitOwner::Instance(handshake),
        &MethodSignature::new().param_count(1).returns("void"),
    )
    .into_iter()
    .find_map(|candidate| {
        let body = abc.body(candidate.method)?;
        let editor = CodeEditor::from_body(body).ok()?;
        guarding_jump(&editor).map(|jump| HandshakeTarget {
            method: MethodRef::new(index, candidate.method),
            jump,
        })
    })
    .ok_or_else(|| Error::NotFound(format!("guarded handshake call in {}", layout.handshake_class)))
}

/// Retarget the guarding jump onto the block it used to skip.
///
/// # Errors
/// Returns [`Error::NotFound`] if the body is missing and editor errors if the jump cannot
/// be retargeted.
pub fn apply(movie: &mut Movie, target: &HandshakeTarget, events: &EventLog) -> Result<()> {
    let abc = unit_mut(movie, target.method.unit)?;
    let body = stage(abc, target.method.method, |editor| {
        editor.set_end_of_jump(target.jump, target.jump)
    })?;
    commit(abc, vec![body]);

    events
        .record(EventKind::JumpRetargeted)
        .at(target.method, target.jump)
        .message("guarded handshake block always runs");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abc::AbcFile, assembly::decode_code, assembly::Operand, test::UnitBuilder};

    // getlocal_1; iffalse +5; getlocal_0; callpropvoid 1 0; pushnull; pop; returnvoid
    const GUARDED: &[u8] = &[0xD1, 0x12, 0x05, 0x00, 0x00, 0xD0, 0x4F, 0x01, 0x00, 0x20, 0x29, 0x47];

    fn movie() -> Movie {
        let unit = UnitBuilder::new()
            .class("HabboCommunicationDemo", |c| {
                c.method("_-1", &["Event"], "Boolean", GUARDED)
                    // the block skipped by this jump holds no call
                    .method("_-2", &["Event"], "void", &[0xD1, 0x12, 0x01, 0x00, 0x00, 0x20, 0x47])
                    .method("_-3", &["Event"], "void", GUARDED)
            })
            .build();
        let mut movie = Movie::new(10);
        movie.add_unit("a", AbcFile::default());
        movie.add_unit("b", AbcFile::default());
        movie.add_unit("c", unit);
        movie
    }

    #[test]
    fn test_locate_skips_unguarded() {
        let movie = movie();
        let target = locate(&movie, &GameLayout::default()).unwrap();
        let abc = movie.unit(2).unwrap();
        assert_eq!(Some(target.method.method), abc.instances[0].traits[2].method());
        assert_eq!(target.jump, 1);
    }

    #[test]
    fn test_apply_makes_block_unconditional() {
        let mut movie = movie();
        let target = locate(&movie, &GameLayout::default()).unwrap();
        let events = EventLog::new();
        apply(&mut movie, &target, &events).unwrap();

        let code = decode_code(&movie.unit(2).unwrap().body(target.method.method).unwrap().code).unwrap();
        assert_eq!(code[1].opcode, opcodes::IFFALSE);
        assert_eq!(code[1].operand, Operand::Branch(0));
        assert_eq!(code.len(), 7);
        assert!(events.has(EventKind::JumpRetargeted));
    }

    #[test]
    fn test_backward_jump_ignored() {
        // label; getlocal_1; iftrue -6 (back to label); getlocal_0; callpropvoid 1 0; returnvoid
        let code = [0x09, 0xD1, 0x11, 0xFA, 0xFF, 0xFF, 0xD0, 0x4F, 0x01, 0x00, 0x47];
        let editor = CodeEditor::from_code(&code, &[]).unwrap();
        assert_eq!(guarding_jump(&editor), None);
    }
}
