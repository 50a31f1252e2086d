//! RSA public key replacement.
//!
//! The key class exposes the modulus and the exponent through two parameterless `String`
//! methods, told apart by their trait ids. Both are patched to return the replacement
//! literal right away; the original code stays behind the early return.

use crate::{
    assembly::{opcodes, Instruction},
    config::{GameLayout, RsaKeys},
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
    locator::{find_methods, MethodSignature, TraitOwner},
    Error, Result,
};

use super::{class, commit, stage, unit, unit_mut};

/// The two key methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsaTargets {
    /// Method returning the modulus
    pub modulus: MethodRef,
    /// Method returning the exponent
    pub exponent: MethodRef,
}

/// Find the key methods.
///
/// # Errors
/// Returns [`Error::NotFound`] if the key class or either method is missing.
pub fn locate(movie: &Movie, layout: &GameLayout) -> Result<RsaTargets> {
    let index = layout.communication_unit;
    let abc = unit(movie, index)?;
    let key_class = class(abc, &layout.key_class)?;

    let candidates = find_methods(
        abc,
        TraitOwner::Instance(key_class),
        &MethodSignature::new().param_count(0).returns("String"),
    );
    let by_id = |id: u32| {
        candidates
            .iter()
            .find(|m| m.id == id)
            .map(|m| MethodRef::new(index, m.method))
            .ok_or_else(|| Error::NotFound(format!("{} method with trait id {id}", layout.key_class)))
    };

    Ok(RsaTargets {
        modulus: by_id(layout.modulus_trait_id)?,
        exponent: by_id(layout.exponent_trait_id)?,
    })
}

/// Make the key methods return `keys`.
///
/// Both methods are edited or neither is, and the key literals reach the pool only with
/// the edits.
///
/// # Errors
/// Returns [`Error::NotFound`] if a body is missing and editor errors if the code cannot be
/// rewritten.
pub fn apply(movie: &mut Movie, targets: &RsaTargets, keys: &RsaKeys, events: &EventLog) -> Result<()> {
    let abc = unit_mut(movie, targets.modulus.unit)?;
    let mut pool = abc.pool.clone();

    let mut staged = Vec::with_capacity(2);
    for (method, value) in [(targets.modulus, &keys.modulus), (targets.exponent, &keys.exponent)] {
        let literal = pool.intern_string(value);
        let mut body = stage(abc, method.method, |editor| {
            editor.insert_at(
                0,
                vec![
                    Instruction::with_index(opcodes::PUSHSTRING, literal),
                    Instruction::simple(opcodes::RETURNVALUE),
                ],
            )?;
            Ok(())
        })?;
        body.max_stack = body.max_stack.max(1);
        staged.push((method, body));
    }

    for (method, _) in &staged {
        events
            .record(EventKind::InstructionsInserted)
            .at(*method, 0)
            .message("return replacement key");
    }
    abc.pool = pool;
    commit(abc, staged.into_iter().map(|(_, body)| body).collect());
    Ok(())
}
