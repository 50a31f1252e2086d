//! Host check bypass and the valid-host patterns.
//!
//! Two methods decide whether the client runs on an allowed host: a static local-host check
//! on the first class of the loader unit, and the valid-host checker of the main class,
//! which matches the page URL against a handful of regular expressions. Both are made to
//! return `true` up front.
//!
//! The checker's patterns are captured when the client is located so they can be read and
//! replaced in place.

use crate::{
    abc::MethodBody,
    assembly::{decode_code, opcodes, Instruction},
    config::{GameLayout, MAX_HOST_PATTERNS},
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
    locator::{find_method, MethodSignature, TraitOwner},
    Error, Result,
};

use super::{class, commit, stage, unit, unit_mut};

/// One captured valid-host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern {
    /// Pattern text at capture time
    pub value: String,
    /// String pool slot the checker pushes
    pub slot: u32,
}

/// The valid-host checker and the patterns it pushes, in code order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidHosts {
    /// The checker method
    pub method: MethodRef,
    /// At most [`MAX_HOST_PATTERNS`] patterns
    pub patterns: Vec<HostPattern>,
}

/// Find the static local-host check: the first one-parameter `Boolean` static method of
/// the first class.
///
/// # Errors
/// Returns [`Error::NotFound`] if the unit, class or method is missing.
pub fn locate_local_host_check(movie: &Movie, layout: &GameLayout, events: &EventLog) -> Result<MethodRef> {
    let abc = unit(movie, layout.host_check_unit)?;
    if abc.classes.is_empty() {
        return Err(Error::NotFound("loader class".to_string()));
    }
    find_method(
        abc,
        TraitOwner::Class(0),
        &MethodSignature::new().param_count(1).returns("Boolean"),
        events,
    )
    .map(|m| MethodRef::new(layout.host_check_unit, m.method))
    .ok_or_else(|| Error::NotFound("static Boolean method with one parameter".to_string()))
}

/// Find the valid-host checker, a `Boolean` method of the main class taking
/// `(String, Object)`, and capture the first patterns it pushes.
///
/// # Errors
/// Returns [`Error::NotFound`] if the unit, class or method is missing, and decoding
/// errors if the checker code is malformed.
pub fn locate_valid_hosts(movie: &Movie, layout: &GameLayout, events: &EventLog) -> Result<ValidHosts> {
    let abc = unit(movie, layout.valid_hosts_unit)?;
    let main = class(abc, &layout.main_class)?;
    let checker = find_method(
        abc,
        TraitOwner::Instance(main),
        &MethodSignature::new().returns("Boolean").param("String").param("Object"),
        events,
    )
    .ok_or_else(|| Error::NotFound("valid hosts checker".to_string()))?;
    let body = abc
        .body(checker.method)
        .ok_or_else(|| Error::NotFound("valid hosts checker body".to_string()))?;

    let patterns = decode_code(&body.code)?
        .iter()
        .filter(|i| i.opcode == opcodes::PUSHSTRING)
        .filter_map(Instruction::index)
        .take(MAX_HOST_PATTERNS)
        .map(|slot| HostPattern {
            value: abc.pool.string(slot).unwrap_or_default().to_string(),
            slot,
        })
        .collect();

    Ok(ValidHosts {
        method: MethodRef::new(layout.valid_hosts_unit, checker.method),
        patterns,
    })
}

/// Bypass edits staged against a movie and not yet committed.
#[derive(Debug)]
pub struct StagedBypass {
    checks: usize,
    bodies: Vec<(MethodRef, MethodBody)>,
}

impl StagedBypass {
    /// Commit the staged bodies, returning how many checks now return early.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if a unit disappeared since staging.
    pub fn commit(self, movie: &mut Movie, events: &EventLog) -> Result<usize> {
        for (check, body) in self.bodies {
            events
                .record(EventKind::InstructionsInserted)
                .at(check, 0)
                .message("return true");
            commit(unit_mut(movie, check.unit)?, vec![body]);
        }
        Ok(self.checks)
    }
}

/// Stage the early `return true` of every method in `checks` without touching `movie`.
///
/// Methods already starting with `pushtrue; returnvalue` are left alone.
///
/// # Errors
/// Returns [`Error::NotFound`] if `checks` is empty or a body is missing, and editor errors
/// if a body cannot be rewritten.
pub fn prepare_bypass(movie: &Movie, checks: &[MethodRef]) -> Result<StagedBypass> {
    if checks.is_empty() {
        return Err(Error::NotFound("no host check located".to_string()));
    }

    let mut bodies = Vec::new();
    for check in checks {
        let abc = unit(movie, check.unit)?;
        let body = abc
            .body(check.method)
            .ok_or_else(|| Error::NotFound(format!("body of {check}")))?;
        if returns_true(&body.code) {
            log::debug!("{check} already returns true");
            continue;
        }
        let body = stage(abc, check.method, |editor| {
            editor.insert_at(
                0,
                vec![
                    Instruction::simple(opcodes::PUSHTRUE),
                    Instruction::simple(opcodes::RETURNVALUE),
                ],
            )?;
            Ok(())
        })?;
        bodies.push((*check, body));
    }
    Ok(StagedBypass {
        checks: checks.len(),
        bodies,
    })
}

/// Make every method in `checks` return `true` immediately.
///
/// Returns how many checks now return early, patched or not.
///
/// # Errors
/// The errors of [`prepare_bypass`]. Nothing is committed on error.
pub fn bypass(movie: &mut Movie, checks: &[MethodRef], events: &EventLog) -> Result<usize> {
    prepare_bypass(movie, checks)?.commit(movie, events)
}

fn returns_true(code: &[u8]) -> bool {
    code.starts_with(&[opcodes::PUSHTRUE, opcodes::RETURNVALUE])
}

/// Write `patterns` over the captured pattern slots, in capture order.
///
/// Empty or whitespace-only replacements keep the captured pattern. Extra replacements are
/// ignored.
///
/// # Errors
/// Returns [`Error::NotFound`] if the unit is missing and [`Error::OutOfBounds`] if a slot
/// no longer exists.
pub fn write_patterns(movie: &mut Movie, hosts: &ValidHosts, patterns: &[String], events: &EventLog) -> Result<usize> {
    let abc = unit_mut(movie, hosts.method.unit)?;
    let mut written = 0;
    for (captured, replacement) in hosts.patterns.iter().zip(patterns) {
        if replacement.trim().is_empty() {
            continue;
        }
        abc.pool.set_string(captured.slot, replacement)?;
        events
            .record(EventKind::ConstantRewritten)
            .method(hosts.method)
            .message(format!("string {}: {:?} -> {replacement:?}", captured.slot, captured.value));
        written += 1;
    }
    Ok(written)
}
