//! Patch operations for the game client.
//!
//! Each patch is split in two steps:
//!
//! 1. **Locate**: find the target methods by signature. A target that cannot be found is a
//!    normal outcome on a client whose layout changed; it is reported, never fatal.
//! 2. **Apply**: edit copies of the target bodies with a [`CodeEditor`] and commit them
//!    only once every edit of the patch succeeded. A rejected edit leaves the unit as it
//!    was.
//!
//! [`PatchTargets::locate`] runs every locator up front; the `apply` functions of the
//! submodules take the located targets. [`PatchReport`] carries the per-patch result, so a
//! caller can tell "the client changed shape" ([`PatchOutcome::NotFound`]) from "an edit was
//! refused" ([`PatchOutcome::Rejected`]).
//!
//! # Patches
//!
//! - [`rsa`] replaces the public RSA key.
//! - [`domain`] short-circuits the host checks.
//! - [`host`] stops the client from prepending its configured host.
//! - [`handshake`] makes the handshake block unconditional.
//! - [`registers`] names every debug register.

pub mod domain;
pub mod handshake;
pub mod host;
pub mod registers;
pub mod rsa;

use std::fmt;

use crate::{
    abc::{AbcFile, MethodBody},
    config::{GameLayout, RsaKeys},
    editor::CodeEditor,
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
    Error, Result,
};

/// The patch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum PatchKind {
    /// Replace the public RSA key
    #[strum(serialize = "Replace RSA keys")]
    ReplaceRsaKeys,
    /// Short-circuit the host checks
    #[strum(serialize = "Bypass domain checks")]
    BypassDomainChecks,
    /// Stop the client from prepending its configured host
    #[strum(serialize = "Disable host prepender")]
    DisableHostPrepender,
    /// Make the handshake block unconditional
    #[strum(serialize = "Disable handshake")]
    DisableHandshake,
    /// Name every debug register
    #[strum(serialize = "Rename registers")]
    RenameRegisters,
}

/// A patch request with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Replace the public RSA key with the given one
    ReplaceRsaKeys(RsaKeys),
    /// Short-circuit the host checks and disable the host prepender
    BypassDomainChecks,
    /// Disable the host prepender alone
    DisableHostPrepender,
    /// Make the handshake block unconditional
    DisableHandshake,
    /// Name every debug register
    RenameRegisters,
}

impl Patch {
    /// Which operation this request runs.
    #[must_use]
    pub fn kind(&self) -> PatchKind {
        match self {
            Patch::ReplaceRsaKeys(_) => PatchKind::ReplaceRsaKeys,
            Patch::BypassDomainChecks => PatchKind::BypassDomainChecks,
            Patch::DisableHostPrepender => PatchKind::DisableHostPrepender,
            Patch::DisableHandshake => PatchKind::DisableHandshake,
            Patch::RenameRegisters => PatchKind::RenameRegisters,
        }
    }
}

/// Result of one patch.
#[derive(Debug)]
pub enum PatchOutcome {
    /// Every edit of the patch was committed
    Applied,
    /// A required target is missing from this client
    NotFound(String),
    /// An edit was refused; the unit is unchanged
    Rejected(Error),
}

/// Outcome of one patch operation.
#[derive(Debug)]
pub struct PatchReport {
    /// Which patch ran
    pub kind: PatchKind,
    /// What happened
    pub outcome: PatchOutcome,
}

impl PatchReport {
    /// Report for a committed patch.
    #[must_use]
    pub fn applied(kind: PatchKind) -> Self {
        PatchReport {
            kind,
            outcome: PatchOutcome::Applied,
        }
    }

    /// Report for a result, sorting `NotFound` errors from rejected edits.
    #[must_use]
    pub fn from_result(kind: PatchKind, result: Result<()>) -> Self {
        let outcome = match result {
            Ok(()) => PatchOutcome::Applied,
            Err(Error::NotFound(reason)) => PatchOutcome::NotFound(reason),
            Err(error) => PatchOutcome::Rejected(error),
        };
        PatchReport { kind, outcome }
    }

    /// Whether the patch was committed.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, PatchOutcome::Applied)
    }

    /// Whether a required target was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.outcome, PatchOutcome::NotFound(_))
    }

    /// Record the outcome in `events`.
    pub fn record(&self, events: &EventLog) {
        let kind = match self.outcome {
            PatchOutcome::Applied => EventKind::PatchApplied,
            PatchOutcome::NotFound(_) => EventKind::PatchSkipped,
            PatchOutcome::Rejected(_) => EventKind::PatchFailed,
        };
        events.record(kind).message(self.to_string());
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PatchOutcome::Applied => write!(f, "{}: applied", self.kind),
            PatchOutcome::NotFound(reason) => write!(f, "{}: target not found ({reason})", self.kind),
            PatchOutcome::Rejected(error) => write!(f, "{}: rejected ({error})", self.kind),
        }
    }
}

/// Every patch target of one client. A `None` target was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchTargets {
    /// Methods returning the RSA key parts
    pub rsa: Option<rsa::RsaTargets>,
    /// Static local-host check
    pub local_host_check: Option<MethodRef>,
    /// Valid-host checker with its captured patterns
    pub valid_hosts: Option<domain::ValidHosts>,
    /// Connect method and the names the host patch injects
    pub host_prepender: Option<host::HostTargets>,
    /// Method owning the handshake branch
    pub handshake: Option<handshake::HandshakeTarget>,
}

impl PatchTargets {
    /// Run every locator against `movie`.
    ///
    /// Each target is recorded as [`EventKind::TargetLocated`] or
    /// [`EventKind::TargetNotFound`].
    #[must_use]
    pub fn locate(movie: &Movie, layout: &GameLayout, events: &EventLog) -> Self {
        PatchTargets {
            rsa: found(events, "RSA key methods", rsa::locate(movie, layout)),
            local_host_check: found(events, "local host check", domain::locate_local_host_check(movie, layout, events)),
            valid_hosts: found(events, "valid hosts checker", domain::locate_valid_hosts(movie, layout, events)),
            host_prepender: found(events, "host prepender", host::locate(movie, layout, events)),
            handshake: found(events, "handshake branch", handshake::locate(movie, layout)),
        }
    }

    /// Names of the targets that were not found.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("RSA key methods", self.rsa.is_none()),
            ("local host check", self.local_host_check.is_none()),
            ("valid hosts checker", self.valid_hosts.is_none()),
            ("host prepender", self.host_prepender.is_none()),
            ("handshake branch", self.handshake.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

fn found<T>(events: &EventLog, what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(target) => {
            events.record(EventKind::TargetLocated).message(what);
            Some(target)
        }
        Err(error) => {
            log::debug!("{what} not located: {error}");
            events
                .record(EventKind::TargetNotFound)
                .message(format!("{what}: {error}"));
            None
        }
    }
}

/// Bytecode unit `index` of `movie`, or `NotFound`.
pub(crate) fn unit(movie: &Movie, index: usize) -> Result<&AbcFile> {
    movie
        .unit(index)
        .ok_or_else(|| Error::NotFound(format!("bytecode unit {index}")))
}

/// Bytecode unit `index` of `movie` for editing, or `NotFound`.
pub(crate) fn unit_mut(movie: &mut Movie, index: usize) -> Result<&mut AbcFile> {
    movie
        .unit_mut(index)
        .ok_or_else(|| Error::NotFound(format!("bytecode unit {index}")))
}

/// Index of the first class named `name` in `unit`, or `NotFound`.
pub(crate) fn class(unit: &AbcFile, name: &str) -> Result<usize> {
    unit.find_class(name)
        .ok_or_else(|| Error::NotFound(format!("class {name}")))
}

/// Run `edit` over a copy of the body of `method`; the unit is untouched.
pub(crate) fn stage(
    unit: &AbcFile,
    method: u32,
    edit: impl FnOnce(&mut CodeEditor) -> Result<()>,
) -> Result<MethodBody> {
    let body = unit
        .body(method)
        .ok_or_else(|| Error::NotFound(format!("body of method {method}")))?;
    let mut editor = CodeEditor::from_body(body)?;
    edit(&mut editor)?;

    let mut staged = body.clone();
    editor.write_to(&mut staged)?;
    Ok(staged)
}

/// Replace the bodies of the staged methods.
pub(crate) fn commit(unit: &mut AbcFile, bodies: Vec<MethodBody>) {
    for body in bodies {
        if let Some(slot) = unit.body_mut(body.method) {
            *slot = body;
        }
    }
}
