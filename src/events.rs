//! Event logging for the patch pipeline.
//!
//! Every stage of a patch run (locating targets, editing bodies, renaming identifiers,
//! building the message registry) records what it did here. Events can be inspected after a
//! run or safely ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API for creating events; records on drop
//!
//! # Example
//!
//! ```rust
//! use abcpatch::events::{EventKind, EventLog, MethodRef};
//!
//! let log = EventLog::new();
//! log.record(EventKind::InstructionsInserted)
//!     .at(MethodRef::new(2, 14), 0)
//!     .message("pushstring, returnvalue");
//! log.info("sanitizer found nothing to rename");
//!
//! assert_eq!(log.count_kind(EventKind::InstructionsInserted), 1);
//! assert_eq!(log.summary(), "1 instructions inserted");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A patch operation succeeded.
    PatchApplied,
    /// A patch operation found its target but could not complete.
    PatchFailed,
    /// A patch operation did not run or found nothing to do.
    PatchSkipped,

    /// Instructions were inserted into a body.
    InstructionsInserted,
    /// An instruction was replaced in place.
    InstructionReplaced,
    /// A jump was pointed at a new instruction.
    JumpRetargeted,
    /// A constant pool slot was overwritten.
    ConstantRewritten,

    /// A signature matched.
    TargetLocated,
    /// A signature matched nothing.
    TargetNotFound,
    /// A signature matched more than one candidate; the first was used.
    AmbiguousMatch,

    /// A namespace name was replaced.
    NamespaceRenamed,
    /// A class name was replaced.
    ClassRenamed,
    /// An exported symbol name was replaced.
    SymbolRenamed,
    /// A debug register name was replaced.
    RegisterRenamed,

    /// A message class was registered under a header.
    MessageRegistered,
    /// The revision string slot was found.
    RevisionSlotFound,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::PatchApplied => "patch applied",
            Self::PatchFailed => "patch failed",
            Self::PatchSkipped => "patch skipped",
            Self::InstructionsInserted => "instructions inserted",
            Self::InstructionReplaced => "instruction replaced",
            Self::JumpRetargeted => "jump retargeted",
            Self::ConstantRewritten => "constant rewritten",
            Self::TargetLocated => "target located",
            Self::TargetNotFound => "target not found",
            Self::AmbiguousMatch => "ambiguous match",
            Self::NamespaceRenamed => "namespace renamed",
            Self::ClassRenamed => "class renamed",
            Self::SymbolRenamed => "symbol renamed",
            Self::RegisterRenamed => "register renamed",
            Self::MessageRegistered => "message registered",
            Self::RevisionSlotFound => "revision slot found",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the module.
    #[must_use]
    pub fn is_modification(&self) -> bool {
        matches!(
            self,
            Self::InstructionsInserted
                | Self::InstructionReplaced
                | Self::JumpRetargeted
                | Self::ConstantRewritten
                | Self::NamespaceRenamed
                | Self::ClassRenamed
                | Self::SymbolRenamed
                | Self::RegisterRenamed
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A method, addressed by bytecode unit index and method signature index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Unit index in load order
    pub unit: usize,
    /// Method signature index within the unit
    pub method: u32,
}

impl MethodRef {
    /// Creates a method reference.
    #[must_use]
    pub fn new(unit: usize, method: u32) -> Self {
        MethodRef { unit, method }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {} method {}", self.unit, self.method)
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method where the event occurred (if applicable).
    pub method: Option<MethodRef>,
    /// Instruction position within the method.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            Some(method) => write!(f, "[{}] {}: {}", self.kind, method, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodRef>,
    location: Option<usize>,
    message: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
        }
    }

    /// Sets the method and instruction position where the event occurred.
    pub fn at(mut self, method: MethodRef, location: usize) -> Self {
        self.method = Some(method);
        self.location = Some(location);
        self
    }

    /// Sets only the method.
    pub fn method(mut self, method: MethodRef) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
        });
    }
}

/// Collection of events from one patch run.
///
/// Events can be appended concurrently through shared references (`&self`).
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method(&self, method: MethodRef) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.method == Some(method))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of unique methods with events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.method)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the modifications.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(kind, _)| kind.is_modification())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}
