//! Identifier sanitization.
//!
//! Obfuscated builds use names no compiler would accept: private-use code points, characters
//! outside the identifier alphabet (`_-3Q`) or reserved words. Decompilers and recompilers
//! choke on those, so this pass replaces every such name with a generated one and makes every
//! reference follow:
//!
//! - namespaces become `ns_<N>`, whatever their kind,
//! - classes become `class_<M>`,
//! - multinames that referenced a renamed class are repointed,
//! - `SymbolClass` records are rewritten to the new qualified names.
//!
//! Numbering follows discovery order and continues across units, so units must be processed
//! in load order for the output to be reproducible. All rename state lives in a
//! [`RenameContext`] owned by the caller; nothing is global.
//!
//! Names are never edited in place. Each generated name is appended to the string table once
//! per unit and the renamed entries are repointed at it, so strings shared with code (for
//! instance the same text pushed as a literal) keep their value.
//!
//! # Examples
//!
//! ```rust,no_run
//! use abcpatch::{events::EventLog, sanitizer::{sanitize_identifiers, RenameContext}, Movie};
//!
//! let mut movie = Movie::from_file("Habbo.swf")?;
//! let mut context = RenameContext::new();
//! let summary = sanitize_identifiers(&mut movie, &mut context, &EventLog::new());
//! println!("renamed {} classes", summary.classes);
//! # Ok::<(), abcpatch::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    abc::{AbcFile, NamespaceKind},
    events::{EventKind, EventLog},
    file::movie::{Movie, SymbolRecord},
};

/// Words the source language reserves.
const RESERVED_WORDS: &[&str] = &[
    "as", "break", "case", "catch", "class", "const", "continue", "default", "delete", "do",
    "else", "extends", "false", "finally", "for", "function", "if", "implements", "import", "in",
    "instanceof", "interface", "internal", "is", "native", "new", "null", "package", "private",
    "protected", "public", "return", "super", "switch", "this", "throw", "to", "true", "try",
    "typeof", "use", "var", "void", "while", "with",
];

fn is_private_use(c: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&c)
}

/// Whether `name` is a syntactically valid, non-reserved identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') || is_private_use(first) {
        return false;
    }
    if !chars.all(|c| (c.is_alphanumeric() || c == '_' || c == '$') && !is_private_use(c)) {
        return false;
    }
    !RESERVED_WORDS.contains(&name)
}

/// Whether the package name `name` needs replacing. The public package (`""`) never does.
#[must_use]
pub fn is_valid_package(name: &str) -> bool {
    name.is_empty() || name.split('.').all(is_valid_identifier)
}

/// Whether a class-scoped namespace name (`protected`, `private`) needs replacing.
///
/// The compiler names these `package:Class`, or `Class` in the public package; private
/// namespaces of file scope carry an `.as$<n>` suffix.
#[must_use]
pub fn is_valid_class_scope(name: &str) -> bool {
    let name = name
        .rsplit_once('$')
        .filter(|(_, serial)| !serial.is_empty() && serial.bytes().all(|b| b.is_ascii_digit()))
        .map_or(name, |(base, _)| base);
    let name = name.strip_suffix(".as").unwrap_or(name);
    match name.split_once(':') {
        Some((package, class)) => is_valid_package(package) && is_valid_identifier(class),
        None => is_valid_package(name),
    }
}

/// Whether a namespace of `kind` named `name` needs replacing.
#[must_use]
pub fn is_valid_namespace(kind: NamespaceKind, name: &str) -> bool {
    match kind {
        NamespaceKind::Package | NamespaceKind::PackageInternal => is_valid_package(name),
        NamespaceKind::Protected | NamespaceKind::StaticProtected | NamespaceKind::Private => {
            is_valid_class_scope(name)
        }
        // URIs are bound by the player and by namespace declarations; keep them
        NamespaceKind::Namespace | NamespaceKind::Explicit => name.contains(':') || is_valid_package(name),
    }
}

/// Rename memo shared by every unit processed in one session.
#[derive(Debug, Clone, Default)]
pub struct RenameContext {
    namespaces: HashMap<String, String>,
    classes: HashMap<String, HashMap<String, String>>,
    namespace_count: usize,
    class_count: usize,
}

impl RenameContext {
    /// An empty context; numbering starts at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacement chosen for the namespace originally named `name`.
    #[must_use]
    pub fn namespace_replacement(&self, name: &str) -> Option<&str> {
        self.namespaces.get(name).map(String::as_str)
    }

    /// Replacement chosen for class `name` declared in the namespace originally named
    /// `namespace`.
    #[must_use]
    pub fn class_replacement(&self, name: &str, namespace: &str) -> Option<&str> {
        self.classes.get(name)?.get(namespace).map(String::as_str)
    }

    /// Number of namespaces renamed so far.
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.namespace_count
    }

    /// Number of classes renamed so far.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Whether nothing was renamed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespace_count == 0 && self.class_count == 0
    }

    /// Replacement for namespace `name`, assigning the next `ns_<N>` on first sight.
    fn assign_namespace(&mut self, name: &str) -> (String, bool) {
        if let Some(existing) = self.namespaces.get(name) {
            return (existing.clone(), false);
        }
        self.namespace_count += 1;
        let generated = format!("ns_{}", self.namespace_count);
        self.namespaces.insert(name.to_string(), generated.clone());
        (generated, true)
    }

    /// Replacement for class `name` in `namespace`, assigning the next `class_<M>` on first
    /// sight of the pair.
    fn assign_class(&mut self, name: &str, namespace: &str) -> (String, bool) {
        let by_namespace = self.classes.entry(name.to_string()).or_default();
        if let Some(existing) = by_namespace.get(namespace) {
            return (existing.clone(), false);
        }
        self.class_count += 1;
        let generated = format!("class_{}", self.class_count);
        by_namespace.insert(namespace.to_string(), generated.clone());
        (generated, true)
    }
}

/// Counts of one sanitization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeSummary {
    /// Namespace entries repointed
    pub namespaces: usize,
    /// Class names repointed
    pub classes: usize,
    /// Other multinames repointed to a renamed class
    pub references: usize,
    /// Symbol records rewritten
    pub symbols: usize,
}

impl SanitizeSummary {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces + self.classes + self.references + self.symbols == 0
    }
}

/// Per-unit state carried between the declaration and reference phases.
struct UnitState {
    /// Namespace names as they were before the pass, by namespace index
    namespace_names: Vec<String>,
    /// Slot appended for each generated name
    slots: HashMap<String, u32>,
    recycled: bool,
}

impl UnitState {
    fn begin(unit: &mut AbcFile) -> Self {
        let recycled = unit.pool.recycles();
        unit.pool.set_recycle(false);
        let namespace_names = unit
            .pool
            .namespaces
            .iter()
            .map(|ns| unit.pool.string(ns.name).unwrap_or_default().to_string())
            .collect();
        UnitState {
            namespace_names,
            slots: HashMap::new(),
            recycled,
        }
    }

    fn original_namespace(&self, index: Option<u32>) -> &str {
        index
            .and_then(|index| self.namespace_names.get(index as usize))
            .map_or("", String::as_str)
    }

    fn slot(&mut self, unit: &mut AbcFile, name: &str) -> u32 {
        if let Some(slot) = self.slots.get(name) {
            return *slot;
        }
        let slot = unit.pool.intern_string(name);
        self.slots.insert(name.to_string(), slot);
        slot
    }
}

/// Rename every invalid namespace, class and symbol name in `movie`.
///
/// Units are processed in load order. Declarations of all units are renamed before any
/// reference is repointed, so references into a later unit converge as well. Running the
/// pass on a movie without invalid names changes nothing.
pub fn sanitize_identifiers(movie: &mut Movie, context: &mut RenameContext, events: &EventLog) -> SanitizeSummary {
    let mut summary = SanitizeSummary::default();

    let mut states = Vec::with_capacity(movie.unit_count());
    for unit in movie.units_mut() {
        let mut state = UnitState::begin(unit);
        summary.namespaces += rename_namespaces(unit, &mut state, context, events);
        summary.classes += rename_classes(unit, &mut state, context, events);
        states.push(state);
    }

    for (unit, mut state) in movie.units_mut().zip(states) {
        summary.references += repoint_references(unit, &mut state, context);
        unit.pool.set_recycle(state.recycled);
    }

    summary.symbols = rename_symbols(movie.symbols_mut(), context, events);

    if !summary.is_empty() {
        log::info!(
            "Sanitized {} namespaces, {} classes, {} references, {} symbols",
            summary.namespaces,
            summary.classes,
            summary.references,
            summary.symbols
        );
    }
    summary
}

fn rename_namespaces(
    unit: &mut AbcFile,
    state: &mut UnitState,
    context: &mut RenameContext,
    events: &EventLog,
) -> usize {
    let mut renamed = 0;
    for index in 1..unit.pool.namespaces.len() {
        let original = state.namespace_names[index].clone();
        if is_valid_namespace(unit.pool.namespaces[index].kind, &original) {
            continue;
        }

        let (generated, fresh) = context.assign_namespace(&original);
        let slot = state.slot(unit, &generated);
        unit.pool.namespaces[index].name = slot;
        renamed += 1;
        if fresh {
            events
                .record(EventKind::NamespaceRenamed)
                .message(format!("{original:?} -> {generated}"));
        }
    }
    renamed
}

fn rename_classes(
    unit: &mut AbcFile,
    state: &mut UnitState,
    context: &mut RenameContext,
    events: &EventLog,
) -> usize {
    let mut renamed = 0;
    for class in 0..unit.instances.len() {
        let name = unit.instances[class].name;
        let Some(local) = unit
            .pool
            .multiname(name)
            .and_then(|m| m.name_index())
            .map(|index| unit.pool.string(index).unwrap_or_default().to_string())
        else {
            continue;
        };
        if is_valid_identifier(&local) {
            continue;
        }

        let namespace = state.original_namespace(unit.pool.multiname_namespace(name)).to_string();
        let (generated, fresh) = context.assign_class(&local, &namespace);
        let slot = state.slot(unit, &generated);
        if let Some(multiname) = unit.pool.multinames.get_mut(name as usize) {
            multiname.set_name_index(slot);
            renamed += 1;
        }
        if fresh {
            log::debug!("class {local:?} in {namespace:?} -> {generated}");
            events
                .record(EventKind::ClassRenamed)
                .message(format!("{local:?} in {namespace:?} -> {generated}"));
        }
    }
    renamed
}

fn repoint_references(unit: &mut AbcFile, state: &mut UnitState, context: &RenameContext) -> usize {
    let mut repointed = 0;
    for index in 1..unit.pool.multinames.len() {
        let Ok(multiname) = u32::try_from(index) else {
            break;
        };
        let Some(local) = unit.pool.multinames[index]
            .name_index()
            .and_then(|name| unit.pool.string(name))
        else {
            continue;
        };
        if context.classes.get(local).is_none() {
            continue;
        }
        let namespace = state.original_namespace(unit.pool.multiname_namespace(multiname));
        let Some(generated) = context.class_replacement(local, namespace).map(str::to_string) else {
            continue;
        };

        let slot = state.slot(unit, &generated);
        if unit.pool.multinames[index].set_name_index(slot) {
            repointed += 1;
        }
    }
    repointed
}

fn rename_symbols<'a>(
    symbols: impl Iterator<Item = &'a mut SymbolRecord>,
    context: &RenameContext,
    events: &EventLog,
) -> usize {
    let mut renamed = 0;
    for record in symbols {
        // the first '.' is taken as the namespace separator, even inside an obfuscated name
        let (namespace, local) = match record.name.split_once('.') {
            Some((namespace, local)) => (Some(namespace), local),
            None => (None, record.name.as_str()),
        };

        let new_local = context
            .class_replacement(local, namespace.unwrap_or_default())
            .unwrap_or(local);
        let new_name = match namespace {
            Some(namespace) => {
                let new_namespace = context.namespace_replacement(namespace).unwrap_or(namespace);
                format!("{new_namespace}.{new_local}")
            }
            None => new_local.to_string(),
        };

        if new_name != record.name {
            events
                .record(EventKind::SymbolRenamed)
                .message(format!("{:?} -> {new_name}", record.name));
            record.name = new_name;
            renamed += 1;
        }
    }
    renamed
}
