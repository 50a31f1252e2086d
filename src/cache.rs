//! Constant pool staging and de-duplication.
//!
//! Patches add literals (RSA keys, host names, generated identifiers) to a pool while the
//! rest of the unit keeps referencing existing slots by index. [`InternCache`] sits in front of
//! one pool table and remembers every value it handed out during the current patch session,
//! so interning the same literal twice yields one slot.
//!
//! # Slot Reuse
//!
//! Lookups run in this order:
//!
//! 1. values already interned during this session (always reused),
//! 2. values present in the table before the session (reused only in recycle mode),
//! 3. otherwise the value is appended.
//!
//! With recycling disabled every call appends: the pass that disabled it is free to rewrite
//! any slot it was handed without affecting another holder of the same value.
//!
//! # Index Stability
//!
//! The cache never removes or reorders table entries. Indices handed out remain valid for the
//! lifetime of the unit, mirroring the append-only model of the container format.

use std::{collections::HashMap, hash::Hash};

/// Per-table intern state for one constant pool table.
///
/// Index 0 of every table is the implicit default entry and is never returned.
#[derive(Debug, Clone)]
pub struct InternCache<T: Eq + Hash + Clone> {
    /// Values interned during this session, by the slot they received.
    session: HashMap<T, u32>,
    /// First index of each pre-existing value, built on first recycling lookup.
    existing: Option<HashMap<T, u32>>,
    /// Whether existing and session slots may be handed out again.
    recycle: bool,
}

impl<T: Eq + Hash + Clone> Default for InternCache<T> {
    fn default() -> Self {
        InternCache {
            session: HashMap::new(),
            existing: None,
            recycle: true,
        }
    }
}

impl<T: Eq + Hash + Clone> InternCache<T> {
    /// Look up `value` or append it to `table`, returning its index.
    pub fn intern(&mut self, table: &mut Vec<T>, value: T) -> u32 {
        if self.recycle {
            if let Some(index) = self.session.get(&value) {
                return *index;
            }

            let existing = self.existing.get_or_insert_with(|| index_table(table));
            if let Some(index) = existing.get(&value) {
                let index = *index;
                self.session.insert(value, index);
                return index;
            }
        }

        if table.is_empty() {
            // keep the implicit default entry at index 0
            table.push(value.clone());
        }
        table.push(value.clone());
        let index = u32::try_from(table.len() - 1).unwrap_or(u32::MAX);
        self.session.insert(value, index);
        index
    }

    /// Drop any cached value that points at `index` after its slot was rewritten.
    pub fn forget_index(&mut self, index: u32) {
        self.session.retain(|_, slot| *slot != index);
        // pre-existing lookups are rebuilt lazily from the table
        self.existing = None;
    }

    /// Enable or disable slot reuse.
    pub fn set_recycle(&mut self, recycle: bool) {
        self.recycle = recycle;
    }

    /// Whether slots are reused.
    #[must_use]
    pub fn recycles(&self) -> bool {
        self.recycle
    }

    /// Number of distinct values interned during this session.
    #[must_use]
    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    /// Forget the session, keeping the recycle mode.
    pub fn reset(&mut self) {
        self.session.clear();
        self.existing = None;
    }
}

fn index_table<T: Eq + Hash + Clone>(table: &[T]) -> HashMap<T, u32> {
    let mut map = HashMap::with_capacity(table.len());
    for (index, value) in table.iter().enumerate().skip(1) {
        if let Ok(index) = u32::try_from(index) {
            map.entry(value.clone()).or_insert(index);
        }
    }
    map
}
