//! The constant pool of a bytecode unit.
//!
//! All pool tables reserve index 0 for an implicit default entry that is never stored in the
//! file; [`ConstantPool`] keeps a placeholder at index 0 so that table positions equal the
//! indices used by instructions and metadata. The pool is append-only from the outside:
//! entries can be added or overwritten in place, never removed, because every index held by
//! an instruction, trait or signature would shift otherwise.

use crate::{
    cache::InternCache,
    file::{parser::Parser, writer::Writer},
    Result,
};

/// The kind byte of a namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[repr(u8)]
pub enum NamespaceKind {
    /// `private` namespace of a class
    Private = 0x05,
    /// User-defined namespace (usually a URI)
    Namespace = 0x08,
    /// Public namespace of a package
    Package = 0x16,
    /// `internal` namespace of a package
    PackageInternal = 0x17,
    /// `protected` namespace of a class
    Protected = 0x18,
    /// Explicitly opened namespace
    Explicit = 0x19,
    /// `protected` namespace of a class's static side
    StaticProtected = 0x1A,
}

impl TryFrom<u8> for NamespaceKind {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x05 => NamespaceKind::Private,
            0x08 => NamespaceKind::Namespace,
            0x16 => NamespaceKind::Package,
            0x17 => NamespaceKind::PackageInternal,
            0x18 => NamespaceKind::Protected,
            0x19 => NamespaceKind::Explicit,
            0x1A => NamespaceKind::StaticProtected,
            _ => return Err(malformed_error!("Unknown namespace kind 0x{:02X}", value)),
        })
    }
}

/// A namespace entry: a kind plus an index into the string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Kind of the namespace
    pub kind: NamespaceKind,
    /// String table index of the namespace name (0 = no name)
    pub name: u32,
}

/// A by-name reference record.
///
/// The `attribute` flag distinguishes the `...A` variants, which name XML attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Multiname {
    /// Fully qualified name: one namespace, one local name
    QName {
        /// Namespace table index
        namespace: u32,
        /// String table index of the local name
        name: u32,
        /// Attribute variant
        attribute: bool,
    },
    /// Runtime-qualified name, namespace taken from the stack
    RTQName {
        /// String table index of the local name
        name: u32,
        /// Attribute variant
        attribute: bool,
    },
    /// Runtime-qualified name with runtime name, both from the stack
    RTQNameL {
        /// Attribute variant
        attribute: bool,
    },
    /// Name resolved against a namespace set
    Multiname {
        /// String table index of the local name
        name: u32,
        /// Namespace set table index
        namespace_set: u32,
        /// Attribute variant
        attribute: bool,
    },
    /// Runtime name resolved against a namespace set
    MultinameL {
        /// Namespace set table index
        namespace_set: u32,
        /// Attribute variant
        attribute: bool,
    },
    /// Parameterized type such as `Vector.<int>`
    TypeName {
        /// Multiname index of the generic base type
        base: u32,
        /// Multiname indices of the type arguments
        parameters: Vec<u32>,
    },
}

impl Multiname {
    /// String table index of the local name, when the record carries one.
    #[must_use]
    pub fn name_index(&self) -> Option<u32> {
        match self {
            Multiname::QName { name, .. }
            | Multiname::RTQName { name, .. }
            | Multiname::Multiname { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Repoint the local name of the record, returning false if it has none.
    pub fn set_name_index(&mut self, index: u32) -> bool {
        match self {
            Multiname::QName { name, .. }
            | Multiname::RTQName { name, .. }
            | Multiname::Multiname { name, .. } => {
                *name = index;
                true
            }
            _ => false,
        }
    }

    /// Namespace table index of a `QName`.
    #[must_use]
    pub fn namespace_index(&self) -> Option<u32> {
        match self {
            Multiname::QName { namespace, .. } => Some(*namespace),
            _ => None,
        }
    }

    /// Namespace set table index of a `Multiname`/`MultinameL`.
    #[must_use]
    pub fn namespace_set_index(&self) -> Option<u32> {
        match self {
            Multiname::Multiname { namespace_set, .. } | Multiname::MultinameL { namespace_set, .. } => {
                Some(*namespace_set)
            }
            _ => None,
        }
    }

    fn kind_byte(&self) -> u8 {
        match self {
            Multiname::QName { attribute, .. } => if *attribute { 0x0D } else { 0x07 },
            Multiname::RTQName { attribute, .. } => if *attribute { 0x10 } else { 0x0F },
            Multiname::RTQNameL { attribute } => if *attribute { 0x12 } else { 0x11 },
            Multiname::Multiname { attribute, .. } => if *attribute { 0x0E } else { 0x09 },
            Multiname::MultinameL { attribute, .. } => if *attribute { 0x1C } else { 0x1B },
            Multiname::TypeName { .. } => 0x1D,
        }
    }

    fn read(parser: &mut Parser) -> Result<Self> {
        let kind = parser.read_le::<u8>()?;
        Ok(match kind {
            0x07 | 0x0D => Multiname::QName {
                namespace: parser.read_u30()?,
                name: parser.read_u30()?,
                attribute: kind == 0x0D,
            },
            0x0F | 0x10 => Multiname::RTQName {
                name: parser.read_u30()?,
                attribute: kind == 0x10,
            },
            0x11 | 0x12 => Multiname::RTQNameL {
                attribute: kind == 0x12,
            },
            0x09 | 0x0E => Multiname::Multiname {
                name: parser.read_u30()?,
                namespace_set: parser.read_u30()?,
                attribute: kind == 0x0E,
            },
            0x1B | 0x1C => Multiname::MultinameL {
                namespace_set: parser.read_u30()?,
                attribute: kind == 0x1C,
            },
            0x1D => {
                let base = parser.read_u30()?;
                let count = parser.read_index()?;
                let mut parameters = Vec::with_capacity(count.min(parser.remaining()));
                for _ in 0..count {
                    parameters.push(parser.read_u30()?);
                }
                Multiname::TypeName { base, parameters }
            }
            _ => return Err(malformed_error!("Unknown multiname kind 0x{:02X}", kind)),
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_le(self.kind_byte());
        match self {
            Multiname::QName { namespace, name, .. } => {
                writer.write_u30(*namespace);
                writer.write_u30(*name);
            }
            Multiname::RTQName { name, .. } => writer.write_u30(*name),
            Multiname::RTQNameL { .. } => {}
            Multiname::Multiname {
                name, namespace_set, ..
            } => {
                writer.write_u30(*name);
                writer.write_u30(*namespace_set);
            }
            Multiname::MultinameL { namespace_set, .. } => writer.write_u30(*namespace_set),
            Multiname::TypeName { base, parameters } => {
                writer.write_u30(*base);
                writer.write_index(parameters.len());
                for parameter in parameters {
                    writer.write_u30(*parameter);
                }
            }
        }
    }
}

// Tables whose entry count was written as 0 rather than 1 when empty.
const ZERO_INTEGERS: u8 = 1 << 0;
const ZERO_UINTEGERS: u8 = 1 << 1;
const ZERO_DOUBLES: u8 = 1 << 2;
const ZERO_STRINGS: u8 = 1 << 3;
const ZERO_NAMESPACES: u8 = 1 << 4;
const ZERO_NAMESPACE_SETS: u8 = 1 << 5;
const ZERO_MULTINAMES: u8 = 1 << 6;

/// String, number, namespace and multiname tables of one bytecode unit.
///
/// Every table keeps a placeholder at index 0. New string and integer constants should be
/// added through [`ConstantPool::intern_string`] and [`ConstantPool::intern_integer`], which
/// de-duplicate within a patch session.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Signed integer constants
    pub integers: Vec<i32>,
    /// Unsigned integer constants
    pub uintegers: Vec<u32>,
    /// Double constants
    pub doubles: Vec<f64>,
    /// String constants
    pub strings: Vec<String>,
    /// Namespaces
    pub namespaces: Vec<Namespace>,
    /// Namespace sets, each a list of namespace indices
    pub namespace_sets: Vec<Vec<u32>>,
    /// Multinames
    pub multinames: Vec<Multiname>,
    zero_counts: u8,
    string_cache: InternCache<String>,
    integer_cache: InternCache<i32>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool {
            integers: vec![0],
            uintegers: vec![0],
            doubles: vec![f64::NAN],
            strings: vec![String::new()],
            namespaces: vec![Namespace {
                kind: NamespaceKind::Namespace,
                name: 0,
            }],
            namespace_sets: vec![Vec::new()],
            multinames: vec![Multiname::RTQNameL { attribute: false }],
            zero_counts: 0x7F,
            string_cache: InternCache::default(),
            integer_cache: InternCache::default(),
        }
    }
}

fn read_table<'p, T>(
    parser: &mut Parser<'p>,
    table: &mut Vec<T>,
    zero_counts: &mut u8,
    flag: u8,
    mut read: impl FnMut(&mut Parser<'p>) -> Result<T>,
) -> Result<()> {
    let count = parser.read_index()?;
    if count == 0 {
        *zero_counts |= flag;
    }
    table.reserve(count.saturating_sub(1).min(parser.remaining()));
    for _ in 1..count {
        table.push(read(parser)?);
    }
    Ok(())
}

fn write_table<T>(
    writer: &mut Writer,
    table: &[T],
    zero_counts: u8,
    flag: u8,
    mut write: impl FnMut(&mut Writer, &T),
) {
    if table.len() <= 1 && zero_counts & flag != 0 {
        writer.write_u30(0);
        return;
    }
    writer.write_index(table.len());
    for entry in table.iter().skip(1) {
        write(writer, entry);
    }
}

impl ConstantPool {
    /// Decode the constant pool at the parser's position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated input and [`crate::Error::Malformed`]
    /// on unknown namespace or multiname kinds and invalid UTF-8.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        let mut pool = ConstantPool::default();
        let mut zero = 0_u8;

        read_table(parser, &mut pool.integers, &mut zero, ZERO_INTEGERS, Parser::read_s32)?;
        read_table(parser, &mut pool.uintegers, &mut zero, ZERO_UINTEGERS, Parser::read_u32)?;
        read_table(parser, &mut pool.doubles, &mut zero, ZERO_DOUBLES, |p| p.read_le::<f64>())?;
        read_table(parser, &mut pool.strings, &mut zero, ZERO_STRINGS, Parser::read_string)?;
        read_table(parser, &mut pool.namespaces, &mut zero, ZERO_NAMESPACES, |p| {
            let kind = NamespaceKind::try_from(p.read_le::<u8>()?)?;
            Ok(Namespace {
                kind,
                name: p.read_u30()?,
            })
        })?;
        read_table(parser, &mut pool.namespace_sets, &mut zero, ZERO_NAMESPACE_SETS, |p| {
            let count = p.read_index()?;
            let mut set = Vec::with_capacity(count.min(p.remaining()));
            for _ in 0..count {
                set.push(p.read_u30()?);
            }
            Ok(set)
        })?;
        read_table(parser, &mut pool.multinames, &mut zero, ZERO_MULTINAMES, Multiname::read)?;

        pool.zero_counts = zero;
        Ok(pool)
    }

    /// Encode the constant pool.
    pub fn write(&self, writer: &mut Writer) {
        let zero = self.zero_counts;
        write_table(writer, &self.integers, zero, ZERO_INTEGERS, |w, v| w.write_s32(*v));
        write_table(writer, &self.uintegers, zero, ZERO_UINTEGERS, |w, v| w.write_u32(*v));
        write_table(writer, &self.doubles, zero, ZERO_DOUBLES, |w, v| w.write_le(*v));
        write_table(writer, &self.strings, zero, ZERO_STRINGS, |w, v| w.write_string(v));
        write_table(writer, &self.namespaces, zero, ZERO_NAMESPACES, |w, ns| {
            w.write_le(ns.kind as u8);
            w.write_u30(ns.name);
        });
        write_table(writer, &self.namespace_sets, zero, ZERO_NAMESPACE_SETS, |w, set| {
            w.write_index(set.len());
            for namespace in set {
                w.write_u30(*namespace);
            }
        });
        write_table(writer, &self.multinames, zero, ZERO_MULTINAMES, |w, m| m.write(w));
    }

    /// String at `index`; index 0 has no value.
    #[must_use]
    pub fn string(&self, index: u32) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.strings.get(index as usize).map(String::as_str)
    }

    /// Integer at `index`; index 0 has no value.
    #[must_use]
    pub fn integer(&self, index: u32) -> Option<i32> {
        if index == 0 {
            return None;
        }
        self.integers.get(index as usize).copied()
    }

    /// Namespace at `index`; index 0 is the "any" namespace and has no entry.
    #[must_use]
    pub fn namespace(&self, index: u32) -> Option<&Namespace> {
        if index == 0 {
            return None;
        }
        self.namespaces.get(index as usize)
    }

    /// Name of the namespace at `index`.
    #[must_use]
    pub fn namespace_name(&self, index: u32) -> Option<&str> {
        self.namespace(index).and_then(|ns| self.string(ns.name))
    }

    /// Multiname at `index`; index 0 is the "any" name and has no entry.
    #[must_use]
    pub fn multiname(&self, index: u32) -> Option<&Multiname> {
        if index == 0 {
            return None;
        }
        self.multinames.get(index as usize)
    }

    /// Local name referenced by the multiname at `index`.
    ///
    /// A parameterized type resolves to its base type's name; index 0 is the `*` type.
    #[must_use]
    pub fn multiname_name(&self, index: u32) -> Option<&str> {
        let mut index = index;
        // parameterized types may nest; bound the walk against cyclic input
        for _ in 0..8 {
            if index == 0 {
                return Some("*");
            }
            match self.multiname(index)? {
                Multiname::TypeName { base, .. } => index = *base,
                multiname => return self.string(multiname.name_index()?),
            }
        }
        None
    }

    /// The single namespace a multiname resolves against.
    ///
    /// For `QName` that is its namespace; for namespace-set records it is the first
    /// namespace of the set.
    #[must_use]
    pub fn multiname_namespace(&self, index: u32) -> Option<u32> {
        let multiname = self.multiname(index)?;
        if let Some(namespace) = multiname.namespace_index() {
            return Some(namespace);
        }
        let set = self.namespace_sets.get(multiname.namespace_set_index()? as usize)?;
        set.first().copied()
    }

    /// Indices of every multiname whose local name equals `name`, in table order.
    pub fn multinames_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = u32> + 'a {
        self.multinames
            .iter()
            .enumerate()
            .skip(1)
            .filter(move |(_, multiname)| {
                multiname
                    .name_index()
                    .and_then(|index| self.string(index))
                    .is_some_and(|value| value == name)
            })
            .filter_map(|(index, _)| u32::try_from(index).ok())
    }

    /// Index of the first string equal to `value`.
    #[must_use]
    pub fn find_string(&self, value: &str) -> Option<u32> {
        self.strings
            .iter()
            .skip(1)
            .position(|s| s == value)
            .and_then(|position| u32::try_from(position + 1).ok())
    }

    /// Look up or insert a string constant, returning its index.
    ///
    /// Within one patch session the same value always yields the same index. While the
    /// pool is in no-recycle mode every call appends a fresh slot.
    pub fn intern_string(&mut self, value: &str) -> u32 {
        self.string_cache.intern(&mut self.strings, value.to_string())
    }

    /// Look up or insert an integer constant, returning its index.
    pub fn intern_integer(&mut self, value: i32) -> u32 {
        self.integer_cache.intern(&mut self.integers, value)
    }

    /// Overwrite the string stored at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is 0 or past the end of the table.
    pub fn set_string(&mut self, index: u32, value: &str) -> Result<()> {
        if index == 0 {
            return Err(crate::Error::OutOfBounds);
        }
        let Some(slot) = self.strings.get_mut(index as usize) else {
            return Err(crate::Error::OutOfBounds);
        };

        *slot = value.to_string();
        self.string_cache.forget_index(index);
        Ok(())
    }

    /// Enable or disable slot reuse for interned constants.
    ///
    /// Identifier sanitization disables reuse so that no generated name can alias a slot
    /// that another pass may rewrite.
    pub fn set_recycle(&mut self, recycle: bool) {
        self.string_cache.set_recycle(recycle);
        self.integer_cache.set_recycle(recycle);
    }

    /// Whether interned constants may reuse existing slots.
    #[must_use]
    pub fn recycles(&self) -> bool {
        self.string_cache.recycles()
    }

    /// Add a namespace entry, returning its index.
    pub fn add_namespace(&mut self, namespace: Namespace) -> u32 {
        self.namespaces.push(namespace);
        last_index(&self.namespaces)
    }

    /// Add a multiname entry, returning its index.
    pub fn add_multiname(&mut self, multiname: Multiname) -> u32 {
        self.multinames.push(multiname);
        last_index(&self.multinames)
    }

    /// Add a namespace set, returning its index.
    pub fn add_namespace_set(&mut self, set: Vec<u32>) -> u32 {
        self.namespace_sets.push(set);
        last_index(&self.namespace_sets)
    }
}

pub(crate) fn last_index<T>(table: &[T]) -> u32 {
    u32::try_from(table.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> ConstantPool {
        let mut pool = ConstantPool::default();
        let public = pool.intern_string("");
        let name = pool.intern_string("Boolean");
        let ns = pool.add_namespace(Namespace {
            kind: NamespaceKind::Package,
            name: public,
        });
        pool.add_multiname(Multiname::QName {
            namespace: ns,
            name,
            attribute: false,
        });
        let set = pool.add_namespace_set(vec![ns]);
        pool.add_multiname(Multiname::Multiname {
            name,
            namespace_set: set,
            attribute: false,
        });
        pool
    }

    #[test]
    fn test_pool_roundtrip() {
        let mut pool = sample_pool();
        pool.intern_integer(-5);
        pool.uintegers.push(7);
        pool.doubles.push(1.5);
        pool.add_multiname(Multiname::TypeName {
            base: 1,
            parameters: vec![2],
        });

        let mut writer = Writer::new();
        pool.write(&mut writer);
        let bytes = writer.into_inner();

        let reparsed = ConstantPool::read(&mut Parser::new(&bytes)).unwrap();
        assert_eq!(reparsed.strings, pool.strings);
        assert_eq!(reparsed.integers, pool.integers);
        assert_eq!(reparsed.multinames, pool.multinames);

        let mut writer = Writer::new();
        reparsed.write(&mut writer);
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn test_zero_count_tables_roundtrip() {
        // every table written with count 0
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let pool = ConstantPool::read(&mut Parser::new(&bytes)).unwrap();
        assert_eq!(pool.strings.len(), 1);

        let mut writer = Writer::new();
        pool.write(&mut writer);
        assert_eq!(writer.as_slice(), &bytes);
    }

    #[test]
    fn test_multiname_lookups() {
        let pool = sample_pool();

        assert_eq!(pool.multiname_name(1), Some("Boolean"));
        assert_eq!(pool.multiname_name(0), Some("*"));
        assert_eq!(pool.multiname_namespace(1), Some(1));
        assert_eq!(pool.multiname_namespace(2), Some(1));
        assert_eq!(pool.multinames_named("Boolean").collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(pool.namespace_name(1), Some(""));
    }

    #[test]
    fn test_unknown_multiname_kind() {
        // one multiname of kind 0x42
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x42];
        let result = ConstantPool::read(&mut Parser::new(&bytes));
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));
    }

    #[test]
    fn test_set_string_bounds() {
        let mut pool = sample_pool();
        assert!(pool.set_string(0, "x").is_err());
        assert!(pool.set_string(99, "x").is_err());

        pool.set_string(2, "Object").unwrap();
        assert_eq!(pool.multiname_name(1), Some("Object"));
    }
}
