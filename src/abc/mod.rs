//! The bytecode unit model.
//!
//! A movie embeds one or more bytecode units (one per `DoABC` tag). Each unit is
//! self-contained: its own constant pool, method signatures, classes and method bodies, all
//! cross-referenced by index. [`AbcFile`] decodes a unit into plain tables and encodes it back;
//! writing an unmodified unit reproduces its input bytes exactly.
//!
//! # Key Components
//!
//! - [`AbcFile`] - One decoded unit
//! - [`ConstantPool`] - Strings, numbers, namespaces and multinames
//! - [`MethodInfo`] / [`MethodBody`] - Signatures and code
//! - [`Instance`] / [`Class`] - The two sides of a class definition
//! - [`Trait`] - Declared members
//!
//! # Examples
//!
//! ```rust,no_run
//! use abcpatch::abc::AbcFile;
//!
//! let bytes = std::fs::read("unit.abc")?;
//! let unit = AbcFile::parse(&bytes)?;
//! for class in 0..unit.instances.len() {
//!     println!("{}", unit.class_name(class).unwrap_or("<unnamed>"));
//! }
//! assert_eq!(unit.to_bytes(), bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod class;
mod method;
mod pool;
mod traits;

pub use class::{Class, Instance, InstanceFlags, Metadata, Script};
pub use method::{ExceptionInfo, MethodBody, MethodFlags, MethodInfo, OptionDetail, Parameter};
pub use pool::{ConstantPool, Multiname, Namespace, NamespaceKind};
pub use traits::{Trait, TraitAttributes, TraitKind};

use std::collections::HashMap;

use crate::{
    abc::pool::last_index,
    file::{parser::Parser, writer::Writer},
    Result,
};

/// The only major format version the virtual machine accepts.
pub const MAJOR_VERSION: u16 = 46;

/// One decoded bytecode unit.
///
/// The class tables are parallel: `instances[i]` and `classes[i]` are the object and static
/// sides of class `i`.
#[derive(Debug, Clone)]
pub struct AbcFile {
    /// Minor format version
    pub minor_version: u16,
    /// Major format version
    pub major_version: u16,
    /// Constant pool
    pub pool: ConstantPool,
    /// Method signatures
    pub methods: Vec<MethodInfo>,
    /// Metadata entries
    pub metadata: Vec<Metadata>,
    /// Object sides of the classes
    pub instances: Vec<Instance>,
    /// Static sides of the classes
    pub classes: Vec<Class>,
    /// Scripts
    pub scripts: Vec<Script>,
    bodies: Vec<MethodBody>,
    body_lookup: HashMap<u32, usize>,
    trailing: Vec<u8>,
}

impl Default for AbcFile {
    fn default() -> Self {
        AbcFile {
            minor_version: 16,
            major_version: MAJOR_VERSION,
            pool: ConstantPool::default(),
            methods: Vec::new(),
            metadata: Vec::new(),
            instances: Vec::new(),
            classes: Vec::new(),
            scripts: Vec::new(),
            bodies: Vec::new(),
            body_lookup: HashMap::new(),
            trailing: Vec::new(),
        }
    }
}

fn read_list<T>(parser: &mut Parser, read: impl Fn(&mut Parser) -> Result<T>) -> Result<Vec<T>> {
    let count = parser.read_index()?;
    let mut list = Vec::with_capacity(count.min(parser.remaining()));
    for _ in 0..count {
        list.push(read(parser)?);
    }
    Ok(list)
}

impl AbcFile {
    /// Decode a bytecode unit.
    ///
    /// Bytes after the last method body are kept and written back untouched.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::NotSupported`] for a
    /// major version other than [`MAJOR_VERSION`], [`crate::Error::OutOfBounds`] for truncated
    /// input and [`crate::Error::Malformed`] for invalid tables.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        let mut parser = Parser::new(data);
        let minor_version = parser.read_le::<u16>()?;
        let major_version = parser.read_le::<u16>()?;
        if major_version != MAJOR_VERSION {
            return Err(crate::Error::NotSupported);
        }
        let pool = ConstantPool::read(&mut parser)?;
        let methods = read_list(&mut parser, MethodInfo::read)?;
        let metadata = read_list(&mut parser, Metadata::read)?;

        let class_count = parser.read_index()?;
        let mut instances = Vec::with_capacity(class_count.min(parser.remaining()));
        for _ in 0..class_count {
            instances.push(Instance::read(&mut parser)?);
        }
        let mut classes = Vec::with_capacity(class_count.min(parser.remaining()));
        for _ in 0..class_count {
            classes.push(Class::read(&mut parser)?);
        }

        let scripts = read_list(&mut parser, Script::read)?;
        let bodies = read_list(&mut parser, MethodBody::read)?;
        let trailing = parser.read_rest().to_vec();

        let mut unit = AbcFile {
            minor_version,
            major_version,
            pool,
            methods,
            metadata,
            instances,
            classes,
            scripts,
            bodies,
            body_lookup: HashMap::new(),
            trailing,
        };
        unit.index_bodies();
        Ok(unit)
    }

    /// Encode the unit.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.bodies.iter().map(|b| b.code.len()).sum());

        writer.write_le(self.minor_version);
        writer.write_le(self.major_version);
        self.pool.write(&mut writer);

        writer.write_index(self.methods.len());
        for method in &self.methods {
            method.write(&mut writer);
        }
        writer.write_index(self.metadata.len());
        for entry in &self.metadata {
            entry.write(&mut writer);
        }

        writer.write_index(self.instances.len());
        for instance in &self.instances {
            instance.write(&mut writer);
        }
        for class in &self.classes {
            class.write(&mut writer);
        }

        writer.write_index(self.scripts.len());
        for script in &self.scripts {
            script.write(&mut writer);
        }
        writer.write_index(self.bodies.len());
        for body in &self.bodies {
            body.write(&mut writer);
        }
        writer.write_bytes(&self.trailing);

        writer.into_inner()
    }

    fn index_bodies(&mut self) {
        self.body_lookup = self
            .bodies
            .iter()
            .enumerate()
            .map(|(position, body)| (body.method, position))
            .collect();
    }

    /// All method bodies, in file order.
    #[must_use]
    pub fn bodies(&self) -> &[MethodBody] {
        &self.bodies
    }

    /// All method bodies, mutably. The `method` field of a body must not be changed.
    pub fn bodies_mut(&mut self) -> &mut [MethodBody] {
        &mut self.bodies
    }

    /// Body of the method at `method`, if it has one.
    #[must_use]
    pub fn body(&self, method: u32) -> Option<&MethodBody> {
        self.body_lookup
            .get(&method)
            .and_then(|position| self.bodies.get(*position))
    }

    /// Body of the method at `method`, mutably.
    pub fn body_mut(&mut self, method: u32) -> Option<&mut MethodBody> {
        let position = *self.body_lookup.get(&method)?;
        self.bodies.get_mut(position)
    }

    /// Append a method signature, returning its index.
    pub fn add_method(&mut self, method: MethodInfo) -> u32 {
        self.methods.push(method);
        last_index(&self.methods)
    }

    /// Append a method body; a previous body for the same method is shadowed.
    pub fn add_body(&mut self, body: MethodBody) {
        let method = body.method;
        self.bodies.push(body);
        self.body_lookup.insert(method, self.bodies.len() - 1);
    }

    /// Local name of class `class`.
    #[must_use]
    pub fn class_name(&self, class: usize) -> Option<&str> {
        let instance = self.instances.get(class)?;
        self.pool.multiname_name(instance.name)
    }

    /// Indices of the classes whose local name is `name`, in declaration order.
    pub fn find_classes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        (0..self.instances.len()).filter(move |class| self.class_name(*class) == Some(name))
    }

    /// Index of the first class whose local name is `name`.
    #[must_use]
    pub fn find_class(&self, name: &str) -> Option<usize> {
        self.find_classes(name).next()
    }

    /// Local name of a trait.
    #[must_use]
    pub fn trait_name(&self, entry: &Trait) -> Option<&str> {
        self.pool.multiname_name(entry.name)
    }

    /// Local name of the return type of `method`.
    #[must_use]
    pub fn return_type_name(&self, method: u32) -> Option<&str> {
        let info = self.methods.get(method as usize)?;
        self.pool.multiname_name(info.return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::UnitBuilder;

    #[test]
    fn test_unit_roundtrip() {
        let unit = UnitBuilder::new()
            .class("HabboMessages", |class| {
                class
                    .slot("_-1", "Dictionary")
                    .method("toArray", &[], "Array", &[0xD0, 0x30, 0x2C, 0x01, 0x48])
            })
            .build();

        let bytes = unit.to_bytes();
        let reparsed = AbcFile::parse(&bytes).unwrap();

        assert_eq!(reparsed.to_bytes(), bytes);
        assert_eq!(reparsed.find_class("HabboMessages"), Some(0));
        assert_eq!(reparsed.class_name(0), Some("HabboMessages"));
    }

    #[test]
    fn test_trailing_bytes_are_kept() {
        let mut bytes = UnitBuilder::new().build().to_bytes();
        bytes.extend_from_slice(&[0xDE, 0xAD]);

        let unit = AbcFile::parse(&bytes).unwrap();
        assert_eq!(unit.to_bytes(), bytes);
    }

    #[test]
    fn test_body_lookup() {
        let unit = UnitBuilder::new()
            .class("KeyObfuscator", |class| {
                class.method("_-2", &[], "String", &[0x2C, 0x01, 0x48])
            })
            .build();

        let method = unit.instances[0].traits[0].method().unwrap();
        assert_eq!(unit.return_type_name(method), Some("String"));
        assert_eq!(unit.body(method).unwrap().code, vec![0x2C, 0x01, 0x48]);
        assert!(unit.body(999).is_none());
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(AbcFile::parse(&[]), Err(crate::Error::Empty)));
    }

    #[test]
    fn test_parse_unknown_major_version() {
        let data = [0x10, 0x00, 0x2F, 0x00];
        assert!(matches!(AbcFile::parse(&data), Err(crate::Error::NotSupported)));
    }
}
