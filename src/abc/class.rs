//! Instances, classes, scripts and metadata entries.

use bitflags::bitflags;

use crate::{
    abc::traits::{read_traits, write_traits, Trait},
    file::{parser::Parser, writer::Writer},
    Result,
};

bitflags! {
    /// Flags byte of an instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstanceFlags: u8 {
        /// Properties cannot be added at runtime
        const SEALED = 0x01;
        /// Cannot be subclassed
        const FINAL = 0x02;
        /// Is an interface
        const INTERFACE = 0x04;
        /// A protected namespace index follows the flags
        const PROTECTED_NS = 0x08;
    }
}

/// The object side of a class: what `new` creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Multiname index of the class name (a `QName`)
    pub name: u32,
    /// Multiname index of the base class (0 = none)
    pub super_name: u32,
    /// Flags
    pub flags: InstanceFlags,
    /// Namespace index of the protected namespace, with [`InstanceFlags::PROTECTED_NS`]
    pub protected_ns: u32,
    /// Multiname indices of implemented interfaces
    pub interfaces: Vec<u32>,
    /// Method index of the constructor
    pub constructor: u32,
    /// Instance traits
    pub traits: Vec<Trait>,
}

impl Instance {
    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let name = parser.read_u30()?;
        let super_name = parser.read_u30()?;
        let flags = InstanceFlags::from_bits_retain(parser.read_le::<u8>()?);
        let protected_ns = if flags.contains(InstanceFlags::PROTECTED_NS) {
            parser.read_u30()?
        } else {
            0
        };

        let count = parser.read_index()?;
        let mut interfaces = Vec::with_capacity(count.min(parser.remaining()));
        for _ in 0..count {
            interfaces.push(parser.read_u30()?);
        }

        let constructor = parser.read_u30()?;
        let traits = read_traits(parser)?;

        Ok(Instance {
            name,
            super_name,
            flags,
            protected_ns,
            interfaces,
            constructor,
            traits,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.name);
        writer.write_u30(self.super_name);
        writer.write_le(self.flags.bits());
        if self.flags.contains(InstanceFlags::PROTECTED_NS) {
            writer.write_u30(self.protected_ns);
        }
        writer.write_index(self.interfaces.len());
        for interface in &self.interfaces {
            writer.write_u30(*interface);
        }
        writer.write_u30(self.constructor);
        write_traits(writer, &self.traits);
    }
}

/// The static side of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// Method index of the static initializer
    pub initializer: u32,
    /// Static traits
    pub traits: Vec<Trait>,
}

impl Class {
    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        Ok(Class {
            initializer: parser.read_u30()?,
            traits: read_traits(parser)?,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.initializer);
        write_traits(writer, &self.traits);
    }
}

/// A script: the top-level initializer and the definitions it exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Method index of the script initializer
    pub initializer: u32,
    /// Script traits
    pub traits: Vec<Trait>,
}

impl Script {
    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        Ok(Script {
            initializer: parser.read_u30()?,
            traits: read_traits(parser)?,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.initializer);
        write_traits(writer, &self.traits);
    }
}

/// A metadata entry: a name and key/value string pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// String index of the entry name
    pub name: u32,
    /// `(key, value)` string indices; key 0 marks a keyless value
    pub items: Vec<(u32, u32)>,
}

impl Metadata {
    // Compilers emit every key first and every value after; the pairs are rebuilt here.
    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let name = parser.read_u30()?;
        let count = parser.read_index()?;

        let mut keys = Vec::with_capacity(count.min(parser.remaining()));
        for _ in 0..count {
            keys.push(parser.read_u30()?);
        }
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            items.push((key, parser.read_u30()?));
        }

        Ok(Metadata { name, items })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.name);
        writer.write_index(self.items.len());
        for (key, _) in &self.items {
            writer.write_u30(*key);
        }
        for (_, value) in &self.items {
            writer.write_u30(*value);
        }
    }
}
