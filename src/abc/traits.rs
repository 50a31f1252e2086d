//! Traits: the declared members of classes, instances, scripts and activation scopes.

use bitflags::bitflags;

use crate::{
    file::{parser::Parser, writer::Writer},
    Result,
};

bitflags! {
    /// Attribute bits stored in the high nibble of a trait's kind byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TraitAttributes: u8 {
        /// The member cannot be overridden
        const FINAL = 0x1;
        /// The member overrides an inherited one
        const OVERRIDE = 0x2;
        /// A metadata index list follows the trait data
        const METADATA = 0x4;
    }
}

/// Kind-specific data of a trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitKind {
    /// A variable
    Slot {
        /// Slot position, 0 lets the runtime assign one
        slot_id: u32,
        /// Multiname index of the declared type
        type_name: u32,
        /// Default value as `(pool index, constant kind)`, `None` when absent
        value: Option<(u32, u8)>,
    },
    /// A method
    Method {
        /// Dispatch id, 0 lets the runtime assign one
        disp_id: u32,
        /// Method signature index
        method: u32,
    },
    /// A property getter
    Getter {
        /// Dispatch id
        disp_id: u32,
        /// Method signature index
        method: u32,
    },
    /// A property setter
    Setter {
        /// Dispatch id
        disp_id: u32,
        /// Method signature index
        method: u32,
    },
    /// A nested class binding
    Class {
        /// Slot position
        slot_id: u32,
        /// Class index
        class: u32,
    },
    /// A function closure binding
    Function {
        /// Slot position
        slot_id: u32,
        /// Method signature index
        function: u32,
    },
    /// A constant
    Const {
        /// Slot position
        slot_id: u32,
        /// Multiname index of the declared type
        type_name: u32,
        /// Default value as `(pool index, constant kind)`
        value: Option<(u32, u8)>,
    },
}

/// A declared member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trait {
    /// Multiname index of the member name (always a `QName`)
    pub name: u32,
    /// Attribute bits
    pub attributes: TraitAttributes,
    /// Kind-specific data
    pub kind: TraitKind,
    /// Metadata indices, present when [`TraitAttributes::METADATA`] is set
    pub metadata: Vec<u32>,
}

impl Trait {
    /// Slot id or dispatch id, whichever the kind carries.
    ///
    /// Compilers assign these sequentially in declaration order, which makes them a stable
    /// handle on members whose names are obfuscated.
    #[must_use]
    pub fn id(&self) -> u32 {
        match self.kind {
            TraitKind::Slot { slot_id, .. }
            | TraitKind::Const { slot_id, .. }
            | TraitKind::Class { slot_id, .. }
            | TraitKind::Function { slot_id, .. } => slot_id,
            TraitKind::Method { disp_id, .. }
            | TraitKind::Getter { disp_id, .. }
            | TraitKind::Setter { disp_id, .. } => disp_id,
        }
    }

    /// Method signature index for method, accessor and function traits.
    #[must_use]
    pub fn method(&self) -> Option<u32> {
        match self.kind {
            TraitKind::Method { method, .. }
            | TraitKind::Getter { method, .. }
            | TraitKind::Setter { method, .. } => Some(method),
            TraitKind::Function { function, .. } => Some(function),
            _ => None,
        }
    }

    /// Declared type multiname index for slot and const traits.
    #[must_use]
    pub fn slot_type(&self) -> Option<u32> {
        match self.kind {
            TraitKind::Slot { type_name, .. } | TraitKind::Const { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    fn kind_nibble(&self) -> u8 {
        match self.kind {
            TraitKind::Slot { .. } => 0,
            TraitKind::Method { .. } => 1,
            TraitKind::Getter { .. } => 2,
            TraitKind::Setter { .. } => 3,
            TraitKind::Class { .. } => 4,
            TraitKind::Function { .. } => 5,
            TraitKind::Const { .. } => 6,
        }
    }

    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let name = parser.read_u30()?;
        let kind_byte = parser.read_le::<u8>()?;
        let attributes = TraitAttributes::from_bits_retain(kind_byte >> 4);

        let kind = match kind_byte & 0x0F {
            0 => {
                let (slot_id, type_name, value) = read_slot_data(parser)?;
                TraitKind::Slot {
                    slot_id,
                    type_name,
                    value,
                }
            }
            6 => {
                let (slot_id, type_name, value) = read_slot_data(parser)?;
                TraitKind::Const {
                    slot_id,
                    type_name,
                    value,
                }
            }
            1 => TraitKind::Method {
                disp_id: parser.read_u30()?,
                method: parser.read_u30()?,
            },
            2 => TraitKind::Getter {
                disp_id: parser.read_u30()?,
                method: parser.read_u30()?,
            },
            3 => TraitKind::Setter {
                disp_id: parser.read_u30()?,
                method: parser.read_u30()?,
            },
            4 => TraitKind::Class {
                slot_id: parser.read_u30()?,
                class: parser.read_u30()?,
            },
            5 => TraitKind::Function {
                slot_id: parser.read_u30()?,
                function: parser.read_u30()?,
            },
            other => return Err(malformed_error!("Unknown trait kind {}", other)),
        };

        let mut metadata = Vec::new();
        if attributes.contains(TraitAttributes::METADATA) {
            let count = parser.read_index()?;
            metadata.reserve(count.min(parser.remaining()));
            for _ in 0..count {
                metadata.push(parser.read_u30()?);
            }
        }

        Ok(Trait {
            name,
            attributes,
            kind,
            metadata,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.name);
        writer.write_le((self.attributes.bits() << 4) | self.kind_nibble());

        match &self.kind {
            TraitKind::Slot {
                slot_id,
                type_name,
                value,
            }
            | TraitKind::Const {
                slot_id,
                type_name,
                value,
            } => {
                writer.write_u30(*slot_id);
                writer.write_u30(*type_name);
                match value {
                    Some((index, kind)) => {
                        writer.write_u30(*index);
                        writer.write_le(*kind);
                    }
                    None => writer.write_u30(0),
                }
            }
            TraitKind::Method { disp_id, method }
            | TraitKind::Getter { disp_id, method }
            | TraitKind::Setter { disp_id, method } => {
                writer.write_u30(*disp_id);
                writer.write_u30(*method);
            }
            TraitKind::Class { slot_id, class } => {
                writer.write_u30(*slot_id);
                writer.write_u30(*class);
            }
            TraitKind::Function { slot_id, function } => {
                writer.write_u30(*slot_id);
                writer.write_u30(*function);
            }
        }

        if self.attributes.contains(TraitAttributes::METADATA) {
            writer.write_index(self.metadata.len());
            for index in &self.metadata {
                writer.write_u30(*index);
            }
        }
    }
}

fn read_slot_data(parser: &mut Parser) -> Result<(u32, u32, Option<(u32, u8)>)> {
    let slot_id = parser.read_u30()?;
    let type_name = parser.read_u30()?;
    let index = parser.read_u30()?;
    let value = if index == 0 {
        None
    } else {
        Some((index, parser.read_le::<u8>()?))
    };
    Ok((slot_id, type_name, value))
}

pub(crate) fn read_traits(parser: &mut Parser) -> Result<Vec<Trait>> {
    let count = parser.read_index()?;
    let mut traits = Vec::with_capacity(count.min(parser.remaining()));
    for _ in 0..count {
        traits.push(Trait::read(parser)?);
    }
    Ok(traits)
}

pub(crate) fn write_traits(writer: &mut Writer, traits: &[Trait]) {
    writer.write_index(traits.len());
    for entry in traits {
        entry.write(writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_slot_with_value() {
        // name 3, slot kind, slot 2, type 4, value index 5 of kind 0x01 (utf8)
        let data = [0x03, 0x00, 0x02, 0x04, 0x05, 0x01];
        let parsed = Trait::read(&mut Parser::new(&data)).unwrap();

        assert_eq!(parsed.id(), 2);
        assert_eq!(parsed.slot_type(), Some(4));
        assert_eq!(
            parsed.kind,
            TraitKind::Slot {
                slot_id: 2,
                type_name: 4,
                value: Some((5, 0x01))
            }
        );

        let mut writer = Writer::new();
        parsed.write(&mut writer);
        assert_eq!(writer.as_slice(), &data);
    }

    #[test]
    fn test_trait_method_with_metadata() {
        // name 1, method kind with FINAL | METADATA, disp 7, method 9, one metadata entry 0
        let data = [0x01, 0x51, 0x07, 0x09, 0x01, 0x00];
        let parsed = Trait::read(&mut Parser::new(&data)).unwrap();

        assert_eq!(parsed.id(), 7);
        assert_eq!(parsed.method(), Some(9));
        assert!(parsed.attributes.contains(TraitAttributes::FINAL));
        assert_eq!(parsed.metadata, vec![0]);

        let mut writer = Writer::new();
        parsed.write(&mut writer);
        assert_eq!(writer.as_slice(), &data);
    }

    #[test]
    fn test_trait_unknown_kind() {
        let data = [0x01, 0x07, 0x00, 0x00];
        assert!(matches!(
            Trait::read(&mut Parser::new(&data)),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
