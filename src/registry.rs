//! Recovery of the message header tables.
//!
//! The client registers every network message in the static initializer of one class. Each
//! registration compiles to the same three loads:
//!
//! ```text
//! getlex       <inbound or outbound map>
//! pushshort    <header>                  ; pushbyte for headers below 128
//! getlex       <message class>
//! ```
//!
//! interleaved with stores and other noise. Filtering the stream down to those three opcodes
//! and reading it in groups of three yields one registration per group. The first load
//! decides the direction by comparing against the names of the class's first two static
//! slots (inbound first, outbound second).
//!
//! One outbound message is special: the handshake message with the revision header carries
//! the client revision as the first string its `toArray` method pushes. That string's pool
//! slot is remembered so the revision can be read and rewritten in place.

use std::{collections::BTreeMap, fmt::Write as _};

use crate::{
    abc::AbcFile,
    assembly::{decode_code, opcodes, Instruction, Operand},
    events::{EventKind, EventLog, MethodRef},
    locator::{find_method, MethodSignature, TraitOwner},
    Error, Result,
};

/// Direction of a network message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Direction {
    /// Sent by the server
    #[strum(serialize = "Incoming")]
    Inbound,
    /// Sent by the client
    #[strum(serialize = "Outgoing")]
    Outbound,
}

/// Header tables of one client build.
///
/// Values are class indices into the unit the registry was extracted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRegistry {
    /// Server-to-client messages by header
    pub inbound: BTreeMap<u16, usize>,
    /// Client-to-server messages by header
    pub outbound: BTreeMap<u16, usize>,
    /// String pool slot holding the client revision
    pub revision_slot: Option<u32>,
}

impl MessageRegistry {
    /// Extract the registry from the static initializer of class `class` in `unit`.
    ///
    /// `revision_header` is the outbound header whose message carries the revision string.
    /// Triplets that do not resolve (unknown map, header out of range, unknown class) are
    /// skipped with a warning.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when the class, its two static map slots or its
    /// initializer body are missing, and a decoding error when the initializer code is
    /// malformed.
    pub fn extract(
        unit: &AbcFile,
        unit_index: usize,
        class: usize,
        revision_header: u16,
        events: &EventLog,
    ) -> Result<Self> {
        let definition = unit
            .classes
            .get(class)
            .ok_or_else(|| Error::NotFound(format!("message class {class}")))?;
        let (Some(inbound_map), Some(outbound_map)) = (definition.traits.first(), definition.traits.get(1))
        else {
            return Err(Error::NotFound("inbound and outbound map slots".to_string()));
        };
        let body = unit
            .body(definition.initializer)
            .ok_or_else(|| Error::NotFound("message class initializer".to_string()))?;

        let registrations: Vec<Instruction> = decode_code(&body.code)?
            .into_iter()
            .filter(|i| matches!(i.opcode, opcodes::GETLEX | opcodes::PUSHSHORT | opcodes::PUSHBYTE))
            .collect();

        // runtime multinames have no name to compare
        let same_map = |index: u32, slot: u32| {
            index == slot
                || matches!(
                    (unit.pool.multiname_name(index), unit.pool.multiname_name(slot)),
                    (Some(name), Some(map)) if name == map
                )
        };

        let mut registry = MessageRegistry::default();
        let origin = MethodRef::new(unit_index, definition.initializer);
        for group in registrations.chunks_exact(3) {
            let (map, header, target) = (&group[0], &group[1], &group[2]);
            if map.opcode != opcodes::GETLEX || target.opcode != opcodes::GETLEX {
                log::warn!("Skipping misaligned registration at 0x{:X}", map.offset);
                continue;
            }
            let direction = match map.index() {
                Some(index) if same_map(index, inbound_map.name) => Direction::Inbound,
                Some(index) if same_map(index, outbound_map.name) => Direction::Outbound,
                _ => {
                    log::warn!("Registration at 0x{:X} uses an unknown map", map.offset);
                    continue;
                }
            };
            let Some(header) = header_value(header) else {
                log::warn!("Registration at 0x{:X} has no 16-bit header", map.offset);
                continue;
            };
            let Some(message) = target
                .index()
                .and_then(|index| unit.pool.multiname_name(index))
                .and_then(|name| unit.find_class(name))
            else {
                log::warn!("{direction}[{header}] names no class in this unit");
                continue;
            };

            let table = match direction {
                Direction::Inbound => &mut registry.inbound,
                Direction::Outbound => &mut registry.outbound,
            };
            if table.insert(header, message).is_some() {
                log::debug!("{direction}[{header}] registered twice; keeping the last");
            }

            if direction == Direction::Outbound && header == revision_header {
                registry.revision_slot = revision_slot(unit, message, events);
                if let Some(slot) = registry.revision_slot {
                    events
                        .record(EventKind::RevisionSlotFound)
                        .method(origin)
                        .message(format!("revision stored in string {slot}"));
                }
            }
        }

        events.record(EventKind::MessageRegistered).method(origin).message(format!(
            "{} incoming, {} outgoing",
            registry.inbound.len(),
            registry.outbound.len()
        ));
        Ok(registry)
    }

    /// Class registered for `header` in `direction`.
    #[must_use]
    pub fn message(&self, direction: Direction, header: u16) -> Option<usize> {
        self.table(direction).get(&header).copied()
    }

    /// Header table of one direction.
    #[must_use]
    pub fn table(&self, direction: Direction) -> &BTreeMap<u16, usize> {
        match direction {
            Direction::Inbound => &self.inbound,
            Direction::Outbound => &self.outbound,
        }
    }

    /// Total number of registered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }

    /// Whether no message was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }

    /// Render `Outgoing[<header>] = <class>` lines, then the incoming ones, each in ascending
    /// header order.
    #[must_use]
    pub fn dump(&self, unit: &AbcFile) -> String {
        let mut out = String::new();
        for direction in [Direction::Outbound, Direction::Inbound] {
            for (header, class) in self.table(direction) {
                let name = unit.class_name(*class).unwrap_or("?");
                let _ = writeln!(out, "{direction}[{header}] = {name}");
            }
        }
        out
    }
}

fn header_value(instruction: &Instruction) -> Option<u16> {
    match (instruction.opcode, &instruction.operand) {
        // pushbyte sign-extends its operand
        (opcodes::PUSHBYTE, Operand::Byte(value)) => u16::try_from(i16::from(*value as i8)).ok(),
        (opcodes::PUSHSHORT, Operand::Index(value)) => u16::try_from(*value).ok(),
        _ => None,
    }
}

/// First string pushed by the zero-argument `Array` method of message class `class`.
fn revision_slot(unit: &AbcFile, class: usize, events: &EventLog) -> Option<u32> {
    let to_array = find_method(
        unit,
        TraitOwner::Instance(class),
        &MethodSignature::new().param_count(0).returns("Array"),
        events,
    )?;
    let body = unit.body(to_array.method)?;
    decode_code(&body.code)
        .ok()?
        .iter()
        .find(|i| i.opcode == opcodes::PUSHSTRING)
        .and_then(Instruction::index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{abc::Multiname, test::UnitBuilder};

    const REVISION: &str = "PRODUCTION-201709192204-203982672";

    fn messages_unit() -> AbcFile {
        let mut builder = UnitBuilder::new();
        let revision = builder.string(REVISION);
        let incoming = builder.qname("_-in");
        let outgoing = builder.qname("_-out");
        let class_x = builder.qname("ClientHelloMessageComposer");
        let class_y = builder.qname("PingMessageEvent");
        let class_z = builder.qname("UserObjectEvent");

        #[rustfmt::skip]
        let cinit = vec![
            0xD0, 0x30,
            0x60, outgoing as u8, 0x25, 0xA0, 0x1F, 0x60, class_x as u8, 0x61, 0x00, // out[4000] = X
            0x60, incoming as u8, 0x25, 0xF4, 0x03, 0x60, class_z as u8, 0x61, 0x00, // in[500] = Z
            0x60, incoming as u8, 0x24, 0x0A, 0x60, class_y as u8, 0x61, 0x00,       // in[10] = Y
            0x47,
        ];

        builder
            .class("HabboMessages", |c| {
                c.static_slot("_-in", "Dictionary")
                    .static_slot("_-out", "Dictionary")
                    .static_init(&cinit)
            })
            .class("ClientHelloMessageComposer", |c| {
                c.method("dispose", &[], "void", &[0x47]).method(
                    "getMessageArray",
                    &[],
                    "Array",
                    &[0xD0, 0x30, 0x2C, revision as u8, 0x56, 0x01, 0x48],
                )
            })
            .class("PingMessageEvent", |c| c)
            .class("UserObjectEvent", |c| c)
            .build()
    }

    #[test]
    fn test_extract_registry() {
        let unit = messages_unit();
        let events = EventLog::new();
        let registry = MessageRegistry::extract(&unit, 2, 0, 4000, &events).unwrap();

        assert_eq!(registry.outbound.len(), 1);
        assert_eq!(registry.message(Direction::Outbound, 4000), Some(1));
        assert_eq!(registry.message(Direction::Inbound, 10), Some(2));
        assert_eq!(registry.message(Direction::Inbound, 500), Some(3));
        assert_eq!(registry.len(), 3);

        let slot = registry.revision_slot.unwrap();
        assert_eq!(unit.pool.string(slot), Some(REVISION));
        assert!(events.has(EventKind::RevisionSlotFound));
        assert_eq!(events.count_kind(EventKind::MessageRegistered), 1);
    }

    #[test]
    fn test_inbound_headers_ascend() {
        let unit = messages_unit();
        let registry = MessageRegistry::extract(&unit, 2, 0, 4000, &EventLog::new()).unwrap();

        let headers: Vec<u16> = registry.inbound.keys().copied().collect();
        assert_eq!(headers, vec![10, 500]);
        assert_eq!(
            registry.dump(&unit),
            "Outgoing[4000] = ClientHelloMessageComposer\n\
             Incoming[10] = PingMessageEvent\n\
             Incoming[500] = UserObjectEvent\n"
        );
    }

    #[test]
    fn test_missing_map_slots() {
        let unit = UnitBuilder::new()
            .class("HabboMessages", |c| c.static_slot("_-in", "Dictionary"))
            .build();
        let result = MessageRegistry::extract(&unit, 2, 0, 4000, &EventLog::new());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_class_skipped() {
        let mut builder = UnitBuilder::new();
        let incoming = builder.qname("_-in");
        let ghost = builder.qname("NotDeclaredHere");
        let cinit = [0x60, incoming as u8, 0x24, 0x05, 0x60, ghost as u8, 0x47];
        let unit = builder
            .class("HabboMessages", |c| {
                c.static_slot("_-in", "Dictionary")
                    .static_slot("_-out", "Dictionary")
                    .static_init(&cinit)
            })
            .build();

        let registry = MessageRegistry::extract(&unit, 2, 0, 4000, &EventLog::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.revision_slot.is_none());
    }

    #[test]
    fn test_nameless_map_not_matched() {
        let mut builder = UnitBuilder::new();
        let ping = builder.qname("PingMessageEvent");
        let mut unit = builder
            .class("HabboMessages", |c| {
                c.static_slot("_-in", "Dictionary")
                    .static_slot("_-out", "Dictionary")
                    .static_init(&[0x47])
            })
            .class("PingMessageEvent", |c| c)
            .build();
        let first = unit.pool.add_multiname(Multiname::RTQNameL { attribute: false });
        let second = unit.pool.add_multiname(Multiname::RTQNameL { attribute: false });
        unit.classes[0].traits[0].name = first;
        let cinit = unit.classes[0].initializer;
        unit.body_mut(cinit).unwrap().code = vec![0x60, second as u8, 0x24, 0x0A, 0x60, ping as u8, 0x47];

        let registry = MessageRegistry::extract(&unit, 2, 0, 4000, &EventLog::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_header_values() {
        assert_eq!(header_value(&Instruction::with_index(opcodes::PUSHSHORT, 4000)), Some(4000));
        let byte = Instruction {
            offset: 0,
            opcode: opcodes::PUSHBYTE,
            operand: Operand::Byte(0x7F),
        };
        assert_eq!(header_value(&byte), Some(127));
        let negative = Instruction {
            operand: Operand::Byte(0xFF),
            ..byte
        };
        assert_eq!(header_value(&negative), None);
    }
}
