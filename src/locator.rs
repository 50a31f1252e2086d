//! Name-independent lookup of methods and slots.
//!
//! Identifiers in the target client are obfuscated per release, so members are found by
//! shape instead: return and parameter types, frame metrics, or marker instructions in the
//! body. A [`MethodSignature`] lists the criteria; every criterion that is set must match
//! exactly.
//!
//! When several members match, the first in declaration order wins. That is a normal
//! outcome, recorded as [`EventKind::AmbiguousMatch`]; callers that need uniqueness add
//! criteria.
//!
//! # Examples
//!
//! ```rust,no_run
//! use abcpatch::locator::{find_method, MethodSignature, TraitOwner};
//! # fn demo(unit: &abcpatch::abc::AbcFile, events: &abcpatch::events::EventLog) {
//! let habbo = unit.find_class("Habbo").unwrap();
//! let checker = find_method(
//!     unit,
//!     TraitOwner::Instance(habbo),
//!     &MethodSignature::new().returns("Boolean").param("String").param("Object"),
//!     events,
//! );
//! # }
//! ```

use crate::{
    abc::{AbcFile, Trait, TraitKind},
    assembly::{decode_code, opcodes, Operand},
    events::{EventKind, EventLog},
};

/// Which trait list of a class to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitOwner {
    /// Instance traits of class `n`
    Instance(usize),
    /// Static traits of class `n`
    Class(usize),
}

impl TraitOwner {
    /// The traits of this owner in `unit`.
    #[must_use]
    pub fn traits<'a>(&self, unit: &'a AbcFile) -> &'a [Trait] {
        let traits = match *self {
            TraitOwner::Instance(class) => unit.instances.get(class).map(|i| i.traits.as_slice()),
            TraitOwner::Class(class) => unit.classes.get(class).map(|c| c.traits.as_slice()),
        };
        traits.unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParamSpec {
    type_name: String,
    optional: bool,
}

/// Declarative description of a method's shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSignature {
    name: Option<String>,
    trait_id: Option<u32>,
    returns: Option<String>,
    params: Vec<ParamSpec>,
    param_count: Option<usize>,
    max_stack: Option<u32>,
    local_count: Option<u32>,
    init_scope_depth: Option<u32>,
    max_scope_depth: Option<u32>,
    debug_line: Option<u32>,
    pushes_string_in: Vec<String>,
}

impl MethodSignature {
    /// A signature that matches every method.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the local name of the return type (`"void"`, `"*"`, `"Boolean"`, ...).
    #[must_use]
    pub fn returns(mut self, type_name: &str) -> Self {
        self.returns = Some(type_name.to_string());
        self
    }

    /// Append a required parameter type. Once any parameter is given, the parameter list
    /// must match exactly.
    #[must_use]
    pub fn param(mut self, type_name: &str) -> Self {
        self.params.push(ParamSpec {
            type_name: type_name.to_string(),
            optional: false,
        });
        self
    }

    /// Append a parameter type that must carry a default value.
    #[must_use]
    pub fn optional_param(mut self, type_name: &str) -> Self {
        self.params.push(ParamSpec {
            type_name: type_name.to_string(),
            optional: true,
        });
        self
    }

    /// Require the number of parameters, whatever their types.
    #[must_use]
    pub fn param_count(mut self, count: usize) -> Self {
        self.param_count = Some(count);
        self
    }

    /// Require the member name. Only useful for names that survive obfuscation.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Require the dispatch id of the method trait.
    #[must_use]
    pub fn trait_id(mut self, id: u32) -> Self {
        self.trait_id = Some(id);
        self
    }

    /// Require the maximum operand stack depth.
    #[must_use]
    pub fn max_stack(mut self, value: u32) -> Self {
        self.max_stack = Some(value);
        self
    }

    /// Require the local register count.
    #[must_use]
    pub fn local_count(mut self, value: u32) -> Self {
        self.local_count = Some(value);
        self
    }

    /// Require the initial scope depth.
    #[must_use]
    pub fn init_scope_depth(mut self, value: u32) -> Self {
        self.init_scope_depth = Some(value);
        self
    }

    /// Require the maximum scope depth.
    #[must_use]
    pub fn max_scope_depth(mut self, value: u32) -> Self {
        self.max_scope_depth = Some(value);
        self
    }

    /// Require a `debugline` instruction with this line number.
    #[must_use]
    pub fn debug_line(mut self, line: u32) -> Self {
        self.debug_line = Some(line);
        self
    }

    /// Require a `pushstring` whose value is one of `values`.
    #[must_use]
    pub fn pushes_string_in(mut self, values: &[&str]) -> Self {
        self.pushes_string_in = values.iter().map(|v| (*v).to_string()).collect();
        self
    }

    fn needs_body(&self) -> bool {
        self.max_stack.is_some()
            || self.local_count.is_some()
            || self.init_scope_depth.is_some()
            || self.max_scope_depth.is_some()
            || self.needs_code()
    }

    fn needs_code(&self) -> bool {
        self.debug_line.is_some() || !self.pushes_string_in.is_empty()
    }

    /// Whether `entry`, a trait of `unit`, matches every criterion.
    #[must_use]
    pub fn matches(&self, unit: &AbcFile, entry: &Trait) -> bool {
        let TraitKind::Method { disp_id, method } = entry.kind else {
            return false;
        };
        if self.trait_id.is_some_and(|id| id != disp_id) {
            return false;
        }
        if let Some(name) = &self.name {
            if unit.trait_name(entry) != Some(name.as_str()) {
                return false;
            }
        }

        let Some(info) = unit.methods.get(method as usize) else {
            return false;
        };
        if let Some(returns) = &self.returns {
            if unit.pool.multiname_name(info.return_type) != Some(returns.as_str()) {
                return false;
            }
        }
        if self.param_count.is_some_and(|count| count != info.param_types.len()) {
            return false;
        }
        if !self.params.is_empty() {
            if self.params.len() != info.param_types.len() {
                return false;
            }
            let all_match = info.parameters().zip(&self.params).all(|(actual, expected)| {
                actual.optional == expected.optional
                    && unit.pool.multiname_name(actual.type_name) == Some(expected.type_name.as_str())
            });
            if !all_match {
                return false;
            }
        }

        if !self.needs_body() {
            return true;
        }
        let Some(body) = unit.body(method) else {
            return false;
        };
        let metrics = [
            (self.max_stack, body.max_stack),
            (self.local_count, body.local_count),
            (self.init_scope_depth, body.init_scope_depth),
            (self.max_scope_depth, body.max_scope_depth),
        ];
        if metrics
            .iter()
            .any(|(expected, actual)| expected.is_some_and(|value| value != *actual))
        {
            return false;
        }

        if !self.needs_code() {
            return true;
        }
        let Ok(instructions) = decode_code(&body.code) else {
            return false;
        };
        if let Some(line) = self.debug_line {
            let found = instructions
                .iter()
                .any(|i| i.opcode == opcodes::DEBUGLINE && i.operand == Operand::Index(line));
            if !found {
                return false;
            }
        }
        if !self.pushes_string_in.is_empty() {
            let found = instructions
                .iter()
                .filter(|i| i.opcode == opcodes::PUSHSTRING)
                .filter_map(|i| i.index().and_then(|index| unit.pool.string(index)))
                .any(|value| self.pushes_string_in.iter().any(|wanted| wanted == value));
            if !found {
                return false;
            }
        }
        true
    }
}

/// A located method trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodMatch {
    /// Position within the owner's trait list
    pub trait_index: usize,
    /// Dispatch id of the trait
    pub id: u32,
    /// Method signature index
    pub method: u32,
}

/// Every method of `owner` matching `signature`, in declaration order.
#[must_use]
pub fn find_methods(unit: &AbcFile, owner: TraitOwner, signature: &MethodSignature) -> Vec<MethodMatch> {
    owner
        .traits(unit)
        .iter()
        .enumerate()
        .filter(|(_, entry)| signature.matches(unit, entry))
        .filter_map(|(trait_index, entry)| {
            Some(MethodMatch {
                trait_index,
                id: entry.id(),
                method: entry.method()?,
            })
        })
        .collect()
}

/// The first method of `owner` matching `signature`.
///
/// More than one match is recorded in `events` as [`EventKind::AmbiguousMatch`].
pub fn find_method(
    unit: &AbcFile,
    owner: TraitOwner,
    signature: &MethodSignature,
    events: &EventLog,
) -> Option<MethodMatch> {
    let matches = find_methods(unit, owner, signature);
    if matches.len() > 1 {
        log::debug!(
            "{} methods of {:?} match {:?}; using trait {}",
            matches.len(),
            owner,
            signature,
            matches[0].trait_index
        );
        events.record(EventKind::AmbiguousMatch).message(format!(
            "{} methods of {owner:?} match; using trait {}",
            matches.len(),
            matches[0].trait_index
        ));
    }
    matches.first().copied()
}

/// A located slot trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMatch {
    /// Position within the owner's trait list
    pub trait_index: usize,
    /// Multiname index of the slot name
    pub name: u32,
    /// Multiname index of the declared type
    pub type_name: u32,
}

/// Every slot or const of `owner` whose declared type has local name `type_name`.
#[must_use]
pub fn find_slots(unit: &AbcFile, owner: TraitOwner, type_name: &str) -> Vec<SlotMatch> {
    owner
        .traits(unit)
        .iter()
        .enumerate()
        .filter_map(|(trait_index, entry)| {
            let slot_type = entry.slot_type()?;
            (unit.pool.multiname_name(slot_type) == Some(type_name)).then_some(SlotMatch {
                trait_index,
                name: entry.name,
                type_name: slot_type,
            })
        })
        .collect()
}

/// The first slot or const of `owner` whose declared type has local name `type_name`.
#[must_use]
pub fn find_slot(unit: &AbcFile, owner: TraitOwner, type_name: &str) -> Option<SlotMatch> {
    find_slots(unit, owner, type_name).into_iter().next()
}
