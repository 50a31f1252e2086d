//! Host prepender removal.
//!
//! The communication manager rewrites the server host it connects to and mangles the port
//! values in its connect method. The patch makes the connect method first assign the host
//! from the `connection.info.host` property to the manager's host slot, and replaces every
//! integer it pushes with a fixed port value.

use crate::{
    abc::{ConstantPool, MethodBody},
    assembly::{opcodes, Instruction, Operand},
    config::GameLayout,
    events::{EventKind, EventLog, MethodRef},
    file::movie::Movie,
    locator::{find_method, find_slot, MethodSignature, TraitOwner},
    Error, Result,
};

use super::{class, commit, stage, unit, unit_mut};

/// Everything the host patch needs, resolved up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTargets {
    /// The connect method
    pub connect: MethodRef,
    /// Multiname of the manager's first `String` slot
    pub host_slot: u32,
    /// Multiname of `getProperty`
    pub get_property: u32,
}

/// Resolve the connect method, the host slot and the `getProperty` name.
///
/// The connect method is the one the last `callpropvoid` of the manager's init method calls.
///
/// # Errors
/// Returns [`Error::NotFound`] for any missing piece and decoding errors for malformed init
/// code.
pub fn locate(movie: &Movie, layout: &GameLayout, events: &EventLog) -> Result<HostTargets> {
    let index = layout.communication_unit;
    let abc = unit(movie, index)?;
    let manager = TraitOwner::Instance(class(abc, &layout.communication_manager_class)?);

    let host_slot = find_slot(abc, manager, "String")
        .ok_or_else(|| Error::NotFound("String slot on the communication manager".to_string()))?
        .name;
    let get_property = abc
        .pool
        .multinames_named("getProperty")
        .next()
        .ok_or_else(|| Error::NotFound("getProperty name".to_string()))?;

    let void_method = || MethodSignature::new().param_count(0).returns("void");
    let init = find_method(abc, manager, &void_method().named(&layout.init_method), events)
        .ok_or_else(|| Error::NotFound(layout.init_method.clone()))?;
    let init_code = abc
        .body(init.method)
        .ok_or_else(|| Error::NotFound(format!("{} body", layout.init_method)))?;
    let connect_name = crate::assembly::decode_code(&init_code.code)?
        .iter()
        .rev()
        .find(|i| i.opcode == opcodes::CALLPROPVOID)
        .and_then(|i| match i.operand {
            Operand::IndexPair(name, _) => abc.pool.multiname_name(name),
            _ => None,
        })
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound(format!("call in {}", layout.init_method)))?;
    let connect = find_method(abc, manager, &void_method().named(&connect_name), events)
        .ok_or_else(|| Error::NotFound(format!("connect method {connect_name}")))?;

    Ok(HostTargets {
        connect: MethodRef::new(index, connect.method),
        host_slot,
        get_property,
    })
}

/// The host edit, staged against a movie and not yet committed.
#[derive(Debug)]
pub struct StagedHost {
    connect: MethodRef,
    body: MethodBody,
    pool: ConstantPool,
    pushints: Vec<usize>,
}

impl StagedHost {
    /// Commit the staged body together with the constants it references.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the unit disappeared since staging.
    pub fn commit(self, movie: &mut Movie, layout: &GameLayout, events: &EventLog) -> Result<()> {
        let abc = unit_mut(movie, self.connect.unit)?;
        events
            .record(EventKind::InstructionsInserted)
            .at(self.connect, 0)
            .message(format!("assign host from {:?}", layout.host_property));
        for position in self.pushints {
            events
                .record(EventKind::InstructionReplaced)
                .at(self.connect, position)
                .message(format!("pushint {}", layout.host_port_value));
        }
        abc.pool = self.pool;
        commit(abc, vec![self.body]);
        Ok(())
    }
}

/// Stage the host assignment and the pinned port values without touching `movie`.
///
/// The new constants go to a copy of the unit's pool that is only swapped in on commit.
///
/// # Errors
/// Returns [`Error::NotFound`] if the unit or body is missing and editor errors if the code
/// cannot be rewritten.
pub fn prepare(movie: &Movie, targets: &HostTargets, layout: &GameLayout) -> Result<StagedHost> {
    let abc = unit(movie, targets.connect.unit)?;
    let mut pool = abc.pool.clone();
    let property = pool.intern_string(&layout.host_property);
    let port = pool.intern_integer(layout.host_port_value);

    let mut pushints = Vec::new();
    let mut body = stage(abc, targets.connect.method, |editor| {
        pushints = (0..editor.len())
            .filter(|position| editor.get(*position).is_some_and(|i| i.opcode == opcodes::PUSHINT))
            .collect();
        for position in &pushints {
            editor.replace_at(*position, Instruction::with_index(opcodes::PUSHINT, port))?;
        }

        editor.insert_at(
            0,
            vec![
                Instruction::simple(opcodes::GETLOCAL_0),
                Instruction::with_index(opcodes::FINDPROPSTRICT, targets.get_property),
                Instruction::with_index(opcodes::PUSHSTRING, property),
                Instruction::with_pair(opcodes::CALLPROPERTY, targets.get_property, 1),
                Instruction::with_index(opcodes::INITPROPERTY, targets.host_slot),
            ],
        )?;
        Ok(())
    })?;
    // getlocal_0, findpropstrict result and the argument are live together
    body.max_stack = body.max_stack.max(3);

    Ok(StagedHost {
        connect: targets.connect,
        body,
        pool,
        pushints,
    })
}

/// Prepend the host assignment to the connect method and pin its pushed integers.
///
/// # Errors
/// The errors of [`prepare`]. Nothing is committed on error.
pub fn apply(movie: &mut Movie, targets: &HostTargets, layout: &GameLayout, events: &EventLog) -> Result<()> {
    prepare(movie, targets, layout)?.commit(movie, layout, events)
}
