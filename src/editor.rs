//! Jump-aware editing of method code.
//!
//! A [`CodeEditor`] decodes one method body into an ordered list of instructions. Every
//! instruction gets a stable [`InstrId`] when it enters the editor, and every branch, switch
//! and exception-range bound refers to a [`Label`] (an instruction id or the end of the code)
//! instead of a byte offset. Inserting or removing code therefore never disturbs a jump: the
//! byte displacements are recomputed from the labels only when the code is written back.
//!
//! # Edit Rules
//!
//! - [`CodeEditor::insert_at`] places new code before the instruction at a position. Jumps
//!   to that instruction keep landing on it, after the inserted code.
//! - [`CodeEditor::remove_range`] drops a span. A jump or exception bound that lands on the
//!   first removed instruction moves to the instruction following the span; one landing
//!   strictly inside the span is refused with [`crate::Error::UnsupportedEdit`]. Branches
//!   that are themselves removed disappear with their targets.
//! - Every mutating call is all-or-nothing: on error the editor is unchanged.
//!
//! # Examples
//!
//! ```rust
//! use abcpatch::assembly::{opcodes, Instruction};
//! use abcpatch::editor::CodeEditor;
//!
//! // iffalse +1; pushtrue; returnvalue
//! let code = [0x12, 0x01, 0x00, 0x00, 0x26, 0x48];
//! let mut editor = CodeEditor::from_code(&code, &[])?;
//!
//! editor.insert_at(1, vec![Instruction::simple(opcodes::NOP)])?;
//! // the branch still skips pushtrue and lands on returnvalue
//! assert_eq!(editor.to_bytes()?, vec![0x12, 0x02, 0x00, 0x00, 0x02, 0x26, 0x48]);
//! # Ok::<(), abcpatch::Error>(())
//! ```

use std::{collections::HashMap, fmt, ops::Range};

use crate::{
    abc::{ExceptionInfo, MethodBody},
    assembly::{decode_code, encode_instruction, FlowType, Instruction, Operand},
    file::writer::Writer,
    Error, Result,
};

/// Stable identity of an instruction inside one [`CodeEditor`].
///
/// Ids survive insertion and removal of other instructions and in-place replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A code location: an instruction, or the end of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// The start of an instruction
    Instr(InstrId),
    /// One past the last instruction
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Targets {
    None,
    Branch(Label),
    Switch { default: Label, cases: Vec<Label> },
}

impl Targets {
    fn labels(&self) -> Vec<Label> {
        match self {
            Targets::None => Vec::new(),
            Targets::Branch(label) => vec![*label],
            Targets::Switch { default, cases } => {
                std::iter::once(*default).chain(cases.iter().copied()).collect()
            }
        }
    }

    fn map(&self, mut relabel: impl FnMut(Label) -> Result<Label>) -> Result<Targets> {
        Ok(match self {
            Targets::None => Targets::None,
            Targets::Branch(label) => Targets::Branch(relabel(*label)?),
            Targets::Switch { default, cases } => Targets::Switch {
                default: relabel(*default)?,
                cases: cases
                    .iter()
                    .map(|label| relabel(*label))
                    .collect::<Result<Vec<_>>>()?,
            },
        })
    }
}

#[derive(Debug, Clone)]
struct Slot {
    instruction: Instruction,
    targets: Targets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HandlerRange {
    from: Label,
    to: Label,
    target: Label,
    exc_type: u32,
    var_name: u32,
}

/// Editable instruction list of one method body.
///
/// Instructions live in an arena indexed by [`InstrId`]; `order` lists the ids in code order.
#[derive(Debug, Clone)]
pub struct CodeEditor {
    arena: Vec<Slot>,
    order: Vec<InstrId>,
    exceptions: Vec<HandlerRange>,
}

impl CodeEditor {
    /// Decode `code` and resolve its branch and exception offsets to labels.
    ///
    /// # Errors
    /// Returns decoding errors from [`crate::assembly::decode_code`],
    /// [`Error::InvalidBranch`] when a branch lands between instruction boundaries and
    /// [`Error::Malformed`] for exception bounds that do.
    pub fn from_code(code: &[u8], exceptions: &[ExceptionInfo]) -> Result<Self> {
        let instructions = decode_code(code)?;
        let code_len = u32::try_from(code.len())
            .map_err(|_| malformed_error!("Code of {} bytes is too long", code.len()))?;

        let ids: HashMap<u32, InstrId> = instructions
            .iter()
            .enumerate()
            .map(|(position, instr)| (instr.offset, InstrId(position as u32)))
            .collect();
        let label_at = |offset: u32| -> Option<Label> {
            if offset == code_len {
                Some(Label::End)
            } else {
                ids.get(&offset).copied().map(Label::Instr)
            }
        };

        let mut arena = Vec::with_capacity(instructions.len());
        for (position, instruction) in instructions.into_iter().enumerate() {
            let resolved = instruction
                .branch_targets()
                .into_iter()
                .map(|offset| label_at(offset))
                .collect::<Option<Vec<_>>>();
            let expected = match &instruction.operand {
                Operand::Branch(_) => 1,
                Operand::Switch { cases, .. } => cases.len() + 1,
                _ => 0,
            };
            let Some(labels) = resolved.filter(|labels| labels.len() == expected) else {
                return Err(Error::InvalidBranch { position });
            };

            let targets = match &instruction.operand {
                Operand::Branch(_) => Targets::Branch(labels[0]),
                Operand::Switch { .. } => Targets::Switch {
                    default: labels[0],
                    cases: labels[1..].to_vec(),
                },
                _ => Targets::None,
            };
            arena.push(Slot {
                instruction,
                targets,
            });
        }

        let exceptions = exceptions
            .iter()
            .map(|range| {
                let resolve = |offset: u32| {
                    label_at(offset).ok_or_else(|| {
                        malformed_error!("Exception bound {} is not an instruction boundary", offset)
                    })
                };
                Ok(HandlerRange {
                    from: resolve(range.from)?,
                    to: resolve(range.to)?,
                    target: resolve(range.target)?,
                    exc_type: range.exc_type,
                    var_name: range.var_name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let order = (0..arena.len()).map(|id| InstrId(id as u32)).collect();
        Ok(CodeEditor {
            arena,
            order,
            exceptions,
        })
    }

    /// Decode the code and exception ranges of `body`.
    ///
    /// # Errors
    /// See [`CodeEditor::from_code`].
    pub fn from_body(body: &MethodBody) -> Result<Self> {
        Self::from_code(&body.code, &body.exceptions)
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the code is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether the body has exception ranges.
    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// Whether any instruction is a `lookupswitch`.
    #[must_use]
    pub fn has_switch(&self) -> bool {
        self.iter().any(Instruction::is_switch)
    }

    /// Instruction at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Instruction> {
        let id = self.order.get(position)?;
        Some(&self.slot(*id).instruction)
    }

    /// Id of the instruction at `position`.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<InstrId> {
        self.order.get(position).copied()
    }

    /// Current position of the instruction `id`, `None` once it was removed.
    #[must_use]
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.order.iter().position(|entry| *entry == id)
    }

    /// Instructions in code order.
    ///
    /// Offsets and branch displacements are those of the last decode or
    /// [`CodeEditor::to_bytes`]; use [`CodeEditor::jump_target`] for targets.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.order.iter().map(|id| &self.slot(*id).instruction)
    }

    /// Position of the first instruction at or after `start` matching `predicate`.
    pub fn find_from(
        &self,
        start: usize,
        mut predicate: impl FnMut(&Instruction) -> bool,
    ) -> Option<usize> {
        self.iter()
            .enumerate()
            .skip(start)
            .find(|(_, instr)| predicate(instr))
            .map(|(position, _)| position)
    }

    /// Position of the first instruction with `opcode`.
    #[must_use]
    pub fn find_opcode(&self, opcode: u8) -> Option<usize> {
        self.find_from(0, |instr| instr.opcode == opcode)
    }

    /// Target of the branch at `position`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for a bad position and [`Error::UnsupportedEdit`] if the
    /// instruction is not a branch.
    pub fn jump_target(&self, position: usize) -> Result<Label> {
        match &self.slot(self.checked_id(position)?).targets {
            Targets::Branch(label) => Ok(*label),
            _ => Err(unsupported_edit!("instruction {} is not a branch", position)),
        }
    }

    /// Every target of the instruction at `position`: one for a branch, the default and
    /// cases for a switch, none otherwise.
    #[must_use]
    pub fn targets(&self, position: usize) -> Vec<Label> {
        self.id_at(position)
            .map(|id| self.slot(id).targets.labels())
            .unwrap_or_default()
    }

    /// Position a label currently resolves to; [`Label::End`] resolves to [`CodeEditor::len`].
    #[must_use]
    pub fn resolve(&self, label: Label) -> Option<usize> {
        match label {
            Label::End => Some(self.len()),
            Label::Instr(id) => self.position_of(id),
        }
    }

    /// Label of the instruction at `position`, or [`Label::End`] for `position == len`.
    #[must_use]
    pub fn label_at(&self, position: usize) -> Option<Label> {
        if position == self.len() {
            Some(Label::End)
        } else {
            self.id_at(position).map(Label::Instr)
        }
    }

    /// Insert `instructions` before the instruction at `position` (or append at `len`).
    ///
    /// Inserted instructions must not be branches or switches; use
    /// [`CodeEditor::insert_branch_at`] for those. Returns the ids of the new instructions.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `position > len` and [`Error::UnsupportedEdit`] for
    /// branch or switch instructions.
    pub fn insert_at(
        &mut self,
        position: usize,
        instructions: Vec<Instruction>,
    ) -> Result<Vec<InstrId>> {
        if position > self.len() {
            return Err(Error::OutOfBounds);
        }
        if let Some(bad) = instructions
            .iter()
            .find(|instr| instr.is_branch() || instr.is_switch())
        {
            return Err(unsupported_edit!(
                "{} needs a target label; insert it with insert_branch_at",
                bad.mnemonic()
            ));
        }

        let ids: Vec<InstrId> = instructions
            .into_iter()
            .map(|instruction| {
                self.push_slot(Slot {
                    instruction,
                    targets: Targets::None,
                })
            })
            .collect();
        self.order.splice(position..position, ids.iter().copied());
        Ok(ids)
    }

    /// Insert a branch with `opcode` jumping to `target` before the instruction at `position`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for a bad position, [`Error::UnsupportedEdit`] if
    /// `opcode` is not a branch and [`Error::StructuralInvariant`] if `target` is not in the
    /// code.
    pub fn insert_branch_at(&mut self, position: usize, opcode: u8, target: Label) -> Result<InstrId> {
        if position > self.len() {
            return Err(Error::OutOfBounds);
        }
        let instruction = Instruction {
            offset: 0,
            opcode,
            operand: Operand::Branch(0),
        };
        if !matches!(
            instruction.flow_type(),
            FlowType::ConditionalBranch | FlowType::UnconditionalBranch
        ) {
            return Err(unsupported_edit!("opcode 0x{:02X} is not a branch", opcode));
        }
        self.check_label(target)?;

        let id = self.push_slot(Slot {
            instruction,
            targets: Targets::Branch(target),
        });
        self.order.insert(position, id);
        Ok(id)
    }

    /// Remove `count` instructions starting at `position`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the span exceeds the code and
    /// [`Error::UnsupportedEdit`] if a surviving jump or an exception bound lands strictly
    /// inside the span. The editor is unchanged on error.
    pub fn remove_range(&mut self, position: usize, count: usize) -> Result<()> {
        let end = position.checked_add(count).ok_or(Error::OutOfBounds)?;
        if end > self.len() {
            return Err(Error::OutOfBounds);
        }
        if count == 0 {
            return Ok(());
        }

        let removed: HashMap<InstrId, usize> = self.order[position..end]
            .iter()
            .enumerate()
            .map(|(offset, id)| (*id, offset))
            .collect();
        let successor = self.label_at(end).unwrap_or(Label::End);
        let relabel = |label: Label| -> Result<Label> {
            match label {
                Label::Instr(id) => match removed.get(&id) {
                    None => Ok(label),
                    Some(0) => Ok(successor),
                    Some(offset) => Err(unsupported_edit!(
                        "a target lands on instruction {} inside the removed span",
                        position + offset
                    )),
                },
                Label::End => Ok(Label::End),
            }
        };

        let mut retargeted = Vec::new();
        for id in self.order[..position].iter().chain(&self.order[end..]) {
            let targets = &self.slot(*id).targets;
            if *targets != Targets::None {
                retargeted.push((*id, targets.map(relabel)?));
            }
        }
        let exceptions = self
            .exceptions
            .iter()
            .map(|range| {
                let moved = HandlerRange {
                    from: relabel(range.from)?,
                    to: relabel(range.to)?,
                    target: relabel(range.target)?,
                    ..*range
                };
                if moved.from == moved.to {
                    return Err(unsupported_edit!("removal would empty an exception range"));
                }
                Ok(moved)
            })
            .collect::<Result<Vec<_>>>()?;

        for (id, targets) in retargeted {
            self.slot_mut(id).targets = targets;
        }
        self.exceptions = exceptions;
        self.order.drain(position..end);
        Ok(())
    }

    /// Replace the instruction at `position`, keeping its id so jumps to it stay valid.
    ///
    /// A branch may replace a branch and keeps the old target; any other replacement
    /// involving branches or switches is refused.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] for a bad position and [`Error::UnsupportedEdit`] for a
    /// branch/switch mismatch.
    pub fn replace_at(&mut self, position: usize, instruction: Instruction) -> Result<()> {
        let id = self.checked_id(position)?;
        let slot = self.slot_mut(id);
        let keeps_shape = match (&slot.targets, &instruction.operand) {
            (Targets::None, operand) => {
                !matches!(operand, Operand::Branch(_) | Operand::Switch { .. })
            }
            (Targets::Branch(_), Operand::Branch(_)) => true,
            _ => false,
        };
        if !keeps_shape {
            return Err(unsupported_edit!(
                "cannot replace {} with {}",
                slot.instruction.mnemonic(),
                instruction.mnemonic()
            ));
        }

        slot.instruction = Instruction {
            offset: slot.instruction.offset,
            ..instruction
        };
        Ok(())
    }

    /// Instruction range belonging to the branch at `position`.
    ///
    /// For a forward branch that is every instruction it skips: from the one after the
    /// branch up to (excluding) its target. For a backward branch it is the block it
    /// revisits: from its target up to (excluding) the branch.
    ///
    /// # Errors
    /// See [`CodeEditor::jump_target`].
    pub fn jump_scope(&self, position: usize) -> Result<Range<usize>> {
        let label = self.jump_target(position)?;
        let target = self.resolve(label).ok_or_else(|| {
            Error::StructuralInvariant(format!("branch {} targets a removed instruction", position))
        })?;
        if target > position {
            Ok(position + 1..target)
        } else {
            Ok(target..position)
        }
    }

    /// The instructions of [`CodeEditor::jump_scope`].
    ///
    /// # Errors
    /// See [`CodeEditor::jump_target`].
    pub fn get_body(&self, position: usize) -> Result<Vec<Instruction>> {
        let scope = self.jump_scope(position)?;
        Ok(self.order[scope]
            .iter()
            .map(|id| self.slot(*id).instruction.clone())
            .collect())
    }

    /// Point the branch at `position` at `target`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedEdit`] if the instruction is not a branch and
    /// [`Error::StructuralInvariant`] if `target` is not in the code.
    pub fn set_jump_target(&mut self, position: usize, target: Label) -> Result<()> {
        self.jump_target(position)?;
        self.check_label(target)?;
        let id = self.checked_id(position)?;
        self.slot_mut(id).targets = Targets::Branch(target);
        Ok(())
    }

    /// Retarget the branch at `position` so it lands right after the instruction at `last`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `last` is not an instruction, otherwise see
    /// [`CodeEditor::set_jump_target`].
    pub fn set_end_of_jump(&mut self, position: usize, last: usize) -> Result<()> {
        if last >= self.len() {
            return Err(Error::OutOfBounds);
        }
        let target = self.label_at(last + 1).ok_or(Error::OutOfBounds)?;
        self.set_jump_target(position, target)
    }

    /// Lay the code out, returning the code bytes and the exception ranges in byte offsets.
    ///
    /// Instruction offsets and branch operands held by the editor are refreshed, so the
    /// values seen through [`CodeEditor::iter`] match the returned bytes.
    ///
    /// # Errors
    /// Returns [`Error::StructuralInvariant`] if a label no longer resolves and
    /// [`Error::Malformed`] if a displacement exceeds 24 bits.
    pub fn assemble(&mut self) -> Result<(Vec<u8>, Vec<ExceptionInfo>)> {
        let mut offsets: HashMap<InstrId, u32> = HashMap::with_capacity(self.order.len());
        let mut offset = 0_u32;
        for id in &self.order {
            offsets.insert(*id, offset);
            let size = u32::try_from(self.slot(*id).instruction.size())
                .map_err(|_| malformed_error!("Instruction too large"))?;
            offset = offset
                .checked_add(size)
                .ok_or_else(|| malformed_error!("Code exceeds u32 offsets"))?;
        }
        let code_len = offset;
        let offset_of = |label: Label| -> Result<u32> {
            match label {
                Label::End => Ok(code_len),
                Label::Instr(id) => offsets.get(&id).copied().ok_or_else(|| {
                    Error::StructuralInvariant(format!("label {} no longer resolves", id))
                }),
            }
        };

        let mut operands = Vec::new();
        for id in &self.order {
            let slot = self.slot(*id);
            let start = i64::from(offsets[id]);
            let operand = match &slot.targets {
                Targets::None => continue,
                Targets::Branch(label) => {
                    let end = start + slot.instruction.size() as i64;
                    Operand::Branch(displacement(i64::from(offset_of(*label)?) - end)?)
                }
                Targets::Switch { default, cases } => Operand::Switch {
                    default: displacement(i64::from(offset_of(*default)?) - start)?,
                    cases: cases
                        .iter()
                        .map(|label| displacement(i64::from(offset_of(*label)?) - start))
                        .collect::<Result<Vec<_>>>()?,
                },
            };
            operands.push((*id, operand));
        }

        let exceptions = self
            .exceptions
            .iter()
            .map(|range| {
                Ok(ExceptionInfo {
                    from: offset_of(range.from)?,
                    to: offset_of(range.to)?,
                    target: offset_of(range.target)?,
                    exc_type: range.exc_type,
                    var_name: range.var_name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for (id, operand) in operands {
            self.slot_mut(id).instruction.operand = operand;
        }
        let mut writer = Writer::with_capacity(code_len as usize);
        for id in self.order.clone() {
            let offset = offsets[&id];
            let slot = self.slot_mut(id);
            slot.instruction.offset = offset;
            encode_instruction(&mut writer, &slot.instruction)?;
        }

        Ok((writer.into_inner(), exceptions))
    }

    /// Serialize the edited code.
    ///
    /// # Errors
    /// See [`CodeEditor::assemble`].
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.assemble()?.0)
    }

    /// Write code and exception ranges back into `body`.
    ///
    /// # Errors
    /// See [`CodeEditor::assemble`]; `body` is untouched on error.
    pub fn write_to(&mut self, body: &mut MethodBody) -> Result<()> {
        let (code, exceptions) = self.assemble()?;
        body.code = code;
        body.exceptions = exceptions;
        Ok(())
    }

    fn push_slot(&mut self, slot: Slot) -> InstrId {
        self.arena.push(slot);
        InstrId(u32::try_from(self.arena.len() - 1).unwrap_or(u32::MAX))
    }

    fn slot(&self, id: InstrId) -> &Slot {
        &self.arena[id.0 as usize]
    }

    fn slot_mut(&mut self, id: InstrId) -> &mut Slot {
        &mut self.arena[id.0 as usize]
    }

    fn checked_id(&self, position: usize) -> Result<InstrId> {
        self.id_at(position).ok_or(Error::OutOfBounds)
    }

    fn check_label(&self, label: Label) -> Result<()> {
        if self.resolve(label).is_none() {
            return Err(Error::StructuralInvariant(format!(
                "target {:?} is not part of the code",
                label
            )));
        }
        Ok(())
    }

}

fn displacement(value: i64) -> Result<i32> {
    i32::try_from(value)
        .ok()
        .filter(|value| (-0x80_0000..0x80_0000).contains(value))
        .ok_or_else(|| malformed_error!("Displacement {} exceeds 24 bits", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::opcodes::*;

    // 0: getlocal_0          (0)
    // 1: iffalse -> 4        (1)
    // 2: pushstring 1        (5)
    // 3: pop                 (7)
    // 4: label               (8)
    // 5: jump -> 4           (9)
    // 6: returnvoid          (13)
    const LOOP: [u8; 14] = [
        0xD0, 0x12, 0x03, 0x00, 0x00, 0x2C, 0x01, 0x29, 0x09, 0x10, 0xFB, 0xFF, 0xFF, 0x47,
    ];

    fn target_positions(editor: &CodeEditor) -> Vec<(usize, usize)> {
        (0..editor.len())
            .filter_map(|position| {
                let label = editor.jump_target(position).ok()?;
                Some((position, editor.resolve(label)?))
            })
            .collect()
    }

    #[test]
    fn test_decode_resolves_targets() {
        let editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        assert_eq!(editor.len(), 7);
        assert_eq!(target_positions(&editor), vec![(1, 4), (5, 4)]);
    }

    #[test]
    fn test_unchanged_code_roundtrips() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        assert_eq!(editor.to_bytes().unwrap(), LOOP.to_vec());
    }

    #[test]
    fn test_insert_keeps_logical_targets() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        let before: Vec<_> = (0..editor.len()).filter_map(|p| editor.id_at(p)).collect();

        editor
            .insert_at(4, vec![Instruction::simple(NOP), Instruction::simple(NOP)])
            .unwrap();
        editor.insert_at(0, vec![Instruction::simple(NOP)]).unwrap();

        // iffalse and jump still land on the original `label` instruction
        let label_pos = editor.position_of(before[4]).unwrap();
        assert_eq!(label_pos, 7);
        assert_eq!(target_positions(&editor), vec![(2, 7), (8, 7)]);

        let code = editor.to_bytes().unwrap();
        let mut reparsed = CodeEditor::from_code(&code, &[]).unwrap();
        assert_eq!(target_positions(&reparsed), vec![(2, 7), (8, 7)]);
        assert_eq!(reparsed.to_bytes().unwrap(), code);
    }

    #[test]
    fn test_remove_before_target_shifts_jump() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        editor.remove_range(2, 2).unwrap();

        assert_eq!(target_positions(&editor), vec![(1, 2), (3, 2)]);
        let code = editor.to_bytes().unwrap();
        assert_eq!(code, vec![0xD0, 0x12, 0x00, 0x00, 0x00, 0x09, 0x10, 0xFB, 0xFF, 0xFF, 0x47]);
    }

    #[test]
    fn test_remove_first_target_repoints_to_successor() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        let jump = editor.id_at(5).unwrap();
        editor.remove_range(4, 1).unwrap();

        let jump_pos = editor.position_of(jump).unwrap();
        assert_eq!(jump_pos, 4);
        // both branches now land on the former successor of `label`: the jump itself
        assert_eq!(target_positions(&editor), vec![(1, 4), (4, 4)]);
    }

    #[test]
    fn test_remove_inside_target_is_refused() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        let err = editor.remove_range(3, 2).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEdit(_)));

        // untouched
        assert_eq!(editor.len(), 7);
        assert_eq!(editor.to_bytes().unwrap(), LOOP.to_vec());
    }

    #[test]
    fn test_removed_branches_disappear() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        editor.remove_range(5, 1).unwrap();
        assert_eq!(target_positions(&editor), vec![(1, 4)]);
    }

    #[test]
    fn test_remove_to_end_targets_end() {
        // iffalse -> 2 (returnvoid); nop; returnvoid
        let code = [0x12, 0x01, 0x00, 0x00, 0x02, 0x47];
        let mut editor = CodeEditor::from_code(&code, &[]).unwrap();
        editor.remove_range(2, 1).unwrap();
        assert_eq!(editor.jump_target(0).unwrap(), Label::End);
        assert_eq!(editor.to_bytes().unwrap(), vec![0x12, 0x01, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_exception_bounds_follow_edits() {
        // getlocal_0; pushscope; nop; nop; returnvoid; (handler) returnvoid
        let code = [0xD0, 0x30, 0x02, 0x02, 0x47, 0x47];
        let ranges = [ExceptionInfo {
            from: 2,
            to: 4,
            target: 5,
            exc_type: 0,
            var_name: 0,
        }];
        let mut editor = CodeEditor::from_code(&code, &ranges).unwrap();
        editor
            .insert_at(0, vec![Instruction::with_index(PUSHSTRING, 3), Instruction::simple(POP)])
            .unwrap();

        let (code, exceptions) = editor.assemble().unwrap();
        assert_eq!(code.len(), 9);
        assert_eq!((exceptions[0].from, exceptions[0].to, exceptions[0].target), (5, 7, 8));

        // the protected range cannot lose its interior
        assert!(editor.remove_range(4, 2).is_err());
        assert!(editor.remove_range(4, 1).is_ok());
    }

    #[test]
    fn test_lookupswitch_targets() {
        // lookupswitch default -> 11, cases [11, 12]; returnvoid; returnvoid
        let code = [0x1B, 0x0B, 0x00, 0x00, 0x01, 0x0B, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x47, 0x47];
        let mut editor = CodeEditor::from_code(&code, &[]).unwrap();
        assert!(editor.has_switch());
        assert_eq!(editor.targets(0).len(), 3);

        editor.insert_at(1, vec![Instruction::simple(NOP)]).unwrap();
        let out = editor.to_bytes().unwrap();
        assert_eq!(
            out,
            vec![0x1B, 0x0C, 0x00, 0x00, 0x01, 0x0C, 0x00, 0x00, 0x0D, 0x00, 0x00, 0x02, 0x47, 0x47]
        );
    }

    #[test]
    fn test_jump_scope_and_body() {
        let editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        assert_eq!(editor.jump_scope(1).unwrap(), 2..4);
        assert_eq!(editor.jump_scope(5).unwrap(), 4..5);

        let body = editor.get_body(1).unwrap();
        assert_eq!(body.iter().map(|i| i.opcode).collect::<Vec<_>>(), vec![PUSHSTRING, POP]);
        assert!(matches!(editor.jump_scope(0), Err(Error::UnsupportedEdit(_))));
    }

    #[test]
    fn test_set_end_of_jump() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        editor.set_end_of_jump(1, 1).unwrap();
        assert_eq!(target_positions(&editor)[0], (1, 2));
        assert!(editor.jump_scope(1).unwrap().is_empty());

        // iffalse +0
        let code = editor.to_bytes().unwrap();
        assert_eq!(&code[1..5], &[0x12, 0x00, 0x00, 0x00]);

        editor.set_end_of_jump(1, 6).unwrap();
        assert_eq!(editor.jump_target(1).unwrap(), Label::End);
        assert!(editor.set_end_of_jump(1, 7).is_err());
    }

    #[test]
    fn test_replace_keeps_identity() {
        let mut editor = CodeEditor::from_code(&LOOP, &[]).unwrap();
        let id = editor.id_at(4).unwrap();
        editor.replace_at(4, Instruction::simple(NOP)).unwrap();
        assert_eq!(editor.id_at(4), Some(id));
        assert_eq!(target_positions(&editor), vec![(1, 4), (5, 4)]);

        // iffalse -> iftrue keeps the target
        let mut flipped = Instruction::simple(IFTRUE);
        flipped.operand = Operand::Branch(0);
        editor.replace_at(1, flipped).unwrap();
        assert_eq!(target_positions(&editor)[0], (1, 4));

        assert!(editor.replace_at(0, Instruction { offset: 0, opcode: JUMP, operand: Operand::Branch(0) }).is_err());
        assert!(editor.replace_at(5, Instruction::simple(NOP)).is_err());
    }

    #[test]
    fn test_insert_branch() {
        let mut editor = CodeEditor::from_code(&[0x02, 0x47], &[]).unwrap();
        let end = editor.label_at(1).unwrap();
        editor.insert_branch_at(0, JUMP, end).unwrap();
        assert_eq!(editor.to_bytes().unwrap(), vec![0x10, 0x01, 0x00, 0x00, 0x02, 0x47]);

        assert!(editor.insert_branch_at(0, NOP, Label::End).is_err());
        assert!(editor
            .insert_at(0, vec![Instruction { offset: 0, opcode: JUMP, operand: Operand::Branch(0) }])
            .is_err());
    }

    #[test]
    fn test_branch_between_boundaries() {
        // jump +1 lands inside pushstring's operand
        let code = [0x10, 0x01, 0x00, 0x00, 0x2C, 0x01, 0x47];
        assert!(matches!(
            CodeEditor::from_code(&code, &[]),
            Err(Error::InvalidBranch { position: 0 })
        ));
    }

    #[test]
    fn test_write_to_body() {
        let mut body = MethodBody {
            method: 0,
            max_stack: 1,
            local_count: 1,
            init_scope_depth: 0,
            max_scope_depth: 1,
            code: vec![0x47],
            exceptions: Vec::new(),
            traits: Vec::new(),
        };
        let mut editor = CodeEditor::from_body(&body).unwrap();
        editor
            .insert_at(0, vec![Instruction::simple(PUSHTRUE), Instruction::simple(RETURNVALUE)])
            .unwrap();
        editor.write_to(&mut body).unwrap();
        assert_eq!(body.code, vec![0x26, 0x48, 0x47]);
    }
}
