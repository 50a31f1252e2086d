//! Instruction encoding, the reverse of [`crate::assembly::decoder`].
//!
//! The encoder writes instructions exactly as they are described: branch displacements are
//! emitted as stored, so callers that move code around (the method editor) recompute them
//! before encoding. Operands are checked against the opcode's format from
//! [`crate::assembly::INSTRUCTIONS`] so a mismatched instruction never reaches the output.
//!
//! # Usage Examples
//!
//! ```rust
//! use abcpatch::assembly::{encode_code, opcode_by_mnemonic, Instruction, opcodes};
//!
//! let code = encode_code(&[
//!     Instruction::simple(opcodes::PUSHTRUE),
//!     Instruction::simple(opcodes::RETURNVALUE),
//! ])?;
//! assert_eq!(code, vec![0x26, 0x48]);
//! assert_eq!(opcode_by_mnemonic("returnvalue"), Some(opcodes::RETURNVALUE));
//! # Ok::<(), abcpatch::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    assembly::{Instruction, Operand, OperandType, INSTRUCTIONS},
    file::writer::Writer,
    Error, Result,
};

/// Mnemonic to opcode lookup, built from [`INSTRUCTIONS`] on first use.
static MNEMONIC_TO_OPCODE: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();

fn mnemonic_table() -> &'static HashMap<&'static str, u8> {
    MNEMONIC_TO_OPCODE.get_or_init(|| {
        INSTRUCTIONS
            .iter()
            .zip(0_u8..=u8::MAX)
            .filter_map(|(info, opcode)| info.map(|info| (info.mnemonic, opcode)))
            .collect()
    })
}

/// Opcode byte of `mnemonic`.
#[must_use]
pub fn opcode_by_mnemonic(mnemonic: &str) -> Option<u8> {
    mnemonic_table().get(mnemonic).copied()
}

fn operand_matches(format: OperandType, operand: &Operand) -> bool {
    matches!(
        (format, operand),
        (OperandType::None, Operand::None)
            | (OperandType::U8, Operand::Byte(_))
            | (OperandType::U30, Operand::Index(_))
            | (OperandType::U30Pair, Operand::IndexPair(..))
            | (OperandType::Branch, Operand::Branch(_))
            | (OperandType::Switch, Operand::Switch { .. })
            | (OperandType::Debug, Operand::Debug { .. })
    )
}

/// Append one instruction to `writer`.
///
/// # Errors
/// Returns [`Error::InvalidOpcode`] for unknown opcodes and [`Error::Malformed`] when the
/// operand does not fit the opcode or a displacement exceeds 24 bits.
pub fn encode_instruction(writer: &mut Writer, instruction: &Instruction) -> Result<()> {
    let Some(info) = INSTRUCTIONS[instruction.opcode as usize] else {
        return Err(Error::InvalidOpcode(instruction.opcode));
    };
    if !operand_matches(info.operand, &instruction.operand) {
        return Err(malformed_error!(
            "Operand {:?} does not fit {}",
            instruction.operand,
            info.mnemonic
        ));
    }

    writer.write_le(instruction.opcode);
    match &instruction.operand {
        Operand::None => {}
        Operand::Byte(value) => writer.write_le(*value),
        Operand::Index(index) => writer.write_u30(*index),
        Operand::IndexPair(first, second) => {
            writer.write_u30(*first);
            writer.write_u30(*second);
        }
        Operand::Branch(displacement) => write_displacement(writer, *displacement)?,
        Operand::Switch { default, cases } => {
            if cases.is_empty() {
                return Err(malformed_error!("lookupswitch without cases"));
            }
            write_displacement(writer, *default)?;
            writer.write_index(cases.len() - 1);
            for case in cases {
                write_displacement(writer, *case)?;
            }
        }
        Operand::Debug {
            kind,
            name,
            register,
            extra,
        } => {
            writer.write_le(*kind);
            writer.write_u30(*name);
            writer.write_le(*register);
            writer.write_u30(*extra);
        }
    }
    Ok(())
}

fn write_displacement(writer: &mut Writer, displacement: i32) -> Result<()> {
    if !(-0x80_0000..0x80_0000).contains(&displacement) {
        return Err(malformed_error!("Displacement {} exceeds 24 bits", displacement));
    }
    writer.write_s24(displacement);
    Ok(())
}

/// Append a sequence of instructions to `writer`.
///
/// # Errors
/// See [`encode_instruction`].
pub fn encode_stream(writer: &mut Writer, instructions: &[Instruction]) -> Result<()> {
    for instruction in instructions {
        encode_instruction(writer, instruction)?;
    }
    Ok(())
}

/// Encode a sequence of instructions into a new code buffer.
///
/// # Errors
/// See [`encode_instruction`].
pub fn encode_code(instructions: &[Instruction]) -> Result<Vec<u8>> {
    let mut writer = Writer::with_capacity(instructions.iter().map(Instruction::size).sum());
    encode_stream(&mut writer, instructions)?;
    Ok(writer.into_inner())
}
