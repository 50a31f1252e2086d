//! Instruction decoding.
//!
//! Method code is a flat byte stream. [`decode_instruction`] reads one instruction at the
//! parser's position using the operand format from [`crate::assembly::INSTRUCTIONS`];
//! [`decode_stream`] reads until the stream is exhausted.
//!
//! # Usage Examples
//!
//! ```rust
//! use abcpatch::{Parser, assembly::{decode_instruction, decode_stream, opcodes}};
//!
//! let code = [0xD0, 0x30, 0x47]; // getlocal_0, pushscope, returnvoid
//! let mut parser = Parser::new(&code);
//! let first = decode_instruction(&mut parser)?;
//! assert_eq!(first.opcode, opcodes::GETLOCAL_0);
//!
//! let mut parser = Parser::new(&code);
//! let instrs = decode_stream(&mut parser)?;
//! assert_eq!(instrs.len(), 3);
//! assert_eq!(instrs[2].offset, 2);
//! # Ok::<(), abcpatch::Error>(())
//! ```

use crate::{
    assembly::{Instruction, Operand, OperandType, INSTRUCTIONS},
    file::parser::Parser,
    Error, Result,
};

/// Decode the instruction at the parser's position.
///
/// The instruction's offset is the parser position before the opcode byte.
///
/// # Errors
/// Returns [`Error::InvalidOpcode`] for bytes that are not opcodes and
/// [`Error::OutOfBounds`] if the operand is truncated.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = u32::try_from(parser.pos())
        .map_err(|_| malformed_error!("Code offset {} exceeds u32", parser.pos()))?;
    let opcode = parser.read_le::<u8>()?;
    let Some(info) = INSTRUCTIONS[opcode as usize] else {
        return Err(Error::InvalidOpcode(opcode));
    };

    let operand = match info.operand {
        OperandType::None => Operand::None,
        OperandType::U8 => Operand::Byte(parser.read_le::<u8>()?),
        OperandType::U30 => Operand::Index(parser.read_u30()?),
        OperandType::U30Pair => {
            let first = parser.read_u30()?;
            Operand::IndexPair(first, parser.read_u30()?)
        }
        OperandType::Branch => Operand::Branch(parser.read_s24()?),
        OperandType::Switch => {
            let default = parser.read_s24()?;
            let count = parser.read_index()?;
            // count + 1 cases follow, three bytes each
            if count >= parser.remaining() / 3 + 1 {
                return Err(Error::OutOfBounds);
            }
            let mut cases = Vec::with_capacity(count + 1);
            for _ in 0..=count {
                cases.push(parser.read_s24()?);
            }
            Operand::Switch { default, cases }
        }
        OperandType::Debug => {
            let kind = parser.read_le::<u8>()?;
            let name = parser.read_u30()?;
            let register = parser.read_le::<u8>()?;
            Operand::Debug {
                kind,
                name,
                register,
                extra: parser.read_u30()?,
            }
        }
    };

    Ok(Instruction {
        offset,
        opcode,
        operand,
    })
}

/// Decode every instruction from the parser's position to the end of its data.
///
/// # Errors
/// Fails on the first instruction that cannot be decoded.
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::with_capacity(parser.remaining() / 2);
    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }
    Ok(instructions)
}

/// Decode a whole code buffer.
///
/// # Errors
/// See [`decode_stream`].
pub fn decode_code(code: &[u8]) -> Result<Vec<Instruction>> {
    decode_stream(&mut Parser::new(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::opcodes::*;

    #[test]
    fn test_decode_operands() {
        let code = [
            0x24, 0xFF, // pushbyte 255
            0x46, 0x05, 0x01, // callproperty 5 1
            0x2C, 0x80, 0x01, // pushstring 128
            0x12, 0x02, 0x00, 0x00, // iffalse +2
            0xEF, 0x01, 0x07, 0x02, 0x00, // debug 1 7 2 0
        ];
        let instrs = decode_code(&code).unwrap();

        assert_eq!(instrs[0].operand, Operand::Byte(0xFF));
        assert_eq!(instrs[1].operand, Operand::IndexPair(5, 1));
        assert_eq!(instrs[2].operand, Operand::Index(128));
        assert_eq!(instrs[2].offset, 5);
        assert_eq!(instrs[3].operand, Operand::Branch(2));
        assert_eq!(instrs[3].opcode, IFFALSE);
        assert_eq!(
            instrs[4].operand,
            Operand::Debug {
                kind: DEBUG_KIND_REGISTER,
                name: 7,
                register: 2,
                extra: 0
            }
        );
    }

    #[test]
    fn test_decode_negative_branch() {
        let code = [0x09, 0x10, 0xFB, 0xFF, 0xFF]; // label; jump -5
        let instrs = decode_code(&code).unwrap();
        assert_eq!(instrs[1].operand, Operand::Branch(-5));
        assert_eq!(instrs[1].branch_targets(), vec![0]);
    }

    #[test]
    fn test_decode_lookupswitch() {
        let code = [0x1B, 0x04, 0x00, 0x00, 0x01, 0x08, 0x00, 0x00, 0x0C, 0x00, 0x00];
        let instrs = decode_code(&code).unwrap();
        assert_eq!(
            instrs[0].operand,
            Operand::Switch {
                default: 4,
                cases: vec![8, 12]
            }
        );
        assert_eq!(instrs[0].size(), code.len());
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(matches!(decode_code(&[0x00]), Err(Error::InvalidOpcode(0x00))));
    }

    #[test]
    fn test_truncated_operand() {
        assert!(matches!(decode_code(&[0x2C]), Err(Error::OutOfBounds)));
        assert!(decode_code(&[0x1B, 0x00, 0x00, 0x00, 0x7F]).is_err());
    }
}
