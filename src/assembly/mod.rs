//! AVM2 instruction set: decoding, encoding and per-opcode metadata.
//!
//! Method bodies store their code as a flat byte stream. This module turns that stream into
//! [`Instruction`] values and back. Higher-level editing with stable jump targets lives in
//! [`crate::editor`].
//!
//! # Key Types
//! - [`Instruction`] - A decoded instruction with its byte offset
//! - [`Operand`] - Instruction operands (indices, displacements, debug records)
//! - [`FlowType`] - How instructions affect control flow
//! - [`INSTRUCTIONS`] - Opcode metadata table
//!
//! # Main Functions
//! - [`decode_instruction`] / [`decode_stream`] - Bytes to instructions
//! - [`encode_instruction`] / [`encode_stream`] - Instructions to bytes
//!
//! # Example
//! ```rust
//! use abcpatch::assembly::{decode_code, encode_code};
//!
//! let code = [0x26, 0x48]; // pushtrue, returnvalue
//! let instrs = decode_code(&code)?;
//! assert_eq!(instrs[0].mnemonic(), "pushtrue");
//! assert_eq!(encode_code(&instrs)?, code);
//! # Ok::<(), abcpatch::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use decoder::{decode_code, decode_instruction, decode_stream};
pub use encoder::{encode_code, encode_instruction, encode_stream, opcode_by_mnemonic};
pub use instruction::{
    opcode_info, FlowType, Instruction, OpcodeInfo, Operand, OperandType, INSTRUCTIONS,
};
