//! Instruction representation and the opcode metadata table.
//!
//! # Key Components
//!
//! - [`crate::assembly::Instruction`] - A decoded instruction
//! - [`crate::assembly::Operand`] - Type-safe operand representation
//! - [`crate::assembly::OperandType`] - Operand format of an opcode
//! - [`crate::assembly::FlowType`] - Control flow behavior classification
//! - [`crate::assembly::INSTRUCTIONS`] - Per-opcode metadata, indexed by opcode byte

use std::fmt;

use crate::{assembly::opcodes::*, file::writer::u30_len};

/// Operand format of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// One raw byte
    U8,
    /// One variable-length index or count
    U30,
    /// Two variable-length values (index and argument count, or two registers)
    U30Pair,
    /// Signed 24-bit branch displacement
    Branch,
    /// Default displacement, case count and case displacements
    Switch,
    /// Debug record: kind byte, name index, register byte, extra value
    Debug,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Either branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Branches to one of several targets
    Switch,
    /// Leaves the method
    Return,
    /// Raises an exception
    Throw,
}

/// Static metadata of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Operand format
    pub operand: OperandType,
    /// Control flow behavior
    pub flow: FlowType,
}

const fn op(mnemonic: &'static str, operand: OperandType, flow: FlowType) -> Option<OpcodeInfo> {
    Some(OpcodeInfo {
        mnemonic,
        operand,
        flow,
    })
}

const fn seq(mnemonic: &'static str, operand: OperandType) -> Option<OpcodeInfo> {
    op(mnemonic, operand, FlowType::Sequential)
}

const fn branch(mnemonic: &'static str) -> Option<OpcodeInfo> {
    op(mnemonic, OperandType::Branch, FlowType::ConditionalBranch)
}

/// Opcode metadata, indexed by opcode byte. `None` marks bytes that are not opcodes.
pub static INSTRUCTIONS: [Option<OpcodeInfo>; 256] = {
    use OperandType::{Debug, None as N, U30Pair, U30, U8};

    let mut table: [Option<OpcodeInfo>; 256] = [None; 256];

    table[BKPT as usize] = seq("bkpt", N);
    table[NOP as usize] = seq("nop", N);
    table[THROW as usize] = op("throw", N, FlowType::Throw);
    table[GETSUPER as usize] = seq("getsuper", U30);
    table[SETSUPER as usize] = seq("setsuper", U30);
    table[DXNS as usize] = seq("dxns", U30);
    table[DXNSLATE as usize] = seq("dxnslate", N);
    table[KILL as usize] = seq("kill", U30);
    table[LABEL as usize] = seq("label", N);

    table[IFNLT as usize] = branch("ifnlt");
    table[IFNLE as usize] = branch("ifnle");
    table[IFNGT as usize] = branch("ifngt");
    table[IFNGE as usize] = branch("ifnge");
    table[JUMP as usize] = op("jump", OperandType::Branch, FlowType::UnconditionalBranch);
    table[IFTRUE as usize] = branch("iftrue");
    table[IFFALSE as usize] = branch("iffalse");
    table[IFEQ as usize] = branch("ifeq");
    table[IFNE as usize] = branch("ifne");
    table[IFLT as usize] = branch("iflt");
    table[IFLE as usize] = branch("ifle");
    table[IFGT as usize] = branch("ifgt");
    table[IFGE as usize] = branch("ifge");
    table[IFSTRICTEQ as usize] = branch("ifstricteq");
    table[IFSTRICTNE as usize] = branch("ifstrictne");
    table[LOOKUPSWITCH as usize] = op("lookupswitch", OperandType::Switch, FlowType::Switch);

    table[PUSHWITH as usize] = seq("pushwith", N);
    table[POPSCOPE as usize] = seq("popscope", N);
    table[NEXTNAME as usize] = seq("nextname", N);
    table[HASNEXT as usize] = seq("hasnext", N);
    table[PUSHNULL as usize] = seq("pushnull", N);
    table[PUSHUNDEFINED as usize] = seq("pushundefined", N);
    table[NEXTVALUE as usize] = seq("nextvalue", N);
    table[PUSHBYTE as usize] = seq("pushbyte", U8);
    table[PUSHSHORT as usize] = seq("pushshort", U30);
    table[PUSHTRUE as usize] = seq("pushtrue", N);
    table[PUSHFALSE as usize] = seq("pushfalse", N);
    table[PUSHNAN as usize] = seq("pushnan", N);
    table[POP as usize] = seq("pop", N);
    table[DUP as usize] = seq("dup", N);
    table[SWAP as usize] = seq("swap", N);
    table[PUSHSTRING as usize] = seq("pushstring", U30);
    table[PUSHINT as usize] = seq("pushint", U30);
    table[PUSHUINT as usize] = seq("pushuint", U30);
    table[PUSHDOUBLE as usize] = seq("pushdouble", U30);
    table[PUSHSCOPE as usize] = seq("pushscope", N);
    table[PUSHNAMESPACE as usize] = seq("pushnamespace", U30);
    table[HASNEXT2 as usize] = seq("hasnext2", U30Pair);

    table[LI8 as usize] = seq("li8", N);
    table[LI16 as usize] = seq("li16", N);
    table[LI32 as usize] = seq("li32", N);
    table[LF32 as usize] = seq("lf32", N);
    table[LF64 as usize] = seq("lf64", N);
    table[SI8 as usize] = seq("si8", N);
    table[SI16 as usize] = seq("si16", N);
    table[SI32 as usize] = seq("si32", N);
    table[SF32 as usize] = seq("sf32", N);
    table[SF64 as usize] = seq("sf64", N);

    table[NEWFUNCTION as usize] = seq("newfunction", U30);
    table[CALL as usize] = seq("call", U30);
    table[CONSTRUCT as usize] = seq("construct", U30);
    table[CALLMETHOD as usize] = seq("callmethod", U30Pair);
    table[CALLSTATIC as usize] = seq("callstatic", U30Pair);
    table[CALLSUPER as usize] = seq("callsuper", U30Pair);
    table[CALLPROPERTY as usize] = seq("callproperty", U30Pair);
    table[RETURNVOID as usize] = op("returnvoid", N, FlowType::Return);
    table[RETURNVALUE as usize] = op("returnvalue", N, FlowType::Return);
    table[CONSTRUCTSUPER as usize] = seq("constructsuper", U30);
    table[CONSTRUCTPROP as usize] = seq("constructprop", U30Pair);
    table[CALLPROPLEX as usize] = seq("callproplex", U30Pair);
    table[CALLSUPERVOID as usize] = seq("callsupervoid", U30Pair);
    table[CALLPROPVOID as usize] = seq("callpropvoid", U30Pair);
    table[SXI1 as usize] = seq("sxi1", N);
    table[SXI8 as usize] = seq("sxi8", N);
    table[SXI16 as usize] = seq("sxi16", N);
    table[APPLYTYPE as usize] = seq("applytype", U30);
    table[NEWOBJECT as usize] = seq("newobject", U30);
    table[NEWARRAY as usize] = seq("newarray", U30);
    table[NEWACTIVATION as usize] = seq("newactivation", N);
    table[NEWCLASS as usize] = seq("newclass", U30);
    table[GETDESCENDANTS as usize] = seq("getdescendants", U30);
    table[NEWCATCH as usize] = seq("newcatch", U30);

    table[FINDPROPSTRICT as usize] = seq("findpropstrict", U30);
    table[FINDPROPERTY as usize] = seq("findproperty", U30);
    table[FINDDEF as usize] = seq("finddef", U30);
    table[GETLEX as usize] = seq("getlex", U30);
    table[SETPROPERTY as usize] = seq("setproperty", U30);
    table[GETLOCAL as usize] = seq("getlocal", U30);
    table[SETLOCAL as usize] = seq("setlocal", U30);
    table[GETGLOBALSCOPE as usize] = seq("getglobalscope", N);
    table[GETSCOPEOBJECT as usize] = seq("getscopeobject", U8);
    table[GETPROPERTY as usize] = seq("getproperty", U30);
    table[GETOUTERSCOPE as usize] = seq("getouterscope", U30);
    table[INITPROPERTY as usize] = seq("initproperty", U30);
    table[DELETEPROPERTY as usize] = seq("deleteproperty", U30);
    table[GETSLOT as usize] = seq("getslot", U30);
    table[SETSLOT as usize] = seq("setslot", U30);
    table[GETGLOBALSLOT as usize] = seq("getglobalslot", U30);
    table[SETGLOBALSLOT as usize] = seq("setglobalslot", U30);

    table[CONVERT_S as usize] = seq("convert_s", N);
    table[ESC_XELEM as usize] = seq("esc_xelem", N);
    table[ESC_XATTR as usize] = seq("esc_xattr", N);
    table[CONVERT_I as usize] = seq("convert_i", N);
    table[CONVERT_U as usize] = seq("convert_u", N);
    table[CONVERT_D as usize] = seq("convert_d", N);
    table[CONVERT_B as usize] = seq("convert_b", N);
    table[CONVERT_O as usize] = seq("convert_o", N);
    table[CHECKFILTER as usize] = seq("checkfilter", N);
    table[COERCE as usize] = seq("coerce", U30);
    table[COERCE_B as usize] = seq("coerce_b", N);
    table[COERCE_A as usize] = seq("coerce_a", N);
    table[COERCE_I as usize] = seq("coerce_i", N);
    table[COERCE_D as usize] = seq("coerce_d", N);
    table[COERCE_S as usize] = seq("coerce_s", N);
    table[ASTYPE as usize] = seq("astype", U30);
    table[ASTYPELATE as usize] = seq("astypelate", N);
    table[COERCE_U as usize] = seq("coerce_u", N);
    table[COERCE_O as usize] = seq("coerce_o", N);

    table[NEGATE as usize] = seq("negate", N);
    table[INCREMENT as usize] = seq("increment", N);
    table[INCLOCAL as usize] = seq("inclocal", U30);
    table[DECREMENT as usize] = seq("decrement", N);
    table[DECLOCAL as usize] = seq("declocal", U30);
    table[TYPEOF as usize] = seq("typeof", N);
    table[NOT as usize] = seq("not", N);
    table[BITNOT as usize] = seq("bitnot", N);
    table[ADD as usize] = seq("add", N);
    table[SUBTRACT as usize] = seq("subtract", N);
    table[MULTIPLY as usize] = seq("multiply", N);
    table[DIVIDE as usize] = seq("divide", N);
    table[MODULO as usize] = seq("modulo", N);
    table[LSHIFT as usize] = seq("lshift", N);
    table[RSHIFT as usize] = seq("rshift", N);
    table[URSHIFT as usize] = seq("urshift", N);
    table[BITAND as usize] = seq("bitand", N);
    table[BITOR as usize] = seq("bitor", N);
    table[BITXOR as usize] = seq("bitxor", N);
    table[EQUALS as usize] = seq("equals", N);
    table[STRICTEQUALS as usize] = seq("strictequals", N);
    table[LESSTHAN as usize] = seq("lessthan", N);
    table[LESSEQUALS as usize] = seq("lessequals", N);
    table[GREATERTHAN as usize] = seq("greaterthan", N);
    table[GREATEREQUALS as usize] = seq("greaterequals", N);
    table[INSTANCEOF as usize] = seq("instanceof", N);
    table[ISTYPE as usize] = seq("istype", U30);
    table[ISTYPELATE as usize] = seq("istypelate", N);
    table[IN as usize] = seq("in", N);
    table[INCREMENT_I as usize] = seq("increment_i", N);
    table[DECREMENT_I as usize] = seq("decrement_i", N);
    table[INCLOCAL_I as usize] = seq("inclocal_i", U30);
    table[DECLOCAL_I as usize] = seq("declocal_i", U30);
    table[NEGATE_I as usize] = seq("negate_i", N);
    table[ADD_I as usize] = seq("add_i", N);
    table[SUBTRACT_I as usize] = seq("subtract_i", N);
    table[MULTIPLY_I as usize] = seq("multiply_i", N);

    table[GETLOCAL_0 as usize] = seq("getlocal_0", N);
    table[GETLOCAL_1 as usize] = seq("getlocal_1", N);
    table[GETLOCAL_2 as usize] = seq("getlocal_2", N);
    table[GETLOCAL_3 as usize] = seq("getlocal_3", N);
    table[SETLOCAL_0 as usize] = seq("setlocal_0", N);
    table[SETLOCAL_1 as usize] = seq("setlocal_1", N);
    table[SETLOCAL_2 as usize] = seq("setlocal_2", N);
    table[SETLOCAL_3 as usize] = seq("setlocal_3", N);

    table[DEBUG as usize] = seq("debug", Debug);
    table[DEBUGLINE as usize] = seq("debugline", U30);
    table[DEBUGFILE as usize] = seq("debugfile", U30);
    table[BKPTLINE as usize] = seq("bkptline", U30);
    table[TIMESTAMP as usize] = seq("timestamp", N);

    table
};

/// Metadata of `opcode`, `None` if the byte is not an opcode.
#[must_use]
pub fn opcode_info(opcode: u8) -> Option<&'static OpcodeInfo> {
    INSTRUCTIONS[opcode as usize].as_ref()
}

/// The operand of an instruction.
///
/// Branch displacements are kept exactly as encoded; [`Instruction::branch_targets`] resolves
/// them to byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// One raw byte (`pushbyte`, `getscopeobject`)
    Byte(u8),
    /// A pool index, register, count or line number
    Index(u32),
    /// Two values, e.g. a multiname index and an argument count
    IndexPair(u32, u32),
    /// Displacement from the end of the branch instruction
    Branch(i32),
    /// Displacements from the start of the switch instruction
    Switch {
        /// Default target
        default: i32,
        /// Case targets; the encoded case count is `cases.len() - 1`
        cases: Vec<i32>,
    },
    /// A `debug` record
    Debug {
        /// Record kind, [`DEBUG_KIND_REGISTER`] for register names
        kind: u8,
        /// String index of the name
        name: u32,
        /// Register number
        register: u8,
        /// Unused extra value
        extra: u32,
    },
}

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset within the method code, as decoded
    pub offset: u32,
    /// Opcode byte
    pub opcode: u8,
    /// Operand
    pub operand: Operand,
}

impl Instruction {
    /// An instruction without operands.
    #[must_use]
    pub fn simple(opcode: u8) -> Self {
        Instruction {
            offset: 0,
            opcode,
            operand: Operand::None,
        }
    }

    /// An instruction with one index operand.
    #[must_use]
    pub fn with_index(opcode: u8, index: u32) -> Self {
        Instruction {
            offset: 0,
            opcode,
            operand: Operand::Index(index),
        }
    }

    /// An instruction with an index and a count.
    #[must_use]
    pub fn with_pair(opcode: u8, index: u32, count: u32) -> Self {
        Instruction {
            offset: 0,
            opcode,
            operand: Operand::IndexPair(index, count),
        }
    }

    /// Metadata of the opcode, if known.
    #[must_use]
    pub fn info(&self) -> Option<&'static OpcodeInfo> {
        opcode_info(self.opcode)
    }

    /// Mnemonic of the opcode.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.info().map_or("unknown", |info| info.mnemonic)
    }

    /// Control flow behavior of the opcode.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.info().map_or(FlowType::Sequential, |info| info.flow)
    }

    /// Whether this is a conditional or unconditional branch.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self.operand, Operand::Branch(_))
    }

    /// Whether this is a `lookupswitch`.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(self.operand, Operand::Switch { .. })
    }

    /// The single index operand, if the instruction has one.
    #[must_use]
    pub fn index(&self) -> Option<u32> {
        match self.operand {
            Operand::Index(index) | Operand::IndexPair(index, _) => Some(index),
            _ => None,
        }
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + match &self.operand {
            Operand::None => 0,
            Operand::Byte(_) => 1,
            Operand::Index(index) => u30_len(*index),
            Operand::IndexPair(first, second) => u30_len(*first) + u30_len(*second),
            Operand::Branch(_) => 3,
            Operand::Switch { cases, .. } => {
                let count = u32::try_from(cases.len().saturating_sub(1)).unwrap_or(u32::MAX);
                3 + u30_len(count) + 3 * cases.len()
            }
            Operand::Debug { name, extra, .. } => 2 + u30_len(*name) + u30_len(*extra),
        }
    }

    /// Absolute byte offsets this instruction may jump to, computed from [`Instruction::offset`].
    ///
    /// Targets that would fall before the start of the code are dropped.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        let resolve = |base: i64, displacement: i32| {
            u32::try_from(base + i64::from(displacement)).ok()
        };
        match &self.operand {
            Operand::Branch(displacement) => {
                let end = i64::from(self.offset) + self.size() as i64;
                resolve(end, *displacement).into_iter().collect()
            }
            Operand::Switch { default, cases } => std::iter::once(default)
                .chain(cases)
                .filter_map(|displacement| resolve(i64::from(self.offset), *displacement))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}  {}", self.offset, self.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Byte(value) => write!(f, " {value}"),
            Operand::Index(index) => write!(f, " {index}"),
            Operand::IndexPair(first, second) => write!(f, " {first} {second}"),
            Operand::Branch(displacement) => write!(f, " {displacement:+}"),
            Operand::Switch { default, cases } => write!(f, " {default:+} {cases:?}"),
            Operand::Debug {
                kind,
                name,
                register,
                extra,
            } => write!(f, " {kind} {name} {register} {extra}"),
        }
    }
}
