//! Method signatures and method bodies.

use bitflags::bitflags;

use crate::{
    abc::traits::{read_traits, write_traits, Trait},
    file::{parser::Parser, writer::Writer},
    Result,
};

bitflags! {
    /// Flags byte of a method signature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodFlags: u8 {
        /// Uses the `arguments` object
        const NEED_ARGUMENTS = 0x01;
        /// Creates an activation object
        const NEED_ACTIVATION = 0x02;
        /// Takes a `...rest` parameter
        const NEED_REST = 0x04;
        /// Optional parameter defaults follow the flags
        const HAS_OPTIONAL = 0x08;
        /// Ignores extra arguments
        const IGNORE_REST = 0x10;
        /// Native method without a body
        const NATIVE = 0x20;
        /// Sets the default XML namespace
        const SET_DXNS = 0x40;
        /// Parameter names follow the optional defaults
        const HAS_PARAM_NAMES = 0x80;
    }
}

/// Default value of an optional parameter: `(pool index, constant kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDetail {
    /// Index into the pool table selected by `kind`
    pub value: u32,
    /// Constant kind byte
    pub kind: u8,
}

/// One parameter of a method, as seen by signature matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    /// Multiname index of the declared type (0 = `*`)
    pub type_name: u32,
    /// Whether the parameter has a default value
    pub optional: bool,
}

/// A method signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Multiname index of the return type (0 = `*`)
    pub return_type: u32,
    /// Multiname indices of the parameter types, in order
    pub param_types: Vec<u32>,
    /// String index of the debug name
    pub name: u32,
    /// Flags
    pub flags: MethodFlags,
    /// Defaults of the trailing optional parameters
    pub options: Vec<OptionDetail>,
    /// String indices of parameter names, present with [`MethodFlags::HAS_PARAM_NAMES`]
    pub param_names: Vec<u32>,
}

impl MethodInfo {
    /// Parameters with their optional flag; the last `options.len()` parameters are optional.
    pub fn parameters(&self) -> impl Iterator<Item = Parameter> + '_ {
        let first_optional = self.param_types.len().saturating_sub(self.options.len());
        self.param_types
            .iter()
            .enumerate()
            .map(move |(position, type_name)| Parameter {
                type_name: *type_name,
                optional: position >= first_optional,
            })
    }

    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let param_count = parser.read_index()?;
        let return_type = parser.read_u30()?;

        let mut param_types = Vec::with_capacity(param_count.min(parser.remaining()));
        for _ in 0..param_count {
            param_types.push(parser.read_u30()?);
        }

        let name = parser.read_u30()?;
        let flags = MethodFlags::from_bits_retain(parser.read_le::<u8>()?);

        let mut options = Vec::new();
        if flags.contains(MethodFlags::HAS_OPTIONAL) {
            let count = parser.read_index()?;
            options.reserve(count.min(parser.remaining()));
            for _ in 0..count {
                options.push(OptionDetail {
                    value: parser.read_u30()?,
                    kind: parser.read_le::<u8>()?,
                });
            }
        }

        let mut param_names = Vec::new();
        if flags.contains(MethodFlags::HAS_PARAM_NAMES) {
            param_names.reserve(param_count.min(parser.remaining()));
            for _ in 0..param_count {
                param_names.push(parser.read_u30()?);
            }
        }

        Ok(MethodInfo {
            return_type,
            param_types,
            name,
            flags,
            options,
            param_names,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_index(self.param_types.len());
        writer.write_u30(self.return_type);
        for param in &self.param_types {
            writer.write_u30(*param);
        }
        writer.write_u30(self.name);
        writer.write_le(self.flags.bits());

        if self.flags.contains(MethodFlags::HAS_OPTIONAL) {
            writer.write_index(self.options.len());
            for option in &self.options {
                writer.write_u30(option.value);
                writer.write_le(option.kind);
            }
        }

        if self.flags.contains(MethodFlags::HAS_PARAM_NAMES) {
            for name in &self.param_names {
                writer.write_u30(*name);
            }
        }
    }
}

/// An exception-handler range; `from`, `to` and `target` are byte offsets into the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Start of the protected range (inclusive)
    pub from: u32,
    /// End of the protected range (exclusive)
    pub to: u32,
    /// Start of the handler
    pub target: u32,
    /// Multiname index of the caught type (0 = any)
    pub exc_type: u32,
    /// Multiname index of the catch variable
    pub var_name: u32,
}

/// The code and frame metrics of a method.
///
/// The code is kept as raw bytes; [`crate::editor::CodeEditor`] decodes it on demand and
/// writes it back, so bodies nobody edits are never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Method signature this body implements
    pub method: u32,
    /// Maximum operand stack depth
    pub max_stack: u32,
    /// Number of local registers, including `this` and parameters
    pub local_count: u32,
    /// Scope depth on entry
    pub init_scope_depth: u32,
    /// Maximum scope depth
    pub max_scope_depth: u32,
    /// Raw instruction bytes
    pub code: Vec<u8>,
    /// Exception-handler ranges
    pub exceptions: Vec<ExceptionInfo>,
    /// Activation traits
    pub traits: Vec<Trait>,
}

impl MethodBody {
    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let method = parser.read_u30()?;
        let max_stack = parser.read_u30()?;
        let local_count = parser.read_u30()?;
        let init_scope_depth = parser.read_u30()?;
        let max_scope_depth = parser.read_u30()?;

        let code_length = parser.read_index()?;
        let code = parser.read_bytes(code_length)?.to_vec();

        let count = parser.read_index()?;
        let mut exceptions = Vec::with_capacity(count.min(parser.remaining()));
        for _ in 0..count {
            exceptions.push(ExceptionInfo {
                from: parser.read_u30()?,
                to: parser.read_u30()?,
                target: parser.read_u30()?,
                exc_type: parser.read_u30()?,
                var_name: parser.read_u30()?,
            });
        }

        let traits = read_traits(parser)?;

        Ok(MethodBody {
            method,
            max_stack,
            local_count,
            init_scope_depth,
            max_scope_depth,
            code,
            exceptions,
            traits,
        })
    }

    pub(crate) fn write(&self, writer: &mut Writer) {
        writer.write_u30(self.method);
        writer.write_u30(self.max_stack);
        writer.write_u30(self.local_count);
        writer.write_u30(self.init_scope_depth);
        writer.write_u30(self.max_scope_depth);
        writer.write_index(self.code.len());
        writer.write_bytes(&self.code);

        writer.write_index(self.exceptions.len());
        for exception in &self.exceptions {
            writer.write_u30(exception.from);
            writer.write_u30(exception.to);
            writer.write_u30(exception.target);
            writer.write_u30(exception.exc_type);
            writer.write_u30(exception.var_name);
        }

        write_traits(writer, &self.traits);
    }

    /// Whether the body is covered by any exception-handler range.
    #[must_use]
    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_info_optional_parameters() {
        // 3 params, return 1, types 2 3 4, name 0, HAS_OPTIONAL | HAS_PARAM_NAMES,
        // one default (index 5, kind 0x03), names 6 7 8
        let data = [
            0x03, 0x01, 0x02, 0x03, 0x04, 0x00, 0x88, 0x01, 0x05, 0x03, 0x06, 0x07, 0x08,
        ];
        let method = MethodInfo::read(&mut Parser::new(&data)).unwrap();

        let optional: Vec<bool> = method.parameters().map(|p| p.optional).collect();
        assert_eq!(optional, vec![false, false, true]);
        assert_eq!(method.param_names, vec![6, 7, 8]);

        let mut writer = Writer::new();
        method.write(&mut writer);
        assert_eq!(writer.as_slice(), &data);
    }

    #[test]
    fn test_method_body_roundtrip() {
        // method 0, metrics 1 2 3 4, code [pushtrue, returnvalue], one handler, no traits
        let data = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x02, 0x26, 0x48, 0x01, 0x00, 0x01, 0x01, 0x00, 0x00,
            0x00,
        ];
        let body = MethodBody::read(&mut Parser::new(&data)).unwrap();

        assert_eq!(body.code, vec![0x26, 0x48]);
        assert!(body.has_exceptions());
        assert_eq!(body.exceptions[0].to, 1);

        let mut writer = Writer::new();
        body.write(&mut writer);
        assert_eq!(writer.as_slice(), &data);
    }

    #[test]
    fn test_method_body_truncated_code() {
        let data = [0x00, 0x01, 0x02, 0x03, 0x04, 0x10, 0x26];
        assert!(matches!(
            MethodBody::read(&mut Parser::new(&data)),
            Err(crate::Error::OutOfBounds)
        ));
    }
}
