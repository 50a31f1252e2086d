//! Builders that synthesize bytecode units for unit tests.
//!
//! Units are assembled from the same public tables the parser fills, so anything a builder
//! produces also survives `AbcFile::to_bytes` / `AbcFile::parse`.

pub mod fixtures;

use crate::abc::{
    AbcFile, Class, ExceptionInfo, Instance, InstanceFlags, MethodBody, MethodFlags, MethodInfo,
    Multiname, Namespace, NamespaceKind, OptionDetail, Script, Trait, TraitAttributes, TraitKind,
};

/// Builds one bytecode unit class by class.
///
/// Names are interned as `QName`s; the same `(namespace, name)` pair always yields the same
/// multiname index, so tests can look indices up before the classes that use them exist.
pub struct UnitBuilder {
    unit: AbcFile,
}

impl Default for UnitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitBuilder {
    pub fn new() -> Self {
        let mut unit = AbcFile::default();
        // string 1 is the empty package name, so index 1 is always valid in tests
        unit.pool.strings.push(String::new());
        UnitBuilder { unit }
    }

    /// Intern a string constant.
    pub fn string(&mut self, value: &str) -> u32 {
        if let Some(index) = self.unit.pool.find_string(value) {
            return index;
        }
        self.unit.pool.strings.push(value.to_string());
        last(&self.unit.pool.strings)
    }

    /// Intern an integer constant.
    pub fn integer(&mut self, value: i32) -> u32 {
        if let Some(position) = self.unit.pool.integers.iter().skip(1).position(|v| *v == value) {
            return position as u32 + 1;
        }
        self.unit.pool.integers.push(value);
        last(&self.unit.pool.integers)
    }

    /// Intern a namespace.
    pub fn namespace(&mut self, kind: NamespaceKind, name: &str) -> u32 {
        let name = self.string(name);
        let namespace = Namespace { kind, name };
        if let Some(position) = self.unit.pool.namespaces.iter().skip(1).position(|ns| *ns == namespace) {
            return position as u32 + 1;
        }
        self.unit.pool.add_namespace(namespace)
    }

    /// Intern a `QName` in the public package namespace.
    pub fn qname(&mut self, name: &str) -> u32 {
        self.qname_in(NamespaceKind::Package, "", name)
    }

    /// Intern a `QName` in an arbitrary namespace.
    pub fn qname_in(&mut self, kind: NamespaceKind, namespace: &str, name: &str) -> u32 {
        let namespace = self.namespace(kind, namespace);
        let name = self.string(name);
        let multiname = Multiname::QName {
            namespace,
            name,
            attribute: false,
        };
        if let Some(position) = self.unit.pool.multinames.iter().skip(1).position(|m| *m == multiname) {
            return position as u32 + 1;
        }
        self.unit.pool.add_multiname(multiname)
    }

    /// Add a multiname resolved against a namespace set.
    pub fn multiname_in_set(&mut self, namespaces: &[(NamespaceKind, &str)], name: &str) -> u32 {
        let set = namespaces
            .iter()
            .map(|(kind, ns)| self.namespace(*kind, ns))
            .collect();
        let namespace_set = self.unit.pool.add_namespace_set(set);
        let name = self.string(name);
        self.unit.pool.add_multiname(Multiname::Multiname {
            name,
            namespace_set,
            attribute: false,
        })
    }

    fn type_name(&mut self, name: &str) -> u32 {
        if name == "*" {
            0
        } else {
            self.qname(name)
        }
    }

    /// Add a class in the public package namespace.
    pub fn class(self, name: &str, build: impl FnOnce(ClassBuilder) -> ClassBuilder) -> Self {
        self.class_in(NamespaceKind::Package, "", name, build)
    }

    /// Add a class in a given namespace.
    pub fn class_in(
        mut self,
        kind: NamespaceKind,
        namespace: &str,
        name: &str,
        build: impl FnOnce(ClassBuilder) -> ClassBuilder,
    ) -> Self {
        let spec = build(ClassBuilder::default());
        let class_name = self.qname_in(kind, namespace, name);

        let constructor = self.add_method("", &[], 0, "*", spec.constructor.unwrap_or_else(MethodSpec::returning_void));
        let initializer = self.add_method("", &[], 0, "*", spec.initializer.unwrap_or_else(MethodSpec::returning_void));
        let instance_traits = spec
            .instance
            .into_iter()
            .map(|member| self.add_member(member))
            .collect();
        let static_traits = spec
            .statics
            .into_iter()
            .map(|member| self.add_member(member))
            .collect();

        self.unit.instances.push(Instance {
            name: class_name,
            super_name: 0,
            flags: InstanceFlags::SEALED,
            protected_ns: 0,
            interfaces: Vec::new(),
            constructor,
            traits: instance_traits,
        });
        self.unit.classes.push(Class {
            initializer,
            traits: static_traits,
        });
        self
    }

    fn add_member(&mut self, member: Member) -> Trait {
        match member {
            Member::Slot { name, type_name, id } => Trait {
                name: self.qname(&name),
                attributes: TraitAttributes::empty(),
                kind: TraitKind::Slot {
                    slot_id: id,
                    type_name: self.type_name(&type_name),
                    value: None,
                },
                metadata: Vec::new(),
            },
            Member::Method { name, params, optional, returns, spec, id } => {
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                let method = self.add_method(&name, &params, optional, &returns, spec);
                Trait {
                    name: self.qname(&name),
                    attributes: TraitAttributes::empty(),
                    kind: TraitKind::Method { disp_id: id, method },
                    metadata: Vec::new(),
                }
            }
        }
    }

    fn add_method(
        &mut self,
        name: &str,
        params: &[&str],
        optional: usize,
        returns: &str,
        spec: MethodSpec,
    ) -> u32 {
        let param_types = params.iter().map(|p| self.type_name(p)).collect();
        let options: Vec<OptionDetail> = (0..optional)
            .map(|_| OptionDetail { value: 0, kind: 0x0C })
            .collect();
        let info = MethodInfo {
            return_type: self.type_name(returns),
            param_types,
            name: self.string(name),
            flags: if options.is_empty() {
                MethodFlags::empty()
            } else {
                MethodFlags::HAS_OPTIONAL
            },
            options,
            param_names: Vec::new(),
        };
        let method = self.unit.add_method(info);
        self.unit.add_body(MethodBody {
            method,
            max_stack: spec.max_stack,
            local_count: spec.local_count.unwrap_or(params.len() as u32 + 1),
            init_scope_depth: spec.init_scope_depth,
            max_scope_depth: spec.max_scope_depth,
            code: spec.code,
            exceptions: spec.exceptions,
            traits: Vec::new(),
        });
        method
    }

    /// Finish the unit, adding one script that binds every class.
    pub fn build(mut self) -> AbcFile {
        let initializer = self.add_method("", &[], 0, "*", MethodSpec::returning_void());
        let traits = (0..self.unit.instances.len())
            .map(|class| Trait {
                name: self.unit.instances[class].name,
                attributes: TraitAttributes::empty(),
                kind: TraitKind::Class {
                    slot_id: class as u32 + 1,
                    class: class as u32,
                },
                metadata: Vec::new(),
            })
            .collect();
        self.unit.scripts.push(Script { initializer, traits });
        self.unit
    }
}

fn last<T>(table: &[T]) -> u32 {
    table.len() as u32 - 1
}

/// Code and frame metrics of one synthesized method.
#[derive(Clone)]
pub struct MethodSpec {
    pub code: Vec<u8>,
    pub max_stack: u32,
    pub local_count: Option<u32>,
    pub init_scope_depth: u32,
    pub max_scope_depth: u32,
    pub exceptions: Vec<ExceptionInfo>,
}

impl MethodSpec {
    pub fn new(code: &[u8]) -> Self {
        MethodSpec {
            code: code.to_vec(),
            max_stack: 2,
            local_count: None,
            init_scope_depth: 0,
            max_scope_depth: 1,
            exceptions: Vec::new(),
        }
    }

    pub fn returning_void() -> Self {
        Self::new(&[0xD0, 0x30, 0x47])
    }
}

enum Member {
    Slot {
        name: String,
        type_name: String,
        id: u32,
    },
    Method {
        name: String,
        params: Vec<String>,
        optional: usize,
        returns: String,
        spec: MethodSpec,
        id: u32,
    },
}

/// Members of one class; ids default to 1-based declaration order per side.
#[derive(Default)]
pub struct ClassBuilder {
    instance: Vec<Member>,
    statics: Vec<Member>,
    constructor: Option<MethodSpec>,
    initializer: Option<MethodSpec>,
    last_static: bool,
}

impl ClassBuilder {
    pub fn slot(mut self, name: &str, type_name: &str) -> Self {
        let id = self.instance.len() as u32 + 1;
        self.instance.push(Member::Slot {
            name: name.to_string(),
            type_name: type_name.to_string(),
            id,
        });
        self.last_static = false;
        self
    }

    pub fn static_slot(mut self, name: &str, type_name: &str) -> Self {
        let id = self.statics.len() as u32 + 1;
        self.statics.push(Member::Slot {
            name: name.to_string(),
            type_name: type_name.to_string(),
            id,
        });
        self.last_static = true;
        self
    }

    pub fn method(mut self, name: &str, params: &[&str], returns: &str, code: &[u8]) -> Self {
        let id = self.instance.len() as u32 + 1;
        self.instance.push(method_member(name, params, returns, code, id));
        self.last_static = false;
        self
    }

    pub fn static_method(mut self, name: &str, params: &[&str], returns: &str, code: &[u8]) -> Self {
        let id = self.statics.len() as u32 + 1;
        self.statics.push(method_member(name, params, returns, code, id));
        self.last_static = true;
        self
    }

    pub fn constructor(mut self, code: &[u8]) -> Self {
        self.constructor = Some(MethodSpec::new(code));
        self
    }

    pub fn static_init(mut self, code: &[u8]) -> Self {
        self.initializer = Some(MethodSpec::new(code));
        self
    }

    fn last_member(&mut self) -> Option<&mut Member> {
        if self.last_static {
            self.statics.last_mut()
        } else {
            self.instance.last_mut()
        }
    }

    /// Override the slot or dispatch id of the last member.
    pub fn id(mut self, new_id: u32) -> Self {
        match self.last_member() {
            Some(Member::Slot { id, .. } | Member::Method { id, .. }) => *id = new_id,
            None => {}
        }
        self
    }

    /// Mark the last `count` parameters of the last method optional.
    pub fn optional(mut self, count: usize) -> Self {
        if let Some(Member::Method { optional, .. }) = self.last_member() {
            *optional = count;
        }
        self
    }

    /// Set the frame metrics of the last method.
    pub fn metrics(mut self, max_stack: u32, local_count: u32, init_scope: u32, max_scope: u32) -> Self {
        if let Some(Member::Method { spec, .. }) = self.last_member() {
            spec.max_stack = max_stack;
            spec.local_count = Some(local_count);
            spec.init_scope_depth = init_scope;
            spec.max_scope_depth = max_scope;
        }
        self
    }

    /// Attach exception ranges to the last method.
    pub fn exceptions(mut self, ranges: Vec<ExceptionInfo>) -> Self {
        if let Some(Member::Method { spec, .. }) = self.last_member() {
            spec.exceptions = ranges;
        }
        self
    }
}

fn method_member(name: &str, params: &[&str], returns: &str, code: &[u8], id: u32) -> Member {
    Member::Method {
        name: name.to_string(),
        params: params.iter().map(|p| (*p).to_string()).collect(),
        optional: 0,
        returns: returns.to_string(),
        spec: MethodSpec::new(code),
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_interns_names_once() {
        let mut builder = UnitBuilder::new();
        let first = builder.qname("String");
        let second = builder.qname("String");
        assert_eq!(first, second);
        assert_eq!(builder.string(""), 1);

        let unit = builder
            .class("A", |c| c.slot("name", "String").method("run", &["String"], "void", &[0x47]).id(9))
            .build();
        assert_eq!(unit.instances[0].traits[1].id(), 9);
        assert_eq!(unit.scripts.len(), 1);
        assert_eq!(AbcFile::parse(&unit.to_bytes()).unwrap().to_bytes(), unit.to_bytes());
    }
}
