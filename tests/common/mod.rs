//! Game-shaped movies synthesized through the public API.

#![allow(dead_code)]

use abcpatch::{
    abc::{
        Class, Instance, InstanceFlags, MethodBody, MethodFlags, MethodInfo, Multiname, Namespace,
        NamespaceKind, Script, Trait, TraitAttributes, TraitKind,
    },
    file::movie::SymbolRecord,
    AbcFile, Movie,
};

pub const REVISION: &str = "PRODUCTION-201709192204-203982672";
pub const PATTERNS: [&str; 2] = ["^https?://localhost", "habbo\\.com$"];

/// Thin writer over an [`AbcFile`] interning names in the public package.
pub struct Unit {
    pub abc: AbcFile,
    package: u32,
}

pub enum Member<'a> {
    Slot(&'a str, &'a str),
    Method(&'a str, &'a [&'a str], &'a str, Vec<u8>),
    Keyed(u32, &'a str, &'a [&'a str], &'a str, Vec<u8>),
}

impl Unit {
    pub fn new() -> Self {
        let mut abc = AbcFile::default();
        let empty = abc.pool.intern_string("");
        let package = abc.pool.add_namespace(Namespace {
            kind: NamespaceKind::Package,
            name: empty,
        });
        Unit { abc, package }
    }

    pub fn string(&mut self, value: &str) -> u32 {
        match self.abc.pool.find_string(value) {
            Some(index) => index,
            None => self.abc.pool.intern_string(value),
        }
    }

    pub fn qname(&mut self, name: &str) -> u32 {
        self.qname_in(self.package, name)
    }

    pub fn qname_in(&mut self, namespace: u32, name: &str) -> u32 {
        let name = self.string(name);
        let multiname = Multiname::QName {
            namespace,
            name,
            attribute: false,
        };
        if let Some(index) = self.abc.pool.multinames.iter().position(|m| *m == multiname) {
            return index as u32;
        }
        self.abc.pool.add_multiname(multiname)
    }

    fn type_name(&mut self, name: &str) -> u32 {
        if name == "*" {
            0
        } else {
            self.qname(name)
        }
    }

    pub fn method(&mut self, name: &str, params: &[&str], returns: &str, code: Vec<u8>) -> u32 {
        let info = MethodInfo {
            return_type: self.type_name(returns),
            param_types: params.iter().map(|p| self.type_name(p)).collect(),
            name: self.string(name),
            flags: MethodFlags::empty(),
            options: Vec::new(),
            param_names: Vec::new(),
        };
        let method = self.abc.add_method(info);
        self.abc.add_body(MethodBody {
            method,
            max_stack: 2,
            local_count: params.len() as u32 + 1,
            init_scope_depth: 0,
            max_scope_depth: 1,
            code,
            exceptions: Vec::new(),
            traits: Vec::new(),
        });
        method
    }

    fn traits(&mut self, members: Vec<Member<'_>>) -> Vec<Trait> {
        members
            .into_iter()
            .enumerate()
            .map(|(position, member)| {
                let id = position as u32 + 1;
                let (name, kind) = match member {
                    Member::Slot(name, type_name) => (
                        name,
                        TraitKind::Slot {
                            slot_id: id,
                            type_name: self.type_name(type_name),
                            value: None,
                        },
                    ),
                    Member::Method(name, params, returns, code) => {
                        let method = self.method(name, params, returns, code);
                        (name, TraitKind::Method { disp_id: id, method })
                    }
                    Member::Keyed(disp_id, name, params, returns, code) => {
                        let method = self.method(name, params, returns, code);
                        (name, TraitKind::Method { disp_id, method })
                    }
                };
                Trait {
                    name: self.qname(name),
                    attributes: TraitAttributes::empty(),
                    kind,
                    metadata: Vec::new(),
                }
            })
            .collect()
    }

    pub fn class(
        &mut self,
        name: &str,
        instance: Vec<Member<'_>>,
        statics: Vec<Member<'_>>,
        cinit: Vec<u8>,
    ) -> usize {
        let namespace = self.package;
        self.class_in(namespace, name, instance, statics, cinit)
    }

    pub fn class_in(
        &mut self,
        namespace: u32,
        name: &str,
        instance: Vec<Member<'_>>,
        statics: Vec<Member<'_>>,
        cinit: Vec<u8>,
    ) -> usize {
        let name = self.qname_in(namespace, name);
        let constructor = self.method("", &[], "*", vec![0xD0, 0x30, 0x47]);
        let initializer = self.method("", &[], "*", cinit);
        let instance = self.traits(instance);
        let statics = self.traits(statics);
        self.abc.instances.push(Instance {
            name,
            super_name: 0,
            flags: InstanceFlags::SEALED,
            protected_ns: 0,
            interfaces: Vec::new(),
            constructor,
            traits: instance,
        });
        self.abc.classes.push(Class {
            initializer,
            traits: statics,
        });
        self.abc.instances.len() - 1
    }

    pub fn namespace(&mut self, kind: NamespaceKind, name: &str) -> u32 {
        let name = self.string(name);
        self.abc.pool.add_namespace(Namespace { kind, name })
    }

    pub fn build(mut self) -> AbcFile {
        let initializer = self.method("", &[], "*", vec![0xD0, 0x30, 0x47]);
        let traits = self
            .abc
            .instances
            .iter()
            .enumerate()
            .map(|(class, instance)| Trait {
                name: instance.name,
                attributes: TraitAttributes::empty(),
                kind: TraitKind::Class {
                    slot_id: class as u32 + 1,
                    class: class as u32,
                },
                metadata: Vec::new(),
            })
            .collect();
        self.abc.scripts.push(Script { initializer, traits });
        self.abc
    }
}

pub fn loader_unit() -> AbcFile {
    let mut unit = Unit::new();
    let obfuscated = unit.namespace(NamespaceKind::Package, "_-3x");
    unit.class_in(
        obfuscated,
        "_-a",
        vec![],
        vec![
            Member::Method("_-1", &["String"], "Boolean", vec![0xD1, 0x96, 0x48]),
            Member::Method("_-2", &["String", "int"], "Boolean", vec![0x27, 0x48]),
        ],
        vec![0xD0, 0x30, 0x47],
    );
    unit.build()
}

pub fn main_unit() -> AbcFile {
    let mut unit = Unit::new();
    let mut code = vec![0xD0, 0x30];
    for pattern in PATTERNS {
        let slot = unit.string(pattern);
        code.extend([0x2C, slot as u8, 0x29]);
    }
    code.extend([0x27, 0x48]);
    unit.class(
        "Habbo",
        vec![
            Member::Method("_-1", &["String", "Object"], "void", vec![0x47]),
            Member::Method("_-2", &["String", "Object"], "Boolean", code),
        ],
        vec![],
        vec![0xD0, 0x30, 0x47],
    );
    unit.build()
}

pub fn communication_unit() -> AbcFile {
    let mut unit = Unit::new();
    let revision = unit.string(REVISION);
    let incoming = unit.qname("_-in");
    let outgoing = unit.qname("_-out");
    let hello = unit.qname("ClientHelloMessageComposer");
    let ping = unit.qname("PingMessageEvent");
    let connect = unit.qname("_-connect");
    let port = unit.abc.pool.intern_integer(30000);
    unit.qname("getProperty");
    let empty = unit.string("");

    #[rustfmt::skip]
    let cinit = vec![
        0xD0, 0x30,
        0x60, outgoing as u8, 0x25, 0xA0, 0x1F, 0x60, hello as u8, 0x61, 0x00,
        0x60, incoming as u8, 0x24, 0x0A, 0x60, ping as u8, 0x61, 0x00,
        0x47,
    ];
    let key = vec![0xD0, 0x30, 0x2C, empty as u8, 0x48];
    // getlocal_1; iffalse +5; getlocal_0; callpropvoid; pushnull; pop; returnvoid
    let guarded = vec![0xD1, 0x12, 0x05, 0x00, 0x00, 0xD0, 0x4F, connect as u8, 0x00, 0x20, 0x29, 0x47];

    unit.class(
        "HabboMessages",
        vec![],
        vec![Member::Slot("_-in", "Dictionary"), Member::Slot("_-out", "Dictionary")],
        cinit,
    );
    unit.class(
        "ClientHelloMessageComposer",
        vec![Member::Method(
            "getMessageArray",
            &[],
            "Array",
            vec![0xD0, 0x30, 0x2C, revision as u8, 0x56, 0x01, 0x48],
        )],
        vec![],
        vec![0xD0, 0x30, 0x47],
    );
    unit.class("PingMessageEvent", vec![], vec![], vec![0xD0, 0x30, 0x47]);
    unit.class(
        "KeyObfuscator",
        vec![
            Member::Keyed(6, "_-m", &[], "String", key.clone()),
            Member::Keyed(7, "_-e", &[], "String", key),
        ],
        vec![],
        vec![0xD0, 0x30, 0x47],
    );
    unit.class(
        "HabboCommunicationManager",
        vec![
            Member::Slot("_-port", "int"),
            Member::Slot("_-host", "String"),
            Member::Method("initComponent", &[], "void", vec![0xD0, 0x30, 0xD0, 0x4F, connect as u8, 0x00, 0x47]),
            Member::Method("_-connect", &[], "void", vec![0xD0, 0x30, 0x2D, port as u8, 0x29, 0x47]),
        ],
        vec![],
        vec![0xD0, 0x30, 0x47],
    );
    unit.class(
        "HabboCommunicationDemo",
        vec![Member::Method("_-h", &["Event"], "void", guarded)],
        vec![],
        vec![0xD0, 0x30, 0x47],
    );
    unit.build()
}

/// The three units in load order, plus a symbol table naming the obfuscated loader class.
pub fn game_movie() -> Movie {
    let mut movie = Movie::new(10);
    movie.add_unit("loader", loader_unit());
    movie.add_unit("main", main_unit());
    movie.add_unit("communication", communication_unit());
    movie.add_symbols(vec![
        SymbolRecord {
            tag_id: 0,
            name: "Habbo".to_string(),
        },
        SymbolRecord {
            tag_id: 1,
            name: "_-3x._-a".to_string(),
        },
    ]);
    movie
}
