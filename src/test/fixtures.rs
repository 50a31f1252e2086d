//! A game-shaped movie with every patch target in place.

use crate::{abc::AbcFile, file::movie::Movie};

use super::UnitBuilder;

pub const REVISION: &str = "PRODUCTION-201709192204-203982672";
pub const PATTERNS: [&str; 2] = ["^https?://localhost", "habbo\\.com$"];

/// Loader unit: an obfuscated class whose first static method checks the local host.
pub fn loader_unit() -> AbcFile {
    UnitBuilder::new()
        .class("_-a", |c| {
            c.static_method("_-1", &["String"], "Boolean", &[0xD1, 0x96, 0x48])
                .static_method("_-2", &["String", "int"], "Boolean", &[0x27, 0x48])
        })
        .build()
}

/// Main unit: `Habbo` with its valid-host checker.
pub fn main_unit() -> AbcFile {
    let mut builder = UnitBuilder::new();
    let mut code = vec![0xD0, 0x30];
    for pattern in PATTERNS {
        let slot = builder.string(pattern);
        code.extend([0x2C, slot as u8, 0x29]);
    }
    code.extend([0x27, 0x48]);
    builder
        .class("Habbo", |c| {
            c.method("_-1", &["String", "Object"], "void", &[0x47])
                .method("_-2", &["String", "Object"], "Boolean", &code)
        })
        .build()
}

/// Communication unit: messages, keys, connection manager and handshake.
pub fn communication_unit() -> AbcFile {
    let mut builder = UnitBuilder::new();
    let revision = builder.string(REVISION);
    let incoming = builder.qname("_-in");
    let outgoing = builder.qname("_-out");
    let hello = builder.qname("ClientHelloMessageComposer");
    let ping = builder.qname("PingMessageEvent");
    let connect = builder.qname("_-connect");
    let port = builder.integer(30000);
    builder.qname("getProperty");

    #[rustfmt::skip]
    let cinit = [
        0xD0, 0x30,
        0x60, outgoing as u8, 0x25, 0xA0, 0x1F, 0x60, hello as u8, 0x61, 0x00,
        0x60, incoming as u8, 0x24, 0x0A, 0x60, ping as u8, 0x61, 0x00,
        0x47,
    ];
    let init = [0xD0, 0x30, 0xD0, 0x4F, connect as u8, 0x00, 0x47];
    let connect_code = [0xD0, 0x30, 0x2D, port as u8, 0x29, 0x47];
    let key = [0xD0, 0x30, 0x2C, 0x01, 0x48];
    let guarded = [0xD1, 0x12, 0x05, 0x00, 0x00, 0xD0, 0x4F, 0x01, 0x00, 0x20, 0x29, 0x47];

    builder
        .class("HabboMessages", |c| {
            c.static_slot("_-in", "Dictionary")
                .static_slot("_-out", "Dictionary")
                .static_init(&cinit)
        })
        .class("ClientHelloMessageComposer", |c| {
            c.method("getMessageArray", &[], "Array", &[0xD0, 0x30, 0x2C, revision as u8, 0x56, 0x01, 0x48])
        })
        .class("PingMessageEvent", |c| c)
        .class("KeyObfuscator", |c| {
            c.method("_-m", &[], "String", &key)
                .id(6)
                .method("_-e", &[], "String", &key)
                .id(7)
        })
        .class("HabboCommunicationManager", |c| {
            c.slot("_-port", "int")
                .slot("_-host", "String")
                .method("initComponent", &[], "void", &init)
                .method("_-connect", &[], "void", &connect_code)
        })
        .class("HabboCommunicationDemo", |c| c.method("_-h", &["Event"], "void", &guarded))
        .build()
}

/// The three units in load order.
pub fn game_movie() -> Movie {
    let mut movie = Movie::new(10);
    movie.add_unit("loader", loader_unit());
    movie.add_unit("main", main_unit());
    movie.add_unit("communication", communication_unit());
    movie
}
