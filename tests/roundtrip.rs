mod common;

use abcpatch::{abc::AbcFile, editor::CodeEditor, prelude::*};

#[test]
fn unit_roundtrip_is_byte_exact() {
    for unit in [common::loader_unit(), common::main_unit(), common::communication_unit()] {
        let bytes = unit.to_bytes();
        let parsed = AbcFile::parse(&bytes).unwrap();
        assert_eq!(parsed.to_bytes(), bytes);
        assert_eq!(parsed.instances.len(), unit.instances.len());
    }
}

#[test]
fn movie_roundtrip_every_compression() {
    let movie = common::game_movie();
    let plain = movie.to_bytes().unwrap();

    for compression in [Compression::None, Compression::Zlib, Compression::Lzma] {
        let bytes = movie.to_bytes_with(compression).unwrap();
        let reloaded = Movie::from_mem(bytes).unwrap();
        assert_eq!(reloaded.compression(), compression);
        assert_eq!(reloaded.unit_count(), 3);
        assert_eq!(reloaded.to_bytes_with(Compression::None).unwrap(), plain);
    }
}

#[test]
fn unedited_bodies_keep_their_bytes() {
    let movie = common::game_movie();
    let unit = movie.unit(2).unwrap();
    for body in unit.bodies() {
        let mut copy = body.clone();
        let mut editor = CodeEditor::from_body(body).unwrap();
        editor.write_to(&mut copy).unwrap();
        assert_eq!(copy.code, body.code);
    }
}

#[test]
fn garbage_is_rejected() {
    assert!(Movie::from_mem(b"GIF89a".to_vec()).is_err());
    assert!(matches!(Movie::from_mem(Vec::new()), Err(Error::Empty)));
    assert!(AbcFile::parse(&[0x10, 0x00, 0x2E]).is_err());
}
