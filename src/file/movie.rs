//! The Shockwave Flash container.
//!
//! A movie is an 8-byte header (signature, version, uncompressed length) followed by a body
//! that may be compressed as a whole. The body starts with the frame rectangle, rate and count
//! and continues with a flat list of tags. [`Movie`] decodes the tags this crate edits and keeps
//! every other tag as opaque bytes:
//!
//! | Code | Tag           | Decoded as                            |
//! |------|---------------|---------------------------------------|
//! | 72   | `DoABC1`      | [`TagBody::DoAbc1`] with a bytecode unit |
//! | 76   | `SymbolClass` | [`TagBody::SymbolClass`] records       |
//! | 82   | `DoABC`       | [`TagBody::DoAbc`] with a bytecode unit  |
//!
//! Bytecode units are numbered in tag order; that number is how patches address them.
//!
//! # Compression
//!
//! - `FWS` - uncompressed
//! - `CWS` - zlib (`flate2`)
//! - `ZWS` - LZMA (`lzma-rs`); the body is stored as 5 property bytes and a raw stream
//!
//! # Examples
//!
//! ```rust,no_run
//! use abcpatch::{file::movie::Compression, Movie};
//!
//! let movie = Movie::from_file("Habbo.swf")?;
//! println!("{} movie v{}, {} units", movie.compression(), movie.version(), movie.unit_count());
//! movie.save("Habbo.patched.swf", Some(Compression::None))?;
//! # Ok::<(), abcpatch::Error>(())
//! ```

use std::{
    io::{Cursor, Read, Write},
    path::Path,
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder};

use crate::{
    abc::AbcFile,
    file::{memory::Memory, parser::Parser, physical::Physical, writer::Writer, Backend},
    Error::Empty,
    Result,
};

/// Tag code of `End`.
pub const TAG_END: u16 = 0;
/// Tag code of `DoABC1` (no flags, no name).
pub const TAG_DO_ABC1: u16 = 72;
/// Tag code of `SymbolClass`.
pub const TAG_SYMBOL_CLASS: u16 = 76;
/// Tag code of `DoABC`.
pub const TAG_DO_ABC: u16 = 82;

const HEADER_SIZE: usize = 8;
const LZMA_PROPS_SIZE: usize = 5;
const SHORT_LENGTH_MAX: usize = 0x3F;

/// Body compression of a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Compression {
    /// `FWS`
    None,
    /// `CWS`
    Zlib,
    /// `ZWS`
    Lzma,
}

impl Compression {
    fn signature(self) -> &'static [u8; 3] {
        match self {
            Compression::None => b"FWS",
            Compression::Zlib => b"CWS",
            Compression::Lzma => b"ZWS",
        }
    }
}

/// One exported-symbol binding of a `SymbolClass` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    /// Character id the class is bound to (0 = the main timeline)
    pub tag_id: u16,
    /// Qualified class name, `package.Class` or `Class`
    pub name: String,
}

/// Decoded content of a tag.
#[derive(Debug, Clone)]
pub enum TagBody {
    /// A tag this crate does not interpret
    Raw(Vec<u8>),
    /// `DoABC`: lazy-initialization flags, unit name and the unit
    DoAbc {
        /// Flags word
        flags: u32,
        /// Name of the unit
        name: String,
        /// The bytecode unit
        unit: Box<AbcFile>,
    },
    /// `DoABC1`: just the unit
    DoAbc1(Box<AbcFile>),
    /// `SymbolClass` records
    SymbolClass(Vec<SymbolRecord>),
}

/// A tag of the movie body.
#[derive(Debug, Clone)]
pub struct Tag {
    /// Tag code
    pub code: u16,
    /// Whether the header used the 6-byte long form although a short one would fit
    pub long_header: bool,
    /// Content
    pub body: TagBody,
}

impl Tag {
    fn read(parser: &mut Parser) -> Result<Self> {
        let code_and_length = parser.read_le::<u16>()?;
        let code = code_and_length >> 6;
        let mut length = usize::from(code_and_length & 0x3F);
        let mut long_header = false;
        if length == SHORT_LENGTH_MAX {
            length = parser.read_le::<u32>()? as usize;
            long_header = length < SHORT_LENGTH_MAX;
        }

        let data = parser.read_bytes(length)?;
        let body = match code {
            TAG_DO_ABC => {
                let mut inner = Parser::new(data);
                let flags = inner.read_le::<u32>()?;
                let name = inner.read_cstring()?;
                TagBody::DoAbc {
                    flags,
                    name,
                    unit: Box::new(AbcFile::parse(inner.read_rest())?),
                }
            }
            TAG_DO_ABC1 => TagBody::DoAbc1(Box::new(AbcFile::parse(data)?)),
            TAG_SYMBOL_CLASS => {
                let mut inner = Parser::new(data);
                let count = inner.read_le::<u16>()?;
                let mut records = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    records.push(SymbolRecord {
                        tag_id: inner.read_le::<u16>()?,
                        name: inner.read_cstring()?,
                    });
                }
                TagBody::SymbolClass(records)
            }
            _ => TagBody::Raw(data.to_vec()),
        };

        Ok(Tag {
            code,
            long_header,
            body,
        })
    }

    fn write(&self, writer: &mut Writer) -> Result<()> {
        let data = match &self.body {
            TagBody::Raw(data) => data.clone(),
            TagBody::DoAbc { flags, name, unit } => {
                let mut inner = Writer::new();
                inner.write_le(*flags);
                inner.write_cstring(name);
                inner.write_bytes(&unit.to_bytes());
                inner.into_inner()
            }
            TagBody::DoAbc1(unit) => unit.to_bytes(),
            TagBody::SymbolClass(records) => {
                let count = u16::try_from(records.len())
                    .map_err(|_| malformed_error!("Too many symbols: {}", records.len()))?;
                let mut inner = Writer::new();
                inner.write_le(count);
                for record in records {
                    inner.write_le(record.tag_id);
                    inner.write_cstring(&record.name);
                }
                inner.into_inner()
            }
        };

        if data.len() >= SHORT_LENGTH_MAX || self.long_header {
            let length = u32::try_from(data.len())
                .map_err(|_| malformed_error!("Tag {} too large: {}", self.code, data.len()))?;
            writer.write_le((self.code << 6) | 0x3F);
            writer.write_le(length);
        } else {
            // length fits in the low 6 bits
            #[allow(clippy::cast_possible_truncation)]
            writer.write_le((self.code << 6) | data.len() as u16);
        }
        writer.write_bytes(&data);
        Ok(())
    }

    /// The bytecode unit carried by a `DoABC`/`DoABC1` tag.
    #[must_use]
    pub fn unit(&self) -> Option<&AbcFile> {
        match &self.body {
            TagBody::DoAbc { unit, .. } | TagBody::DoAbc1(unit) => Some(&**unit),
            _ => None,
        }
    }

    fn unit_mut(&mut self) -> Option<&mut AbcFile> {
        match &mut self.body {
            TagBody::DoAbc { unit, .. } | TagBody::DoAbc1(unit) => Some(&mut **unit),
            _ => None,
        }
    }
}

/// A decoded Shockwave Flash movie.
#[derive(Debug, Clone)]
pub struct Movie {
    compression: Compression,
    version: u8,
    frame: Vec<u8>,
    tags: Vec<Tag>,
    trailing: Vec<u8>,
}

impl Movie {
    /// An empty uncompressed movie: a zero-sized stage at 24 fps, one frame and an `End` tag.
    #[must_use]
    pub fn new(version: u8) -> Self {
        Movie {
            compression: Compression::None,
            version,
            frame: vec![0x00, 0x00, 0x18, 0x01, 0x00],
            tags: vec![Tag {
                code: TAG_END,
                long_header: false,
                body: TagBody::Raw(Vec::new()),
            }],
            trailing: Vec::new(),
        }
    }

    /// Load a movie from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, plus everything
    /// [`Movie::parse`] returns.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Physical::new(path)?)
    }

    /// Load a movie from an owned buffer.
    ///
    /// # Errors
    /// See [`Movie::parse`].
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend>(data: T) -> Result<Self> {
        if data.data().is_empty() {
            return Err(Empty);
        }
        Self::parse(data.data())
    }

    /// Decode a movie.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown signature or a damaged stream,
    /// [`crate::Error::OutOfBounds`] for truncated data and any error of the embedded units.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let compression = match parser.read_bytes(3)? {
            b"FWS" => Compression::None,
            b"CWS" => Compression::Zlib,
            b"ZWS" => Compression::Lzma,
            other => return Err(malformed_error!("Not a movie, signature {:02X?}", other)),
        };
        let version = parser.read_le::<u8>()?;
        let declared = parser.read_le::<u32>()? as usize;

        let body = match compression {
            Compression::None => parser.read_rest().to_vec(),
            Compression::Zlib => inflate_zlib(parser.read_rest(), declared)?,
            Compression::Lzma => {
                let _compressed_length = parser.read_le::<u32>()?;
                inflate_lzma(parser.read_rest(), declared)?
            }
        };
        if body.len() + HEADER_SIZE != declared {
            log::warn!(
                "Movie declares {} bytes but the body holds {}",
                declared,
                body.len() + HEADER_SIZE
            );
        }

        let mut parser = Parser::new(&body);
        let rect_bits = 5 + 4 * usize::from(parser.peek_byte()? >> 3);
        let frame = parser.read_bytes(rect_bits.div_ceil(8) + 4)?.to_vec();

        let mut tags = Vec::new();
        while parser.remaining() >= 2 {
            tags.push(Tag::read(&mut parser)?);
        }
        let trailing = parser.read_rest().to_vec();

        Ok(Movie {
            compression,
            version,
            frame,
            tags,
            trailing,
        })
    }

    /// Body compression the movie was loaded with.
    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Player version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// All tags in file order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Bytecode units in load order.
    pub fn units(&self) -> impl Iterator<Item = &AbcFile> {
        self.tags.iter().filter_map(Tag::unit)
    }

    /// Bytecode units in load order, mutably.
    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut AbcFile> {
        self.tags.iter_mut().filter_map(Tag::unit_mut)
    }

    /// Number of bytecode units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units().count()
    }

    /// The bytecode unit at load position `index`.
    #[must_use]
    pub fn unit(&self, index: usize) -> Option<&AbcFile> {
        self.units().nth(index)
    }

    /// The bytecode unit at load position `index`, mutably.
    pub fn unit_mut(&mut self, index: usize) -> Option<&mut AbcFile> {
        self.units_mut().nth(index)
    }

    /// Every exported-symbol record of every `SymbolClass` tag.
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolRecord> {
        self.tags
            .iter()
            .filter_map(|tag| match &tag.body {
                TagBody::SymbolClass(records) => Some(records),
                _ => None,
            })
            .flatten()
    }

    /// Every exported-symbol record, mutably.
    pub fn symbols_mut(&mut self) -> impl Iterator<Item = &mut SymbolRecord> {
        self.tags
            .iter_mut()
            .filter_map(|tag| match &mut tag.body {
                TagBody::SymbolClass(records) => Some(records),
                _ => None,
            })
            .flatten()
    }

    /// Insert a tag in front of the final `End` tag.
    pub fn push_tag(&mut self, tag: Tag) {
        let position = match self.tags.last() {
            Some(last) if last.code == TAG_END => self.tags.len() - 1,
            _ => self.tags.len(),
        };
        self.tags.insert(position, tag);
    }

    /// Append a bytecode unit as a lazily initialized `DoABC` tag.
    pub fn add_unit(&mut self, name: &str, unit: AbcFile) {
        self.push_tag(Tag {
            code: TAG_DO_ABC,
            long_header: false,
            body: TagBody::DoAbc {
                flags: 1,
                name: name.to_string(),
                unit: Box::new(unit),
            },
        });
    }

    /// Append a `SymbolClass` tag.
    pub fn add_symbols(&mut self, records: Vec<SymbolRecord>) {
        self.push_tag(Tag {
            code: TAG_SYMBOL_CLASS,
            long_header: false,
            body: TagBody::SymbolClass(records),
        });
    }

    /// Encode the movie with its original compression.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a tag outgrows its length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(self.compression)
    }

    /// Encode the movie with the given compression.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a tag outgrows its length field and
    /// [`crate::Error::FileError`] if the compressor fails.
    pub fn to_bytes_with(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut body = Writer::with_capacity(self.frame.len());
        body.write_bytes(&self.frame);
        for tag in &self.tags {
            tag.write(&mut body)?;
        }
        body.write_bytes(&self.trailing);
        let body = body.into_inner();

        let length = u32::try_from(body.len() + HEADER_SIZE)
            .map_err(|_| malformed_error!("Movie too large: {}", body.len()))?;

        let mut out = Writer::with_capacity(body.len() + HEADER_SIZE);
        out.write_bytes(compression.signature());
        out.write_le(self.version);
        out.write_le(length);
        match compression {
            Compression::None => out.write_bytes(&body),
            Compression::Zlib => out.write_bytes(&deflate_zlib(&body)?),
            Compression::Lzma => {
                let packed = deflate_lzma(&body)?;
                let stream_length = u32::try_from(packed.len() - LZMA_PROPS_SIZE)
                    .map_err(|_| malformed_error!("LZMA stream too large: {}", packed.len()))?;
                out.write_le(stream_length);
                out.write_bytes(&packed);
            }
        }
        Ok(out.into_inner())
    }

    /// Write the movie to disk, optionally changing its compression.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be written, plus everything
    /// [`Movie::to_bytes_with`] returns.
    pub fn save(&self, path: impl AsRef<Path>, compression: Option<Compression>) -> Result<()> {
        let bytes = self.to_bytes_with(compression.unwrap_or(self.compression))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn inflate_zlib(data: &[u8], declared: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut body = Vec::with_capacity(declared.saturating_sub(HEADER_SIZE));
    decoder
        .read_to_end(&mut body)
        .map_err(|e| malformed_error!("Damaged zlib body: {}", e))?;
    Ok(body)
}

fn deflate_zlib(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::best());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

// The container drops the 8-byte size field of the `.lzma` format; the size comes from the
// movie header instead.
fn inflate_lzma(data: &[u8], declared: usize) -> Result<Vec<u8>> {
    if data.len() < LZMA_PROPS_SIZE {
        return Err(crate::Error::OutOfBounds);
    }
    let body_size = declared
        .checked_sub(HEADER_SIZE)
        .ok_or_else(|| malformed_error!("Declared length {} below header size", declared))?;

    let mut stream = Vec::with_capacity(data.len() + 8);
    stream.extend_from_slice(&data[..LZMA_PROPS_SIZE]);
    stream.extend_from_slice(&(body_size as u64).to_le_bytes());
    stream.extend_from_slice(&data[LZMA_PROPS_SIZE..]);

    let mut body = Vec::with_capacity(body_size);
    lzma_rs::lzma_decompress(&mut Cursor::new(stream), &mut body)
        .map_err(|e| malformed_error!("Damaged LZMA body: {}", e))?;
    Ok(body)
}

fn deflate_lzma(body: &[u8]) -> Result<Vec<u8>> {
    let mut packed = Vec::new();
    lzma_rs::lzma_compress(&mut Cursor::new(body), &mut packed)?;
    if packed.len() < LZMA_PROPS_SIZE + 8 {
        return Err(malformed_error!("LZMA encoder produced {} bytes", packed.len()));
    }
    packed.drain(LZMA_PROPS_SIZE..LZMA_PROPS_SIZE + 8);
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::UnitBuilder;

    fn sample_movie() -> Movie {
        let unit = UnitBuilder::new()
            .class("Habbo", |class| class.slot("_-1", "String"))
            .build();

        let mut movie = Movie::new(10);
        movie.add_unit("frame1", unit);
        movie.add_symbols(vec![SymbolRecord {
            tag_id: 0,
            name: "com.sulake.habbo.Habbo".to_string(),
        }]);
        movie
    }

    #[test]
    fn test_uncompressed_roundtrip() {
        let bytes = sample_movie().to_bytes().unwrap();
        assert_eq!(&bytes[..3], b"FWS");

        let movie = Movie::parse(&bytes).unwrap();
        assert_eq!(movie.version(), 10);
        assert_eq!(movie.unit_count(), 1);
        assert_eq!(movie.tags().last().unwrap().code, TAG_END);
        assert_eq!(movie.symbols().next().unwrap().name, "com.sulake.habbo.Habbo");
        assert_eq!(movie.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_zlib_roundtrip() {
        let plain = sample_movie().to_bytes().unwrap();
        let packed = sample_movie().to_bytes_with(Compression::Zlib).unwrap();
        assert_eq!(&packed[..3], b"CWS");
        // declared length is the uncompressed size
        assert_eq!(&packed[4..8], &plain[4..8]);

        let movie = Movie::parse(&packed).unwrap();
        assert_eq!(movie.compression(), Compression::Zlib);
        assert_eq!(movie.to_bytes_with(Compression::None).unwrap(), plain);
    }

    #[test]
    fn test_lzma_roundtrip() {
        let plain = sample_movie().to_bytes().unwrap();
        let packed = sample_movie().to_bytes_with(Compression::Lzma).unwrap();
        assert_eq!(&packed[..3], b"ZWS");

        let movie = Movie::parse(&packed).unwrap();
        assert_eq!(movie.compression(), Compression::Lzma);
        assert_eq!(movie.to_bytes_with(Compression::None).unwrap(), plain);
    }

    #[test]
    fn test_long_header_is_preserved() {
        // frame: rect with nbits 0, rate, count; then tag 9 with a long header and 2 bytes
        let mut bytes = b"FWS\x0a".to_vec();
        let body = [0x00, 0x00, 0x18, 0x01, 0x00, 0x7F, 0x02, 0x02, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        bytes.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
        bytes.extend_from_slice(&body);

        let movie = Movie::parse(&bytes).unwrap();
        assert!(movie.tags()[0].long_header);
        assert_eq!(movie.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_symbols_mut() {
        let mut movie = sample_movie();
        for record in movie.symbols_mut() {
            record.name = "Habbo".to_string();
        }
        let reparsed = Movie::parse(&movie.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.symbols().next().unwrap().name, "Habbo");
    }

    #[test]
    fn test_bad_signature() {
        assert!(matches!(
            Movie::parse(b"GIF89a\x00\x00"),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(matches!(Movie::from_mem(Vec::new()), Err(crate::Error::Empty)));
    }

    #[test]
    fn test_compression_names() {
        assert_eq!("zlib".parse::<Compression>().unwrap(), Compression::Zlib);
        assert_eq!(Compression::None.to_string(), "none");
    }
}
