use std::path::PathBuf;

use abcpatch::file::movie::Compression;
use clap::Parser;

/// abcpatch - patch the Habbo Flash client for a custom server
#[derive(Debug, Parser)]
#[command(name = "abcpatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the client movie.
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// Compression of the written movie: none, zlib or lzma. Defaults to the input's.
    #[arg(short, long, value_name = "MODE")]
    pub compression: Option<Compression>,

    /// Output path. Defaults to `<revision>/Habbo.swf` next to the input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overwrite the client revision.
    #[arg(long = "rev", value_name = "REVISION")]
    pub revision: Option<String>,

    /// Write the message header tables to `Headers.txt`.
    #[arg(long)]
    pub dump_headers: bool,

    /// Make the handshake block unconditional.
    #[arg(long)]
    pub disable_handshake: bool,

    /// Replacement RSA key, exponent and modulus in hexadecimal.
    #[arg(long, num_args = 2, value_names = ["EXPONENT", "MODULUS"])]
    pub rsa: Option<Vec<String>>,

    /// Generate a fresh RSA key pair of BITS bits; its private exponent goes to `RSAKeys.txt`.
    #[arg(long, value_name = "BITS", conflicts_with = "rsa")]
    pub genrsa: Option<usize>,

    /// Keep the client's RSA key.
    #[arg(long, conflicts_with_all = ["rsa", "genrsa"])]
    pub keep_rsa: bool,

    /// Keep the client's host checks.
    #[arg(long)]
    pub keep_domain_checks: bool,

    /// Rename invalid namespace, class and symbol names.
    #[arg(long)]
    pub fix_identifiers: bool,

    /// Name every debug register `_local<n>`.
    #[arg(long)]
    pub rename_registers: bool,

    /// Replacement valid-host patterns, in order. Pass "" to keep a pattern.
    #[arg(long, num_args = 1..=4, value_name = "PATTERN")]
    pub patterns: Vec<String>,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
