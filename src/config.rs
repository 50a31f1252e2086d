//! Configuration for the patch pipeline.
//!
//! [`GameLayout`] describes where the known patch targets live in the client: which
//! bytecode unit holds which class, which trait ids carry the RSA keys, and the constants
//! the host patch injects. The defaults match the current client layout; a different build
//! can be described by adjusting individual fields.
//!
//! [`PatchConfig`] selects which patches run and with which parameters, mirroring the
//! switches of the command-line front end.

use std::path::PathBuf;

use crate::file::movie::Compression;

/// Number of valid-host patterns captured from the host checker.
pub const MAX_HOST_PATTERNS: usize = 4;

/// Outbound header of the message carrying the client revision.
pub const REVISION_HEADER: u16 = 4000;

/// Public exponent of the stock replacement key pair.
pub const DEFAULT_RSA_EXPONENT: &str = "3";

/// Modulus of the stock replacement key pair.
pub const DEFAULT_RSA_MODULUS: &str = "86851dd364d5c5cece3c883171cc6ddc5760779b992482bd1e20dd296888df91b33b936a7b93f06d29e8870f703a216257dec7c81de0058fea4cc5116f75e6efc4e9113513e45357dc3fd43d4efab5963ef178b78bd61e81a14c603b24c8bcce0a12230b320045498edc29282ff0603bc7b7dae8fc1b05b52b2f301a9dc783b7";

/// Private exponent matching [`DEFAULT_RSA_MODULUS`], for the server side of the stock pair.
pub const DEFAULT_RSA_PRIVATE_EXPONENT: &str = "59ae13e243392e89ded305764bdd9e92e4eafa67bb6dac7e1415e8c645b0950bccd26246fd0d4af37145af5fa026c0ec3a94853013eaae5ff1888360f4f9449ee023762ec195dff3f30ca0b08b8c947e3859877b5d7dced5c8715c58b53740b84e11fbc71349a27c31745fcefeeea57cff291099205e230e0c7c27e8e1c0512b";

/// Location of the patch targets inside the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    /// Unit holding the local-host check (first class, static side).
    pub host_check_unit: usize,
    /// Unit holding the main class with the valid-host checker.
    pub valid_hosts_unit: usize,
    /// Unit holding the messages, key, and communication classes.
    pub communication_unit: usize,

    /// Class whose static initializer registers every message.
    pub messages_class: String,
    /// Class whose methods return the RSA keys.
    pub key_class: String,
    /// Class that connects to the game server.
    pub communication_manager_class: String,
    /// Class that drives the handshake.
    pub handshake_class: String,
    /// Main class holding the valid-host patterns.
    pub main_class: String,

    /// Trait id of the method returning the modulus.
    pub modulus_trait_id: u32,
    /// Trait id of the method returning the exponent.
    pub exponent_trait_id: u32,

    /// Outbound header of the revision-carrying message.
    pub revision_header: u16,

    /// Component property read to find the server host.
    pub host_property: String,
    /// Port value written into the connect method.
    pub host_port_value: i32,
    /// Method on the communication manager that names the connect method.
    pub init_method: String,
}

impl Default for GameLayout {
    fn default() -> Self {
        Self {
            host_check_unit: 0,
            valid_hosts_unit: 1,
            communication_unit: 2,
            messages_class: "HabboMessages".to_string(),
            key_class: "KeyObfuscator".to_string(),
            communication_manager_class: "HabboCommunicationManager".to_string(),
            handshake_class: "HabboCommunicationDemo".to_string(),
            main_class: "Habbo".to_string(),
            modulus_trait_id: 6,
            exponent_trait_id: 7,
            revision_header: REVISION_HEADER,
            host_property: "connection.info.host".to_string(),
            host_port_value: 65290,
            init_method: "initComponent".to_string(),
        }
    }
}

/// Replacement RSA public key, both parts in hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeys {
    /// Public exponent
    pub exponent: String,
    /// Modulus
    pub modulus: String,
    /// Private exponent, when the pair was generated or is the stock one
    pub private: Option<String>,
}

impl RsaKeys {
    /// Key pair from hexadecimal strings.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if either part is empty or not hexadecimal.
    pub fn new(exponent: &str, modulus: &str) -> crate::Result<Self> {
        for (part, value) in [("exponent", exponent), ("modulus", modulus)] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(crate::Error::Error(format!("RSA {part} must be hexadecimal, got {value:?}")));
            }
        }
        let keys = Self {
            exponent: exponent.to_ascii_lowercase(),
            modulus: modulus.to_ascii_lowercase(),
            private: None,
        };
        let stock = Self::default();
        Ok(if keys.exponent == stock.exponent && keys.modulus == stock.modulus {
            stock
        } else {
            keys
        })
    }

    /// Generate a fresh key pair of `bits` bits, keeping its private exponent.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if the generator rejects `bits`.
    pub fn generate(bits: usize) -> crate::Result<Self> {
        use rsa::traits::{PrivateKeyParts, PublicKeyParts};

        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|error| crate::Error::Error(format!("RSA key generation failed: {error}")))?;
        Ok(Self {
            exponent: key.e().to_str_radix(16),
            modulus: key.n().to_str_radix(16),
            private: Some(key.d().to_str_radix(16)),
        })
    }

    /// The private exponent, known for generated pairs and the stock pair.
    #[must_use]
    pub fn private_exponent(&self) -> Option<&str> {
        self.private.as_deref()
    }
}

impl Default for RsaKeys {
    fn default() -> Self {
        Self {
            exponent: DEFAULT_RSA_EXPONENT.to_string(),
            modulus: DEFAULT_RSA_MODULUS.to_string(),
            private: Some(DEFAULT_RSA_PRIVATE_EXPONENT.to_string()),
        }
    }
}

/// Patches and outputs selected for one run.
///
/// The default runs the domain bypass and the RSA replacement with the stock key pair, which
/// is what every modified client needs. Everything else is opt-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    /// Compression of the written movie; `None` keeps the input's.
    pub compression: Option<Compression>,
    /// Where to write the patched movie; `None` lets the front end decide.
    pub output: Option<PathBuf>,
    /// Revision string to write into the client.
    pub revision: Option<String>,
    /// Render the message header tables.
    pub dump_headers: bool,
    /// Make the handshake path unconditional.
    pub disable_handshake: bool,
    /// Bypass the host checks.
    pub bypass_domain_checks: bool,
    /// Replacement RSA keys; `None` leaves the client's keys.
    pub rsa_keys: Option<RsaKeys>,
    /// Rename invalid namespace, class and symbol names.
    pub fix_identifiers: bool,
    /// Give every debug register a readable name.
    pub rename_registers: bool,
    /// Replacement valid-host patterns, in capture order.
    pub host_patterns: Vec<String>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            compression: None,
            output: None,
            revision: None,
            dump_headers: false,
            disable_handshake: false,
            bypass_domain_checks: true,
            rsa_keys: Some(RsaKeys::default()),
            fix_identifiers: false,
            rename_registers: false,
            host_patterns: Vec::new(),
        }
    }
}

impl PatchConfig {
    /// The default selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No patch at all; assembling with this config only round-trips the movie.
    #[must_use]
    pub fn none() -> Self {
        Self {
            bypass_domain_checks: false,
            rsa_keys: None,
            ..Self::default()
        }
    }

    /// Override the output compression.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Write the patched movie to `path`.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Write `revision` into the client.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Render the header tables.
    #[must_use]
    pub fn with_dump_headers(mut self, enabled: bool) -> Self {
        self.dump_headers = enabled;
        self
    }

    /// Disable the handshake.
    #[must_use]
    pub fn with_disable_handshake(mut self, enabled: bool) -> Self {
        self.disable_handshake = enabled;
        self
    }

    /// Bypass the host checks.
    #[must_use]
    pub fn with_domain_bypass(mut self, enabled: bool) -> Self {
        self.bypass_domain_checks = enabled;
        self
    }

    /// Replace the RSA keys.
    #[must_use]
    pub fn with_rsa_keys(mut self, keys: RsaKeys) -> Self {
        self.rsa_keys = Some(keys);
        self
    }

    /// Rename invalid identifiers.
    #[must_use]
    pub fn with_fix_identifiers(mut self, enabled: bool) -> Self {
        self.fix_identifiers = enabled;
        self
    }

    /// Rename debug registers.
    #[must_use]
    pub fn with_rename_registers(mut self, enabled: bool) -> Self {
        self.rename_registers = enabled;
        self
    }

    /// Replace the valid-host patterns; extra patterns beyond [`MAX_HOST_PATTERNS`] are
    /// ignored.
    #[must_use]
    pub fn with_host_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}
