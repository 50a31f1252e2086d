//! The game client driver.
//!
//! [`Game`] wraps a loaded [`Movie`] together with everything the patch pipeline learns about
//! it: the located patch targets, the message registry, the identifier rename memo and the
//! event log. It is the entry point of the crate for the patching workflow:
//!
//! 1. load the movie ([`Game::from_file`], [`Game::from_mem`], [`Game::new`]); targets are
//!    located and the registry is extracted right away,
//! 2. apply patches ([`Game::apply_patch`], or [`Game::run`] with a [`PatchConfig`]),
//! 3. optionally sanitize identifiers ([`Game::sanitize_identifiers`]),
//! 4. write the result ([`Game::assemble`], [`Game::save`]).
//!
//! # Revision and Host Patterns
//!
//! The client revision and the valid-host patterns live in string pool slots found while
//! loading. Their accessors read and write those slots directly; host pattern replacements
//! are written when the game is assembled.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use abcpatch::{patches::Patch, Game};
//!
//! let mut game = Game::from_file("Habbo.swf")?;
//! println!("revision {}", game.revision().unwrap_or("unknown"));
//!
//! let report = game.apply_patch(Patch::DisableHandshake);
//! println!("{report}");
//!
//! game.save("Habbo.patched.swf", None)?;
//! # Ok::<(), abcpatch::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! A [`Game`] is edited through `&mut self` and processes units in load order; the sanitizer's
//! numbering depends on that order. The event log is shareable for reading while no patch
//! runs.

use std::{collections::HashSet, path::Path};

use crate::{
    config::{GameLayout, PatchConfig, MAX_HOST_PATTERNS},
    events::{EventKind, EventLog},
    file::movie::{Compression, Movie},
    patches::{self, Patch, PatchKind, PatchReport, PatchTargets},
    registry::MessageRegistry,
    sanitizer::{self, RenameContext, SanitizeSummary},
    Error, Result,
};

/// A loaded game client and its patch state.
pub struct Game {
    movie: Movie,
    layout: GameLayout,
    events: EventLog,
    renames: RenameContext,
    registry: Option<MessageRegistry>,
    targets: PatchTargets,
    host_patterns: Vec<String>,
    applied: HashSet<PatchKind>,
}

impl Game {
    /// Load a client from disk with the default layout.
    ///
    /// # Errors
    /// Returns the errors of [`Movie::from_file`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Movie::from_file(path)?))
    }

    /// Load a client from an owned buffer with the default layout.
    ///
    /// # Errors
    /// Returns the errors of [`Movie::from_mem`].
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Ok(Self::new(Movie::from_mem(data)?))
    }

    /// Wrap a parsed movie with the default layout.
    #[must_use]
    pub fn new(movie: Movie) -> Self {
        Self::with_layout(movie, GameLayout::default())
    }

    /// Wrap a parsed movie whose targets live where `layout` says.
    #[must_use]
    pub fn with_layout(movie: Movie, layout: GameLayout) -> Self {
        let mut game = Game {
            movie,
            layout,
            events: EventLog::new(),
            renames: RenameContext::new(),
            registry: None,
            targets: PatchTargets::default(),
            host_patterns: Vec::new(),
            applied: HashSet::new(),
        };
        game.locate_patch_targets();
        if let Err(error) = game.build_message_registry().map(|_| ()) {
            log::warn!("Message registry unavailable: {error}");
            game.events.warn(format!("message registry unavailable: {error}"));
        }
        game
    }

    /// The underlying movie.
    #[must_use]
    pub fn movie(&self) -> &Movie {
        &self.movie
    }

    /// The target layout in use.
    #[must_use]
    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Every event recorded so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The located patch targets.
    #[must_use]
    pub fn targets(&self) -> &PatchTargets {
        &self.targets
    }

    /// The message registry, if it could be extracted.
    #[must_use]
    pub fn registry(&self) -> Option<&MessageRegistry> {
        self.registry.as_ref()
    }

    /// Re-run every target locator and recapture the valid-host patterns.
    pub fn locate_patch_targets(&mut self) -> &PatchTargets {
        self.targets = PatchTargets::locate(&self.movie, &self.layout, &self.events);
        self.host_patterns = self
            .targets
            .valid_hosts
            .as_ref()
            .map(|hosts| hosts.patterns.iter().map(|p| p.value.clone()).collect())
            .unwrap_or_default();
        &self.targets
    }

    /// Extract the message registry from the messages class.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the unit or class is missing, plus the errors of
    /// [`MessageRegistry::extract`].
    pub fn build_message_registry(&mut self) -> Result<&MessageRegistry> {
        let index = self.layout.communication_unit;
        let unit = patches::unit(&self.movie, index)?;
        let class = patches::class(unit, &self.layout.messages_class)?;
        let registry = MessageRegistry::extract(unit, index, class, self.layout.revision_header, &self.events)?;
        let registry: &MessageRegistry = self.registry.insert(registry);
        Ok(registry)
    }

    /// Run one patch. Each kind runs at most once per game; a repeated request is rejected
    /// without touching the movie.
    pub fn apply_patch(&mut self, patch: Patch) -> PatchReport {
        let kind = patch.kind();
        if self.applied.contains(&kind) {
            let report = PatchReport::from_result(kind, Err(unsupported_edit!("{kind} was already applied")));
            report.record(&self.events);
            return report;
        }

        let result = match patch {
            Patch::ReplaceRsaKeys(keys) => self.replace_rsa_keys(&keys),
            Patch::BypassDomainChecks => self.bypass_domain_checks(),
            Patch::DisableHostPrepender => self.disable_host_prepender(),
            Patch::DisableHandshake => self.disable_handshake(),
            Patch::RenameRegisters => {
                patches::registers::apply(&mut self.movie, &self.events);
                Ok(())
            }
        };

        let report = PatchReport::from_result(kind, result);
        if report.is_applied() {
            self.applied.insert(kind);
        }
        log::info!("{report}");
        report.record(&self.events);
        report
    }

    fn replace_rsa_keys(&mut self, keys: &crate::config::RsaKeys) -> Result<()> {
        let targets = self
            .targets
            .rsa
            .ok_or_else(|| Error::NotFound("RSA key methods".to_string()))?;
        patches::rsa::apply(&mut self.movie, &targets, keys, &self.events)
    }

    fn bypass_domain_checks(&mut self) -> Result<()> {
        let checks: Vec<_> = self
            .targets
            .local_host_check
            .into_iter()
            .chain(self.targets.valid_hosts.as_ref().map(|hosts| hosts.method))
            .collect();
        // both edits are staged before either is committed
        let host = if self.applied.contains(&PatchKind::DisableHostPrepender) {
            None
        } else {
            let targets = self
                .targets
                .host_prepender
                .ok_or_else(|| Error::NotFound("host prepender".to_string()))?;
            Some(patches::host::prepare(&self.movie, &targets, &self.layout)?)
        };
        let bypass = patches::domain::prepare_bypass(&self.movie, &checks)?;

        bypass.commit(&mut self.movie, &self.events)?;
        if let Some(host) = host {
            host.commit(&mut self.movie, &self.layout, &self.events)?;
            self.applied.insert(PatchKind::DisableHostPrepender);
        }
        Ok(())
    }

    fn disable_host_prepender(&mut self) -> Result<()> {
        let targets = self
            .targets
            .host_prepender
            .ok_or_else(|| Error::NotFound("host prepender".to_string()))?;
        patches::host::apply(&mut self.movie, &targets, &self.layout, &self.events)
    }

    fn disable_handshake(&mut self) -> Result<()> {
        let target = self
            .targets
            .handshake
            .ok_or_else(|| Error::NotFound("handshake branch".to_string()))?;
        patches::handshake::apply(&mut self.movie, &target, &self.events)
    }

    /// Rename every invalid namespace, class and symbol name. Safe to call repeatedly; a
    /// second call finds nothing left to rename.
    pub fn sanitize_identifiers(&mut self) -> SanitizeSummary {
        sanitizer::sanitize_identifiers(&mut self.movie, &mut self.renames, &self.events)
    }

    /// The rename memo of this game.
    #[must_use]
    pub fn renames(&self) -> &RenameContext {
        &self.renames
    }

    /// The client revision, read from its pool slot.
    #[must_use]
    pub fn revision(&self) -> Option<&str> {
        let slot = self.registry.as_ref()?.revision_slot?;
        self.movie
            .unit(self.layout.communication_unit)?
            .pool
            .string(slot)
    }

    /// Overwrite the client revision in place.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no revision slot was found, and the errors of
    /// [`crate::abc::ConstantPool::set_string`].
    pub fn set_revision(&mut self, revision: &str) -> Result<()> {
        let slot = self
            .registry
            .as_ref()
            .and_then(|registry| registry.revision_slot)
            .ok_or_else(|| Error::NotFound("revision slot".to_string()))?;
        let unit = patches::unit_mut(&mut self.movie, self.layout.communication_unit)?;
        unit.pool.set_string(slot, revision)?;
        self.events
            .record(EventKind::ConstantRewritten)
            .message(format!("revision -> {revision}"));
        Ok(())
    }

    /// The valid-host patterns: the captured ones, or their pending replacements.
    #[must_use]
    pub fn valid_host_patterns(&self) -> &[String] {
        &self.host_patterns
    }

    /// Replace the valid-host patterns, in capture order. Only as many patterns as were
    /// captured (at most [`MAX_HOST_PATTERNS`]) are kept; blank entries keep the captured
    /// pattern. The patterns are written when the game is assembled.
    pub fn set_valid_host_patterns<S: AsRef<str>>(&mut self, patterns: &[S]) {
        for (current, replacement) in self.host_patterns.iter_mut().zip(patterns).take(MAX_HOST_PATTERNS) {
            let replacement: &str = replacement.as_ref();
            if !replacement.trim().is_empty() {
                *current = replacement.to_string();
            }
        }
    }

    /// Render the header tables, or `None` without a registry.
    #[must_use]
    pub fn dump_headers(&self) -> Option<String> {
        let registry = self.registry.as_ref()?;
        let unit = self.movie.unit(self.layout.communication_unit)?;
        Some(registry.dump(unit))
    }

    /// Apply everything `config` selects, returning one report per patch that ran.
    ///
    /// Identifier sanitization runs first so reports and dumps show the final names.
    /// Revision and host pattern failures are logged, not reported.
    pub fn run(&mut self, config: &PatchConfig) -> Vec<PatchReport> {
        if config.fix_identifiers {
            self.sanitize_identifiers();
        }
        if let Some(revision) = &config.revision {
            if let Err(error) = self.set_revision(revision) {
                log::warn!("Revision not written: {error}");
                self.events.warn(format!("revision not written: {error}"));
            }
        }
        if !config.host_patterns.is_empty() {
            self.set_valid_host_patterns(config.host_patterns.as_slice());
        }

        let mut requests = Vec::new();
        if config.bypass_domain_checks {
            requests.push(Patch::BypassDomainChecks);
        }
        if let Some(keys) = &config.rsa_keys {
            requests.push(Patch::ReplaceRsaKeys(keys.clone()));
        }
        if config.disable_handshake {
            requests.push(Patch::DisableHandshake);
        }
        if config.rename_registers {
            requests.push(Patch::RenameRegisters);
        }
        requests
            .into_iter()
            .map(|patch| self.apply_patch(patch))
            .collect()
    }

    /// Write pending host patterns and encode the movie.
    ///
    /// # Errors
    /// Returns the errors of [`Movie::to_bytes_with`] and pattern slot errors.
    pub fn assemble(&mut self, compression: Option<Compression>) -> Result<Vec<u8>> {
        self.write_host_patterns()?;
        let compression = compression.unwrap_or_else(|| self.movie.compression());
        self.movie.to_bytes_with(compression)
    }

    /// Assemble and write the movie to `path`.
    ///
    /// # Errors
    /// Returns the errors of [`Game::assemble`] and [`Error::FileError`].
    pub fn save(&mut self, path: impl AsRef<Path>, compression: Option<Compression>) -> Result<()> {
        self.write_host_patterns()?;
        self.movie.save(path, compression)
    }

    fn write_host_patterns(&mut self) -> Result<()> {
        let Some(hosts) = self.targets.valid_hosts.as_mut() else {
            return Ok(());
        };
        let pending: Vec<String> = hosts
            .patterns
            .iter()
            .zip(&self.host_patterns)
            .map(|(captured, wanted)| if captured.value == *wanted { String::new() } else { wanted.clone() })
            .collect();
        patches::domain::write_patterns(&mut self.movie, hosts, &pending, &self.events)?;
        for (captured, wanted) in hosts.patterns.iter_mut().zip(&self.host_patterns) {
            captured.value.clone_from(wanted);
        }
        Ok(())
    }

    /// Human-readable summary of the modifications made so far.
    #[must_use]
    pub fn summary(&self) -> String {
        self.events.summary()
    }

    /// Consume the game, returning the movie.
    #[must_use]
    pub fn into_movie(self) -> Movie {
        self.movie
    }
}
