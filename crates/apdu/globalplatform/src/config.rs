//! Session configuration
//!
//! A [`SessionConfig`] is built once, validated, and handed to
//! [`Session::new`](crate::Session::new). Nothing in it changes while a
//! session runs.

use gpman_apdu_core::SecurityLevel;

use crate::constants::{DEFAULT_LOAD_BLOCK_SIZE, MIN_LOAD_BLOCK_SIZE};
use crate::keys::KeySet;
use crate::registry::RegistryFormat;
use crate::{Aid, Error, Result};

/// How a CAP file is sent to the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Send the Descriptor and Debug components
    pub include_debug: bool,
    /// Never let a LOAD block span two components
    pub component_separated: bool,
    /// Largest LOAD data field including secure messaging overhead, 17..=255
    pub block_size: usize,
    /// Send the Load File Data Block hash in INSTALL [for load]
    pub include_hash: bool,
    /// Non-volatile code space limit announced in INSTALL [for load]
    pub code_size: Option<u16>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            include_debug: false,
            component_separated: false,
            block_size: DEFAULT_LOAD_BLOCK_SIZE,
            include_hash: false,
            code_size: None,
        }
    }
}

impl LoadOptions {
    /// Check the block size bounds
    pub fn validate(&self) -> Result<()> {
        if !(MIN_LOAD_BLOCK_SIZE..=DEFAULT_LOAD_BLOCK_SIZE).contains(&self.block_size) {
            return Err(Error::InvalidConfig("load block size must be within 17..=255"));
        }
        Ok(())
    }
}

/// Immutable configuration for one card session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    key_set: KeySet,
    sd_aid: Aid,
    security_level: SecurityLevel,
    load_options: LoadOptions,
    registry_format: RegistryFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_set: KeySet::default_test_keys(),
            sd_aid: Aid::ISD,
            security_level: SecurityLevel::Mac,
            load_options: LoadOptions::default(),
            registry_format: RegistryFormat::Auto,
        }
    }
}

impl SessionConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Static keys used for the handshake
    pub const fn key_set(&self) -> &KeySet {
        &self.key_set
    }

    /// Security domain selected before authenticating
    pub const fn sd_aid(&self) -> &Aid {
        &self.sd_aid
    }

    /// Security level requested in EXTERNAL AUTHENTICATE
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// CAP loading options
    pub const fn load_options(&self) -> &LoadOptions {
        &self.load_options
    }

    /// GET STATUS response format
    pub const fn registry_format(&self) -> RegistryFormat {
        self.registry_format
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Use these static keys
    pub fn key_set(mut self, key_set: KeySet) -> Self {
        self.config.key_set = key_set;
        self
    }

    /// Select this security domain instead of the ISD
    pub fn sd_aid(mut self, aid: Aid) -> Self {
        self.config.sd_aid = aid;
        self
    }

    /// Request this security level
    pub const fn security_level(mut self, level: SecurityLevel) -> Self {
        self.config.security_level = level;
        self
    }

    /// Replace all load options
    pub const fn load_options(mut self, options: LoadOptions) -> Self {
        self.config.load_options = options;
        self
    }

    /// Largest LOAD data field
    pub const fn block_size(mut self, block_size: usize) -> Self {
        self.config.load_options.block_size = block_size;
        self
    }

    /// Send Descriptor and Debug components
    pub const fn include_debug(mut self, include_debug: bool) -> Self {
        self.config.load_options.include_debug = include_debug;
        self
    }

    /// Keep LOAD blocks within component boundaries
    pub const fn component_separated(mut self, separated: bool) -> Self {
        self.config.load_options.component_separated = separated;
        self
    }

    /// Send the load file hash
    pub const fn include_hash(mut self, include_hash: bool) -> Self {
        self.config.load_options.include_hash = include_hash;
        self
    }

    /// Announce a non-volatile code space limit when loading
    pub const fn code_size(mut self, code_size: Option<u16>) -> Self {
        self.config.load_options.code_size = code_size;
        self
    }

    /// GET STATUS response format
    pub const fn registry_format(mut self, format: RegistryFormat) -> Self {
        self.config.registry_format = format;
        self
    }

    /// Gemalto card manager with the `GEMXPRESSOSAMPLE` mother key and VISA2 diversification
    pub fn gemalto_defaults(mut self) -> Self {
        self.config.sd_aid = Aid::GEMALTO_CARD_MANAGER;
        self.config.key_set = KeySet::gemalto_defaults();
        self
    }

    /// Validate and finish
    pub fn build(self) -> Result<SessionConfig> {
        self.config.load_options.validate()?;
        if self.config.key_set.version() > KeySet::MAX_VERSION {
            return Err(Error::InvalidConfig("key set version must be within 0..=127"));
        }
        Ok(self.config)
    }
}
