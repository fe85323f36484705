//! GlobalPlatform card content management
//!
//! This crate authenticates to a card's Security Domain with SCP02, loads CAP
//! files, installs and deletes applications and reads the card registry.
//!
//! The main entry point is [`Session`], which drives one card connection
//! through the [`GPSecureChannel`]. [`Plan`] sequences the usual management
//! steps (delete, format, load, install, list) and reports one outcome per card.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod aid;
pub mod cap;
pub mod commands;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod diversify;
pub mod error;
pub mod keys;
pub mod load;
pub mod plan;
pub mod registry;
pub mod secure_channel;
pub mod session;

// Re-exports
pub use aid::Aid;
pub use cap::{CapFile, ComponentKind};
pub use config::{LoadOptions, SessionConfig, SessionConfigBuilder};
pub use error::{Error, Result};
pub use keys::{Diversification, KeySet, SessionKeys};
pub use load::{LoadCommandStream, LoadReport};
pub use plan::{CardOutcome, InstallEntry, Plan, Step, StepOutcome, run_all};
pub use registry::{
    DeleteReport, EntryKind, LifeCycle, Privileges, Registry, RegistryEntry, RegistryFormat,
    StatusScope,
};
pub use secure_channel::{ChannelState, GPSecureChannel, Scp02Handshake};
pub use session::Session;

// Re-export from gpman_apdu_core for convenience
pub use gpman_apdu_core::{CardTransport, LoggingTransport, SecurityLevel, StatusWord};

// Export main commands
pub use commands::{
    DeleteCommand, DeleteResponse, ExternalAuthenticateCommand, ExternalAuthenticateResponse,
    GetDataCommand, GetDataResponse, GetStatusCommand, GetStatusResponse, InitializeUpdateCommand,
    InitializeUpdateResponse, InstallCommand, InstallResponse, LoadCommand, LoadResponse,
    SelectCommand, SelectResponse,
};

