//! Constants used in GlobalPlatform operations
//!
//! This module contains the constants GlobalPlatform cards expect,
//! such as CLA bytes, instruction codes, parameter values, tags and well-known AIDs.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Secure messaging indicator OR-ed into the class byte
    pub const SECURE_MESSAGING: u8 = 0x04;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// GET RESPONSE command
    pub const GET_RESPONSE: u8 = 0xC0;
    /// GET DATA command
    pub const GET_DATA: u8 = 0xCA;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
    /// GET STATUS command
    pub const GET_STATUS: u8 = 0xF2;
}

/// Parameter values for SELECT command (P1)
pub mod select_p1 {
    /// Select by DF name
    pub const BY_NAME: u8 = 0x04;
}

/// Security level byte sent in EXTERNAL AUTHENTICATE (P1)
pub mod external_auth_p1 {
    /// No secure messaging after authentication
    pub const CLEAR: u8 = 0x00;
    /// C-MAC on every command
    pub const CMAC: u8 = 0x01;
    /// C-MAC and command data encryption
    pub const CMAC_ENC: u8 = 0x03;
}

/// Parameter values for INSTALL command (P1)
pub mod install_p1 {
    /// Install for load
    pub const FOR_LOAD: u8 = 0x02;
    /// Install for install
    pub const FOR_INSTALL: u8 = 0x04;
    /// Install for make selectable
    pub const FOR_MAKE_SELECTABLE: u8 = 0x08;
    /// Install for install and make selectable
    pub const FOR_INSTALL_AND_MAKE_SELECTABLE: u8 = FOR_INSTALL | FOR_MAKE_SELECTABLE;
    /// Install for personalization
    pub const FOR_PERSONALIZATION: u8 = 0x20;
}

/// Parameter values for LOAD command (P1)
pub mod load_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Parameter values for GET STATUS command (P1)
pub mod get_status_p1 {
    /// Issuer security domain
    pub const ISSUER_SECURITY_DOMAIN: u8 = 0x80;
    /// Applications, including security domains
    pub const APPLICATIONS: u8 = 0x40;
    /// Executable load files
    pub const EXEC_LOAD_FILES: u8 = 0x20;
    /// Executable load files and their modules
    pub const EXEC_LOAD_FILES_AND_MODULES: u8 = 0x10;
}

/// Parameter values for GET STATUS command (P2)
pub mod get_status_p2 {
    /// Legacy length-prefixed response format
    pub const LEGACY_DATA: u8 = 0x00;
    /// Return data in TLV format
    pub const TLV_DATA: u8 = 0x02;
    /// Continue with the next occurrence
    pub const NEXT_OCCURRENCE: u8 = 0x01;
}

/// Parameter values for DELETE command (P2)
pub mod delete_p2 {
    /// Delete object
    pub const OBJECT: u8 = 0x00;
    /// Delete object and related objects
    pub const OBJECT_AND_RELATED: u8 = 0x80;
}

/// Tags used in GlobalPlatform commands and responses
pub mod tags {
    /// AID tag for DELETE and GET STATUS
    pub const AID: u8 = 0x4F;
    /// Load file data block tag
    pub const LOAD_FILE_DATA_BLOCK: u8 = 0xC4;
    /// Install parameters (application specific)
    pub const INSTALL_PARAMETERS: u8 = 0xC9;
    /// System specific parameters of INSTALL [for load]
    pub const SYSTEM_PARAMETERS: u8 = 0xEF;
    /// Non-volatile code space limit
    pub const NON_VOLATILE_CODE_LIMIT: u8 = 0xC6;
    /// GET STATUS registry entry template
    pub const REGISTRY_ENTRY: u8 = 0xE3;
    /// Life cycle state
    pub const LIFE_CYCLE: u16 = 0x9F70;
    /// Privileges
    pub const PRIVILEGES: u8 = 0xC5;
    /// Executable load file AID
    pub const LOAD_FILE_AID: u8 = 0xC4;
    /// Executable module AID
    pub const MODULE_AID: u8 = 0x84;
    /// Associated security domain AID
    pub const ASSOCIATED_SD: u8 = 0xCC;
    /// Card data (GET DATA)
    pub const CARD_DATA: u8 = 0x66;
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
}

/// Well-known Security Domain AIDs
pub mod sd_aid {
    /// GlobalPlatform issuer security domain
    pub const ISD: &[u8] = &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];
    /// Visa/OpenPlatform card manager
    pub const VISA: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];
    /// Gemalto card manager
    pub const GEMALTO: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x18, 0x43, 0x4D, 0x00];
}

/// Length of the host challenge in bytes
pub const HOST_CHALLENGE_LENGTH: usize = 8;

/// Length of the SCP02 INITIALIZE UPDATE response
pub const INIT_UPDATE_RESPONSE_LENGTH: usize = 28;

/// Default load block size
pub const DEFAULT_LOAD_BLOCK_SIZE: usize = 255;

/// Smallest accepted load block size
pub const MIN_LOAD_BLOCK_SIZE: usize = 17;
