//! EXTERNAL AUTHENTICATE command for GlobalPlatform
//!
//! This command is used to authenticate the host to the card
//! and establish a secure channel. It is always sent with a C-MAC.

use bytes::Bytes;
use gpman_apdu_core::{Command, SecurityLevel, StatusWord};

use super::{apdu_command, status_response};
use crate::constants::{cla, external_auth_p1, ins};
use crate::crypto::Cryptogram;

apdu_command! {
    /// EXTERNAL AUTHENTICATE command for GlobalPlatform
    ExternalAuthenticateCommand => ExternalAuthenticateResponse
}

impl ExternalAuthenticateCommand {
    /// Create a new EXTERNAL AUTHENTICATE command with host cryptogram
    ///
    /// The command is built in the clear; the secure channel adds the C-MAC.
    pub fn with_host_cryptogram(level: SecurityLevel, host_cryptogram: &Cryptogram) -> Self {
        Self(Command::new_with_data(
            cla::GP,
            ins::EXTERNAL_AUTHENTICATE,
            level_byte(level),
            0x00,
            Bytes::copy_from_slice(host_cryptogram),
        ))
    }
}

/// P1 security level byte for a session security level
pub const fn level_byte(level: SecurityLevel) -> u8 {
    match level {
        SecurityLevel::Clear => external_auth_p1::CLEAR,
        SecurityLevel::Mac => external_auth_p1::CMAC,
        SecurityLevel::Enc => external_auth_p1::CMAC_ENC,
    }
}

status_response! {
    /// EXTERNAL AUTHENTICATE response
    ExternalAuthenticateResponse {
        /// Host cryptogram rejected (6300)
        VerificationFailed = StatusWord::new(0x63, 0x00),
        /// Security status not satisfied (6982)
        SecurityStatusNotSatisfied = StatusWord::SECURITY_CONDITION_NOT_SATISFIED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpman_apdu_core::{FromApduResponse, Response};
    use hex_literal::hex;

    #[test]
    fn test_external_authenticate_command() {
        let cmd = ExternalAuthenticateCommand::with_host_cryptogram(
            SecurityLevel::Mac,
            &hex!("1d4de92eaf7a2c9f"),
        );
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80820100081d4de92eaf7a2c9f"));

        let cmd = ExternalAuthenticateCommand::with_host_cryptogram(
            SecurityLevel::Enc,
            &hex!("1d4de92eaf7a2c9f"),
        );
        assert_eq!(cmd.p1(), 0x03);
    }

    #[test]
    fn test_external_authenticate_response() {
        let ok = ExternalAuthenticateResponse::from_response(Response::success(Bytes::new())).unwrap();
        assert!(ok.is_success());

        let failed =
            ExternalAuthenticateResponse::from_response(Response::error((0x63, 0x00))).unwrap();
        assert_eq!(failed, ExternalAuthenticateResponse::VerificationFailed);
        assert_eq!(failed.status(), StatusWord::new(0x63, 0x00));
        assert!(failed.into_result().is_err());
    }
}
