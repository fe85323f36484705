//! Secure channel implementation for GlobalPlatform
//!
//! This module provides the SCP02 (`i=15`) handshake and the [`GPSecureChannel`]
//! state machine that wraps every command sent once the host is authenticated.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use gpman_apdu_core::prelude::*;
use rand::RngCore;
use tracing::{debug, info, instrument, trace, warn};

use crate::Aid;
use crate::commands::{
    ExternalAuthenticateCommand, ExternalAuthenticateResponse, InitUpdateData,
    InitializeUpdateCommand, InitializeUpdateResponse, SelectCommand, SelectResponse,
};
use crate::constants::{cla, scp};
use crate::crypto::{
    CardChallenge, Cryptogram, DERIVATION_DEK, DERIVATION_ENC, DERIVATION_MAC, HostChallenge,
    Scp02Mac, SequenceCounter, calculate_cryptogram, derive_key, encrypt_cbc_padded, encrypt_icv,
    mac_full_3des, padded_len,
};
use crate::diversify::diversify;
use crate::keys::{KeySet, SessionKeys};
use crate::{Error, Result};

/// Largest data field of a short command APDU
const MAX_DATA_LENGTH: usize = 255;
/// Length of the C-MAC appended to each wrapped command
const MAC_LENGTH: usize = 8;

/// Secure channel life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No security domain selected, no keys
    #[default]
    Closed,
    /// Security domain selected, handshake may run
    Initializing,
    /// Host authenticated; commands are wrapped at the negotiated level
    Authenticated,
}

/// Result of the pure part of the SCP02 handshake
///
/// Parses nothing and sends nothing: given the static keys, the card's
/// INITIALIZE UPDATE data and the host challenge it diversifies, derives the
/// session keys, verifies the card cryptogram and computes the host cryptogram.
#[derive(Clone)]
pub struct Scp02Handshake {
    session_keys: SessionKeys,
    sequence_counter: SequenceCounter,
    card_challenge: CardChallenge,
    host_challenge: HostChallenge,
    host_cryptogram: Cryptogram,
}

impl Scp02Handshake {
    /// Run the handshake computation for one INITIALIZE UPDATE response
    pub fn from_init_update(
        keys: &KeySet,
        data: &InitUpdateData,
        host_challenge: &HostChallenge,
    ) -> Result<Self> {
        if data.scp_version() != scp::SCP02 {
            return Err(Error::UnsupportedScpVersion(data.scp_version()));
        }

        let card_keys = diversify(keys, &data.diversification_data);
        let seq = &data.sequence_counter;
        let session_keys = SessionKeys::new(
            derive_key(&card_keys.enc, seq, &DERIVATION_ENC),
            derive_key(&card_keys.mac, seq, &DERIVATION_MAC),
            derive_key(&card_keys.kek, seq, &DERIVATION_DEK),
        );

        let expected = calculate_cryptogram(
            session_keys.enc(),
            seq,
            &data.card_challenge,
            host_challenge,
            false,
        );
        if expected != data.card_cryptogram {
            warn!(
                key_version = data.key_version(),
                "Card cryptogram mismatch, wrong keys or diversification"
            );
            return Err(Error::AuthenticationFailed("card cryptogram mismatch"));
        }

        let host_cryptogram = calculate_cryptogram(
            session_keys.enc(),
            seq,
            &data.card_challenge,
            host_challenge,
            true,
        );

        Ok(Self {
            session_keys,
            sequence_counter: *seq,
            card_challenge: data.card_challenge,
            host_challenge: *host_challenge,
            host_cryptogram,
        })
    }

    /// Derived session keys
    pub const fn session_keys(&self) -> &SessionKeys {
        &self.session_keys
    }

    /// Cryptogram the host sends in EXTERNAL AUTHENTICATE
    pub const fn host_cryptogram(&self) -> &Cryptogram {
        &self.host_cryptogram
    }

    /// Card sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        &self.sequence_counter
    }

    /// Card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        &self.card_challenge
    }

    /// Host challenge
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }
}

impl fmt::Debug for Scp02Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scp02Handshake")
            .field("sequence_counter", &hex::encode(self.sequence_counter))
            .finish_non_exhaustive()
    }
}

/// SCP02 secure channel to a security domain
///
/// Owns the session keys and the chained ICV; both are only touched by
/// [`SecureChannel::wrap`] and discarded on [`SecureChannel::close`].
#[derive(Default)]
pub struct GPSecureChannel {
    state: ChannelState,
    security_level: SecurityLevel,
    keys: Option<SessionKeys>,
    icv: Option<Scp02Mac>,
}

impl fmt::Debug for GPSecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GPSecureChannel")
            .field("state", &self.state)
            .field("security_level", &self.security_level)
            .finish()
    }
}

impl GPSecureChannel {
    /// Create a closed channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Last C-MAC, which seeds the next command's ICV
    pub const fn icv(&self) -> Option<&Scp02Mac> {
        self.icv.as_ref()
    }

    /// Session keys while a handshake result is held
    pub const fn session_keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    /// Select the security domain: Closed → Initializing
    ///
    /// Returns the FCI. On a non-success status the channel stays Closed.
    #[instrument(level = "debug", skip_all, fields(sd = %sd_aid))]
    pub fn open<T: CardTransport>(
        &mut self,
        executor: &mut CardExecutor<T>,
        sd_aid: &Aid,
    ) -> Result<Bytes> {
        self.close();

        let command = SelectCommand::with_aid(sd_aid);
        let response = executor.transmit(&command)?;
        let fci = SelectResponse::from_response(response)?.into_result()?;

        debug!("Security domain selected");
        self.state = ChannelState::Initializing;
        Ok(fci)
    }

    /// Run the handshake with a random host challenge
    pub fn authenticate<T: CardTransport>(
        &mut self,
        executor: &mut CardExecutor<T>,
        keys: &KeySet,
        level: SecurityLevel,
    ) -> Result<()> {
        let mut host_challenge = HostChallenge::default();
        rand::rng().fill_bytes(&mut host_challenge);
        self.authenticate_with_challenge(executor, keys, level, &host_challenge)
    }

    /// Run the handshake with an explicit host challenge: Initializing → Authenticated
    ///
    /// Any failure closes the channel; it has to be reopened from scratch.
    #[instrument(level = "debug", skip_all, fields(key_version = keys.version(), %level))]
    pub fn authenticate_with_challenge<T: CardTransport>(
        &mut self,
        executor: &mut CardExecutor<T>,
        keys: &KeySet,
        level: SecurityLevel,
        host_challenge: &HostChallenge,
    ) -> Result<()> {
        if self.state != ChannelState::Initializing {
            return Err(Error::NoSecureChannel);
        }

        let result = self.handshake(executor, keys, level, host_challenge);
        match &result {
            Ok(()) => {
                self.state = ChannelState::Authenticated;
                self.security_level = level;
                info!(%level, "Secure channel established");
            }
            Err(e) => {
                debug!(error = %e, "Handshake failed, closing channel");
                self.close();
            }
        }
        result
    }

    fn handshake<T: CardTransport>(
        &mut self,
        executor: &mut CardExecutor<T>,
        keys: &KeySet,
        level: SecurityLevel,
        host_challenge: &HostChallenge,
    ) -> Result<()> {
        let command = InitializeUpdateCommand::with_challenge(keys.version(), host_challenge);
        let response = executor.transmit(&command)?;
        let data = InitializeUpdateResponse::from_response(response)?.into_result()?;
        trace!(
            key_version = data.key_version(),
            seq = %hex::encode(data.sequence_counter),
            "INITIALIZE UPDATE accepted"
        );

        let handshake = Scp02Handshake::from_init_update(keys, &data, host_challenge)?;
        self.keys = Some(handshake.session_keys().clone());
        self.icv = None;

        let command = ExternalAuthenticateCommand::with_host_cryptogram(level, handshake.host_cryptogram());
        let wrapped = self.mac_wrap(&command, false)?;
        let response = executor.transmit(&wrapped)?;
        ExternalAuthenticateResponse::from_response(response)?.into_result()
    }

    /// Append a C-MAC, optionally encrypting the data field first
    fn mac_wrap(&mut self, command: &Command, encrypt: bool) -> Result<Command> {
        let keys = self.keys.as_ref().ok_or(Error::NoSecureChannel)?;
        let data = command.data().unwrap_or_default();
        let encrypt = encrypt && !data.is_empty();

        let body_len = if encrypt { padded_len(data.len()) } else { data.len() };
        if body_len + MAC_LENGTH > MAX_DATA_LENGTH {
            return Err(Error::PayloadTooLarge {
                len: body_len + MAC_LENGTH,
                max: MAX_DATA_LENGTH,
            });
        }

        let class = command.class() | cla::SECURE_MESSAGING;

        // MAC is computed over the clear data with Lc covering the MAC
        let mut mac_data = BytesMut::with_capacity(5 + data.len());
        mac_data.put_u8(class);
        mac_data.put_u8(command.instruction());
        mac_data.put_u8(command.p1());
        mac_data.put_u8(command.p2());
        mac_data.put_u8((data.len() + MAC_LENGTH) as u8);
        mac_data.put_slice(data);

        let icv = match &self.icv {
            Some(previous) => encrypt_icv(keys.mac(), previous),
            None => Scp02Mac::default(),
        };
        let mac = mac_full_3des(keys.mac(), &icv, &mac_data);

        let mut body = if encrypt {
            encrypt_cbc_padded(keys.enc(), data)
        } else {
            data.to_vec()
        };
        body.extend_from_slice(&mac);
        self.icv = Some(mac);

        let mut wrapped = Command::new(class, command.instruction(), command.p1(), command.p2())
            .with_data(body);
        if let Some(le) = command.expected_length() {
            wrapped = wrapped.with_le(le);
        }
        Ok(wrapped)
    }
}

impl SecureChannel for GPSecureChannel {
    type Error = Error;

    fn wrap(&mut self, command: &Command) -> Result<Command> {
        if self.state != ChannelState::Authenticated {
            return Err(Error::NoSecureChannel);
        }

        let wrapped = match self.security_level {
            SecurityLevel::Clear => command.clone(),
            SecurityLevel::Mac => self.mac_wrap(command, false)?,
            SecurityLevel::Enc => self.mac_wrap(command, true)?,
        };
        trace!(wrapped = ?wrapped, "Command wrapped");
        Ok(wrapped)
    }

    fn unwrap(&mut self, response: Response) -> Result<Response> {
        // SCP02 i=15 has no response MAC or encryption
        Ok(response)
    }

    fn is_established(&self) -> bool {
        self.state == ChannelState::Authenticated
    }

    fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    fn close(&mut self) {
        if self.state != ChannelState::Closed {
            debug!("Closing GlobalPlatform SCP02 secure channel");
        }
        self.keys = None;
        self.icv = None;
        self.state = ChannelState::Closed;
        self.security_level = SecurityLevel::Clear;
    }
}
