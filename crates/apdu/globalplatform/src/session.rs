//! Card session
//!
//! A [`Session`] drives one card connection: it selects the security domain,
//! runs the SCP02 handshake and then passes every management command through
//! the secure channel.

use bytes::Bytes;
use gpman_apdu_core::prelude::*;
use tracing::{debug, info, warn};

use crate::cap::CapFile;
use crate::commands::{GetDataCommand, InstallCommand};
use crate::config::SessionConfig;
use crate::crypto::HostChallenge;
use crate::secure_channel::GPSecureChannel;
use crate::{Aid, Error, Result};

/// One card connection with its configuration and secure channel
#[derive(Debug)]
pub struct Session<T: CardTransport> {
    executor: CardExecutor<T>,
    config: SessionConfig,
    channel: GPSecureChannel,
}

impl<T: CardTransport> Session<T> {
    /// Create a session over a connected transport
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            executor: CardExecutor::new(transport),
            config,
            channel: GPSecureChannel::new(),
        }
    }

    /// Session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Secure channel state
    pub const fn channel(&self) -> &GPSecureChannel {
        &self.channel
    }

    /// Get the executor
    pub const fn executor(&self) -> &CardExecutor<T> {
        &self.executor
    }

    /// Get a mutable reference to the executor
    pub const fn executor_mut(&mut self) -> &mut CardExecutor<T> {
        &mut self.executor
    }

    /// Close the channel and give the transport back
    pub fn into_transport(mut self) -> T {
        self.channel.close();
        self.executor.into_transport()
    }

    /// Select the configured security domain; returns its FCI
    pub fn open(&mut self) -> Result<Bytes> {
        let sd_aid = self.config.sd_aid().clone();
        self.channel.open(&mut self.executor, &sd_aid)
    }

    /// Authenticate with a random host challenge
    pub fn authenticate(&mut self) -> Result<()> {
        self.channel.authenticate(
            &mut self.executor,
            self.config.key_set(),
            self.config.security_level(),
        )
    }

    /// Authenticate with a caller supplied host challenge
    pub fn authenticate_with_challenge(&mut self, host_challenge: &HostChallenge) -> Result<()> {
        self.channel.authenticate_with_challenge(
            &mut self.executor,
            self.config.key_set(),
            self.config.security_level(),
            host_challenge,
        )
    }

    /// Select the security domain and authenticate
    pub fn open_secure_channel(&mut self) -> Result<()> {
        self.open()?;
        self.authenticate()
    }

    /// Wrap, send and unwrap one command
    ///
    /// Fails with [`Error::NoSecureChannel`] before authentication. A transport
    /// failure closes the channel.
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        let wrapped = self.channel.wrap(command)?;
        let response = match self.executor.transmit(&wrapped) {
            Ok(response) => response,
            Err(e) => {
                let error = Error::from(e);
                if matches!(error, Error::Transport(_)) {
                    warn!(error = %error, "Transport failed, closing secure channel");
                    self.channel.close();
                }
                return Err(error);
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(ins = command.instruction(), %status, "Card returned non-success status");
        }
        self.channel.unwrap(response)
    }

    /// Send a typed command and parse its typed response
    pub fn execute<C: ApduCommand>(&mut self, command: &C) -> Result<C::Response> {
        let response = self.transmit(command.command())?;
        Ok(C::Response::from_response(response)?)
    }

    /// INSTALL [for install and make selectable]
    ///
    /// The instance AID defaults to the applet class AID.
    pub fn install_and_make_selectable(
        &mut self,
        package: &Aid,
        applet: &Aid,
        instance: Option<&Aid>,
        privileges: u8,
        params: &[u8],
    ) -> Result<()> {
        let instance = instance.unwrap_or(applet);
        let command = InstallCommand::for_install_and_make_selectable(
            package,
            applet,
            instance,
            privileges,
            params,
        );
        self.execute(&command)?.into_result()?;
        info!(%instance, "Applet installed");
        Ok(())
    }

    /// Install every applet declared by a CAP file under its class AID
    pub fn install_applets(&mut self, cap: &CapFile, privileges: u8, params: &[u8]) -> Result<Vec<Aid>> {
        let package = cap.package_aid().clone();
        let mut installed = Vec::with_capacity(cap.applet_aids().len());
        for applet in cap.applet_aids() {
            self.install_and_make_selectable(&package, applet, None, privileges, params)?;
            installed.push(applet.clone());
        }
        Ok(installed)
    }

    /// INSTALL [for personalization] of an application
    pub fn install_for_personalization(&mut self, application: &Aid) -> Result<()> {
        self.execute(&InstallCommand::for_personalization(application))?
            .into_result()
    }

    /// GET DATA for the card recognition data (`66`)
    pub fn card_data(&mut self) -> Result<Bytes> {
        self.execute(&GetDataCommand::card_data())?.into_result()
    }

    /// Close the secure channel, discarding the session keys
    pub fn close(&mut self) {
        debug!("Closing session");
        self.channel.close();
    }
}
