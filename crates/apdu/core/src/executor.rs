//! Executor for APDU command execution
//!
//! [`CardExecutor`] turns [`Command`]s into [`Response`]s on top of a raw
//! [`CardTransport`], transparently collecting `61xx` continuations with
//! GET RESPONSE.

use bytes::BytesMut;
use tracing::{debug, instrument, trace};

use crate::command::Command;
use crate::response::Response;
use crate::transport::CardTransport;
use crate::{Error, Result};

/// Default number of GET RESPONSE round trips per command
pub const DEFAULT_MAX_CHAIN: usize = 10;

const GET_RESPONSE_INS: u8 = 0xC0;

/// Card executor that drives a transport
#[derive(Debug)]
pub struct CardExecutor<T: CardTransport> {
    transport: T,
    max_chain: usize,
    get_response_cla: u8,
}

impl<T: CardTransport> CardExecutor<T> {
    /// Create a new card executor with the given transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            max_chain: DEFAULT_MAX_CHAIN,
            get_response_cla: 0x00,
        }
    }

    /// Limit the number of chained GET RESPONSE commands
    pub const fn with_max_chain(mut self, max_chain: usize) -> Self {
        self.max_chain = max_chain;
        self
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take ownership of the transport and return it
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send a command and return the complete response
    ///
    /// Responses with `61xx` are continued with GET RESPONSE and the payloads
    /// concatenated; the final status word is the one of the last answer.
    #[instrument(level = "trace", skip_all, fields(ins = command.instruction()))]
    pub fn transmit(&mut self, command: &Command) -> Result<Response> {
        command.validate()?;

        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        let mut response = Response::from_bytes(&raw)?;

        let mut chained = 0;
        while let Some(remaining) = response.status().remaining_bytes() {
            if chained == self.max_chain {
                debug!(max_chain = self.max_chain, "GET RESPONSE chain limit reached");
                return Err(Error::ChainLimitExceeded(self.max_chain));
            }
            trace!(remaining, "Fetching remaining response data");

            let get_response =
                Command::new(self.get_response_cla, GET_RESPONSE_INS, 0x00, 0x00).with_le(remaining);
            let raw = self.transport.transmit_raw(&get_response.to_bytes())?;
            let next = Response::from_bytes(&raw)?;

            let mut payload = BytesMut::with_capacity(response.payload().len() + next.payload().len());
            payload.extend_from_slice(response.payload());
            payload.extend_from_slice(next.payload());
            response = Response::new(payload.freeze(), next.status());
            chained += 1;
        }

        Ok(response)
    }

    /// Reset the underlying transport
    pub fn reset(&mut self) -> Result<()> {
        self.transport.reset().map_err(Error::from)
    }
}
