//! Transport traits for APDU communication with cards
//!
//! A transport is responsible for sending and receiving raw APDU bytes.
//! It has no knowledge of command structure, secure channels, or protocol details.

pub mod error;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, info, trace};

use crate::response::utils::extract_status_and_payload;

/// Trait for basic card transports
///
/// Implementations are synchronous: one command in, one response out.
pub trait CardTransport: fmt::Debug {
    /// Send raw APDU bytes to card and return response bytes
    ///
    /// This method should not interpret the contents or handle protocol-specific
    /// operations like GET RESPONSE.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    ///
    /// This is the method that concrete implementations should override.
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Check if the transport is connected to a card
    fn is_connected(&self) -> bool {
        true
    }

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }
}

/// Transport decorator that logs every exchange at `info` level
///
/// Wraps any [`CardTransport`] and reports command, response and status word,
/// which is the usual way to get an APDU trace of a management session.
#[derive(Debug)]
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: CardTransport> LoggingTransport<T> {
    /// Wrap a transport
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    /// The wrapped transport
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    /// Mutable access to the wrapped transport
    pub const fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap the decorator
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: CardTransport> CardTransport for LoggingTransport<T> {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        info!(apdu = %hex::encode_upper(command), ">>");
        let response = self.inner.transmit_raw(command)?;
        match extract_status_and_payload(&response) {
            Ok((status, payload)) => info!(
                data = %hex::encode_upper(payload),
                sw = %status,
                "<< {}",
                status.description()
            ),
            Err(_) => info!(raw = %hex::encode_upper(&response), "<< short response"),
        }
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.inner.reset()
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_logging_transport_is_transparent() {
        let mut transport = LoggingTransport::new(MockTransport::new(&[&hex!("0102039000")]));
        let response = transport.transmit_raw(&hex!("00A4040000")).unwrap();
        assert_eq!(response.as_ref(), hex!("0102039000"));
        assert_eq!(transport.inner().commands.len(), 1);

        assert_eq!(
            transport.transmit_raw(&hex!("00A4040000")),
            Err(TransportError::Transmission)
        );
    }

    #[test]
    fn test_mut_ref_forwarding() {
        let mut mock = MockTransport::new(&[&hex!("9000")]);
        {
            let mut by_ref = &mut mock;
            by_ref.transmit_raw(&hex!("80CA006600")).unwrap();
        }
        assert_eq!(mock.commands[0].as_ref(), hex!("80CA006600"));
    }
}
