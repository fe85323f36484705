//! GlobalPlatform command definitions
//!
//! Each command is a newtype over [`Command`](gpman_apdu_core::Command) with builders for its layouts and
//! a typed response implementing [`FromApduResponse`](gpman_apdu_core::FromApduResponse). Commands are built in the
//! clear; secure messaging is applied by the session's secure channel.

/// Declare a command newtype bound to its response type
macro_rules! apdu_command {
    ($(#[$meta:meta])* $name:ident => $response:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, derive_more::Deref)]
        pub struct $name(gpman_apdu_core::Command);

        impl gpman_apdu_core::ApduCommand for $name {
            type Response = $response;

            fn command(&self) -> &gpman_apdu_core::Command {
                &self.0
            }
        }

        impl From<$name> for gpman_apdu_core::Command {
            fn from(command: $name) -> Self {
                command.0
            }
        }
    };
}

/// Declare a response that is fully described by its status word
///
/// Generates `Success`, one variant per listed status word and `Other` for the
/// rest, plus `status()` and `into_result()`.
macro_rules! status_response {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $sw:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            /// Success (9000)
            Success,
            $( $(#[$vmeta])* $variant, )*
            /// Any other status word
            Other(gpman_apdu_core::StatusWord),
        }

        impl $name {
            /// Status word the card returned
            pub const fn status(&self) -> gpman_apdu_core::StatusWord {
                match self {
                    Self::Success => gpman_apdu_core::StatusWord::SUCCESS,
                    $( Self::$variant => $sw, )*
                    Self::Other(status) => *status,
                }
            }

            /// Returns true if the card accepted the command
            pub const fn is_success(&self) -> bool {
                matches!(self, Self::Success)
            }

            /// `Ok(())` on success, the status word as a card rejection otherwise
            pub fn into_result(self) -> crate::Result<()> {
                match self {
                    Self::Success => Ok(()),
                    other => Err(crate::Error::CardRejected(other.status())),
                }
            }
        }

        impl gpman_apdu_core::FromApduResponse for $name {
            fn from_response(
                response: gpman_apdu_core::Response,
            ) -> Result<Self, gpman_apdu_core::response::error::ResponseError> {
                let status = response.status();
                Ok(match status {
                    gpman_apdu_core::StatusWord::SUCCESS => Self::Success,
                    $( s if s == $sw => Self::$variant, )*
                    other => Self::Other(other),
                })
            }
        }
    };
}

pub(crate) use apdu_command;
pub(crate) use status_response;

pub mod delete;
pub mod external_authenticate;
pub mod get_data;
pub mod get_response;
pub mod get_status;
pub mod initialize_update;
pub mod install;
pub mod load;
pub mod select;

// Re-exports for convenience
pub use delete::{DeleteCommand, DeleteResponse};
pub use external_authenticate::{ExternalAuthenticateCommand, ExternalAuthenticateResponse};
pub use get_data::{GetDataCommand, GetDataResponse};
pub use get_response::{GetResponseCommand, GetResponseResponse};
pub use get_status::{GetStatusCommand, GetStatusResponse};
pub use initialize_update::{InitUpdateData, InitializeUpdateCommand, InitializeUpdateResponse};
pub use install::{InstallCommand, InstallResponse};
pub use load::{LoadCommand, LoadResponse};
pub use select::{SelectCommand, SelectResponse};
