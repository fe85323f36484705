//! DELETE command for GlobalPlatform
//!
//! This command is used to delete applications, packages, and other objects.

use gpman_apdu_core::{Command, StatusWord};

use super::{apdu_command, status_response};
use crate::Aid;
use crate::constants::{cla, delete_p2, ins, tags};

apdu_command! {
    /// DELETE command for GlobalPlatform
    DeleteCommand => DeleteResponse
}

impl DeleteCommand {
    /// Create a DELETE command for an object with specified parameters
    pub fn with_aid(aid: &Aid, p2: u8) -> Self {
        let mut data = Vec::with_capacity(2 + aid.len());
        data.push(tags::AID);
        data.push(aid.len() as u8);
        data.extend_from_slice(aid);

        Self(Command::new_with_data(cla::GP, ins::DELETE, 0x00, p2, data).with_le(0x00))
    }

    /// Create a DELETE command for an object
    pub fn delete_object(aid: &Aid) -> Self {
        Self::with_aid(aid, delete_p2::OBJECT)
    }

    /// Create a DELETE command for an object and related objects
    pub fn delete_object_and_related(aid: &Aid) -> Self {
        Self::with_aid(aid, delete_p2::OBJECT_AND_RELATED)
    }
}

status_response! {
    /// DELETE response
    DeleteResponse {
        /// Referenced data not found (6A88)
        ReferencedDataNotFound = StatusWord::REFERENCED_DATA_NOT_FOUND,
        /// Object has dependents or is otherwise in use (6985)
        ConditionsNotSatisfied = StatusWord::CONDITIONS_NOT_SATISFIED,
        /// Security condition not satisfied (6982)
        SecurityConditionNotSatisfied = StatusWord::SECURITY_CONDITION_NOT_SATISFIED,
    }
}
