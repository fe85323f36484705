//! INSTALL command for GlobalPlatform
//!
//! This command is used to prepare a package load and to install
//! applications on the card.

use gpman_apdu_core::{Command, StatusWord};

use super::{apdu_command, status_response};
use crate::constants::{cla, ins, install_p1, tags};

apdu_command! {
    /// INSTALL command for GlobalPlatform
    InstallCommand => InstallResponse
}

impl InstallCommand {
    /// Create an INSTALL command with parameters
    pub fn with_p1_data(p1: u8, data: Vec<u8>) -> Self {
        Self(Command::new_with_data(cla::GP, ins::INSTALL, p1, 0x00, data))
    }

    /// Create an INSTALL [for load] command
    ///
    /// `hash` is the Load File Data Block hash, `load_parameters` the encoded
    /// load parameter field (see [`load_parameters`]); both may be empty.
    pub fn for_load(
        load_file_aid: impl AsRef<[u8]>,
        security_domain_aid: impl AsRef<[u8]>,
        hash: impl AsRef<[u8]>,
        load_parameters: impl AsRef<[u8]>,
    ) -> Self {
        let mut data = Vec::new();
        push_lv(&mut data, load_file_aid.as_ref());
        push_lv(&mut data, security_domain_aid.as_ref());
        push_lv(&mut data, hash.as_ref());
        push_lv(&mut data, load_parameters.as_ref());
        // Load token
        data.push(0x00);

        Self::with_p1_data(install_p1::FOR_LOAD, data)
    }

    /// Create an INSTALL [for install] command
    pub fn for_install(
        executable_load_file_aid: impl AsRef<[u8]>,
        executable_module_aid: impl AsRef<[u8]>,
        application_aid: impl AsRef<[u8]>,
        privileges: u8,
        install_parameters: impl AsRef<[u8]>,
    ) -> Self {
        let data = build_install_data(
            executable_load_file_aid.as_ref(),
            executable_module_aid.as_ref(),
            application_aid.as_ref(),
            privileges,
            install_parameters.as_ref(),
        );

        Self::with_p1_data(install_p1::FOR_INSTALL, data)
    }

    /// Create an INSTALL [for install and make selectable] command
    pub fn for_install_and_make_selectable(
        executable_load_file_aid: impl AsRef<[u8]>,
        executable_module_aid: impl AsRef<[u8]>,
        application_aid: impl AsRef<[u8]>,
        privileges: u8,
        install_parameters: impl AsRef<[u8]>,
    ) -> Self {
        let data = build_install_data(
            executable_load_file_aid.as_ref(),
            executable_module_aid.as_ref(),
            application_aid.as_ref(),
            privileges,
            install_parameters.as_ref(),
        );

        Self::with_p1_data(install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE, data)
    }

    /// Create an INSTALL [for personalization] command
    pub fn for_personalization(application_aid: impl AsRef<[u8]>) -> Self {
        let mut data = vec![0x00, 0x00];
        push_lv(&mut data, application_aid.as_ref());
        // Privileges, parameters and token are empty
        data.extend_from_slice(&[0x00, 0x00, 0x00]);

        Self::with_p1_data(install_p1::FOR_PERSONALIZATION, data)
    }
}

status_response! {
    /// INSTALL response
    InstallResponse {
        /// Referenced data not found (6A88)
        ReferencedDataNotFound = StatusWord::REFERENCED_DATA_NOT_FOUND,
        /// Instance AID already in use or wrong life cycle (6985)
        ConditionsNotSatisfied = StatusWord::CONDITIONS_NOT_SATISFIED,
        /// Not enough memory (6A84)
        NotEnoughMemory = StatusWord::NOT_ENOUGH_MEMORY,
        /// Incorrect parameters in the data field (6A80)
        IncorrectData = StatusWord::INCORRECT_DATA,
        /// Security condition not satisfied (6982)
        SecurityConditionNotSatisfied = StatusWord::SECURITY_CONDITION_NOT_SATISFIED,
    }
}

/// Encode the system parameters of INSTALL [for load]
///
/// With a code size this is the non-volatile code space limit
/// `EF 04 C6 02 <size>` that some cards require; otherwise empty.
pub fn load_parameters(code_size: Option<u16>) -> Vec<u8> {
    match code_size {
        Some(size) => {
            let [hi, lo] = size.to_be_bytes();
            vec![tags::SYSTEM_PARAMETERS, 0x04, tags::NON_VOLATILE_CODE_LIMIT, 0x02, hi, lo]
        }
        None => Vec::new(),
    }
}

/// Wrap application parameters in the `C9` tag unless they already are
///
/// Empty parameters encode as `C9 00`.
pub fn install_parameters(params: &[u8]) -> Vec<u8> {
    if params.first() == Some(&tags::INSTALL_PARAMETERS) {
        return params.to_vec();
    }
    let mut tlv = Vec::with_capacity(2 + params.len());
    tlv.push(tags::INSTALL_PARAMETERS);
    tlv.push(params.len() as u8);
    tlv.extend_from_slice(params);
    tlv
}

/// Build the data field for INSTALL [for install] and [for install and make selectable] commands
fn build_install_data(
    executable_load_file_aid: &[u8],
    executable_module_aid: &[u8],
    application_aid: &[u8],
    privileges: u8,
    parameters: &[u8],
) -> Vec<u8> {
    let mut data = Vec::new();
    push_lv(&mut data, executable_load_file_aid);
    push_lv(&mut data, executable_module_aid);
    push_lv(&mut data, application_aid);
    push_lv(&mut data, &[privileges]);
    push_lv(&mut data, &install_parameters(parameters));
    // Install token
    data.push(0x00);
    data
}

fn push_lv(data: &mut Vec<u8>, value: &[u8]) {
    data.push(value.len() as u8);
    data.extend_from_slice(value);
}
