//! Simulated GlobalPlatform card
//!
//! Answers SELECT, the SCP02 handshake and the card content management
//! commands from an in-memory registry. Every command after EXTERNAL
//! AUTHENTICATE has its C-MAC verified (and its data decrypted) the way a
//! real card would.
#![allow(dead_code, unreachable_pub)]

use std::collections::HashMap;

use cipher::{BlockDecryptMut, KeyIvInit, block_padding::Iso7816};
use des::TdesEde3;
use gpman_apdu_core::{Bytes, CardTransport, Command, Response, TransportError};
use gpman_globalplatform::crypto::{
    DERIVATION_DEK, DERIVATION_ENC, DERIVATION_MAC, HostChallenge, Scp02Mac,
    calculate_cryptogram, derive_key, encrypt_icv, mac_full_3des, resize_key,
};
use gpman_globalplatform::diversify::diversify;
use gpman_globalplatform::keys::KeyBytes;
use gpman_globalplatform::{KeySet, SecurityLevel, SessionKeys, StatusWord};

pub const ISD: [u8; 8] = [0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00];
pub const KDD: [u8; 10] = [0x00, 0x00, 0x02, 0x65, 0x01, 0x83, 0x03, 0x95, 0x36, 0x62];
pub const CARD_DATA: [u8; 12] = [
    0x66, 0x0A, 0x73, 0x08, 0x06, 0x07, 0x2A, 0x86, 0x48, 0x86, 0xFC, 0x6B,
];

/// Object kept in the simulated registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    SecurityDomain,
    Package { modules: Vec<Vec<u8>> },
    Applet { package: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardObject {
    pub aid: Vec<u8>,
    pub kind: ObjectKind,
    pub life_cycle: u8,
    pub privileges: u8,
}

impl CardObject {
    pub fn package(aid: &[u8], modules: &[&[u8]]) -> Self {
        Self {
            aid: aid.to_vec(),
            kind: ObjectKind::Package {
                modules: modules.iter().map(|m| m.to_vec()).collect(),
            },
            life_cycle: 0x01,
            privileges: 0x00,
        }
    }

    pub fn applet(aid: &[u8], package: &[u8]) -> Self {
        Self {
            aid: aid.to_vec(),
            kind: ObjectKind::Applet {
                package: package.to_vec(),
            },
            life_cycle: 0x07,
            privileges: 0x00,
        }
    }
}

/// One LOAD block as the card saw it after unwrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadBlock {
    pub p1: u8,
    pub p2: u8,
    pub clear_len: usize,
    pub wire_len: usize,
}

#[derive(Debug)]
struct Handshake {
    keys: SessionKeys,
    host_challenge: HostChallenge,
}

#[derive(Debug)]
pub struct SimulatedCard {
    keys: KeySet,
    sequence_counter: [u8; 2],
    card_challenge: [u8; 6],
    selected: bool,
    handshake: Option<Handshake>,
    level: Option<SecurityLevel>,
    icv: Option<Scp02Mac>,
    tagged_status: bool,
    page_size: Option<usize>,
    status_cursor: usize,
    rejections: HashMap<u8, StatusWord>,
    load_rejection: Option<(usize, StatusWord)>,
    fail_after: Option<usize>,
    pending_load: Option<Vec<u8>>,
    load_data: Vec<u8>,
    /// Registry content
    pub objects: Vec<CardObject>,
    /// Raw commands as received, before unwrapping
    pub received: Vec<Vec<u8>>,
    /// LOAD blocks of the last load
    pub load_blocks: Vec<LoadBlock>,
}

impl SimulatedCard {
    /// A card personalized with `keys` holding only its issuer security domain
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys,
            sequence_counter: [0x00, 0x2A],
            card_challenge: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            selected: false,
            handshake: None,
            level: None,
            icv: None,
            tagged_status: true,
            page_size: None,
            status_cursor: 0,
            rejections: HashMap::new(),
            load_rejection: None,
            fail_after: None,
            pending_load: None,
            load_data: Vec::new(),
            objects: vec![CardObject {
                aid: ISD.to_vec(),
                kind: ObjectKind::SecurityDomain,
                life_cycle: 0x0F,
                privileges: 0x9E,
            }],
            received: Vec::new(),
            load_blocks: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: CardObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Only answer GET STATUS in the legacy format
    pub fn legacy_only(mut self) -> Self {
        self.tagged_status = false;
        self
    }

    /// Split GET STATUS answers into pages of `entries`, chained with 6310
    pub fn paged(mut self, entries: usize) -> Self {
        self.page_size = Some(entries);
        self
    }

    /// Answer every authenticated command with `ins` by `status`
    pub fn reject(mut self, ins: u8, status: StatusWord) -> Self {
        self.rejections.insert(ins, status);
        self
    }

    /// Refuse LOAD block `block` (zero-based) with `status`
    pub fn reject_load_block(mut self, block: usize, status: StatusWord) -> Self {
        self.load_rejection = Some((block, status));
        self
    }

    /// Fail at the transport level once `count` commands were answered
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn contains(&self, aid: &[u8]) -> bool {
        self.objects.iter().any(|object| object.aid == aid)
    }

    pub fn instructions(&self) -> Vec<u8> {
        self.received.iter().map(|raw| raw[1]).collect()
    }

    pub fn count_ins(&self, ins: u8) -> usize {
        self.received.iter().filter(|raw| raw[1] == ins).count()
    }

    fn respond(&mut self, command: &Command) -> Response {
        match (command.class() & !0x04, command.instruction()) {
            (0x00, 0xA4) => return self.select(command),
            (0x80, 0x50) => return self.initialize_update(command),
            (0x80, 0x82) => return self.external_authenticate(command),
            _ => {}
        }

        let Some(level) = self.level else {
            return Response::error(StatusWord::SECURITY_CONDITION_NOT_SATISFIED);
        };
        let command = match self.strip_secure_messaging(command, level) {
            Some(command) => command,
            None => {
                self.reset_channel();
                return Response::error(StatusWord::SECURITY_CONDITION_NOT_SATISFIED);
            }
        };
        if let Some(status) = self.rejections.get(&command.instruction()) {
            return Response::error(*status);
        }

        match command.instruction() {
            0xCA if command.p2() == 0x66 => Response::success(Bytes::from_static(&CARD_DATA)),
            0xF2 => self.get_status(&command),
            0xE4 => self.delete(&command),
            0xE6 => self.install(&command),
            0xE8 => self.load(&command),
            _ => Response::error(StatusWord::INVALID_INSTRUCTION),
        }
    }

    fn reset_channel(&mut self) {
        self.handshake = None;
        self.level = None;
        self.icv = None;
    }

    fn select(&mut self, command: &Command) -> Response {
        self.reset_channel();
        if command.data() == Some(ISD.as_slice()) {
            self.selected = true;
            Response::success(Bytes::from_static(&[0x6F, 0x03, 0x84, 0x01, 0x00]))
        } else {
            Response::error(StatusWord::FILE_NOT_FOUND)
        }
    }

    fn initialize_update(&mut self, command: &Command) -> Response {
        self.reset_channel();
        let Some(challenge) = command.data().and_then(|data| HostChallenge::try_from(data).ok())
        else {
            return Response::error(StatusWord::WRONG_LENGTH);
        };
        if !self.selected {
            return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
        }

        let card_keys = diversify(&self.keys, &KDD);
        let seq = self.sequence_counter;
        let keys = SessionKeys::new(
            derive_key(&card_keys.enc, &seq, &DERIVATION_ENC),
            derive_key(&card_keys.mac, &seq, &DERIVATION_MAC),
            derive_key(&card_keys.kek, &seq, &DERIVATION_DEK),
        );
        let cryptogram =
            calculate_cryptogram(keys.enc(), &seq, &self.card_challenge, &challenge, false);

        let mut payload = KDD.to_vec();
        payload.extend_from_slice(&[self.keys.version(), 0x02]);
        payload.extend_from_slice(&seq);
        payload.extend_from_slice(&self.card_challenge);
        payload.extend_from_slice(&cryptogram);

        self.handshake = Some(Handshake {
            keys,
            host_challenge: challenge,
        });
        Response::success(payload)
    }

    fn external_authenticate(&mut self, command: &Command) -> Response {
        let Some(handshake) = self.handshake.take() else {
            return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
        };
        let data = command.data().unwrap_or_default();
        if command.class() != 0x84 || data.len() != 16 {
            return Response::error(StatusWord::WRONG_LENGTH);
        }

        let expected = calculate_cryptogram(
            handshake.keys.enc(),
            &self.sequence_counter,
            &self.card_challenge,
            &handshake.host_challenge,
            true,
        );
        let mut mac_input = vec![0x84, 0x82, command.p1(), command.p2(), 0x10];
        mac_input.extend_from_slice(&data[..8]);
        let mac = mac_full_3des(handshake.keys.mac(), &Scp02Mac::default(), &mac_input);
        if data[..8] != expected || data[8..] != mac {
            return Response::error(StatusWord::new(0x63, 0x00));
        }

        self.level = Some(match command.p1() {
            0x00 => SecurityLevel::Clear,
            0x01 => SecurityLevel::Mac,
            _ => SecurityLevel::Enc,
        });
        self.icv = Some(mac);
        self.handshake = Some(handshake);
        Response::success(Bytes::new())
    }

    /// Verify and strip secure messaging; `None` when the MAC does not verify
    fn strip_secure_messaging(&mut self, command: &Command, level: SecurityLevel) -> Option<Command> {
        if level == SecurityLevel::Clear {
            return Some(command.clone());
        }
        if command.class() & 0x04 == 0 {
            return None;
        }

        let keys = &self.handshake.as_ref()?.keys;
        let data = command.data().unwrap_or_default();
        let (body, mac) = data.split_at(data.len().checked_sub(8)?);
        let clear = if level == SecurityLevel::Enc && !body.is_empty() {
            decrypt(keys.enc(), body)?
        } else {
            body.to_vec()
        };

        let icv = encrypt_icv(keys.mac(), self.icv.as_ref()?);
        let mut mac_input = vec![
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2(),
            (clear.len() + 8) as u8,
        ];
        mac_input.extend_from_slice(&clear);
        if mac_full_3des(keys.mac(), &icv, &mac_input) != mac {
            return None;
        }
        self.icv = mac.try_into().ok();

        let mut unwrapped = Command::new(
            command.class() & !0x04,
            command.instruction(),
            command.p1(),
            command.p2(),
        )
        .with_data(clear);
        if let Some(le) = command.expected_length() {
            unwrapped = unwrapped.with_le(le);
        }
        Some(unwrapped)
    }

    fn status_entries(&self, p1: u8, tagged: bool) -> Vec<Vec<u8>> {
        self.objects
            .iter()
            .filter(|object| match (&object.kind, p1) {
                (ObjectKind::SecurityDomain, 0x80) => object.aid == ISD,
                (ObjectKind::SecurityDomain, 0x40) => object.aid != ISD,
                (ObjectKind::Applet { .. }, 0x40) => true,
                (ObjectKind::Package { .. }, 0x10 | 0x20) => true,
                _ => false,
            })
            .map(|object| {
                if tagged {
                    tagged_entry(object, p1)
                } else {
                    legacy_entry(object, p1)
                }
            })
            .collect()
    }

    fn get_status(&mut self, command: &Command) -> Response {
        let tagged = command.p2() & 0x02 != 0;
        if tagged && !self.tagged_status {
            return Response::error(StatusWord::INCORRECT_P1P2);
        }
        if command.p2() & 0x01 == 0 {
            self.status_cursor = 0;
        }

        let entries = self.status_entries(command.p1(), tagged);
        if entries.is_empty() {
            return Response::error(StatusWord::REFERENCED_DATA_NOT_FOUND);
        }
        let start = self.status_cursor.min(entries.len());
        let end = self
            .page_size
            .map_or(entries.len(), |size| (start + size).min(entries.len()));
        self.status_cursor = end;

        let payload = entries[start..end].concat();
        if end < entries.len() {
            Response::new(payload, StatusWord::MORE_STATUS_DATA)
        } else {
            Response::success(payload)
        }
    }

    fn delete(&mut self, command: &Command) -> Response {
        let data = command.data().unwrap_or_default();
        if data.len() < 2 || data[0] != 0x4F || data.len() != 2 + data[1] as usize {
            return Response::error(StatusWord::INCORRECT_DATA);
        }
        let aid = &data[2..];
        let related = command.p2() & 0x80 != 0;

        let Some(object) = self.objects.iter().find(|object| object.aid == aid) else {
            return Response::error(StatusWord::REFERENCED_DATA_NOT_FOUND);
        };
        if object.aid == ISD {
            return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
        }
        let has_dependents = self.objects.iter().any(
            |other| matches!(&other.kind, ObjectKind::Applet { package } if package == aid),
        );
        if has_dependents && !related {
            return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
        }

        let aid = aid.to_vec();
        self.objects.retain(|object| {
            object.aid != aid
                && !matches!(&object.kind, ObjectKind::Applet { package } if *package == aid)
        });
        Response::success(vec![0x00])
    }

    fn install(&mut self, command: &Command) -> Response {
        let data = command.data().unwrap_or_default();
        let mut fields = Fields(data);
        match command.p1() {
            0x02 => {
                let Some(package) = fields.next() else {
                    return Response::error(StatusWord::INCORRECT_DATA);
                };
                if self.contains(package) {
                    return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
                }
                self.pending_load = Some(package.to_vec());
                self.load_data.clear();
                self.load_blocks.clear();
                Response::success(vec![0x00])
            }
            0x0C => {
                let (Some(package), Some(_module), Some(instance), Some(privileges)) =
                    (fields.next(), fields.next(), fields.next(), fields.next())
                else {
                    return Response::error(StatusWord::INCORRECT_DATA);
                };
                if !self.contains(package) {
                    return Response::error(StatusWord::REFERENCED_DATA_NOT_FOUND);
                }
                if self.contains(instance) {
                    return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
                }
                self.objects.push(CardObject {
                    privileges: privileges.first().copied().unwrap_or_default(),
                    ..CardObject::applet(instance, package)
                });
                Response::success(vec![0x00])
            }
            0x20 => Response::success(Bytes::new()),
            _ => Response::error(StatusWord::INCORRECT_P1P2),
        }
    }

    fn load(&mut self, command: &Command) -> Response {
        let Some(package) = self.pending_load.clone() else {
            return Response::error(StatusWord::CONDITIONS_NOT_SATISFIED);
        };
        if command.p2() as usize != self.load_blocks.len() {
            return Response::error(StatusWord::INCORRECT_P1P2);
        }
        if let Some((_, status)) = self.load_rejection.filter(|(block, _)| *block == self.load_blocks.len()) {
            self.pending_load = None;
            return Response::error(status);
        }

        let data = command.data().unwrap_or_default();
        let wire_len = self.received.last().map_or(0, |raw| raw.len().saturating_sub(5));
        self.load_blocks.push(LoadBlock {
            p1: command.p1(),
            p2: command.p2(),
            clear_len: data.len(),
            wire_len,
        });
        self.load_data.extend_from_slice(data);

        if command.p1() & 0x80 != 0 {
            self.pending_load = None;
            let modules = applet_aids(&self.load_data);
            self.objects.push(CardObject {
                aid: package,
                kind: ObjectKind::Package { modules },
                life_cycle: 0x01,
                privileges: 0x00,
            });
        }
        Response::success(vec![0x00])
    }
}

impl CardTransport for SimulatedCard {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        if self.fail_after.is_some_and(|count| self.received.len() >= count) {
            return Err(TransportError::other("card removed"));
        }
        self.received.push(command.to_vec());

        let response = match Command::from_bytes(command) {
            Ok(command) => self.respond(&command),
            Err(_) => Response::error(StatusWord::WRONG_LENGTH),
        };
        Ok(response.to_bytes())
    }
}

/// Length-prefixed INSTALL data fields
struct Fields<'a>(&'a [u8]);

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let (&len, rest) = self.0.split_first()?;
        let len = len as usize;
        if rest.len() < len {
            return None;
        }
        let (field, rest) = rest.split_at(len);
        self.0 = rest;
        Some(field)
    }
}

fn decrypt(key: &KeyBytes, data: &[u8]) -> Option<Vec<u8>> {
    cbc::Decryptor::<TdesEde3>::new(&resize_key(key), &Default::default())
        .decrypt_padded_vec_mut::<Iso7816>(data)
        .ok()
}

fn tlv(tag: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    out
}

fn tagged_entry(object: &CardObject, p1: u8) -> Vec<u8> {
    let mut body = tlv(&[0x4F], &object.aid);
    body.extend(tlv(&[0x9F, 0x70], &[object.life_cycle]));
    body.extend(tlv(&[0xC5], &[object.privileges]));
    match &object.kind {
        ObjectKind::Applet { package } => body.extend(tlv(&[0xC4], package)),
        ObjectKind::Package { modules } if p1 == 0x10 => {
            for module in modules {
                body.extend(tlv(&[0x84], module));
            }
        }
        _ => {}
    }
    tlv(&[0xE3], &body)
}

fn legacy_entry(object: &CardObject, p1: u8) -> Vec<u8> {
    let mut out = vec![object.aid.len() as u8];
    out.extend_from_slice(&object.aid);
    out.push(object.life_cycle);
    out.push(object.privileges);
    if p1 == 0x10 {
        let modules = match &object.kind {
            ObjectKind::Package { modules } => modules.as_slice(),
            _ => &[],
        };
        out.push(modules.len() as u8);
        for module in modules {
            out.push(module.len() as u8);
            out.extend_from_slice(module);
        }
    }
    out
}

/// Applet AIDs from the Applet component of a `C4` load file data block
fn applet_aids(stream: &[u8]) -> Vec<Vec<u8>> {
    let mut data = match stream {
        [0xC4, 0x81, _, rest @ ..] => rest,
        [0xC4, 0x82, _, _, rest @ ..] => rest,
        [0xC4, _, rest @ ..] => rest,
        _ => return Vec::new(),
    };

    while data.len() >= 3 {
        let tag = data[0];
        let size = u16::from_be_bytes([data[1], data[2]]) as usize;
        let Some(info) = data.get(3..3 + size) else {
            return Vec::new();
        };
        if tag == 3 {
            let mut applets = Vec::new();
            let mut rest = info.get(1..).unwrap_or_default();
            for _ in 0..info.first().copied().unwrap_or_default() {
                let Some((&len, tail)) = rest.split_first() else { break };
                let len = len as usize;
                if tail.len() < len + 2 {
                    break;
                }
                applets.push(tail[..len].to_vec());
                rest = &tail[len + 2..];
            }
            return applets;
        }
        data = &data[3 + size..];
    }
    Vec::new()
}

/// A minimal CAP file for package `A0000000620301` with applet `A000000062030101`
///
/// Without debug components the load file data is `48 + method_len` bytes.
pub fn sample_cap_components(method_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut component = |tag: u8, info: &[u8]| {
        out.push(tag);
        out.extend_from_slice(&(info.len() as u16).to_be_bytes());
        out.extend_from_slice(info);
    };

    let mut header = vec![0xDE, 0xCA, 0xFF, 0xED, 0x01, 0x02, 0x04, 0x00, 0x01, 0x07];
    header.extend_from_slice(&[0xA0, 0x00, 0x00, 0x00, 0x62, 0x03, 0x01]);
    component(1, &header);
    component(2, &[0u8; 10]);
    component(
        3,
        &[0x01, 0x08, 0xA0, 0x00, 0x00, 0x00, 0x62, 0x03, 0x01, 0x01, 0x00, 0x10],
    );
    component(7, &vec![0x5A; method_len]);
    component(11, &[0u8; 6]);
    out
}
