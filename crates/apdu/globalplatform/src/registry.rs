//! Card registry as reported by GET STATUS
//!
//! A [`Registry`] is a snapshot: it is rebuilt from fresh GET STATUS
//! responses every time and never patched after the card changes.

use std::fmt;

use bytes::BytesMut;
use gpman_apdu_core::{CardTransport, StatusWord};
use iso7816_tlv::ber::{Tlv, Value};
use tracing::{debug, info, instrument, warn};

use crate::commands::{DeleteCommand, GetStatusCommand, GetStatusResponse};
use crate::constants::{get_status_p1, tags};
use crate::session::Session;
use crate::{Aid, Error, Result};

/// Upper bound on GET STATUS "next occurrence" round trips for one query
const MAX_STATUS_ROUNDS: usize = 64;

/// Which part of the registry GET STATUS reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusScope {
    /// The issuer security domain
    SecurityDomains,
    /// Executable load files together with their modules
    PackagesAndApplets,
    /// Executable load files only
    Packages,
    /// Applications, including supplementary security domains
    Applets,
}

impl StatusScope {
    /// GET STATUS P1 for this scope
    pub const fn p1(self) -> u8 {
        match self {
            Self::SecurityDomains => get_status_p1::ISSUER_SECURITY_DOMAIN,
            Self::PackagesAndApplets => get_status_p1::EXEC_LOAD_FILES_AND_MODULES,
            Self::Packages => get_status_p1::EXEC_LOAD_FILES,
            Self::Applets => get_status_p1::APPLICATIONS,
        }
    }
}

/// GET STATUS response encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryFormat {
    /// Tagged first, legacy when the card refuses it
    #[default]
    Auto,
    /// GP 2.2 `E3` templates (P2 `02`)
    Tagged,
    /// Length-prefixed entries (P2 `00`)
    Legacy,
}

/// Kind of a registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Issuer or supplementary security domain
    SecurityDomain,
    /// Executable load file
    Package {
        /// Executable modules (applet classes) it contains
        modules: Vec<Aid>,
    },
    /// Application instance
    Applet {
        /// Executable load file the instance was created from, when known
        package: Option<Aid>,
    },
}

impl EntryKind {
    /// Short label used in listings
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::SecurityDomain => "SD",
            Self::Package { .. } => "PKG",
            Self::Applet { .. } => "APP",
        }
    }
}

/// Life cycle state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifeCycle(pub u8);

impl LifeCycle {
    /// Label for the card life cycle, reported for the issuer security domain
    pub const fn card_label(self) -> &'static str {
        match self.0 {
            0x01 => "OP_READY",
            0x07 => "INITIALIZED",
            0x0F => "SECURED",
            0x7F => "CARD_LOCKED",
            0xFF => "TERMINATED",
            _ => "UNKNOWN",
        }
    }

    /// Label for an executable load file
    pub const fn load_file_label(self) -> &'static str {
        match self.0 {
            0x01 => "LOADED",
            _ => "UNKNOWN",
        }
    }

    /// Label for an application or security domain
    pub const fn application_label(self) -> &'static str {
        match self.0 {
            0x03 => "INSTALLED",
            0x0F => "PERSONALIZED",
            v if v & 0x83 == 0x83 => "LOCKED",
            v if v & 0x07 == 0x07 => "SELECTABLE",
            _ => "UNKNOWN",
        }
    }
}

/// Privilege byte of an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Privileges(pub u8);

impl Privileges {
    const NAMES: [(u8, &'static str); 8] = [
        (0x80, "SecurityDomain"),
        (0x40, "DAPVerification"),
        (0x20, "DelegatedManagement"),
        (0x10, "CardLock"),
        (0x08, "CardTerminate"),
        (0x04, "DefaultSelected"),
        (0x02, "CVMManagement"),
        (0x01, "MandatedDAPVerification"),
    ];

    /// Whether the entry is a security domain
    pub const fn is_security_domain(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Names of the privilege bits set
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}

/// One row of the card registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    aid: Aid,
    kind: EntryKind,
    life_cycle: LifeCycle,
    privileges: Privileges,
    associated_sd: Option<Aid>,
    scope: StatusScope,
}

impl RegistryEntry {
    /// Create an entry
    pub const fn new(
        aid: Aid,
        kind: EntryKind,
        life_cycle: LifeCycle,
        privileges: Privileges,
        scope: StatusScope,
    ) -> Self {
        Self {
            aid,
            kind,
            life_cycle,
            privileges,
            associated_sd: None,
            scope,
        }
    }

    /// AID of the entry
    pub const fn aid(&self) -> &Aid {
        &self.aid
    }

    /// Kind and kind-specific relations
    pub const fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Raw life cycle state
    pub const fn life_cycle(&self) -> LifeCycle {
        self.life_cycle
    }

    /// Privileges; zero for load files
    pub const fn privileges(&self) -> Privileges {
        self.privileges
    }

    /// Associated security domain, reported in the tagged format only
    pub const fn associated_sd(&self) -> Option<&Aid> {
        self.associated_sd.as_ref()
    }

    /// GET STATUS scope the entry was reported under
    pub const fn scope(&self) -> StatusScope {
        self.scope
    }

    /// Human readable life cycle state
    pub const fn life_cycle_label(&self) -> &'static str {
        match (&self.kind, self.scope) {
            (EntryKind::SecurityDomain, StatusScope::SecurityDomains) => self.life_cycle.card_label(),
            (EntryKind::Package { .. }, _) => self.life_cycle.load_file_label(),
            _ => self.life_cycle.application_label(),
        }
    }

    /// AIDs this entry points at: a package's modules or an applet's package
    pub fn related_aids(&self) -> Vec<&Aid> {
        match &self.kind {
            EntryKind::Package { modules } => modules.iter().collect(),
            EntryKind::Applet { package } => package.iter().collect(),
            EntryKind::SecurityDomain => Vec::new(),
        }
    }
}

/// Result of a successful DELETE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// The target followed by every dependent removed with it
    pub removed: Vec<Aid>,
}

/// Snapshot of the card registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Build a registry, dropping repeated AIDs and linking applets to packages
    ///
    /// Applets reported without their load file (legacy format) are attached to
    /// the package listing their AID among its modules.
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut unique: Vec<RegistryEntry> = Vec::new();
        for entry in entries {
            if !unique.iter().any(|existing| existing.aid == entry.aid) {
                unique.push(entry);
            }
        }

        let owners: Vec<(Aid, Aid)> = unique
            .iter()
            .filter_map(|entry| match &entry.kind {
                EntryKind::Package { modules } => Some((entry.aid.clone(), modules.clone())),
                _ => None,
            })
            .flat_map(|(package, modules)| modules.into_iter().map(move |m| (m, package.clone())))
            .collect();
        for entry in &mut unique {
            if let EntryKind::Applet { package: package @ None } = &mut entry.kind {
                *package = owners
                    .iter()
                    .find(|(module, _)| *module == entry.aid)
                    .map(|(_, owner)| owner.clone());
            }
        }

        Self { entries: unique }
    }

    /// All entries in report order
    pub fn iter(&self) -> std::slice::Iter<'_, RegistryEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by AID
    pub fn get(&self, aid: &Aid) -> Option<&RegistryEntry> {
        self.entries.iter().find(|entry| &entry.aid == aid)
    }

    /// Whether an entry with this AID exists
    pub fn contains(&self, aid: &Aid) -> bool {
        self.get(aid).is_some()
    }

    /// Executable load files
    pub fn packages(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.iter().filter(|entry| matches!(entry.kind, EntryKind::Package { .. }))
    }

    /// Application instances
    pub fn applets(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.iter().filter(|entry| matches!(entry.kind, EntryKind::Applet { .. }))
    }

    /// Security domains
    pub fn security_domains(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.iter().filter(|entry| entry.kind == EntryKind::SecurityDomain)
    }

    /// Applets created from `package`
    pub fn dependents<'a>(&'a self, package: &'a Aid) -> impl Iterator<Item = &'a RegistryEntry> + 'a {
        self.iter().filter(move |entry| {
            matches!(&entry.kind, EntryKind::Applet { package: Some(owner) } if owner == package)
        })
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a RegistryEntry;
    type IntoIter = std::slice::Iter<'a, RegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn registry_aid(bytes: &[u8]) -> Result<Aid> {
    Aid::from_slice(bytes).map_err(|_| Error::MalformedResponse("registry AID outside 5..=16 bytes"))
}

fn classify(
    scope: StatusScope,
    privileges: Privileges,
    package: Option<Aid>,
    modules: Vec<Aid>,
) -> EntryKind {
    match scope {
        StatusScope::SecurityDomains => EntryKind::SecurityDomain,
        StatusScope::Packages | StatusScope::PackagesAndApplets => EntryKind::Package { modules },
        StatusScope::Applets if privileges.is_security_domain() => EntryKind::SecurityDomain,
        StatusScope::Applets => EntryKind::Applet { package },
    }
}

/// Parse GP 2.2 tagged GET STATUS data: a sequence of `E3` templates
pub fn parse_tagged(mut data: &[u8], scope: StatusScope) -> Result<Vec<RegistryEntry>> {
    let mut entries = Vec::new();
    while !data.is_empty() {
        let (tlv, rest) = Tlv::parse(data);
        let tlv = tlv.map_err(|_| Error::MalformedResponse("invalid TLV in GET STATUS response"))?;
        data = rest;

        if tlv.tag().to_bytes() != [tags::REGISTRY_ENTRY].as_slice() {
            return Err(Error::MalformedResponse("unexpected tag in GET STATUS response"));
        }
        let Value::Constructed(fields) = tlv.value() else {
            return Err(Error::MalformedResponse("registry entry is not a template"));
        };
        entries.push(tagged_entry(fields, scope)?);
    }
    Ok(entries)
}

fn tagged_entry(fields: &[Tlv], scope: StatusScope) -> Result<RegistryEntry> {
    let life_cycle_tag = tags::LIFE_CYCLE.to_be_bytes();
    let mut aid = None;
    let mut life_cycle = LifeCycle(0);
    let mut privileges = Privileges::default();
    let mut package = None;
    let mut modules = Vec::new();
    let mut associated_sd = None;

    for field in fields {
        let Value::Primitive(value) = field.value() else {
            continue;
        };
        let tag = field.tag().to_bytes();
        if tag == life_cycle_tag.as_slice() {
            life_cycle = LifeCycle(value.first().copied().unwrap_or_default());
            continue;
        }
        match tag {
            [tags::AID] => aid = Some(registry_aid(value)?),
            [tags::PRIVILEGES] => privileges = Privileges(value.first().copied().unwrap_or_default()),
            [tags::LOAD_FILE_AID] => package = Some(registry_aid(value)?),
            [tags::MODULE_AID] => modules.push(registry_aid(value)?),
            [tags::ASSOCIATED_SD] => associated_sd = Some(registry_aid(value)?),
            _ => {}
        }
    }

    let aid = aid.ok_or(Error::MalformedResponse("registry entry without AID"))?;
    let kind = classify(scope, privileges, package, modules);
    Ok(RegistryEntry {
        associated_sd,
        ..RegistryEntry::new(aid, kind, life_cycle, privileges, scope)
    })
}

fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if data.len() < len {
        return Err(Error::MalformedResponse("truncated GET STATUS entry"));
    }
    let (head, tail) = data.split_at(len);
    *data = tail;
    Ok(head)
}

fn take_aid(data: &mut &[u8]) -> Result<Aid> {
    let len = take(data, 1)?[0] as usize;
    registry_aid(take(data, len)?)
}

/// Parse legacy GET STATUS data: `len AID life privileges` per entry
///
/// Load files reported with their modules carry `count (len AID)*` after the
/// privileges byte.
pub fn parse_legacy(mut data: &[u8], scope: StatusScope) -> Result<Vec<RegistryEntry>> {
    let mut entries = Vec::new();
    while !data.is_empty() {
        let aid = take_aid(&mut data)?;
        let state = take(&mut data, 2)?;
        let (life_cycle, privileges) = (LifeCycle(state[0]), Privileges(state[1]));

        let mut modules = Vec::new();
        if scope == StatusScope::PackagesAndApplets {
            let count = take(&mut data, 1)?[0];
            for _ in 0..count {
                modules.push(take_aid(&mut data)?);
            }
        }

        let kind = classify(scope, privileges, None, modules);
        entries.push(RegistryEntry::new(aid, kind, life_cycle, privileges, scope));
    }
    Ok(entries)
}

const fn is_format_unsupported(status: StatusWord) -> bool {
    matches!(
        status,
        StatusWord::INCORRECT_P1P2 | StatusWord::INVALID_INSTRUCTION
    )
}

impl<T: CardTransport> Session<T> {
    /// Query one registry scope in the configured response format
    #[instrument(level = "debug", skip(self))]
    pub fn get_status(&mut self, scope: StatusScope) -> Result<Registry> {
        let entries = self.status_entries(scope)?;
        Ok(Registry::from_entries(entries))
    }

    /// Security domains, applications and load files with their modules
    ///
    /// Cards that refuse the load-files-and-modules scope are asked for load
    /// files alone.
    pub fn registry(&mut self) -> Result<Registry> {
        let mut entries = self.status_entries(StatusScope::SecurityDomains)?;
        entries.extend(self.status_entries(StatusScope::Applets)?);
        let packages = match self.status_entries(StatusScope::PackagesAndApplets) {
            Err(Error::CardRejected(status)) if is_format_unsupported(status) => {
                debug!(%status, "Load files with modules not supported");
                self.status_entries(StatusScope::Packages)?
            }
            other => other?,
        };
        entries.extend(packages);

        let registry = Registry::from_entries(entries);
        debug!(entries = registry.len(), "Registry read");
        Ok(registry)
    }

    /// Delete an object, optionally with everything depending on it
    ///
    /// Exactly one DELETE is sent: either all reported AIDs are gone or nothing
    /// is. With `include_dependents` a fresh registry is read first to report
    /// what goes with the target; if the card refuses that read, only the
    /// target is reported.
    pub fn delete(&mut self, aid: &Aid, include_dependents: bool) -> Result<DeleteReport> {
        let registry = if include_dependents {
            match self.registry() {
                Ok(registry) => registry,
                Err(e) if !e.is_fatal() => {
                    debug!(error = %e, "Registry not readable, reporting the target only");
                    Registry::default()
                }
                Err(e) => return Err(e),
            }
        } else {
            Registry::default()
        };
        self.delete_with_registry(&registry, aid, include_dependents)
    }

    /// Delete every package on the card together with its applets
    ///
    /// Packages the card refuses to delete are logged and skipped.
    pub fn format(&mut self) -> Result<Vec<DeleteReport>> {
        let registry = self.registry()?;
        let mut reports = Vec::new();
        for package in registry.packages() {
            match self.delete_with_registry(&registry, package.aid(), true) {
                Ok(report) => reports.push(report),
                Err(e) if !e.is_fatal() => {
                    warn!(aid = %package.aid(), error = %e, "Could not delete package when formatting");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    #[instrument(level = "debug", skip(self, registry), fields(aid = %aid))]
    pub(crate) fn delete_with_registry(
        &mut self,
        registry: &Registry,
        aid: &Aid,
        include_dependents: bool,
    ) -> Result<DeleteReport> {
        let mut removed = vec![aid.clone()];
        let command = if include_dependents {
            removed.extend(registry.dependents(aid).map(|entry| entry.aid().clone()));
            DeleteCommand::delete_object_and_related(aid)
        } else {
            DeleteCommand::delete_object(aid)
        };

        if let Err(e) = self.execute(&command)?.into_result() {
            warn!(error = %e, "DELETE rejected");
            return Err(e);
        }
        info!(removed = removed.len(), "Deleted");
        Ok(DeleteReport { removed })
    }

    fn status_entries(&mut self, scope: StatusScope) -> Result<Vec<RegistryEntry>> {
        match self.config().registry_format() {
            RegistryFormat::Tagged => self.fetch_status(scope, true),
            RegistryFormat::Legacy => self.fetch_status(scope, false),
            RegistryFormat::Auto => match self.fetch_status(scope, true) {
                Err(Error::CardRejected(status)) if is_format_unsupported(status) => {
                    debug!(%status, "Tagged GET STATUS refused, using legacy format");
                    self.fetch_status(scope, false)
                }
                other => other,
            },
        }
    }

    fn fetch_status(&mut self, scope: StatusScope, tagged: bool) -> Result<Vec<RegistryEntry>> {
        let mut command = if tagged {
            GetStatusCommand::all_with_type(scope.p1())
        } else {
            GetStatusCommand::all_with_type_legacy(scope.p1())
        };

        let mut data = BytesMut::new();
        let mut complete = false;
        for _ in 0..MAX_STATUS_ROUNDS {
            match self.execute(&command)? {
                GetStatusResponse::Success { data: chunk } => {
                    data.extend_from_slice(&chunk);
                    complete = true;
                    break;
                }
                GetStatusResponse::MoreData { data: chunk } => {
                    data.extend_from_slice(&chunk);
                    command = command.next_occurrence();
                }
                GetStatusResponse::ReferencedDataNotFound => {
                    complete = true;
                    break;
                }
                other => return Err(Error::CardRejected(other.status())),
            }
        }
        if !complete {
            return Err(Error::MalformedResponse("GET STATUS never completed"));
        }

        if tagged {
            parse_tagged(&data, scope)
        } else {
            parse_legacy(&data, scope)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn aid(bytes: &[u8]) -> Aid {
        Aid::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_parse_tagged_applications() {
        let data = hex!(
            "E3104F07A00000000300009F70010FC5019A"
            "E31A4F08A000000062030101" "9F700107" "C50100" "C407A0000000620301"
        );
        let entries = parse_tagged(&data, StatusScope::Applets).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].aid(), &aid(&hex!("A0000000030000")));
        assert_eq!(entries[0].kind(), &EntryKind::SecurityDomain);
        assert_eq!(entries[0].life_cycle(), LifeCycle(0x0F));
        assert_eq!(entries[0].life_cycle_label(), "PERSONALIZED");

        assert_eq!(
            entries[1].kind(),
            &EntryKind::Applet {
                package: Some(aid(&hex!("A0000000620301")))
            }
        );
        assert_eq!(entries[1].life_cycle_label(), "SELECTABLE");
        assert_eq!(entries[1].privileges(), Privileges(0));
    }

    #[test]
    fn test_parse_tagged_load_files() {
        let data = hex!(
            "E3214F07A00000006203019F700101"
            "8408A000000062030101" "8408A000000062030102"
        );
        let entries = parse_tagged(&data, StatusScope::PackagesAndApplets).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].life_cycle_label(), "LOADED");
        assert_eq!(entries[0].related_aids().len(), 2);
    }

    #[test]
    fn test_parse_tagged_rejects_garbage() {
        assert!(matches!(
            parse_tagged(&hex!("E2024F00"), StatusScope::Applets),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_tagged(&hex!("E3059F7001"), StatusScope::Applets),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_tagged(&hex!("E3049F700107"), StatusScope::Applets),
            Err(Error::MalformedResponse("registry entry without AID"))
        ));
    }

    #[test]
    fn test_parse_legacy() {
        let data = hex!("08A000000151000000" "0F9E");
        let entries = parse_legacy(&data, StatusScope::SecurityDomains).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].aid(), &Aid::ISD);
        assert_eq!(entries[0].life_cycle_label(), "SECURED");

        let data = hex!(
            "07A0000000620301" "0100" "02" "08A000000062030101" "08A000000062030102"
            "07A0000000620001" "0100" "00"
        );
        let entries = parse_legacy(&data, StatusScope::PackagesAndApplets).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].kind(), EntryKind::Package { modules } if modules.len() == 2));
        assert!(matches!(entries[1].kind(), EntryKind::Package { modules } if modules.is_empty()));

        assert!(matches!(
            parse_legacy(&hex!("07A00000006203"), StatusScope::Packages),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_dependents() {
        let package = aid(&hex!("A0000000620301"));
        let first = aid(&hex!("A000000062030101"));
        let second = aid(&hex!("A000000062030102"));
        let other = aid(&hex!("A000000062030201"));

        let registry = Registry::from_entries([
            RegistryEntry::new(
                Aid::ISD,
                EntryKind::SecurityDomain,
                LifeCycle(0x0F),
                Privileges(0x9E),
                StatusScope::SecurityDomains,
            ),
            RegistryEntry::new(
                first.clone(),
                EntryKind::Applet { package: None },
                LifeCycle(0x07),
                Privileges(0),
                StatusScope::Applets,
            ),
            RegistryEntry::new(
                second.clone(),
                EntryKind::Applet { package: Some(package.clone()) },
                LifeCycle(0x07),
                Privileges(0),
                StatusScope::Applets,
            ),
            RegistryEntry::new(
                other,
                EntryKind::Applet { package: None },
                LifeCycle(0x07),
                Privileges(0),
                StatusScope::Applets,
            ),
            RegistryEntry::new(
                package.clone(),
                EntryKind::Package { modules: vec![first.clone()] },
                LifeCycle(0x01),
                Privileges(0),
                StatusScope::PackagesAndApplets,
            ),
            RegistryEntry::new(
                Aid::ISD,
                EntryKind::SecurityDomain,
                LifeCycle(0x0F),
                Privileges(0x9E),
                StatusScope::Applets,
            ),
        ]);

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.security_domains().count(), 1);
        assert_eq!(registry.packages().count(), 1);
        assert_eq!(registry.applets().count(), 3);

        let dependents: Vec<_> = registry.dependents(&package).map(RegistryEntry::aid).collect();
        assert_eq!(dependents, [&first, &second]);
        assert!(registry.contains(&package));
        assert!(!registry.contains(&aid(&hex!("A0000000FF"))));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Privileges(0x9E).to_string(), "SecurityDomain, CardLock, CardTerminate, DefaultSelected, CVMManagement");
        assert_eq!(Privileges(0).to_string(), "none");
        assert_eq!(LifeCycle(0x83).application_label(), "LOCKED");
        assert_eq!(LifeCycle(0x03).application_label(), "INSTALLED");
        assert_eq!(LifeCycle(0x7F).card_label(), "CARD_LOCKED");
        assert_eq!(StatusScope::PackagesAndApplets.p1(), 0x10);
    }
}
