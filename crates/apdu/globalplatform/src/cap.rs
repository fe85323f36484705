//! CAP file parsing
//!
//! A CAP file is either a JAR archive holding one `*/javacard/<Name>.cap` entry per
//! component, or the raw concatenation of the component blocks. Every component
//! block is `tag u1, size u2, info[size]`.

use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};
use tracing::debug;
use zip::ZipArchive;

use crate::{Aid, Error, Result};

/// Magic number opening the Header component
const HEADER_MAGIC: [u8; 4] = [0xDE, 0xCA, 0xFF, 0xED];

/// Local file header signature of a ZIP archive
const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Archive entry holding the JAR manifest
const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Length of the load file data block hash
pub const HASH_LENGTH: usize = 20;

/// SHA-1 digest over the included components
pub type LoadFileHash = [u8; HASH_LENGTH];

/// Component kinds by JCVM tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentKind {
    /// Package header, always first
    Header = 1,
    /// Component directory
    Directory = 2,
    /// Applets declared by the package
    Applet = 3,
    /// Imported packages
    Import = 4,
    /// Constant pool
    ConstantPool = 5,
    /// Class and interface definitions
    Class = 6,
    /// Method bytecode
    Method = 7,
    /// Static field images
    StaticField = 8,
    /// Reference locations
    RefLocation = 9,
    /// Exported elements
    Export = 10,
    /// Descriptors
    Descriptor = 11,
    /// Debug information
    Debug = 12,
}

impl ComponentKind {
    /// Order in which components are sent to the card
    pub const LOAD_ORDER: [Self; 12] = [
        Self::Header,
        Self::Directory,
        Self::Import,
        Self::Applet,
        Self::Class,
        Self::Method,
        Self::StaticField,
        Self::Export,
        Self::ConstantPool,
        Self::RefLocation,
        Self::Descriptor,
        Self::Debug,
    ];

    /// Component tag byte
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a component by tag
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::Header,
            2 => Self::Directory,
            3 => Self::Applet,
            4 => Self::Import,
            5 => Self::ConstantPool,
            6 => Self::Class,
            7 => Self::Method,
            8 => Self::StaticField,
            9 => Self::RefLocation,
            10 => Self::Export,
            11 => Self::Descriptor,
            12 => Self::Debug,
            _ => return None,
        })
    }

    /// File name of the component inside a CAP archive, without `.cap`
    pub const fn name(self) -> &'static str {
        match self {
            Self::Header => "Header",
            Self::Directory => "Directory",
            Self::Applet => "Applet",
            Self::Import => "Import",
            Self::ConstantPool => "ConstantPool",
            Self::Class => "Class",
            Self::Method => "Method",
            Self::StaticField => "StaticField",
            Self::RefLocation => "RefLocation",
            Self::Export => "Export",
            Self::Descriptor => "Descriptor",
            Self::Debug => "Debug",
        }
    }

    /// Descriptor and Debug are only sent when debug data is requested
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Descriptor | Self::Debug)
    }

    fn position(self) -> usize {
        Self::LOAD_ORDER
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or(Self::LOAD_ORDER.len())
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::LOAD_ORDER.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component block, tag and size included
#[derive(Clone, PartialEq, Eq)]
pub struct Component {
    kind: ComponentKind,
    bytes: Bytes,
}

impl Component {
    /// Parse exactly one component block
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let (component, rest) = Self::split_first(&bytes)?;
        if !rest.is_empty() {
            return Err(Error::MalformedCapFile(format!(
                "{} component has {} trailing bytes",
                component.kind,
                rest.len()
            )));
        }
        Ok(component)
    }

    /// Split the first component block off a concatenation
    fn split_first(data: &Bytes) -> Result<(Self, Bytes)> {
        if data.len() < 3 {
            return Err(Error::MalformedCapFile(format!(
                "truncated component header ({} bytes)",
                data.len()
            )));
        }
        let kind = ComponentKind::from_tag(data[0])
            .ok_or_else(|| Error::MalformedCapFile(format!("unknown component tag {}", data[0])))?;
        let size = u16::from_be_bytes([data[1], data[2]]) as usize;
        if data.len() < 3 + size {
            return Err(Error::MalformedCapFile(format!(
                "{kind} component declares {size} bytes, {} present",
                data.len() - 3
            )));
        }
        Ok((
            Self {
                kind,
                bytes: data.slice(..3 + size),
            },
            data.slice(3 + size..),
        ))
    }

    /// Component kind
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// The full block as sent to the card
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Component payload after tag and size
    pub fn info(&self) -> &[u8] {
        &self.bytes[3..]
    }

    /// Length of the full block
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a block carries at least its tag and size
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A parsed executable load file
#[derive(Debug, Clone)]
pub struct CapFile {
    components: Vec<Component>,
    package_aid: Aid,
    package_version: (u8, u8),
    applet_aids: Vec<Aid>,
    package_name: Option<String>,
}

impl CapFile {
    /// Read and parse a CAP file from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(data)
    }

    /// Parse a CAP archive or a raw component concatenation
    pub fn parse(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.starts_with(&ZIP_SIGNATURE) {
            Self::parse_archive(data)
        } else {
            Self::parse_components(data)
        }
    }

    /// Parse a raw concatenation of component blocks
    pub fn parse_components(data: impl Into<Bytes>) -> Result<Self> {
        let mut rest = data.into();
        let mut components = Vec::new();
        while !rest.is_empty() {
            let (component, remaining) = Component::split_first(&rest)?;
            components.push(component);
            rest = remaining;
        }
        Self::from_components(components, None)
    }

    fn parse_archive(data: Bytes) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut components = Vec::new();
        let mut package_name = None;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            let Some((package, _)) = component_path(&name) else {
                continue;
            };

            let mut buffer = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buffer)?;
            debug!(entry = %name, len = buffer.len(), "Read CAP component");
            components.push(Component::parse(buffer)?);

            match &package_name {
                Some(existing) if existing != &package => {
                    return Err(Error::MalformedCapFile(format!(
                        "archive holds more than one package ({existing}, {package})"
                    )));
                }
                Some(_) => {}
                None => package_name = Some(package),
            }
        }

        if let Ok(mut manifest) = archive.by_name(MANIFEST_PATH) {
            let mut text = String::new();
            manifest.read_to_string(&mut text)?;
            if let Some(name) = manifest_value(&text, "Java-Card-Package-Name") {
                package_name = Some(name.to_owned());
            }
        }

        Self::from_components(components, package_name)
    }

    /// Validate and order a set of components
    fn from_components(mut components: Vec<Component>, package_name: Option<String>) -> Result<Self> {
        components.sort_by_key(|component| component.kind.position());
        if let Some(pair) = components.windows(2).find(|pair| pair[0].kind == pair[1].kind) {
            return Err(Error::MalformedCapFile(format!(
                "duplicate {} component",
                pair[0].kind
            )));
        }

        let find = |kind: ComponentKind| components.iter().find(|component| component.kind == kind);
        let header = find(ComponentKind::Header)
            .ok_or_else(|| Error::MalformedCapFile("missing Header component".into()))?;
        if find(ComponentKind::Directory).is_none() {
            return Err(Error::MalformedCapFile("missing Directory component".into()));
        }

        let (package_aid, package_version) = parse_header(header.info())?;
        let applet_aids = match find(ComponentKind::Applet) {
            Some(applet) => parse_applets(applet.info())?,
            None => Vec::new(),
        };

        debug!(
            package = %package_aid,
            applets = applet_aids.len(),
            components = components.len(),
            "Parsed CAP file"
        );

        Ok(Self {
            components,
            package_aid,
            package_version,
            applet_aids,
            package_name,
        })
    }

    /// Package AID from the Header component
    pub const fn package_aid(&self) -> &Aid {
        &self.package_aid
    }

    /// Package version as (major, minor)
    pub const fn package_version(&self) -> (u8, u8) {
        self.package_version
    }

    /// Applet AIDs from the Applet component, empty for library packages
    pub fn applet_aids(&self) -> &[Aid] {
        &self.applet_aids
    }

    /// Java package name, when the file came from an archive
    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    /// Look up one component
    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.iter().find(|component| component.kind == kind)
    }

    /// Components in load order, Descriptor and Debug only when `include_debug`
    pub fn components(&self, include_debug: bool) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(move |component| include_debug || !component.kind.is_debug())
    }

    /// Concatenated included components, the Load File Data Block without its `C4` wrapper
    pub fn load_file_data(&self, include_debug: bool) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.load_size(include_debug));
        for component in self.components(include_debug) {
            buffer.put_slice(component.as_bytes());
        }
        buffer.freeze()
    }

    /// Number of component bytes sent to the card
    pub fn load_size(&self, include_debug: bool) -> usize {
        self.components(include_debug).map(Component::len).sum()
    }

    /// SHA-1 Load File Data Block hash over the included components
    pub fn hash(&self, include_debug: bool) -> LoadFileHash {
        let mut hasher = Sha1::new();
        for component in self.components(include_debug) {
            hasher.update(component.as_bytes());
        }
        hasher.finalize().into()
    }
}

/// Split `com/example/javacard/Header.cap` into `com.example` and the component kind
fn component_path(path: &str) -> Option<(String, ComponentKind)> {
    let (dir, file) = path.rsplit_once('/')?;
    let kind = ComponentKind::from_name(file.strip_suffix(".cap")?)?;
    let package = dir.strip_suffix("/javacard").or_else(|| (dir == "javacard").then_some(""))?;
    Some((package.replace('/', "."), kind))
}

fn manifest_value<'a>(manifest: &'a str, key: &str) -> Option<&'a str> {
    manifest.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim())
    })
}

/// Header info: magic, minor, major, flags, package minor, package major, AID length, AID
fn parse_header(info: &[u8]) -> Result<(Aid, (u8, u8))> {
    if info.len() < 10 || info[..4] != HEADER_MAGIC {
        return Err(Error::MalformedCapFile("Header component lacks DECAFFED magic".into()));
    }
    let version = (info[8], info[7]);
    let aid_len = info[9] as usize;
    let aid = info
        .get(10..10 + aid_len)
        .ok_or_else(|| Error::MalformedCapFile("Header package AID truncated".into()))?;
    let aid = Aid::from_slice(aid)
        .map_err(|e| Error::MalformedCapFile(format!("package AID in Header: {e}")))?;
    Ok((aid, version))
}

/// Applet info: count, then per applet AID length, AID, install method offset
fn parse_applets(info: &[u8]) -> Result<Vec<Aid>> {
    let truncated = || Error::MalformedCapFile("Applet component truncated".into());
    let (&count, mut rest) = info.split_first().ok_or_else(truncated)?;

    let mut aids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (&len, tail) = rest.split_first().ok_or_else(truncated)?;
        let len = len as usize;
        if tail.len() < len + 2 {
            return Err(truncated());
        }
        let aid = Aid::from_slice(&tail[..len])
            .map_err(|e| Error::MalformedCapFile(format!("applet AID in Applet component: {e}")))?;
        aids.push(aid);
        rest = &tail[len + 2..];
    }
    Ok(aids)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hex_literal::hex;
    use std::io::Write;

    pub(crate) const PACKAGE_AID: [u8; 7] = hex!("A0000000620301");
    pub(crate) const APPLET_AID: [u8; 8] = hex!("A000000062030101");

    pub(crate) fn block(tag: u8, info: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&(info.len() as u16).to_be_bytes());
        out.extend_from_slice(info);
        out
    }

    pub(crate) fn header_block() -> Vec<u8> {
        let mut info = HEADER_MAGIC.to_vec();
        info.extend_from_slice(&[0x01, 0x02, 0x04, 0x00, 0x01, PACKAGE_AID.len() as u8]);
        info.extend_from_slice(&PACKAGE_AID);
        block(1, &info)
    }

    pub(crate) fn applet_block() -> Vec<u8> {
        let mut info = vec![0x01, APPLET_AID.len() as u8];
        info.extend_from_slice(&APPLET_AID);
        info.extend_from_slice(&[0x00, 0x12]);
        block(3, &info)
    }

    /// Header, Directory, Applet, Method, Descriptor
    pub(crate) fn sample_components() -> Vec<u8> {
        [
            header_block(),
            block(2, &[0x00; 10]),
            block(7, &[0x42; 30]),
            applet_block(),
            block(11, &[0x11; 6]),
        ]
        .concat()
    }

    #[test]
    fn test_parse_raw_components() {
        let cap = CapFile::parse(sample_components()).unwrap();

        assert_eq!(cap.package_aid().as_bytes(), PACKAGE_AID);
        assert_eq!(cap.package_version(), (1, 0));
        assert_eq!(cap.applet_aids().len(), 1);
        assert_eq!(cap.applet_aids()[0].as_bytes(), APPLET_AID);
        assert_eq!(cap.package_name(), None);

        let order: Vec<_> = cap.components(true).map(Component::kind).collect();
        assert_eq!(
            order,
            [
                ComponentKind::Header,
                ComponentKind::Directory,
                ComponentKind::Applet,
                ComponentKind::Method,
                ComponentKind::Descriptor,
            ]
        );
        assert_eq!(cap.components(false).count(), 4);
        assert_eq!(cap.load_size(true), sample_components().len());
        assert_eq!(cap.load_size(false), sample_components().len() - 9);
    }

    #[test]
    fn test_hash_follows_included_components() {
        let cap = CapFile::parse(sample_components()).unwrap();
        assert_ne!(cap.hash(true), cap.hash(false));
        assert_eq!(cap.hash(false), cap.hash(false));

        let without_debug = CapFile::parse(
            [header_block(), block(2, &[0x00; 10]), block(7, &[0x42; 30]), applet_block()].concat(),
        )
        .unwrap();
        assert_eq!(without_debug.hash(true), cap.hash(false));
    }

    #[test]
    fn test_missing_and_duplicate_components() {
        let no_directory = [header_block(), block(7, &[0x42; 4])].concat();
        assert!(matches!(
            CapFile::parse(no_directory),
            Err(Error::MalformedCapFile(msg)) if msg.contains("Directory")
        ));

        let no_header = block(2, &[0x00; 10]);
        assert!(matches!(CapFile::parse(no_header), Err(Error::MalformedCapFile(_))));

        let duplicate = [header_block(), block(2, &[0; 4]), block(2, &[0; 4])].concat();
        assert!(matches!(
            CapFile::parse(duplicate),
            Err(Error::MalformedCapFile(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let mut data = sample_components();
        data.truncate(data.len() - 1);
        assert!(matches!(CapFile::parse(data), Err(Error::MalformedCapFile(_))));

        let mut bad_magic = header_block();
        bad_magic[3] = 0x00;
        let data = [bad_magic, block(2, &[0; 4])].concat();
        assert!(matches!(CapFile::parse(data), Err(Error::MalformedCapFile(_))));

        assert!(matches!(CapFile::parse(hex!("0D0000").to_vec()), Err(Error::MalformedCapFile(_))));
    }

    #[test]
    fn test_out_of_range_aids() {
        let mut info = HEADER_MAGIC.to_vec();
        info.extend_from_slice(&[0x01, 0x02, 0x04, 0x00, 0x01, 0x03, 0xA0, 0x00, 0x00]);
        let data = [block(1, &info), block(2, &[0x00; 10])].concat();
        assert!(matches!(
            CapFile::parse(data),
            Err(Error::MalformedCapFile(msg)) if msg.contains("package AID")
        ));

        let mut info = vec![0x01, 0x11];
        info.extend_from_slice(&[0xA0; 17]);
        info.extend_from_slice(&[0x00, 0x12]);
        let data = [header_block(), block(2, &[0x00; 10]), block(3, &info)].concat();
        assert!(matches!(
            CapFile::parse(data),
            Err(Error::MalformedCapFile(msg)) if msg.contains("applet AID")
        ));
    }

    #[test]
    fn test_parse_archive() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer
            .write_all(b"Manifest-Version: 1.0\r\nJava-Card-Package-Name: com.example.wallet\r\n")
            .unwrap();
        for (name, data) in [
            ("Header", header_block()),
            ("Directory", block(2, &[0x00; 10])),
            ("Applet", applet_block()),
            ("Method", block(7, &[0x42; 30])),
        ] {
            writer
                .start_file(format!("com/example/wallet/javacard/{name}.cap"), options)
                .unwrap();
            writer.write_all(&data).unwrap();
        }
        let archive = writer.finish().unwrap().into_inner();

        let cap = CapFile::parse(archive).unwrap();
        assert_eq!(cap.package_name(), Some("com.example.wallet"));
        assert_eq!(cap.package_aid().as_bytes(), PACKAGE_AID);
        assert_eq!(cap.components(true).count(), 4);

        let raw = CapFile::parse(
            [header_block(), block(2, &[0x00; 10]), block(7, &[0x42; 30]), applet_block()].concat(),
        )
        .unwrap();
        assert_eq!(cap.hash(true), raw.hash(true));
        assert_eq!(cap.load_file_data(true), raw.load_file_data(true));
    }

    #[test]
    fn test_component_path() {
        assert_eq!(
            component_path("com/example/javacard/Method.cap"),
            Some(("com.example".to_owned(), ComponentKind::Method))
        );
        assert_eq!(component_path("com/example/javacard/Unknown.cap"), None);
        assert_eq!(component_path("com/example/Header.cap"), None);
        assert_eq!(component_path("META-INF/MANIFEST.MF"), None);
    }
}
