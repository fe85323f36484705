//! CAP file loading
//!
//! The Load File Data Block (`C4`, BER length, components) is split into LOAD
//! blocks small enough to survive secure messaging and sent after an
//! INSTALL [for load].

use bytes::{BufMut, Bytes, BytesMut};
use gpman_apdu_core::{CardTransport, SecureChannel, SecurityLevel};
use tracing::{debug, info, instrument, warn};

use crate::cap::CapFile;
use crate::commands::install::load_parameters;
use crate::commands::{InstallCommand, LoadCommand};
use crate::config::LoadOptions;
use crate::constants::{load_p1, tags};
use crate::session::Session;
use crate::{Aid, Error, Result};

/// Callback receiving `(block_index, block_count)` after each accepted block
pub type LoadingCallback<'a> = dyn FnMut(usize, usize) + 'a;

/// Outcome of a completed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Package that was loaded
    pub package_aid: Aid,
    /// Number of LOAD commands sent
    pub blocks: usize,
    /// Load File Data Block bytes sent, `C4` header included
    pub bytes: usize,
    /// Whether INSTALL [for load] carried the load file hash
    pub hash_sent: bool,
}

/// A stream of LOAD commands for a CAP file
#[derive(Debug)]
pub struct LoadCommandStream {
    blocks: Vec<Bytes>,
    current_block: usize,
    total_len: usize,
}

impl LoadCommandStream {
    /// Split a CAP file according to `options` for a channel at `level`
    pub fn new(cap: &CapFile, options: &LoadOptions, level: SecurityLevel) -> Result<Self> {
        let block_size = Self::effective_block_size(options.block_size, level)?;
        let data = cap.load_file_data(options.include_debug);

        let mut header = BytesMut::with_capacity(5);
        header.put_u8(tags::LOAD_FILE_DATA_BLOCK);
        header.put_slice(&Self::encode_length(data.len()));
        let header = header.freeze();

        if options.component_separated {
            let chunks = std::iter::once(header).chain(
                cap.components(options.include_debug)
                    .map(|component| Bytes::copy_from_slice(component.as_bytes())),
            );
            Ok(Self::from_chunks(chunks, block_size))
        } else {
            let mut stream = BytesMut::with_capacity(header.len() + data.len());
            stream.put_slice(&header);
            stream.put_slice(&data);
            Ok(Self::from_chunks([stream.freeze()], block_size))
        }
    }

    /// Split each chunk into blocks of at most `block_size` bytes; blocks never span chunks
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>, block_size: usize) -> Self {
        let mut blocks = Vec::new();
        let mut total_len = 0;
        for chunk in chunks {
            total_len += chunk.len();
            let mut offset = 0;
            while offset < chunk.len() {
                let end = usize::min(offset + block_size, chunk.len());
                blocks.push(chunk.slice(offset..end));
                offset = end;
            }
        }
        Self {
            blocks,
            current_block: 0,
            total_len,
        }
    }

    /// Block size left after secure messaging overhead
    pub fn effective_block_size(block_size: usize, level: SecurityLevel) -> Result<usize> {
        match block_size.checked_sub(level.overhead()) {
            Some(size) if size > 0 => Ok(size),
            _ => Err(Error::InvalidConfig("load block size smaller than secure messaging overhead")),
        }
    }

    /// Encode a length value into BER-TLV format
    pub fn encode_length(length: usize) -> Vec<u8> {
        if length < 0x80 {
            vec![length as u8]
        } else if length < 0x100 {
            vec![0x81, length as u8]
        } else if length < 0x10000 {
            vec![0x82, (length >> 8) as u8, length as u8]
        } else {
            vec![0x83, (length >> 16) as u8, (length >> 8) as u8, length as u8]
        }
    }

    /// Get the total number of blocks
    pub fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    /// Get the current block index
    pub const fn current_block(&self) -> usize {
        self.current_block
    }

    /// Bytes across all blocks
    pub const fn total_len(&self) -> usize {
        self.total_len
    }

    /// Check if there are more blocks
    pub fn has_next(&self) -> bool {
        self.current_block < self.blocks.len()
    }
}

impl Iterator for LoadCommandStream {
    type Item = LoadCommand;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.blocks.get(self.current_block)?.clone();
        let is_last = self.current_block + 1 == self.blocks.len();
        let p1 = if is_last {
            load_p1::LAST_BLOCK
        } else {
            load_p1::MORE_BLOCKS
        };
        // P2 is the block number modulo 256
        let command = LoadCommand::with_block_data(p1, self.current_block as u8, block);
        self.current_block += 1;
        Some(command)
    }
}

impl<T: CardTransport> Session<T> {
    /// Send INSTALL [for load] for a package into the configured security domain
    pub fn install_for_load(&mut self, package_aid: &Aid, hash: Option<&[u8]>) -> Result<()> {
        let command = InstallCommand::for_load(
            package_aid,
            self.config().sd_aid(),
            hash.unwrap_or_default(),
            load_parameters(self.config().load_options().code_size),
        );
        self.execute(&command)?.into_result()
    }

    /// Load a CAP file with the configured options
    pub fn load(&mut self, cap: &CapFile) -> Result<LoadReport> {
        self.load_with_progress(cap, &mut |_, _| {})
    }

    /// Load a CAP file, reporting each accepted block
    ///
    /// A refused block fails with [`Error::LoadRejected`] naming its index; the
    /// card is left to recover a partial load on its own.
    #[instrument(level = "debug", skip_all, fields(package = %cap.package_aid()))]
    pub fn load_with_progress(
        &mut self,
        cap: &CapFile,
        progress: &mut LoadingCallback<'_>,
    ) -> Result<LoadReport> {
        let options = *self.config().load_options();
        let stream = LoadCommandStream::new(cap, &options, self.channel().security_level())?;
        let (blocks, bytes) = (stream.blocks_count(), stream.total_len());

        let hash = options.include_hash.then(|| cap.hash(options.include_debug));
        self.install_for_load(cap.package_aid(), hash.as_ref().map(|h| h.as_slice()))?;
        debug!(blocks, bytes, "INSTALL [for load] accepted");

        for (index, command) in stream.enumerate() {
            let status = self.execute(&command)?.status();
            if !status.is_success() {
                warn!(block = index, %status, "LOAD rejected");
                return Err(Error::LoadRejected { block: index, status });
            }
            debug!(block = index + 1, of = blocks, "Block loaded");
            progress(index, blocks);
        }

        info!(blocks, bytes, "Package loaded");
        Ok(LoadReport {
            package_aid: cap.package_aid().clone(),
            blocks,
            bytes,
            hash_sent: hash.is_some(),
        })
    }
}
