//! Spool directories shared with the application layer.
//!
//! The application drops outgoing files into a spool directory; the sender
//! splits each into wire-sized chunks. On the far side, delivered bytes
//! are appended to one well-known incoming file - boundaries between
//! source files are not preserved at this layer.

use std::{
    collections::HashSet,
    fs,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use paperlink_core::{ChunkSource, DeliverySink, LinkError};
use paperlink_proto::DATA_SIZE;

use crate::error::StationError;

/// Outgoing spool: glob-matched files, chunked for the wire.
///
/// Filenames already ingested are remembered so a file is queued exactly
/// once, however often the directory is rescanned.
#[derive(Debug)]
pub struct OutgoingSpool {
    dir: PathBuf,
    pattern: String,
    chunk_size: usize,
    processed: HashSet<PathBuf>,
}

impl OutgoingSpool {
    /// Spool over `dir`, ingesting files whose names match `pattern`
    /// (e.g. `request_*.json`).
    pub fn new(dir: impl Into<PathBuf>, pattern: &str) -> Result<Self, StationError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StationError::Config(format!("spool dir {}: {e}", dir.display())))?;

        Ok(Self {
            dir,
            pattern: pattern.to_string(),
            chunk_size: DATA_SIZE,
            processed: HashSet::new(),
        })
    }

    /// Override the chunk size (tests use tiny chunks to exercise
    /// windowing).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, DATA_SIZE);
        self
    }

    /// Number of files ingested so far.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    fn matching_files(&self) -> Result<Vec<PathBuf>, LinkError> {
        let pattern = self.dir.join(&self.pattern);
        let pattern = pattern.to_string_lossy();

        let paths = glob::glob(&pattern)
            .map_err(|e| LinkError::Emit(format!("bad spool pattern {pattern}: {e}")))?;

        let mut files = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {},
                Err(error) => tracing::warn!(%error, "Skipping unreadable spool entry"),
            }
        }
        // Directory iteration order is arbitrary; the stream order must
        // not be.
        files.sort();
        Ok(files)
    }
}

impl ChunkSource for OutgoingSpool {
    fn poll_chunks(&mut self) -> Result<Vec<Bytes>, LinkError> {
        let mut chunks = Vec::new();

        for path in self.matching_files()? {
            if self.processed.contains(&path) {
                continue;
            }
            self.processed.insert(path.clone());

            let data = fs::read(&path)?;
            tracing::info!(
                file = %path.display(),
                bytes = data.len(),
                "Queueing spooled file"
            );

            for chunk in data.chunks(self.chunk_size) {
                chunks.push(Bytes::copy_from_slice(chunk));
            }
        }

        Ok(chunks)
    }
}

/// Incoming spool: append-only delivery file.
#[derive(Debug)]
pub struct IncomingSpool {
    path: PathBuf,
    file: File,
}

impl IncomingSpool {
    /// Open (creating as needed) the incoming file for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StationError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                StationError::Config(format!("incoming dir {}: {e}", parent.display()))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StationError::Config(format!("incoming file {}: {e}", path.display())))?;

        Ok(Self { path, file })
    }

    /// Path of the delivery file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeliverySink for IncomingSpool {
    fn deliver(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.file.write_all(payload)?;
        // Flush per delivery: the application tails this file while the
        // transfer is still in progress.
        self.file.flush()?;
        Ok(())
    }
}
