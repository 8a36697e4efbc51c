//! Durable write-ahead log for store commits: a thin wrapper around
//! [`crate::log::RecordLog`] that frames a [`VersionedValue`] using
//! [`crate::wire`].

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::log::{self, RecordLog};
use crate::model::VersionedValue;
use crate::wire;

pub struct StoreWal {
    log: RecordLog,
}

impl StoreWal {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(StoreWal {
            log: RecordLog::open(path)?,
        })
    }

    pub fn append(&mut self, versioned: &VersionedValue) -> Result<()> {
        let mut body = Vec::new();
        wire::encode_versioned(versioned, &mut body);
        self.log.append(&body)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.log.sync()
    }

    /// Replays every committed record in file order.
    pub fn replay<F: FnMut(VersionedValue) -> Result<()>>(&mut self, mut apply: F) -> Result<u64> {
        self.log.replay(|body| {
            let (versioned, _) = wire::decode_versioned(body)?;
            apply(versioned)
        })
    }
}

/// `<db path>.wal`.
pub fn wal_path(base: &Path) -> PathBuf {
    log::sidecar_path(base, "wal")
}
