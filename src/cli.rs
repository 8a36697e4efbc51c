//! Library-side logic behind the `pointd` binary's subcommands,
//! split from argument parsing so the binary itself stays thin over this
//! functions.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ArchiverMode, Config};
use crate::error::{PointError, Result};
use crate::model::{PointId, VersionedValue};
use crate::store::{
    Archiver, JitArchiver, ScheduledArchiver, StoreValuesQuery, TheStore,
};
use crate::time::sync::CrontabSync;
use crate::time::zone::Zone;
use crate::time::DateTime;

/// Builds the archiver named by `config.archiver_mode`.
pub fn build_archiver(config: &Config) -> Result<Box<dyn Archiver>> {
    match config.archiver_mode {
        ArchiverMode::JustInTime => Ok(Box::new(JitArchiver::new())),
        ArchiverMode::Scheduled => {
            let expr = config.archiver_schedule.as_deref().ok_or_else(|| {
                PointError::BadParameter(
                    "archiver_mode = \"scheduled\" requires archiver_schedule".into(),
                )
            })?;
            let sync = CrontabSync::parse(expr, Zone::utc())?;
            Ok(Box::new(ScheduledArchiver::new(Box::new(sync))))
        }
    }
}

/// Opens the store rooted at `config.data_dir`, creating the directory
/// if it does not yet exist.
pub fn open_store(config: &Config) -> Result<TheStore> {
    let archiver = build_archiver(config)?;
    let dir = PathBuf::from(&config.data_dir);
    std::fs::create_dir_all(&dir).map_err(PointError::StoreAccess)?;
    TheStore::open(&dir.join("store.db"), archiver)
}

/// `pointd run --config <path> --service <name>`: the one required
/// start-up entry point. Opens the configured store and
/// confirms it is ready to serve; the batch loop itself is driven by
/// whatever schedules/queues the deployment wires up via
/// [`crate::processor::Processor`].
pub fn run_service(config_path: &Path, service_name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let store = open_store(&config)?;
    store.flush_archiver(DateTime::from_micros(0));
    info!(service = service_name, data_dir = %config.data_dir, "point-value service ready");
    Ok(())
}

/// `pointd query`: thin wrapper over [`TheStore::query`].
pub fn query(
    store: &TheStore,
    point: PointId,
    from: DateTime,
    to: DateTime,
    limit: Option<usize>,
) -> Vec<VersionedValue> {
    let mut request = StoreValuesQuery::new(point, from, to);
    if let Some(limit) = limit {
        request = request.with_limit(limit);
    }
    store.query(request).collect()
}

/// `pointd purge`: thin wrapper over [`TheStore::purge`].
pub fn purge(store: &TheStore, point: PointId, before: DateTime) -> Result<u64> {
    store.purge(point, before)
}

/// `pointd stats`: point-scoped row count plus the current snapshot
/// value.
pub struct PointStats {
    pub point: PointId,
    pub archived_rows: usize,
    pub latest: Option<VersionedValue>,
}

pub fn stats(store: &TheStore, point: PointId) -> PointStats {
    PointStats {
        point,
        archived_rows: store.count(point),
        latest: store.latest(point),
    }
}
