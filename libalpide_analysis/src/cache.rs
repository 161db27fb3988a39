use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::busy_file::BusyFile;
use super::constants::CACHE_FILE_NAME;
use super::error::CacheError;
use super::ru_file::ReadoutUnitId;
use super::trigger_actions::TriggerActionTable;
use super::violation_file::ViolationFile;

/// Bumped whenever the decoded record types change shape
pub const FORMAT_VERSION: u32 = 2;

/// Read ahead of the full record so caches of another format version are recognised even when
/// they no longer parse as `DecodedRun`
#[derive(Debug, Deserialize)]
struct CacheHeader {
    version: u32,
}

/// Everything decoded from the binary files of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRun {
    pub version: u32,
    /// RFC 3339 time at which the records were decoded
    pub created: String,
    /// Readout units the records were decoded for, in decoding order
    pub readout_units: Vec<ReadoutUnitId>,
    /// Readout unit the trigger actions were taken from
    pub trigger_action_unit: ReadoutUnitId,
    pub busy_files: Vec<(ReadoutUnitId, BusyFile)>,
    pub violation_files: Vec<ViolationFile>,
    pub trigger_actions: TriggerActionTable,
}

impl DecodedRun {
    pub fn new(
        readout_units: Vec<ReadoutUnitId>,
        trigger_action_unit: ReadoutUnitId,
        busy_files: Vec<(ReadoutUnitId, BusyFile)>,
        violation_files: Vec<ViolationFile>,
        trigger_actions: TriggerActionTable,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            version: FORMAT_VERSION,
            created: OffsetDateTime::now_utc().format(&Rfc3339)?,
            readout_units,
            trigger_action_unit,
            busy_files,
            violation_files,
            trigger_actions,
        })
    }

    pub fn write(&self, run_dir: &Path) -> Result<(), CacheError> {
        let path = run_dir.join(CACHE_FILE_NAME);
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(&path, yaml_str.as_bytes())?;
        log::info!(
            "Wrote decoded records to {} ({})",
            path.to_string_lossy(),
            human_bytes::human_bytes(yaml_str.len() as f64)
        );
        Ok(())
    }

    /// Load the cached records of a run. Returns None if there is no cache, or if it was
    /// written by a different format version or for a different set of readout units.
    pub fn read(
        run_dir: &Path,
        readout_units: &[ReadoutUnitId],
        trigger_action_unit: ReadoutUnitId,
    ) -> Result<Option<Self>, CacheError> {
        let path = run_dir.join(CACHE_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let yaml_str = std::fs::read_to_string(&path)?;
        let header: CacheHeader = serde_yaml::from_str(&yaml_str)?;
        if header.version != FORMAT_VERSION {
            log::warn!(
                "Ignoring {} with format version {} (current is {})",
                path.to_string_lossy(),
                header.version,
                FORMAT_VERSION
            );
            return Ok(None);
        }
        let cached: Self = serde_yaml::from_str(&yaml_str)?;
        if cached.readout_units != readout_units
            || cached.trigger_action_unit != trigger_action_unit
        {
            log::warn!(
                "Ignoring {} as it was written for {} readout unit(s) with trigger actions from {}; the run now has {} with trigger actions from {}",
                path.to_string_lossy(),
                cached.readout_units.len(),
                cached.trigger_action_unit,
                readout_units.len(),
                trigger_action_unit
            );
            return Ok(None);
        }
        log::info!(
            "Loaded decoded records from {} created {}",
            path.to_string_lossy(),
            cached.created
        );
        Ok(Some(cached))
    }
}
