use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use super::busy_file::BusyFile;
use super::constants::{BUSY_FILE_SUFFIX, TRIGGER_ACTIONS_FILE_SUFFIX};
use super::error::{DecodeError, RuFileError};
use super::geometry::GeometryConstants;
use super::trigger_actions::TriggerActionTable;
use super::violation_file::{ViolationFile, ViolationKind};

/// A readout unit, the controller servicing all links of one stave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadoutUnitId {
    pub layer: usize,
    pub stave: usize,
}

impl ReadoutUnitId {
    pub fn new(layer: usize, stave: usize) -> Self {
        Self { layer, stave }
    }

    /// File name of one of this unit's output files, `RU_{layer}_{stave}_{suffix}.dat`
    pub fn file_name(&self, suffix: &str) -> String {
        format!("RU_{}_{}_{}.dat", self.layer, self.stave, suffix)
    }
}

impl Display for ReadoutUnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RU_{}_{}", self.layer, self.stave)
    }
}

/// Load a readout unit file completely into memory.
///
/// The files are static simulation output, so a missing file is reported straight away.
fn load_ru_file(
    run_dir: &Path,
    readout_unit: &ReadoutUnitId,
    suffix: &str,
) -> Result<(PathBuf, Vec<u8>), RuFileError> {
    let path = run_dir.join(readout_unit.file_name(suffix));
    if !path.exists() {
        return Err(RuFileError::MissingFile(path));
    }
    let bytes = std::fs::read(&path)?;
    log::debug!(
        "Loaded {} ({})",
        path.to_string_lossy(),
        human_bytes::human_bytes(bytes.len() as f64)
    );
    Ok((path, bytes))
}

fn tag_path(path: PathBuf) -> impl FnOnce(DecodeError) -> RuFileError {
    move |source| RuFileError::BadRecord { path, source }
}

pub fn read_busy_file(run_dir: &Path, readout_unit: &ReadoutUnitId) -> Result<BusyFile, RuFileError> {
    let (path, bytes) = load_ru_file(run_dir, readout_unit, BUSY_FILE_SUFFIX)?;
    BusyFile::try_from(bytes.as_slice()).map_err(tag_path(path))
}

pub fn read_violation_file(
    run_dir: &Path,
    readout_unit: &ReadoutUnitId,
    kind: ViolationKind,
    geometry: &GeometryConstants,
) -> Result<ViolationFile, RuFileError> {
    let (path, bytes) = load_ru_file(run_dir, readout_unit, kind.file_suffix())?;
    ViolationFile::decode(&bytes, kind, *readout_unit, geometry).map_err(tag_path(path))
}

pub fn read_trigger_action_file(
    run_dir: &Path,
    readout_unit: &ReadoutUnitId,
) -> Result<TriggerActionTable, RuFileError> {
    let (path, bytes) = load_ru_file(run_dir, readout_unit, TRIGGER_ACTIONS_FILE_SUFFIX)?;
    TriggerActionTable::decode(&bytes).map_err(tag_path(path))
}
