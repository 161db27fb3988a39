use std::path::PathBuf;
use thiserror::Error;

use super::constants::{N_LAYERS, TRUNCATED_CHIP_ID_MASK};
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Invalid layer {0}; the detector has {max} layers", max=N_LAYERS)]
    BadLayer(usize),
    #[error("Invalid stave {stave} for layer {layer}; the layer has {max} staves")]
    BadStave {
        layer: usize,
        stave: usize,
        max: usize,
    },
    #[error("Invalid sub-stave {sub_stave} for layer {layer}; staves in this layer have {max} sub-stave(s)")]
    BadSubStave {
        layer: usize,
        sub_stave: usize,
        max: usize,
    },
    #[error("Invalid module {module} for layer {layer}; a sub-stave in this layer has {max} module(s)")]
    BadModule {
        layer: usize,
        module: usize,
        max: usize,
    },
    #[error("Invalid module chip {chip} for layer {layer}; a module in this layer has {max} chips")]
    BadModuleChip {
        layer: usize,
        chip: usize,
        max: usize,
    },
    #[error("Invalid global chip id {id}; the detector has {total} chips")]
    BadGlobalChipId { id: u32, total: usize },
    #[error("Invalid data link {link} for layer {layer}; a stave in this layer has {max} data links")]
    BadDataLink {
        layer: usize,
        link: usize,
        max: usize,
    },
    #[error("Invalid truncated chip id {0}; on-wire chip ids are at most {max}", max=TRUNCATED_CHIP_ID_MASK)]
    BadTruncatedChipId(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Buffer truncated at byte {offset} while reading {field}; needed {needed} byte(s) but {available} remain")]
    Truncated {
        offset: usize,
        field: &'static str,
        needed: u64,
        available: u64,
    },
    #[error("Found {0} trailing byte(s) after the last record declared by the embedded counts")]
    TrailingBytes(usize),
    #[error("Data link {link} on layer {layer} declares {count} chips; a link on this layer serves at most {max}")]
    TooManyChips {
        layer: usize,
        link: usize,
        count: u8,
        max: usize,
    },
    #[error("Unknown trigger action {action} for trigger {trigger_id} on control link {link}")]
    UnknownTriggerAction {
        trigger_id: u64,
        link: usize,
        action: u8,
    },
    #[error("Record decoding failed due to geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum RuFileError {
    #[error("Expected readout unit file {0:?} does not exist")]
    MissingFile(PathBuf),
    #[error("Readout unit file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Failed to decode readout unit file {path:?}: {source}")]
    BadRecord { path: PathBuf, source: DecodeError },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelatorError {
    #[error("Event at position {index} becomes active at {start} ns, before the preceding event at {previous} ns")]
    EventsOutOfOrder { index: usize, start: u64, previous: u64 },
    #[error("Strobe at position {index} opens at {on} ns, before the preceding strobe at {previous} ns")]
    StrobesOutOfOrder { index: usize, on: u64, previous: u64 },
    #[error("Event {event_index} has an active window ending at {end} ns before it starts at {start} ns")]
    BadEventInterval {
        event_index: usize,
        start: u64,
        end: u64,
    },
    #[error("Strobe for trigger {trigger_id} closes at {off} ns before it opens at {on} ns")]
    BadStrobeWindow { trigger_id: u64, on: u64, off: u64 },
    #[error("Trigger {0} has no physics event to derive its strobe time from")]
    MissingEventForTrigger(u64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Simulation settings are invalid: {0}")]
    InvalidSettings(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Decoded record cache failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Decoded record cache failed to convert to/from yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Decoded record cache failed to format its creation time: {0}")]
    TimeFormat(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to readout unit file error: {0}")]
    RuFileError(#[from] RuFileError),
    #[error("Processor failed due to geometry error: {0}")]
    GeometryError(#[from] GeometryError),
    #[error("Processor failed due to cache error: {0}")]
    CacheError(#[from] CacheError),
    #[error("Processor failed due to correlator error: {0}")]
    CorrelatorError(#[from] CorrelatorError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}
