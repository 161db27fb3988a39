use serde::{Deserialize, Serialize};

use super::byte_reader::ByteReader;
use super::constants::BUSY_RECORD_SIZE;
use super::error::DecodeError;

/// One BUSY_ON -> BUSY_OFF period seen on a data link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub link_id: usize,
    pub busy_on_ns: u64,
    pub busy_off_ns: u64,
    pub busy_on_trigger_id: u64,
    pub busy_off_trigger_id: u64,
}

impl BusyInterval {
    pub fn duration_ns(&self) -> u64 {
        self.busy_off_ns.saturating_sub(self.busy_on_ns)
    }
}

/// The decoded contents of a `RU_{layer}_{stave}_busy.dat` file.
///
/// Layout (little-endian):
///
/// ```text
/// u8  number of data links
/// for each data link:
///     u64 number of busy intervals
///     for each busy interval:
///         u64 busy on time (ns)
///         u64 busy off time (ns)
///         u64 trigger id at busy on
///         u64 trigger id at busy off
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyFile {
    pub link_count: usize,
    pub intervals: Vec<BusyInterval>,
}

impl BusyFile {
    pub fn intervals_for_link(&self, link_id: usize) -> impl Iterator<Item = &BusyInterval> {
        self.intervals
            .iter()
            .filter(move |interval| interval.link_id == link_id)
    }

    /// Busy time summed over every link
    pub fn total_busy_ns(&self) -> u64 {
        self.intervals.iter().map(|i| i.duration_ns()).sum()
    }
}

impl TryFrom<&[u8]> for BusyFile {
    type Error = DecodeError;

    /// Decode a whole busy file. The buffer must hold exactly the records its counts declare.
    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        let mut reader = ByteReader::new(buffer);
        let link_count = reader.read_u8("data link count")? as usize;
        let mut intervals = Vec::new();

        for link_id in 0..link_count {
            let n_intervals = reader.read_u64("busy interval count")?;
            reader.require_items(n_intervals, BUSY_RECORD_SIZE, "busy intervals")?;
            intervals.reserve(n_intervals as usize);
            for _ in 0..n_intervals {
                intervals.push(BusyInterval {
                    link_id,
                    busy_on_ns: reader.read_u64("busy on time")?,
                    busy_off_ns: reader.read_u64("busy off time")?,
                    busy_on_trigger_id: reader.read_u64("busy on trigger id")?,
                    busy_off_trigger_id: reader.read_u64("busy off trigger id")?,
                });
            }
        }
        reader.finish()?;

        Ok(Self {
            link_count,
            intervals,
        })
    }
}
