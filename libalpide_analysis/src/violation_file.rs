use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::byte_reader::ByteReader;
use super::chip_id_fix::repair_position;
use super::error::DecodeError;
use super::geometry::{GeometryConstants, GlobalChipId, Position};
use super::ru_file::ReadoutUnitId;

/// The kinds of per-chip loss record that share the violation file layout.
///
/// The kind is not stored in the file itself; it is implied by the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationKind {
    BusyViolation,
    Flush,
    ReadoutAbort,
    Fatal,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 4] = [
        ViolationKind::BusyViolation,
        ViolationKind::Flush,
        ViolationKind::ReadoutAbort,
        ViolationKind::Fatal,
    ];

    /// Suffix used in `RU_{layer}_{stave}_{suffix}.dat`
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::BusyViolation => "busyv",
            Self::Flush => "flush",
            Self::ReadoutAbort => "ro_abort",
            Self::Fatal => "fatal",
        }
    }

    /// Busy violations, flushes and readout aborts each cost the data of one frame. Fatal
    /// records mark a chip that stopped taking data and are kept apart.
    pub fn is_frame_loss(&self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_suffix())
    }
}

/// All triggers for which one chip reported a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub link_id: usize,
    pub global_chip_id: GlobalChipId,
    pub trigger_ids: Vec<u64>,
}

/// The decoded contents of a busyv/flush/ro_abort/fatal file of one readout unit.
///
/// Layout (little-endian):
///
/// ```text
/// u8  number of data links
/// for each data link:
///     u8  number of chips with data on this link
///     for each chip:
///         u8  truncated chip id (low 4 bits of the global chip id)
///         u64 number of events
///         u64 trigger id, repeated for each event
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationFile {
    pub kind: ViolationKind,
    pub readout_unit: ReadoutUnitId,
    pub link_count: usize,
    pub records: Vec<ViolationRecord>,
}

impl ViolationFile {
    /// Decode a whole violation file for the given readout unit.
    ///
    /// Chip ids are repaired and converted to global chip ids on the way in, so the records
    /// refer to chips the same way every other part of the analysis does.
    pub fn decode(
        buffer: &[u8],
        kind: ViolationKind,
        readout_unit: ReadoutUnitId,
        geometry: &GeometryConstants,
    ) -> Result<Self, DecodeError> {
        let layer = readout_unit.layer;
        let max_chips = geometry.max_chips_per_data_link(layer)?;

        let mut reader = ByteReader::new(buffer);
        let link_count = reader.read_u8("data link count")? as usize;
        let mut records = Vec::new();

        for link_id in 0..link_count {
            let chip_count = reader.read_u8("chip count")?;
            if chip_count as usize > max_chips {
                return Err(DecodeError::TooManyChips {
                    layer,
                    link: link_id,
                    count: chip_count,
                    max: max_chips,
                });
            }
            let (sub_stave_id, module_id) =
                geometry.data_link_id_to_sub_stave_and_module(link_id, layer)?;
            let link_position = Position {
                layer_id: layer,
                stave_id: readout_unit.stave,
                sub_stave_id,
                module_id,
                module_chip_id: 0,
            };

            for _ in 0..chip_count {
                let truncated_id = reader.read_u8("truncated chip id")?;
                let position = repair_position(&link_position, link_id, truncated_id)?;
                let global_chip_id = geometry.position_to_global_chip_id(&position)?;

                let n_events = reader.read_u64("event count")?;
                let trigger_ids = reader.read_u64_array(n_events, "trigger ids")?;
                records.push(ViolationRecord {
                    link_id,
                    global_chip_id,
                    trigger_ids,
                });
            }
        }
        reader.finish()?;

        Ok(Self {
            kind,
            readout_unit,
            link_count,
            records,
        })
    }

    /// Number of (chip, trigger) violations in the file
    pub fn event_count(&self) -> usize {
        self.records.iter().map(|r| r.trigger_ids.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;
    use crate::geometry::ITS_GEOMETRY;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn push_chip(bytes: &mut Vec<u8>, truncated_id: u8, triggers: &[u64]) {
        bytes.push(truncated_id);
        bytes.write_u64::<LittleEndian>(triggers.len() as u64).unwrap();
        for trigger in triggers {
            bytes.write_u64::<LittleEndian>(*trigger).unwrap();
        }
    }

    #[test]
    fn test_decode_inner_barrel() {
        // Layer 0 stave 1: link 0 has nothing, link 4 (chip 4) has two busy violations
        let mut bytes = vec![5u8, 0, 0, 0, 0, 1];
        push_chip(&mut bytes, 0xD, &[10, 11]);
        let ru = ReadoutUnitId::new(0, 1);
        let file =
            ViolationFile::decode(&bytes, ViolationKind::BusyViolation, ru, &ITS_GEOMETRY).unwrap();
        assert_eq!(file.link_count, 5);
        assert_eq!(
            file.records,
            vec![ViolationRecord {
                link_id: 4,
                global_chip_id: GlobalChipId(9 + 4),
                trigger_ids: vec![10, 11],
            }]
        );
        assert_eq!(file.event_count(), 2);
    }

    #[test]
    fn test_decode_outer_barrel() {
        // Layer 6 stave 3, link 15 -> sub-stave 1, module 0, upper half module
        let geo = &ITS_GEOMETRY;
        let expected = Position {
            layer_id: 6,
            stave_id: 3,
            sub_stave_id: 1,
            module_id: 0,
            module_chip_id: 9,
        };
        let global = geo.position_to_global_chip_id(&expected).unwrap();
        let truncated = (global.0 & 0xF) as u8;

        let mut bytes = vec![16u8];
        bytes.extend(std::iter::repeat(0u8).take(15));
        bytes.push(1);
        push_chip(&mut bytes, truncated, &[42]);

        let file = ViolationFile::decode(
            &bytes,
            ViolationKind::Flush,
            ReadoutUnitId::new(6, 3),
            geo,
        )
        .unwrap();
        assert_eq!(file.records.len(), 1);
        assert_eq!(file.records[0].link_id, 15);
        assert_eq!(file.records[0].global_chip_id, global);
    }

    #[test]
    fn test_too_many_chips_on_link() {
        let mut bytes = vec![1u8, 2];
        push_chip(&mut bytes, 0, &[]);
        push_chip(&mut bytes, 1, &[]);
        assert_eq!(
            ViolationFile::decode(
                &bytes,
                ViolationKind::Fatal,
                ReadoutUnitId::new(2, 0),
                &ITS_GEOMETRY
            ),
            Err(DecodeError::TooManyChips {
                layer: 2,
                link: 0,
                count: 2,
                max: 1
            })
        );
    }

    #[test]
    fn test_bad_stave_is_range_error() {
        let mut bytes = vec![1u8, 1];
        push_chip(&mut bytes, 0, &[1]);
        assert!(matches!(
            ViolationFile::decode(
                &bytes,
                ViolationKind::ReadoutAbort,
                ReadoutUnitId::new(0, 12),
                &ITS_GEOMETRY
            ),
            Err(DecodeError::Geometry(GeometryError::BadStave { .. }))
        ));
    }

    #[test]
    fn test_high_bits_in_chip_id_fail_the_file() {
        let mut bytes = vec![1u8, 1];
        push_chip(&mut bytes, 0x13, &[1]);
        assert_eq!(
            ViolationFile::decode(
                &bytes,
                ViolationKind::BusyViolation,
                ReadoutUnitId::new(3, 0),
                &ITS_GEOMETRY
            ),
            Err(DecodeError::Geometry(GeometryError::BadTruncatedChipId(0x13)))
        );
    }

    #[test]
    fn test_truncation_fails() {
        let mut bytes = vec![2u8, 1];
        push_chip(&mut bytes, 0, &[1, 2, 3]);
        bytes.push(0);
        let ru = ReadoutUnitId::new(1, 0);
        assert!(ViolationFile::decode(&bytes, ViolationKind::Flush, ru, &ITS_GEOMETRY).is_ok());
        for len in 0..bytes.len() {
            assert!(matches!(
                ViolationFile::decode(&bytes[..len], ViolationKind::Flush, ru, &ITS_GEOMETRY),
                Err(DecodeError::Truncated { .. })
            ));
        }
    }
}
