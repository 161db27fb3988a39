use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt::Display;

use super::busy_file::BusyFile;
use super::geometry::SimulatedChips;
use super::ru_file::ReadoutUnitId;
use super::violation_file::{ViolationFile, ViolationKind};

/// trigger id -> number of chips that reported the trigger
pub type TriggerCounts = FxHashMap<u64, usize>;

/// Violation counts of a single layer
#[derive(Debug, Clone, Default)]
pub struct LayerLoss {
    by_kind: FxHashMap<ViolationKind, TriggerCounts>,
    /// Summed over the kinds that lose a frame (busyv, flush, ro_abort)
    any_kind: TriggerCounts,
    /// Records of chips that are not part of the simulation
    pub dropped_records: usize,
}

impl LayerLoss {
    pub fn counts(&self, kind: ViolationKind) -> Option<&TriggerCounts> {
        self.by_kind.get(&kind)
    }

    pub fn any_kind_counts(&self) -> &TriggerCounts {
        &self.any_kind
    }

    /// Number of chips on this layer that reported `kind` for the trigger
    pub fn chip_count(&self, kind: ViolationKind, trigger_id: u64) -> usize {
        self.counts(kind)
            .and_then(|counts| counts.get(&trigger_id))
            .copied()
            .unwrap_or(0)
    }

    /// Triggers that lost at least one frame on this layer, ascending
    pub fn affected_triggers(&self) -> Vec<u64> {
        let mut triggers: Vec<u64> = self.any_kind.keys().copied().collect();
        triggers.sort_unstable();
        triggers
    }

    /// Number of distinct triggers affected by `kind`
    pub fn trigger_count(&self, kind: ViolationKind) -> usize {
        self.counts(kind).map(|counts| counts.len()).unwrap_or(0)
    }
}

/// Aggregated loss records of a run, per layer.
///
/// Flush records are counted per chip the same way as the other kinds. The simulation does
/// not store how many pixels a flush removed, so a flush counts as the loss of the chip's
/// whole frame.
#[derive(Debug, Clone, Default)]
pub struct LossSummary {
    layers: BTreeMap<usize, LayerLoss>,
}

impl LossSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: &ViolationFile, simulated: &SimulatedChips) {
        let layer = self.layers.entry(file.readout_unit.layer).or_default();
        for record in file.records.iter() {
            if !simulated.contains(record.global_chip_id) {
                log::warn!(
                    "{} {} file reports chip {} which was not simulated; dropping its {} trigger(s)",
                    file.readout_unit,
                    file.kind,
                    record.global_chip_id,
                    record.trigger_ids.len()
                );
                layer.dropped_records += 1;
                continue;
            }
            let counts = layer.by_kind.entry(file.kind).or_default();
            for trigger_id in record.trigger_ids.iter() {
                *counts.entry(*trigger_id).or_insert(0) += 1;
                if file.kind.is_frame_loss() {
                    *layer.any_kind.entry(*trigger_id).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn layer(&self, layer: usize) -> Option<&LayerLoss> {
        self.layers.get(&layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&usize, &LayerLoss)> {
        self.layers.iter()
    }
}

impl Display for LossSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (layer, loss) in self.layers.iter() {
            write!(f, "Layer {layer}:")?;
            for kind in ViolationKind::ALL {
                write!(f, " {kind}={}", loss.trigger_count(kind))?;
            }
            writeln!(
                f,
                " any={} dropped={}",
                loss.any_kind.len(),
                loss.dropped_records
            )?;
        }
        Ok(())
    }
}

/// Busy activity of one readout unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusySummary {
    pub interval_count: usize,
    pub total_busy_ns: u64,
}

impl From<&BusyFile> for BusySummary {
    fn from(file: &BusyFile) -> Self {
        Self {
            interval_count: file.intervals.len(),
            total_busy_ns: file.total_busy_ns(),
        }
    }
}

pub fn summarize_busy<'a>(
    files: impl Iterator<Item = &'a (ReadoutUnitId, BusyFile)>,
) -> BTreeMap<ReadoutUnitId, BusySummary> {
    files.map(|(ru, file)| (*ru, BusySummary::from(file))).collect()
}
