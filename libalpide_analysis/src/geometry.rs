use bit_set::BitSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use super::config::SimulationSettings;
use super::constants::*;
use super::error::GeometryError;

/// Hierarchical address of a single chip in the detector.
///
/// For the middle and outer barrel (layer 3 and up) `module_id` is the index of the module
/// within its sub-stave. Inner barrel staves have neither modules nor sub-staves, so both
/// `sub_stave_id` and `module_id` are always 0 there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub layer_id: usize,
    pub stave_id: usize,
    pub sub_stave_id: usize,
    pub module_id: usize,
    pub module_chip_id: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "layer {} stave {} sub-stave {} module {} chip {}",
            self.layer_id, self.stave_id, self.sub_stave_id, self.module_id, self.module_chip_id
        )
    }
}

/// Flat zero-based index of a chip across the whole detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalChipId(pub u32);

impl Display for GlobalChipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-layer tables describing the detector topology.
///
/// Built once (see [ITS_GEOMETRY]) and only ever read afterwards, so a single instance can be
/// shared between any number of decoding threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryConstants {
    pub staves_per_layer: [usize; N_LAYERS],
    pub sub_staves_per_stave: [usize; N_LAYERS],
    pub modules_per_stave: [usize; N_LAYERS],
    pub modules_per_sub_stave: [usize; N_LAYERS],
    pub chips_per_module: [usize; N_LAYERS],
    pub chips_per_stave: [usize; N_LAYERS],
    pub chips_per_data_link: [usize; N_LAYERS],
    pub data_links_per_stave: [usize; N_LAYERS],
    pub ctrl_links_per_stave: [usize; N_LAYERS],
    cumulative_chip_count: [usize; N_LAYERS],
    total_chip_count: usize,
}

/// The ITS detector
pub static ITS_GEOMETRY: GeometryConstants = GeometryConstants::its();

impl GeometryConstants {
    /// Tables for the 7 layer ITS: 3 inner barrel, 2 middle barrel and 2 outer barrel layers
    pub const fn its() -> Self {
        let mut sub_staves_per_stave = [1; N_LAYERS];
        let mut modules_per_stave = [1; N_LAYERS];
        let mut chips_per_module = [CHIPS_PER_IB_STAVE; N_LAYERS];
        let mut chips_per_data_link = [1; N_LAYERS];
        let mut data_links_per_stave = [DATA_LINKS_PER_IB_STAVE; N_LAYERS];
        let mut ctrl_links_per_stave = [CTRL_LINKS_PER_IB_STAVE; N_LAYERS];

        let mut layer = N_INNER_BARREL_LAYERS;
        while layer < N_LAYERS {
            modules_per_stave[layer] = if layer < 5 {
                MODULES_PER_MB_STAVE
            } else {
                MODULES_PER_OB_STAVE
            };
            sub_staves_per_stave[layer] = SUB_STAVES_PER_MB_OB_STAVE;
            chips_per_module[layer] = CHIPS_PER_FULL_MODULE;
            chips_per_data_link[layer] = CHIPS_PER_HALF_MODULE;
            data_links_per_stave[layer] = modules_per_stave[layer] * DATA_LINKS_PER_FULL_MODULE;
            ctrl_links_per_stave[layer] = modules_per_stave[layer] * CTRL_LINKS_PER_FULL_MODULE;
            layer += 1;
        }

        let mut modules_per_sub_stave = [1; N_LAYERS];
        let mut chips_per_stave = [0; N_LAYERS];
        let mut cumulative_chip_count = [0; N_LAYERS];
        let mut total_chip_count = 0;
        let mut layer = 0;
        while layer < N_LAYERS {
            modules_per_sub_stave[layer] = modules_per_stave[layer] / sub_staves_per_stave[layer];
            chips_per_stave[layer] = modules_per_stave[layer] * chips_per_module[layer];
            cumulative_chip_count[layer] = total_chip_count;
            total_chip_count += STAVES_PER_LAYER[layer] * chips_per_stave[layer];
            layer += 1;
        }

        Self {
            staves_per_layer: STAVES_PER_LAYER,
            sub_staves_per_stave,
            modules_per_stave,
            modules_per_sub_stave,
            chips_per_module,
            chips_per_stave,
            chips_per_data_link,
            data_links_per_stave,
            ctrl_links_per_stave,
            cumulative_chip_count,
            total_chip_count,
        }
    }

    pub fn total_chip_count(&self) -> usize {
        self.total_chip_count
    }

    /// Number of chips in all layers before the given layer
    pub fn cumulative_chip_count(&self, layer: usize) -> Result<usize, GeometryError> {
        self.check_layer(layer)?;
        Ok(self.cumulative_chip_count[layer])
    }

    pub fn chips_in_layer(&self, layer: usize) -> Result<usize, GeometryError> {
        self.check_layer(layer)?;
        Ok(self.staves_per_layer[layer] * self.chips_per_stave[layer])
    }

    /// Most chips a single data link of a stave in this layer can carry data for
    pub fn max_chips_per_data_link(&self, layer: usize) -> Result<usize, GeometryError> {
        self.check_layer(layer)?;
        Ok(self.chips_per_data_link[layer])
    }

    fn check_layer(&self, layer: usize) -> Result<(), GeometryError> {
        if layer < N_LAYERS {
            Ok(())
        } else {
            Err(GeometryError::BadLayer(layer))
        }
    }

    /// Check every field of a position against the bounds of its layer
    pub fn validate_position(&self, pos: &Position) -> Result<(), GeometryError> {
        let layer = pos.layer_id;
        self.check_layer(layer)?;
        if pos.stave_id >= self.staves_per_layer[layer] {
            return Err(GeometryError::BadStave {
                layer,
                stave: pos.stave_id,
                max: self.staves_per_layer[layer],
            });
        }
        if pos.sub_stave_id >= self.sub_staves_per_stave[layer] {
            return Err(GeometryError::BadSubStave {
                layer,
                sub_stave: pos.sub_stave_id,
                max: self.sub_staves_per_stave[layer],
            });
        }
        if pos.module_id >= self.modules_per_sub_stave[layer] {
            return Err(GeometryError::BadModule {
                layer,
                module: pos.module_id,
                max: self.modules_per_sub_stave[layer],
            });
        }
        if pos.module_chip_id >= self.chips_per_module[layer] {
            return Err(GeometryError::BadModuleChip {
                layer,
                chip: pos.module_chip_id,
                max: self.chips_per_module[layer],
            });
        }
        Ok(())
    }

    /// Convert a position into the global chip id
    pub fn position_to_global_chip_id(&self, pos: &Position) -> Result<GlobalChipId, GeometryError> {
        self.validate_position(pos)?;
        let layer = pos.layer_id;
        let chips_per_module = self.chips_per_module[layer];

        let chip_id = self.cumulative_chip_count[layer]
            + self.chips_per_stave[layer] * pos.stave_id
            + self.modules_per_sub_stave[layer] * chips_per_module * pos.sub_stave_id
            + chips_per_module * pos.module_id
            + pos.module_chip_id;

        // Bounded by total_chip_count, which is far below u32::MAX
        Ok(GlobalChipId(chip_id as u32))
    }

    /// Convert a global chip id back into its position. Exact inverse of
    /// [GeometryConstants::position_to_global_chip_id]
    pub fn global_chip_id_to_position(&self, id: GlobalChipId) -> Result<Position, GeometryError> {
        let chip_id = id.0 as usize;
        if chip_id >= self.total_chip_count {
            return Err(GeometryError::BadGlobalChipId {
                id: id.0,
                total: self.total_chip_count,
            });
        }

        let mut layer_id = 0;
        while layer_id < N_LAYERS - 1 && chip_id >= self.cumulative_chip_count[layer_id + 1] {
            layer_id += 1;
        }

        let chip_num_in_layer = chip_id - self.cumulative_chip_count[layer_id];
        let stave_id = chip_num_in_layer / self.chips_per_stave[layer_id];
        let chip_num_in_stave = chip_num_in_layer % self.chips_per_stave[layer_id];

        let mut module_id = chip_num_in_stave / self.chips_per_module[layer_id];
        let module_chip_id = chip_num_in_stave % self.chips_per_module[layer_id];

        let mut sub_stave_id = 0;
        if layer_id >= N_INNER_BARREL_LAYERS {
            sub_stave_id = module_id / self.modules_per_sub_stave[layer_id];
            module_id %= self.modules_per_sub_stave[layer_id];
        }

        Ok(Position {
            layer_id,
            stave_id,
            sub_stave_id,
            module_id,
            module_chip_id,
        })
    }

    /// Find the sub-stave and module (within the sub-stave) served by a data link of a stave.
    ///
    /// Returns `(sub_stave_id, module_id)`. Inner barrel links map one-to-one onto chips, so
    /// they always give `(0, 0)`.
    pub fn data_link_id_to_sub_stave_and_module(
        &self,
        link_id: usize,
        layer: usize,
    ) -> Result<(usize, usize), GeometryError> {
        self.check_layer(layer)?;
        let links_per_stave = self.data_links_per_stave[layer];
        if link_id >= links_per_stave {
            return Err(GeometryError::BadDataLink {
                layer,
                link: link_id,
                max: links_per_stave,
            });
        }
        if layer < N_INNER_BARREL_LAYERS {
            return Ok((0, 0));
        }

        let links_per_sub_stave = links_per_stave / self.sub_staves_per_stave[layer];
        let sub_stave_id = link_id / links_per_sub_stave;
        let module_id = (link_id % links_per_sub_stave) / DATA_LINKS_PER_FULL_MODULE;
        Ok((sub_stave_id, module_id))
    }

    /// Expand the stave counts of a (possibly partial) simulated detector into the set of
    /// chips that actually exist in that simulation.
    ///
    /// Simulations always fill staves from stave 0 upwards, so a layer with `n` staves
    /// contains the first `n * chips_per_stave` chips of that layer.
    pub fn simulated_chip_ids(
        &self,
        settings: &SimulationSettings,
    ) -> Result<SimulatedChips, GeometryError> {
        let mut layers = BTreeMap::new();
        for (layer, n_staves) in settings.staves_per_layer.iter().enumerate() {
            if *n_staves == 0 {
                continue;
            }
            if *n_staves > self.staves_per_layer[layer] {
                return Err(GeometryError::BadStave {
                    layer,
                    stave: *n_staves - 1,
                    max: self.staves_per_layer[layer],
                });
            }
            let first_chip = self.cumulative_chip_count[layer];
            let n_chips = n_staves * self.chips_per_stave[layer];
            let mut chips = BitSet::with_capacity(first_chip + n_chips);
            for chip in first_chip..(first_chip + n_chips) {
                chips.insert(chip);
            }
            layers.insert(layer, chips);
        }
        Ok(SimulatedChips { layers })
    }
}

/// The chips present in one simulation run, grouped by layer. Layers without any simulated
/// staves are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedChips {
    layers: BTreeMap<usize, BitSet>,
}

impl SimulatedChips {
    pub fn contains(&self, id: GlobalChipId) -> bool {
        self.layers
            .values()
            .any(|chips| chips.contains(id.0 as usize))
    }

    pub fn layers(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers.keys().copied()
    }

    pub fn has_layer(&self, layer: usize) -> bool {
        self.layers.contains_key(&layer)
    }

    /// Chip ids of one layer in ascending order. Empty if the layer was not simulated
    pub fn chips_in_layer(&self, layer: usize) -> Vec<GlobalChipId> {
        match self.layers.get(&layer) {
            Some(chips) => chips.iter().map(|c| GlobalChipId(c as u32)).collect(),
            None => Vec::new(),
        }
    }

    pub fn chip_count(&self) -> usize {
        self.layers.values().map(|chips| chips.len()).sum()
    }
}
