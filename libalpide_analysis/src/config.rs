use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{N_LAYERS, SETTINGS_FILE_NAME};
use super::correlator::OrderingCheck;
use super::error::ConfigError;
use super::geometry::GeometryConstants;
use super::ru_file::ReadoutUnitId;

/// An analysis job: where the simulation output lives, which runs to analyse, and how.
/// Stored as YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sim_path: PathBuf,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub trigger_action_layer: usize,
    pub trigger_action_stave: usize,
    pub use_cache: bool,
    pub write_cache: bool,
    pub validate_ordering: bool,
    pub n_threads: i32,
}

impl Default for Config {
    /// Template job; `sim_path` has to be filled in before use
    fn default() -> Self {
        Self {
            sim_path: PathBuf::from("None"),
            first_run_number: 0,
            last_run_number: 0,
            trigger_action_layer: 0,
            trigger_action_stave: 0,
            use_cache: true,
            write_cache: true,
            validate_ordering: true,
            n_threads: 1,
        }
    }
}

impl Config {
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }
        let job: Self = serde_yaml::from_str(&std::fs::read_to_string(config_path)?)?;
        Ok(job)
    }

    /// Write the default job to `path` as a starting point for a new analysis
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(&Self::default())?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    /// A run exists once the simulation has written its `settings.yml`
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.sim_path
            .join(self.get_run_str(run_number))
            .join(SETTINGS_FILE_NAME)
            .exists()
    }

    /// Get the Path to a run directory
    pub fn get_run_directory(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let run_dir: PathBuf = self.sim_path.join(self.get_run_str(run_number));
        if run_dir.exists() {
            Ok(run_dir)
        } else {
            Err(ConfigError::BadFilePath(run_dir))
        }
    }

    /// Load the simulation settings stored with a run
    pub fn read_run_settings(
        &self,
        run_number: i32,
        geometry: &GeometryConstants,
    ) -> Result<SimulationSettings, ConfigError> {
        let run_dir = self.get_run_directory(run_number)?;
        SimulationSettings::read_settings_file(&run_dir.join(SETTINGS_FILE_NAME), geometry)
    }

    /// Construct the run string using the simulation output format
    fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number}")
    }

    /// The readout unit whose trigger actions define the strobes of a run. All readout units
    /// see the same triggers in the simulation, so one is enough.
    pub fn trigger_action_unit(&self) -> ReadoutUnitId {
        ReadoutUnitId::new(self.trigger_action_layer, self.trigger_action_stave)
    }

    pub fn ordering_check(&self) -> OrderingCheck {
        if self.validate_ordering {
            OrderingCheck::Validate
        } else {
            OrderingCheck::Trust
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}

/// The parts of a simulation's settings the analysis depends on.
///
/// Stored as `settings.yml` in each run directory and checked against the detector geometry
/// once when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Number of simulated staves in each layer, counted from stave 0
    pub staves_per_layer: [usize; N_LAYERS],
    pub pixel_shaping_dead_time_ns: u64,
    pub pixel_shaping_active_time_ns: u64,
    pub strobe_active_length_ns: u64,
    pub strobe_inactive_length_ns: u64,
    pub trigger_delay_ns: u64,
    pub continuous_mode: bool,
    pub continuous_period_ns: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            staves_per_layer: [0; N_LAYERS],
            pixel_shaping_dead_time_ns: 200,
            pixel_shaping_active_time_ns: 6000,
            strobe_active_length_ns: 100,
            strobe_inactive_length_ns: 0,
            trigger_delay_ns: 0,
            continuous_mode: false,
            continuous_period_ns: 0,
        }
    }
}

impl SimulationSettings {
    pub fn read_settings_file(
        settings_path: &Path,
        geometry: &GeometryConstants,
    ) -> Result<Self, ConfigError> {
        if !settings_path.exists() {
            return Err(ConfigError::BadFilePath(settings_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(settings_path)?;
        let settings = serde_yaml::from_str::<Self>(&yaml_str)?;
        settings.validate(geometry)?;
        Ok(settings)
    }

    pub fn validate(&self, geometry: &GeometryConstants) -> Result<(), ConfigError> {
        for (layer, n_staves) in self.staves_per_layer.iter().enumerate() {
            if *n_staves > geometry.staves_per_layer[layer] {
                return Err(ConfigError::InvalidSettings(format!(
                    "layer {layer} has {n_staves} staves but the detector only has {}",
                    geometry.staves_per_layer[layer]
                )));
            }
        }
        if self.strobe_active_length_ns == 0 {
            return Err(ConfigError::InvalidSettings(String::from(
                "strobe active length must be greater than 0",
            )));
        }
        if self.continuous_mode && self.continuous_period_ns == 0 {
            return Err(ConfigError::InvalidSettings(String::from(
                "continuous mode needs a period greater than 0",
            )));
        }
        Ok(())
    }

    /// Every readout unit (layer, stave) present in the simulation
    pub fn readout_units(&self) -> Vec<ReadoutUnitId> {
        self.staves_per_layer
            .iter()
            .enumerate()
            .flat_map(|(layer, n_staves)| {
                (0..*n_staves).map(move |stave| ReadoutUnitId::new(layer, stave))
            })
            .collect()
    }
}
