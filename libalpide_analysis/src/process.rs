use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc::Sender;

use super::busy_file::BusyFile;
use super::cache::DecodedRun;
use super::config::{Config, SimulationSettings};
use super::correlator::{correlate, StrobeEventMatch};
use super::error::ProcessorError;
use super::geometry::ITS_GEOMETRY;
use super::loss_summary::{summarize_busy, BusySummary, LossSummary};
use super::ru_file::{
    read_busy_file, read_trigger_action_file, read_violation_file, ReadoutUnitId,
};
use super::strobe::{event_intervals, event_times, strobe_windows, STROBE_CTRL_LINK};
use super::trigger_actions::TriggerAction;
use super::violation_file::ViolationKind;
use super::worker_status::{Stage, WorkerStatus};

/// What the analysis found for one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_number: i32,
    pub simulated_chip_count: usize,
    pub trigger_count: u64,
    pub sent_trigger_count: usize,
    pub busy: BTreeMap<ReadoutUnitId, BusySummary>,
    pub losses: LossSummary,
}

/// Decode every busy and violation file the simulation settings say should exist, plus the
/// trigger actions of the configured readout unit.
fn decode_run(
    config: &Config,
    run_dir: &Path,
    settings: &SimulationSettings,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<DecodedRun, ProcessorError> {
    let readout_units = settings.readout_units();
    let total_files = readout_units.len() * (1 + ViolationKind::ALL.len()) + 1;
    let mut files_done = 0;
    let mut busy_files: Vec<(ReadoutUnitId, BusyFile)> = Vec::new();
    let mut violation_files = Vec::new();

    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        Stage::Decoding,
    ))?;
    for ru in readout_units.iter() {
        busy_files.push((*ru, read_busy_file(run_dir, ru)?));
        for kind in ViolationKind::ALL {
            violation_files.push(read_violation_file(run_dir, ru, kind, &ITS_GEOMETRY)?);
        }
        files_done += 1 + ViolationKind::ALL.len();
        tx.send(WorkerStatus::new(
            files_done as f32 / total_files as f32,
            run_number,
            *worker_id,
            Stage::Decoding,
        ))?;
    }
    let trigger_actions = read_trigger_action_file(run_dir, &config.trigger_action_unit())?;
    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        Stage::Decoding,
    ))?;
    log::info!(
        "Decoded {} busy and {} violation files with {} triggers",
        busy_files.len(),
        violation_files.len(),
        trigger_actions.trigger_count()
    );

    Ok(DecodedRun::new(
        readout_units,
        config.trigger_action_unit(),
        busy_files,
        violation_files,
        trigger_actions,
    )?)
}

/// The main loop of the analysis.
///
/// This takes in a config (and progress monitor) and decodes and summarizes the simulation
/// output of one run.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<RunSummary, ProcessorError> {
    let run_dir = config.get_run_directory(run_number)?;
    let settings = config.read_run_settings(run_number, &ITS_GEOMETRY)?;
    let simulated = ITS_GEOMETRY.simulated_chip_ids(&settings)?;
    log::info!(
        "Run {} simulated {} chips on layers {:?}",
        run_number,
        simulated.chip_count(),
        simulated.layers().collect::<Vec<_>>()
    );

    let cached = if config.use_cache {
        DecodedRun::read(
            &run_dir,
            &settings.readout_units(),
            config.trigger_action_unit(),
        )?
    } else {
        None
    };
    let decoded = match cached {
        Some(decoded) => decoded,
        None => {
            let decoded = decode_run(config, &run_dir, &settings, run_number, tx, worker_id)?;
            if config.write_cache {
                tx.send(WorkerStatus::new(
                    0.0,
                    run_number,
                    *worker_id,
                    Stage::Caching,
                ))?;
                decoded.write(&run_dir)?;
                tx.send(WorkerStatus::new(
                    1.0,
                    run_number,
                    *worker_id,
                    Stage::Caching,
                ))?;
            }
            decoded
        }
    };

    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        Stage::Summarizing,
    ))?;
    let mut losses = LossSummary::new();
    for file in decoded.violation_files.iter() {
        losses.add_file(file, &simulated);
    }
    let summary = RunSummary {
        run_number,
        simulated_chip_count: simulated.chip_count(),
        trigger_count: decoded.trigger_actions.trigger_count(),
        sent_trigger_count: decoded
            .trigger_actions
            .count(STROBE_CTRL_LINK, TriggerAction::Sent),
        busy: summarize_busy(decoded.busy_files.iter()),
        losses,
    };
    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        Stage::Summarizing,
    ))?;

    let total_busy_ns: u64 = summary.busy.values().map(|b| b.total_busy_ns).sum();
    log::info!(
        "Run {}: {} of {} triggers sent, {} ns total busy time",
        run_number,
        summary.sent_trigger_count,
        summary.trigger_count,
        total_busy_ns
    );
    for line in summary.losses.to_string().lines() {
        log::info!("Run {run_number} {line}");
    }
    Ok(summary)
}

/// Match the strobes of a run with its physics events.
///
/// The event time deltas come from the caller since the event data is not part of the binary
/// readout unit output.
pub fn correlate_run(
    config: &Config,
    run_number: i32,
    deltas_ns: &[u64],
) -> Result<Vec<StrobeEventMatch>, ProcessorError> {
    let run_dir = config.get_run_directory(run_number)?;
    let settings = config.read_run_settings(run_number, &ITS_GEOMETRY)?;
    let trigger_actions = read_trigger_action_file(&run_dir, &config.trigger_action_unit())?;

    let events = event_intervals(deltas_ns, &settings);
    let strobes = strobe_windows(&trigger_actions, &event_times(deltas_ns), &settings)?;
    let matches = correlate(&events, &strobes, config.ordering_check())?;
    log::info!(
        "Run {}: matched {} events to {} strobes",
        run_number,
        events.len(),
        matches.len()
    );
    Ok(matches)
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            log::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            log::info!("Finished processing run {}.", run);
        } else {
            log::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CACHE_FILE_NAME, SETTINGS_FILE_NAME};
    use crate::error::{ConfigError, CorrelatorError, RuFileError};
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::path::PathBuf;
    use std::sync::mpsc;

    /// One simulated inner barrel stave (layer 0, stave 0) with a single busy violation on
    /// chip 3 for trigger 1, and three triggers on one control link.
    fn write_run(sim_path: &Path, run_number: i32) -> PathBuf {
        let run_dir = sim_path.join(format!("run_{run_number}"));
        std::fs::create_dir_all(&run_dir).unwrap();

        let mut settings = SimulationSettings::default();
        settings.staves_per_layer[0] = 1;
        settings.strobe_active_length_ns = 5000;
        std::fs::write(
            run_dir.join(SETTINGS_FILE_NAME),
            serde_yaml::to_string(&settings).unwrap(),
        )
        .unwrap();

        let mut busy = vec![9u8];
        busy.write_u64::<LittleEndian>(1).unwrap();
        for field in [100u64, 300, 0, 1] {
            busy.write_u64::<LittleEndian>(field).unwrap();
        }
        for _ in 1..9 {
            busy.write_u64::<LittleEndian>(0).unwrap();
        }
        std::fs::write(run_dir.join("RU_0_0_busy.dat"), busy).unwrap();

        for kind in ViolationKind::ALL {
            let mut bytes = vec![9u8];
            for link in 0..9u8 {
                if kind == ViolationKind::BusyViolation && link == 3 {
                    bytes.push(1);
                    bytes.push(3);
                    bytes.write_u64::<LittleEndian>(1).unwrap();
                    bytes.write_u64::<LittleEndian>(1).unwrap();
                } else {
                    bytes.push(0);
                }
            }
            std::fs::write(
                run_dir.join(format!("RU_0_0_{}.dat", kind.file_suffix())),
                bytes,
            )
            .unwrap();
        }

        let mut actions = Vec::new();
        actions.write_u64::<LittleEndian>(3).unwrap();
        actions.push(1);
        actions.extend_from_slice(&[0, 1, 0]);
        std::fs::write(run_dir.join("RU_0_0_trigger_actions.dat"), actions).unwrap();
        run_dir
    }

    fn config(sim_path: &Path) -> Config {
        Config {
            sim_path: sim_path.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_run() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = write_run(dir.path(), 0);
        let config = config(dir.path());
        let (tx, rx) = mpsc::channel();

        let summary = process_run(&config, 0, &tx, &0).unwrap();
        assert_eq!(summary.simulated_chip_count, 9);
        assert_eq!(summary.trigger_count, 3);
        assert_eq!(summary.sent_trigger_count, 2);
        assert_eq!(
            summary.busy.values().next(),
            Some(&BusySummary {
                interval_count: 1,
                total_busy_ns: 200
            })
        );
        let layer = summary.losses.layer(0).unwrap();
        assert_eq!(layer.chip_count(ViolationKind::BusyViolation, 1), 1);
        assert_eq!(layer.affected_triggers(), vec![1]);
        assert!(run_dir.join(CACHE_FILE_NAME).exists());

        drop(tx);
        let statuses: Vec<WorkerStatus> = rx.iter().collect();
        assert!(statuses.iter().any(|s| s.stage == Stage::Caching));
        assert_eq!(statuses.last().map(|s| s.progress), Some(1.0));
    }

    #[test]
    fn test_cache_replaces_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = write_run(dir.path(), 2);
        let config = config(dir.path());
        let (tx, _rx) = mpsc::channel();
        process_run(&config, 2, &tx, &0).unwrap();

        std::fs::remove_file(run_dir.join("RU_0_0_busyv.dat")).unwrap();
        let summary = process_run(&config, 2, &tx, &0).unwrap();
        let layer = summary.losses.layer(0).unwrap();
        assert_eq!(layer.chip_count(ViolationKind::BusyViolation, 1), 1);

        let no_cache = Config {
            use_cache: false,
            ..config
        };
        assert!(matches!(
            process_run(&no_cache, 2, &tx, &0),
            Err(ProcessorError::RuFileError(_))
        ));
    }

    #[test]
    fn test_cache_for_other_staves_is_not_used() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = write_run(dir.path(), 4);
        let config = config(dir.path());
        let (tx, _rx) = mpsc::channel();
        process_run(&config, 4, &tx, &0).unwrap();

        // A second stave appears in the settings but none of its files exist
        let settings_path = run_dir.join(SETTINGS_FILE_NAME);
        let mut settings: SimulationSettings =
            serde_yaml::from_str(&std::fs::read_to_string(&settings_path).unwrap()).unwrap();
        settings.staves_per_layer[0] = 2;
        std::fs::write(&settings_path, serde_yaml::to_string(&settings).unwrap()).unwrap();

        match process_run(&config, 4, &tx, &0) {
            Err(ProcessorError::RuFileError(RuFileError::MissingFile(path))) => {
                assert_eq!(path, run_dir.join("RU_0_1_busy.dat"))
            }
            other => panic!("expected a missing file error, got {other:?}"),
        }

        // Same for a cache holding trigger actions of another readout unit
        settings.staves_per_layer[0] = 1;
        std::fs::write(&settings_path, serde_yaml::to_string(&settings).unwrap()).unwrap();
        let other_unit = Config {
            trigger_action_stave: 1,
            ..config
        };
        match process_run(&other_unit, 4, &tx, &0) {
            Err(ProcessorError::RuFileError(RuFileError::MissingFile(path))) => {
                assert_eq!(path, run_dir.join("RU_0_1_trigger_actions.dat"))
            }
            other => panic!("expected a missing file error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (tx, _rx) = mpsc::channel();
        assert!(!config.does_run_exist(5));
        assert!(matches!(
            process_run(&config, 5, &tx, &0),
            Err(ProcessorError::ConfigError(ConfigError::BadFilePath(_)))
        ));
    }

    #[test]
    fn test_correlate_run() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), 1);
        let config = config(dir.path());

        // Events at 0, 10000 and 10050 ns with 5 us strobes
        let matches = correlate_run(&config, 1, &[10000, 50, 0]).unwrap();
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].matched_event_indices, vec![0]);
        assert_eq!(matches[1].matched_event_indices, vec![1, 2]);
        assert_eq!(matches[1].action, TriggerAction::NotSentBusy);
        assert_eq!(matches[2].pileup_count, 0);

        assert!(matches!(
            correlate_run(&config, 1, &[10]),
            Err(ProcessorError::CorrelatorError(
                CorrelatorError::MissingEventForTrigger(1)
            ))
        ));
    }

    #[test]
    fn test_create_subsets() {
        let config = Config {
            first_run_number: 3,
            last_run_number: 7,
            n_threads: 2,
            ..Default::default()
        };
        assert_eq!(create_subsets(&config), vec![vec![3, 5, 7], vec![4, 6]]);
    }
}
