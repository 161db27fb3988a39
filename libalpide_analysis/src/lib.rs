//! # alpide_analysis
//!
//! alpide_analysis reads the binary output of the ALPIDE dataflow simulation of the ALICE
//! ITS (Inner Tracking System) and turns it into per-chip loss records, busy summaries and
//! strobe/event pileup matches. The simulation writes one set of files per readout unit (one
//! readout unit serves one stave); this library decodes those files, repairs the chip ids
//! the simulated firmware truncated, and aggregates the records per layer.
//!
//! ## Installation
//!
//! The only method of install is from source. To build and install the CLI use
//! `cargo install --path ./alpide_analysis_cli` from the top level repository. To use the
//! CLI see the `alpide_analysis_cli` README.
//!
//! ## Configuration
//!
//! An analysis job is described by a YAML file. A template can be generated with
//! `alpide_analysis_cli -p <path> new`:
//!
//! ```yaml
//! sim_path: /path/to/simulation/output
//! first_run_number: 0
//! last_run_number: 10
//! trigger_action_layer: 0
//! trigger_action_stave: 0
//! use_cache: true
//! write_cache: true
//! validate_ordering: true
//! n_threads: 1
//! ```
//!
//! - `sim_path`: directory holding the `run_{n}` output directories of the simulation
//! - `trigger_action_layer`/`trigger_action_stave`: the readout unit whose trigger actions
//! are used for the strobe windows. All readout units see the same triggers.
//! - `use_cache`: load `decoded_records.yml` from the run directory instead of decoding the
//! binary files, if it exists, has the current format version and was written for the same
//! readout units and trigger action unit
//! - `write_cache`: write `decoded_records.yml` after decoding
//! - `validate_ordering`: reject event and strobe sequences which are not time ordered
//! - `n_threads`: number of worker threads; runs are divided evenly among them
//!
//! Each run directory must contain a `settings.yml` with the simulation parameters the
//! analysis depends on (simulated staves per layer, pixel shaping, strobe and trigger timing).
//!
//! ## File formats
//!
//! All files are little-endian and named `RU_{layer}_{stave}_{kind}.dat`:
//!
//! - `busy`: busy on/off intervals per data link
//! - `busyv`, `flush`, `ro_abort`, `fatal`: trigger ids per chip per data link
//! - `trigger_actions`: what happened to each trigger on each control link
//!
//! The exact layouts are documented on [`busy_file::BusyFile`],
//! [`violation_file::ViolationFile`] and [`trigger_actions::TriggerActionTable`]. A file is
//! decoded completely or not at all.
pub mod busy_file;
pub mod byte_reader;
pub mod cache;
pub mod chip_id_fix;
pub mod config;
pub mod constants;
pub mod correlator;
pub mod error;
pub mod geometry;
pub mod loss_summary;
pub mod process;
pub mod ru_file;
pub mod strobe;
pub mod trigger_actions;
pub mod violation_file;
pub mod worker_status;
