use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::path::PathBuf;
use std::sync::mpsc;

use libalpide_analysis::config::Config;
use libalpide_analysis::process::{create_subsets, process_subset};
use libalpide_analysis::worker_status::WorkerStatus;

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    bar.set_message(format!(
        "run {} {}",
        status.run_number,
        status.stage.label()
    ));
    bar.set_position((status.progress * 100.0) as u64);
}

fn main() {
    // Create a cli
    let matches = Command::new("alpide_analysis_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        match Config::write_template(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("Number of threads must be at least 1, got {}", config.n_threads);
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Simulation Path: {}", config.sim_path.to_string_lossy());
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!(
        "Trigger actions from: {}",
        config.trigger_action_unit()
    );
    log::info!("Use cache: {} Write cache: {}", config.use_cache, config.write_cache);
    log::info!("Number of workers: {}", config.n_threads);

    // Spawn one worker per subset, each with its own progress bar
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let style = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% worker {prefix} {msg}")
        .expect("Progress bar template is invalid!");
    let mut bars = Vec::new();
    let mut workers = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        if subset.is_empty() {
            continue;
        }
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(format!("{idx}"));
        bars.push(bar);

        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    // Only the workers hold senders now, so the receiver closes once they all finish
    drop(tx);

    for status in rx.iter() {
        if let Some(bar) = bars.get(status.worker_id) {
            update_bar(bar, &status);
        }
    }

    let mut failed = false;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                log::error!("Analysis failed with error: {e}");
                failed = true;
            }
            Err(_) => {
                log::error!("An error occured joining one of the workers!");
                failed = true;
            }
        }
    }

    for bar in bars {
        bar.finish();
    }

    if !failed {
        log::info!("Successfully analyzed simulation output!");
    }
    log::info!("Done.");
}
