// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Command line front end: `rngbattery [config.toml]`.

use std::process::ExitCode;

use chrono::Local;
use log::{info, LevelFilter, Metadata, Record};

use rngbattery::{
    config::BatteryConfig,
    error::{Error, Result},
    registry,
    rng_testing::{format_test_results_summary, test_suite, StatTest},
    selector::{instantiate, resolve, Selector},
    strings,
    utils::{format_byte_count, write_and_print, write_raw_words},
};

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "{} {:<5} {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn run(config: &BatteryConfig) -> Result<()> {
    let mut selector = Selector::new();
    let stream = match selector.select(&config.selection_request()) {
        Ok(stream) => stream,
        Err(err @ Error::Config(_)) => {
            eprintln!("{}\n{}", strings::SELECTION_FAILED, registry::list_generators());
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    if let Some((request, fold)) = config.etalon_request() {
        let etalon = instantiate(&resolve(&request)?)?;
        stream.attach_etalon(etalon, fold)?;
    }

    if let Some(path) = &config.output_file {
        write_raw_words(stream, path, config.output_count)?;
        info!(
            "wrote {} from {} to {}",
            format_byte_count(config.output_count * 4),
            stream.name(),
            path.display()
        );
        return Ok(());
    }

    let result_file = config.result_file.as_deref();
    let seeds: Vec<u64> = stream.selection().operands.iter().map(|o| o.seed).collect();
    write_and_print(
        &format!(
            "rngbattery {} | generator: {} | seeds: {:?}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            stream.name(),
            seeds
        ),
        result_file,
    )?;
    let bitstream = config.bitstream();
    let serial = config.serial()?;
    let battery: [&dyn StatTest; 2] = [&bitstream, &serial];
    let test_results = test_suite(&battery, stream, &config.run_settings())?;
    for rslt in &test_results {
        write_and_print(&rslt.format(), result_file)?;
    }
    write_and_print(&format_test_results_summary(&test_results), result_file)?;
    Ok(())
}

fn main() -> ExitCode {
    let start = std::time::Instant::now();
    let config = match std::env::args_os().nth(1) {
        Some(path) => match BatteryConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}: {}", path.to_string_lossy(), err);
                return ExitCode::FAILURE;
            }
        },
        None => BatteryConfig::default(),
    };
    let level = match config.validate().and_then(|()| config.level_filter()) {
        Ok(level) => level,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logging(level);

    if let Err(err) = run(&config) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }
    info!("Full program runtime: {:?}", start.elapsed());
    ExitCode::SUCCESS
}
