/*!
Exploratory probe for the undocumented aes engine.

Maps the engine's register window through `/dev/mem`, replays the register
sequence of the vendor firmware for a single operation and dumps everything
it sees along the way. Needs root to map physical memory and to read the
page frame numbers of its own buffers. `--dry-run` replays the sequence
against ordinary memory instead.
*/

mod buffers;
mod config;
mod dry_run;
mod probe;
mod regs;

use config::{ConfigOverrides, ProbeConfig};

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{
    crate_authors, crate_description, crate_version, value_parser, Arg, ArgAction, ArgMatches,
    Command,
};
use log::{error, info, warn, Level};

use memprobe::prelude::v1::*;

fn main() -> ExitCode {
    let matches = parse_args();
    init_logger(&matches);

    // all mappings and handles are released inside `run`
    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("probe failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = extract_config(matches)?;

    let stdout = io::stdout();
    let report = probe::execute(&config, stdout.lock())?;

    info!(
        "engine finished with status {}, key type {}, in_buf @ {}, out_buf @ {}",
        RegisterBits(report.status),
        RegisterBits(report.key_type),
        report.input_phys,
        report.output_phys
    );
    for (addr, before, after) in probe::changes(&report.prepared, &report.armed) {
        info!("setup changed {:x}: {:08x} -> {:08x}", addr, before, after);
    }
    for (addr, before, after) in probe::changes(&report.armed, &report.finished) {
        info!("engine changed {:x}: {:08x} -> {:08x}", addr, before, after);
    }
    if report.output.iter().all(|b| *b == 0) {
        warn!("output buffer was not written");
    }
    Ok(())
}

fn parse_args() -> ArgMatches {
    command().get_matches()
}

fn command() -> Command {
    Command::new("aes-probe")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("base")
                .long("base")
                .short('b')
                .value_parser(parse_umem)
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("window-size")
                .long("window-size")
                .short('s')
                .value_parser(parse_umem)
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("device")
                .long("device")
                .short('d')
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-poll-iterations")
                .long("max-poll-iterations")
                .value_parser(value_parser!(u64))
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("poll-timeout-ms")
                .long("poll-timeout-ms")
                .value_parser(value_parser!(u64))
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("poll-interval-us")
                .long("poll-interval-us")
                .value_parser(value_parser!(u64))
                .action(ArgAction::Set)
                .required(false),
        )
}

fn init_logger(matches: &ArgMatches) {
    let log_level = match matches.get_count("verbose") {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        4 => Level::Trace,
        _ => Level::Trace,
    };
    if let Err(err) = simplelog::TermLogger::init(
        log_level.to_level_filter(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("unable to initialize logging: {}", err);
    }
}

fn extract_config(matches: &ArgMatches) -> Result<ProbeConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ProbeConfig::open(path)?,
        None => ProbeConfig::default(),
    };

    let window_size = match matches.get_one::<umem>("window-size") {
        Some(size) => Some(usize::try_from(*size).map_err(|_| {
            Error(ErrorOrigin::Config, ErrorKind::Configuration)
                .log_error(format!("window size {:#x} is too large", size))
        })?),
        None => None,
    };

    config.with_overrides(ConfigOverrides {
        device: matches.get_one::<PathBuf>("device").cloned(),
        base: matches.get_one::<umem>("base").copied().map(Address::from),
        window_size,
        dry_run: matches.get_flag("dry-run"),
        max_poll_iterations: matches.get_one::<u64>("max-poll-iterations").copied(),
        poll_timeout_ms: matches.get_one::<u64>("poll-timeout-ms").copied(),
        poll_interval_us: matches.get_one::<u64>("poll-interval-us").copied(),
    })
}

/// Parses decimal or `0x` prefixed hexadecimal numbers.
fn parse_umem(value: &str) -> std::result::Result<umem, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => umem::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse::<umem>(),
    };
    parsed.map_err(|err| format!("invalid number {:?}: {}", value, err))
}
