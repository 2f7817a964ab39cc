use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use guestpanel::{
    FileSink, LogLevel, Logger, PanelConfig, PanelRuntime, ProxmoxSampler, Result, RuntimeOptions,
    SimulatedSink, StderrSink, open_sink,
};

/// Cluster guest status panel for serial-attached smart screens.
#[derive(Parser, Debug)]
#[command(name = "guestpanel", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Display revision override (A, B, C, D or SIMU).
    #[arg(long)]
    revision: Option<String>,

    /// Display channel override, e.g. /dev/ttyACM0.
    #[arg(long)]
    channel: Option<PathBuf>,

    /// Cluster API base URL override.
    #[arg(long)]
    api_url: Option<String>,

    /// Refresh interval override, in seconds.
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Structured log file; stderr when unset.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Render a single frame to the simulated sink and exit.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log at debug level.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("guestpanel: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let logger = build_logger(&config, args.verbose)?;

    // Resolve the display variant before any hardware I/O so a bad
    // configuration fails without touching the channel.
    let revision = config.resolved_revision()?;
    logger.log(
        LogLevel::Info,
        "panel::main",
        &format!("selected display revision {revision:?}"),
    );

    let sink = if args.dry_run {
        Box::new(SimulatedSink::new()) as Box<dyn guestpanel::DisplaySink>
    } else {
        open_sink(&config)?
    };
    let sampler = ProxmoxSampler::new(config.api_url.clone(), config.api_token.clone());
    let options = RuntimeOptions::from_config(&config, Some(logger.clone()));
    let mut runtime = PanelRuntime::new(Box::new(sampler), sink, options);

    register_signals(&runtime)?;

    if args.dry_run {
        runtime.run_cycles(1)
    } else {
        runtime.run()
    }
}

fn resolve_config(args: &Args) -> Result<PanelConfig> {
    let mut config = match &args.config {
        Some(path) => PanelConfig::load(path)?,
        None => PanelConfig::default(),
    };
    if let Some(revision) = &args.revision {
        config.revision = revision.clone();
    }
    if let Some(channel) = &args.channel {
        config.channel = channel.clone();
    }
    if let Some(api_url) = &args.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(interval) = args.interval_secs {
        config.interval_secs = interval;
    }
    if let Some(log_file) = &args.log_file {
        config.log_file = Some(log_file.clone());
    }
    config.validate()?;
    Ok(config)
}

fn build_logger(config: &PanelConfig, verbose: bool) -> Result<Logger> {
    let logger = match &config.log_file {
        Some(path) => Logger::new(
            FileSink::new(path, 4 * 1024 * 1024)
                .map_err(|err| guestpanel::PanelError::Config(format!("log file: {err}")))?,
        ),
        None => Logger::new(StderrSink),
    };
    Ok(if verbose {
        logger.with_min_level(LogLevel::Debug)
    } else {
        logger
    })
}

/// Map interrupt, terminate and (on POSIX) quit onto the stop flag. The
/// handler context only flips the flag; shutdown work happens on the loop
/// thread.
fn register_signals(runtime: &PanelRuntime) -> Result<()> {
    let flag = runtime.stop_flag().handle();
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, flag.clone())?;
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGQUIT, flag)?;
    Ok(())
}
