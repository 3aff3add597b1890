use std::io::Write;
use std::process::{ExitCode, ExitStatus};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use lapse::cli::Cli;
use lapse::command::{self, CommandSpec};
use lapse::config::Config;
use lapse::progress::format_duration;
use lapse::runner;
use lapse::state;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "lapse=warn",
        1 => "lapse=info",
        2 => "lapse=debug",
        _ => "lapse=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // The run epoch: every timestamp recorded this run is relative to it.
    let epoch = Instant::now();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = Config::load(&cwd)?;
    match &config_path {
        Some(p) => debug!("loaded config from {}", p.display()),
        None => debug!("no .lapse.toml found, using defaults"),
    }

    let state_dir = config
        .state_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("failed to create state directory: {}", state_dir.display()))?;
    let paths = state::session_paths(&state_dir, &cwd, &cli.command);

    let previous = state::load(&paths.state)?;
    let had_previous = previous.is_some();
    if had_previous {
        info!("comparing against {}", paths.state.display());
    } else {
        info!("no previous run recorded for this command here");
    }

    let log_file = std::fs::File::create(&paths.log)
        .with_context(|| format!("failed to create log file: {}", paths.log.display()))?;
    println!("Log: {}", paths.log.display());

    let shell = if config.use_shell && !cli.no_shell {
        std::env::var("SHELL").ok()
    } else {
        None
    };
    let spec = CommandSpec::resolve(&cli.command, shell.as_deref());

    let outcome = runner::run(&spec, previous, log_file, config.fingerprint, epoch)?;

    if !had_previous {
        println!("Duration: {}", format_duration(outcome.state.duration));
    }

    if config.bell {
        // Best effort; a closed stdout is not worth failing over.
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }

    state::store(&paths.state, &outcome.state)?;
    debug!("state written to {}", paths.state.display());

    if !outcome.status.success() {
        warn!("command exited with {}", outcome.status);
        println!("Log: {}", paths.log.display());
    }

    if had_previous && config.pager && !cli.no_pager {
        if let Some(pager) = std::env::var("PAGER").ok().filter(|p| !p.is_empty()) {
            command::launch_pager(&pager, &paths.log)?;
        }
    }

    Ok(exit_code_for(outcome.status))
}

/// Pass the wrapped command's exit code through as our own.
fn exit_code_for(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Killed by a signal; there is no code to forward.
        None => ExitCode::FAILURE,
    }
}
