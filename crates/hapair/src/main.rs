mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::io;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, GlobalOpts, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match init_tracing(&cli.global) {
        Ok(guard) => guard,
        Err(err) => exit_with(err, None),
    };

    if let Err(err) = run(cli).await {
        exit_with(err, guard);
    }
}

fn exit_with(err: CliError, guard: Option<WorkerGuard>) -> ! {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    // Flush the log file before exiting.
    drop(guard);
    std::process::exit(code);
}

/// Logs go to stderr, and additionally to `--log-file` when given.
fn init_tracing(global: &GlobalOpts) -> Result<Option<WorkerGuard>, CliError> {
    let level = if global.quiet {
        "error"
    } else {
        match global.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = matches!(global.log_format, LogFormat::Json);
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
    });
    let json_layer = json.then(|| fmt::layer().json().with_writer(io::stderr));

    let (file_layer, guard) = match global.log_file {
        Some(ref path) => {
            let file_name = path.file_name().ok_or_else(|| CliError::Validation {
                field: "log-file".into(),
                reason: format!("{} is not a file path", path.display()),
            })?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Validation {
            field: "logging".into(),
            reason: format!("cannot install log subscriber: {e}"),
        })?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;
    match cli.command {
        Command::Completions(args) => {
            clap_complete::generate(args.shell, &mut Cli::command(), "hapair", &mut io::stdout());
            Ok(())
        }

        // No device contact
        Command::Config(args) => commands::config_cmd::handle(&args.command, &global),
        Command::Plan => commands::plan::handle(&global),

        Command::Run(args) => commands::run::handle(args.from.into(), args.to.into(), &global).await,
        Command::Stage(args) => {
            let stage = args.stage.into();
            commands::run::handle(stage, stage, &global).await
        }
        Command::Discover => commands::discover::handle(&global).await,
    }
}
