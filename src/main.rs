//! tailrun - run commands and tail logs, streaming lines live.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tailrun::config::{AppConfig, ConfigLoader};
use tailrun::execution::{
    CommandDefinition, Execution, ExecutionStatus, ProcessSpawner, TokioSpawner,
};
use tailrun::resource::{LogContent, TailBackend};
use tailrun::server::{ApiServer, AppState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Native,
    Process,
}

impl From<BackendArg> for TailBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => TailBackend::Native,
            BackendArg::Process => TailBackend::Process,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "tailrun",
    about = "Run commands and tail log files, streaming their lines live",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./tailrun.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API.
    Serve {
        /// Address to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a command locally and stream its output.
    Run {
        /// Program to run.
        command: String,
        /// Arguments for the program.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Follow a file and print appended lines.
    Tail {
        path: PathBuf,
        /// Print the current content first.
        #[arg(long)]
        from_beginning: bool,
        /// How appended content is picked up.
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

async fn serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<(), String> {
    let mut settings = config.server.clone();
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    tracing::info!(
        commands = config.commands.len(),
        logs = config.allowed_logs.len(),
        "Starting tailrun server"
    );
    let server = ApiServer::new(AppState::from_config(&config)).with_settings(settings);
    let cancel = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    server.run().await.map_err(|e| e.to_string())
}

async fn run(config: &AppConfig, command: String, args: Vec<String>) -> Result<ExitCode, String> {
    let definition = CommandDefinition::new(command.as_str(), command.as_str()).args(args);
    let process = TokioSpawner
        .spawn(&definition.command, &definition.args, None)
        .map_err(|e| e.to_string())?;

    let execution = Execution::running(definition.id.as_str(), 0, config.tail.eol.as_str());
    execution
        .add_output_listener(|lines| {
            for line in lines {
                println!("{line}");
            }
        })
        .map_err(|e| e.to_string())?;
    execution.attach(process).map_err(|e| e.to_string())?;

    let status = tokio::select! {
        status = execution.wait_terminal() => status,
        _ = tokio::signal::ctrl_c() => {
            if let Err(e) = execution.terminate() {
                tracing::debug!(error = %e, "Interrupt after exit");
            }
            execution.wait_terminal().await
        }
    };
    if let Err(e) = execution.finalize() {
        tracing::debug!(error = %e, "Finalize failed");
    }

    match status {
        ExecutionStatus::Succeeded => {
            eprintln!("{} {}", "✓".green(), definition.display_line().bold());
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            eprintln!("{} {} ({status})", "✗".red(), definition.display_line().bold());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn tail(
    config: &AppConfig,
    path: PathBuf,
    from_beginning: bool,
    backend: Option<BackendArg>,
) -> Result<(), String> {
    let mut options = config.tail.options();
    if let Some(backend) = backend {
        options.backend = backend.into();
    }

    let resource = LogContent::open(&path, &options).map_err(|e| e.to_string())?;
    let print = |lines: &[String]| {
        for line in lines {
            println!("{line}");
        }
    };
    let registered = if from_beginning {
        resource.add_change_listener_from_beginning(print).await
    } else {
        resource.add_change_listener(print)
    };
    registered.map_err(|e| e.to_string())?;

    tokio::signal::ctrl_c().await.map_err(|e| e.to_string())?;
    resource.close();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await.map(|()| ExitCode::SUCCESS),
        Commands::Run { command, args } => run(&config, command, args).await,
        Commands::Tail {
            path,
            from_beginning,
            backend,
        } => tail(&config, path, from_beginning, backend)
            .await
            .map(|()| ExitCode::SUCCESS),
    };

    result.unwrap_or_else(|e| {
        eprintln!("{} {e}", "error:".red().bold());
        ExitCode::FAILURE
    })
}
