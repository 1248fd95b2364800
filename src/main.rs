use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::error::RecvError;

use jute_sync::buffer::BufferId;
use jute_sync::eval::{self, InputFormat, Rendered};
use jute_sync::watcher::{self, FileBinding};
use jute_sync::{logging, samples, Config, OrderingPolicy, Outcome, SyncController, SyncStatus};

#[derive(Parser)]
#[command(name = "jute-sync")]
#[command(about = "Sync jute definitions and documents with a jute server, or preview path expressions locally", version)]
#[command(after_help = "Examples:
   jute-sync init
   jute-sync watch --endpoint http://localhost:3000/
   jute-sync sync -d definition.yaml -s document.yaml
   jute-sync eval --path '$ name.given.first()' document.yaml")]
struct Cli {
    /// Config file (defaults to ./jute-sync.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to a daily-rolling file in DIR instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the definition and document files and sync on every save
    Watch {
        #[command(flatten)]
        files: FileArgs,

        /// Write each applied result here instead of printing it
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Sync once and print the result
    Sync {
        #[command(flatten)]
        files: FileArgs,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Evaluate a path expression against a YAML or JSON document
    Eval {
        #[arg(short, long, value_enum, default_value_t = InputFormat::Yaml)]
        format: InputFormat,

        /// Path expression, e.g. '$ name.family.first()'
        #[arg(short, long)]
        path: String,

        /// Input file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Write sample definition and document files
    Init {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct FileArgs {
    /// Transformation definition file
    #[arg(short, long, default_value = "definition.yaml")]
    definition: PathBuf,

    /// Source document file
    #[arg(short = 's', long, default_value = "document.yaml")]
    document: PathBuf,
}

#[derive(Args)]
struct ServerArgs {
    /// Endpoint receiving sync requests
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Quiet window before a burst of edits is synced
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    #[arg(long, value_enum)]
    ordering: Option<OrderingPolicy>,
}

impl ServerArgs {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            config.set_endpoint(endpoint)?;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if let Some(ordering) = self.ordering {
            config.ordering = ordering;
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_dir.as_deref());

    match cli.command {
        Commands::Watch {
            files,
            output,
            server,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            server.apply(&mut config)?;
            watch(config, files, output).await?;
        }

        Commands::Sync { files, server } => {
            let mut config = Config::load(cli.config.as_deref())?;
            server.apply(&mut config)?;
            sync_once(config, files).await?;
        }

        Commands::Eval {
            format,
            path,
            input,
        } => {
            let text = read_input(input.as_deref()).await?;
            match eval::evaluate(format, &text, &path) {
                Rendered::Output(yaml) => print!("{}", yaml),
                Rendered::Error(message) => {
                    eprintln!("{}", message.red());
                    std::process::exit(1);
                }
            }
        }

        Commands::Init { dir } => {
            for (name, contents) in [
                ("definition.yaml", samples::DEFINITION),
                ("document.yaml", samples::DOCUMENT),
            ] {
                let path = dir.join(name);
                if tokio::fs::try_exists(&path).await? {
                    println!("{} {} exists, leaving it alone", "•".bright_black(), path.display());
                } else {
                    watcher::load_or_seed(&path, contents).await?;
                    println!("{} Created {}", "✓".green(), path.display().to_string().bright_white());
                }
            }
            println!("\n{}", "Next steps:".yellow());
            println!("  {} - sync on every save", "jute-sync watch".bright_white());
        }
    }

    Ok(())
}

async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}

async fn sync_once(config: Config, files: FileArgs) -> Result<()> {
    let definition = tokio::fs::read_to_string(&files.definition).await?;
    let document = tokio::fs::read_to_string(&files.document).await?;
    let controller = SyncController::with_http(&config, definition, document)?;

    match controller.sync().await {
        Outcome::Applied => print!("{}", controller.result().get_value()),
        Outcome::Failed(failure) => {
            eprint!("{}", failure.display().red());
            std::process::exit(1);
        }
        // A single request has nothing newer to lose against
        Outcome::Discarded => {}
    }

    Ok(())
}

async fn watch(config: Config, files: FileArgs, output: Option<PathBuf>) -> Result<()> {
    println!("{}", "👁  Starting jute sync...".cyan().bold());

    let definition = watcher::load_or_seed(&files.definition, samples::DEFINITION).await?;
    let document = watcher::load_or_seed(&files.document, samples::DOCUMENT).await?;

    println!("{} Endpoint: {}", "→".bright_blue(), config.endpoint.as_str().bright_yellow());
    println!("{} Debounce: {}ms", "→".bright_blue(), config.debounce_ms);
    println!(
        "{} Definition: {}  Document: {}\n",
        "→".bright_blue(),
        files.definition.display(),
        files.document.display()
    );

    let controller = SyncController::with_http(&config, definition, document)?;
    let mut results = controller.result().subscribe();
    let mut status = controller.subscribe_status();

    let listener = controller.start()?;
    let mut file_watch = tokio::spawn(watcher::watch_files(
        controller.clone(),
        vec![
            FileBinding::new(&files.definition, BufferId::Definition),
            FileBinding::new(&files.document, BufferId::Document),
        ],
    ));

    loop {
        tokio::select! {
            change = results.recv() => match change {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    emit_result(&controller.result().get_value(), output.as_deref()).await?;
                }
                Err(RecvError::Closed) => break,
            },
            event = status.recv() => match event {
                Ok(SyncStatus::Failed { failure, .. }) => {
                    eprint!("{}", failure.display().red());
                }
                Ok(SyncStatus::Sent { seq }) => {
                    println!("{} sync #{}", "↔".bright_blue(), seq);
                }
                Ok(SyncStatus::Discarded { seq, newest }) => {
                    println!("{} dropped reply #{} (already showing #{})", "•".bright_black(), seq, newest);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            joined = &mut file_watch => {
                let error = watcher::watch_ended(joined);
                eprintln!("{}", format!("{:#}", error).red());
                listener.abort();
                return Err(error);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Stopping".yellow());
                break;
            }
        }
    }

    listener.abort();
    file_watch.abort();
    Ok(())
}

async fn emit_result(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, text).await?;
            println!("{} Updated {}", "✓".green(), path.display().to_string().bright_white());
        }
        None => {
            println!("{}", "─".repeat(80).bright_black());
            println!("{}", text);
        }
    }
    Ok(())
}
