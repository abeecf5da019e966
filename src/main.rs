use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use waypoint_rs::adk::model::{Model, OllamaModel};
use waypoint_rs::waypoint::booking::{self, Booking};
use waypoint_rs::waypoint::config::{Config, StoreKind};
use waypoint_rs::waypoint::interrupt::{Answers, Interrupt, RequirementType};
use waypoint_rs::waypoint::{
    FileStore, FlowError, InMemoryStore, Outcome, Pipe, ResumeConfig, RunContext, Store,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file. Without it the environment is used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store backend
    #[arg(long, global = true, value_parser = parse_store_kind)]
    store: Option<StoreKind>,

    /// Directory for the file store
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Ollama model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a booking run from a free-text prompt
    Book {
        /// Run id used to store and resume the run
        #[arg(long)]
        id: String,

        /// Stop at the first interrupt instead of asking on stdin
        #[arg(long)]
        no_input: bool,

        /// The prompt to send
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Continue a suspended run
    Resume {
        #[arg(long)]
        id: String,

        /// Answer as key=value, repeatable
        #[arg(long = "set", value_parser = parse_key_val)]
        values: Vec<(String, String)>,

        /// Stop at the next interrupt instead of asking on stdin
        #[arg(long)]
        no_input: bool,
    },
    /// Print the stored execution state
    Show {
        #[arg(long)]
        id: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_store_kind(s: &str) -> Result<StoreKind, String> {
    match s {
        "memory" => Ok(StoreKind::Memory),
        "file" => Ok(StoreKind::File),
        other => Err(format!("unknown store '{}', expected memory or file", other)),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .map_err(|e| anyhow!("failed to load config {}: {}", path.display(), e))?,
        None => Config::from_env(),
    };

    if let Some(kind) = args.store {
        config.store.kind = kind;
    }
    if let Some(dir) = &args.store_dir {
        config.store.dir = dir.clone();
    }
    if let Some(model) = &args.model {
        config.ollama.model = model.clone();
    }
    Ok(config)
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store<Booking>>> {
    match config.store.kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreKind::File => {
            let store = FileStore::open(&config.store.dir)
                .await
                .with_context(|| format!("opening store at {}", config.store.dir.display()))?;
            Ok(Arc::new(store))
        }
    }
}

fn print_new_messages(state: &Booking, printed: &mut usize) {
    for line in state.messages.iter().skip(*printed) {
        println!("{}", line);
    }
    *printed = state.messages.len().max(*printed);
}

/// Ask for every requirement of `interrupt` on stdin
async fn ask(interrupt: &Interrupt, lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Answers> {
    println!("{}", interrupt.message);
    if let Some(err) = &interrupt.validation_error {
        println!("Validation failed: {}", err);
    }

    let mut stdout = tokio::io::stdout();
    let mut answers = Answers::new();

    for (key, requirement) in interrupt.requirements.iter() {
        let hint = match requirement.kind {
            RequirementType::Custom => String::new(),
            RequirementType::Enum => format!(" (one of {})", requirement.suggestions.join(", ")),
            RequirementType::CustomWithSuggestions => {
                format!(" (e.g. {})", requirement.suggestions.join(", "))
            }
        };
        stdout
            .write_all(format!("Please input value for '{}'{}: ", key, hint).as_bytes())
            .await?;
        stdout.flush().await?;

        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("stdin closed while waiting for '{}'", key))?;
        answers.insert(key.clone(), line.trim().to_string());
    }
    Ok(answers)
}

/// Keep answering interrupts until the run completes, or stop at the first
/// one when `interactive` is off
async fn drive(
    pipe: &Pipe<Booking>,
    ctx: &RunContext,
    id: &str,
    mut outcome: Outcome<Booking>,
    interactive: bool,
) -> anyhow::Result<()> {
    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_new_messages(outcome.state(), &mut printed);

        let interrupt = match &outcome {
            Outcome::Completed(state) => {
                println!("{}", serde_json::to_string_pretty(state)?);
                return Ok(());
            }
            Outcome::Interrupted { interrupt, .. } => interrupt.clone(),
        };

        if !interactive {
            println!("Run '{}' is waiting for input: {}", id, interrupt.message);
            for key in interrupt.requirements.keys() {
                println!("  --set {}=<value>", key);
            }
            return Ok(());
        }

        let answers = ask(&interrupt, &mut lines).await?;
        outcome = match pipe.resume(ctx, id, ResumeConfig::new(answers)).await {
            Ok(next) => next,
            Err(FlowError::Requirement(err)) => {
                println!("Rejected: {}", err);
                outcome
            }
            Err(err) => return Err(err.into()),
        };
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!(
        "Using {:?} store and model {} at {}",
        config.store.kind,
        config.ollama.model,
        config.ollama.base_url
    );

    let model: Arc<dyn Model> = Arc::new(OllamaModel::new(
        config.ollama.base_url.as_str(),
        Duration::from_secs(config.ollama.timeout_secs),
    )?);
    let graph = booking::booking_graph(model, &config.ollama.model)?;
    let pipe = Pipe::new(booking::FLOW_NAME, graph, open_store(&config).await?);

    let ctx = RunContext::new();
    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    match args.command {
        Commands::Book {
            id,
            no_input,
            prompt,
        } => {
            let prompt = prompt.join(" ");
            println!("Prompt: {}", prompt);
            let outcome = pipe.invoke(&ctx, &id, Booking::new(prompt)).await?;
            drive(&pipe, &ctx, &id, outcome, !no_input).await?;
        }
        Commands::Resume {
            id,
            values,
            no_input,
        } => {
            if config.store.kind == StoreKind::Memory {
                log::warn!("Memory store has nothing to resume; use the file store");
            }
            let answers: Answers = values.into_iter().collect();
            let outcome = pipe.resume(&ctx, &id, ResumeConfig::new(answers)).await?;
            drive(&pipe, &ctx, &id, outcome, !no_input).await?;
        }
        Commands::Show { id } => match pipe.state(&id).await? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => println!("No run stored under '{}'", id),
        },
    }

    Ok(())
}
