//! Terminal text adventure with NPCs voiced by a local `llama-cli` worker.
//!
//! ```bash
//! cargo run -p tavern -- --model ~/models/tinyllama.gguf
//! ```
//!
//! Worker settings come from `TAVERN_*` environment variables (a `.env`
//! file is honored) and can be overridden with flags; see `--help`.

mod repl;

use llama::WorkerConfig;
use std::path::PathBuf;
use tavern_core::{DialogueEngine, GameSession, GameWorld};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "tavern=info,tavern_core=warn,llama=warn";

/// Options taken from the command line.
#[derive(Debug, Default, PartialEq)]
struct Options {
    help: bool,
    program: Option<PathBuf>,
    model: Option<PathBuf>,
    load: Option<PathBuf>,
    save_dir: Option<PathBuf>,
}

impl Options {
    fn apply(&self, mut config: WorkerConfig) -> WorkerConfig {
        if let Some(program) = &self.program {
            config = config.with_program(program);
        }
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_options(&args)?;
    if options.help {
        print_help();
        return Ok(());
    }

    let config = options.apply(WorkerConfig::from_env()?);
    tracing::info!(
        program = %config.program.display(),
        model = %config.model.display(),
        "dialogue worker configured"
    );
    let engine = DialogueEngine::from_config(config);

    let session = match &options.load {
        Some(path) => GameSession::load(path, engine).await?,
        None => GameSession::new(GameWorld::village(), engine),
    };
    let session = match options.save_dir {
        Some(dir) => session.with_save_dir(dir),
        None => session,
    };

    repl::run(session).await?;
    Ok(())
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("{flag} needs a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => options.help = true,
            "--llama-cli" => options.program = Some(value("--llama-cli")?),
            "--model" => options.model = Some(value("--model")?),
            "--load" => options.load = Some(value("--load")?),
            "--save-dir" => options.save_dir = Some(value("--save-dir")?),
            other => anyhow::bail!("unknown argument: {other} (try --help)"),
        }
    }

    Ok(options)
}

fn print_help() {
    println!("Tavern - a text adventure with llama-voiced NPCs");
    println!();
    println!("USAGE:");
    println!("  tavern [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help            Show this help message");
    println!("  --llama-cli <PATH>    Worker executable (default: llama-cli)");
    println!("  --model <PATH>        Model file (default: models/model.gguf)");
    println!("  --load <PATH>         Start from a save file");
    println!("  --save-dir <DIR>      Directory for save files (default: .)");
    println!();
    println!("ENVIRONMENT:");
    println!("  TAVERN_LLAMA_CLI, TAVERN_MODEL, TAVERN_PROMPT_CACHE,");
    println!("  TAVERN_TEMPERATURE, TAVERN_CTX_SIZE, TAVERN_THREADS,");
    println!("  TAVERN_MAX_TOKENS, TAVERN_TURN_TIMEOUT_SECS (0 disables)");
    println!("  RUST_LOG              Log filter (default: {DEFAULT_LOG_FILTER})");
}
