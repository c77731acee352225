mod script;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use versioned_dict::VersionedDict;

use crate::script::Op;

#[derive(Parser)]
#[command(name = "versioned-dict-cli", about = "CLI tool for versioned dictionary operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version info
    Info,
    /// Archive two versions and rewind through them
    Demo,
    /// Run a JSON operation script
    Run {
        /// Path to a JSON array of operations
        script: PathBuf,
        /// JSON object used as the initial contents
        #[arg(short, long)]
        seed: Option<PathBuf>,
        /// Also print the archive stack
        #[arg(long)]
        history: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("versioned-dict-cli v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Demo => run_demo()?,
        Commands::Run {
            script,
            seed,
            history,
        } => run_script(&script, seed.as_deref(), history)?,
    }

    Ok(())
}

fn run_demo() -> anyhow::Result<()> {
    let mut dict = VersionedDict::from_entries([("a", json!(1))]);
    println!("Start: {}", render(&dict)?);

    let v1 = dict.archive();
    println!("Archived version {v1}: {}", render(&dict)?);

    dict.insert("b", json!(2));
    dict.insert("a", json!(99));
    let v2 = dict.archive();
    println!("Archived version {v2}: {}", render(&dict)?);
    if let Some(delta) = dict.delta(v2) {
        println!("Delta {v2}: {}", serde_json::to_string(delta)?);
    }

    dict.rewind(v1)?;
    println!("Rewound to {v1}: {}", render(&dict)?);
    dict.rewind(0)?;
    println!("Rewound to 0: {}", render(&dict)?);
    Ok(())
}

fn run_script(path: &Path, seed: Option<&Path>, history: bool) -> anyhow::Result<()> {
    let seed = seed.map(read_json).transpose()?;
    let mut dict = script::seed(seed)?;

    let ops: Vec<Op> = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("invalid script {}", path.display()))?;
    tracing::info!(ops = ops.len(), "running script");

    for (step, op) in ops.iter().enumerate() {
        let outcome = script::apply(&mut dict, op)
            .with_context(|| format!("step {step} ({op:?}) failed"))?;
        println!("[{step}] {outcome}");
    }

    println!("Version: {}", dict.version());
    println!("{}", serde_json::to_string_pretty(dict.as_map())?);
    if history {
        println!("{}", serde_json::to_string_pretty(dict.history())?);
    }
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parse {}", path.display()))
}

fn render(dict: &VersionedDict<Value>) -> anyhow::Result<String> {
    Ok(serde_json::to_string(dict.as_map())?)
}
