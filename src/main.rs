mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::retrieve::RetrieveArgs;

#[derive(Parser)]
#[command(name = "creatorflow")]
#[command(about = "Embedded vector store for creator content, ranked by performance", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, short, global = true, help = "Log progress to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database schema and empty index
    Init {
        #[arg(long, help = "Also write a default creatorflow.json")]
        config: bool,
    },
    /// Index a batch file (JSON or YAML) or a directory of them
    Index {
        path: PathBuf,
        #[arg(long, help = "Owner for every item (overrides owner_id in files)")]
        owner: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Retrieve the best performing similar content of an owner
    Retrieve(RetrieveArgs),
    /// Amend the metadata of an indexed item
    Update {
        id: i64,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        niche: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long, help = "Replacement tags as a JSON object")]
        tags: Option<String>,
        #[arg(long, help = "New performance score in [0, 1]")]
        score: Option<f64>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show store sizes and per-owner counts
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Check that the vector index and metadata agree
    Verify {
        #[arg(long, help = "JSON output")]
        json: bool,
        #[arg(long, help = "Exit 1 on violations")]
        strict: bool,
    },
    /// Copy the index file and database into a directory
    Snapshot { dir: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { config } => commands::init::run(config),
        Commands::Index { path, owner, json } => {
            commands::index::run(&path, owner.as_deref(), json)
        }
        Commands::Retrieve(args) => commands::retrieve::run(&args),
        Commands::Update {
            id,
            platform,
            niche,
            content_type,
            tags,
            score,
            json,
        } => commands::update::run(id, platform, niche, content_type, tags, score, json),
        Commands::Status { json } => commands::status::run(json),
        Commands::Verify { json, strict } => commands::verify::run(json, strict),
        Commands::Snapshot { dir } => commands::snapshot::run(&dir),
    }
}
