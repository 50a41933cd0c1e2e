use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use linhash_common::StorageConfig;
use linhash_common::bits::bits_string;
use linhash_storage::{ChoiceVector, OpenMode, Projection, Relation};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "linhash", about = "Linear-hashed relations with partial-match queries")]
struct Cli {
    /// Directory holding relation files (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty relation.
    Create {
        /// Relation name
        name: String,
        /// Number of attributes per tuple
        attributes: usize,
        /// Initial number of buckets, rounded up to a power of two
        pages: u32,
        /// Choice vector descriptor `att,bit:att,bit:...` (32 items)
        #[arg(long)]
        choice: Option<String>,
    },

    /// Insert tuples read from stdin, one per line.
    Insert {
        /// Relation name
        name: String,
    },

    /// Print tuples matching a pattern such as `?,alice,%ney`.
    Select {
        /// Relation name
        name: String,
        /// Query pattern, one field per attribute
        pattern: String,
        /// Attributes to print: `*` or 1-based list such as `3,1`
        #[arg(long, default_value = "*")]
        project: String,
        /// Print the hash masks and candidate buckets to stderr
        #[arg(long)]
        explain: bool,
    },

    /// Print relation statistics.
    Stats {
        /// Relation name
        name: String,
    },

    /// Delete a relation and all of its files.
    Drop {
        /// Relation name
        name: String,
    },

    /// Report whether a relation exists (exit status 1 if not).
    Exists {
        /// Relation name
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let config = load_config(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Create {
            name,
            attributes,
            pages,
            choice,
        } => cmd_create(&config, &name, attributes, pages, choice),
        Commands::Insert { name } => cmd_insert(&config, &name),
        Commands::Select {
            name,
            pattern,
            project,
            explain,
        } => cmd_select(&config, &name, &pattern, &project, explain),
        Commands::Stats { name } => cmd_stats(&config, &name),
        Commands::Drop { name } => {
            Relation::delete(&config, &name)?;
            Ok(())
        }
        Commands::Exists { name } => {
            if Relation::exists(&config, &name) {
                println!("{} exists", name);
                Ok(())
            } else {
                println!("{} does not exist", name);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<StorageConfig> {
    let mut config = match path {
        Some(path) => StorageConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StorageConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

fn cmd_create(
    config: &StorageConfig,
    name: &str,
    attributes: usize,
    pages: u32,
    choice: Option<String>,
) -> anyhow::Result<()> {
    let Some(pages) = pages.max(1).checked_next_power_of_two() else {
        bail!("page count {} is too large", pages);
    };
    let depth = pages.trailing_zeros();
    let descriptor = match choice {
        Some(descriptor) => descriptor,
        None => ChoiceVector::round_robin(attributes).to_string(),
    };

    let relation = Relation::create(config, name, attributes, pages, depth, &descriptor)?;
    relation.close()?;
    Ok(())
}

fn cmd_insert(config: &StorageConfig, name: &str) -> anyhow::Result<()> {
    let mut relation = Relation::open(config, name, OpenMode::Write)?;
    let inserted = match relation.insert_from_reader(io::stdin().lock()) {
        Err(e) if e.is_fatal() => return Err(e.into()),
        result => {
            // Keep what was inserted before a bad line.
            relation.close()?;
            result?
        }
    };
    tracing::info!(relation = name, inserted, "insert finished");
    Ok(())
}

fn cmd_select(
    config: &StorageConfig,
    name: &str,
    pattern: &str,
    project: &str,
    explain: bool,
) -> anyhow::Result<()> {
    let relation = Relation::open(config, name, OpenMode::Read)?;
    let projection = Projection::parse(project, relation.attribute_count())?;
    let selection = relation.select(pattern)?;

    if explain {
        eprintln!("pattern:    {}", selection.pattern());
        eprintln!("known:      {}", bits_string(selection.known_mask()));
        eprintln!("unknown:    {}", bits_string(selection.unknown_mask()));
        eprintln!("candidates: {:?}", selection.candidates());
    }

    let mut out = io::stdout().lock();
    let mut matched = 0u64;
    for tuple in selection {
        writeln!(out, "{}", projection.project(&tuple?))?;
        matched += 1;
    }
    out.flush()?;
    tracing::debug!(relation = name, matched, "select finished");
    Ok(())
}

fn cmd_stats(config: &StorageConfig, name: &str) -> anyhow::Result<()> {
    let relation = Relation::open(config, name, OpenMode::Read)?;
    print!("{}", relation.stats()?);
    Ok(())
}
