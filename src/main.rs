use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use navix::{
    ChangeKind, ItemStore, NullSymbolProvider, SearchConfig, SearchEngine, SqliteStore,
    StorageKind, WalkEnumerator,
};
use notify::{EventKind, RecursiveMode, Watcher};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "navix")]
#[command(about = "Fast file and symbol name search for developer workspaces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (overrides the config file)
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index for a workspace (no-op if already built)
    Index {
        /// Workspace root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Discard any existing index and rebuild from scratch
        #[arg(short, long)]
        force: bool,
    },
    /// Search the index
    Search {
        /// The query
        query: String,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Watch the workspace and keep the index current
    Watch {
        /// Workspace root
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show index statistics
    Stats {
        /// Workspace root
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Drop every indexed item
    Clear {
        /// Workspace root
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace = match &cli.command {
        Commands::Index { path, .. }
        | Commands::Search { path, .. }
        | Commands::Watch { path }
        | Commands::Stats { path }
        | Commands::Clear { path } => path.clone(),
    };
    let debug = cli.debug || SearchConfig::load(&workspace).debug;

    let default_level = if debug { "navix=debug" } else { "navix=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Index { path, force } => cmd_index(&path, force),
        Commands::Search { query, path, limit } => cmd_search(&path, &query, limit),
        Commands::Watch { path } => cmd_watch(&path),
        Commands::Stats { path } => cmd_stats(&path),
        Commands::Clear { path } => cmd_clear(&path),
    }
}

fn open_engine(root: &Path) -> Result<(SearchEngine, PathBuf)> {
    let root = root.canonicalize().context("invalid workspace path")?;
    let config = SearchConfig::load(&root);
    let engine = SearchEngine::open(&root, config).context("failed to open index")?;
    Ok((engine, root))
}

fn print_progress(done: usize, total: usize) {
    print!("\rIndexing... {}/{}", done, total);
    let _ = std::io::stdout().flush();
}

fn initialize(engine: &SearchEngine, root: &Path) -> Result<usize> {
    let enumerator = WalkEnumerator::new(root.to_path_buf());
    let indexed = engine.initialize(&enumerator, &NullSymbolProvider, Some(&print_progress))?;
    if indexed > 0 {
        println!("\rIndexed {} items.           ", indexed);
    }
    Ok(indexed)
}

fn cmd_index(path: &Path, force: bool) -> Result<()> {
    let (engine, root) = open_engine(path)?;
    println!("Workspace: {}", root.display());

    let indexed = if force {
        let enumerator = WalkEnumerator::new(root.clone());
        engine.refresh(&enumerator, &NullSymbolProvider)?
    } else {
        initialize(&engine, &root)?
    };

    if indexed == 0 && !force {
        println!("Index is already built (use --force to rebuild).");
    } else if force {
        println!("Rebuilt index with {} items.", indexed);
    }
    engine.shutdown()?;
    Ok(())
}

fn cmd_search(path: &Path, query: &str, limit: usize) -> Result<()> {
    let (engine, root) = open_engine(path)?;
    initialize(&engine, &root)?;

    let hits = engine.search(query, limit)?;
    if hits.is_empty() {
        println!("No matches.");
    }
    for hit in hits {
        match &hit.container {
            Some(container) => {
                println!("{:5}  {}  ({}.{})", hit.score, hit.path, container, hit.name)
            }
            None => println!("{:5}  {}", hit.score, hit.path),
        }
    }
    engine.shutdown()?;
    Ok(())
}

fn cmd_watch(path: &Path) -> Result<()> {
    let (engine, root) = open_engine(path)?;
    initialize(&engine, &root)?;
    let excludes = SearchConfig::load(&root).exclusion_globs();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("failed to create watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .context("failed to watch workspace")?;

    println!("Watching {} (Ctrl+C to stop)", root.display());
    for event in rx {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                eprintln!("watch error: {}", e);
                continue;
            }
        };
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => continue,
        };
        for path in event.paths {
            let Ok(rel) = path.strip_prefix(&root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if rel.is_empty() || excludes.is_match(&rel) {
                continue;
            }
            engine.notify_change(rel, kind);
        }
    }
    engine.shutdown()?;
    Ok(())
}

fn cmd_stats(path: &Path) -> Result<()> {
    let (engine, root) = open_engine(path)?;
    initialize(&engine, &root)?;
    let stats = engine.stats()?;

    println!("Index Statistics");
    println!("================");
    println!();
    println!("Workspace:        {}", root.display());
    println!("Items:            {}", stats.items);
    println!("Distinct trigrams: {}", stats.trigrams);
    println!("Distinct tokens:  {}", stats.tokens);
    if stats.updated_at > 0 {
        let updated = std::time::UNIX_EPOCH + std::time::Duration::from_secs(stats.updated_at);
        println!("Last updated:     {:?}", updated);
    }
    engine.shutdown()?;
    Ok(())
}

fn cmd_clear(path: &Path) -> Result<()> {
    let root = path.canonicalize().context("invalid workspace path")?;
    let config = SearchConfig::load(&root);
    if config.storage == StorageKind::Memory {
        println!("Memory storage holds no persistent index; nothing to clear.");
        return Ok(());
    }

    let db_path = root.join(navix::config::DATA_DIR).join("index.db");
    if !db_path.exists() {
        println!("No index found at {}", db_path.display());
        return Ok(());
    }

    let mut store = SqliteStore::open(&db_path, config.batch_size)?;
    store.initialize()?;
    store.clear()?;
    store.flush()?;
    println!("Cleared index at {}", db_path.display());
    Ok(())
}
