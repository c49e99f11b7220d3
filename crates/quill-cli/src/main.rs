//! Quill CLI
//!
//! Command-line interface for Quill - publishing and browsing a blog's
//! content index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use quill_core::{
    AdminQuery, ArticleStore, Config, ContentIndex, MarkdownRenderer, MemoryStore, PageKind,
    SequenceIdGenerator, SerieId, SqliteStore,
};

mod commands;
mod output;

use commands::article::PublishArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill - blog content index")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a throwaway in-memory store instead of the database
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and the static pages (about, blogroll)
    Init,
    /// Show status (storage location, counts)
    Status,
    /// List published articles, newest first
    #[command(alias = "ls")]
    List {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Articles per page (defaults to the configured page size)
        #[arg(short = 'n', long)]
        size: Option<usize>,
    },
    /// Show an article by slug or id
    Show {
        /// Slug or numeric id
        key: String,
    },
    /// Publish a markdown file as an article
    Publish {
        /// Markdown file
        file: PathBuf,
        /// Title (defaults to the first '# ' heading)
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// Slug (defaults to one derived from the title)
        #[arg(short, long)]
        slug: Option<String>,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Series id
        #[arg(long)]
        serie: Option<i64>,
        /// Save as a draft instead of publishing
        #[arg(long)]
        draft: bool,
        /// Replace the article with this id
        #[arg(long)]
        replace: Option<i64>,
    },
    /// Move articles to the trash
    #[command(alias = "rm")]
    Delete {
        /// Article ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Restore an article from the trash as a draft
    Recover { id: i64 },
    /// Permanently delete an unpublished article
    Remove { id: i64 },
    /// List drafts
    Drafts,
    /// List the trash
    Trash,
    /// Filtered listing of stored articles
    Admin {
        /// Only this series
        #[arg(long)]
        serie: Option<i64>,
        /// Title keyword
        #[arg(short, long)]
        keyword: Option<String>,
        /// List drafts
        #[arg(long, conflicts_with = "trash")]
        drafts: bool,
        /// List the trash
        #[arg(long)]
        trash: bool,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(short = 'n', long, default_value_t = 20)]
        size: usize,
    },
    /// List all tags, or the articles with one tag
    Tags { tag: Option<String> },
    /// Manage series
    Serie {
        #[command(subcommand)]
        command: SerieCommands,
    },
    /// Show the month-by-month archive
    Archives,
    /// Render a derived page
    Page {
        #[arg(value_enum)]
        kind: PageArg,
    },
    /// Purge trash older than the retention period
    Purge,
    /// Keep derived pages fresh and sweep the trash until Ctrl-C
    Run,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum SerieCommands {
    /// Create a series
    #[command(alias = "create")]
    Add {
        name: String,
        slug: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Update a series
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a series with no articles
    #[command(alias = "rm")]
    Delete { id: i64 },
    /// List series, or the articles of one series
    #[command(alias = "ls")]
    List { id: Option<i64> },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PageArg {
    Series,
    Archives,
}

impl From<PageArg> for PageKind {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::Series => PageKind::Series,
            PageArg::Archives => PageKind::Archive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Commands that don't need the index
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key.clone(), value.clone(), &output)
            }
        };
    }

    let config = Config::load().context("Failed to load configuration")?;
    let index = open_index(&config, cli.memory)?;

    match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Init => {
            let created = quill_core::seed_static_pages(&index, &config.author)?;
            if created.is_empty() {
                output.message("Already initialized.");
            } else {
                output.success(&format!("Created {} static page(s)", created.len()));
            }
            Ok(())
        }
        Commands::Status => commands::status::show(&index, &config, cli.memory, &output),
        Commands::List { page, size } => {
            commands::article::list(&index, page, size.unwrap_or(config.page_size), &output)
        }
        Commands::Show { key } => commands::article::show(&index, key, &output),
        Commands::Publish {
            file,
            title,
            slug,
            tag,
            serie,
            draft,
            replace,
        } => commands::article::publish(
            &index,
            PublishArgs {
                file,
                title,
                slug,
                tags: tag,
                serie,
                draft,
                replace,
                author: config.author.clone(),
            },
            &output,
        ),
        Commands::Delete { ids } => commands::article::delete(&index, ids, &output),
        Commands::Recover { id } => commands::article::recover(&index, id, &output),
        Commands::Remove { id } => commands::article::remove(&index, id, &output),
        Commands::Drafts => commands::article::drafts(&index, &output),
        Commands::Trash => commands::article::trash(&index, &output),
        Commands::Admin {
            serie,
            keyword,
            drafts,
            trash,
            page,
            size,
        } => {
            let query = AdminQuery {
                serie_id: serie.map(SerieId),
                keyword,
                draft: drafts,
                trash,
                page,
                page_size: size,
            };
            commands::article::admin(&index, query, &output)
        }
        Commands::Tags { tag } => commands::tag::list(&index, tag, &output),
        Commands::Serie { command } => handle_serie_command(command, &index, &output),
        Commands::Archives => commands::page::archives(&index, &output),
        Commands::Page { kind } => commands::page::show(&index, kind.into(), &output),
        Commands::Purge => {
            let purged = quill_core::sweep::sweep_once(
                index.store().as_ref(),
                config.trash_retention(),
            )
            .context("Failed to purge trash")?;
            output.success(&format!("Purged {} article(s) from trash", purged));
            Ok(())
        }
        Commands::Run => commands::run::run(Arc::clone(&index), &config, &output).await,
    }
}

fn handle_serie_command(command: SerieCommands, index: &ContentIndex, output: &Output) -> Result<()> {
    match command {
        SerieCommands::Add {
            name,
            slug,
            description,
        } => commands::serie::add(index, name, slug, description, output),
        SerieCommands::Update {
            id,
            name,
            slug,
            description,
        } => commands::serie::update(index, id, name, slug, description, output),
        SerieCommands::Delete { id } => commands::serie::delete(index, id, output),
        SerieCommands::List { id } => commands::serie::list(index, id, output),
    }
}

/// Open the store and load the index from it
fn open_index(config: &Config, in_memory: bool) -> Result<Arc<ContentIndex>> {
    let store: Arc<dyn ArticleStore> = if in_memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(config).context("Failed to open article store")?)
    };
    let ids = SequenceIdGenerator::from_store(store.as_ref())?;

    let index = ContentIndex::initialize(
        store,
        Arc::new(MarkdownRenderer::new()),
        Arc::new(ids),
        config.settings(),
    )
    .context("Failed to load content index")?;
    Ok(Arc::new(index))
}

/// Log to stderr, filtered by QUILL_LOG
fn init_logging() {
    let env_filter = EnvFilter::try_from_env("QUILL_LOG")
        .unwrap_or_else(|_| EnvFilter::new("quill_core=info,quill_cli=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
