//! Quill Core Library
//!
//! This crate provides the in-process content index of the Quill blog
//! engine: chronological listing, prev/next navigation, tag/series/archive
//! groupings and the derived series and archive overview pages.
//!
//! # Architecture
//!
//! - **Article Store**: durable source of truth (SQLite by default)
//! - **Content index**: in-memory structures rebuilt from the store on startup
//! - **Regeneration worker**: background task keeping derived pages current
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(SqliteStore::open(&config)?);
//! let ids = Arc::new(SequenceIdGenerator::from_store(store.as_ref())?);
//! let index = Arc::new(ContentIndex::initialize(
//!     store,
//!     Arc::new(MarkdownRenderer::new()),
//!     ids,
//!     config.settings(),
//! )?);
//! let worker = spawn_regeneration_worker(Arc::clone(&index));
//!
//! index.add_article(NewArticle::new("hello-world", "Hello"))?;
//! let page = index.page(1, config.page_size);
//! ```
//!
//! # Modules
//!
//! - `index`: the content index service and its structures (main entry point)
//! - `models`: articles, series and archive keys
//! - `storage`: the Article Store trait with SQLite and in-memory backends
//! - `pages`: derived page assembly and the regeneration worker
//! - `render`: the Renderer trait and markdown implementation
//! - `ids`: ID allocation
//! - `sweep`: periodic trash purging
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod ids;
pub mod index;
pub mod models;
pub mod pages;
pub mod render;
pub mod seed;
pub mod storage;
pub mod sweep;

pub use config::Config;
pub use error::{IndexError, IndexResult};
pub use ids::{IdGenerator, SequenceIdGenerator};
pub use index::{ContentIndex, IndexSettings, IndexState, NavLinks, Page};
pub use models::{ArchiveKey, Article, ArticleId, NewArticle, Serie, SerieId};
pub use pages::{spawn_regeneration_worker, PageKind, PageVersions, RegenerationHandle};
pub use render::{MarkdownRenderer, RenderError, Renderer};
pub use seed::seed_static_pages;
pub use storage::{AdminPage, AdminQuery, ArticleStore, MemoryStore, SqliteStore, StorageError};
pub use sweep::{spawn_trash_sweeper, SweeperHandle};
