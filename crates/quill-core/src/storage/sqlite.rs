//! SQLite-backed Article Store
//!
//! One connection guarded by a mutex. Multi-row writes (an article and its
//! tags) run in a transaction so a failed write leaves nothing behind.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init};
use super::{AdminPage, AdminQuery, ArticleStore, Shelf};
use crate::config::Config;
use crate::models::{Article, ArticleId, Derived, Serie, SerieId};

const ARTICLE_COLUMNS: &str =
    "id, slug, title, author, content, serie_id, is_draft, created_at, updated_at, deleted_at";

/// Article Store persisted in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the configured location
    pub fn open(config: &Config) -> StorageResult<Self> {
        Self::open_path(&config.sqlite_path())
    }

    /// Open or create the database at `path`
    pub fn open_path(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored articles in any state
    pub fn article_count(&self) -> StorageResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl ArticleStore for SqliteStore {
    fn fetch_published(&self) -> StorageResult<Vec<Article>> {
        let conn = self.conn.lock();
        query_articles(
            &conn,
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles \
                 WHERE is_draft = 0 AND deleted_at IS NULL \
                 ORDER BY created_at DESC, id DESC"
            ),
            [],
        )
    }

    fn fetch(&self, id: ArticleId) -> StorageResult<Option<Article>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"),
                params![id.0],
                read_article_row,
            )
            .optional()?;

        row.map(|row| hydrate(&conn, row)).transpose()
    }

    fn insert(&self, article: &Article) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO articles ({ARTICLE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                article.id.0,
                article.slug,
                article.title,
                article.author,
                article.content,
                article.serie_id.map(|s| s.0),
                article.is_draft,
                article.created_at.timestamp_millis(),
                article.updated_at.timestamp_millis(),
                article.deleted_at.map(|d| d.timestamp_millis()),
            ],
        )?;
        write_tags(&tx, article)?;
        record_id(&tx, article.id.0)?;

        tx.commit()?;
        Ok(())
    }

    fn update(&self, article: &Article) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE articles
            SET slug = ?, title = ?, author = ?, content = ?, serie_id = ?,
                is_draft = ?, created_at = ?, updated_at = ?, deleted_at = ?
            WHERE id = ?
            "#,
            params![
                article.slug,
                article.title,
                article.author,
                article.content,
                article.serie_id.map(|s| s.0),
                article.is_draft,
                article.created_at.timestamp_millis(),
                article.updated_at.timestamp_millis(),
                article.deleted_at.map(|d| d.timestamp_millis()),
                article.id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::ArticleNotFound(article.id));
        }

        tx.execute(
            "DELETE FROM article_tags WHERE article_id = ?",
            params![article.id.0],
        )?;
        write_tags(&tx, article)?;

        tx.commit()?;
        Ok(())
    }

    fn mark_deleted(&self, id: ArticleId, at: DateTime<Utc>) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE articles SET deleted_at = ? WHERE id = ?",
            params![at.timestamp_millis(), id.0],
        )?;
        expect_article(changed, id)
    }

    fn recover(&self, id: ArticleId) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE articles SET deleted_at = NULL, is_draft = 1 WHERE id = ?",
            params![id.0],
        )?;
        expect_article(changed, id)
    }

    fn delete(&self, id: ArticleId) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM articles WHERE id = ?", params![id.0])?;
        expect_article(changed, id)
    }

    fn fetch_draft_or_trash(&self, shelf: Shelf) -> StorageResult<Vec<Article>> {
        let filter = match shelf {
            Shelf::Drafts => "is_draft = 1 AND deleted_at IS NULL",
            Shelf::Trash => "deleted_at IS NOT NULL",
        };
        let conn = self.conn.lock();
        query_articles(
            &conn,
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} \
                 ORDER BY created_at DESC, id DESC"
            ),
            [],
        )
    }

    fn list_admin(&self, query: &AdminQuery) -> StorageResult<AdminPage> {
        let (filter, mut values) = admin_filter(query);
        let conn = self.conn.lock();

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM articles WHERE {filter}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(query.page_size as i64));
        values.push(Value::Integer(query.offset() as i64));
        let articles = query_articles(
            &conn,
            &format!(
                "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            ),
            params_from_iter(values.iter()),
        )?;

        Ok(AdminPage {
            total_pages: query.total_pages(count.max(0) as usize),
            articles,
        })
    }

    fn purge_trash(&self, older_than: DateTime<Utc>) -> StorageResult<usize> {
        let conn = self.conn.lock();
        let purged = conn.execute(
            "DELETE FROM articles WHERE deleted_at IS NOT NULL AND deleted_at < ?",
            params![older_than.timestamp_millis()],
        )?;
        Ok(purged)
    }

    fn max_id(&self) -> StorageResult<Option<i64>> {
        let conn = self.conn.lock();
        let max = conn.query_row(
            "SELECT MAX(m) FROM ( \
                 SELECT MAX(id) AS m FROM articles \
                 UNION ALL SELECT MAX(id) FROM series \
                 UNION ALL SELECT CAST(value AS INTEGER) FROM schema_info WHERE key = 'id_seq' \
             )",
            [],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max)
    }

    fn fetch_series(&self) -> StorageResult<Vec<Serie>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, description, created_at FROM series ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name, slug, description, created_at)| {
                Ok(Serie {
                    id: SerieId(id),
                    name,
                    slug,
                    description,
                    created_at: from_millis("created_at", created_at)?,
                })
            })
            .collect()
    }

    fn insert_serie(&self, serie: &Serie) -> StorageResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO series (id, name, slug, description, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                serie.id.0,
                serie.name,
                serie.slug,
                serie.description,
                serie.created_at.timestamp_millis(),
            ],
        )?;
        record_id(&tx, serie.id.0)?;

        tx.commit()?;
        Ok(())
    }

    fn update_serie(&self, serie: &Serie) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE series SET name = ?, slug = ?, description = ? WHERE id = ?",
            params![serie.name, serie.slug, serie.description, serie.id.0],
        )?;
        if changed == 0 {
            return Err(StorageError::SerieNotFound(serie.id));
        }
        Ok(())
    }

    fn delete_serie(&self, id: SerieId) -> StorageResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM series WHERE id = ?", params![id.0])?;
        if changed == 0 {
            return Err(StorageError::SerieNotFound(id));
        }
        Ok(())
    }
}

// ==================== Row helpers ====================

/// Article row before tags are attached
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    author: String,
    content: String,
    serie_id: Option<i64>,
    is_draft: bool,
    created_at: i64,
    updated_at: i64,
    deleted_at: Option<i64>,
}

fn read_article_row(row: &Row) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        content: row.get(4)?,
        serie_id: row.get(5)?,
        is_draft: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

fn query_articles<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Vec<Article>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_article_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(|row| hydrate(conn, row)).collect()
}

/// Attach tags and convert timestamps
fn hydrate(conn: &Connection, row: ArticleRow) -> StorageResult<Article> {
    let mut stmt =
        conn.prepare_cached("SELECT tag FROM article_tags WHERE article_id = ? ORDER BY position")?;
    let tags = stmt
        .query_map(params![row.id], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Article {
        id: ArticleId(row.id),
        slug: row.slug,
        title: row.title,
        author: row.author,
        content: row.content,
        tags,
        serie_id: row.serie_id.map(SerieId),
        is_draft: row.is_draft,
        created_at: from_millis("created_at", row.created_at)?,
        updated_at: from_millis("updated_at", row.updated_at)?,
        deleted_at: row
            .deleted_at
            .map(|v| from_millis("deleted_at", v))
            .transpose()?,
        derived: Derived::default(),
    })
}

/// Raise the persisted id high-water mark to at least `id`
fn record_id(tx: &Transaction, id: i64) -> StorageResult<()> {
    tx.execute(
        "INSERT INTO schema_info (key, value) VALUES ('id_seq', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = ?1 \
         WHERE CAST(schema_info.value AS INTEGER) < ?1",
        params![id],
    )?;
    Ok(())
}

fn write_tags(tx: &Transaction, article: &Article) -> StorageResult<()> {
    for (position, tag) in article.tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO article_tags (article_id, tag, position) VALUES (?, ?, ?)",
            params![article.id.0, tag, position as i64],
        )?;
    }
    Ok(())
}

fn from_millis(column: &'static str, value: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or(StorageError::InvalidTimestamp { column, value })
}

fn expect_article(changed: usize, id: ArticleId) -> StorageResult<()> {
    if changed == 0 {
        Err(StorageError::ArticleNotFound(id))
    } else {
        Ok(())
    }
}

/// WHERE clause and bound values for an admin listing
fn admin_filter(query: &AdminQuery) -> (String, Vec<Value>) {
    if query.draft {
        return ("is_draft = 1 AND deleted_at IS NULL".to_string(), Vec::new());
    }
    if query.trash {
        return ("deleted_at IS NOT NULL".to_string(), Vec::new());
    }

    let mut clauses = vec!["is_draft = 0 AND deleted_at IS NULL".to_string()];
    let mut values = Vec::new();

    if let Some(serie_id) = query.serie_id {
        clauses.push("serie_id = ?".to_string());
        values.push(Value::Integer(serie_id.0));
    }
    if let Some(kw) = query.keyword.as_deref().filter(|kw| !kw.is_empty()) {
        clauses.push(r"LOWER(title) LIKE ? ESCAPE '\'".to_string());
        values.push(Value::Text(format!("%{}%", escape_like(&kw.to_lowercase()))));
    }

    (clauses.join(" AND "), values)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn article(id: i64, slug: &str, day: u32) -> Article {
        let mut article = Article::with_id(ArticleId(id), slug, format!("Title {slug}"));
        article.created_at = Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap();
        article.updated_at = article.created_at;
        article.set_content("# Heading\n\nBody");
        article
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("quill.db");

        let store = SqliteStore::open_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.article_count().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut a = article(100, "hello", 3);
        a.add_tag("rust");
        a.add_tag("sqlite");
        a.serie_id = Some(SerieId(5));
        store.insert(&a).unwrap();

        let fetched = store.fetch(ArticleId(100)).unwrap().unwrap();
        assert_eq!(fetched.slug, "hello");
        assert_eq!(fetched.tags, vec!["rust", "sqlite"]);
        assert_eq!(fetched.serie_id, Some(SerieId(5)));
        assert_eq!(fetched.created_at, a.created_at);
        assert!(fetched.deleted_at.is_none());

        assert!(store.fetch(ArticleId(999)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_slug_is_constraint_violation() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&article(100, "same", 1)).unwrap();

        let err = store.insert(&article(101, "same", 2)).unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(store.article_count().unwrap(), 1);
    }

    #[test]
    fn test_fetch_published_excludes_drafts_and_trash() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&article(100, "one", 1)).unwrap();
        store.insert(&article(101, "two", 2)).unwrap();

        let mut draft = article(102, "draft", 3);
        draft.is_draft = true;
        store.insert(&draft).unwrap();

        store.mark_deleted(ArticleId(100), Utc::now()).unwrap();

        let published = store.fetch_published().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].slug, "two");

        let drafts = store.fetch_draft_or_trash(Shelf::Drafts).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].slug, "draft");

        let trash = store.fetch_draft_or_trash(Shelf::Trash).unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].slug, "one");
    }

    #[test]
    fn test_update_rewrites_tags() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut a = article(100, "post", 1);
        a.set_tags(vec!["old".into(), "keep".into()]);
        store.insert(&a).unwrap();

        a.title = "New title".into();
        a.set_tags(vec!["keep".into(), "new".into()]);
        store.update(&a).unwrap();

        let fetched = store.fetch(ArticleId(100)).unwrap().unwrap();
        assert_eq!(fetched.title, "New title");
        assert_eq!(fetched.tags, vec!["keep", "new"]);

        let missing = article(555, "missing", 1);
        assert!(store.update(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_recover_returns_to_draft() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&article(100, "post", 1)).unwrap();
        store.mark_deleted(ArticleId(100), Utc::now()).unwrap();

        store.recover(ArticleId(100)).unwrap();
        let fetched = store.fetch(ArticleId(100)).unwrap().unwrap();
        assert!(fetched.is_draft);
        assert!(fetched.deleted_at.is_none());

        assert!(store.recover(ArticleId(7)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_cascades_tags() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut a = article(100, "post", 1);
        a.add_tag("gone");
        store.insert(&a).unwrap();

        store.delete(ArticleId(100)).unwrap();
        assert!(store.fetch(ArticleId(100)).unwrap().is_none());

        let conn = store.conn.lock();
        let tags: i64 = conn
            .query_row("SELECT COUNT(*) FROM article_tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tags, 0);
    }

    #[test]
    fn test_list_admin_filters_and_pages() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..5 {
            let mut a = article(100 + i, &format!("post-{i}"), 1 + i as u32);
            if i % 2 == 0 {
                a.serie_id = Some(SerieId(9));
            }
            store.insert(&a).unwrap();
        }
        let mut special = article(200, "special", 20);
        special.title = "100% Special".into();
        store.insert(&special).unwrap();

        let page = store
            .list_admin(&AdminQuery {
                page: 1,
                page_size: 2,
                ..AdminQuery::default()
            })
            .unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.articles[0].slug, "special");

        let serie = store
            .list_admin(&AdminQuery {
                serie_id: Some(SerieId(9)),
                page: 2,
                page_size: 2,
                ..AdminQuery::default()
            })
            .unwrap();
        assert_eq!(serie.total_pages, 2);
        assert_eq!(serie.articles.len(), 1);
        assert_eq!(serie.articles[0].slug, "post-0");

        let keyword = store
            .list_admin(&AdminQuery {
                keyword: Some("0%".into()),
                ..AdminQuery::default()
            })
            .unwrap();
        assert_eq!(keyword.articles.len(), 1);
        assert_eq!(keyword.articles[0].slug, "special");
    }

    #[test]
    fn test_purge_trash() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(&article(100, "old", 1)).unwrap();
        store.insert(&article(101, "recent", 2)).unwrap();

        let now = Utc::now();
        store
            .mark_deleted(ArticleId(100), now - Duration::hours(72))
            .unwrap();
        store.mark_deleted(ArticleId(101), now).unwrap();

        let purged = store.purge_trash(now - Duration::hours(48)).unwrap();
        assert_eq!(purged, 1);
        assert!(store.fetch(ArticleId(100)).unwrap().is_none());
        assert!(store.fetch(ArticleId(101)).unwrap().is_some());
    }

    #[test]
    fn test_max_id_survives_removal_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quill.db");

        {
            let store = SqliteStore::open_path(&path).unwrap();
            store.insert(&article(11, "first", 1)).unwrap();
            store.insert(&article(12, "second", 2)).unwrap();
            store.delete(ArticleId(12)).unwrap();
            assert_eq!(store.max_id().unwrap(), Some(12));

            store.mark_deleted(ArticleId(11), Utc::now()).unwrap();
            store.purge_trash(Utc::now() + Duration::hours(1)).unwrap();
            assert_eq!(store.article_count().unwrap(), 0);
        }

        let store = SqliteStore::open_path(&path).unwrap();
        assert_eq!(store.max_id().unwrap(), Some(12));

        // A lower insert never lowers the mark
        store.insert(&article(3, "about", 3)).unwrap();
        assert_eq!(store.max_id().unwrap(), Some(12));
    }

    #[test]
    fn test_series_crud_and_max_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.max_id().unwrap(), None);

        store.insert(&article(100, "post", 1)).unwrap();
        let mut serie = Serie::new(SerieId(150), "Rust", "rust", "All about Rust");
        store.insert_serie(&serie).unwrap();
        store
            .insert_serie(&Serie::new(SerieId(120), "Go", "go", ""))
            .unwrap();
        assert_eq!(store.max_id().unwrap(), Some(150));

        serie.description = "Updated".into();
        store.update_serie(&serie).unwrap();

        let series = store.fetch_series().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].id, SerieId(150));
        assert_eq!(series[0].description, "Updated");

        store.delete_serie(SerieId(120)).unwrap();
        assert!(store.delete_serie(SerieId(120)).unwrap_err().is_not_found());
        assert_eq!(store.fetch_series().unwrap().len(), 1);
    }

    #[test]
    fn test_data_persists_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quill.db");

        {
            let store = SqliteStore::open_path(&path).unwrap();
            store.insert(&article(100, "persist", 1)).unwrap();
        }

        let store = SqliteStore::open_path(&path).unwrap();
        let published = store.fetch_published().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].slug, "persist");
    }
}
