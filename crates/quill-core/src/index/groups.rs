//! Tag, series and archive indices
//!
//! Buckets hold article ids ordered newest first. Ordering is resolved
//! through the `ChronoList`, so an article must be listed before it is
//! added to a bucket.
//!
//! Each index has two ways in: `add`/`remove` keep a bucket sorted on every
//! call, while `push` appends and leaves the sorting to one `sort_all` at the
//! end of a bulk load.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::chrono_list::ChronoList;
use crate::models::{newest_first, ArchiveKey, Article, ArticleId, Serie, SerieId};

fn insert_sorted(members: &mut Vec<ArticleId>, article: &Article, list: &ChronoList) {
    if members.contains(&article.id) {
        return;
    }
    let pos = members.partition_point(|id| {
        list.get(*id)
            .is_some_and(|entry| newest_first(entry, article).is_lt())
    });
    members.insert(pos, article.id);
}

fn remove_member(members: &mut Vec<ArticleId>, id: ArticleId) -> bool {
    let before = members.len();
    members.retain(|member| *member != id);
    members.len() != before
}

fn sort_members(members: &mut [ArticleId], list: &ChronoList) {
    members.sort_by(|a, b| match (list.get(*a), list.get(*b)) {
        (Some(a), Some(b)) => newest_first(a, b),
        _ => b.cmp(a),
    });
}

/// Resolve member ids to articles, skipping any that are not listed
pub fn resolve(members: &[ArticleId], list: &ChronoList) -> Vec<Arc<Article>> {
    members
        .iter()
        .filter_map(|id| list.get(*id).cloned())
        .collect()
}

/// Articles grouped by tag
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    buckets: BTreeMap<String, Vec<ArticleId>>,
}

impl TagIndex {
    pub fn add(&mut self, article: &Article, list: &ChronoList) {
        for tag in &article.tags {
            insert_sorted(self.buckets.entry(tag.clone()).or_default(), article, list);
        }
    }

    pub fn push(&mut self, article: &Article) {
        for tag in &article.tags {
            self.buckets.entry(tag.clone()).or_default().push(article.id);
        }
    }

    /// Remove from every tag bucket, pruning buckets left empty
    pub fn remove(&mut self, article: &Article) {
        for tag in &article.tags {
            if let Some(members) = self.buckets.get_mut(tag) {
                remove_member(members, article.id);
                if members.is_empty() {
                    self.buckets.remove(tag);
                }
            }
        }
    }

    pub fn sort_all(&mut self, list: &ChronoList) {
        for members in self.buckets.values_mut() {
            sort_members(members, list);
        }
    }

    pub fn get(&self, tag: &str) -> Option<&[ArticleId]> {
        self.buckets.get(tag).map(Vec::as_slice)
    }

    /// Tags in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ArticleId])> + '_ {
        self.buckets
            .iter()
            .map(|(tag, members)| (tag.as_str(), members.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// A series and its members
#[derive(Debug, Clone)]
pub struct SerieBucket {
    pub serie: Serie,
    pub members: Vec<ArticleId>,
}

/// Series ordered by id, largest first
///
/// Series are entities in their own right, so a bucket stays when its last
/// member leaves.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    buckets: Vec<SerieBucket>,
}

impl SeriesIndex {
    pub fn from_series(series: Vec<Serie>) -> Self {
        let mut index = Self::default();
        for serie in series {
            index.upsert(serie);
        }
        index
    }

    /// Insert a series or replace its metadata, keeping members
    pub fn upsert(&mut self, serie: Serie) {
        match self.slot(serie.id) {
            Ok(pos) => self.buckets[pos].serie = serie,
            Err(pos) => self.buckets.insert(
                pos,
                SerieBucket {
                    serie,
                    members: Vec::new(),
                },
            ),
        }
    }

    pub fn remove_serie(&mut self, id: SerieId) -> Option<SerieBucket> {
        let pos = self.slot(id).ok()?;
        Some(self.buckets.remove(pos))
    }

    /// Add to the article's series; returns false if it has none or the
    /// series is unknown
    pub fn add(&mut self, article: &Article, list: &ChronoList) -> bool {
        match self.bucket_mut(article.serie_id) {
            Some(bucket) => {
                insert_sorted(&mut bucket.members, article, list);
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, article: &Article) -> bool {
        match self.bucket_mut(article.serie_id) {
            Some(bucket) => {
                bucket.members.push(article.id);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, article: &Article) -> bool {
        self.bucket_mut(article.serie_id)
            .is_some_and(|bucket| remove_member(&mut bucket.members, article.id))
    }

    pub fn sort_all(&mut self, list: &ChronoList) {
        for bucket in &mut self.buckets {
            sort_members(&mut bucket.members, list);
        }
    }

    pub fn get(&self, id: SerieId) -> Option<&SerieBucket> {
        self.slot(id).ok().map(|pos| &self.buckets[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SerieBucket> + '_ {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn bucket_mut(&mut self, id: Option<SerieId>) -> Option<&mut SerieBucket> {
        let pos = self.slot(id?).ok()?;
        self.buckets.get_mut(pos)
    }

    fn slot(&self, id: SerieId) -> Result<usize, usize> {
        self.buckets
            .binary_search_by(|bucket| id.cmp(&bucket.serie.id))
    }
}

/// Articles grouped by creation month, newest month first
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    buckets: BTreeMap<ArchiveKey, Vec<ArticleId>>,
}

impl ArchiveIndex {
    pub fn add(&mut self, article: &Article, list: &ChronoList) {
        insert_sorted(
            self.buckets.entry(article.archive_key()).or_default(),
            article,
            list,
        );
    }

    pub fn push(&mut self, article: &Article) {
        self.buckets
            .entry(article.archive_key())
            .or_default()
            .push(article.id);
    }

    /// Remove from the article's month, dropping the month if it empties
    pub fn remove(&mut self, article: &Article) -> bool {
        let key = article.archive_key();
        let Some(members) = self.buckets.get_mut(&key) else {
            return false;
        };
        let removed = remove_member(members, article.id);
        if members.is_empty() {
            self.buckets.remove(&key);
        }
        removed
    }

    pub fn sort_all(&mut self, list: &ChronoList) {
        for members in self.buckets.values_mut() {
            sort_members(members, list);
        }
    }

    pub fn get(&self, key: ArchiveKey) -> Option<&[ArticleId]> {
        self.buckets.get(&key).map(Vec::as_slice)
    }

    /// Months, newest first
    pub fn iter(&self) -> impl Iterator<Item = (ArchiveKey, &[ArticleId])> + '_ {
        self.buckets
            .iter()
            .rev()
            .map(|(key, members)| (*key, members.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(id: i64, month: u32, day: u32) -> Article {
        let mut article = Article::with_id(ArticleId(id), format!("s{id}"), "T");
        article.created_at = Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap();
        article
    }

    fn listed(list: &mut ChronoList, article: &Article) {
        list.insert(Arc::new(article.clone())).unwrap();
    }

    fn raw(ids: &[ArticleId]) -> Vec<i64> {
        ids.iter().map(|id| id.0).collect()
    }

    #[test]
    fn test_tag_buckets_sorted_and_pruned() {
        let mut list = ChronoList::new();
        let mut tags = TagIndex::default();

        let mut a = article(11, 1, 5);
        a.tags = vec!["rust".into(), "web".into()];
        let mut b = article(12, 1, 9);
        b.tags = vec!["rust".into()];
        for item in [&a, &b] {
            listed(&mut list, item);
            tags.add(item, &list);
        }

        assert_eq!(raw(tags.get("rust").unwrap()), vec![12, 11]);
        assert_eq!(tags.len(), 2);

        tags.remove(&a);
        assert!(tags.get("web").is_none());
        assert_eq!(raw(tags.get("rust").unwrap()), vec![12]);

        tags.remove(&b);
        assert!(tags.is_empty());
    }

    #[test]
    fn test_series_order_and_membership() {
        let mut list = ChronoList::new();
        let mut series = SeriesIndex::from_series(vec![
            Serie::new(SerieId(3), "Three", "three", ""),
            Serie::new(SerieId(9), "Nine", "nine", ""),
            Serie::new(SerieId(5), "Five", "five", ""),
        ]);
        let ids: Vec<i64> = series.iter().map(|b| b.serie.id.0).collect();
        assert_eq!(ids, vec![9, 5, 3]);

        let mut member = article(11, 2, 1);
        member.serie_id = Some(SerieId(5));
        listed(&mut list, &member);
        assert!(series.add(&member, &list));

        let mut orphan = article(12, 2, 2);
        orphan.serie_id = Some(SerieId(77));
        assert!(!series.add(&orphan, &list));

        assert!(series.remove(&member));
        // Series survive losing their last member
        assert!(series.get(SerieId(5)).unwrap().members.is_empty());

        series.upsert(Serie::new(SerieId(5), "Renamed", "five", "desc"));
        assert_eq!(series.get(SerieId(5)).unwrap().serie.name, "Renamed");
        assert_eq!(series.len(), 3);

        assert!(series.remove_serie(SerieId(5)).is_some());
        assert!(series.get(SerieId(5)).is_none());
    }

    #[test]
    fn test_archive_months_newest_first() {
        let mut list = ChronoList::new();
        let mut archives = ArchiveIndex::default();
        for item in [article(11, 1, 3), article(12, 3, 1), article(13, 1, 20)] {
            listed(&mut list, &item);
            archives.add(&item, &list);
        }

        let months: Vec<String> = archives.iter().map(|(key, _)| key.to_string()).collect();
        assert_eq!(months, vec!["2024-03", "2024-01"]);
        assert_eq!(
            raw(archives.get(ArchiveKey::new(2024, 1)).unwrap()),
            vec![13, 11]
        );

        assert!(archives.remove(&article(12, 3, 1)));
        assert_eq!(archives.len(), 1);
        assert!(!archives.remove(&article(12, 3, 1)));
    }

    #[test]
    fn test_bulk_push_then_sort_all() {
        let mut list = ChronoList::new();
        let mut archives = ArchiveIndex::default();
        let mut tags = TagIndex::default();
        let items: Vec<Article> = [(11, 2), (12, 9), (13, 5)]
            .into_iter()
            .map(|(id, day)| {
                let mut item = article(id, 6, day);
                item.tags = vec!["t".into()];
                item
            })
            .collect();
        for item in &items {
            list.push_unsorted(Arc::new(item.clone())).unwrap();
            archives.push(item);
            tags.push(item);
        }
        list.sort();
        archives.sort_all(&list);
        tags.sort_all(&list);

        assert_eq!(
            raw(archives.get(ArchiveKey::new(2024, 6)).unwrap()),
            vec![12, 13, 11]
        );
        assert_eq!(raw(tags.get("t").unwrap()), vec![12, 13, 11]);
        assert_eq!(resolve(tags.get("t").unwrap(), &list).len(), 3);
    }
}
