//! Navigation linker
//!
//! Keeps a doubly-linked prev/next chain over the articles at or above the
//! visibility boundary, in list order. `prev` points at the newer neighbour
//! and `next` at the older one. Entries below the boundary never get links
//! and are skipped over when linking.

use std::collections::HashMap;

use serde::Serialize;

use super::chrono_list::ChronoList;
use crate::models::ArticleId;

/// Neighbours of one article in the chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NavLinks {
    /// Newer neighbour
    pub prev: Option<ArticleId>,
    /// Older neighbour
    pub next: Option<ArticleId>,
}

#[derive(Debug, Clone, Default)]
pub struct NavChain {
    boundary: i64,
    links: HashMap<ArticleId, NavLinks>,
}

impl NavChain {
    pub fn new(boundary: i64) -> Self {
        Self {
            boundary,
            links: HashMap::new(),
        }
    }

    pub fn is_visible(&self, id: ArticleId) -> bool {
        id.0 >= self.boundary
    }

    /// Relink the whole chain from list order
    pub fn rebuild(&mut self, list: &ChronoList) {
        self.links.clear();
        let boundary = self.boundary;
        let mut newer: Option<ArticleId> = None;
        for &id in list.ids().iter().filter(|id| id.0 >= boundary) {
            self.links.insert(
                id,
                NavLinks {
                    prev: newer,
                    next: None,
                },
            );
            if let Some(prev) = newer {
                if let Some(links) = self.links.get_mut(&prev) {
                    links.next = Some(id);
                }
            }
            newer = Some(id);
        }
    }

    /// Splice an article that is already in `list` into the chain
    pub fn link(&mut self, list: &ChronoList, id: ArticleId) {
        if !self.is_visible(id) {
            return;
        }
        let Some(pos) = list.position(id) else {
            return;
        };
        let ids = list.ids();
        let prev = ids[..pos]
            .iter()
            .rev()
            .copied()
            .find(|other| self.is_visible(*other));
        let next = ids[pos + 1..]
            .iter()
            .copied()
            .find(|other| self.is_visible(*other));

        self.links.insert(id, NavLinks { prev, next });
        if let Some(links) = prev.and_then(|p| self.links.get_mut(&p)) {
            links.next = Some(id);
        }
        if let Some(links) = next.and_then(|n| self.links.get_mut(&n)) {
            links.prev = Some(id);
        }
    }

    /// Take an article out of the chain, joining its neighbours
    pub fn unlink(&mut self, id: ArticleId) {
        let Some(NavLinks { prev, next }) = self.links.remove(&id) else {
            return;
        };
        match (prev, next) {
            (Some(p), Some(n)) => {
                self.set_next(p, Some(n));
                self.set_prev(n, Some(p));
            }
            (Some(p), None) => self.set_next(p, None),
            (None, Some(n)) => self.set_prev(n, None),
            (None, None) => {}
        }
    }

    pub fn neighbors(&self, id: ArticleId) -> Option<NavLinks> {
        self.links.get(&id).copied()
    }

    /// Number of linked articles
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    fn set_next(&mut self, id: ArticleId, next: Option<ArticleId>) {
        if let Some(links) = self.links.get_mut(&id) {
            links.next = next;
        }
    }

    fn set_prev(&mut self, id: ArticleId, prev: Option<ArticleId>) {
        if let Some(links) = self.links.get_mut(&id) {
            links.prev = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Article;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn article(id: i64, minutes: i64) -> Arc<Article> {
        let mut article = Article::with_id(ArticleId(id), format!("s{id}"), "T");
        article.created_at =
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        Arc::new(article)
    }

    /// Walk from the head following `next`, checking `prev` on the way back
    fn walk(chain: &NavChain, list: &ChronoList) -> Vec<i64> {
        let head = list
            .ids()
            .iter()
            .copied()
            .find(|id| chain.is_visible(*id));
        let mut seen = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            assert!(seen.len() <= list.len(), "cycle in chain");
            let links = chain.neighbors(id).unwrap();
            if let Some(next) = links.next {
                assert_eq!(chain.neighbors(next).unwrap().prev, Some(id));
            }
            seen.push(id.0);
            cursor = links.next;
        }
        seen
    }

    #[test]
    fn test_link_in_order() {
        let mut list = ChronoList::new();
        let mut chain = NavChain::new(11);
        for (id, minutes) in [(11, 0), (13, 20), (12, 10)] {
            list.insert(article(id, minutes)).unwrap();
            chain.link(&list, ArticleId(id));
        }

        assert_eq!(walk(&chain, &list), vec![13, 12, 11]);
        let head = chain.neighbors(ArticleId(13)).unwrap();
        assert_eq!(head.prev, None);
        assert_eq!(head.next, Some(ArticleId(12)));
    }

    #[test]
    fn test_below_boundary_is_skipped() {
        let mut list = ChronoList::new();
        let mut chain = NavChain::new(11);
        // Static page created between two articles
        for (id, minutes) in [(11, 0), (2, 5), (12, 10)] {
            list.insert(article(id, minutes)).unwrap();
            chain.link(&list, ArticleId(id));
        }

        assert!(chain.neighbors(ArticleId(2)).is_none());
        assert_eq!(
            chain.neighbors(ArticleId(12)).unwrap().next,
            Some(ArticleId(11))
        );
        assert_eq!(walk(&chain, &list), vec![12, 11]);
    }

    #[test]
    fn test_unlink_all_cases() {
        let mut list = ChronoList::new();
        let mut chain = NavChain::new(0);
        for id in 1..=5 {
            list.insert(article(id, id)).unwrap();
        }
        chain.rebuild(&list);
        assert_eq!(walk(&chain, &list), vec![5, 4, 3, 2, 1]);

        // Middle
        chain.unlink(ArticleId(3));
        list.remove(ArticleId(3));
        assert_eq!(walk(&chain, &list), vec![5, 4, 2, 1]);

        // Head
        chain.unlink(ArticleId(5));
        list.remove(ArticleId(5));
        assert_eq!(chain.neighbors(ArticleId(4)).unwrap().prev, None);

        // Tail
        chain.unlink(ArticleId(1));
        list.remove(ArticleId(1));
        assert_eq!(chain.neighbors(ArticleId(2)).unwrap().next, None);
        assert_eq!(walk(&chain, &list), vec![4, 2]);

        // Only member
        chain.unlink(ArticleId(4));
        list.remove(ArticleId(4));
        chain.unlink(ArticleId(2));
        list.remove(ArticleId(2));
        assert!(chain.is_empty());

        // Unknown ids are ignored
        chain.unlink(ArticleId(42));
    }

    #[test]
    fn test_rebuild_matches_incremental_linking() {
        let mut list = ChronoList::new();
        let mut incremental = NavChain::new(10);
        for (id, minutes) in [(10, 3), (15, 1), (4, 2), (12, 9), (11, 9)] {
            list.insert(article(id, minutes)).unwrap();
            incremental.link(&list, ArticleId(id));
        }
        let mut rebuilt = NavChain::new(10);
        rebuilt.rebuild(&list);

        for id in list.ids() {
            assert_eq!(incremental.neighbors(*id), rebuilt.neighbors(*id));
        }
        assert_eq!(walk(&rebuilt, &list), vec![12, 11, 10, 15]);
    }
}
