//! Pagination over the visible part of the chronological list

use std::sync::Arc;

use super::chrono_list::ChronoList;
use crate::models::Article;

/// One page of articles; `prev`/`next` are page numbers, 0 when absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub articles: Vec<Arc<Article>>,
    /// The page actually returned after clamping
    pub number: usize,
    pub prev: usize,
    pub next: usize,
    pub total_pages: usize,
}

/// Slice the articles with id `>= boundary` into pages of `page_size`
///
/// Page numbers below 1 are treated as 1 and numbers past the end as the
/// last page.
pub fn paginate(list: &ChronoList, boundary: i64, page_number: usize, page_size: usize) -> Page {
    if page_size == 0 {
        return Page::default();
    }

    let visible: Vec<&Arc<Article>> = list.iter().filter(|a| a.id.0 >= boundary).collect();
    let total_pages = visible.len().div_ceil(page_size);
    if total_pages == 0 {
        return Page::default();
    }

    let number = page_number.clamp(1, total_pages);
    let articles = visible
        .into_iter()
        .skip((number - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Page {
        articles,
        number,
        prev: number - 1,
        next: if number < total_pages { number + 1 } else { 0 },
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleId;
    use chrono::{Duration, TimeZone, Utc};

    fn list_of(entries: &[(i64, i64)]) -> ChronoList {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut list = ChronoList::new();
        for (id, minutes) in entries {
            let mut article = Article::with_id(ArticleId(*id), format!("s{id}"), "T");
            article.created_at = base + Duration::minutes(*minutes);
            list.insert(Arc::new(article)).unwrap();
        }
        list
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.articles.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn test_boundary_scenario() {
        let list = list_of(&[(101, 1), (102, 2), (103, 3)]);

        let first = paginate(&list, 100, 1, 2);
        assert_eq!(ids(&first), vec![103, 102]);
        assert_eq!((first.prev, first.next, first.total_pages), (0, 2, 2));

        let second = paginate(&list, 100, 2, 2);
        assert_eq!(ids(&second), vec![101]);
        assert_eq!((second.prev, second.next), (1, 0));
    }

    #[test]
    fn test_clamping() {
        let list = list_of(&[(101, 1), (102, 2), (103, 3)]);

        let past_end = paginate(&list, 100, 9, 2);
        assert_eq!(past_end.number, 2);
        assert_eq!(ids(&past_end), vec![101]);

        let zeroth = paginate(&list, 100, 0, 2);
        assert_eq!(zeroth.number, 1);
        assert_eq!(ids(&zeroth), vec![103, 102]);
    }

    #[test]
    fn test_invisible_entries_excluded() {
        let list = list_of(&[(1, 50), (2, 40), (101, 1)]);
        let page = paginate(&list, 100, 1, 10);
        assert_eq!(ids(&page), vec![101]);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_empty_cases() {
        let empty = ChronoList::new();
        assert_eq!(paginate(&empty, 100, 1, 2), Page::default());

        let hidden = list_of(&[(1, 1), (2, 2)]);
        let page = paginate(&hidden, 100, 1, 2);
        assert_eq!((page.total_pages, page.prev, page.next), (0, 0, 0));
        assert!(page.articles.is_empty());

        let list = list_of(&[(101, 1)]);
        assert_eq!(paginate(&list, 100, 1, 0), Page::default());
    }

    #[test]
    fn test_repeated_calls_identical() {
        let list = list_of(&[(101, 1), (102, 2), (103, 3), (104, 4)]);
        assert_eq!(paginate(&list, 100, 2, 3), paginate(&list, 100, 2, 3));
    }
}
