use serde::Serialize;

/// Page-number pagination context. `count` is the total row count across
/// all pages, taken from a `COUNT(*) OVER()` window column on the page rows.
#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub page: i64,
    pub page_count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(results: Vec<T>, count: i64, page_size: i64, page: i64) -> Self {
        if results.is_empty() {
            return Self::no_rows();
        }
        let page_count = (count + page_size - 1) / page_size;
        let next = (page < page_count).then_some(page + 1);
        let previous = (page > 1).then_some(page - 1);

        Self {
            count,
            page,
            page_count,
            next,
            previous,
            results,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            page: 1,
            page_count: 1,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}

/// Offset of the first row of `page`, both one-based pages and row offsets.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1) * page_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_has_no_neighbours() {
        let page = PageContext::from_rows(vec![1, 2, 3], 3, 6, 1);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let page = PageContext::from_rows(vec![7, 8, 9], 20, 3, 2);
        assert_eq!(page.page_count, 7);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
    }

    #[test]
    fn last_partial_page_counts() {
        let page = PageContext::from_rows(vec![19, 20], 20, 6, 4);
        assert_eq!(page.page_count, 4);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(3));
    }

    #[test]
    fn empty_result_set() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 6, 1);
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }

    #[test]
    fn offsets_are_zero_based() {
        assert_eq!(page_offset(1, 6), 0);
        assert_eq!(page_offset(3, 6), 12);
        assert_eq!(page_offset(0, 6), 0);
    }
}
