//! Fixed-size paging over absolute sample indices.

use std::ops::Range;

/// Page state over `total` samples. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    total: usize,
    page_size: usize,
    page: usize,
}

impl Pager {
    /// Creates a pager on page 1. A zero `page_size` is treated as 1.
    pub fn new(total: usize, page_size: usize) -> Self {
        Self {
            total,
            page_size: page_size.max(1),
            page: 1,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// `ceil(total / page_size)`; zero when there are no samples.
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    /// Half-open window `[(k-1)*P, min(k*P, N))`, or `None` for a page
    /// outside `1..=total_pages`.
    pub fn page_bounds(&self, page: usize) -> Option<Range<usize>> {
        if page == 0 || page > self.total_pages() {
            return None;
        }
        let start = (page - 1) * self.page_size;
        let end = (page * self.page_size).min(self.total);
        Some(start..end)
    }

    pub fn current_bounds(&self) -> Option<Range<usize>> {
        self.page_bounds(self.page)
    }

    /// Changes the page size and resets to page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Moves to `page`, clamped into `1..=max(total_pages, 1)`.
    pub fn go_to_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    /// Advances one page; returns `false` on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.page < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Goes back one page; returns `false` on page 1.
    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Page holding `absolute_index`, if it is a valid sample index.
    pub fn page_of(&self, absolute_index: usize) -> Option<usize> {
        if absolute_index < self.total {
            Some(absolute_index / self.page_size + 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Pager;

    #[test]
    fn last_page_may_be_short() {
        let pager = Pager::new(250, 100);
        assert_eq!(pager.total_pages(), 3);
        assert_eq!(pager.page_bounds(1), Some(0..100));
        assert_eq!(pager.page_bounds(3), Some(200..250));
        assert_eq!(pager.page_bounds(4), None);
        assert_eq!(pager.page_bounds(0), None);
    }

    #[test]
    fn changing_page_size_resets_to_first_page() {
        let mut pager = Pager::new(250, 100);
        pager.go_to_page(3);
        pager.set_page_size(50);
        assert_eq!(pager.page(), 1);
        assert_eq!(pager.total_pages(), 5);
    }

    #[test]
    fn navigation_is_clamped() {
        let mut pager = Pager::new(150, 100);
        pager.go_to_page(9);
        assert_eq!(pager.page(), 2);
        assert!(!pager.next_page());
        assert!(pager.prev_page());
        assert!(!pager.prev_page());
    }

    #[test]
    fn page_of_locates_absolute_index() {
        let pager = Pager::new(250, 100);
        assert_eq!(pager.page_of(0), Some(1));
        assert_eq!(pager.page_of(199), Some(2));
        assert_eq!(pager.page_of(250), None);
    }

    #[test]
    fn empty_total_has_no_pages() {
        let pager = Pager::new(0, 100);
        assert_eq!(pager.total_pages(), 0);
        assert_eq!(pager.current_bounds(), None);
    }
}
