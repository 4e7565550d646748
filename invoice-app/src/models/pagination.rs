use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Query string of a list request. Missing or zero values fall back to the
/// first page of [`DEFAULT_PAGE_SIZE`] rows.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Clamp to `page >= 1` and `1 <= limit <= max_limit`.
    pub fn clamp(self, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(max_limit);
        Self::new(page, limit)
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

/// Page metadata returned next to a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub pages: i64,
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(total: i64, request: &PageRequest) -> Self {
        let limit = request.limit();
        let per_page = i64::from(limit.max(1));
        Self {
            total,
            pages: (total.max(0) + per_page - 1) / per_page,
            page: request.page(),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_round_up() {
        let p = Pagination::new(11, &PageRequest::new(1, 5));
        assert_eq!(p.pages, 3);
        assert_eq!(Pagination::new(10, &PageRequest::new(1, 5)).pages, 2);
        assert_eq!(Pagination::new(0, &PageRequest::new(1, 5)).pages, 0);
        assert_eq!(Pagination::new(1, &PageRequest::new(1, 5)).pages, 1);
        assert_eq!(Pagination::new(i64::MAX - 1, &PageRequest::new(1, 1)).pages, i64::MAX - 1);
    }

    #[test]
    fn clamp_applies_defaults_and_bounds() {
        let req = PageRequest::default().clamp(100);
        assert_eq!((req.page(), req.limit()), (1, DEFAULT_PAGE_SIZE));

        let req = PageRequest::new(0, 1000).clamp(100);
        assert_eq!((req.page(), req.limit()), (1, 100));
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageRequest::new(3, 5).offset(), 10);
        assert_eq!(PageRequest::new(1, 5).offset(), 0);
    }
}
