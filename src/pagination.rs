/// Page/limit query handling shared by every list endpoint
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 20;
pub const DEFAULT_MEMBER_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;
/// Keeps `offset()` well inside i64
pub const MAX_PAGE: i64 = 1_000_000;

/// Raw `?page=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Normalise against a default page size
    pub fn resolve(self, default_limit: i64) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), self.limit.unwrap_or(default_limit))
    }
}

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp to 1 <= page <= MAX_PAGE and 1 <= limit <= MAX_LIMIT
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_LIMIT)
    }
}

/// A page of results together with the total count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };

        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let req = PageQuery::default().resolve(DEFAULT_LIMIT);
        assert_eq!(req, PageRequest { page: 1, limit: 20 });
        assert_eq!(req.offset(), 0);

        let req = PageQuery { page: Some(0), limit: Some(1000) }.resolve(DEFAULT_LIMIT);
        assert_eq!(req, PageRequest { page: 1, limit: MAX_LIMIT });

        let req = PageQuery { page: Some(3), limit: None }.resolve(DEFAULT_MEMBER_LIMIT);
        assert_eq!(req.offset(), 100);
    }

    #[test]
    fn test_huge_page_is_capped() {
        let req = PageQuery { page: Some(i64::MAX), limit: Some(20) }.resolve(DEFAULT_LIMIT);
        assert_eq!(req.page, MAX_PAGE);
        assert_eq!(req.offset(), (MAX_PAGE - 1) * 20);

        let req = PageRequest { page: i64::MAX, limit: MAX_LIMIT };
        assert_eq!(req.offset(), i64::MAX);
    }

    #[test]
    fn test_total_pages() {
        let req = PageRequest::new(1, 20);
        assert_eq!(Page::<()>::new(vec![], req, 0).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], req, 20).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], req, 21).total_pages, 2);
    }
}
