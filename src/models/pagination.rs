//! Page arithmetic for list requests.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not supply `limit`.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Pagination metadata returned alongside a page of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_records: u64,
    pub limit: u64,
    pub skip: u64,
    pub total_pages: u64,
    pub current_page: u64,
}

/// A requested page, with `page` and `limit` clamped to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: clamp_positive(page),
            limit: clamp_positive(limit),
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total_records: u64) -> PaginationMeta {
        PaginationMeta {
            total_records,
            limit: self.limit,
            skip: self.offset(),
            total_pages: total_pages(total_records, self.limit),
            current_page: self.page,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Compute pagination metadata for `total_records` rows.
pub fn paginate(page: i64, limit: i64, total_records: u64) -> PaginationMeta {
    PageRequest::new(page, limit).meta(total_records)
}

fn clamp_positive(v: i64) -> u64 {
    v.max(1) as u64
}

fn total_pages(total_records: u64, limit: u64) -> u64 {
    total_records / limit + u64::from(total_records % limit != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_with_remainder() {
        let meta = paginate(1, 10, 25);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn test_total_pages_exact() {
        let meta = paginate(1, 10, 20);
        assert_eq!(meta.total_pages, 2);
    }

    #[test]
    fn test_empty_table_has_no_pages() {
        let meta = paginate(1, 10, 0);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.skip, 0);
    }

    #[test]
    fn test_offset() {
        let meta = paginate(3, 10, 100);
        assert_eq!(meta.skip, 20);
        assert_eq!(meta.current_page, 3);
        assert_eq!(meta.limit, 10);
        assert_eq!(meta.total_records, 100);
    }

    #[test]
    fn test_clamps_non_positive_values() {
        let req = PageRequest::new(0, -5);
        assert_eq!(req, PageRequest { page: 1, limit: 1 });
        assert_eq!(req.offset(), 0);

        let meta = paginate(-3, 0, 4);
        assert_eq!(meta.current_page, 1);
        assert_eq!(meta.limit, 1);
        assert_eq!(meta.total_pages, 4);
    }

    #[test]
    fn test_offset_saturates() {
        let req = PageRequest::new(i64::MAX, i64::MAX);
        assert_eq!(req.offset(), u64::MAX);
    }

    #[test]
    fn test_offset_and_pages_hold_across_range() {
        for page in 1..=5_i64 {
            for limit in 1..=7_i64 {
                for total in [0_u64, 1, 6, 7, 8, 35] {
                    let meta = paginate(page, limit, total);
                    assert_eq!(meta.skip, ((page - 1) * limit) as u64);
                    assert_eq!(meta.total_pages, total.div_ceil(limit as u64));
                }
            }
        }
    }
}
