//! Pagination and sort parameters shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Smallest page number.
pub const MIN_PAGE: i64 = 1;
/// Smallest page size.
pub const MIN_LIMIT: i64 = 3;

/// Normalized paging and sorting input.
///
/// `order_by` and `sort` are raw client strings here; the query builder
/// resolves them against a whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    pub order_by: String,
    pub sort: String,
}

impl PageRequest {
    /// Clamp `page` to at least 1 and `limit` to at least 3.
    #[must_use]
    pub fn clamped(
        page: Option<i64>,
        limit: Option<i64>,
        order_by: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        Self {
            page: page.unwrap_or(MIN_PAGE).max(MIN_PAGE),
            limit: limit.unwrap_or(MIN_LIMIT).max(MIN_LIMIT),
            order_by: order_by.unwrap_or_default().to_owned(),
            sort: sort.unwrap_or_default().to_owned(),
        }
    }

    /// Rows skipped before this page, saturating at `i64::MAX`.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_page: i64,
    pub total_item: i64,
}

impl<T> Paginated<T> {
    /// Wrap a page of rows with the total row count.
    #[must_use]
    pub fn new(data: Vec<T>, request: &PageRequest, total_item: i64) -> Self {
        let total_page = total_item / request.limit + i64::from(total_item % request.limit != 0);
        Self {
            data,
            page: request.page,
            limit: request.limit,
            total_page,
            total_item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_below_one_clamped() {
        for page in [-5, 0] {
            assert_eq!(PageRequest::clamped(Some(page), None, None, None).page, 1);
        }
        assert_eq!(PageRequest::clamped(Some(4), None, None, None).page, 4);
    }

    #[test]
    fn test_limit_below_three_clamped() {
        for limit in [-1, 0, 1, 2] {
            assert_eq!(PageRequest::clamped(None, Some(limit), None, None).limit, 3);
        }
        assert_eq!(PageRequest::clamped(None, Some(20), None, None).limit, 20);
    }

    #[test]
    fn test_offset() {
        let request = PageRequest::clamped(Some(3), Some(10), None, None);
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn test_total_page_rounds_up() {
        let request = PageRequest::clamped(Some(1), Some(3), None, None);
        let page = Paginated::new(vec![1, 2, 3], &request, 7);
        assert_eq!(page.total_page, 3);
        assert_eq!(page.total_item, 7);

        let empty: Paginated<i32> = Paginated::new(Vec::new(), &request, 0);
        assert_eq!(empty.total_page, 0);
    }

    #[test]
    fn test_extreme_page_and_limit_saturate() {
        let far = PageRequest::clamped(Some(i64::MAX), Some(10), None, None);
        assert_eq!(far.offset(), i64::MAX);

        let huge = PageRequest::clamped(Some(1), Some(i64::MAX), None, None);
        assert_eq!(huge.offset(), 0);
        let page = Paginated::new(vec![1], &huge, 5);
        assert_eq!(page.total_page, 1);

        let both = PageRequest::clamped(Some(i64::MAX), Some(i64::MAX), None, None);
        assert_eq!(both.offset(), i64::MAX);
        let page: Paginated<i32> = Paginated::new(Vec::new(), &both, i64::MAX);
        assert_eq!(page.total_page, 1);
    }
}
