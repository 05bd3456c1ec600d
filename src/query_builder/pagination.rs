use serde::{Deserialize, Serialize};

/// Represents pagination parameters for SQL queries and in-memory slices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Pagination {
    /// Create pagination with page number and per-page count
    pub fn new(page: u32, per_page: u32) -> Self {
        let offset = if page > 0 {
            Some((page - 1).saturating_mul(per_page))
        } else {
            None
        };
        Self {
            limit: Some(per_page),
            offset,
        }
    }

    /// Create pagination with only limit
    pub fn limit_only(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Calculate total pages given a total count
    pub fn total_pages(&self, total_count: u64) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => total_count.div_ceil(u64::from(limit)),
            _ => 1,
        }
    }

    /// Get current page number (1-indexed)
    pub fn current_page(&self) -> u32 {
        if let (Some(limit), Some(offset)) = (self.limit, self.offset) {
            if limit > 0 {
                return (offset / limit) + 1;
            }
        }
        1
    }

    /// Check if there's a next page
    pub fn has_next_page(&self, total_count: u64) -> bool {
        if let (Some(limit), Some(offset)) = (self.limit, self.offset) {
            u64::from(offset) + u64::from(limit) < total_count
        } else {
            false
        }
    }

    /// Check if there's a previous page
    pub fn has_previous_page(&self) -> bool {
        self.offset.is_some_and(|offset| offset > 0)
    }

    /// Take this page out of an already materialized sequence
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0) as usize;
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }

    pub fn page_info(&self, total_count: u64) -> PageInfo {
        PageInfo {
            current_page: self.current_page(),
            per_page: self.limit.unwrap_or(0),
            total: total_count,
            last_page: self.total_pages(total_count).max(1),
            has_next_page: self.has_next_page(total_count),
            has_previous_page: self.has_previous_page(),
        }
    }
}

/// Page metadata returned alongside listing results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_based_pagination() {
        let pagination = Pagination::new(2, 10); // Page 2, 10 per page
        assert_eq!(pagination.limit, Some(10));
        assert_eq!(pagination.offset, Some(10));
    }

    #[test]
    fn test_total_pages_calculation() {
        let pagination = Pagination::new(1, 10);
        assert_eq!(pagination.total_pages(25), 3); // 25 items, 10 per page = 3 pages
        assert_eq!(pagination.total_pages(30), 3);
        assert_eq!(pagination.total_pages(31), 4);
    }

    #[test]
    fn test_current_page() {
        let pagination = Pagination::new(3, 10);
        assert_eq!(pagination.current_page(), 3);
    }

    #[test]
    fn test_has_next_page() {
        let pagination = Pagination::new(2, 10); // offset 10
        assert!(pagination.has_next_page(25));
        assert!(!pagination.has_next_page(20));
    }

    #[test]
    fn test_has_previous_page() {
        assert!(!Pagination::new(1, 10).has_previous_page());
        assert!(Pagination::new(2, 10).has_previous_page());
    }

    #[test]
    fn test_slice_in_memory() {
        let items: Vec<u32> = (1..=12).collect();
        assert_eq!(Pagination::new(1, 5).slice(items.clone()), vec![1, 2, 3, 4, 5]);
        assert_eq!(Pagination::new(3, 5).slice(items.clone()), vec![11, 12]);
        assert!(Pagination::new(4, 5).slice(items).is_empty());
    }

    #[test]
    fn test_page_info_for_empty_result() {
        let info = Pagination::new(1, 15).page_info(0);
        assert_eq!(info.last_page, 1);
        assert_eq!(info.total, 0);
        assert!(!info.has_next_page);
    }
}
