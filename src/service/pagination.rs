//! List pagination bounds.

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Validated pagination window. Only constructible through the clamping
/// constructors, so every value reaching a store is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: u32,
    offset: u64,
}

impl Pagination {
    /// `limit` is accepted only in `1..=100`, otherwise 10.
    /// `offset` is accepted only when non-negative, otherwise 0.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = limit
            .filter(|l| (1..=i64::from(MAX_LIMIT)).contains(l))
            .and_then(|l| u32::try_from(l).ok())
            .unwrap_or(DEFAULT_LIMIT);
        let offset = offset
            .and_then(|o| u64::try_from(o).ok())
            .unwrap_or(0);
        Self { limit, offset }
    }

    /// Parse raw query-string values. Unparseable input counts as absent.
    pub fn from_query(limit: Option<&str>, offset: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        Self::new(parse(limit), parse(offset))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
