//! Repository ports (interfaces), one per aggregate.
//! These keep the runner and the HTTP layer independent of the storage
//! adapter; implementations live under `database::infrastructure`.

pub mod checks;
pub mod findings;
pub mod providers;
pub mod scans;

pub use checks::CheckRepository;
pub use findings::FindingRepository;
pub use providers::ProviderRepository;
pub use scans::ScanRepository;

/// Limit/offset window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp the limit into `1..=MAX_LIMIT`.
    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }

    /// Window large enough to cover every row; used by internal callers.
    pub fn unbounded() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }

    pub(crate) fn window<T>(&self, rows: impl Iterator<Item = T>) -> Vec<T> {
        rows.skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(PageRequest::new(0, 0).limit, 1);
        assert_eq!(PageRequest::new(500, 0).limit, PageRequest::MAX_LIMIT);
    }

    #[test]
    fn window_skips_then_takes() {
        let page = PageRequest::new(2, 1);
        assert_eq!(page.window(1..=5), vec![2, 3]);
    }
}
