use crate::services::error::{StorageError, StorageResult};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window upload counter per principal.
///
/// Shared process-wide through `AppState`; a limit of zero disables it.
#[derive(Debug)]
pub struct UploadRateLimiter {
    limit: u32,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl UploadRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    pub fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }

    /// Records an upload attempt, or fails with `RateLimited` if the principal
    /// already used its allowance within the window.
    pub fn check(&self, principal: &str) -> StorageResult<()> {
        if self.limit == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let mut hits = self.hits.entry(principal.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.limit as usize {
            let retry_after = hits
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(StorageError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        hits.push_back(now);
        Ok(())
    }

    pub fn reset(&self, principal: &str) {
        self.hits.remove(principal);
    }

    /// Drops principals with no attempts inside the window.
    pub fn purge(&self) {
        let now = Instant::now();
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|t| now.duration_since(*t) < self.window)
        });
    }

    pub fn tracked_principals(&self) -> usize {
        self.hits.len()
    }
}
