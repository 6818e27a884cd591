//! Session configuration

use crate::pool::DEFAULT_MIN_WORKERS;

/// Configuration options for a [`SignalSession`]
///
/// [`SignalSession`]: crate::session::SignalSession
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Floor of live workers in the dispatch pool
    pub min_workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_workers: DEFAULT_MIN_WORKERS,
        }
    }
}

impl SessionConfig {
    /// Set the dispatch pool worker floor
    pub fn min_workers(mut self, min_workers: usize) -> Self {
        self.min_workers = min_workers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();

        assert_eq!(config.min_workers, DEFAULT_MIN_WORKERS);
    }

    #[test]
    fn test_builder_min_workers() {
        let config = SessionConfig::default().min_workers(2);

        assert_eq!(config.min_workers, 2);
    }
}
