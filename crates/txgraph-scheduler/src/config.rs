//! Scheduler configuration

use crate::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Worker count used when the host parallelism cannot be queried
pub const DEFAULT_PARALLELISM: usize = 4;

/// Which execution driver consumes the partitioner output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Single-threaded priority reduction
    Sequential,
    /// Recursive fan-out over independent components and color phases
    #[default]
    FanOut,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::FanOut => write!(f, "fan_out"),
        }
    }
}

impl FromStr for Strategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "sync" => Ok(Strategy::Sequential),
            "fan_out" | "fan-out" | "fanout" | "async" => Ok(Strategy::FanOut),
            other => Err(SchedulerError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Execution driver
    #[serde(default)]
    pub strategy: Strategy,
    /// Upper bound on transactions executing at the same time
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
    /// Bounded wait on the registry lock, `None` blocks
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    /// Check graph and coloring invariants during a run
    #[serde(default = "default_validate_graph")]
    pub validate_graph: bool,
}

fn default_max_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_PARALLELISM)
}

fn default_validate_graph() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_parallelism: default_max_parallelism(),
            lock_timeout_ms: None,
            validate_graph: default_validate_graph(),
        }
    }
}

impl SchedulerConfig {
    /// Set the execution driver
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the concurrency bound
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    /// Set a bounded wait on the registry lock
    ///
    /// Rounded up to whole milliseconds, so a non-zero bound never
    /// becomes a zero wait.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.lock_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Registry lock bound, if any
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the drivers cannot run with
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.max_parallelism == 0 {
            return Err(SchedulerError::Config(
                "max_parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.strategy, Strategy::FanOut);
        assert!(config.max_parallelism >= 1);
        assert!(config.lock_timeout().is_none());
        assert!(config.validate_graph);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{ "strategy": "sequential", "lock_timeout_ms": 25 }"#).unwrap();

        assert_eq!(config.strategy, Strategy::Sequential);
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(25)));
        assert!(config.validate_graph);
        assert!(config.max_parallelism >= 1);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let config = SchedulerConfig::default().with_max_parallelism(0);
        assert!(matches!(config.validate(), Err(SchedulerError::Config(_))));
    }

    #[test]
    fn test_builder_methods() {
        let config = SchedulerConfig::default()
            .with_strategy(Strategy::Sequential)
            .with_max_parallelism(2)
            .with_lock_timeout(Duration::from_millis(7));

        assert_eq!(config.strategy, Strategy::Sequential);
        assert_eq!(config.max_parallelism, 2);
        assert_eq!(config.lock_timeout_ms, Some(7));
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let config = SchedulerConfig::default().with_lock_timeout(Duration::from_micros(500));
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(1)));

        let config = SchedulerConfig::default().with_lock_timeout(Duration::from_micros(1_001));
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(2)));

        let config = SchedulerConfig::default().with_lock_timeout(Duration::from_nanos(1));
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(1)));

        let config = SchedulerConfig::default().with_lock_timeout(Duration::ZERO);
        assert_eq!(config.lock_timeout(), Some(Duration::ZERO));
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("sequential".parse::<Strategy>().unwrap(), Strategy::Sequential);
        assert_eq!("Fan-Out".parse::<Strategy>().unwrap(), Strategy::FanOut);
        assert!("round_robin".parse::<Strategy>().is_err());

        for strategy in [Strategy::Sequential, Strategy::FanOut] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }
}
