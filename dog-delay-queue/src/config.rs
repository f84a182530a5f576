use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{JobPriority, Lane};
use crate::{QueueError, QueueResult};

/// Where a freshly enqueued ready job lands in its lane
///
/// Swept jobs (delay elapsed, lease lapsed) always go to the far end of the
/// lane, behind everything already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Fresh jobs are pushed at the pop end: newest ready job is dispatched first
    #[default]
    Lifo,
    /// Fresh jobs queue behind everything already waiting
    Fifo,
}

/// Moving-lease timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Self-expiry of the lock key
    pub ttl: Duration,
    /// First sleep between blocking acquisition attempts
    pub initial_backoff: Duration,
    /// Upper bound on the sleep between attempts
    pub max_backoff: Duration,
    /// Give up blocking acquisition after this long; `None` waits forever
    pub wait_limit: Option<Duration>,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            wait_limit: None,
        }
    }
}

impl LeaseConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_wait_limit(mut self, limit: Duration) -> Self {
        self.wait_limit = Some(limit);
        self
    }
}

/// Configuration for one queue channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Key namespace shared by every engine instance of this queue
    pub channel: String,
    /// Lane names, highest precedence first
    pub lanes: Vec<String>,
    /// Lane used when a message names none
    pub default_lane: String,
    /// TTR used when a message names none
    pub default_ttr: Duration,
    pub dispatch_order: DispatchOrder,
    pub lease: LeaseConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            channel: "queue".to_string(),
            lanes: JobPriority::dispatch_order()
                .iter()
                .map(|p| p.name().to_string())
                .collect(),
            default_lane: JobPriority::default().name().to_string(),
            default_ttr: Duration::from_secs(300), // 5 minutes
            dispatch_order: DispatchOrder::default(),
            lease: LeaseConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the lanes, highest precedence first
    ///
    /// If the current default lane is not among them, the first lane becomes
    /// the default.
    pub fn with_lanes<I, L>(mut self, lanes: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Lane>,
    {
        self.lanes = lanes
            .into_iter()
            .map(|lane| lane.into().as_str().to_string())
            .collect();
        if !self.lanes.contains(&self.default_lane) {
            if let Some(first) = self.lanes.first() {
                self.default_lane = first.clone();
            }
        }
        self
    }

    pub fn with_default_lane(mut self, lane: impl Into<Lane>) -> Self {
        self.default_lane = lane.into().as_str().to_string();
        self
    }

    pub fn with_default_ttr(mut self, ttr: Duration) -> Self {
        self.default_ttr = ttr;
        self
    }

    pub fn with_dispatch_order(mut self, order: DispatchOrder) -> Self {
        self.dispatch_order = order;
        self
    }

    pub fn with_lease(mut self, lease: LeaseConfig) -> Self {
        self.lease = lease;
        self
    }

    /// Whether `lane` is one of the configured lanes
    pub fn has_lane(&self, lane: &str) -> bool {
        self.lanes.iter().any(|l| l == lane)
    }

    /// Check the config before any engine uses it
    pub fn validate(&self) -> QueueResult<()> {
        if self.channel.trim().is_empty() {
            return Err(QueueError::Configuration("channel must not be empty".to_string()));
        }
        if self.lanes.is_empty() {
            return Err(QueueError::Configuration("at least one lane is required".to_string()));
        }

        let mut seen = HashSet::new();
        for lane in &self.lanes {
            if lane.trim().is_empty() {
                return Err(QueueError::Configuration("lane names must not be empty".to_string()));
            }
            if !seen.insert(lane.as_str()) {
                return Err(QueueError::Configuration(format!("duplicate lane: {}", lane)));
            }
        }

        if !self.has_lane(&self.default_lane) {
            return Err(QueueError::Configuration(format!(
                "default lane {} is not a configured lane",
                self.default_lane
            )));
        }
        if self.lease.ttl.as_millis() == 0 {
            return Err(QueueError::Configuration("lease ttl must be at least 1ms".to_string()));
        }
        if self.lease.initial_backoff > self.lease.max_backoff {
            return Err(QueueError::Configuration(
                "lease initial_backoff exceeds max_backoff".to_string(),
            ));
        }
        Ok(())
    }

    /// Defaults overlaid with `{prefix}CHANNEL`, `{prefix}LANES`,
    /// `{prefix}DEFAULT_LANE` and `{prefix}DEFAULT_TTR_SECS`
    pub fn from_env(prefix: &str) -> QueueResult<Self> {
        Self::from_vars(prefix, std::env::vars())
    }

    fn from_vars<I>(prefix: &str, vars: I) -> QueueResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        let mut default_lane = None;

        for (key, value) in vars {
            let Some(name) = key.strip_prefix(prefix) else {
                continue;
            };
            match name {
                "CHANNEL" => config.channel = value,
                "LANES" => {
                    let lanes: Vec<String> = value
                        .split(',')
                        .map(|lane| lane.trim().to_string())
                        .filter(|lane| !lane.is_empty())
                        .collect();
                    config = config.with_lanes(lanes);
                }
                "DEFAULT_LANE" => default_lane = Some(value),
                "DEFAULT_TTR_SECS" => {
                    let secs = value.trim().parse::<u64>().map_err(|_| {
                        QueueError::Configuration(format!("{}DEFAULT_TTR_SECS is not an integer: {}", prefix, value))
                    })?;
                    config.default_ttr = Duration::from_secs(secs);
                }
                _ => {}
            }
        }

        // Applied last so it wins over the fallback chosen by `with_lanes`
        if let Some(lane) = default_lane {
            config.default_lane = lane;
        }

        config.validate()?;
        Ok(config)
    }
}
