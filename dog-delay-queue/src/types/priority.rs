use serde::{Deserialize, Serialize};
use std::fmt;

/// Conventional priority levels (Higher values = higher priority)
///
/// These are the default lanes of a `QueueConfig`. A channel may be configured
/// with any other ordered set of lane names; this enum only names the common
/// case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobPriority {
    /// Low priority jobs (processed last)
    Low = 1,

    /// Normal priority jobs (default)
    Normal = 2,

    /// High priority jobs
    High = 3,

    /// Critical priority jobs (processed first)
    Critical = 4,
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl JobPriority {
    /// All levels in dispatch order (highest precedence first)
    pub fn dispatch_order() -> &'static [JobPriority] {
        &[Self::Critical, Self::High, Self::Normal, Self::Low]
    }

    /// Get human-readable name, which is also the lane name
    pub fn name(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Name of a priority lane
///
/// Lanes are plain names; precedence comes from their position in the
/// configured lane list, not from the name itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lane(String);

impl Lane {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Lane {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Lane {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<JobPriority> for Lane {
    fn from(priority: JobPriority) -> Self {
        Self(priority.name().to_string())
    }
}

impl AsRef<str> for Lane {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_order_is_highest_first() {
        let order = JobPriority::dispatch_order();
        assert!(order.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn priorities_convert_to_lanes_by_name() {
        assert_eq!(Lane::from(JobPriority::Critical).as_str(), "critical");
        assert_eq!("HIGH".parse::<JobPriority>().unwrap(), JobPriority::High);
        assert!("urgent".parse::<JobPriority>().is_err());
    }
}
