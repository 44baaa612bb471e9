use std::time::Duration;

use serde::Deserialize;

/// Default absolute wait for a response.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// How long a collection session waits, and what happens when it gives up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Absolute deadline, measured from the end of the interaction.
    #[serde(with = "secs_f64")]
    pub max_wait: Duration,
    /// Extra window re-armed every time the message count grows. May push the
    /// total wait past `max_wait`.
    #[serde(with = "opt_secs_f64")]
    pub wait_consecutive: Option<Duration>,
    /// Unmet expectations are returned as errors instead of logged.
    pub raise_on_timeout: bool,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            wait_consecutive: None,
            raise_on_timeout: true,
        }
    }
}

impl TimeoutPolicy {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            ..Self::default()
        }
    }

    pub fn with_wait_consecutive(mut self, window: Duration) -> Self {
        self.wait_consecutive = Some(window);
        self
    }

    pub fn without_raise(mut self) -> Self {
        self.raise_on_timeout = false;
        self
    }
}

/// Durations expressed as float seconds in config files.
pub(crate) mod secs_f64 {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod opt_secs_f64 {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(d)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.max_wait, Duration::from_secs(10));
        assert!(policy.wait_consecutive.is_none());
        assert!(policy.raise_on_timeout);
    }

    #[test]
    fn test_builder() {
        let policy = TimeoutPolicy::new(Duration::from_secs(5))
            .with_wait_consecutive(Duration::from_secs(2))
            .without_raise();
        assert_eq!(policy.max_wait, Duration::from_secs(5));
        assert_eq!(policy.wait_consecutive, Some(Duration::from_secs(2)));
        assert!(!policy.raise_on_timeout);
    }

    #[test]
    fn test_deserialize_float_seconds() {
        let policy: TimeoutPolicy =
            serde_json::from_str(r#"{"max_wait": 2.5, "wait_consecutive": 0.5}"#).unwrap();
        assert_eq!(policy.max_wait, Duration::from_millis(2500));
        assert_eq!(policy.wait_consecutive, Some(Duration::from_millis(500)));
        assert!(policy.raise_on_timeout);

        let policy: TimeoutPolicy = serde_json::from_str(r#"{"raise_on_timeout": false}"#).unwrap();
        assert_eq!(policy.max_wait, DEFAULT_MAX_WAIT);
        assert!(!policy.raise_on_timeout);
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<TimeoutPolicy>(r#"{"max_wait": -1}"#).is_err());
    }
}
