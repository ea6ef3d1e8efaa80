//! Timeout values for blocking channel operations.
//!
//! A timeout is either a finite number of milliseconds or the infinite
//! sentinel. The sentinel is a distinct variant, never a very large duration,
//! so deadline arithmetic has to match on it explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Deadline applied to a single read or write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "TimeoutRepr", into = "TimeoutRepr")]
pub enum Timeout {
    /// Wait until the operation completes, however long that takes.
    #[default]
    Infinite,
    /// Give up after the given number of milliseconds.
    Millis(u64),
}

impl Timeout {
    /// Build a finite timeout from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self::Millis(ms)
    }

    /// Build a finite timeout from a `Duration`, truncated to whole milliseconds.
    pub fn from_duration(duration: Duration) -> Self {
        Self::Millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Returns `true` for the infinite sentinel.
    pub const fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// The finite duration, or `None` for the infinite sentinel.
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }

    /// Duration used in error reports. Infinite deadlines never expire, so
    /// reporting one is a logic error upstream; `Duration::MAX` marks it.
    pub(crate) fn reported(&self) -> Duration {
        self.as_duration().unwrap_or(Duration::MAX)
    }

    /// Drive `fut` to completion under this deadline.
    ///
    /// Returns `None` when the deadline expired first. In that case `fut` has
    /// already been dropped, which cancels whatever native operation it was
    /// waiting on.
    pub async fn bound<F: Future>(self, fut: F) -> Option<F::Output> {
        match self.as_duration() {
            None => Some(fut.await),
            Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "infinite"),
            Self::Millis(ms) => write!(f, "{ms}ms"),
        }
    }
}

/// On-disk form: an integer millisecond count or the word `"infinite"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TimeoutRepr {
    Millis(u64),
    Keyword(String),
}

impl TryFrom<TimeoutRepr> for Timeout {
    type Error = String;

    fn try_from(repr: TimeoutRepr) -> Result<Self, Self::Error> {
        match repr {
            TimeoutRepr::Millis(ms) => Ok(Self::Millis(ms)),
            TimeoutRepr::Keyword(word) => word.parse(),
        }
    }
}

impl From<Timeout> for TimeoutRepr {
    fn from(timeout: Timeout) -> Self {
        match timeout {
            Timeout::Infinite => Self::Keyword("infinite".to_string()),
            Timeout::Millis(ms) => Self::Millis(ms),
        }
    }
}

impl std::str::FromStr for Timeout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("infinite") || s == "-1" {
            return Ok(Self::Infinite);
        }
        s.trim_end_matches("ms")
            .parse::<u64>()
            .map(Self::Millis)
            .map_err(|_| format!("expected milliseconds or \"infinite\", got {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_is_default() {
        assert_eq!(Timeout::default(), Timeout::Infinite);
        assert!(Timeout::Infinite.is_infinite());
        assert_eq!(Timeout::Infinite.as_duration(), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("250".parse::<Timeout>().unwrap(), Timeout::Millis(250));
        assert_eq!("250ms".parse::<Timeout>().unwrap(), Timeout::Millis(250));
        assert_eq!("Infinite".parse::<Timeout>().unwrap(), Timeout::Infinite);
        assert_eq!("-1".parse::<Timeout>().unwrap(), Timeout::Infinite);
        assert!("soon".parse::<Timeout>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Timeout::Millis(200).to_string(), "200ms");
        assert_eq!(Timeout::Infinite.to_string(), "infinite");
    }

    #[test]
    fn test_toml_forms() {
        #[derive(Deserialize, Serialize)]
        struct Doc {
            a: Timeout,
            b: Timeout,
        }

        let doc: Doc = toml::from_str("a = 1000\nb = \"infinite\"").unwrap();
        assert_eq!(doc.a, Timeout::Millis(1000));
        assert_eq!(doc.b, Timeout::Infinite);

        let text = toml::to_string(&doc).unwrap();
        assert!(text.contains("a = 1000"));
        assert!(text.contains("b = \"infinite\""));
    }

    #[tokio::test]
    async fn test_bound_expires() {
        let outcome = Timeout::Millis(10)
            .bound(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_bound_infinite_completes() {
        let outcome = Timeout::Infinite.bound(async { 7 }).await;
        assert_eq!(outcome, Some(7));
    }
}
