//! Borrowed pool connections with leak reporting
//!
//! A [`Lease`] is held for the duration of one store operation. When it is
//! returned to the pool after longer than the configured threshold, a
//! warning names the operation that held it.

use r2d2::PooledConnection;
use r2d2_mysql::mysql::Conn;
use r2d2_mysql::MySqlConnectionManager;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::warn;

/// Tracks how long a connection has been out of the pool
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeakWatch {
    operation: &'static str,
    acquired: Instant,
    threshold: Duration,
}

impl LeakWatch {
    pub(crate) fn start(operation: &'static str, threshold: Duration) -> Self {
        Self {
            operation,
            acquired: Instant::now(),
            threshold,
        }
    }

    /// Time held, if it exceeds the threshold
    pub(crate) fn overdue(&self, now: Instant) -> Option<Duration> {
        let held = now.saturating_duration_since(self.acquired);
        (held > self.threshold).then_some(held)
    }
}

/// One pooled connection, returned to the pool on drop
pub struct Lease {
    conn: PooledConnection<MySqlConnectionManager>,
    watch: LeakWatch,
}

impl Lease {
    pub(crate) fn new(
        conn: PooledConnection<MySqlConnectionManager>,
        operation: &'static str,
        threshold: Duration,
    ) -> Self {
        Self {
            conn,
            watch: LeakWatch::start(operation, threshold),
        }
    }
}

impl Deref for Lease {
    type Target = Conn;

    fn deref(&self) -> &Conn {
        &self.conn
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(held) = self.watch.overdue(Instant::now()) {
            warn!(
                operation = self.watch.operation,
                held = ?held,
                threshold = ?self.watch.threshold,
                "connection held past leak detection threshold"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_overdue_within_threshold() {
        let watch = LeakWatch::start("get", Duration::from_secs(10));
        let now = watch.acquired + Duration::from_secs(9);
        assert_eq!(watch.overdue(now), None);
    }

    #[test]
    fn test_overdue_keeps_sub_millisecond_precision() {
        let watch = LeakWatch::start("balances", Duration::from_millis(1));
        let held = Duration::from_micros(1_500);
        assert_eq!(watch.overdue(watch.acquired + held), Some(held));
    }

    #[test]
    fn test_overdue_past_threshold() {
        let watch = LeakWatch::start("transfer", Duration::from_millis(100));
        let now = watch.acquired + Duration::from_millis(250);
        assert_eq!(watch.overdue(now), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_clock_before_acquire_is_not_overdue() {
        let watch = LeakWatch::start("set", Duration::ZERO);
        assert_eq!(watch.overdue(watch.acquired), None);
    }
}
