//! Communication health tracking.
//!
//! [`CommMonitor`] ages the time since the last inbound line into a
//! [`MonitorStatus`]. It is driven from two sides: every processed line
//! calls [`record_activity`](CommMonitor::record_activity), and the poll
//! task calls [`evaluate`](CommMonitor::evaluate) once per interval.
//! [`start`](CommMonitor::start) opens the silence window when polling
//! begins, so a display that never answers still ages into an error.

use std::time::Duration;

use tokio::time::Instant;

use planar_core::types::MonitorStatus;

/// Silence after which the monitor reports [`MonitorStatus::Warning`].
pub const DEFAULT_WARNING_AFTER: Duration = Duration::from_millis(180_000);

/// Silence after which the monitor reports [`MonitorStatus::Error`].
pub const DEFAULT_ERROR_AFTER: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone)]
pub struct CommMonitor {
    status: MonitorStatus,
    last_activity: Option<Instant>,
    warning_after: Duration,
    error_after: Duration,
}

impl Default for CommMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_AFTER, DEFAULT_ERROR_AFTER)
    }
}

impl CommMonitor {
    pub fn new(warning_after: Duration, error_after: Duration) -> Self {
        CommMonitor {
            status: MonitorStatus::Unknown,
            last_activity: None,
            warning_after,
            error_after,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.status
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Begin watching at `now`. Silence is counted from here until the
    /// first line arrives. Has no effect once activity has been seen.
    pub fn start(&mut self, now: Instant) {
        self.last_activity.get_or_insert(now);
    }

    /// A line arrived at `now`. Returns the new status if it changed.
    pub fn record_activity(&mut self, now: Instant) -> Option<MonitorStatus> {
        self.last_activity = Some(now);
        self.set(MonitorStatus::Ok)
    }

    /// Re-grade the silence as of `now`. Returns the new status if it changed.
    pub fn evaluate(&mut self, now: Instant) -> Option<MonitorStatus> {
        let last = self.last_activity?;
        let silence = now.saturating_duration_since(last);
        let next = if silence >= self.error_after {
            MonitorStatus::Error
        } else if silence >= self.warning_after {
            MonitorStatus::Warning
        } else {
            MonitorStatus::Ok
        };
        self.set(next)
    }

    fn set(&mut self, next: MonitorStatus) -> Option<MonitorStatus> {
        if next == self.status {
            return None;
        }
        self.status = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_until_first_line() {
        let mut m = CommMonitor::default();
        assert_eq!(m.status(), MonitorStatus::Unknown);
        assert!(!m.is_online());
        assert_eq!(m.evaluate(Instant::now() + Duration::from_secs(600)), None);
        assert_eq!(m.status(), MonitorStatus::Unknown);
    }

    #[test]
    fn silent_display_ages_from_start() {
        let mut m = CommMonitor::default();
        let t0 = Instant::now();
        m.start(t0);
        assert_eq!(m.status(), MonitorStatus::Unknown);

        assert_eq!(m.evaluate(t0 + Duration::from_secs(10)), Some(MonitorStatus::Ok));
        assert_eq!(
            m.evaluate(t0 + Duration::from_secs(180)),
            Some(MonitorStatus::Warning)
        );
        assert_eq!(
            m.evaluate(t0 + Duration::from_secs(300)),
            Some(MonitorStatus::Error)
        );
        assert!(!m.is_online());
    }

    #[test]
    fn start_keeps_earlier_activity() {
        let mut m = CommMonitor::default();
        let t0 = Instant::now();
        m.record_activity(t0);
        m.start(t0 + Duration::from_secs(100));
        assert_eq!(m.last_activity(), Some(t0));
    }

    #[test]
    fn ages_through_levels() {
        let mut m = CommMonitor::default();
        let t0 = Instant::now();
        assert_eq!(m.record_activity(t0), Some(MonitorStatus::Ok));
        assert!(m.is_online());

        assert_eq!(m.evaluate(t0 + Duration::from_secs(179)), None);
        assert_eq!(
            m.evaluate(t0 + Duration::from_secs(180)),
            Some(MonitorStatus::Warning)
        );
        assert!(m.is_online());
        assert_eq!(
            m.evaluate(t0 + Duration::from_secs(300)),
            Some(MonitorStatus::Error)
        );
        assert!(!m.is_online());
    }

    #[test]
    fn activity_restores_ok() {
        let mut m = CommMonitor::new(Duration::from_secs(1), Duration::from_secs(2));
        let t0 = Instant::now();
        m.record_activity(t0);
        m.evaluate(t0 + Duration::from_secs(5));
        assert_eq!(m.status(), MonitorStatus::Error);

        let t1 = t0 + Duration::from_secs(6);
        assert_eq!(m.record_activity(t1), Some(MonitorStatus::Ok));
        assert_eq!(m.record_activity(t1), None);
        assert_eq!(m.last_activity(), Some(t1));
    }
}
