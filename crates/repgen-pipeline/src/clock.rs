use chrono::{DateTime, Utc};

/// Source of "now" for report ids and timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Makes assembled documents reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn from_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `report_<unix-millis>`.
pub fn report_id_at(at: DateTime<Utc>) -> String {
    format!("report_{}", at.timestamp_millis())
}

/// ISO-8601 in UTC with microseconds and a trailing `Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_formats() {
        let clock = FixedClock::from_millis(1_718_000_000_123);
        assert_eq!(report_id_at(clock.now()), "report_1718000000123");
        assert_eq!(iso_timestamp(clock.now()), "2024-06-10T06:13:20.123000Z");
    }

    #[test]
    fn system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
