//! Time-of-day trigger for the daily summary
//!
//! The monitor sleeps until the next occurrence of the configured local hour,
//! fires, and then computes the following occurrence.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};

use super::error::{MonitorError, MonitorResult};

/// Fires once per day at a fixed local hour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    hour: u32,
}

impl DailyTrigger {
    /// Create a trigger for `hour` (0-23) local time
    pub fn new(hour: u32) -> MonitorResult<Self> {
        if hour > 23 {
            return Err(MonitorError::invalid_hour(hour));
        }
        Ok(Self { hour })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    fn fire_time(&self) -> MonitorResult<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, 0, 0)
            .ok_or_else(|| MonitorError::invalid_hour(self.hour))
    }

    /// Resolve `date` at the trigger hour in the given zone
    ///
    /// A skipped local time (DST gap) resolves to one hour later.
    fn resolve_on<Tz: TimeZone>(&self, zone: &Tz, date: NaiveDate) -> MonitorResult<DateTime<Tz>> {
        let naive = date.and_time(self.fire_time()?);
        zone.from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                zone.from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .ok_or_else(|| {
                MonitorError::trigger_config("daily_summary_hour", format!("no local time for {naive}"))
            })
    }

    /// Next fire time strictly after `now`
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> MonitorResult<DateTime<Tz>> {
        let zone = now.timezone();
        let today = now.date_naive();
        let candidate = self.resolve_on(&zone, today)?;
        if candidate > *now {
            return Ok(candidate);
        }
        self.resolve_on(&zone, today + Duration::days(1))
    }

    /// How long to sleep from `now` until the next fire
    pub fn duration_until<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> MonitorResult<std::time::Duration> {
        let next = self.next_after(now)?;
        let delta = next.signed_duration_since(now.clone());
        Ok(delta.to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// Sleep duration from the current local time
    pub fn duration_until_next(&self) -> MonitorResult<std::time::Duration> {
        self.duration_until(&Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    #[test]
    fn test_rejects_invalid_hour() {
        assert!(DailyTrigger::new(23).is_ok());
        assert!(matches!(
            DailyTrigger::new(24),
            Err(MonitorError::InvalidHour { hour: 24 })
        ));
    }

    #[test]
    fn test_next_after_later_today() {
        let trigger = DailyTrigger::new(20).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let next = trigger.next_after(&now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_next_after_rolls_to_tomorrow() {
        let trigger = DailyTrigger::new(20).unwrap();

        let at_fire = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let next = trigger.next_after(&at_fire).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 2, 20, 0, 0).unwrap());

        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        let next = trigger.next_after(&late).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_duration_until() {
        let trigger = DailyTrigger::new(0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        assert_eq!(
            trigger.duration_until(&now).unwrap(),
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_local_next_is_on_the_hour() {
        let trigger = DailyTrigger::new(20).unwrap();
        let next = trigger.next_after(&Local::now()).unwrap();
        assert!(next > Local::now());
        assert_eq!(next.minute(), 0);
        assert!(trigger.duration_until_next().unwrap() <= std::time::Duration::from_secs(25 * 3600));
    }
}
