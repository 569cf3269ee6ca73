//! Capacidad cron: expresión + instante → próximo disparo.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::errors::ScheduleError;

pub trait CronParser: Send + Sync {
    /// Primer disparo estrictamente posterior a `after`.
    fn next_fire_time(&self, expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError>;

    fn validate(&self, expr: &str) -> Result<(), ScheduleError> {
        self.next_fire_time(expr, Utc::now()).map(|_| ())
    }
}

/// Parser sobre el crate `cron`. Acepta la forma estándar de 5 campos
/// (minuto hora día mes día-semana) y la extendida con segundos.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCron;

impl StandardCron {
    fn parse(expr: &str) -> Result<Schedule, ScheduleError> {
        let trimmed = expr.trim();
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron(e.to_string()))
    }
}

impl CronParser for StandardCron {
    fn next_fire_time(&self, expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        Self::parse(expr)?.after(&after)
                          .next()
                          .ok_or_else(|| ScheduleError::Exhausted(expr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn five_field_expressions_fire_on_the_minute() {
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 6, 59, 30).unwrap();
        let next = StandardCron.next_fire_time("* 7 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap());
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn next_fire_is_strictly_after() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let next = StandardCron.next_fire_time("0 * * * * *", at).unwrap();
        assert_eq!(next, at + chrono::Duration::minutes(1));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(StandardCron.validate("not a cron"), Err(ScheduleError::InvalidCron(_))));
        assert!(StandardCron.validate("* * * * * * * * *").is_err());
    }
}
