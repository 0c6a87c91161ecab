//! Availability providers.
//!
//! Yield per-day working windows and the unavailability intervals inside
//! them. Days with no window or non-positive remaining duration are skipped
//! entirely by the packer.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::types::{DailyAvailability, Technician, TechnicianUnavailability};

pub trait AvailabilityProvider: Send + Sync {
    /// The working window for `day_number` (1-based), or `None` for an off
    /// day.
    fn daily_availability(
        &self,
        technician: &Technician,
        day_number: u32,
    ) -> Option<DailyAvailability>;

    /// Unavailability intervals falling inside that day's window, passed
    /// verbatim to the optimiser.
    fn unavailabilities(
        &self,
        technician: &Technician,
        day_number: u32,
    ) -> Vec<TechnicianUnavailability>;
}

/// Calendar with one weekday window shared by all technicians, weekends off.
pub struct WorkdayCalendar {
    base_date: NaiveDate,
    workday_start: NaiveTime,
    workday_end: NaiveTime,
    unavailabilities: Vec<TechnicianUnavailability>,
}

impl WorkdayCalendar {
    pub fn new(
        base_date: NaiveDate,
        workday_start: NaiveTime,
        workday_end: NaiveTime,
        unavailabilities: Vec<TechnicianUnavailability>,
    ) -> Self {
        Self {
            base_date,
            workday_start,
            workday_end,
            unavailabilities,
        }
    }

    fn date_for_day(&self, day_number: u32) -> NaiveDate {
        self.base_date + Duration::days(i64::from(day_number) - 1)
    }
}

impl AvailabilityProvider for WorkdayCalendar {
    fn daily_availability(
        &self,
        technician: &Technician,
        day_number: u32,
    ) -> Option<DailyAvailability> {
        let date = self.date_for_day(day_number);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return None;
        }

        let start_time = Utc.from_utc_datetime(&date.and_time(self.workday_start));
        let end_time = Utc.from_utc_datetime(&date.and_time(self.workday_end));
        if end_time <= start_time {
            return None;
        }

        let deducted: Duration = self
            .unavailabilities(technician, day_number)
            .iter()
            .fold(Duration::zero(), |acc, interval| {
                acc + Duration::seconds(interval.duration_seconds)
            });

        Some(DailyAvailability {
            day_number,
            start_time,
            end_time,
            total_duration: end_time - start_time - deducted,
        })
    }

    fn unavailabilities(
        &self,
        technician: &Technician,
        day_number: u32,
    ) -> Vec<TechnicianUnavailability> {
        let date = self.date_for_day(day_number);
        let day_start = Utc.from_utc_datetime(&date.and_time(self.workday_start));
        let day_end = Utc.from_utc_datetime(&date.and_time(self.workday_end));

        self.unavailabilities
            .iter()
            .filter(|interval| {
                interval.technician_id == technician.id
                    && interval.start_time >= day_start
                    && interval.end_time() <= day_end
            })
            .cloned()
            .collect()
    }
}
