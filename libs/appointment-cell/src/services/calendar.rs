// libs/appointment-cell/src/services/calendar.rs
//
// Clinic-local calendar arithmetic and ticket formatting.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use crate::models::DayWindow;

/// UTC instant of `00:00:00.000` on `date` in the clinic-local calendar.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

pub fn day_window(date: NaiveDate, offset: FixedOffset) -> DayWindow {
    let start = local_midnight(date, offset);
    DayWindow {
        start,
        end: start + Duration::days(1) - Duration::milliseconds(1),
    }
}

pub fn local_today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

pub fn local_date_of(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// `{code}-{DD-MM-YYYY}-` for an appointment stored at `preferred_date`.
///
/// Day and month come from the UTC instant while the year comes from the
/// clinic-local date. Issued tokens depend on this mix, so it must not be
/// normalised.
pub fn token_prefix(clinic_code: &str, preferred_date: DateTime<Utc>, offset: FixedOffset) -> String {
    let local_year = local_date_of(preferred_date, offset).year();
    format!(
        "{}-{:02}-{:02}-{}-",
        clinic_code,
        preferred_date.day(),
        preferred_date.month(),
        local_year
    )
}

pub fn appointment_token(clinic_code: &str, preferred_date: DateTime<Utc>, offset: FixedOffset, number: u32) -> String {
    format!("{}{}", token_prefix(clinic_code, preferred_date, offset), number)
}
