use chrono::NaiveDate;

/// Average month length in days, as used for age in months.
const DAYS_PER_MONTH: f64 = 30.4375;

/// Average year length in days.
const DAYS_PER_YEAR: f64 = 365.25;

/// Parse a date as OSM sends it: `YYYY-MM-DD` (optionally followed by a time)
/// or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Age in fractional years.
pub fn age_in_years(dob: NaiveDate, today: NaiveDate) -> f64 {
    days_between(dob, today) as f64 / DAYS_PER_YEAR
}

/// Age in whole months, `None` for dates in the future.
pub fn age_in_months(dob: NaiveDate, today: NaiveDate) -> Option<i64> {
    let days = days_between(dob, today);
    if days < 0 {
        return None;
    }
    Some((days as f64 / DAYS_PER_MONTH).floor() as i64)
}

/// `dd/mm/yy`, the short UK form used in listings.
pub fn format_short(date: NaiveDate) -> String {
    date.format("%d/%m/%y").to_string()
}
