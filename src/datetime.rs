use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse RFC 3339, a zone-less `YYYY-MM-DDTHH:MM[:SS]` or a bare
/// `YYYY-MM-DD`. Zone-less input is taken as UTC.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// en-US style date and time, e.g. `10/16/2026, 8:05:09 AM`.
pub(crate) fn format_local<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
