use chrono::{DateTime, Utc};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Short date label such as `Mar 4`.
pub fn format_month_day(dt: DateTime<Utc>) -> String {
    dt.format("%b %-d").to_string()
}
