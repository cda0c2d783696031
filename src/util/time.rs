use chrono::{DateTime, Utc};

/// Human-readable age of `then` relative to `now`, e.g. "3 hours ago".
///
/// Future timestamps (clock skew) read as "just now".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    let minutes = secs / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let (n, unit) = if secs < 60 {
        (secs, "second")
    } else if minutes < 60 {
        (minutes, "minute")
    } else if hours < 24 {
        (hours, "hour")
    } else if days < 7 {
        (days, "day")
    } else if days / 7 < 4 {
        (days / 7, "week")
    } else if days / 30 < 12 {
        ((days / 30).max(1), "month")
    } else {
        (days / 365, "year")
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ago(d: Duration) -> String {
        let now = Utc::now();
        relative_time(now - d, now)
    }

    #[test]
    fn test_units_and_plurals() {
        assert_eq!(ago(Duration::seconds(1)), "1 second ago");
        assert_eq!(ago(Duration::seconds(59)), "59 seconds ago");
        assert_eq!(ago(Duration::minutes(1)), "1 minute ago");
        assert_eq!(ago(Duration::hours(5)), "5 hours ago");
        assert_eq!(ago(Duration::days(6)), "6 days ago");
        assert_eq!(ago(Duration::days(7)), "1 week ago");
        assert_eq!(ago(Duration::days(27)), "3 weeks ago");
        assert_eq!(ago(Duration::days(28)), "1 month ago");
        assert_eq!(ago(Duration::days(60)), "2 months ago");
        assert_eq!(ago(Duration::days(400)), "1 year ago");
    }

    #[test]
    fn test_future_is_just_now() {
        let now = Utc::now();
        assert_eq!(relative_time(now + Duration::minutes(2), now), "just now");
    }
}
