use time::{Duration, OffsetDateTime};

/// Whether a record last refreshed at `last_updated` may still be served
/// from the local store.
pub fn is_fresh(last_updated: Option<OffsetDateTime>, ttl_days: i64) -> bool {
    is_fresh_at(OffsetDateTime::now_utc(), last_updated, ttl_days)
}

/// Same as [`is_fresh`] against an explicit clock. A record whose age equals
/// the TTL exactly is stale.
pub fn is_fresh_at(now: OffsetDateTime, last_updated: Option<OffsetDateTime>, ttl_days: i64) -> bool {
    match last_updated {
        Some(ts) => now - ts < Duration::days(ttl_days),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    #[test]
    fn absent_timestamp_is_stale() {
        assert!(!is_fresh_at(NOW, None, 30));
        assert!(!is_fresh(None, 30));
    }

    #[test]
    fn younger_than_ttl_is_fresh() {
        assert!(is_fresh_at(NOW, Some(NOW - Duration::days(29)), 30));
        assert!(is_fresh_at(NOW, Some(NOW - Duration::seconds(1)), 30));
        assert!(is_fresh_at(NOW, Some(NOW), 30));
    }

    #[test]
    fn exactly_at_ttl_is_stale() {
        assert!(!is_fresh_at(NOW, Some(NOW - Duration::days(30)), 30));
    }

    #[test]
    fn older_than_ttl_is_stale() {
        assert!(!is_fresh_at(NOW, Some(NOW - Duration::days(30) - Duration::milliseconds(1)), 30));
        assert!(!is_fresh_at(NOW, Some(datetime!(2020-01-01 0:00 UTC)), 30));
    }

    #[test]
    fn one_microsecond_inside_the_window_is_fresh() {
        let ts = NOW - Duration::days(30) + Duration::microseconds(1);
        assert!(is_fresh_at(NOW, Some(ts), 30));
    }

    #[test]
    fn zero_ttl_never_serves_from_cache() {
        assert!(!is_fresh_at(NOW, Some(NOW), 0));
    }

    #[test]
    fn wall_clock_variant_agrees_for_recent_records() {
        let recent = OffsetDateTime::now_utc() - Duration::hours(1);
        assert!(is_fresh(Some(recent), 30));
        let old = OffsetDateTime::now_utc() - Duration::days(31);
        assert!(!is_fresh(Some(old), 30));
    }
}
