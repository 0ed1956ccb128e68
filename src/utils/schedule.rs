use chrono::{DateTime, Duration, Months, Timelike, Utc};

/// Weekly step between occurrences of a recurring series.
pub const WEEK: Duration = Duration::days(7);

/// Recurring occurrences are materialized up to this many calendar months
/// ahead of the seed (or of "now" for the extension job).
pub const SERIES_HORIZON_MONTHS: u32 = 3;

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
/// Back-to-back lessons (one ending exactly when the next starts) do not conflict.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Horizon for series generation: `from` plus three calendar months.
/// Month arithmetic, not a day count: the day-of-month is clamped when the
/// target month is shorter (Nov 30 -> Feb 28).
pub fn series_horizon(from: DateTime<Utc>) -> DateTime<Utc> {
    from.checked_add_months(Months::new(SERIES_HORIZON_MONTHS))
        .unwrap_or(from)
}

/// All weekly slots starting at `(start, end)` whose start does not pass
/// `horizon`, inclusive.
pub fn weekly_slots(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    horizon: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut slots = Vec::new();
    let mut current_start = start;
    let mut current_end = end;
    while current_start <= horizon {
        slots.push((current_start, current_end));
        current_start += WEEK;
        current_end += WEEK;
    }
    slots
}

/// Drop seconds and sub-seconds; the past-booking check works at minute
/// precision so a request built a few seconds ago is still accepted.
pub fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_overlaps_half_open() {
        let s = utc(2025, 3, 10, 10, 0);
        let e = utc(2025, 3, 10, 11, 0);

        // 完全重叠 / 部分重叠
        assert!(overlaps(s, e, s, e));
        assert!(overlaps(s, e, utc(2025, 3, 10, 10, 30), utc(2025, 3, 10, 11, 30)));
        assert!(overlaps(s, e, utc(2025, 3, 10, 9, 30), utc(2025, 3, 10, 10, 30)));
        // 内含
        assert!(overlaps(s, e, utc(2025, 3, 10, 10, 15), utc(2025, 3, 10, 10, 45)));

        // 首尾相接不算冲突
        assert!(!overlaps(s, e, utc(2025, 3, 10, 11, 0), utc(2025, 3, 10, 12, 0)));
        assert!(!overlaps(s, e, utc(2025, 3, 10, 9, 0), utc(2025, 3, 10, 10, 0)));
        assert!(!overlaps(s, e, utc(2025, 3, 11, 10, 0), utc(2025, 3, 11, 11, 0)));
    }

    #[test]
    fn test_series_horizon_month_arithmetic() {
        assert_eq!(
            series_horizon(utc(2025, 1, 1, 10, 0)),
            utc(2025, 4, 1, 10, 0)
        );
        // 短月截断到月末
        assert_eq!(
            series_horizon(utc(2024, 11, 30, 18, 0)),
            utc(2025, 2, 28, 18, 0)
        );
        assert_eq!(
            series_horizon(utc(2025, 1, 31, 9, 0)),
            utc(2025, 4, 30, 9, 0)
        );
    }

    #[test]
    fn test_weekly_slots_count() {
        // Jan 1 -> Apr 1 is 90 days: occurrences on days 0,7,...,84 = 13
        let start = utc(2025, 1, 1, 10, 0);
        let end = utc(2025, 1, 1, 11, 0);
        let slots = weekly_slots(start, end, series_horizon(start));
        assert_eq!(slots.len(), 13);
        assert_eq!(slots[0], (start, end));
        assert_eq!(slots[12].0, start + Duration::days(84));

        // May 1 -> Aug 1 is 92 days: day 91 still fits = 14
        let start = utc(2025, 5, 1, 10, 0);
        let end = utc(2025, 5, 1, 11, 0);
        let slots = weekly_slots(start, end, series_horizon(start));
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[13].0, start + Duration::days(91));
    }

    #[test]
    fn test_weekly_slots_preserve_duration() {
        let start = utc(2025, 1, 6, 16, 30);
        let end = utc(2025, 1, 6, 18, 0);
        for (s, e) in weekly_slots(start, end, series_horizon(start)) {
            assert_eq!(e - s, Duration::minutes(90));
            assert_eq!((s - start).num_days() % 7, 0);
        }
    }

    #[test]
    fn test_truncate_to_minute() {
        let t = Utc.with_ymd_and_hms(2025, 3, 10, 10, 15, 42).unwrap();
        assert_eq!(truncate_to_minute(t), utc(2025, 3, 10, 10, 15));
    }
}
