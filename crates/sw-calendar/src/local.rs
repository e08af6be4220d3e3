//! Local wall-clock → UTC conversion that never fails.
//!
//! `chrono-tz` reports DST transitions as ambiguous (fall back) or missing
//! (spring forward) local times. Callers pick a [`Bias`] for the ambiguous
//! case; missing times are shifted forward using the offset in effect just
//! before the gap, so 02:30 on a spring-forward night lands on 03:30 local.

use chrono::{
    DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;

/// Which instant to take when a local time occurs twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Earliest,
    Latest,
}

/// Convert `secs` seconds after local midnight of `date` in `tz` to UTC.
///
/// `secs` may equal 86 400, meaning midnight of the following day.
pub fn local_to_utc(tz: Tz, date: NaiveDate, secs: u32, bias: Bias) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN) + TimeDelta::seconds(i64::from(secs));
    naive_local_to_utc(tz, naive, bias)
}

/// UTC instant of local midnight starting `date`. Consecutive calls tile the
/// timeline without gaps or overlaps.
pub fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(tz, date, 0, Bias::Earliest)
}

pub fn naive_local_to_utc(tz: Tz, naive: NaiveDateTime, bias: Bias) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(a, b) => {
            let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
            match bias {
                Bias::Earliest => a.min(b),
                Bias::Latest => a.max(b),
            }
        }
        LocalResult::None => {
            // Gap: apply the pre-transition offset.
            let before = tz
                .offset_from_utc_datetime(&(naive - TimeDelta::days(1)))
                .fix()
                .local_minus_utc();
            (naive - TimeDelta::seconds(i64::from(before))).and_utc()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Chicago;
    use chrono_tz::Asia::Kolkata;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn utc(y: i32, m: u32, day: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, mi, 0).unwrap()
    }

    #[test]
    fn plain_conversion() {
        // CST = UTC-6 in January.
        assert_eq!(
            local_to_utc(Chicago, d(2023, 1, 24), 9 * 3_600, Bias::Earliest),
            utc(2023, 1, 24, 15, 0)
        );
        // IST = UTC+5:30.
        assert_eq!(
            local_to_utc(Kolkata, d(2023, 1, 24), 0, Bias::Earliest),
            utc(2023, 1, 23, 18, 30)
        );
    }

    #[test]
    fn end_of_day_is_next_midnight() {
        assert_eq!(
            local_to_utc(Chicago, d(2023, 1, 24), 86_400, Bias::Earliest),
            local_midnight_utc(Chicago, d(2023, 1, 25))
        );
    }

    #[test]
    fn spring_forward_gap_shifts_forward() {
        // 2023-03-12 02:30 does not exist in Chicago; treated as 03:30 CDT.
        let got = local_to_utc(Chicago, d(2023, 3, 12), 2 * 3_600 + 1_800, Bias::Earliest);
        assert_eq!(got, utc(2023, 3, 12, 8, 30));
    }

    #[test]
    fn fall_back_ambiguity_respects_bias() {
        // 2023-11-05 01:30 happens at 06:30Z (CDT) and 07:30Z (CST).
        let secs = 3_600 + 1_800;
        assert_eq!(
            local_to_utc(Chicago, d(2023, 11, 5), secs, Bias::Earliest),
            utc(2023, 11, 5, 6, 30)
        );
        assert_eq!(
            local_to_utc(Chicago, d(2023, 11, 5), secs, Bias::Latest),
            utc(2023, 11, 5, 7, 30)
        );
    }

    #[test]
    fn dst_days_have_23_and_25_hours() {
        let len = |date: NaiveDate| {
            let next = date.succ_opt().unwrap();
            (local_midnight_utc(Chicago, next) - local_midnight_utc(Chicago, date)).num_hours()
        };
        assert_eq!(len(d(2023, 3, 12)), 23);
        assert_eq!(len(d(2023, 11, 5)), 25);
        assert_eq!(len(d(2023, 1, 24)), 24);
    }
}
