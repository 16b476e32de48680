use super::*;
use chrono::{FixedOffset, Timelike};

fn red_north() -> DailySchedule {
    DailySchedule::parse(&["04:00", "10:00", "16:00", "22:00"]).unwrap()
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[test]
fn test_daily_time_parse_and_display() {
    let t: DailyTime = "04:05".parse().unwrap();
    assert_eq!(t.hour(), 4);
    assert_eq!(t.minute(), 5);
    assert_eq!(t.to_string(), "04:05");

    let t: DailyTime = " 9:30 ".parse().unwrap();
    assert_eq!(t.to_string(), "09:30");
}

#[test]
fn test_daily_time_rejects_bad_input() {
    assert!(matches!(
        "0400".parse::<DailyTime>(),
        Err(ScheduleError::InvalidFormat(_))
    ));
    assert!(matches!(
        "aa:10".parse::<DailyTime>(),
        Err(ScheduleError::InvalidFormat(_))
    ));
    assert_eq!(
        "24:00".parse::<DailyTime>(),
        Err(ScheduleError::OutOfRange { hour: 24, minute: 0 })
    );
    assert_eq!(
        "12:60".parse::<DailyTime>(),
        Err(ScheduleError::OutOfRange { hour: 12, minute: 60 })
    );
}

#[test]
fn test_schedule_sorts_and_dedups() {
    let schedule = DailySchedule::parse(&["22:00", "04:00", "10:00", "04:00"]).unwrap();
    let marks: Vec<String> = schedule.times().iter().map(|t| t.to_string()).collect();
    assert_eq!(marks, vec!["04:00", "10:00", "22:00"]);
}

#[test]
fn test_schedule_must_not_be_empty() {
    let empty: [&str; 0] = [];
    assert_eq!(DailySchedule::parse(&empty), Err(ScheduleError::Empty));

    let result: Result<DailySchedule, _> = serde_json::from_str("[]");
    assert!(result.is_err());
}

#[test]
fn test_schedule_serde_as_strings() {
    let schedule: DailySchedule = serde_json::from_str(r#"["16:00","04:00"]"#).unwrap();
    assert_eq!(serde_json::to_string(&schedule).unwrap(), r#"["04:00","16:00"]"#);
}

#[test]
fn test_next_fixed_later_same_day() {
    let now = utc(2025, 6, 10, 9, 0);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2025, 6, 10, 10, 0));
}

#[test]
fn test_next_fixed_rolls_to_tomorrow() {
    let now = utc(2025, 6, 10, 23, 30);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2025, 6, 11, 4, 0));
}

#[test]
fn test_next_fixed_exact_mark_is_inclusive() {
    let now = utc(2025, 6, 10, 16, 0);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), now);

    // One second past the mark moves on to the next one
    let now = now + Duration::seconds(1);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2025, 6, 10, 22, 0));
}

#[test]
fn test_next_fixed_month_and_year_rollover() {
    let now = utc(2025, 1, 31, 23, 0);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2025, 2, 1, 4, 0));

    let now = utc(2024, 12, 31, 22, 30);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2025, 1, 1, 4, 0));

    let now = utc(2024, 2, 28, 23, 59);
    assert_eq!(next_fixed_occurrence(&red_north(), &now), utc(2024, 2, 29, 4, 0));
}

#[test]
fn test_next_fixed_uses_local_calendar_day() {
    // 01:30 UTC is 22:30 the previous day at UTC-3
    let zone = FixedOffset::west_opt(3 * 3600).unwrap();
    let now = utc(2025, 6, 11, 1, 30);

    let next = next_fixed_in_zone(&red_north(), now, &zone);
    let local = next.with_timezone(&zone);
    assert_eq!(local.hour(), 4);
    assert_eq!(local.minute(), 0);
    assert_eq!(next, utc(2025, 6, 11, 7, 0));
}

#[test]
fn test_next_fixed_never_before_now_and_no_skipped_mark() {
    let schedule = DailySchedule::parse(&["01:00", "07:00", "13:00", "19:00"]).unwrap();
    let start = utc(2025, 12, 30, 0, 0);

    // Sweep two days in 7-minute steps
    for step in 0..(2 * 24 * 60 / 7) {
        let now = start + Duration::minutes(step * 7);
        let next = next_fixed_occurrence(&schedule, &now);
        assert!(next >= now, "next {} before now {}", next, now);

        for mark in schedule.times() {
            let same_day = now
                .date_naive()
                .and_hms_opt(mark.hour(), mark.minute(), 0)
                .unwrap()
                .and_utc();
            assert!(
                !(same_day >= now && same_day < next),
                "mark {} skipped between {} and {}",
                mark,
                now,
                next
            );
        }
    }
}

#[test]
fn test_next_delay_occurrence() {
    let last = utc(2025, 6, 10, 9, 0);
    assert_eq!(
        next_delay_occurrence(Some(last), Duration::minutes(30)),
        Some(utc(2025, 6, 10, 9, 30))
    );
    assert_eq!(next_delay_occurrence(None, Duration::minutes(30)), None);
}

#[test]
fn test_next_delay_occurrence_out_of_range() {
    assert_eq!(
        next_delay_occurrence(Some(DateTime::<Utc>::MAX_UTC), Duration::minutes(1)),
        None
    );
}

#[test]
fn test_policy_category() {
    let fixed = SpawnPolicy::FixedSchedule {
        daily_times: red_north(),
    };
    let delay = SpawnPolicy::DelayBased {
        respawn_delay: Duration::hours(1),
    };
    assert_eq!(fixed.category(), PolicyCategory::FixedSchedule);
    assert_eq!(delay.category(), PolicyCategory::DelayBased);
}
