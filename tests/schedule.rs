// tests/schedule.rs

use chrono::{DateTime, Duration, TimeZone, Utc};
use loaddag::errors::LoaddagError;
use loaddag::schedule::{parse_cron, DagSchedule, DataInterval};
use loaddag_test_utils::builders::{sample_start, ConfigFileBuilder};

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 11, day, hour, minute, 0).unwrap()
}

fn hourly() -> DagSchedule {
    DagSchedule::new("0 * * * *", sample_start(), None).unwrap()
}

#[test]
fn interval_at_a_tick_covers_one_period() {
    let interval = hourly().interval_at(at(1, 5, 0)).unwrap();

    assert_eq!(interval, DataInterval::new(at(1, 5, 0), at(1, 6, 0)));
    assert_eq!(interval.logical_date(), at(1, 5, 0));
    assert_eq!(interval.ds(), "2018-11-01");
    assert_eq!(
        interval.to_string(),
        "[2018-11-01T05:00:00+00:00, 2018-11-01T06:00:00+00:00)"
    );
}

#[test]
fn interval_at_rejects_non_ticks_and_out_of_window_dates() {
    let err = hourly().interval_at(at(1, 5, 30)).unwrap_err();
    assert!(err.to_string().contains("is not a tick"), "{err}");

    let before_start = Utc.with_ymd_and_hms(2018, 10, 31, 23, 0, 0).unwrap();
    let err = hourly().interval_at(before_start).unwrap_err();
    assert!(err.to_string().contains("outside the schedule window"), "{err}");
}

#[test]
fn intervals_are_contiguous_and_clipped_to_the_window() {
    let schedule = DagSchedule::new("0 * * * *", at(1, 0, 0), Some(at(1, 23, 0))).unwrap();

    let all = schedule.all_intervals(at(30, 0, 0));
    assert_eq!(all.len(), 24);
    assert_eq!(all.first().map(|i| i.start), Some(at(1, 0, 0)));
    assert_eq!(all.last().map(|i| i.end), Some(at(2, 0, 0)));
    for pair in all.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }

    let some = schedule.intervals_between(at(1, 10, 30), at(1, 13, 0));
    let starts: Vec<_> = some.iter().map(|i| i.start).collect();
    assert_eq!(starts, vec![at(1, 11, 0), at(1, 12, 0), at(1, 13, 0)]);

    assert!(schedule.intervals_between(at(5, 0, 0), at(6, 0, 0)).is_empty());
}

#[test]
fn open_ended_schedule_only_lists_elapsed_intervals() {
    let now = at(1, 3, 20);
    let all = hourly().all_intervals(now);

    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|i| i.end <= now));
    assert_eq!(
        hourly().latest_complete(now),
        Some(DataInterval::new(at(1, 2, 0), at(1, 3, 0)))
    );
    assert_eq!(hourly().latest_complete(at(1, 0, 59)), None);
}

#[test]
fn five_field_cron_gets_a_seconds_field() {
    let schedule = parse_cron("30 6 * * *").unwrap();
    let next = schedule.after(&at(1, 0, 0)).next();
    assert_eq!(next, Some(at(1, 6, 30)));

    let daily = DagSchedule::new("30 6 * * *", sample_start(), None).unwrap();
    let interval = daily.interval_at(at(2, 6, 30)).unwrap();
    assert_eq!(interval.end - interval.start, Duration::days(1));
}

#[test]
fn invalid_schedules_are_rejected() {
    assert!(matches!(
        parse_cron("every hour"),
        Err(LoaddagError::ScheduleError(_))
    ));

    let err = DagSchedule::new("0 * * * *", at(2, 0, 0), Some(at(1, 0, 0))).unwrap_err();
    assert!(err.to_string().contains("is before start_date"), "{err}");
}

#[test]
fn run_without_logical_date_picks_latest_or_all_intervals() {
    let now = at(1, 3, 20);
    let cfg = ConfigFileBuilder::new().with_song_plays().build();
    let latest = loaddag::intervals_for_run(&cfg, None, now).unwrap();
    assert_eq!(latest, vec![DataInterval::new(at(1, 2, 0), at(1, 3, 0))]);

    let cfg = ConfigFileBuilder::new()
        .with_song_plays()
        .with_catchup(true)
        .build();
    let all = loaddag::intervals_for_run(&cfg, None, now).unwrap();
    assert_eq!(all.len(), 3);

    let explicit = loaddag::intervals_for_run(&cfg, Some(at(1, 1, 0)), now).unwrap();
    assert_eq!(explicit, vec![DataInterval::new(at(1, 1, 0), at(1, 2, 0))]);

    assert!(loaddag::intervals_for_run(&cfg, None, at(1, 0, 30)).is_err());
}
