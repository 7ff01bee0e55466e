//! Window query benchmarks
//!
//! Measures loading a calendar and resolving windows over a zoned weekly
//! series with overrides, the common shape of exported work calendars.

use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ics_timeline::CalendarSet;

const CALENDAR: &str = "\
BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Europe/Berlin\r\n\
BEGIN:DAYLIGHT\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0200\r\n\
DTSTART:19700329T020000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n\
END:DAYLIGHT\r\n\
BEGIN:STANDARD\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
DTSTART:19701025T030000\r\n\
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:weekly@bench\r\n\
SUMMARY:Team sync\r\n\
DTSTART;TZID=Europe/Berlin:20250106T100000\r\n\
DURATION:PT45M\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR\r\n\
EXDATE;TZID=Europe/Berlin:20250113T100000,20250115T100000\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:weekly@bench\r\n\
SUMMARY:Team sync (moved)\r\n\
DTSTART;TZID=Europe/Berlin:20250122T140000\r\n\
DURATION:PT45M\r\n\
RECURRENCE-ID;TZID=Europe/Berlin:20250122T100000\r\n\
SEQUENCE:1\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

fn bench_load(c: &mut Criterion) {
    c.bench_function("from_ics", |b| {
        b.iter(|| black_box(CalendarSet::from_ics(black_box(CALENDAR)).unwrap()));
    });
}

fn bench_between(c: &mut Criterion) {
    let mut group = c.benchmark_group("between");
    let set = CalendarSet::from_ics(CALENDAR).unwrap();
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    for days in [7, 31, 365] {
        let end = start + Duration::days(days);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{days}d")), &end, |b, end| {
            b.iter(|| black_box(set.between(black_box(start), *end).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load, bench_between);
criterion_main!(benches);
