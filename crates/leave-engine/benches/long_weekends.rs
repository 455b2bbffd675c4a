use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use leave_engine::{CustomLeave, CycleSpec, Holiday, MonthDay, Person, Planner};
use std::hint::black_box;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn planner(persons: usize) -> Planner {
    let holidays: Vec<Holiday> = [
        (2025, 4, 18),
        (2025, 5, 1),
        (2025, 8, 15),
        (2025, 8, 27),
        (2025, 10, 2),
        (2025, 10, 21),
        (2025, 11, 5),
        (2025, 12, 25),
        (2026, 1, 26),
        (2026, 3, 4),
    ]
    .into_iter()
    .map(|(y, m, d)| Holiday::new(date(y, m, d), "", 0).unwrap())
    .collect();

    let cycle = CycleSpec {
        start: MonthDay { month: 4, day: 1 },
        end: MonthDay { month: 3, day: 31 },
    };
    let people = (0..persons)
        .map(|i| {
            Person::builder(format!("person-{}", i))
                .cycle(cycle)
                .custom_leave(
                    CustomLeave::builder("Paid Leave")
                        .max_balance(60.0)
                        .credit((4, 1), 21.0)
                        .expiry((3, 31))
                        .carry_forward(12.0)
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap()
        })
        .collect();
    Planner::new(2025, holidays, people).unwrap()
}

fn bench_long_weekends(c: &mut Criterion) {
    let single = planner(1);
    c.bench_function("long_weekends_one_person", |b| {
        b.iter(|| single.long_weekends(black_box(1), black_box(3)).unwrap())
    });

    let team = planner(50);
    c.bench_function("long_weekends_fifty_persons", |b| {
        b.iter(|| team.long_weekends(black_box(2), black_box(3)).unwrap())
    });

    c.bench_function("paid_holidays_fifty_persons", |b| {
        b.iter(|| team.verbose_paid_holidays())
    });
}

criterion_group!(benches, bench_long_weekends);
criterion_main!(benches);
