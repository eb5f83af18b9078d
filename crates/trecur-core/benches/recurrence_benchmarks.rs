use chrono::{TimeZone, Utc};
use chrono_tz::Europe::Madrid;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use trecur_core::datecalc::{evaluate_instant, EvalContext};
use trecur_core::models::{Task, TaskStatus};
use trecur_core::period::Period;
use trecur_core::recurrence::{Clock, RecurrenceConfig, RecurrenceProcessor};
use trecur_core::store::{SqliteStore, TaskStore};

fn bench_period_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("period_parsing");
    for raw in ["3d", "weekly", "1.5h", "P1Y2M3DT4H"] {
        group.bench_with_input(BenchmarkId::from_parameter(raw), raw, |b, raw| {
            b.iter(|| black_box(raw).parse::<Period>().unwrap())
        });
    }
    group.finish();
}

fn bench_period_arithmetic(c: &mut Criterion) {
    let anchor = Utc.with_ymd_and_hms(2037, 1, 31, 1, 0, 0).unwrap();
    let mut group = c.benchmark_group("period_nth_after");
    for raw in ["1d", "1mo", "1h"] {
        let period: Period = raw.parse().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(raw), &period, |b, period| {
            b.iter(|| {
                for n in 1..=52 {
                    black_box(period.nth_after(anchor, n, &Madrid));
                }
            })
        });
    }
    group.finish();
}

fn bench_date_expression(c: &mut Criterion) {
    let ctx = EvalContext {
        now: Utc.with_ymd_and_hms(2037, 7, 8, 6, 54, 29).unwrap(),
        due: Some(Utc.with_ymd_and_hms(2037, 7, 8, 1, 0, 0).unwrap()),
        tz: Madrid,
    };
    c.bench_function("evaluate_due_minus_offset", |b| {
        b.iter(|| evaluate_instant(black_box("due - (due - 20370705T010000Z)"), &ctx).unwrap())
    });
}

fn bench_periodic_backfill(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let now = Utc.with_ymd_and_hms(2037, 12, 31, 0, 0, 0).unwrap();

    c.bench_function("periodic_backfill_one_year_weekly", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = SqliteStore::in_memory().await.unwrap();
                let processor = RecurrenceProcessor::new(
                    &store,
                    RecurrenceConfig::new(Madrid).with_clock(Clock::Fixed(now)),
                );
                let parent = processor
                    .add_recurrent_task(
                        Task::from_json(
                            r#"{"description":"bench","due":"20370101T010000Z","r":"1w","rtype":"periodic"}"#,
                        )
                        .unwrap(),
                    )
                    .await
                    .unwrap();
                let mut parent = parent;
                store.save(&mut parent).await.unwrap();
                let mut child = store.get(parent.rlastinstance.unwrap()).await.unwrap();
                child.status = TaskStatus::Completed;
                store.save(&mut child).await.unwrap();
                black_box(processor.synthesize_next_child(&child).await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    bench_period_parsing,
    bench_period_arithmetic,
    bench_date_expression,
    bench_periodic_backfill
);
criterion_main!(benches);
