// benches/normalize.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use cbb_scrape::data::Partition;
use cbb_scrape::specs::{self, StatLabels};

const SUMMARY: &str = include_str!("../tests/fixtures/summary_full.json");

fn synthetic_schedule(games: usize) -> String {
    let events: Vec<_> = (0..games)
        .map(|i| {
            json!({
                "id": format!("4014{i:05}"),
                "date": "2023-01-01T00:00Z",
                "competitions": [{"competitors": [
                    {"id": "150", "homeAway": if i % 2 == 0 { "home" } else { "away" }},
                    {"id": format!("{}", 2000 + i), "homeAway": if i % 2 == 0 { "away" } else { "home" }}
                ]}]
            })
        })
        .collect();
    json!({"team": {"id": "150"}, "events": events}).to_string()
}

fn bench_normalize(c: &mut Criterion) {
    let labels = StatLabels::standard();
    let raw = SUMMARY.as_bytes();

    c.bench_function("contest_summary", |b| {
        b.iter(|| {
            let r = specs::normalize(Partition::Mens, 2023, black_box(raw), &labels).unwrap();
            black_box(r.plays.len())
        })
    });

    let sched = synthetic_schedule(40);
    c.bench_function("schedule_40", |b| {
        b.iter(|| {
            let rows = specs::schedule::parse_schedule(Partition::Mens, 2023, "150", black_box(sched.as_bytes())).unwrap();
            black_box(rows.len())
        })
    });
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
