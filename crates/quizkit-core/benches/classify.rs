use chrono::{DateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizkit_core::classify::{classify, ErrorInfo, ErrorLog};
use quizkit_core::token;
use quizkit_core::RawFailure;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

fn bench_token(c: &mut Criterion) {
    let mut group = c.benchmark_group("token");
    let fresh = token::unsigned_token(1_800_000_000);

    group.bench_function("is_valid", |b| {
        b.iter(|| token::is_valid(black_box(&fresh), black_box(now())))
    });

    group.bench_function("is_valid_malformed", |b| {
        b.iter(|| token::is_valid(black_box("not.a-token"), black_box(now())))
    });

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let failures = [
        RawFailure::Http {
            status: 503,
            message: None,
        },
        RawFailure::Business {
            code: 4001,
            message: Some("bank closed".into()),
        },
        RawFailure::Transport {
            message: "request timeout after 10s".into(),
        },
    ];

    group.bench_function("table", |b| {
        b.iter(|| {
            for f in &failures {
                black_box(classify(black_box(f), now()));
            }
        })
    });

    group.bench_function("log_push_at_capacity", |b| {
        let info: ErrorInfo = classify(&failures[0], now());
        let mut log = ErrorLog::with_capacity(100);
        for _ in 0..100 {
            log.push(info.clone());
        }
        b.iter(|| log.push(black_box(info.clone())))
    });

    group.finish();
}

criterion_group!(benches, bench_token, bench_classify);
criterion_main!(benches);
