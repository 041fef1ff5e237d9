use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use secure_actions::action::{ActionRecord, CallbackRef, Value};
use secure_actions::config::CredentialConfig;
use secure_actions::credential::Credentials;
use secure_actions::{policy, token};
use std::hint::black_box;

// Token handling and policy evaluation sit on every execution path; hashing
// dominates, so it is measured separately with production cost parameters.

fn token_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("token");
    group.throughput(Throughput::Elements(1));

    let raw = token::encode(123_456, "Q2hvb3NlIGEgc2VjcmV0IGxvbmcgZW5vdWdo");
    let wrapped = token::wrap(&raw);

    group.bench_function("decode_raw", |b| {
        b.iter(|| token::decode_any(black_box(&raw)).map(|t| t.id))
    });
    group.bench_function("decode_wrapped", |b| {
        b.iter(|| token::decode_any(black_box(&wrapped)).map(|t| t.id))
    });

    group.finish();
}

fn policy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy");
    let record = ActionRecord {
        id: 1,
        password_hash: String::new(),
        name: "bench".to_string(),
        callback: CallbackRef::new("noop", vec![Value::from("arg"), Value::Int(1)]),
        limit: 10,
        count: 3,
        expiration: 3600,
        created_at: 1_700_000_000,
        persistent: false,
    };

    group.bench_function("should_evict", |b| {
        b.iter(|| policy::should_evict(black_box(&record), black_box(1_700_001_000), None))
    });

    group.finish();
}

fn credential_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("credential");
    group.sample_size(10);

    let credentials = Credentials::new(&CredentialConfig::default()).unwrap();
    let secret = credentials.generate_secret();
    let stored = credentials.hash_secret(&secret).unwrap();

    group.bench_function("verify", |b| {
        b.iter(|| credentials.verify_secret(black_box(&secret), black_box(&stored)))
    });

    group.finish();
}

criterion_group!(benches, token_benchmark, policy_benchmark, credential_benchmark);
criterion_main!(benches);
