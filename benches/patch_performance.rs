//! Patch Engine Performance Benchmarks
//!
//! Measures filter/path parsing throughput and end-to-end patch
//! application on representative User documents.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use scim_patch::{PatchEngine, PatchRequestBuilder, Resource, SchemaRegistry, parse_filter};
use serde_json::{Value, json};

/// Create test data for benchmarking
fn create_test_user_data(email_count: usize) -> Value {
    let emails: Vec<Value> = (0..email_count)
        .map(|i| {
            json!({
                "value": format!("user{i}@example.com"),
                "type": if i % 2 == 0 { "work" } else { "home" },
                "primary": i == 0
            })
        })
        .collect();
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": "bench-user",
        "userName": "bench@example.com",
        "name": {
            "givenName": "Bench",
            "familyName": "User"
        },
        "emails": emails,
        "active": true
    })
}

fn bench_filter_parsing(c: &mut Criterion) {
    let cases = [
        ("simple", r#"type eq "work""#),
        ("logical", r#"type eq "work" and primary eq true"#),
        (
            "nested",
            r#"userType ne "Employee" and not (emails co "example.com" or emails.value co "example.org")"#,
        ),
    ];
    let mut group = c.benchmark_group("filter_parse");
    for (name, filter) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), filter, |b, filter| {
            b.iter(|| parse_filter(black_box(filter)).unwrap());
        });
    }
    group.finish();
}

fn bench_patch_application(c: &mut Criterion) {
    let registry = SchemaRegistry::new().unwrap();
    let engine = PatchEngine::new(&registry);

    let mut group = c.benchmark_group("apply_patch");
    for email_count in [2usize, 16, 64] {
        let resource = Resource::new("User", create_test_user_data(email_count));
        let request = PatchRequestBuilder::new()
            .replace(r#"emails[type eq "work"].value"#, json!("patched@example.com"))
            .add("nickName", json!("bench"))
            .build();
        group.bench_with_input(
            BenchmarkId::from_parameter(email_count),
            &resource,
            |b, resource| {
                b.iter(|| engine.apply_patch(black_box(resource), black_box(&request)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_no_op_detection(c: &mut Criterion) {
    let registry = SchemaRegistry::new().unwrap();
    let engine = PatchEngine::new(&registry);
    let resource = Resource::new("User", create_test_user_data(16));
    let request = PatchRequestBuilder::new()
        .replace("userName", json!("bench@example.com"))
        .build();

    c.bench_function("no_op_patch", |b| {
        b.iter(|| {
            let outcome = engine
                .apply_patch(black_box(&resource), black_box(&request))
                .unwrap();
            assert!(!outcome.changed);
        });
    });
}

criterion_group!(
    benches,
    bench_filter_parsing,
    bench_patch_application,
    bench_no_op_detection
);
criterion_main!(benches);
