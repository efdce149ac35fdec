use criterion::{black_box, criterion_group, criterion_main, Criterion};
use render_orchestrator::{BatchRequest, Config, RenderError, RenderRequest};
use std::time::Duration;

fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn benchmark_config_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");
    configure_fast_group(&mut group);

    group.bench_function("creation", |b| {
        b.iter(|| {
            let config = Config::default();
            black_box(config);
        });
    });

    group.finish();
}

fn benchmark_chrome_args_generation(c: &mut Criterion) {
    let config = Config::default();

    c.bench_function("chrome_args_generation", |b| {
        b.iter(|| {
            let args = render_orchestrator::config::get_chrome_args(&config);
            black_box(args);
        });
    });
}

fn benchmark_render_request_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_request");
    configure_fast_group(&mut group);

    group.bench_function("creation", |b| {
        b.iter(|| {
            let request = RenderRequest {
                url: "https://example.com".to_string(),
                want_html: true,
                ..Default::default()
            };
            black_box(request);
        });
    });

    group.finish();
}

fn benchmark_batch_request_deserialization(c: &mut Criterion) {
    let payload = r#"{"urls":["https://example.com","https://example.org"],"max_parallel":3}"#;

    let mut group = c.benchmark_group("batch_request");
    configure_fast_group(&mut group);

    group.bench_function("deserialize", |b| {
        b.iter(|| {
            let request: BatchRequest = serde_json::from_str(black_box(payload)).unwrap();
            black_box(request);
        });
    });

    group.finish();
}

fn benchmark_url_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("url_validation");
    configure_fast_group(&mut group);

    let test_urls = vec!["https://example.com", "http://example.com/path", "invalid-url"];

    group.bench_function("validate", |b| {
        b.iter(|| {
            for url in &test_urls {
                let result = render_orchestrator::utils::validate_url(url);
                let _ = black_box(result);
            }
        });
    });

    group.finish();
}

fn benchmark_filename_sanitization(c: &mut Criterion) {
    let mut group = c.benchmark_group("filename_sanitization");
    configure_fast_group(&mut group);

    let test_filenames = vec!["normal_file.txt", "file with spaces.txt", "file/with/slashes.txt"];

    group.bench_function("sanitize", |b| {
        b.iter(|| {
            for filename in &test_filenames {
                let sanitized = render_orchestrator::utils::sanitize_filename(filename);
                black_box(sanitized);
            }
        });
    });

    group.finish();
}

fn benchmark_format_utilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_utilities");
    configure_fast_group(&mut group);

    let test_durations = vec![Duration::from_millis(100), Duration::from_secs(5)];
    let test_byte_sizes = vec![1024, 1048576];

    group.bench_function("format_duration", |b| {
        b.iter(|| {
            for duration in &test_durations {
                let formatted = render_orchestrator::utils::format_duration(*duration);
                black_box(formatted);
            }
        });
    });

    group.bench_function("format_bytes", |b| {
        b.iter(|| {
            for size in &test_byte_sizes {
                let formatted = render_orchestrator::utils::format_bytes(*size);
                black_box(formatted);
            }
        });
    });

    group.finish();
}

fn benchmark_circuit_breaker(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_breaker");
    configure_fast_group(&mut group);

    group.bench_function("operations", |b| {
        let breaker = render_orchestrator::error::CircuitBreaker::new(10, Duration::from_secs(60));
        b.iter(|| {
            let can_execute = breaker.can_execute();
            if can_execute {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
            black_box(can_execute);
        });
    });

    group.finish();
}

fn benchmark_error_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_error");
    configure_fast_group(&mut group);

    group.bench_function("invalid_input", |b| {
        b.iter(|| {
            let err = RenderError::invalid_input("url must be http or https");
            black_box(err);
        });
    });

    group.finish();
}

criterion_group!(
    unit_benches,
    benchmark_config_creation,
    benchmark_chrome_args_generation,
    benchmark_render_request_creation,
    benchmark_batch_request_deserialization,
    benchmark_url_validation,
    benchmark_filename_sanitization,
    benchmark_format_utilities,
    benchmark_circuit_breaker,
    benchmark_error_construction,
);

criterion_main!(unit_benches);
