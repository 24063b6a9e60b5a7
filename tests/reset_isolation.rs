//! Integration tests for `del` and `reset` across workers

use promdict::exporter;
use promdict::registry::{MetricRegistry, MetricsOptions};
use promdict::store::{MemoryStore, SharedStore};
use std::sync::Arc;
use std::time::Duration;

fn options() -> MetricsOptions {
    MetricsOptions {
        sync_interval: Duration::from_millis(10),
        ..MetricsOptions::default()
    }
}

fn pair() -> (MetricRegistry, MetricRegistry) {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new(10_000));
    (
        MetricRegistry::new(Arc::clone(&store), options()),
        MetricRegistry::new(store, options()),
    )
}

fn series(lines: &[String], prefix: &str) -> Vec<String> {
    lines
        .iter()
        .filter(|line| line.starts_with(prefix))
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_reset_removes_only_its_own_metric() {
    let (a, _) = pair();
    let hits = a.counter("hits_total", "", &["path"]).expect("counter");
    let hits_other = a.counter("hits_other_total", "", &["path"]).expect("counter");
    let depth = a.gauge("hits", "", &["path"]).expect("gauge");

    hits.inc(1.0, &["/a"]);
    hits.inc(2.0, &["/b"]);
    hits_other.inc(3.0, &["/a"]);
    depth.set(4.0, &["/a"]);

    hits.reset().await;

    let lines = exporter::collect(&a);
    assert!(series(&lines, "hits_total").is_empty(), "{:?}", lines);
    assert!(lines.contains(&r#"hits_other_total{path="/a"} 3"#.to_string()));
    assert!(lines.contains(&r#"hits{path="/a"} 4"#.to_string()));
    assert_eq!(a.error_count(), 0.0);
}

#[tokio::test]
async fn test_histogram_restarts_from_zero_after_reset() {
    let (a, _) = pair();
    let latency = a
        .histogram("latency", "", &[], Some(&[1.0, 2.0]))
        .expect("histogram");

    latency.observe(0.5, &[]);
    latency.observe(1.5, &[]);
    latency.reset().await;
    assert!(series(&exporter::collect(&a), "latency").is_empty());

    latency.observe(1.5, &[]);
    let lines = series(&exporter::collect(&a), "latency");
    assert_eq!(
        lines,
        vec![
            r#"latency_bucket{le="1.0"} 0"#.to_string(),
            r#"latency_bucket{le="2.0"} 1"#.to_string(),
            r#"latency_bucket{le="+Inf"} 1"#.to_string(),
            "latency_count 1".to_string(),
            "latency_sum 1.5".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_del_removes_one_label_tuple() {
    let (a, b) = pair();
    let temp_a = a.gauge("temperature", "", &["room"]).expect("gauge");
    let temp_b = b.gauge("temperature", "", &["room"]).expect("gauge");

    temp_a.set(20.0, &["kitchen"]);
    temp_b.set(18.0, &["hall"]);
    temp_a.del(&["hall"]).await;

    let lines = exporter::collect(&b);
    assert!(lines.contains(&r#"temperature{room="kitchen"} 20"#.to_string()));
    assert!(!lines.iter().any(|line| line.contains(r#"room="hall""#)));
}

#[tokio::test]
async fn test_other_worker_recatalogues_after_reset() {
    let (a, b) = pair();
    let hits_a = a.counter("hits_total", "", &["path"]).expect("counter");
    let hits_b = b.counter("hits_total", "", &["path"]).expect("counter");

    hits_b.inc(1.0, &["/x"]);
    b.flush();
    hits_a.reset().await;

    // B cached the key before the reset and has not synced since
    hits_b.inc(5.0, &["/x"]);
    b.flush();

    let lines = exporter::collect(&a);
    assert!(lines.contains(&r#"hits_total{path="/x"} 5"#.to_string()), "{:?}", lines);
}

#[tokio::test]
async fn test_gauge_set_after_remote_reset_is_exported() {
    let (a, b) = pair();
    let gauge_a = a.gauge("reset_test_gauge", "", &["label"]).expect("gauge");
    let gauge_b = b.gauge("reset_test_gauge", "", &["label"]).expect("gauge");

    gauge_b.set(1.0, &["client1"]);
    gauge_a.reset().await;
    gauge_b.set(7.0, &["client1"]);

    for registry in [&a, &b] {
        let lines = exporter::collect(registry);
        assert!(
            lines.contains(&r#"reset_test_gauge{label="client1"} 7"#.to_string()),
            "{:?}",
            lines
        );
    }
    assert_eq!(a.error_count(), 0.0);
}

#[tokio::test]
async fn test_series_deleted_elsewhere_is_recatalogued_on_next_write() {
    let (a, b) = pair();
    let temp_a = a.gauge("temperature", "", &["room"]).expect("gauge");
    let temp_b = b.gauge("temperature", "", &["room"]).expect("gauge");

    temp_b.set(18.0, &["hall"]);
    temp_a.del(&["hall"]).await;
    assert!(!exporter::collect(&a).iter().any(|line| line.contains("hall")));

    temp_b.set(19.0, &["hall"]);
    let lines = exporter::collect(&a);
    assert!(lines.contains(&r#"temperature{room="hall"} 19"#.to_string()), "{:?}", lines);
}

#[tokio::test]
async fn test_counter_del_waits_for_pending_deltas() {
    let (a, _) = pair();
    let hits = a.counter("hits_total", "", &["path"]).expect("counter");

    hits.inc(1.0, &["/x"]);
    hits.del(&["/x"]).await;
    assert_eq!(a.pending(), 0);

    let value = a.store().get(r#"hits_total{path="/x"}"#).expect("store read");
    assert!(value.is_none());
    assert!(series(&exporter::collect(&a), "hits_total").is_empty());
}
