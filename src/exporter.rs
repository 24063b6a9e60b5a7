//! Prometheus text exposition
//!
//! Series are grouped by the metric they belong to, then sorted by canonical
//! key within the group. Byte order of the keys puts histogram buckets in
//! ascending order, and grouping keeps a metric's lines together even when
//! another metric's name extends it (`latency` and `latency_bytes`), so a
//! single pass emits each `# HELP`/`# TYPE` pair right before the first
//! series of its metric.

use crate::naming;
use crate::registry::{Family, MetricRegistry};
use crate::store::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Snapshot every live series as exposition lines
///
/// Flushes this worker's buffer first. Series that have expired or vanished
/// are skipped silently; series that cannot be read are skipped and counted
/// as internal errors.
pub fn collect(registry: &MetricRegistry) -> Vec<String> {
    registry.flush();

    let mut keys = match registry.live_keys() {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list metric keys for export");
            registry.count_errors(1);
            return Vec::new();
        }
    };
    keys.sort_unstable();
    keys.dedup();

    let mut series: Vec<(Option<Arc<Family>>, String)> = keys
        .into_iter()
        .map(|key| (registry.family(naming::short_name(&key)), key))
        .collect();
    // Stable: keys stay in byte order within a group
    series.sort_by(|(fa, ka), (fb, kb)| group(fa, ka).cmp(group(fb, kb)));

    let store = registry.store();
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(series.len() + 8);

    for (family, key) in &series {
        let value = match store.get(key) {
            Ok(Some(Value::Number(value))) => value,
            Ok(None) => continue,
            Ok(Some(Value::Text(_))) => {
                tracing::error!(key = %key, "Metric key holds a non-numeric value");
                registry.count_errors(1);
                continue;
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to read metric value");
                registry.count_errors(1);
                continue;
            }
        };

        if let Some(family) = family
            && seen.insert(family.name.clone())
        {
            lines.push(format!(
                "# HELP {} {}",
                family.name,
                naming::escape_help(&family.help)
            ));
            lines.push(format!("# TYPE {} {}", family.name, family.kind));
        }
        lines.push(format!(
            "{} {}",
            naming::export_key(key),
            naming::format_value(value)
        ));
    }

    lines
}

/// Name series are grouped under: the registered metric, else the series name
fn group<'a>(family: &'a Option<Arc<Family>>, key: &'a str) -> &'a str {
    match family {
        Some(family) => &family.name,
        None => naming::short_name(key),
    }
}

/// Render the full exposition document
pub fn render(registry: &MetricRegistry) -> String {
    let mut body = collect(registry).join("\n");
    body.push('\n');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DEFAULT_ERROR_METRIC_NAME, MetricsOptions};
    use crate::store::{MemoryStore, SharedStore};
    use std::sync::Arc;

    fn registry() -> MetricRegistry {
        MetricRegistry::new(Arc::new(MemoryStore::new(1024)), MetricsOptions::default())
    }

    #[test]
    fn test_empty_registry_exports_error_metric() {
        let registry = registry();
        assert_eq!(
            collect(&registry),
            vec![
                format!("# HELP {} Number of nginx-lua-prometheus errors", DEFAULT_ERROR_METRIC_NAME),
                format!("# TYPE {} counter", DEFAULT_ERROR_METRIC_NAME),
                format!("{} 0", DEFAULT_ERROR_METRIC_NAME),
            ]
        );
    }

    #[test]
    fn test_counter_line_after_flush() {
        let registry = registry();
        let counter = registry
            .counter("requests_total", "Number of HTTP requests", &["host", "status"])
            .unwrap();
        counter.inc(3.0, &["a", "200"]);
        counter.inc(2.0, &["a", "200"]);

        let lines = collect(&registry);
        assert!(lines.contains(&"# HELP requests_total Number of HTTP requests".to_string()));
        assert!(lines.contains(&"# TYPE requests_total counter".to_string()));
        assert!(lines.contains(&r#"requests_total{host="a",status="200"} 5"#.to_string()));
    }

    #[test]
    fn test_histogram_lines_are_ordered() {
        let registry = registry();
        let histogram = registry
            .histogram("latency", "Latency", &["path"], Some(&[0.5, 10.0]))
            .unwrap();
        histogram.observe(2.0, &["/x"]);
        histogram.observe(0.151, &["/x"]);

        let lines: Vec<String> = collect(&registry)
            .into_iter()
            .filter(|line| line.contains("latency"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "# HELP latency Latency",
                "# TYPE latency histogram",
                r#"latency_bucket{path="/x",le="00.5"} 1"#,
                r#"latency_bucket{path="/x",le="10.0"} 2"#,
                r#"latency_bucket{path="/x",le="+Inf"} 2"#,
                r#"latency_count{path="/x"} 2"#,
                r#"latency_sum{path="/x"} 2.151"#,
            ]
        );
    }

    #[test]
    fn test_help_is_escaped() {
        let registry = registry();
        let gauge = registry.gauge("g", "line one\nback\\slash", &[]).unwrap();
        gauge.set(1.0, &[]);
        let lines = collect(&registry);
        assert!(lines.contains(&r"# HELP g line one\nback\\slash".to_string()));
    }

    #[test]
    fn test_absent_values_are_skipped_without_error() {
        let registry = registry();
        let gauge = registry.gauge("g", "", &["k"]).unwrap();
        gauge.set(1.0, &["a"]);
        registry.store().delete(r#"g{k="a"}"#).unwrap();

        let lines = collect(&registry);
        assert!(lines.iter().all(|line| !line.starts_with("# TYPE g ")));
        assert_eq!(registry.error_count(), 0.0);
    }

    #[test]
    fn test_text_value_is_counted_as_error() {
        let registry = registry();
        let gauge = registry.gauge("g", "", &[]).unwrap();
        gauge.set(1.0, &[]);
        registry
            .store()
            .set("g", Value::Text("oops".to_string()), None)
            .unwrap();

        let lines = collect(&registry);
        assert!(lines.iter().all(|line| !line.starts_with("g ")));
        assert_eq!(registry.error_count(), 1.0);
    }

    #[test]
    fn test_render_ends_with_newline() {
        let registry = registry();
        let body = render(&registry);
        assert!(body.ends_with("0\n"));
        assert_eq!(body.lines().count(), 3);
    }

    #[test]
    fn test_family_stays_contiguous_when_another_name_extends_it() {
        let registry = registry();
        let latency = registry
            .histogram("latency", "Latency", &[], Some(&[1.0]))
            .unwrap();
        let bytes = registry.counter("latency_bytes", "Bytes", &[]).unwrap();
        latency.observe(0.5, &[]);
        bytes.inc(10.0, &[]);

        let lines: Vec<String> = collect(&registry)
            .into_iter()
            .filter(|line| line.contains("latency"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "# HELP latency Latency",
                "# TYPE latency histogram",
                r#"latency_bucket{le="1.0"} 1"#,
                r#"latency_bucket{le="+Inf"} 1"#,
                "latency_count 1",
                "latency_sum 0.5",
                "# HELP latency_bytes Bytes",
                "# TYPE latency_bytes counter",
                "latency_bytes 10",
            ]
        );
    }
}
