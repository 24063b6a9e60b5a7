//! Canonical key construction and name validation
//!
//! Stored keys are built so that plain byte-wise sorting yields the order
//! the text exposition needs: every series of one metric is contiguous, and
//! histogram buckets come out in ascending boundary order because boundaries
//! are zero-padded to a fixed width.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Synthetic histogram bucket label, always rendered last
pub const LE_LABEL: &str = "le";

/// Stored label value of the overflow bucket
///
/// Sorts after every zero-padded numeric boundary. Rewritten to `+Inf` on export.
pub const INF_BUCKET: &str = "Inf";

/// Exported label value of the overflow bucket
pub const EXPORTED_INF_BUCKET: &str = "+Inf";

/// Default latency ladder in seconds, 5ms to 10s
pub const DEFAULT_BUCKETS: [f64; 19] = [
    0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.2, 0.3, 0.4, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0,
    5.0, 10.0,
];

/// How label values are made safe for the exposition format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelEscaping {
    /// Drop bytes outside printable ASCII, then escape `\` and `"`
    #[default]
    Strip,
    /// Keep all characters; escape `\`, `"` and newline
    Escape,
}

/// Whether `name` is a valid metric name (`[a-zA-Z_:][a-zA-Z0-9_:]*`)
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Whether `name` is a valid label name (`[a-zA-Z_][a-zA-Z0-9_]*`)
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape one label value according to `mode`
pub fn escape_label_value(value: &str, mode: LabelEscaping) -> Cow<'_, str> {
    let needs_work = match mode {
        LabelEscaping::Strip => value
            .bytes()
            .any(|b| !(0x20..=0x7e).contains(&b) || b == b'\\' || b == b'"'),
        LabelEscaping::Escape => value.contains(['\\', '"', '\n']),
    };
    if !needs_work {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' if mode == LabelEscaping::Escape => out.push_str("\\n"),
            c if mode == LabelEscaping::Strip && !(' '..='~').contains(&c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape HELP text: backslash and newline
pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Build the canonical key `name{l1="v1",l2="v2"}`
///
/// Labels keep declaration order except `le`, which always goes last. Label
/// values are escaped; `names` and `values` must have equal length.
pub fn canonical_key(name: &str, names: &[&str], values: &[&str], mode: LabelEscaping) -> String {
    debug_assert_eq!(names.len(), values.len());
    if names.is_empty() {
        return name.to_string();
    }

    let mut key = String::with_capacity(name.len() + 16 * names.len());
    key.push_str(name);
    key.push('{');

    let mut le = None;
    let mut first = true;
    for (label, value) in names.iter().zip(values) {
        if *label == LE_LABEL {
            le = Some(*value);
            continue;
        }
        push_label(&mut key, label, value, mode, &mut first);
    }
    if let Some(value) = le {
        push_label(&mut key, LE_LABEL, value, mode, &mut first);
    }

    key.push('}');
    key
}

fn push_label(key: &mut String, label: &str, value: &str, mode: LabelEscaping, first: &mut bool) {
    if !*first {
        key.push(',');
    }
    *first = false;
    key.push_str(label);
    key.push_str("=\"");
    key.push_str(&escape_label_value(value, mode));
    key.push('"');
}

/// Fixed-width rendering of bucket boundaries
///
/// Width and precision are chosen over the whole boundary list so that the
/// formatted strings compare byte-wise in the same order as the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketFormat {
    width: usize,
    precision: usize,
}

impl BucketFormat {
    /// Compute the format for `boundaries`
    ///
    /// # Errors
    ///
    /// Returns a reason when a boundary is not a finite, non-negative number.
    /// Ordering is the caller's responsibility and is not checked here.
    pub fn new(boundaries: &[f64]) -> Result<Self, String> {
        let mut max_order = 1;
        let mut max_precision = 1;

        for &boundary in boundaries {
            if !boundary.is_finite() {
                return Err(format!("bucket boundary {} is not a finite number", boundary));
            }
            if boundary < 0.0 {
                return Err(format!(
                    "bucket boundary {} is negative; negative boundaries cannot be zero-padded in order",
                    boundary
                ));
            }

            let fixed = format!("{:.6}", boundary);
            let trimmed = fixed.trim_end_matches('0');
            let dot = trimmed.find('.').unwrap_or(trimmed.len());
            max_order = max_order.max(dot);
            max_precision = max_precision.max(trimmed.len().saturating_sub(dot + 1));
        }

        Ok(Self {
            width: max_order + max_precision + 1,
            precision: max_precision,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Render one boundary
    pub fn format(&self, boundary: f64) -> String {
        format!(
            "{:0width$.precision$}",
            boundary,
            width = self.width,
            precision = self.precision
        )
    }

    /// `printf`-style template equivalent to this format, e.g. `%05.2f`
    pub fn template(&self) -> String {
        format!("%0{}.{}f", self.width, self.precision)
    }
}

/// Keys touched by one histogram series, in update order
///
/// One bucket key per boundary (ascending), the `Inf` bucket, then `_count`
/// and `_sum`.
pub fn histogram_keys(
    name: &str,
    names: &[&str],
    values: &[&str],
    boundaries: &[f64],
    format: &BucketFormat,
    mode: LabelEscaping,
) -> Vec<String> {
    let bucket_name = format!("{}_bucket", name);
    let mut bucket_names: Vec<&str> = names.to_vec();
    bucket_names.push(LE_LABEL);

    let les: Vec<String> = boundaries.iter().map(|b| format.format(*b)).collect();
    let mut keys = Vec::with_capacity(boundaries.len() + 3);
    let mut bucket_values: Vec<&str> = values.to_vec();
    for le in &les {
        bucket_values.push(le);
        keys.push(canonical_key(&bucket_name, &bucket_names, &bucket_values, mode));
        bucket_values.pop();
    }
    bucket_values.push(INF_BUCKET);
    keys.push(canonical_key(&bucket_name, &bucket_names, &bucket_values, mode));

    keys.push(canonical_key(&format!("{}_count", name), names, values, mode));
    keys.push(canonical_key(&format!("{}_sum", name), names, values, mode));
    keys
}

/// Metric name part of a canonical key (everything before `{`)
pub fn short_name(key: &str) -> &str {
    key.split_once('{').map_or(key, |(name, _)| name)
}

/// Rewrite the stored overflow bucket label to its exported spelling
pub fn export_key(key: &str) -> Cow<'_, str> {
    const STORED: &str = "le=\"Inf\"}";
    match key.strip_suffix(STORED) {
        Some(head) => Cow::Owned(format!("{}le=\"{}\"}}", head, EXPORTED_INF_BUCKET)),
        None => Cow::Borrowed(key),
    }
}

/// Render a sample value with 14 significant digits in its shortest form
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let rounded: f64 = format!("{:.13e}", value).parse().unwrap_or(value);
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_metric_name_validation() {
        assert!(is_valid_metric_name("requests_total"));
        assert!(is_valid_metric_name(":colon:start"));
        assert!(is_valid_metric_name("_x9"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("9lives"));
        assert!(!is_valid_metric_name("with-dash"));
        assert!(!is_valid_metric_name("spa ce"));
    }

    #[test]
    fn test_label_name_validation() {
        assert!(is_valid_label_name("host"));
        assert!(is_valid_label_name("_private"));
        assert!(!is_valid_label_name(":colon"));
        assert!(!is_valid_label_name("1st"));
        assert!(!is_valid_label_name(""));
    }

    #[test]
    fn test_strip_mode_drops_non_printable_and_escapes_quotes() {
        assert_eq!(escape_label_value("plain", LabelEscaping::Strip), "plain");
        assert_eq!(
            escape_label_value("a\nb\u{7}c", LabelEscaping::Strip),
            "abc"
        );
        assert_eq!(
            escape_label_value(r#"say "hi" \o/"#, LabelEscaping::Strip),
            r#"say \"hi\" \\o/"#
        );
        assert_eq!(escape_label_value("héllo", LabelEscaping::Strip), "hllo");
    }

    #[test]
    fn test_escape_mode_keeps_unicode_and_escapes_newline() {
        assert_eq!(
            escape_label_value("héllo\n\"x\"", LabelEscaping::Escape),
            "héllo\\n\\\"x\\\""
        );
    }

    #[test]
    fn test_canonical_key_without_labels() {
        assert_eq!(
            canonical_key("up", &[], &[], LabelEscaping::Strip),
            "up"
        );
    }

    #[test]
    fn test_canonical_key_keeps_declaration_order() {
        let key = canonical_key(
            "requests_total",
            &["host", "status"],
            &["a", "200"],
            LabelEscaping::Strip,
        );
        assert_eq!(key, r#"requests_total{host="a",status="200"}"#);
    }

    #[test]
    fn test_canonical_key_moves_le_last() {
        let key = canonical_key(
            "latency_bucket",
            &["le", "path", "method"],
            &["0.5", "/x", "GET"],
            LabelEscaping::Strip,
        );
        assert_eq!(key, r#"latency_bucket{path="/x",method="GET",le="0.5"}"#);
    }

    #[test]
    fn test_bucket_format_for_simple_ladder() {
        let format = BucketFormat::new(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(format.template(), "%03.1f");
        assert_eq!(format.format(1.0), "1.0");
        assert_eq!(format.format(3.0), "3.0");
    }

    #[test]
    fn test_bucket_format_pads_integer_and_fraction() {
        let format = BucketFormat::new(&[0.005, 0.5, 10.0, 1500.0]).unwrap();
        assert_eq!(format.width(), 8);
        assert_eq!(format.precision(), 3);
        assert_eq!(format.format(0.005), "0000.005");
        assert_eq!(format.format(1500.0), "1500.000");
    }

    #[test]
    fn test_bucket_format_rejects_non_finite_and_negative() {
        assert!(BucketFormat::new(&[1.0, f64::NAN]).is_err());
        assert!(BucketFormat::new(&[f64::INFINITY]).is_err());
        assert!(BucketFormat::new(&[-1.0, 1.0]).is_err());
    }

    #[test]
    fn test_histogram_keys_order() {
        let format = BucketFormat::new(&[1.0, 2.0]).unwrap();
        let keys = histogram_keys(
            "latency",
            &["path"],
            &["/a"],
            &[1.0, 2.0],
            &format,
            LabelEscaping::Strip,
        );
        assert_eq!(
            keys,
            vec![
                r#"latency_bucket{path="/a",le="1.0"}"#,
                r#"latency_bucket{path="/a",le="2.0"}"#,
                r#"latency_bucket{path="/a",le="Inf"}"#,
                r#"latency_count{path="/a"}"#,
                r#"latency_sum{path="/a"}"#,
            ]
        );
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys, "update order must equal sort order");
    }

    #[test]
    fn test_export_key_rewrites_inf_bucket() {
        assert_eq!(
            export_key(r#"x_bucket{le="Inf"}"#),
            r#"x_bucket{le="+Inf"}"#
        );
        assert_eq!(
            export_key(r#"x_bucket{a="b",le="1.0"}"#),
            r#"x_bucket{a="b",le="1.0"}"#
        );
        assert_eq!(export_key(r#"x{a="Inf"}"#), r#"x{a="Inf"}"#);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name(r#"a_total{x="y"}"#), "a_total");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(5.0), "5");
        assert_eq!(format_value(2.0 + 0.151), "2.151");
        assert_eq!(format_value(0.1 + 0.2), "0.3");
        assert_eq!(format_value(-3.5), "-3.5");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
    }

    #[test]
    fn test_escape_help() {
        assert_eq!(escape_help("a\\b\nc"), "a\\\\b\\nc");
    }

    proptest! {
        #[test]
        fn prop_canonical_key_places_le_last(
            labels in proptest::collection::vec("[a-k][a-z0-9_]{0,6}", 0..5),
            le_pos in 0usize..6,
            values in proptest::collection::vec("[ -~]{0,8}", 6),
        ) {
            let mut names: Vec<&str> = labels.iter().map(String::as_str).collect();
            names.dedup();
            let pos = le_pos.min(names.len());
            names.insert(pos, LE_LABEL);
            let vals: Vec<&str> = values.iter().take(names.len()).map(String::as_str).collect();

            let first = canonical_key("m", &names, &vals, LabelEscaping::Strip);
            let second = canonical_key("m", &names, &vals, LabelEscaping::Strip);
            prop_assert_eq!(&first, &second);

            let le_value = escape_label_value(vals[pos], LabelEscaping::Strip);
            let expected_tail = format!("le=\"{}\"}}", le_value);
            prop_assert!(first.ends_with(&expected_tail));
        }

        #[test]
        fn prop_bucket_format_preserves_order(
            mut boundaries in proptest::collection::vec(0.0f64..100_000.0, 1..20),
        ) {
            for b in boundaries.iter_mut() {
                *b = (*b * 1000.0).round() / 1000.0;
            }
            boundaries.sort_by(|a, b| a.total_cmp(b));
            boundaries.dedup();

            let format = BucketFormat::new(&boundaries).unwrap();
            let rendered: Vec<String> = boundaries.iter().map(|b| format.format(*b)).collect();
            for pair in rendered.windows(2) {
                prop_assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
            }
            for r in &rendered {
                prop_assert!(r.as_str() < INF_BUCKET);
            }
        }
    }
}
