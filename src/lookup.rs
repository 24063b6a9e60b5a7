//! Label-tuple lookup cache
//!
//! Resolving a label tuple to canonical keys means escaping every value and
//! (for histograms) rendering one key per bucket. The cache keeps the result
//! in a tree indexed by each label value in turn, so repeat observations are
//! a walk of `HashMap` lookups.

use crate::error::MetricError;
use crate::naming::{self, BucketFormat, LabelEscaping};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything needed to derive the keys of one metric's series
#[derive(Debug, Clone)]
pub struct SeriesLayout {
    name: String,
    label_names: Vec<String>,
    histogram: Option<(Vec<f64>, BucketFormat)>,
    escaping: LabelEscaping,
}

impl SeriesLayout {
    /// Layout of a counter or gauge: one key per label tuple
    pub fn scalar(name: impl Into<String>, label_names: Vec<String>, escaping: LabelEscaping) -> Self {
        Self {
            name: name.into(),
            label_names,
            histogram: None,
            escaping,
        }
    }

    /// Layout of a histogram: bucket keys, `Inf` bucket, count and sum per tuple
    pub fn histogram(
        name: impl Into<String>,
        label_names: Vec<String>,
        buckets: Vec<f64>,
        format: BucketFormat,
        escaping: LabelEscaping,
    ) -> Self {
        Self {
            name: name.into(),
            label_names,
            histogram: Some((buckets, format)),
            escaping,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Histogram bucket boundaries, empty for scalar metrics
    pub fn buckets(&self) -> &[f64] {
        self.histogram.as_ref().map_or(&[], |(buckets, _)| buckets.as_slice())
    }

    /// Canonical keys of the series identified by `values`
    pub fn keys_for(&self, values: &[&str]) -> Vec<String> {
        let names: Vec<&str> = self.label_names.iter().map(String::as_str).collect();
        match &self.histogram {
            Some((buckets, format)) => {
                naming::histogram_keys(&self.name, &names, values, buckets, format, self.escaping)
            }
            None => vec![naming::canonical_key(&self.name, &names, values, self.escaping)],
        }
    }

    /// Reject a label tuple whose length differs from the declared labels
    pub fn check_arity(&self, values: &[&str]) -> Result<(), MetricError> {
        if values.len() != self.label_names.len() {
            return Err(MetricError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: values.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    keys: Option<Arc<[String]>>,
}

/// Per-metric cache from label tuple to canonical keys
#[derive(Debug, Default)]
pub struct LookupCache {
    root: Node,
    leaves: usize,
    generation: u64,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached label tuples
    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    /// Catalog generation this cache was built under
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop everything if the cache was built under another catalog generation
    ///
    /// Returns whether the cache was discarded.
    pub fn revalidate(&mut self, generation: u64) -> bool {
        if self.generation == generation {
            return false;
        }
        self.clear();
        self.generation = generation;
        true
    }

    /// Cached keys for `values`, if any
    pub fn get(&self, values: &[&str]) -> Option<Arc<[String]>> {
        let mut node = &self.root;
        for value in values {
            node = node.children.get(*value)?;
        }
        node.keys.clone()
    }

    pub fn insert(&mut self, values: &[&str], keys: Arc<[String]>) {
        let mut node = &mut self.root;
        for value in values {
            node = node.children.entry((*value).to_string()).or_default();
        }
        if node.keys.replace(keys).is_none() {
            self.leaves += 1;
        }
    }

    /// Forget one label tuple, returning its keys
    pub fn remove(&mut self, values: &[&str]) -> Option<Arc<[String]>> {
        let mut node = &mut self.root;
        for value in values {
            node = node.children.get_mut(*value)?;
        }
        let keys = node.keys.take();
        if keys.is_some() {
            self.leaves -= 1;
        }
        keys
    }

    /// Discard the whole tree
    pub fn clear(&mut self) {
        self.root = Node::default();
        self.leaves = 0;
    }

    /// Resolve `values` to canonical keys, computing and caching on first use
    ///
    /// `register` runs once for a new tuple, before it is cached; if it fails
    /// nothing is cached and the next call tries again.
    ///
    /// # Errors
    ///
    /// `LabelArity` when the tuple length does not match the layout, or
    /// whatever `register` returns.
    pub fn resolve<F>(
        &mut self,
        layout: &SeriesLayout,
        values: &[&str],
        register: F,
    ) -> Result<Arc<[String]>, MetricError>
    where
        F: FnOnce(&[String]) -> Result<(), MetricError>,
    {
        layout.check_arity(values)?;
        if let Some(keys) = self.get(values) {
            return Ok(keys);
        }

        let keys: Arc<[String]> = layout.keys_for(values).into();
        register(&keys)?;
        self.insert(values, Arc::clone(&keys));
        Ok(keys)
    }
}
