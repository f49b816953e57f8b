//! Full-replace gauge store shared between scrape cycles.
//!
//! Every family is an immutable [`GaugeFamily`] behind an `Arc`. A replace
//! builds the new families completely, then publishes a new [`SinkState`]
//! with a single pointer swap. Readers holding a [`SinkSnapshot`] keep seeing
//! the state they loaded, never a half-cleared or half-refilled family.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::debug;

use crate::families::{FamilyDescriptor, FamilyUpdate};

/// Errors raised while validating an update. Nothing is published on error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Family {family} expects {expected} label values, got {found}")]
    LabelArity {
        family: &'static str,
        expected: usize,
        found: usize,
    },
}

/// The complete label/value set of one family.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeFamily {
    descriptor: FamilyDescriptor,
    samples: BTreeMap<Vec<String>, f64>,
}

impl GaugeFamily {
    fn build(update: FamilyUpdate) -> Result<Self, SinkError> {
        let expected = update.family.labels.len();
        let mut samples = BTreeMap::new();

        for (labels, value) in update.samples {
            if labels.len() != expected {
                return Err(SinkError::LabelArity {
                    family: update.family.name,
                    expected,
                    found: labels.len(),
                });
            }
            // Duplicate label tuples collapse to the last value, like a gauge set.
            samples.insert(labels, value);
        }

        Ok(Self {
            descriptor: update.family,
            samples,
        })
    }

    fn empty(descriptor: FamilyDescriptor) -> Self {
        Self {
            descriptor,
            samples: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &FamilyDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Samples ordered by label values.
    pub fn samples(&self) -> impl Iterator<Item = (&[String], f64)> {
        self.samples
            .iter()
            .map(|(labels, value)| (labels.as_slice(), *value))
    }

    /// Value for an exact label tuple.
    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.samples.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One published state of the sink.
#[derive(Debug, Clone, Default)]
pub struct SinkState {
    generation: u64,
    families: BTreeMap<&'static str, Arc<GaugeFamily>>,
}

impl SinkState {
    /// Number of replaces that led to this state; 0 before the first one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Every family, keyed by name.
    pub fn families(&self) -> &BTreeMap<&'static str, Arc<GaugeFamily>> {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&Arc<GaugeFamily>> {
        self.families.get(name)
    }

    /// Total number of series across all families.
    pub fn series_count(&self) -> usize {
        self.families.values().map(|f| f.len()).sum()
    }
}

/// One published view of every family.
pub type SinkSnapshot = Arc<SinkState>;

/// Labeled gauge store with copy-on-write replacement.
pub struct MetricSink {
    state: ArcSwap<SinkState>,
}

impl MetricSink {
    /// Create an empty sink with no registered families.
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(SinkState::default()),
        }
    }

    /// Create a sink with the given families registered and empty, so they
    /// are rendered before the first successful cycle.
    pub fn with_families<'a>(descriptors: impl IntoIterator<Item = &'a FamilyDescriptor>) -> Self {
        let families = descriptors
            .into_iter()
            .map(|d| (d.name, Arc::new(GaugeFamily::empty(*d))))
            .collect();

        Self {
            state: ArcSwap::from_pointee(SinkState {
                generation: 0,
                families,
            }),
        }
    }

    /// Replace the entire label/value set of one family.
    pub fn replace(&self, update: FamilyUpdate) -> Result<u64, SinkError> {
        self.replace_all([update])
    }

    /// Replace several families in one swap.
    ///
    /// Every update is validated and built before anything is published.
    /// Returns the generation of the published state. The generation is
    /// assigned at swap time, so it grows with every state that replaces
    /// another, whatever order overlapping callers finish building in. An
    /// empty update list publishes nothing and returns the current generation.
    pub fn replace_all(
        &self,
        updates: impl IntoIterator<Item = FamilyUpdate>,
    ) -> Result<u64, SinkError> {
        let built = updates
            .into_iter()
            .map(|update| GaugeFamily::build(update).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        if built.is_empty() {
            return Ok(self.generation());
        }

        let previous = self.state.rcu(|current| {
            let mut families = current.families.clone();
            for family in &built {
                families.insert(family.name(), Arc::clone(family));
            }
            SinkState {
                generation: current.generation + 1,
                families,
            }
        });
        let generation = previous.generation + 1;

        debug!(
            generation,
            families = built.len(),
            series = built.iter().map(|f| f.len()).sum::<usize>(),
            "Published metric families"
        );

        Ok(generation)
    }

    /// The currently published state.
    pub fn snapshot(&self) -> SinkSnapshot {
        self.state.load_full()
    }

    /// The currently published version of one family.
    pub fn family(&self, name: &str) -> Option<Arc<GaugeFamily>> {
        self.state.load().family(name).cloned()
    }

    /// Generation of the currently published state.
    pub fn generation(&self) -> u64 {
        self.state.load().generation
    }

    /// Total number of series across all families.
    pub fn series_count(&self) -> usize {
        self.state.load().series_count()
    }
}

impl Default for MetricSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a shareable sink handle.
pub type SharedSink = Arc<MetricSink>;
