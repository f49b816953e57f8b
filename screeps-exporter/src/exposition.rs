//! OpenMetrics text rendering of a sink snapshot.

use std::fmt::Write;
use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::cycle::CycleStats;
use crate::families::Scope;
use crate::sink::SinkSnapshot;

/// Content type of the rendered body.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// A label value taken from the game database, escaped on output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LabelText(String);

impl EncodeLabelValue for LabelText {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), std::fmt::Error> {
        for c in self.0.chars() {
            match c {
                '\\' => encoder.write_str("\\\\")?,
                '"' => encoder.write_str("\\\"")?,
                '\n' => encoder.write_str("\\n")?,
                c => encoder.write_char(c)?,
            }
        }
        Ok(())
    }
}

type LabelSet = Vec<(String, LabelText)>;
type GaugeVec = Family<LabelSet, Gauge<f64, AtomicU64>>;
type OutcomeLabels = Vec<(String, String)>;

/// Register every family of the snapshot that falls in `scope`.
pub fn register_families(registry: &mut Registry, snapshot: &SinkSnapshot, scope: Scope) {
    for family in snapshot.families().values() {
        let descriptor = family.descriptor();
        if !scope.includes(descriptor.group) {
            continue;
        }

        let metric = GaugeVec::default();
        for (values, value) in family.samples() {
            let labels: LabelSet = descriptor
                .labels
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), LabelText(value.clone())))
                .collect();
            metric.get_or_create(&labels).set(value);
        }

        registry.register(descriptor.name, descriptor.help, metric);
    }
}

/// Register the exporter's own cycle statistics.
pub fn register_cycle_stats(registry: &mut Registry, stats: &CycleStats, series: usize) {
    let cycles = Family::<OutcomeLabels, Counter>::default();
    cycles
        .get_or_create(&vec![("outcome".to_string(), "success".to_string())])
        .inc_by(stats.cycles_succeeded);
    cycles
        .get_or_create(&vec![("outcome".to_string(), "failure".to_string())])
        .inc_by(stats.cycles_failed);
    registry.register(
        "screeps_exporter_cycles",
        "Scrape cycles run by the exporter",
        cycles,
    );

    let duration = Gauge::<f64, AtomicU64>::default();
    duration.set(stats.last_duration.map(|d| d.as_secs_f64()).unwrap_or(0.0));
    registry.register(
        "screeps_exporter_last_cycle_duration_seconds",
        "Duration of the most recent scrape cycle",
        duration,
    );

    let series_gauge = Gauge::<i64>::default();
    series_gauge.set(series as i64);
    registry.register(
        "screeps_exporter_series",
        "Series currently published by the exporter",
        series_gauge,
    );
}

/// Render a snapshot restricted to `scope`.
pub fn render(
    snapshot: &SinkSnapshot,
    scope: Scope,
    stats: Option<&CycleStats>,
) -> Result<String, std::fmt::Error> {
    let mut registry = Registry::default();
    register_families(&mut registry, snapshot, scope);

    if let Some(stats) = stats {
        register_cycle_stats(&mut registry, stats, snapshot.series_count());
    }

    let mut buffer = String::new();
    encode(&mut buffer, &registry)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{
        ALL_FAMILIES, FamilyUpdate, MetricGroup, ROOM_ENERGY, ROOM_MINERALS, USERS_GCL,
    };
    use crate::sink::MetricSink;
    use std::time::Duration;

    fn populated_sink() -> MetricSink {
        let sink = MetricSink::with_families(ALL_FAMILIES.iter());

        let mut energy = FamilyUpdate::new(ROOM_ENERGY);
        energy.push(["Alice", "W1N1"], 200.0);
        let mut gcl = FamilyUpdate::new(USERS_GCL);
        gcl.push(["Alice"], 3.0);

        sink.replace_all([energy, gcl]).unwrap();
        sink
    }

    #[test]
    fn test_render_all_families() {
        let sink = populated_sink();
        let output = render(&sink.snapshot(), Scope::All, None).unwrap();

        assert!(output.contains("# TYPE screep_users_energy gauge"));
        assert!(output.contains("screep_users_energy{userName=\"Alice\",room=\"W1N1\"} 200"));
        assert!(output.contains("screep_users_GCL{userName=\"Alice\"} 3"));
        // Registered but empty families still carry metadata.
        assert!(output.contains("# TYPE screep_users_creep_count gauge"));
        assert!(output.trim_end().ends_with("# EOF"));
        assert!(!output.contains("screeps_exporter_cycles"));
    }

    #[test]
    fn test_render_scope_filters_groups() {
        let sink = populated_sink();

        let rooms = render(&sink.snapshot(), Scope::Only(MetricGroup::Rooms), None).unwrap();
        assert!(rooms.contains("screep_users_energy"));
        assert!(!rooms.contains("screep_users_GCL"));

        let users = render(&sink.snapshot(), Scope::Only(MetricGroup::Users), None).unwrap();
        assert!(users.contains("screep_users_GCL"));
        assert!(!users.contains("screep_users_energy"));
    }

    #[test]
    fn test_render_cycle_stats() {
        let sink = populated_sink();
        let stats = CycleStats {
            cycles_started: 3,
            cycles_succeeded: 2,
            cycles_failed: 1,
            last_duration: Some(Duration::from_millis(250)),
            ..Default::default()
        };

        let output = render(&sink.snapshot(), Scope::All, Some(&stats)).unwrap();

        assert!(output.contains("screeps_exporter_cycles_total{outcome=\"success\"} 2"));
        assert!(output.contains("screeps_exporter_cycles_total{outcome=\"failure\"} 1"));
        assert!(output.contains("screeps_exporter_last_cycle_duration_seconds 0.25"));
        assert!(output.contains("screeps_exporter_series 2"));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let sink = MetricSink::with_families(ALL_FAMILIES.iter());
        let mut minerals = FamilyUpdate::new(ROOM_MINERALS);
        minerals.push(["Al\"ice\\x\nY", "W1N1", "Z\"}"], 3.0);
        sink.replace(minerals).unwrap();

        let output = render(&sink.snapshot(), Scope::All, None).unwrap();

        assert!(output.contains(
            r#"screep_users_mineral_type_count{userName="Al\"ice\\x\nY",room="W1N1",type="Z\"}"} 3"#
        ));
        // Every sample stays on one line.
        for line in output.lines().filter(|l| !l.starts_with('#')) {
            assert!(line.starts_with("screep_users_mineral_type_count{"), "{}", line);
        }
    }
}
