//! Metrics collection and registry.

use crate::estimation::Technique;
use crate::stitcher::StitchReport;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

const TECHNIQUES: [Technique; 3] = [Technique::Features, Technique::Template, Technique::Fallback];

/// Prometheus metrics registry for stitch runs.
pub struct MetricsRegistry {
    registry: Registry,

    // Run metrics
    runs_total: IntCounter,
    concat_fallbacks_total: IntCounter,

    // Frame metrics
    frames_total: IntCounter,
    frames_dropped_total: IntCounterVec,

    // Seam metrics
    seams_total: IntCounterVec,
    confident_seams_total: IntCounter,

    // Output metrics
    output_width: IntGauge,
    output_height: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all stitch metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let runs_total = IntCounter::new("scroll_stitch_runs_total", "Total stitch runs completed")?;
        let concat_fallbacks_total = IntCounter::new(
            "scroll_stitch_concat_fallbacks_total",
            "Runs that fell back to plain concatenation",
        )?;

        let frames_total = IntCounter::new(
            "scroll_stitch_frames_total",
            "Frames handed to stitch runs",
        )?;
        let frames_dropped_total = IntCounterVec::new(
            Opts::new(
                "scroll_stitch_frames_dropped_total",
                "Frames dropped before composition",
            ),
            &["reason"],
        )?;

        let seams_total = IntCounterVec::new(
            Opts::new("scroll_stitch_seams_total", "Seams resolved, by technique"),
            &["technique"],
        )?;
        let confident_seams_total = IntCounter::new(
            "scroll_stitch_confident_seams_total",
            "Seams whose overlap was blended",
        )?;

        let output_width = IntGauge::new(
            "scroll_stitch_output_width_pixels",
            "Width of the last stitched output",
        )?;
        let output_height = IntGauge::new(
            "scroll_stitch_output_height_pixels",
            "Height of the last stitched output",
        )?;

        // Zero-initialise labelled series so they show up before first use
        for reason in ["duplicate", "rejected"] {
            frames_dropped_total.with_label_values(&[reason]);
        }
        for technique in TECHNIQUES {
            seams_total.with_label_values(&[technique.as_str()]);
        }

        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(concat_fallbacks_total.clone()))?;
        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(frames_dropped_total.clone()))?;
        registry.register(Box::new(seams_total.clone()))?;
        registry.register(Box::new(confident_seams_total.clone()))?;
        registry.register(Box::new(output_width.clone()))?;
        registry.register(Box::new(output_height.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            concat_fallbacks_total,
            frames_total,
            frames_dropped_total,
            seams_total,
            confident_seams_total,
            output_width,
            output_height,
        })
    }

    /// Records one completed run.
    pub fn update(&self, report: &StitchReport) {
        self.runs_total.inc();
        if report.concatenated {
            self.concat_fallbacks_total.inc();
        }

        self.frames_total.inc_by(report.frames_in as u64);
        self.frames_dropped_total
            .with_label_values(&["duplicate"])
            .inc_by(report.frames_duplicate as u64);
        self.frames_dropped_total
            .with_label_values(&["rejected"])
            .inc_by(report.frames_rejected as u64);

        for technique in TECHNIQUES {
            self.seams_total
                .with_label_values(&[technique.as_str()])
                .inc_by(report.seams_by(technique) as u64);
        }
        let confident = report.seams.iter().filter(|s| s.estimate.confident).count();
        self.confident_seams_total.inc_by(confident as u64);

        self.output_width.set(report.width as i64);
        self.output_height.set(report.height as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::OverlapEstimate;
    use crate::stitcher::SeamReport;

    fn seam(index: usize, technique: Technique, confident: bool) -> SeamReport {
        SeamReport {
            index,
            sequence: index as u64 + 2,
            estimate: OverlapEstimate {
                rows: 40,
                confident,
                technique,
                score: None,
            },
            overlap: 40,
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let report = StitchReport {
            frames_in: 4,
            frames_rejected: 0,
            frames_duplicate: 1,
            seams: vec![
                seam(0, Technique::Features, true),
                seam(1, Technique::Fallback, false),
            ],
            concatenated: false,
            width: 320,
            height: 900,
        };
        registry.update(&report);

        let output = registry.encode().unwrap();
        assert!(output.contains("scroll_stitch_runs_total 1"));
        assert!(output.contains("scroll_stitch_frames_total 4"));
        assert!(output.contains("scroll_stitch_frames_dropped_total{reason=\"duplicate\"} 1"));
        assert!(output.contains("scroll_stitch_seams_total{technique=\"features\"} 1"));
        assert!(output.contains("scroll_stitch_seams_total{technique=\"template\"} 0"));
        assert!(output.contains("scroll_stitch_confident_seams_total 1"));
        assert!(output.contains("scroll_stitch_output_height_pixels 900"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("scroll_stitch_runs_total"));
        assert!(output.contains("scroll_stitch_concat_fallbacks_total"));
        assert!(output.contains("scroll_stitch_seams_total"));
    }
}
