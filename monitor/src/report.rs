use lumacheck_metrics::{CaptureDecision, Indicator};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::worker::FrameReading;

/// Running totals over a stream of readings.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub frames: u64,
    pub too_dark: u64,
    pub captures: u64,
    pub retakes: u64,
}

/// Consumes readings the way the preview UI would: the label only changes
/// when the indicator flips.
#[derive(Debug, Default)]
pub struct Reporter {
    json: bool,
    last_indicator: Option<Indicator>,
    summary: Summary,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            ..Self::default()
        }
    }

    /// Record a reading. Returns `true` when the indicator changed.
    pub fn observe(&mut self, reading: &FrameReading) -> bool {
        self.summary.frames += 1;
        if reading.indicator == Indicator::TooDark {
            self.summary.too_dark += 1;
        }

        let changed = self.last_indicator != Some(reading.indicator);
        if changed {
            info!(
                seq = reading.seq,
                brightness = format!("{:.2}", reading.brightness.value()),
                threshold = reading.threshold.value(),
                label = reading.indicator.label(),
                "indicator changed"
            );
            self.last_indicator = Some(reading.indicator);
        }

        if let Some(capture) = &reading.capture {
            self.summary.captures += 1;
            if capture.decision == CaptureDecision::Retake {
                self.summary.retakes += 1;
            }
        }

        if self.json {
            match serde_json::to_string(reading) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(seq = reading.seq, error = %e, "failed to serialize reading"),
            }
        }

        changed
    }

    /// Drain the reading channel until the worker stops.
    pub async fn run(mut self, mut readings: mpsc::Receiver<FrameReading>) -> Summary {
        while let Some(reading) = readings.recv().await {
            debug!(seq = reading.seq, "reading received");
            self.observe(&reading);
        }
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumacheck_metrics::{
        BrightnessScore, BrightnessThreshold, CaptureAssessment, VarianceResult,
    };

    fn reading(seq: u64, brightness: f64, capture: Option<CaptureDecision>) -> FrameReading {
        let threshold = BrightnessThreshold::default();
        let brightness = BrightnessScore(brightness);
        FrameReading {
            seq,
            captured_at_ms: None,
            brightness,
            threshold,
            indicator: Indicator::evaluate(brightness, threshold),
            capture: capture.map(|decision| CaptureAssessment {
                sharpness: VarianceResult { mean: 0.0, variance: 10.0 },
                decision,
            }),
        }
    }

    #[test]
    fn indicator_changes_are_detected() {
        let mut reporter = Reporter::new(false);
        assert!(reporter.observe(&reading(1, 80.0, None)));
        assert!(!reporter.observe(&reading(2, 75.0, None)));
        assert!(reporter.observe(&reading(3, 20.0, None)));
        assert!(!reporter.observe(&reading(4, 40.0, None)));
        assert!(reporter.observe(&reading(5, 41.0, None)));
    }

    #[tokio::test]
    async fn run_summarizes_stream() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(reading(1, 10.0, None)).await.unwrap();
        tx.send(reading(2, 90.0, Some(CaptureDecision::Retake))).await.unwrap();
        tx.send(reading(3, 90.0, Some(CaptureDecision::Accept))).await.unwrap();
        drop(tx);

        let summary = Reporter::new(false).run(rx).await;
        assert_eq!(
            summary,
            Summary {
                frames: 3,
                too_dark: 1,
                captures: 2,
                retakes: 1,
            }
        );
    }
}
