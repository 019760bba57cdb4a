use lumacheck_common::frame::Frame;
use lumacheck_metrics::{
    assess_capture, estimate_brightness, BrightnessScore, BrightnessThreshold, CaptureAssessment,
    CapturePolicy, Indicator, SharpnessEstimator,
};
use lumacheck_metrics::sharpness::ComputeBackend;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

/// Result of processing one frame, handed back to the reporting side.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReading {
    pub seq: u64,
    pub captured_at_ms: Option<i64>,
    pub brightness: BrightnessScore,
    pub threshold: BrightnessThreshold,
    pub indicator: Indicator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureAssessment>,
}

/// A frame plus whether the shutter was pressed on it.
///
/// The request travels with its frame so a lagging worker still assesses
/// the frame the shutter was pressed on.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub frame: Frame,
    pub capture: bool,
}

impl FrameJob {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            capture: false,
        }
    }

    pub fn with_capture(frame: Frame) -> Self {
        Self {
            frame,
            capture: true,
        }
    }
}

/// Per-frame processing loop.
///
/// Metric work runs on the blocking pool; the brightness threshold is read
/// from the watch channel when each frame is evaluated.
pub struct FrameWorker<B> {
    estimator: Arc<SharpnessEstimator<B>>,
    policy: CapturePolicy,
    threshold: watch::Receiver<BrightnessThreshold>,
}

impl<B: ComputeBackend + 'static> FrameWorker<B> {
    pub fn new(
        estimator: SharpnessEstimator<B>,
        policy: CapturePolicy,
        threshold: watch::Receiver<BrightnessThreshold>,
    ) -> Self {
        Self {
            estimator: Arc::new(estimator),
            policy,
            threshold,
        }
    }

    /// Process frames until the frame channel closes or the reading
    /// receiver is dropped. Returns the number of readings sent.
    ///
    /// A capture request on a frame that cannot be measured moves to the
    /// next frame.
    pub async fn run(
        self,
        mut jobs: mpsc::Receiver<FrameJob>,
        readings: mpsc::Sender<FrameReading>,
    ) -> u64 {
        let mut sent = 0u64;
        let mut carried = false;

        while let Some(FrameJob { frame, capture }) = jobs.recv().await {
            let capture_now = capture || carried;
            carried = false;
            let estimator = Arc::clone(&self.estimator);
            let policy = self.policy;

            let joined = tokio::task::spawn_blocking(move || {
                let brightness = estimate_brightness(&frame);
                let capture = match (&brightness, capture_now) {
                    (Ok(_), true) => Some(assess_capture(&estimator, &policy, &frame)),
                    _ => None,
                };
                (frame.seq, frame.captured_at_ms, brightness, capture)
            })
            .await;

            let (seq, captured_at_ms, brightness, capture) = match joined {
                Ok(out) => out,
                Err(e) => {
                    error!(error = %e, "frame task failed");
                    carried = capture_now;
                    continue;
                }
            };

            let brightness = match brightness {
                Ok(b) => b,
                Err(e) => {
                    warn!(seq, error = %e, "brightness failed, skipping frame");
                    carried = capture_now;
                    continue;
                }
            };

            let capture = match capture {
                Some(Ok(assessment)) => Some(assessment),
                Some(Err(e)) => {
                    warn!(seq, error = %e, "sharpness check failed");
                    None
                }
                None => None,
            };

            let threshold = *self.threshold.borrow();
            let indicator = Indicator::evaluate(brightness, threshold);
            debug!(
                seq,
                brightness = format!("{:.2}", brightness.value()),
                threshold = threshold.value(),
                ?indicator,
                "frame processed"
            );

            let reading = FrameReading {
                seq,
                captured_at_ms,
                brightness,
                threshold,
                indicator,
                capture,
            };
            if readings.send(reading).await.is_err() {
                debug!("reading receiver dropped, stopping worker");
                break;
            }
            sent += 1;
        }

        if carried {
            warn!("capture requested on an unmeasurable last frame; nothing captured");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumacheck_common::frame::PixelLayout;
    use lumacheck_metrics::sharpness::CpuBackend;
    use lumacheck_metrics::CaptureDecision;

    fn gray(v: u8, seq: u64) -> Frame {
        Frame::solid(4, 4, [v, v, v]).with_meta(seq, 1708300000000 + seq as i64)
    }

    struct Harness {
        jobs: mpsc::Sender<FrameJob>,
        readings: mpsc::Receiver<FrameReading>,
        threshold: watch::Sender<BrightnessThreshold>,
        worker: tokio::task::JoinHandle<u64>,
    }

    fn start(policy: CapturePolicy) -> Harness {
        let (job_tx, job_rx) = mpsc::channel(4);
        let (reading_tx, reading_rx) = mpsc::channel(4);
        let (threshold_tx, threshold_rx) = watch::channel(BrightnessThreshold::default());
        let worker = FrameWorker::new(
            SharpnessEstimator::new(CpuBackend::new()),
            policy,
            threshold_rx,
        );
        let worker = tokio::spawn(worker.run(job_rx, reading_tx));
        Harness {
            jobs: job_tx,
            readings: reading_rx,
            threshold: threshold_tx,
            worker,
        }
    }

    #[tokio::test]
    async fn threshold_update_applies_to_next_frame() {
        let mut h = start(CapturePolicy::default());

        h.jobs.send(FrameJob::new(gray(50, 1))).await.unwrap();
        let first = h.readings.recv().await.unwrap();
        assert_eq!(first.indicator, Indicator::Ok);
        assert_eq!(first.threshold.value(), 40.0);

        h.threshold.send(BrightnessThreshold::new(60.0)).unwrap();
        h.jobs.send(FrameJob::new(gray(50, 2))).await.unwrap();
        let second = h.readings.recv().await.unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.indicator, Indicator::TooDark);
        assert_eq!(second.threshold.value(), 60.0);

        drop(h.jobs);
        assert_eq!(h.worker.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn capture_applies_only_to_its_frame() {
        let mut h = start(CapturePolicy::new(Some(1.0)));

        h.jobs.send(FrameJob::with_capture(gray(120, 1))).await.unwrap();
        h.jobs.send(FrameJob::new(gray(120, 2))).await.unwrap();

        let captured = h.readings.recv().await.unwrap();
        let assessment = captured.capture.expect("first frame should be assessed");
        assert_eq!(assessment.decision, CaptureDecision::Retake);

        let next = h.readings.recv().await.unwrap();
        assert_eq!(next.seq, 2);
        assert!(next.capture.is_none());
    }

    #[tokio::test]
    async fn queued_frames_keep_their_own_capture_flag() {
        // Fill the queue before the worker runs so it lags behind.
        let (job_tx, job_rx) = mpsc::channel(4);
        for seq in 1..=3 {
            let frame = gray(90, seq);
            let job = if seq == 3 {
                FrameJob::with_capture(frame)
            } else {
                FrameJob::new(frame)
            };
            job_tx.send(job).await.unwrap();
        }
        drop(job_tx);

        let (reading_tx, mut reading_rx) = mpsc::channel(4);
        let (_threshold_tx, threshold_rx) = watch::channel(BrightnessThreshold::default());
        let worker = FrameWorker::new(
            SharpnessEstimator::new(CpuBackend::new()),
            CapturePolicy::default(),
            threshold_rx,
        );
        assert_eq!(worker.run(job_rx, reading_tx).await, 3);

        let mut captured = Vec::new();
        while let Some(reading) = reading_rx.recv().await {
            if reading.capture.is_some() {
                captured.push(reading.seq);
            }
        }
        assert_eq!(captured, vec![3]);
    }

    #[tokio::test]
    async fn empty_frame_is_skipped_and_capture_carries_over() {
        let mut h = start(CapturePolicy::default());

        let empty = Frame::new(0, 0, PixelLayout::Rgb8, vec![]).unwrap().with_meta(1, 0);
        h.jobs.send(FrameJob::with_capture(empty)).await.unwrap();
        h.jobs.send(FrameJob::new(gray(10, 2))).await.unwrap();
        h.jobs.send(FrameJob::new(gray(10, 3))).await.unwrap();

        let reading = h.readings.recv().await.unwrap();
        assert_eq!(reading.seq, 2);
        assert_eq!(reading.indicator, Indicator::TooDark);
        let assessment = reading.capture.expect("capture should move to the next frame");
        assert_eq!(assessment.decision, CaptureDecision::Accept);

        let after = h.readings.recv().await.unwrap();
        assert_eq!(after.seq, 3);
        assert!(after.capture.is_none());
    }

    #[tokio::test]
    async fn reading_serializes_without_empty_capture() {
        let mut h = start(CapturePolicy::default());
        h.jobs.send(FrameJob::new(gray(80, 5))).await.unwrap();
        let reading = h.readings.recv().await.unwrap();
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["seq"], 5);
        assert_eq!(json["indicator"], "ok");
        assert!(json.get("capture").is_none());
    }
}
