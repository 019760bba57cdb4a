use chrono::Utc;
use lumacheck_common::frame::{Frame, FrameError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::worker::FrameJob;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("{0}: {1}")]
    Frame(String, FrameError),
    #[error("decode task for {0} failed: {1}")]
    Task(String, tokio::task::JoinError),
}

/// Read and decode one image file, stamping it with `seq` and the current time.
pub async fn load_frame(path: &Path, seq: u64) -> Result<Frame, SourceError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SourceError::Read(path.display().to_string(), e))?;
    let frame = tokio::task::spawn_blocking(move || Frame::decode(&bytes))
        .await
        .map_err(|e| SourceError::Task(path.display().to_string(), e))?
        .map_err(|e| SourceError::Frame(path.display().to_string(), e))?;
    Ok(frame.with_meta(seq, Utc::now().timestamp_millis()))
}

/// Feed image files to the worker as a frame stream, in order.
///
/// Sequence numbers start at 1 and advance for every path, decodable or
/// not. Frame `n` carries a capture request for every `n` in `capture_on`.
/// Returns the number of frames sent.
pub async fn play(paths: Vec<PathBuf>, capture_on: &[u64], jobs: mpsc::Sender<FrameJob>) -> u64 {
    let capture_on: HashSet<u64> = capture_on.iter().copied().collect();
    let mut sent = 0u64;

    for (i, path) in paths.iter().enumerate() {
        let seq = i as u64 + 1;
        let frame = match load_frame(path, seq).await {
            Ok(f) => f,
            Err(e) => {
                warn!(seq, error = %e, "failed to load frame, skipping");
                continue;
            }
        };

        debug!(
            seq,
            path = path.display().to_string(),
            width = frame.width(),
            height = frame.height(),
            "frame loaded"
        );

        let job = if capture_on.contains(&seq) {
            info!(seq, "shutter pressed");
            FrameJob::with_capture(frame)
        } else {
            FrameJob::new(frame)
        };

        if jobs.send(job).await.is_err() {
            warn!("frame receiver dropped, stopping playback");
            break;
        }
        sent += 1;
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::FrameWorker;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use lumacheck_metrics::sharpness::{CpuBackend, SharpnessEstimator};
    use lumacheck_metrics::{BrightnessThreshold, CapturePolicy};
    use tokio::sync::watch;

    fn write_png(dir: &Path, name: &str, v: u8) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([v, v, v])))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumacheck-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn load_frame_decodes_and_stamps() {
        let dir = scratch_dir("load");
        let path = write_png(&dir, "a.png", 77);
        let frame = load_frame(&path, 3).await.unwrap();
        assert_eq!(frame.seq, 3);
        assert!(frame.captured_at_ms.is_some());
        assert_eq!(frame.rgb_at(0, 0), [77, 77, 77]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let err = load_frame(Path::new("/nonexistent/frame.png"), 1).await.unwrap_err();
        assert!(matches!(err, SourceError::Read(..)));
    }

    #[tokio::test]
    async fn play_skips_bad_files_and_flags_the_configured_frame() {
        let dir = scratch_dir("play");
        let good1 = write_png(&dir, "1.png", 10);
        let bad = dir.join("2.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let good3 = write_png(&dir, "3.png", 30);

        let (tx, mut rx) = mpsc::channel(8);
        let sent = play(vec![good1, bad, good3], &[3], tx).await;

        assert_eq!(sent, 2);
        let first = rx.recv().await.unwrap();
        assert_eq!((first.frame.seq, first.capture), (1, false));
        let third = rx.recv().await.unwrap();
        assert_eq!((third.frame.seq, third.capture), (3, true));
        assert!(rx.recv().await.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn lagging_worker_captures_the_configured_frame() {
        let dir = scratch_dir("lag");
        let paths: Vec<PathBuf> = (1..=3)
            .map(|i| write_png(&dir, &format!("{i}.png"), 60))
            .collect();

        // Queue every frame before the worker starts.
        let (job_tx, job_rx) = mpsc::channel(8);
        assert_eq!(play(paths, &[3], job_tx).await, 3);

        let (reading_tx, mut reading_rx) = mpsc::channel(8);
        let (_threshold_tx, threshold_rx) = watch::channel(BrightnessThreshold::default());
        let worker = FrameWorker::new(
            SharpnessEstimator::new(CpuBackend::new()),
            CapturePolicy::default(),
            threshold_rx,
        );
        worker.run(job_rx, reading_tx).await;

        let mut captured = Vec::new();
        while let Some(reading) = reading_rx.recv().await {
            if reading.capture.is_some() {
                captured.push(reading.seq);
            }
        }
        assert_eq!(captured, vec![3]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
