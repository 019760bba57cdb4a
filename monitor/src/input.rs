use lumacheck_metrics::BrightnessThreshold;
use std::io::BufRead;
use tokio::sync::watch;
use tracing::{info, warn};

/// Apply every line of `reader` as a new brightness threshold.
///
/// Lines that are not numbers reset the level to the default, like the
/// threshold text field they replace. Stops at end of input, on a read
/// error, or when the worker has dropped its receiver. Returns the number
/// of updates applied.
///
/// Blocking: run it on a dedicated thread. Reading stdin on tokio's
/// blocking pool would stall runtime shutdown until the next line arrives.
pub fn follow_thresholds<R: BufRead>(reader: R, threshold: &watch::Sender<BrightnessThreshold>) -> u64 {
    let mut applied = 0u64;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "failed to read threshold input");
                break;
            }
        };

        let level = BrightnessThreshold::parse_or_default(&line);
        if threshold.send(level).is_err() {
            break;
        }
        info!(input = line.trim(), threshold = level.value(), "brightness threshold updated");
        applied += 1;
    }

    applied
}
