use std::sync::Arc;

use futures::future::join_all;
use tokio::time::{Duration, Instant};

use crate::error::DetectorError;
use crate::models::{DetectionResult, SourceKind, WindowContext};
use crate::sensing::{with_timeout, Detector};

/// Outcome of one detector call within a cycle.
#[derive(Debug)]
pub struct Invocation {
    pub kind: SourceKind,
    pub outcome: Result<DetectionResult, DetectorError>,
    pub latency: Duration,
}

impl Invocation {
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, Err(DetectorError::Timeout(_)))
    }
}

/// Run every detector concurrently against the same context and wait for all
/// of them. Each call is bounded by `budget`, so one stuck detector cannot
/// hold the round. Output order follows `detectors`.
///
/// Dropping the returned future drops every in-flight detector call.
pub async fn fan_out(
    detectors: &[Arc<dyn Detector>],
    context: &WindowContext,
    budget: Duration,
) -> Vec<Invocation> {
    let calls = detectors.iter().map(|detector| async move {
        let started = Instant::now();
        let outcome = with_timeout(budget, detector.detect(context)).await;
        Invocation {
            kind: detector.kind(),
            outcome,
            latency: started.elapsed(),
        }
    });

    join_all(calls).await
}
