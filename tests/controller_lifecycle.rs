//! Engine task lifecycle through `EngineController`.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use activity_sense::{Collaborators, EngineController, SourceKind};

use common::*;

const HOUR_MS: u64 = 3_600_000;

fn coding_controller() -> (EngineController, Arc<StubDetector>) {
    let accessibility = StubDetector::new(SourceKind::Accessibility, "coding fn main", 1.0);
    let collaborators = Collaborators::new(SwitchableContext::new(editor_window()))
        .with_detector(accessibility.clone())
        .with_classifier(Arc::new(FirstWordClassifier(0.9)));

    let mut config = config_with(weights(1.0, 0.0, 0.0, 0.0), 0.8);
    // only the immediate first tick fires during a test
    config.fusion_interval_ms = HOUR_MS;

    let controller = EngineController::new(config, collaborators).unwrap();
    (controller, accessibility)
}

#[tokio::test]
async fn test_requests_before_start_fail() {
    let (controller, _) = coding_controller();
    assert!(!controller.is_running());
    assert!(controller.force_immediate_cycle().await.is_err());
    assert!(controller.history(None, 10).await.is_err());
    assert!(controller.current_activity().is_none());
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (mut controller, _) = coding_controller();
    controller.start().unwrap();
    assert!(controller.start().is_err());
    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let collaborators = Collaborators::new(SwitchableContext::new(editor_window()));
    let config = config_with(weights(0.9, 0.9, 0.0, 0.0), 0.8);
    assert!(EngineController::new(config, collaborators).is_err());
}

#[tokio::test]
async fn test_forced_cycles_commit_and_publish() {
    let (mut controller, accessibility) = coding_controller();
    let mut watcher = controller.watch_activity();
    controller.start().unwrap();

    for _ in 0..3 {
        controller.force_immediate_cycle().await.unwrap();
    }

    let current = controller.current_activity().expect("committed after three cycles");
    assert_eq!(current.label, "coding");
    assert!((current.confidence - 0.9).abs() < 1e-9);
    assert!(watcher.has_changed().unwrap());
    assert_eq!(watcher.borrow_and_update().as_ref(), Some(&current));
    assert!(accessibility.call_count() >= 3);

    let history = controller.history(None, 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp >= history[1].timestamp);

    let stats = controller.statistics(chrono::Duration::minutes(1)).await.unwrap();
    assert!(stats.count >= 3);
    assert_eq!(stats.top_categories[0].category, "coding");

    let activity = controller.activity_history(None, 10).await.unwrap();
    assert_eq!(activity.len(), 1);

    let metrics = controller.metrics().await.unwrap();
    assert!(metrics.cycle_count >= 3);
    assert!(metrics.commit_count >= 1);

    let removed = controller
        .clear_history_older_than(chrono::Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert!(removed >= 4);

    controller.stop().await.unwrap();
    // the last published value stays readable after stop
    assert_eq!(controller.current_activity(), Some(current));
}

#[tokio::test]
async fn test_stop_cancels_in_flight_cycle() {
    let (mut controller, accessibility) = {
        let accessibility = StubDetector::new(SourceKind::Accessibility, "coding fn", 1.0);
        accessibility.delay(Duration::from_millis(HOUR_MS));
        let collaborators = Collaborators::new(SwitchableContext::new(editor_window()))
            .with_detector(accessibility.clone())
            .with_classifier(Arc::new(FirstWordClassifier(0.9)));
        let mut config = config_with(weights(1.0, 0.0, 0.0, 0.0), 0.8);
        config.fusion_interval_ms = HOUR_MS;
        config.timeouts.detector_ms = 2 * HOUR_MS;
        (EngineController::new(config, collaborators).unwrap(), accessibility)
    };

    controller.start().unwrap();
    accessibility.entered.notified().await;

    tokio::time::timeout(Duration::from_secs(5), controller.stop())
        .await
        .expect("stop must not wait for the detector")
        .unwrap();

    assert!(accessibility.dropped_mid_call.load(Ordering::SeqCst));
    assert!(!controller.is_running());
    assert!(controller.force_immediate_cycle().await.is_err());
    assert!(controller.metrics().await.is_err());
    assert!(controller.current_activity().is_none());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (mut controller, _) = coding_controller();
    controller.start().unwrap();
    controller.force_immediate_cycle().await.unwrap();
    controller.stop().await.unwrap();

    controller.start().unwrap();
    assert!(controller.current_activity().is_none());
    let metrics = controller.metrics().await.unwrap();
    // fresh engine state: at most the immediate first tick has run
    assert!(metrics.cycle_count <= 1);
    controller.stop().await.unwrap();
}
