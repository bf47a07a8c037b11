//! Full measurements on a simulated counter card, with the tokio clock paused
//! so counts come out exact.

use daq_core::{Channel, ChannelState};
use daq_detector::{preset_map, DetectorConfig, DetectorForecast, DispatchMode, MultiChannelDetector};
use daq_driver_mock::{CounterKind, MockCounter, MockGate, MockTimer};
use std::sync::Arc;
use std::time::Duration;

/// timer + mon1 (1000 cts/s) + det1 (100 cts/s) on one card.
fn card_detector(config: DetectorConfig) -> Arc<MultiChannelDetector> {
    let gate = Arc::new(MockGate::new());
    let detector = MultiChannelDetector::builder()
        .config(config)
        .timer(Arc::new(MockTimer::builder("timer").gate(gate.clone()).build()))
        .monitor(Arc::new(
            MockCounter::builder("mon1")
                .kind(CounterKind::Monitor)
                .gate(gate.clone())
                .build(),
        ))
        .counter(Arc::new(
            MockCounter::builder("det1").count_rate(100.0).gate(gate).build(),
        ))
        .build()
        .unwrap();
    Arc::new(detector)
}

async fn advance_secs(secs: f64) {
    tokio::time::advance(Duration::from_secs_f64(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_timed_measurement() {
    let detector = card_detector(DetectorConfig::default());
    detector.set_preset(&preset_map([("t", 10.0)])).await.unwrap();
    detector.start(None).await.unwrap();
    assert_eq!(detector.masters().await, ["timer"]);

    advance_secs(4.0).await;
    assert_eq!(detector.status(None).await.unwrap().state, ChannelState::Busy);
    assert!(!detector.is_completed().await.unwrap());
    assert_eq!(detector.read(None).await.unwrap(), [4.0, 4000.0, 400.0]);

    advance_secs(6.0).await;
    assert!(detector.is_completed().await.unwrap());
    assert_eq!(detector.status(None).await.unwrap().state, ChannelState::Ok);
    assert_eq!(detector.read(None).await.unwrap(), [10.0, 10_000.0, 1000.0]);

    // Slaves stopped with the master's gate.
    advance_secs(30.0).await;
    assert_eq!(detector.read(None).await.unwrap(), [10.0, 10_000.0, 1000.0]);
}

#[tokio::test(start_paused = true)]
async fn test_first_master_to_finish_wins() {
    let detector = card_detector(DetectorConfig::default());
    detector
        .start(Some(&preset_map([("t", 10.0), ("mon1", 5000.0)])))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(4900)).await;
    assert!(!detector.is_completed().await.unwrap());

    tokio::time::advance(Duration::from_millis(100)).await;
    assert!(detector.is_completed().await.unwrap());
    let values = detector.read(None).await.unwrap();
    assert_eq!(values, [5.0, 5000.0, 500.0]);

    let timer = detector.channel_for("t").unwrap();
    assert!(!timer.is_completed().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_preserve_counts() {
    let detector = card_detector(DetectorConfig {
        dispatch: DispatchMode::Concurrent,
        ..DetectorConfig::default()
    });
    detector.start(Some(&preset_map([("t", 10.0)]))).await.unwrap();

    advance_secs(3.0).await;
    assert!(detector.pause().await.unwrap());
    advance_secs(100.0).await;
    assert_eq!(detector.read(None).await.unwrap(), [3.0, 3000.0, 300.0]);
    assert_eq!(detector.status(None).await.unwrap().message, "paused");

    detector.resume().await.unwrap();
    advance_secs(7.0).await;
    assert!(detector.is_completed().await.unwrap());
    assert_eq!(detector.read(None).await.unwrap(), [10.0, 10_000.0, 1000.0]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_measurement_early() {
    let detector = card_detector(DetectorConfig::default());
    detector.start(Some(&preset_map([("det1", 1e6)]))).await.unwrap();

    advance_secs(2.0).await;
    detector.stop().await.unwrap();
    detector.stop().await.unwrap();
    advance_secs(2.0).await;

    assert!(!detector.is_completed().await.unwrap());
    assert_eq!(detector.status(None).await.unwrap().state, ChannelState::Ok);
    assert_eq!(detector.read(None).await.unwrap(), [2.0, 2000.0, 200.0]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_with_new_presets() {
    let detector = card_detector(DetectorConfig::default());
    detector.start(Some(&preset_map([("t", 1.0)]))).await.unwrap();
    advance_secs(2.0).await;
    assert!(detector.is_completed().await.unwrap());

    detector.start(Some(&preset_map([("mon1", 3000.0)]))).await.unwrap();
    assert_eq!(detector.masters().await, ["mon1"]);
    assert!(!detector.is_completed().await.unwrap());

    advance_secs(5.0).await;
    assert!(detector.is_completed().await.unwrap());
    assert_eq!(detector.read(None).await.unwrap(), [3.0, 3000.0, 300.0]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_zeroes_every_channel() {
    let detector = card_detector(DetectorConfig::default());
    detector.start(Some(&preset_map([("t", 10.0)]))).await.unwrap();
    advance_secs(2.0).await;

    detector.reset().await.unwrap();
    assert_eq!(detector.read(None).await.unwrap(), [0.0, 0.0, 0.0]);
    assert_eq!(detector.status(None).await.unwrap().state, ChannelState::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_forecast_during_timed_measurement() {
    let detector = card_detector(DetectorConfig::default());
    let forecast = DetectorForecast::new(detector.clone()).with_max_age(Duration::ZERO);
    detector.start(Some(&preset_map([("t", 10.0)]))).await.unwrap();

    advance_secs(2.5).await;
    assert_eq!(forecast.completion_fraction().await.unwrap(), 0.25);
    assert_eq!(forecast.read().await.unwrap(), [10.0, 10_000.0, 1000.0]);
    assert_eq!(
        forecast.remaining_time(Duration::from_secs_f64(2.5)).await.unwrap(),
        Some(Duration::from_secs_f64(7.5))
    );

    advance_secs(10.0).await;
    assert_eq!(forecast.completion_fraction().await.unwrap(), 1.0);
    assert_eq!(
        forecast.remaining_time(Duration::from_secs(10)).await.unwrap(),
        Some(Duration::ZERO)
    );
}

#[tokio::test(start_paused = true)]
async fn test_forecast_without_master_is_raw_reading() {
    let detector = card_detector(DetectorConfig::default());
    let forecast = DetectorForecast::new(detector.clone()).with_max_age(Duration::ZERO);
    detector.start(None).await.unwrap();

    advance_secs(2.0).await;
    assert_eq!(forecast.read().await.unwrap(), detector.read(None).await.unwrap());
    assert_eq!(forecast.completion_fraction().await.unwrap(), 0.0);
    assert_eq!(forecast.remaining_time(Duration::from_secs(2)).await.unwrap(), None);
    detector.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_forecast_does_not_touch_lifecycle() {
    let detector = card_detector(DetectorConfig::default());
    let forecast = DetectorForecast::new(detector.clone());
    detector.start(Some(&preset_map([("t", 10.0)]))).await.unwrap();

    advance_secs(1.0).await;
    forecast.read().await.unwrap();
    assert_eq!(detector.masters().await, ["timer"]);
    assert!(detector.status(None).await.unwrap().is_busy());
    assert_eq!(forecast.value_info(), detector.value_info());
}
