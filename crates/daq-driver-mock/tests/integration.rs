//! Integration tests for the mock counter card
//!
//! Exercises timer and counters through the `Channel` trait object, the way
//! the detector drives them.

use daq_core::{Channel, ChannelState, DriverError, DriverErrorKind};
use daq_driver_mock::*;
use std::sync::Arc;
use std::time::Duration;

fn card() -> (Arc<MockGate>, Vec<Arc<dyn Channel>>) {
    let gate = Arc::new(MockGate::new());
    let channels: Vec<Arc<dyn Channel>> = vec![
        Arc::new(MockTimer::builder("timer").gate(gate.clone()).build()),
        Arc::new(
            MockCounter::builder("mon1")
                .kind(CounterKind::Monitor)
                .count_rate(100.0)
                .gate(gate.clone())
                .build(),
        ),
        Arc::new(MockCounter::builder("det1").gate(gate.clone()).build()),
    ];
    (gate, channels)
}

async fn read_all(channels: &[Arc<dyn Channel>]) -> Vec<f64> {
    let mut values = Vec::new();
    for channel in channels {
        values.push(channel.read(None).await.unwrap());
    }
    values
}

#[tokio::test(start_paused = true)]
async fn test_monitor_master_gates_whole_card() {
    let (_gate, channels) = card();
    channels[1].params().assign_preset(500.0);

    channels[0].start().await.unwrap();
    channels[2].start().await.unwrap();
    channels[1].start().await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;

    assert!(channels[1].is_completed().await.unwrap());
    assert_eq!(read_all(&channels).await, vec![5.0, 500.0, 5000.0]);
    for channel in &channels {
        assert_eq!(channel.status(None).await.unwrap().state, ChannelState::Ok);
    }
}

#[tokio::test(start_paused = true)]
async fn test_master_stop_freezes_slaves() {
    let (gate, channels) = card();
    channels[0].params().assign_preset(100.0);

    channels[2].start().await.unwrap();
    channels[0].start().await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;
    channels[0].stop().await.unwrap();
    tokio::time::advance(Duration::from_secs(3)).await;

    assert!(gate.is_closed(tokio::time::Instant::now()));
    assert!(!channels[0].is_completed().await.unwrap());
    assert_eq!(channels[2].read(None).await.unwrap(), 3000.0);
}

#[tokio::test(start_paused = true)]
async fn test_master_pause_holds_slaves() {
    let (_gate, channels) = card();
    channels[0].params().assign_preset(10.0);

    channels[2].start().await.unwrap();
    channels[0].start().await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(channels[0].pause().await.unwrap());
    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(channels[2].read(None).await.unwrap(), 2000.0);
    assert_eq!(channels[2].status(None).await.unwrap().message, "paused");

    channels[0].resume().await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(channels[0].is_completed().await.unwrap());
    // mon1 was never started
    assert_eq!(read_all(&channels).await, vec![10.0, 0.0, 10_000.0]);
}

#[tokio::test(start_paused = true)]
async fn test_restart_begins_from_zero() {
    let (_gate, channels) = card();
    channels[0].params().assign_preset(1.0);
    channels[0].start().await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(channels[0].is_completed().await.unwrap());

    channels[0].params().assign_preset(4.0);
    channels[0].start().await.unwrap();
    assert!(!channels[0].is_completed().await.unwrap());
    assert_eq!(channels[0].read(None).await.unwrap(), 0.0);
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(channels[0].is_completed().await.unwrap());
}

#[tokio::test]
async fn test_communication_loss_reaches_caller() {
    let counter: Arc<dyn Channel> = Arc::new(
        MockCounter::builder("det1")
            .error_config(ErrorConfig::scenario(ErrorScenario::CommunicationLoss))
            .build(),
    );

    let err = counter.read(None).await.unwrap_err();
    let driver = err.downcast_ref::<DriverError>().unwrap();
    assert_eq!(driver.kind, DriverErrorKind::Communication);
    assert!(counter.stop().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_chaos_mode_sleeps_for_bus() {
    let timer = MockTimer::builder("timer")
        .mode(MockMode::Chaos)
        .timing(TimingConfig {
            communication_delay_ms: 10,
            arm_delay_ms: 40,
        })
        .build();

    let before = tokio::time::Instant::now();
    timer.start().await.unwrap();
    assert!(before.elapsed() >= Duration::from_millis(50));
}
