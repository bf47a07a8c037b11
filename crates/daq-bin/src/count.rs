//! One measurement from start to final reading, with forecast logging.

use anyhow::Result;
use daq_core::{Channel, ValueInfo};
use daq_detector::{DetectorForecast, MultiChannelDetector, PresetMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of [`run`].
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub values: Vec<f64>,
    pub elapsed: Duration,
    /// Ended by the shutdown signal rather than by a master.
    pub interrupted: bool,
}

/// Start `detector` with `presets`, poll every `interval` until a master
/// completes or `shutdown` resolves, then stop and read.
///
/// Without masters the count is open-ended and only `shutdown` ends it.
pub async fn run<F>(
    detector: Arc<MultiChannelDetector>,
    presets: &PresetMap,
    interval: Duration,
    shutdown: F,
) -> Result<Measurement>
where
    F: Future<Output = ()>,
{
    let forecast = DetectorForecast::new(detector.clone());

    detector.start(Some(presets)).await?;
    let started = Instant::now();
    let open_ended = detector.masters().await.is_empty();

    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let interrupted = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break true,
            _ = ticker.tick() => {}
        }

        if !open_ended && detector.is_completed().await? {
            break false;
        }
        let status = detector.status(None).await?;
        debug!(status = %status, "Polled detector");
        report_progress(&forecast, started.elapsed()).await?;
    };

    detector.stop().await?;
    if open_ended {
        // Nothing gates the slaves, so stop them one by one.
        for channel in detector.channels() {
            channel.stop().await?;
        }
    }
    if interrupted {
        warn!(detector = %detector.name(), "Measurement interrupted");
    }

    let measurement = Measurement {
        values: detector.read(None).await?,
        elapsed: started.elapsed(),
        interrupted,
    };
    info!(
        detector = %detector.name(),
        elapsed = ?measurement.elapsed,
        "Measurement finished"
    );
    Ok(measurement)
}

async fn report_progress(forecast: &DetectorForecast, elapsed: Duration) -> Result<()> {
    let fraction = forecast.completion_fraction().await?;
    let remaining = forecast.remaining_time(elapsed).await?;
    let projected = forecast.read().await?;
    info!(
        progress = %format!("{:.1}%", fraction * 100.0),
        remaining = ?remaining,
        forecast = ?projected,
        "Counting"
    );
    Ok(())
}

/// One line per channel: name, formatted value, unit.
pub fn format_reading(info: &[ValueInfo], values: &[f64]) -> Vec<String> {
    info.iter()
        .zip(values)
        .map(|(info, value)| {
            format!("{:<12} {:>14} {}", info.name, info.format_value(*value), info.unit)
                .trim_end()
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::SetupConfig;
    use daq_detector::preset_map;

    const SETUP: &str = r#"
        [timer]
        name = "timer"

        [[monitors]]
        name = "mon1"

        [[counters]]
        name = "det1"
        count_rate = 50.0
    "#;

    fn detector() -> Arc<MultiChannelDetector> {
        let setup: SetupConfig = toml::from_str(SETUP).unwrap();
        setup.build_detector().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_run_finishes_at_preset() {
        let measurement = run(
            detector(),
            &preset_map([("t", 2.0)]),
            Duration::from_millis(500),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert!(!measurement.interrupted);
        assert_eq!(measurement.values, vec![2.0, 2000.0, 100.0]);
        assert_eq!(measurement.elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_preset_ends_run() {
        let measurement = run(
            detector(),
            &preset_map([("t", 60.0), ("mon1", 1500.0)]),
            Duration::from_millis(250),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(measurement.values, vec![1.5, 1500.0, 75.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_ended_run_stops_on_shutdown() {
        let detector = detector();
        let measurement = run(
            detector.clone(),
            &PresetMap::new(),
            Duration::from_millis(500),
            tokio::time::sleep(Duration::from_secs(3)),
        )
        .await
        .unwrap();

        assert!(measurement.interrupted);
        assert_eq!(measurement.values, vec![3.0, 3000.0, 150.0]);
        for channel in detector.channels() {
            assert!(!channel.status(None).await.unwrap().is_busy());
        }
    }

    #[test]
    fn test_format_reading() {
        let info = vec![
            ValueInfo::time("timer"),
            ValueInfo::counts("mon1", daq_core::ValueType::Monitor),
        ];
        let lines = format_reading(&info, &[10.0, 5000.0]);
        assert_eq!(lines[0], "timer                10.000 s");
        assert_eq!(lines[1], "mon1                   5000 cts");
    }
}
