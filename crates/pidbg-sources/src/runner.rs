//! Periodic sampling loop shared by all adapters.

use crate::error::SourceResult;
use pidbg_core::Reading;
use pidbg_engine::{DispatcherHandle, EngineError};
use pidbg_telemetry::Metrics;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A source that produces readings on demand.
pub trait Sampler: Send + 'static {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Take one sample. An error skips this cycle.
    fn sample(&mut self) -> impl Future<Output = SourceResult<Vec<Reading>>> + Send;

    /// Release resources once the loop has stopped.
    fn stop(&mut self) {}
}

/// Run `sampler` every `period` until `cancel` fires or the engine stops
/// accepting readings. Cancellation also interrupts a slow sample.
pub async fn run_sampler<S: Sampler>(
    mut sampler: S,
    period: Duration,
    handle: DispatcherHandle,
    cancel: CancellationToken,
) {
    let source = sampler.name();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(source, period_ms = period.as_millis() as u64, "Sampler started");

    'outer: loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // A sample or submit in flight is abandoned on cancel.
        let sampled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sampled = sampler.sample() => sampled,
        };
        let readings = match sampled {
            Ok(readings) => readings,
            Err(e) => {
                warn!(source, error = %e, "Sample failed, skipping cycle");
                Metrics::source_failure(source);
                continue;
            }
        };

        for reading in readings {
            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'outer,
                submitted = handle.submit(reading) => submitted,
            };
            match submitted {
                Ok(()) => {}
                Err(EngineError::NotAccepting) => {
                    debug!(source, "Engine no longer accepting, stopping sampler");
                    break 'outer;
                }
                Err(e) => warn!(source, error = %e, "Submit failed"),
            }
        }
    }

    sampler.stop();
    info!(source, "Sampler stopped");
}

/// Spawn `run_sampler` on the current runtime.
pub fn spawn_sampler<S: Sampler>(
    sampler: S,
    period: Duration,
    handle: DispatcherHandle,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_sampler(sampler, period, handle, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use pidbg_core::{CustomEntry, EventKind};
    use pidbg_engine::{Engine, EngineConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Counter {
        n: u64,
        stopped: Arc<AtomicBool>,
    }

    impl Sampler for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn sample(&mut self) -> SourceResult<Vec<Reading>> {
            self.n += 1;
            if self.n == 2 {
                return Err(SourceError::Gpio("flaky".into()));
            }
            Ok(vec![Reading::Custom(CustomEntry::new(
                "counter",
                serde_json::json!({ "n": self.n }),
            ))])
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_failed_cycle_is_skipped_and_stop_runs() {
        let engine = Engine::start(EngineConfig::default());
        let gateway = engine.gateway();
        let mut stream = gateway.subscribe().unwrap();
        let cancel = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let task = spawn_sampler(
            Counter {
                n: 0,
                stopped: stopped.clone(),
            },
            Duration::from_millis(5),
            engine.handle(),
            cancel.clone(),
        );

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let event = stream.recv().await.unwrap();
            if event.kind == EventKind::Custom {
                seen.push(event.payload["payload"]["n"].as_u64().unwrap());
            }
        }
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(seen, vec![1, 3]);
        assert!(stopped.load(Ordering::SeqCst));
        engine.shutdown().await;
    }

    struct Stuck {
        stopped: Arc<AtomicBool>,
    }

    impl Sampler for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn sample(&mut self) -> SourceResult<Vec<Reading>> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(Vec::new())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_sample() {
        let engine = Engine::start(EngineConfig::default());
        let cancel = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let task = spawn_sampler(
            Stuck {
                stopped: stopped.clone(),
            },
            Duration::from_millis(10),
            engine.handle(),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .expect("sampler kept running after cancel")
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(stopped.load(Ordering::SeqCst));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_stops_when_engine_shuts_down() {
        let engine = Engine::start(EngineConfig::default());
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = engine.handle();
        engine.shutdown().await;

        let task = spawn_sampler(
            Counter {
                n: 0,
                stopped: stopped.clone(),
            },
            Duration::from_millis(1),
            handle,
            CancellationToken::new(),
        );
        task.await.unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }
}
