//! Periodic metrics report task

use super::collector::MetricsCollector;
use crate::{RegistryError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Logs a consolidated [`MetricsCollector`] report on a fixed interval
pub struct MetricsReporter {
    collector: Arc<MetricsCollector>,
    interval: Duration,
    shutdown_tx: parking_lot::Mutex<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl MetricsReporter {
    pub fn new(collector: Arc<MetricsCollector>, interval: Duration) -> Self {
        Self {
            collector,
            interval,
            shutdown_tx: parking_lot::Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(RegistryError::AlreadyRunning("metrics reporter"));
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let collector = Arc::clone(&self.collector);
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => report(&collector),
                }
            }
        }));
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        info!("📊 Metrics reporter started (every {:?})", self.interval);
        Ok(())
    }

    /// Signal the report task and wait for it to exit
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Metrics reporter panicked: {}", e);
            }
            info!("📊 Metrics reporter stopped");
        }
        Ok(())
    }
}

fn report(collector: &MetricsCollector) {
    let stats = collector.snapshot();
    info!(
        lookups = stats.lookups,
        hit_rate = stats.hit_rate,
        prefilter_rejections = stats.prefilter_rejections,
        registrations = stats.registrations,
        coordinations = stats.coordinations,
        coordination_failures = stats.coordination_failures,
        "📊 Flow registry: {:.0} lookups/s, p50={}ns p99={}ns; {:.0} registrations/s, p99={}ns; coordination p99={}ns",
        stats.lookups_per_sec,
        stats.lookup_latency.p50_ns,
        stats.lookup_latency.p99_ns,
        stats.registrations_per_sec,
        stats.registration_latency.p99_ns,
        stats.coordination_latency.p99_ns,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_joins() {
        let collector = Arc::new(MetricsCollector::new());
        let reporter = MetricsReporter::new(Arc::clone(&collector), Duration::from_millis(10));

        reporter.start().await.unwrap();
        assert!(reporter.is_running().await);
        assert!(matches!(
            reporter.start().await,
            Err(RegistryError::AlreadyRunning(_))
        ));

        collector.record_lookup(Duration::from_micros(1), true);
        tokio::time::sleep(Duration::from_millis(30)).await;

        reporter.stop().await.unwrap();
        assert!(!reporter.is_running().await);

        // Restartable after stop
        reporter.start().await.unwrap();
        reporter.stop().await.unwrap();
    }
}
