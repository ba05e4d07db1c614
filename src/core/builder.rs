use std::sync::Arc;

use super::bus::{Bus, ErrorHandler, Inner, Mediator};
use super::config::BusConfig;
use crate::error::{BusError, ErrorDetails};
use crate::events::EventItem;
use crate::host::{Defer, Timer, TokioHost};
use crate::inspectors::Inspect;

/// Builder for constructing a [`Bus`] with optional hooks.
///
/// Without explicit ports the bus runs on a [`TokioHost`] spawned on the current
/// runtime.
pub struct BusBuilder {
    cfg: BusConfig,
    defer: Option<Arc<dyn Defer>>,
    timer: Option<Arc<dyn Timer>>,
    error_handler: Option<ErrorHandler>,
    mediator: Option<Mediator>,
    inspectors: Vec<Arc<dyn Inspect>>,
}

impl BusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            defer: None,
            timer: None,
            error_handler: None,
            mediator: None,
            inspectors: Vec::new(),
        }
    }

    /// Uses one host for both ticks and timers.
    pub fn with_host<H: Defer + Timer>(mut self, host: Arc<H>) -> Self {
        let defer: Arc<dyn Defer> = host.clone();
        let timer: Arc<dyn Timer> = host;
        self.defer = Some(defer);
        self.timer = Some(timer);
        self
    }

    /// Sets the tick scheduling port.
    pub fn with_defer(mut self, defer: Arc<dyn Defer>) -> Self {
        self.defer = Some(defer);
        self
    }

    /// Sets the timer port.
    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Replaces the default `tracing` error handler.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &ErrorDetails) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Installs a batch mediator.
    pub fn with_mediator<F>(mut self, mediator: F) -> Self
    where
        F: Fn(Vec<EventItem>) -> Vec<EventItem> + Send + Sync + 'static,
    {
        self.mediator = Some(Arc::new(mediator));
        self
    }

    /// Sets inspectors that observe every bus action.
    ///
    /// They stay registered for the lifetime of the bus.
    pub fn with_inspectors(mut self, inspectors: Vec<Arc<dyn Inspect>>) -> Self {
        self.inspectors = inspectors;
        self
    }

    /// Builds the bus.
    ///
    /// Missing ports are filled by a single [`TokioHost`].
    ///
    /// # Errors
    /// [`BusError::NoHost`] when a port is missing and no Tokio runtime is running.
    pub fn build(self) -> Result<Bus, BusError> {
        let (defer, timer) = match (self.defer, self.timer) {
            (Some(defer), Some(timer)) => (defer, timer),
            (defer, timer) => {
                tokio::runtime::Handle::try_current().map_err(|_| BusError::NoHost)?;
                let host = Arc::new(TokioHost::new());
                let fallback_defer: Arc<dyn Defer> = host.clone();
                let fallback_timer: Arc<dyn Timer> = host;
                (
                    defer.unwrap_or(fallback_defer),
                    timer.unwrap_or(fallback_timer),
                )
            }
        };

        let inner = Inner::new(defer, timer, self.cfg);
        if let Some(handler) = self.error_handler {
            inner.set_error_handler(handler);
        }
        inner.set_mediator(self.mediator);
        for inspector in self.inspectors {
            inner.add_inspector(inspector);
        }

        Ok(Bus {
            inner: Arc::new(inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;
    use crate::inspectors::Inspection;
    use parking_lot::Mutex;

    #[test]
    fn test_build_without_runtime_needs_host() {
        let err = Bus::builder(BusConfig::default()).build().unwrap_err();
        assert!(matches!(err, BusError::NoHost));
    }

    #[test]
    fn test_hooks_are_installed() {
        let host = ManualHost::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let s = Arc::clone(&seen);
        let inspector: Arc<dyn Inspect> = Arc::new(move |r: &Inspection| {
            s.lock().push(format!("{}:{}", r.action.as_label(), r.topic));
        });

        let bus = Bus::builder(BusConfig::default())
            .with_host(host.clone())
            .with_inspectors(vec![inspector])
            .with_mediator(|mut batch: Vec<EventItem>| {
                batch.retain(|i| &*i.topic != "drop");
                batch
            })
            .build()
            .unwrap();

        let _a = bus.publish("keep", 1).unwrap();
        let _b = bus.publish("drop", 2).unwrap();
        host.run_until_idle();

        assert_eq!(&*seen.lock(), &["publish:keep", "publish:drop"]);
    }

    #[tokio::test]
    async fn test_build_spawns_tokio_host() {
        let bus = Bus::builder(BusConfig::default()).build().unwrap();
        bus.publish("ping", ()).unwrap().await.unwrap();
        assert_eq!(bus.last_cycle_id(), Some(1));
    }
}
