//! Custom filtering for the logging system.

use std::marker::PhantomData;
use tracing::Subscriber;
use tracing_subscriber::Layer;

/// Filter that enables sampling of high-volume logs: always lets
/// warn/error through, samples everything else 1-in-`rate`.
pub struct SamplingFilter<S> {
    rate: u32,
    counter: std::sync::atomic::AtomicU32,
    _subscriber: PhantomData<S>,
}

impl<S> SamplingFilter<S> {
    /// Sample 1 in every `rate` events (e.g. rate=100 logs 1%).
    #[allow(dead_code)]
    pub fn new(rate: u32) -> Self {
        SamplingFilter {
            rate,
            counter: std::sync::atomic::AtomicU32::new(0),
            _subscriber: PhantomData,
        }
    }
}

impl<S> Layer<S> for SamplingFilter<S>
where
    S: Subscriber,
{
    fn enabled(
        &self,
        metadata: &tracing::Metadata<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        if metadata.level() <= &tracing::Level::WARN {
            return true;
        }

        let counter = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        counter % self.rate == 0
    }
}

#[cfg(feature = "dynamic-logging")]
/// Filter that dynamically adjusts log levels per target at runtime.
pub struct DynamicTargetFilter {
    filters: std::sync::Arc<std::sync::RwLock<std::collections::HashMap<String, tracing::Level>>>,
    default_level: tracing::Level,
}

#[cfg(feature = "dynamic-logging")]
impl DynamicTargetFilter {
    #[allow(dead_code)]
    pub fn new(default_level: tracing::Level) -> Self {
        DynamicTargetFilter {
            filters: std::sync::Arc::new(std::sync::RwLock::new(std::collections::HashMap::new())),
            default_level,
        }
    }

    #[allow(dead_code)]
    pub fn set_target_level(&self, target: &str, level: tracing::Level) {
        if let Ok(mut filters) = self.filters.write() {
            filters.insert(target.to_string(), level);
        }
    }

    #[allow(dead_code)]
    pub fn clear_target_level(&self, target: &str) {
        if let Ok(mut filters) = self.filters.write() {
            filters.remove(target);
        }
    }

    #[allow(dead_code)]
    pub fn set_default_level(&mut self, level: tracing::Level) {
        self.default_level = level;
    }
}

#[cfg(feature = "dynamic-logging")]
impl<S> Layer<S> for DynamicTargetFilter
where
    S: Subscriber,
{
    fn enabled(
        &self,
        metadata: &tracing::Metadata<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        let target = metadata.target();
        let level = if let Ok(filters) = self.filters.read() {
            *filters.get(target).unwrap_or(&self.default_level)
        } else {
            self.default_level
        };

        metadata.level() <= &level
    }
}
