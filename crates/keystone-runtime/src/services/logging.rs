//! The logging service.
//!
//! Reads [`LoggingConfig`] from its own configuration section and installs
//! the global `tracing` subscriber. Once it is up, broker diagnostics are
//! routed through `tracing` as well.

use std::any::Any;
use std::sync::Arc;

use keystone_core::{
    DiagnosticSink, InitData, InitError, Initable, Lifecycle, Service, ServiceCore, TracingSink,
};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{LoggingConfig, validate_logging_config};
use crate::logging::LoggingBuilder;

#[derive(Default)]
pub struct LoggingService {
    core: ServiceCore,
    settings: RwLock<Option<LoggingConfig>>,
}

impl LoggingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings the service was initialized with.
    pub fn settings(&self) -> Option<LoggingConfig> {
        self.settings.read().clone()
    }

    fn read_settings(&self) -> Result<LoggingConfig, InitError> {
        let settings: LoggingConfig = self.configuration().deserialize().map_err(|e| {
            InitError::with_source(format!("Invalid settings for {}", self.name()), e)
        })?;
        validate_logging_config(&settings).map_err(|e| {
            InitError::with_source(format!("Invalid settings for {}", self.name()), e)
        })?;
        Ok(settings)
    }
}

impl Initable for LoggingService {
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn early_init(&self, _data: &InitData) -> Result<(), InitError> {
        self.late_init()
    }

    fn late_init(&self) -> Result<(), InitError> {
        let settings = self.read_settings()?;
        match LoggingBuilder::from_config(&settings).try_init() {
            Ok(()) => info!(
                service = %self.name(),
                level = %settings.level,
                format = ?settings.format,
                output = ?settings.output,
                "Logging initialized"
            ),
            // A host or test harness installed its own subscriber first.
            Err(e) => debug!(error = %e, "Global subscriber already installed, keeping it"),
        }
        *self.settings.write() = Some(settings);
        self.core.lifecycle().mark_initialized();
        Ok(())
    }
}

impl Service for LoggingService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    fn diagnostic_sink(self: Arc<Self>) -> Option<Arc<dyn DiagnosticSink>> {
        Some(Arc::new(TracingSink))
    }
}
