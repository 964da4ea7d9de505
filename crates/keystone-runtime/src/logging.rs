//! `tracing` subscriber setup for the logging service.
//!
//! The logging service deserializes a [`LoggingConfig`] from its own
//! configuration section and installs it through [`LoggingBuilder`]. Hosts
//! that want logging before (or without) the service runtime can use the
//! builder directly.
//!
//! ```rust,ignore
//! use keystone_runtime::config::SpanEventConfig;
//! use keystone_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .directive("keystone_core=debug")
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig};

impl SpanEventConfig {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Span creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |events, (_, event)| events | event)
    }
}

/// Installs a subscriber built from `config`, ignoring an already installed one.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Global subscriber builder over [`LoggingConfig`] settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingBuilder {
    settings: LoggingConfig,
    /// Raw directives added on top of `settings.filters`.
    directives: Vec<String>,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            settings: config.clone(),
            directives: Vec::new(),
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.settings.level = level;
        self
    }

    /// Adds a filter directive such as `keystone_core=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.settings.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.settings.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.settings.output = output;
        self
    }

    /// Sends output to `path`, switching the output to [`LogOutput::File`].
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.output = LogOutput::File;
        self.settings.file_path = Some(path.into());
        self
    }

    /// Directives in application order: per-target filters, then raw ones.
    fn directives(&self) -> Vec<String> {
        self.settings
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .chain(self.directives.iter().cloned())
            .collect()
    }

    /// `RUST_LOG` if set, else the base level, plus every directive.
    fn build_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.settings.level.as_str()));

        for directive in self.directives() {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => warn!(%directive, error = %e, "Ignoring invalid log directive"),
            }
        }
        filter
    }

    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber, failing if a global one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let layer = self.fmt_layer(self.make_writer());
        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
    }

    fn make_writer(&self) -> BoxMakeWriter {
        match (self.settings.output, &self.settings.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let file_name = path.file_name().unwrap_or_else(|| OsStr::new("keystone.log"));
                BoxMakeWriter::new(tracing_appender::rolling::never(directory, file_name))
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        }
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let settings = &self.settings;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(settings.span_events.to_fmt_span())
            .with_thread_ids(settings.thread_ids)
            .with_file(settings.file_location)
            .with_line_number(settings.file_location);

        match settings.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_directives_from_config_then_builder() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            filters: BTreeMap::from([("keystone_core".to_string(), LogLevel::Trace)]),
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config).directive("figment=warn");
        assert_eq!(builder.settings.level, LogLevel::Debug);
        assert_eq!(builder.directives(), ["keystone_core=trace", "figment=warn"]);
    }

    #[test]
    fn test_span_event_presets() {
        assert_eq!(SpanEventConfig::default(), SpanEventConfig::NONE);
        assert_eq!(SpanEventConfig::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEventConfig::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEventConfig::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_file_switches_output() {
        let builder = LoggingBuilder::new()
            .output(LogOutput::Stderr)
            .file("/var/log/keystone.log");
        assert_eq!(builder.settings.output, LogOutput::File);
        assert_eq!(
            builder.settings.file_path.as_deref(),
            Some(Path::new("/var/log/keystone.log"))
        );
    }
}
