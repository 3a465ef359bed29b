//! Routes `log` macro output from the adapters crate into the same sink the
//! pipeline services write to, so HTTP retries and pipeline progress share one
//! stream and one verbosity switch.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use quill_core::{LogLevel, LogRecord, LogSink, StdoutLogSink};

pub struct SinkLogger {
    sink: StdoutLogSink,
}

impl SinkLogger {
    pub fn new(sink: StdoutLogSink) -> Self {
        Self { sink }
    }

    /// Registers the logger for the rest of the process.
    pub fn install(sink: StdoutLogSink) -> Result<(), SetLoggerError> {
        let max_level = level_filter(sink.min_level());
        let logger: &'static SinkLogger = Box::leak(Box::new(Self::new(sink)));
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.sink.enabled(from_log_level(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.sink.log(LogRecord::new(
            from_log_level(record.level()),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

pub fn from_log_level(level: Level) -> LogLevel {
    match level {
        Level::Error => LogLevel::Error,
        Level::Warn => LogLevel::Warn,
        Level::Info => LogLevel::Info,
        Level::Debug => LogLevel::Debug,
        Level::Trace => LogLevel::Trace,
    }
}

pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::Trace,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Error => LevelFilter::Error,
    }
}
