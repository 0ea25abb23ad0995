use std::fmt;

/// Logging context handed to every component that reports progress.
///
/// Verbose loggers emit progress at `info`, quiet ones at `debug`, so a
/// subscriber can still pick the lines up without the caller opting in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    verbose: bool,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn progress(&self, args: fmt::Arguments<'_>) {
        if self.verbose {
            tracing::info!("{}", args);
        } else {
            tracing::debug!("{}", args);
        }
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!("{}", args);
    }
}
