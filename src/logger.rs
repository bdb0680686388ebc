use std::fmt;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Custom error type for logger initialization
#[derive(Debug)]
pub enum InitializeLoggerError {
    SetGlobalDefaultError(String),
}

impl fmt::Display for InitializeLoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitializeLoggerError::SetGlobalDefaultError(e) => write!(
                f,
                "Logger already initialized or failed to set global default subscriber: {}",
                e
            ),
        }
    }
}

impl std::error::Error for InitializeLoggerError {}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise `verbose` selects TRACE
/// with the lifecycle targets forced on, and INFO otherwise.
pub fn initialize_logger(logger_name: &str, verbose: bool) -> Result<(), InitializeLoggerError> {
    let default_level = if verbose { Level::TRACE } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(format!(
                "{},relay_lifecycle=trace,session_lifecycle=trace,reaper=trace",
                default_level
            ))
        } else {
            EnvFilter::new(format!("{}", default_level))
        }
    });

    // Get the filter's string representation for logging *before* it's consumed
    let filter_str = filter.to_string();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_level(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        let msg = format!("Logger already initialized or failed to set: {}", e);
        tracing::debug!("{}", msg);
        InitializeLoggerError::SetGlobalDefaultError(e.to_string())
    })?;

    tracing::info!(
        target: "relay_lifecycle",
        "Logger initialized for '{}' with level {:?} (effective filter: {})",
        logger_name,
        default_level,
        filter_str
    );

    Ok(())
}
