use lazy_static::lazy_static;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{prelude::*, EnvFilter};

lazy_static! {
    static ref DIAGNOSTICS: Arc<RwLock<Vec<String>>> = Arc::new(RwLock::new(Vec::new()));
}

pub fn init_logging() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(Level::INFO.into())
        .add_directive("gridsite=debug".parse().unwrap());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().pretty());

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set up tracing subscriber");
}

/// Append to the process-wide diagnostics sink. Non-fatal conditions from
/// every component land here as well as in each component's own log.
pub fn record_diagnostic(message: &str) {
    tracing::warn!("{}", message);
    DIAGNOSTICS.write().push(message.to_string());
}

pub fn drain_diagnostics() -> Vec<String> {
    std::mem::take(&mut *DIAGNOSTICS.write())
}

/// Append-only status log carried by the loaders and engines. Non-fatal
/// diagnostics accumulate here; fatal errors surface to the caller
/// immediately instead.
#[derive(Debug, Default, Clone)]
pub struct StatusLog {
    entries: Vec<String>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: String) {
        record_diagnostic(&message);
        self.entries.push(message);
    }

    pub fn get_log(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
