//! Finds React / React Native components in JS/TS modules and routes them
//! through an instrumentation helper: `export default Screen` becomes
//! `export default instrument(Screen, 'Screen')`, plus the import.

pub mod config;
pub mod detect;
pub mod error;
pub mod fallback;
pub mod import_path;
#[cfg(feature = "plugin")]
pub mod plugin;
pub mod scan;
pub mod source;
pub mod strategy;
pub mod transform;

pub use config::InstrumentConfig;
pub use detect::{ComponentCandidate, DeclarationKind, Detector, ExportKind};
pub use error::{InstrumentError, Result};
pub use import_path::import_specifier;
pub use scan::{scan_tree, wrap_all, wrap_file, BatchReport, ScanReport, WrapReport, WrapRequest};
pub use source::SourceFile;
pub use strategy::{detect, transform, Strategy, StrategyKind, TransformResult};
pub use transform::{Transformer, WrapOutcome};

/// Logs to stderr, filtered by `RUST_LOG` (default `render_probe=info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("render_probe=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
