//! render-probe CLI
//!
//! ```bash
//! # list components as JSON
//! render-probe scan ./app
//!
//! # wrap one component
//! render-probe wrap --root ./app --helper src/perf/instrument.ts src/screens/Home.tsx HomeScreen
//!
//! # wrap many, requests as a JSON array of {"file", "component"}
//! render-probe wrap-all --root ./app --helper src/perf/instrument.ts requests.json
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use render_probe::{init_tracing, scan_tree, wrap_all, wrap_file, InstrumentConfig, InstrumentError, WrapRequest};

#[derive(Parser)]
#[command(name = "render-probe", version)]
#[command(about = "Find UI components and wrap them in an instrumentation call", long_about = None)]
struct Cli {
    /// JSON config file (camelCase keys, all optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Name of the instrumentation function
    #[arg(long, global = true)]
    import_name: Option<String>,

    /// Files larger than this are not parsed
    #[arg(long, global = true)]
    max_file_bytes: Option<u64>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List exported components under a directory
    Scan {
        /// Directory to walk
        root: PathBuf,
    },

    /// Wrap one component in one file
    Wrap {
        /// Project root; FILE and --helper are relative to it
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Instrumentation helper module
        #[arg(long)]
        helper: PathBuf,

        file: PathBuf,

        component: String,
    },

    /// Wrap a batch of components read as JSON (stdin when no file is given)
    WrapAll {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        helper: PathBuf,

        requests: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Scan { root } => {
            let report = scan_tree(root, &config)?;
            print_json(&report, cli.pretty)?;
        }
        Commands::Wrap { root, helper, file, component } => {
            let report = wrap_file(root, file, &[component.as_str()], helper, &config)?;
            if report.components.is_empty() {
                return Err(InstrumentError::NoMatch {
                    path: report.file,
                    component: component.clone(),
                }
                .into());
            }
            print_json(&report, cli.pretty)?;
        }
        Commands::WrapAll { root, helper, requests } => {
            let requests = read_requests(requests.as_deref())?;
            debug!(count = requests.len(), "read wrap requests");
            let report = wrap_all(root, &requests, helper, &config);
            print_json(&report, cli.pretty)?;
            if report.failed > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<InstrumentConfig> {
    let mut config = match &cli.config {
        Some(path) => InstrumentConfig::load(path)?,
        None => InstrumentConfig::default(),
    };
    if let Some(name) = &cli.import_name {
        config.import_name = name.clone();
    }
    if let Some(limit) = cli.max_file_bytes {
        config.max_file_bytes = limit;
    }
    Ok(config)
}

fn read_requests(path: Option<&Path>) -> anyhow::Result<Vec<WrapRequest>> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("parsing wrap requests")
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
