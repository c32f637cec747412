//! SWC plugin entrypoint: runs the transformer inside a bundler build.
//!
//! Plugin config (all keys optional, engine keys as in `InstrumentConfig`):
//!
//! ```json
//! { "importPath": "@/perf/instrument", "components": ["HomeScreen"] }
//! ```
//!
//! Without `components`, every detected component is wrapped. Without
//! `importPath` the module passes through untouched.

use serde::Deserialize;
use swc_core::{
    ecma::ast::Program,
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};

use crate::config::InstrumentConfig;
use crate::detect::Detector;
use crate::transform::Transformer;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    #[serde(flatten)]
    pub engine: InstrumentConfig,
    pub import_path: Option<String>,
    pub components: Option<Vec<String>>,
}

pub fn apply(config: &PluginConfig, program: &mut Program) {
    let Some(import_path) = config.import_path.as_deref() else {
        return;
    };
    let Program::Module(module) = program else {
        return;
    };

    let detected: Vec<String> = Detector::new(&config.engine)
        .candidates(module)
        .into_iter()
        .map(|c| c.name)
        .collect();
    let names: Vec<&String> = match &config.components {
        Some(list) => list.iter().filter(|name| detected.contains(name)).collect(),
        None => detected.iter().collect(),
    };

    let transformer = Transformer::new(&config.engine);
    for name in names {
        transformer.wrap(module, None, name, import_path);
    }
}

#[plugin_transform]
pub fn process_transform(mut program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let config: PluginConfig = metadata
        .get_transform_plugin_config()
        .map(|s| serde_json::from_str(&s).unwrap_or_default())
        .unwrap_or_default();

    apply(&config, &mut program);
    program
}
