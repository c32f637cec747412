use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::InstrumentConfig;
use crate::detect::{ComponentCandidate, Detector};
use crate::error::{InstrumentError, Result};
use crate::fallback::PatternMatcher;
use crate::source::{parse, ParsedModule, SourceFile};
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Ast,
    Pattern,
}

/// One file's worth of detection and rewriting state.
///
/// `transform` may be called several times before `emit`; each call sees the
/// result of the previous ones.
pub trait Strategy {
    fn kind(&self) -> StrategyKind;

    fn detect(&self, config: &InstrumentConfig) -> Vec<ComponentCandidate>;

    /// Returns true when the text changed.
    fn transform(&mut self, config: &InstrumentConfig, component: &str, import_path: &str) -> bool;

    fn emit(&self) -> std::io::Result<String>;
}

pub struct AstStrategy {
    parsed: ParsedModule,
    /// Component names, computed on the first `transform`.
    detected: Option<HashSet<String>>,
}

impl AstStrategy {
    pub fn new(parsed: ParsedModule) -> Self {
        Self { parsed, detected: None }
    }
}

impl Strategy for AstStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ast
    }

    fn detect(&self, config: &InstrumentConfig) -> Vec<ComponentCandidate> {
        Detector::new(config).candidates(&self.parsed.module)
    }

    fn transform(&mut self, config: &InstrumentConfig, component: &str, import_path: &str) -> bool {
        let parsed = &mut self.parsed;
        let detected = self.detected.get_or_insert_with(|| {
            Detector::new(config).candidates(&parsed.module).into_iter().map(|c| c.name).collect()
        });
        if !detected.contains(component) {
            debug!(component, "not a detected component");
            return false;
        }
        let outcome =
            Transformer::new(config).wrap(&mut parsed.module, Some(&parsed.comments), component, import_path);
        debug!(component, ?outcome, "ast transform");
        outcome.is_wrapped()
    }

    fn emit(&self) -> std::io::Result<String> {
        self.parsed.print()
    }
}

pub struct PatternStrategy {
    text: String,
    matcher: PatternMatcher,
}

impl PatternStrategy {
    pub fn new(text: String) -> Self {
        Self { text, matcher: PatternMatcher::new() }
    }
}

impl Strategy for PatternStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pattern
    }

    fn detect(&self, _config: &InstrumentConfig) -> Vec<ComponentCandidate> {
        self.matcher.detect(&self.text)
    }

    fn transform(&mut self, config: &InstrumentConfig, component: &str, import_path: &str) -> bool {
        match self.matcher.transform(&self.text, component, &config.import_name, import_path) {
            Some(next) => {
                self.text = next;
                true
            }
            None => false,
        }
    }

    fn emit(&self) -> std::io::Result<String> {
        Ok(self.text.clone())
    }
}

/// AST strategy when the file parses and fits under the size ceiling,
/// pattern strategy otherwise.
pub fn select(file: &SourceFile, config: &InstrumentConfig) -> Box<dyn Strategy> {
    if file.is_oversize(config.max_file_bytes) {
        warn!(
            path = %file.path.display(),
            bytes = file.len(),
            limit = config.max_file_bytes,
            "degraded: file over size ceiling, using pattern matcher"
        );
        return Box::new(PatternStrategy::new(file.text.clone()));
    }
    match parse(file) {
        Ok(parsed) => Box::new(AstStrategy::new(parsed)),
        Err(failure) => {
            warn!(
                path = %file.path.display(),
                error = %failure.message,
                "degraded: parse failed, using pattern matcher"
            );
            Box::new(PatternStrategy::new(file.text.clone()))
        }
    }
}

// -----------------------------------------------------------------------------
// Detection
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct Detection {
    pub candidates: Vec<ComponentCandidate>,
    /// Produced by the pattern matcher.
    pub degraded: bool,
    /// Not looked at because of the size ceiling.
    pub skipped: bool,
}

impl Detection {
    pub fn names(&self) -> BTreeSet<String> {
        self.candidates.iter().map(|c| c.name.clone()).collect()
    }
}

pub fn detect_file(file: &SourceFile, config: &InstrumentConfig) -> Detection {
    if file.is_oversize(config.max_file_bytes) {
        warn!(
            path = %file.path.display(),
            bytes = file.len(),
            limit = config.max_file_bytes,
            "skipped: file over size ceiling"
        );
        return Detection { skipped: true, ..Default::default() };
    }
    let strategy = select(file, config);
    Detection {
        candidates: strategy.detect(config),
        degraded: strategy.kind() == StrategyKind::Pattern,
        skipped: false,
    }
}

/// Names of the components exported by `source_text`.
pub fn detect(source_text: &str, file_name: &str, config: &InstrumentConfig) -> BTreeSet<String> {
    detect_file(&SourceFile::new(file_name, source_text), config).names()
}

// -----------------------------------------------------------------------------
// Transformation
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub wrapped: bool,
    /// Rewritten text; `None` when it equals the input.
    pub code: Option<String>,
    pub degraded: bool,
    /// Components that were wrapped by this call, in request order.
    pub components: Vec<String>,
}

/// Wraps each of `components` in turn, then prints once.
pub fn transform_file<S: AsRef<str>>(
    file: &SourceFile,
    components: &[S],
    import_path: &str,
    config: &InstrumentConfig,
) -> Result<TransformResult> {
    let mut strategy = select(file, config);
    let degraded = strategy.kind() == StrategyKind::Pattern;

    let mut wrapped = Vec::new();
    for component in components {
        let component = component.as_ref();
        if strategy.transform(config, component, import_path) {
            wrapped.push(component.to_string());
        } else {
            debug!(path = %file.path.display(), component, "no change");
        }
    }

    if wrapped.is_empty() {
        return Ok(TransformResult { degraded, ..Default::default() });
    }

    let code = strategy
        .emit()
        .map_err(|source| InstrumentError::Emit { path: file.path.clone(), source })?;
    Ok(TransformResult {
        wrapped: true,
        code: (code != file.text).then_some(code),
        degraded,
        components: wrapped,
    })
}

pub fn transform(
    source_text: &str,
    file_name: &str,
    component: &str,
    import_path: &str,
    config: &InstrumentConfig,
) -> Result<TransformResult> {
    transform_file(&SourceFile::new(file_name, source_text), &[component], import_path, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn parsable_files_use_the_ast() {
        let file = SourceFile::new("Card.tsx", "export const Card = () => <View />;\n");
        assert_eq!(select(&file, &InstrumentConfig::default()).kind(), StrategyKind::Ast);
    }

    #[test]
    fn broken_files_use_patterns() {
        let file = SourceFile::new("Card.tsx", "export function Card( {{{ <View");
        let config = InstrumentConfig::default();
        assert_eq!(select(&file, &config).kind(), StrategyKind::Pattern);

        let detection = detect_file(&file, &config);
        assert!(detection.degraded);
        assert_eq!(detection.names(), names(&["Card"]));
    }

    #[test]
    fn oversize_detection_is_empty() {
        let config = InstrumentConfig { max_file_bytes: 64, ..Default::default() };
        let text = format!("export const Card = () => <View />;\n{}", "// padding\n".repeat(20));
        let detection = detect_file(&SourceFile::new("Card.tsx", text), &config);
        assert!(detection.skipped);
        assert!(detection.candidates.is_empty());
    }

    #[test]
    fn oversize_transform_degrades() {
        let config = InstrumentConfig { max_file_bytes: 64, ..Default::default() };
        let text = format!("export function Card() {{ return <View />; }}\n{}", "// padding\n".repeat(20));
        let result = transform(&text, "Card.tsx", "Card", "./instrument", &config).unwrap();
        assert!(result.wrapped);
        assert!(result.degraded);
        let code = result.code.unwrap();
        assert!(code.starts_with("import { instrument } from './instrument';\n"));
        assert!(code.ends_with("export const Card = instrument(Card, 'Card');\n"));
    }

    #[test]
    fn lowercase_exports_are_never_reported() {
        let text = "export function helper() { return 1; }\nexport const Box = () => <View />;\n";
        assert_eq!(detect(text, "Box.tsx", &InstrumentConfig::default()), names(&["Box"]));
    }

    #[test]
    fn unreported_names_leave_text_alone() {
        let text = "export function helper() { return 1; }\n";
        let result = transform(text, "a.ts", "helper", "./instrument", &InstrumentConfig::default()).unwrap();
        assert_eq!(result, TransformResult::default());
    }

    #[test]
    fn several_components_print_once() {
        let text = "export const A = () => <View />;\nexport const B = () => <Text />;\n";
        let file = SourceFile::new("AB.tsx", text);
        let result = transform_file(&file, &["A", "B", "C"], "./instrument", &InstrumentConfig::default()).unwrap();
        assert_eq!(result.components, vec!["A".to_string(), "B".to_string()]);
        let code = squash(&result.code.unwrap());
        assert_eq!(code.matches("import{instrument}from'./instrument';").count(), 1);
        assert!(code.contains("exportconstA=instrument(()=><View/>,'A');"));
        assert!(code.contains("exportconstB=instrument(()=><Text/>,'B');"));
    }

    #[test]
    fn detection_runs_once_per_file() {
        let text = "export const Box = () => <View />;\nexport const formatPrice = (n) => n;\n";
        let config = InstrumentConfig::default();
        let mut strategy = AstStrategy::new(parse(&SourceFile::new("Box.tsx", text)).unwrap());

        assert!(!strategy.transform(&config, "formatPrice", "./instrument"));
        assert_eq!(strategy.detected, Some(HashSet::from(["Box".to_string()])));
        assert!(strategy.transform(&config, "Box", "./instrument"));
        assert!(!strategy.transform(&config, "Box", "./instrument"));

        let file = SourceFile::new("Box.tsx", text);
        let result = transform_file(&file, &["Box", "formatPrice"], "./instrument", &config).unwrap();
        assert_eq!(result.components, vec!["Box".to_string()]);
        assert!(!squash(&result.code.unwrap()).contains("'formatPrice'"));
    }

    #[test]
    fn transform_then_detect_is_stable() {
        let config = InstrumentConfig::default();
        let text = "export default function Greeting() { return <Text>Hi</Text>; }\n";
        let first = transform(text, "Greeting.jsx", "Greeting", "./instrument", &config).unwrap();
        let code = first.code.unwrap();
        assert_eq!(detect(&code, "Greeting.jsx", &config), names(&["Greeting"]));

        let second = transform(&code, "Greeting.jsx", "Greeting", "./instrument", &config).unwrap();
        assert!(!second.wrapped);
        assert_eq!(second.code, None);
    }
}
