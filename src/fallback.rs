//! Text-level detection and rewriting for files the parser rejects.
//!
//! Deliberately narrower than the AST path: only `export function|const|class
//! Name` is detected, and only default exports plus function/class exports are
//! rewritten. Nothing here fails; no match leaves the text alone.

use std::collections::HashSet;

use regex::{Captures, Regex};

use crate::detect::{starts_uppercase, ComponentCandidate, DeclarationKind, ExportKind};

const EXPORT_DECL: &str = r"(?m)^[ \t]*export[ \t]+(function|const|class)[ \t]+(\p{Lu}[\p{L}\p{N}_$]*)";
const LAST_IMPORT: &str = r#"(?m)^import\b(?:[^;'"]|'[^'\n]*'|"[^"\n]*")*?(?:'[^'\n]*'|"[^"\n]*")[ \t]*;?"#;
const DIRECTIVES: &str = r#"^(?:[ \t\r\n]*(?:'[^'\n]*'|"[^"\n]*")[ \t]*;?[ \t]*\n)*"#;
const NAMED_IMPORT: &str = r"(?m)^[ \t]*import[ \t]*\{([^}]*)\}";
const DEFAULT_IMPORT: &str = r"(?m)^[ \t]*import[ \t]+([A-Za-z_$][\w$]*)[ \t]*(?:,|from\b)";

pub struct PatternMatcher {
    export_decl: Regex,
    last_import: Regex,
    directives: Regex,
    named_import: Regex,
    default_import: Regex,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self {
            export_decl: fixed(EXPORT_DECL),
            last_import: fixed(LAST_IMPORT),
            directives: fixed(DIRECTIVES),
            named_import: fixed(NAMED_IMPORT),
            default_import: fixed(DEFAULT_IMPORT),
        }
    }

    pub fn detect(&self, text: &str) -> Vec<ComponentCandidate> {
        let mut seen = HashSet::new();
        let mut out = vec![];
        for caps in self.export_decl.captures_iter(text) {
            let name = caps[2].to_string();
            if !seen.insert(name.clone()) {
                continue;
            }
            let declaration = match &caps[1] {
                "function" => DeclarationKind::FunctionDeclaration,
                "class" => DeclarationKind::ClassDeclaration,
                _ => DeclarationKind::VariableWithFunctionInitializer,
            };
            out.push(ComponentCandidate {
                name,
                declaration,
                export: ExportKind::Named,
            });
        }
        out
    }

    /// Rewritten text, or `None` when nothing matched or the component is
    /// already wrapped.
    pub fn transform(&self, text: &str, component: &str, import_name: &str, import_path: &str) -> Option<String> {
        if !starts_uppercase(component) {
            return None;
        }
        let n = regex::escape(component);
        let f = regex::escape(import_name);
        let call = format!("{import_name}({component}, '{component}')");

        let wrapped = Regex::new(&format!(
            r"(?:[^\w$]|^){f}\s*\(\s*{n}\s*,|export\s+const\s+{n}\s*=\s*{f}\s*\("
        ))
        .ok()?;
        if wrapped.is_match(text) {
            return None;
        }

        // export default Name;
        let default_ident = Regex::new(&format!(r"(?m)^([ \t]*)export[ \t]+default[ \t]+{n}[ \t]*;?[ \t]*$")).ok()?;
        // export default function Name / export default class Name
        let default_decl = Regex::new(&format!(
            r"(?m)^([ \t]*)export[ \t]+default[ \t]+((?:async[ \t]+)?function\*?|class)[ \t]+{n}\b"
        ))
        .ok()?;
        // export function Name / export class Name
        let named_decl =
            Regex::new(&format!(r"(?m)^([ \t]*)export[ \t]+((?:async[ \t]+)?function\*?|class)[ \t]+{n}\b")).ok()?;

        let rewritten = if default_ident.is_match(text) {
            default_ident
                .replacen(text, 1, |caps: &Captures| format!("{}export default {call};", &caps[1]))
                .into_owned()
        } else if default_decl.is_match(text) {
            let demoted = default_decl.replacen(text, 1, |caps: &Captures| demoted_decl(caps, component));
            append_statement(&demoted, &format!("export default {call};"))
        } else if named_decl.is_match(text) {
            let demoted = named_decl.replacen(text, 1, |caps: &Captures| demoted_decl(caps, component));
            append_statement(&demoted, &format!("export const {component} = {call};"))
        } else {
            return None;
        };

        if self.is_imported(&rewritten, import_name) {
            return Some(rewritten);
        }
        Some(self.insert_import(&rewritten, import_name, import_path))
    }

    fn is_imported(&self, text: &str, import_name: &str) -> bool {
        let named = self.named_import.captures_iter(text).any(|caps| {
            caps[1].split(',').any(|item| {
                let item = item.trim();
                item == import_name || item.rsplit(" as ").next().map(str::trim) == Some(import_name)
            })
        });
        named || self.default_import.captures_iter(text).any(|caps| &caps[1] == import_name)
    }

    fn insert_import(&self, text: &str, import_name: &str, import_path: &str) -> String {
        let line = format!("import {{ {import_name} }} from '{import_path}';");
        match self.last_import.find_iter(text).last() {
            Some(m) => format!("{}\n{}{}", &text[..m.end()], line, &text[m.end()..]),
            None => {
                let at = self.directives.find(text).map(|m| m.end()).unwrap_or(0);
                format!("{}{}\n{}", &text[..at], line, &text[at..])
            }
        }
    }
}

fn fixed(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

fn demoted_decl(caps: &Captures, component: &str) -> String {
    format!("{}{} {}", &caps[1], &caps[2], component)
}

fn append_statement(text: &str, stmt: &str) -> String {
    let mut out = text.trim_end().to_string();
    out.push('\n');
    out.push_str(stmt);
    out.push('\n');
    out
}
