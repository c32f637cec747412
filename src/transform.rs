use swc_core::{
    common::{comments::Comments, util::take::Take, BytePos, DUMMY_SP, SyntaxContext},
    ecma::{ast::*, utils::ExprFactory},
};
use tracing::debug;

use crate::config::InstrumentConfig;
use crate::detect::{first_ident_arg, peel, Detector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapOutcome {
    Wrapped,
    AlreadyWrapped,
    NotFound,
}

impl WrapOutcome {
    pub fn is_wrapped(self) -> bool {
        self == WrapOutcome::Wrapped
    }
}

// -----------------------------------------------------------------------------
// Import state
// -----------------------------------------------------------------------------

/// Derived once per transform from the top-level imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportState {
    pub already_imported: bool,
    pub last_import: Option<usize>,
    /// `(item, specifier)` of a type-only import of the symbol.
    pub type_only: Option<(usize, usize)>,
}

impl ImportState {
    pub fn scan(module: &Module, symbol: &str) -> Self {
        let mut state = ImportState { already_imported: false, last_import: None, type_only: None };
        for (i, item) in module.body.iter().enumerate() {
            let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item else {
                continue;
            };
            state.last_import = Some(i);
            for (j, spec) in import.specifiers.iter().enumerate() {
                let (local, type_only) = match spec {
                    ImportSpecifier::Named(n) => (&n.local, n.is_type_only),
                    ImportSpecifier::Default(d) => (&d.local, false),
                    ImportSpecifier::Namespace(_) => continue,
                };
                if &*local.sym != symbol {
                    continue;
                }
                if import.type_only || type_only {
                    state.type_only.get_or_insert((i, j));
                } else {
                    state.already_imported = true;
                }
            }
        }
        state
    }
}

// -----------------------------------------------------------------------------
// Shapes
// -----------------------------------------------------------------------------

/// How the target declaration appears at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// export default function Name() {}
    DefaultFunction,
    /// export default class Name {}
    DefaultClass,
    /// export default Name
    DefaultIdentifier,
    /// const Name = <expr>, reached through `export default Name` or `export { Name }`
    Declarator { item: usize, decl: usize },
    /// export const Name = <expr>
    NamedVar { decl: usize },
    /// export function Name() {}
    NamedFunction,
    /// export class Name {}
    NamedClass,
    /// function Name() {} / class Name {}, reached through `export { Name }`
    LocalDecl,
    AlreadyWrapped,
}

// -----------------------------------------------------------------------------
// Transformer
// -----------------------------------------------------------------------------

pub struct Transformer<'c> {
    config: &'c InstrumentConfig,
    detector: Detector<'c>,
}

impl<'c> Transformer<'c> {
    pub fn new(config: &'c InstrumentConfig) -> Self {
        Self {
            config,
            detector: Detector::new(config),
        }
    }

    /// Wraps the first top-level declaration of `component` in the
    /// instrumentation call and imports the symbol from `import_path` when it
    /// is not bound yet. Names the detector does not report are never
    /// touched.
    pub fn instrument(
        &self,
        module: &mut Module,
        comments: Option<&dyn Comments>,
        component: &str,
        import_path: &str,
    ) -> WrapOutcome {
        if !self.detector.candidates(module).iter().any(|c| c.name == component) {
            debug!(component, "not a detected component");
            return WrapOutcome::NotFound;
        }
        self.wrap(module, comments, component, import_path)
    }

    /// [`Transformer::instrument`] without the detector check, for callers
    /// that already hold the module's candidates. Wrapping keeps every
    /// reported name reported, so one detection pass serves a whole file.
    pub fn wrap(
        &self,
        module: &mut Module,
        comments: Option<&dyn Comments>,
        component: &str,
        import_path: &str,
    ) -> WrapOutcome {
        let imports = ImportState::scan(module, &self.config.import_name);

        let Some((index, shape)) = self.locate(module, component) else {
            return WrapOutcome::NotFound;
        };
        if shape == Shape::AlreadyWrapped {
            debug!(component, "already instrumented");
            return WrapOutcome::AlreadyWrapped;
        }

        let inserted_at = match self.rewrite(module, comments, index, shape, component) {
            Ok(inserted_at) => inserted_at,
            Err(()) => return WrapOutcome::NotFound,
        };
        debug!(component, ?shape, "wrapped");

        if !imports.already_imported {
            match imports.type_only {
                // a second binding of the same name would not compile
                Some((item, spec)) => {
                    let item = match inserted_at {
                        Some(k) if k <= item => item + 1,
                        _ => item,
                    };
                    promote_to_value(module, item, spec);
                }
                None => {
                    let at = match imports.last_import {
                        Some(last) if inserted_at.map(|k| k <= last).unwrap_or(false) => last + 2,
                        Some(last) => last + 1,
                        None => directive_prologue_len(module),
                    };
                    module.body.insert(at, self.import_decl(import_path));
                }
            }
        }
        WrapOutcome::Wrapped
    }

    // ---------- matching ----------

    fn locate(&self, module: &Module, name: &str) -> Option<(usize, Shape)> {
        for (i, item) in module.body.iter().enumerate() {
            let ModuleItem::ModuleDecl(decl) = item else {
                continue;
            };
            match decl {
                ModuleDecl::ExportDefaultDecl(ed) => match &ed.decl {
                    DefaultDecl::Fn(f) if ident_is(f.ident.as_ref(), name) && f.function.body.is_some() => {
                        return Some((i, Shape::DefaultFunction))
                    }
                    DefaultDecl::Class(c) if ident_is(c.ident.as_ref(), name) => {
                        return Some((i, Shape::DefaultClass))
                    }
                    _ => {}
                },
                ModuleDecl::ExportDefaultExpr(e) => match peel(&e.expr) {
                    Expr::Ident(id) if &*id.sym == name => {
                        return Some(match self.find_declarator(module, name) {
                            Some((_, _, init)) if self.is_wrapped_value(init) => (i, Shape::AlreadyWrapped),
                            Some((item, decl, init)) if self.detector.is_likely_component_expr(init) => {
                                (item, Shape::Declarator { item, decl })
                            }
                            _ => (i, Shape::DefaultIdentifier),
                        });
                    }
                    Expr::Call(c) if self.detector.is_instrument_call(c) && wraps_name(c, name) => {
                        return Some((i, Shape::AlreadyWrapped));
                    }
                    _ => {}
                },
                ModuleDecl::ExportDecl(ed) => match &ed.decl {
                    // overload signatures are demoted along with the implementation
                    Decl::Fn(f) if &*f.ident.sym == name && f.function.body.is_some() => {
                        return Some((i, Shape::NamedFunction))
                    }
                    Decl::Class(c) if &*c.ident.sym == name => return Some((i, Shape::NamedClass)),
                    Decl::Var(v) => {
                        for (j, d) in v.decls.iter().enumerate() {
                            let (Pat::Ident(b), Some(init)) = (&d.name, &d.init) else {
                                continue;
                            };
                            if &*b.id.sym != name {
                                continue;
                            }
                            if self.is_wrapped_value(init) {
                                return Some((i, Shape::AlreadyWrapped));
                            }
                            if self.detector.is_likely_component_expr(init) {
                                return Some((i, Shape::NamedVar { decl: j }));
                            }
                            return None;
                        }
                    }
                    _ => {}
                },
                ModuleDecl::ExportNamed(en) if en.src.is_none() => {
                    for s in &en.specifiers {
                        let ExportSpecifier::Named(named) = s else {
                            continue;
                        };
                        let ModuleExportName::Ident(orig) = &named.orig else {
                            continue;
                        };
                        let exported = match &named.exported {
                            Some(ModuleExportName::Ident(e)) => &*e.sym,
                            Some(ModuleExportName::Str(_)) => continue,
                            None => &*orig.sym,
                        };
                        if exported != name {
                            continue;
                        }
                        match self.find_declarator(module, &orig.sym) {
                            Some((_, _, init)) if self.is_wrapped_value(init) => {
                                return Some((i, Shape::AlreadyWrapped))
                            }
                            Some((item, decl, init)) if self.detector.is_likely_component_expr(init) => {
                                return Some((item, Shape::Declarator { item, decl }))
                            }
                            Some(_) => {}
                            None => {
                                if let Some(item) = find_local_decl(module, &orig.sym) {
                                    return Some((item, Shape::LocalDecl));
                                }
                            }
                        }
                        // nothing to wrap through this route; a later export may still match
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Top-level `const/let/var name = init`, exported or not.
    fn find_declarator<'m>(&self, module: &'m Module, name: &str) -> Option<(usize, usize, &'m Expr)> {
        for (i, item) in module.body.iter().enumerate() {
            let var = match item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Var(v))) => v,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { decl: Decl::Var(v), .. })) => v,
                _ => continue,
            };
            for (j, d) in var.decls.iter().enumerate() {
                if let (Pat::Ident(b), Some(init)) = (&d.name, &d.init) {
                    if &*b.id.sym == name {
                        return Some((i, j, init));
                    }
                }
            }
        }
        None
    }

    fn is_wrapped_value(&self, expr: &Expr) -> bool {
        matches!(peel(expr), Expr::Call(c) if self.detector.is_instrument_call(c))
    }

    // ---------- rewriting ----------

    /// Applies the rewrite for `shape`; returns the index of an appended
    /// statement, if one was added.
    fn rewrite(
        &self,
        module: &mut Module,
        comments: Option<&dyn Comments>,
        index: usize,
        shape: Shape,
        name: &str,
    ) -> Result<Option<usize>, ()> {
        match shape {
            Shape::DefaultFunction | Shape::DefaultClass | Shape::NamedFunction | Shape::NamedClass => {
                let mut first = index;
                while first > 0 && is_overload_signature(&module.body[first - 1], name) {
                    first -= 1;
                }
                for signature in first..index {
                    demote_at(module, comments, signature)?;
                }
                let ident = demote_at(module, comments, index)?;
                let export = match shape {
                    Shape::DefaultFunction | Shape::DefaultClass => self.export_default(ident, name),
                    _ => self.export_const(ident, name),
                };
                module.body.insert(index + 1, export);
                Ok(Some(index + 1))
            }
            Shape::LocalDecl => {
                let placeholder = ModuleItem::Stmt(Stmt::Empty(EmptyStmt { span: DUMMY_SP }));
                let (ident, value) = match std::mem::replace(&mut module.body[index], placeholder) {
                    ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) => (
                        reference(&f.ident),
                        Expr::Fn(FnExpr { ident: Some(f.ident), function: f.function }),
                    ),
                    ModuleItem::Stmt(Stmt::Decl(Decl::Class(c))) => (
                        reference(&c.ident),
                        Expr::Class(ClassExpr { ident: Some(c.ident), class: c.class }),
                    ),
                    other => {
                        module.body[index] = other;
                        return Err(());
                    }
                };
                let init = self.instrument_call(Box::new(value), name);
                module.body[index] = ModuleItem::Stmt(Stmt::Decl(const_decl(ident, init)));
                Ok(None)
            }
            Shape::DefaultIdentifier => match &mut module.body[index] {
                ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(e)) => {
                    let value = e.expr.take();
                    e.expr = Box::new(self.instrument_call(value, name));
                    Ok(None)
                }
                _ => Err(()),
            },
            Shape::NamedVar { decl } | Shape::Declarator { decl, .. } => {
                let var = match &mut module.body[index] {
                    ModuleItem::Stmt(Stmt::Decl(Decl::Var(v))) => v,
                    ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { decl: Decl::Var(v), .. })) => v,
                    _ => return Err(()),
                };
                let init = var.decls.get_mut(decl).and_then(|d| d.init.as_mut()).ok_or(())?;
                let value = init.take();
                *init = Box::new(self.instrument_call(value, name));
                Ok(None)
            }
            Shape::AlreadyWrapped => Err(()),
        }
    }

    // ---------- builders ----------

    /// instrument(<value>, 'Name')
    fn instrument_call(&self, value: Box<Expr>, name: &str) -> Expr {
        Expr::Call(CallExpr {
            span: DUMMY_SP,
            callee: Callee::Expr(Box::new(Expr::Ident(Ident::new(
                self.config.import_name.clone().into(),
                DUMMY_SP,
                SyntaxContext::empty(),
            )))),
            args: vec![value.as_arg(), Expr::Lit(Lit::Str(quoted(name))).as_arg()],
            type_args: None,
            ctxt: SyntaxContext::empty(),
        })
    }

    /// export default instrument(Name, 'Name');
    fn export_default(&self, ident: Ident, name: &str) -> ModuleItem {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(ExportDefaultExpr {
            span: DUMMY_SP,
            expr: Box::new(self.instrument_call(Box::new(Expr::Ident(ident)), name)),
        }))
    }

    /// export const Name = instrument(Name, 'Name');
    fn export_const(&self, ident: Ident, name: &str) -> ModuleItem {
        let init = self.instrument_call(Box::new(Expr::Ident(ident.clone())), name);
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
            span: DUMMY_SP,
            decl: const_decl(ident, init),
        }))
    }

    /// import { instrument } from '<path>';
    fn import_decl(&self, path: &str) -> ModuleItem {
        ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
            span: DUMMY_SP,
            specifiers: vec![ImportSpecifier::Named(ImportNamedSpecifier {
                span: DUMMY_SP,
                local: Ident::new(self.config.import_name.clone().into(), DUMMY_SP, SyntaxContext::empty()),
                imported: None,
                is_type_only: false,
            })],
            src: Box::new(quoted(path)),
            type_only: false,
            with: None,
            phase: ImportPhase::Evaluation,
        }))
    }
}

/// Splits an exported function/class item into the export's start position,
/// a fresh reference to the declared name and the bare declaration.
fn demote(item: ModuleItem) -> Result<(BytePos, Ident, Decl), ModuleItem> {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl { span, decl })) => match decl {
            DefaultDecl::Fn(FnExpr { ident: Some(ident), function }) => Ok((
                span.lo,
                reference(&ident),
                Decl::Fn(FnDecl {
                    ident,
                    declare: false,
                    function,
                }),
            )),
            DefaultDecl::Class(ClassExpr { ident: Some(ident), class }) => Ok((
                span.lo,
                reference(&ident),
                Decl::Class(ClassDecl {
                    ident,
                    declare: false,
                    class,
                }),
            )),
            decl => Err(ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
                span,
                decl,
            }))),
        },
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { span, decl })) => match decl {
            Decl::Fn(f) => Ok((span.lo, reference(&f.ident), Decl::Fn(f))),
            Decl::Class(c) => Ok((span.lo, reference(&c.ident), Decl::Class(c))),
            decl => Err(ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { span, decl }))),
        },
        other => Err(other),
    }
}

/// Demotes the export at `index` in place, moving its leading comments onto
/// the bare declaration.
fn demote_at(module: &mut Module, comments: Option<&dyn Comments>, index: usize) -> Result<Ident, ()> {
    let placeholder = ModuleItem::Stmt(Stmt::Empty(EmptyStmt { span: DUMMY_SP }));
    let original = std::mem::replace(&mut module.body[index], placeholder);
    let (export_lo, ident, decl) = match demote(original) {
        Ok(demoted) => demoted,
        Err(original) => {
            module.body[index] = original;
            return Err(());
        }
    };
    if let Some(comments) = comments {
        let to = decl_lo(&decl);
        if to != export_lo {
            comments.move_leading(export_lo, to);
        }
    }
    module.body[index] = ModuleItem::Stmt(Stmt::Decl(decl));
    Ok(ident)
}

/// export function Name(a: A): R;
fn is_overload_signature(item: &ModuleItem, name: &str) -> bool {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl { decl: Decl::Fn(f), .. })) => {
            f.function.body.is_none() && &*f.ident.sym == name
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl {
            decl: DefaultDecl::Fn(f), ..
        })) => f.function.body.is_none() && ident_is(f.ident.as_ref(), name),
        _ => false,
    }
}

/// Index of a plain top-level `function name() {}` or `class name {}`.
/// Overloaded functions are left alone: their signatures cannot follow a
/// `const`.
fn find_local_decl(module: &Module, name: &str) -> Option<usize> {
    for (i, item) in module.body.iter().enumerate() {
        let ModuleItem::Stmt(Stmt::Decl(decl)) = item else {
            continue;
        };
        match decl {
            Decl::Fn(f) if &*f.ident.sym == name => return f.function.body.as_ref().map(|_| i),
            Decl::Class(c) if &*c.ident.sym == name => return Some(i),
            _ => {}
        }
    }
    None
}

/// Turns a type-only import of the instrumentation symbol into a value
/// import, keeping its siblings type-only.
fn promote_to_value(module: &mut Module, item: usize, spec: usize) {
    let Some(ModuleItem::ModuleDecl(ModuleDecl::Import(import))) = module.body.get_mut(item) else {
        return;
    };
    if import.type_only {
        import.type_only = false;
        for (j, s) in import.specifiers.iter_mut().enumerate() {
            if let ImportSpecifier::Named(n) = s {
                n.is_type_only = j != spec;
            }
        }
    } else if let Some(ImportSpecifier::Named(n)) = import.specifiers.get_mut(spec) {
        n.is_type_only = false;
    }
}

fn const_decl(ident: Ident, init: Expr) -> Decl {
    Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        kind: VarDeclKind::Const,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent { id: ident, type_ann: None }),
            init: Some(Box::new(init)),
            definite: false,
        }],
    }))
}

fn decl_lo(decl: &Decl) -> BytePos {
    match decl {
        Decl::Fn(f) => f.function.span.lo,
        Decl::Class(c) => c.class.span.lo,
        _ => BytePos::DUMMY,
    }
}

/// Leading `'use client'`-style directives must stay first.
fn directive_prologue_len(module: &Module) -> usize {
    module
        .body
        .iter()
        .take_while(|item| {
            matches!(item, ModuleItem::Stmt(Stmt::Expr(ExprStmt { expr, .. })) if matches!(&**expr, Expr::Lit(Lit::Str(_))))
        })
        .count()
}

fn ident_is(ident: Option<&Ident>, name: &str) -> bool {
    ident.map(|i| &*i.sym == name).unwrap_or(false)
}

/// instrument(Name, ...) or instrument(..., 'Name')
fn wraps_name(call: &CallExpr, name: &str) -> bool {
    if first_ident_arg(call).map(|id| &*id.sym == name).unwrap_or(false) {
        return true;
    }
    matches!(call.args.get(1).map(|a| &*a.expr), Some(Expr::Lit(Lit::Str(s))) if s.value.to_string() == name)
}

fn reference(ident: &Ident) -> Ident {
    Ident::new(ident.sym.clone(), DUMMY_SP, ident.ctxt)
}

/// Single-quoted string literal.
fn quoted(value: &str) -> Str {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: Some(format!("'{escaped}'").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{parse, SourceFile};
    use pretty_assertions::assert_eq;

    const HELPER: &str = "./perf/instrument";

    fn run(src: &str, name: &str) -> (WrapOutcome, String) {
        let config = InstrumentConfig::default();
        let mut parsed = parse(&SourceFile::new("Test.tsx", src)).unwrap();
        let outcome =
            Transformer::new(&config).instrument(&mut parsed.module, Some(&parsed.comments), name, HELPER);
        (outcome, parsed.print().unwrap())
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("`{needle}` not found in `{haystack}`"))
    }

    #[test]
    fn default_function_is_demoted_and_reexported() {
        let (outcome, out) = run("export default function Greeting(){ return <Text>Hi</Text>; }", "Greeting");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.starts_with("import{instrument}from'./perf/instrument';"));
        let decl = position(&out, "functionGreeting(){return<Text>Hi</Text>;}");
        let export = position(&out, "exportdefaultinstrument(Greeting,'Greeting');");
        assert!(decl < export);
        assert!(!out.contains("exportdefaultfunction"));
    }

    #[test]
    fn named_arrow_is_wrapped_in_place_without_duplicate_import() {
        let src = "export const Box = () => <View/>;\nimport { instrument } from './x';\n";
        let (outcome, out) = run(src, "Box");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.contains("exportconstBox=instrument(()=><View/>,'Box');"));
        assert_eq!(out.matches("import{instrument}").count(), 1);
        assert!(!out.contains(HELPER));
    }

    #[test]
    fn already_wrapped_default_is_left_alone() {
        let (outcome, _) = run("export default instrument(Greeting, 'Greeting');", "Greeting");
        assert_eq!(outcome, WrapOutcome::AlreadyWrapped);
    }

    #[test]
    fn named_function_gets_trailing_const_export() {
        let (outcome, out) = run("export function Panel(){ return <View/>; }", "Panel");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        assert!(squash(&out).contains("functionPanel(){return<View/>;}exportconstPanel=instrument(Panel,'Panel');"));
    }

    #[test]
    fn classes_are_demoted_like_functions() {
        let (_, out) = run("export default class Screen extends Component { render() { return <View/>; } }", "Screen");
        let out = squash(&out);
        assert!(out.contains("classScreenextendsComponent{"));
        assert!(out.contains("exportdefaultinstrument(Screen,'Screen');"));

        let (_, out) = run("export class Legacy extends React.Component {}", "Legacy");
        assert!(squash(&out).contains("exportconstLegacy=instrument(Legacy,'Legacy');"));
    }

    #[test]
    fn default_identifier_is_wrapped_after_existing_imports() {
        let src = "import Screen from './Screen';\nimport { View } from 'react-native';\nexport default Screen;\n";
        let (outcome, out) = run(src, "Screen");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.starts_with(
            "importScreenfrom'./Screen';import{View}from'react-native';import{instrument}from'./perf/instrument';"
        ));
        assert!(out.ends_with("exportdefaultinstrument(Screen,'Screen');"));
    }

    #[test]
    fn default_identifier_bound_to_declarator_wraps_initializer() {
        let src = "const Card = memo(() => <View/>);\nexport default Card;\n";
        let (outcome, out) = run(src, "Card");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.contains("constCard=instrument(memo(()=><View/>),'Card');"));
        assert!(out.contains("exportdefaultCard;"));
    }

    #[test]
    fn local_specifier_wraps_initializer() {
        let src = "const Row = () => <Text/>;\nexport { Row };\n";
        let (outcome, out) = run(src, "Row");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        assert!(squash(&out).contains("constRow=instrument(()=><Text/>,'Row');"));
    }

    #[test]
    fn second_application_is_a_no_op() {
        let sources = [
            ("export default function Greeting(){ return <Text>Hi</Text>; }", "Greeting"),
            ("export const Box = () => <View/>;", "Box"),
            ("export function Panel(){ return <View/>; }", "Panel"),
            ("export class Legacy extends Component {}", "Legacy"),
            ("import Screen from './Screen';\nexport default Screen;", "Screen"),
            ("const Card = memo(() => <View/>);\nexport default Card;", "Card"),
            ("const Row = () => <Text/>;\nexport { Row };", "Row"),
            ("function Card() { return <View />; }\nexport { Card };\nexport default Card;", "Card"),
            ("const Card = makeCard();\nexport { Card };\nexport default Card;", "Card"),
            ("class Legacy extends Component {}\nexport { Legacy };", "Legacy"),
            (
                "export function Panel(p: A): JSX.Element;\nexport function Panel(p: any) { return <View/>; }",
                "Panel",
            ),
        ];
        for (src, name) in sources {
            let (first, once) = run(src, name);
            assert_eq!(first, WrapOutcome::Wrapped, "{src}");
            let (second, twice) = run(&once, name);
            assert_eq!(second, WrapOutcome::AlreadyWrapped, "{src}");
            assert_eq!(squash(&once), squash(&twice));
        }
    }

    #[test]
    fn unknown_or_unwrappable_names_are_not_found() {
        let src = "export const Theme = createTheme();\nexport const Box = () => <View/>;\n";
        assert_eq!(run(src, "Theme").0, WrapOutcome::NotFound);
        assert_eq!(run(src, "Missing").0, WrapOutcome::NotFound);
        assert_eq!(run(src, "box").0, WrapOutcome::NotFound);
    }

    #[test]
    fn other_declarations_are_untouched() {
        let src = r#"
            export const Header = () => <Text>Header</Text>;
            export const Footer = () => <Text>Footer</Text>;
            export function format(value) { return value.trim(); }
        "#;
        let (_, out) = run(src, "Footer");
        let out = squash(&out);
        assert!(out.contains("exportconstHeader=()=><Text>Header</Text>;"));
        assert!(out.contains("exportfunctionformat(value){returnvalue.trim();}"));
        assert!(out.contains("exportconstFooter=instrument(()=><Text>Footer</Text>,'Footer');"));
    }

    #[test]
    fn undetected_exports_are_not_wrapped() {
        let src = "export const formatPrice = (n) => `$${n}`;\nexport function Helper() { return 1; }\n";
        assert_eq!(run(src, "formatPrice").0, WrapOutcome::NotFound);
        assert_eq!(run(src, "Helper").0, WrapOutcome::NotFound);

        let src = "export declare function Shell(p: A): JSX.Element;\nconst card = () => <View/>;\nexport { card };\nexport default card;\n";
        assert_eq!(run(src, "Shell").0, WrapOutcome::NotFound);
        assert_eq!(run(src, "card").0, WrapOutcome::NotFound);

        let src = "function Pane(p: A): JSX.Element;\nfunction Pane(p: any) { return <View/>; }\nexport { Pane };\n";
        let (outcome, out) = run(src, "Pane");
        assert_eq!(outcome, WrapOutcome::NotFound);
        assert!(!out.contains("instrument"));
    }

    #[test]
    fn later_export_route_is_used_when_specifier_cannot_be_wrapped() {
        let src = "const Card = makeCard();\nexport { Card };\nexport default Card;\n";
        let (outcome, out) = run(src, "Card");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.contains("constCard=makeCard();export{Card};exportdefaultinstrument(Card,'Card');"));
    }

    #[test]
    fn local_function_behind_specifier_becomes_wrapped_const() {
        let src = "function Card() { return <View />; }\nexport { Card };\nexport default Card;\n";
        let (outcome, out) = run(src, "Card");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.contains("constCard=instrument(functionCard(){return<View/>;},'Card');export{Card};exportdefaultCard;"));
        assert!(!out.contains("}functionCard"));
    }

    #[test]
    fn overload_signatures_are_demoted_with_the_implementation() {
        let src = "export function Panel(p: A): JSX.Element;\nexport function Panel(p: any) { return <View />; }\n";
        let (outcome, out) = run(src, "Panel");
        assert_eq!(outcome, WrapOutcome::Wrapped);
        let out = squash(&out);
        assert!(out.contains(
            "functionPanel(p:A):JSX.Element;functionPanel(p:any){return<View/>;}exportconstPanel=instrument(Panel,'Panel');"
        ));
        assert!(!out.contains("exportfunction"));
    }

    #[test]
    fn type_only_import_is_promoted_instead_of_duplicated() {
        let (_, out) = run("import type { instrument } from './perf';\nexport const Box = () => <View/>;\n", "Box");
        let out = squash(&out);
        assert!(out.starts_with("import{instrument}from'./perf';"));
        assert_eq!(out.matches("instrument}from").count(), 1);

        let (_, out) = run("import type { Props, instrument } from './perf';\nexport const Box = () => <View/>;\n", "Box");
        assert!(squash(&out).starts_with("import{typeProps,instrument}from'./perf';"));

        let (_, out) = run("export const Box = () => <View/>;\nimport { type instrument } from './perf';\n", "Box");
        let out = squash(&out);
        assert!(out.contains("import{instrument}from'./perf';"));
        assert!(!out.contains(HELPER));
    }

    #[test]
    fn import_goes_after_directives() {
        let (_, out) = run("'use client';\nexport const Box = () => <View/>;\n", "Box");
        assert!(squash(&out).starts_with("'useclient';import{instrument}from'./perf/instrument';"));
    }

    #[test]
    fn leading_comment_survives_demotion() {
        let (_, out) = run("// The panel\nexport function Panel() { return <View/>; }\n", "Panel");
        assert!(out.contains("// The panel"));
    }

    #[test]
    fn import_state_scan() {
        let config = InstrumentConfig::default();
        let src = "import a from 'a';\nimport type { instrument } from './t';\nconst x = 1;\nimport { instrument as other, b } from 'b';\n";
        let parsed = parse(&SourceFile::new("Test.tsx", src)).unwrap();
        let state = ImportState::scan(&parsed.module, &config.import_name);
        assert_eq!(state, ImportState { already_imported: false, last_import: Some(3), type_only: Some((1, 0)) });

        let parsed = parse(&SourceFile::new("Test.tsx", "import { instrument } from './x';")).unwrap();
        assert!(ImportState::scan(&parsed.module, "instrument").already_imported);
    }
}
