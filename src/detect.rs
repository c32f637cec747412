use std::collections::{HashMap, HashSet};

use serde::Serialize;
use swc_core::ecma::{
    ast::*,
    visit::{Visit, VisitWith},
};
use tracing::trace;

use crate::config::InstrumentConfig;

/// Markup search gives up below this nesting level.
const MAX_MARKUP_DEPTH: usize = 64;

// -----------------------------------------------------------------------------
// Candidates
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    FunctionDeclaration,
    ClassDeclaration,
    VariableWithFunctionInitializer,
    ReExportedIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Default,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentCandidate {
    pub name: String,
    pub declaration: DeclarationKind,
    pub export: ExportKind,
}

// -----------------------------------------------------------------------------
// Classification rules
// -----------------------------------------------------------------------------

/// The declaration shapes classification looks at.
#[derive(Clone, Copy)]
pub enum DeclNode<'a> {
    FunctionDecl(&'a Function),
    ClassDecl(&'a Class),
    VarInit(&'a Expr),
    /// A name whose declaration is out of reach (`export default X`).
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
    Abstain,
}

pub type Rule = fn(&Detector, &str, DeclNode) -> Verdict;

/// Evaluated in order; the first rule that does not abstain decides.
pub const RULES: &[(&str, Rule)] = &[
    ("naming-convention", rule_naming_convention),
    ("bare-identifier", rule_bare_identifier),
    ("class-base", rule_class_base),
    ("class-render", rule_class_render),
    ("decorating-helper", rule_decorating_helper),
    ("function-markup", rule_function_markup),
];

pub fn rule_naming_convention(_: &Detector, name: &str, _: DeclNode) -> Verdict {
    if starts_uppercase(name) {
        Verdict::Abstain
    } else {
        Verdict::Reject
    }
}

pub fn rule_bare_identifier(_: &Detector, _: &str, node: DeclNode) -> Verdict {
    match node {
        DeclNode::Identifier => Verdict::Accept,
        _ => Verdict::Abstain,
    }
}

pub fn rule_class_base(d: &Detector, _: &str, node: DeclNode) -> Verdict {
    match node {
        DeclNode::ClassDecl(class) if d.extends_base_component(class) => Verdict::Accept,
        _ => Verdict::Abstain,
    }
}

pub fn rule_class_render(_: &Detector, _: &str, node: DeclNode) -> Verdict {
    match node {
        DeclNode::ClassDecl(class) if has_render_member(class) => Verdict::Accept,
        DeclNode::ClassDecl(_) => Verdict::Reject,
        _ => Verdict::Abstain,
    }
}

pub fn rule_decorating_helper(d: &Detector, _: &str, node: DeclNode) -> Verdict {
    match node {
        DeclNode::VarInit(init) => match peel(init) {
            Expr::Call(call) if d.is_decorating_call(call) => Verdict::Accept,
            _ => Verdict::Abstain,
        },
        _ => Verdict::Abstain,
    }
}

pub fn rule_function_markup(d: &Detector, _: &str, node: DeclNode) -> Verdict {
    match node {
        DeclNode::FunctionDecl(function) => d.function_verdict(function),
        DeclNode::VarInit(init) => match peel(init) {
            Expr::Fn(f) => d.function_verdict(&f.function),
            Expr::Arrow(arrow) => d.arrow_verdict(arrow),
            _ => Verdict::Reject,
        },
        _ => Verdict::Abstain,
    }
}

// -----------------------------------------------------------------------------
// Detector
// -----------------------------------------------------------------------------

pub struct Detector<'c> {
    config: &'c InstrumentConfig,
}

impl<'c> Detector<'c> {
    pub fn new(config: &'c InstrumentConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, name: &str, node: DeclNode) -> bool {
        for (rule_name, rule) in RULES {
            match rule(self, name, node) {
                Verdict::Accept => {
                    trace!(name, rule = *rule_name, "accepted");
                    return true;
                }
                Verdict::Reject => {
                    trace!(name, rule = *rule_name, "rejected");
                    return false;
                }
                Verdict::Abstain => {}
            }
        }
        false
    }

    /// Every exported declaration of `module` classified as a component,
    /// de-duplicated by name (first occurrence wins).
    pub fn candidates(&self, module: &Module) -> Vec<ComponentCandidate> {
        let bindings = LocalBindings::collect(module);
        let mut found = Found::default();

        for item in &module.body {
            let ModuleItem::ModuleDecl(decl) = item else {
                continue;
            };
            match decl {
                ModuleDecl::ExportDefaultDecl(ed) => match &ed.decl {
                    DefaultDecl::Fn(f) => {
                        if let Some(id) = &f.ident {
                            found.offer(
                                self,
                                &id.sym,
                                DeclarationKind::FunctionDeclaration,
                                ExportKind::Default,
                                DeclNode::FunctionDecl(&f.function),
                            );
                        }
                    }
                    DefaultDecl::Class(c) => {
                        if let Some(id) = &c.ident {
                            found.offer(
                                self,
                                &id.sym,
                                DeclarationKind::ClassDeclaration,
                                ExportKind::Default,
                                DeclNode::ClassDecl(&c.class),
                            );
                        }
                    }
                    DefaultDecl::TsInterfaceDecl(_) => {}
                },
                ModuleDecl::ExportDefaultExpr(e) => {
                    // export default Foo / export default instrument(Foo, 'Foo')
                    let target = match peel(&e.expr) {
                        Expr::Ident(id) => Some(id),
                        Expr::Call(call) if self.is_instrument_call(call) => first_ident_arg(call),
                        _ => None,
                    };
                    if let Some(id) = target {
                        found.offer(
                            self,
                            &id.sym,
                            DeclarationKind::ReExportedIdentifier,
                            ExportKind::Default,
                            DeclNode::Identifier,
                        );
                    }
                }
                ModuleDecl::ExportDecl(ed) => match &ed.decl {
                    Decl::Fn(f) => found.offer(
                        self,
                        &f.ident.sym,
                        DeclarationKind::FunctionDeclaration,
                        ExportKind::Named,
                        DeclNode::FunctionDecl(&f.function),
                    ),
                    Decl::Class(c) => found.offer(
                        self,
                        &c.ident.sym,
                        DeclarationKind::ClassDeclaration,
                        ExportKind::Named,
                        DeclNode::ClassDecl(&c.class),
                    ),
                    Decl::Var(v) => {
                        for d in &v.decls {
                            if let (Pat::Ident(b), Some(init)) = (&d.name, &d.init) {
                                found.offer(
                                    self,
                                    &b.id.sym,
                                    DeclarationKind::VariableWithFunctionInitializer,
                                    ExportKind::Named,
                                    DeclNode::VarInit(init),
                                );
                            }
                        }
                    }
                    _ => {}
                },
                // export { Foo, Bar as Baz } — re-exports `from` elsewhere belong to that file
                ModuleDecl::ExportNamed(en) if en.src.is_none() && !en.type_only => {
                    for s in &en.specifiers {
                        let ExportSpecifier::Named(named) = s else {
                            continue;
                        };
                        if named.is_type_only {
                            continue;
                        }
                        let ModuleExportName::Ident(orig) = &named.orig else {
                            continue;
                        };
                        let exported = match &named.exported {
                            Some(ModuleExportName::Ident(i)) => i.sym.to_string(),
                            Some(ModuleExportName::Str(s)) => s.value.to_string(),
                            None => orig.sym.to_string(),
                        };
                        let (kind, node) = match bindings.get(orig.sym.as_ref()) {
                            Some(LocalBinding::Function(f)) => {
                                (DeclarationKind::FunctionDeclaration, DeclNode::FunctionDecl(f))
                            }
                            Some(LocalBinding::Class(c)) => {
                                (DeclarationKind::ClassDeclaration, DeclNode::ClassDecl(c))
                            }
                            Some(LocalBinding::Var(init)) => {
                                (DeclarationKind::VariableWithFunctionInitializer, DeclNode::VarInit(init))
                            }
                            None => (DeclarationKind::ReExportedIdentifier, DeclNode::Identifier),
                        };
                        found.offer(self, &exported, kind, ExportKind::Named, node);
                    }
                }
                _ => {}
            }
        }

        found.out
    }

    // ---------- expression helpers ----------

    /// Value shapes the transformer is willing to wrap in place.
    pub fn is_likely_component_expr(&self, expr: &Expr) -> bool {
        match peel(expr) {
            Expr::Arrow(_) | Expr::Fn(_) | Expr::Class(_) => true,
            Expr::Call(call) => self.is_decorating_call(call),
            _ => false,
        }
    }

    pub fn is_instrument_call(&self, call: &CallExpr) -> bool {
        matches!(&call.callee, Callee::Expr(e) if matches!(peel(e), Expr::Ident(id) if id.sym.as_ref() == self.config.import_name))
    }

    /// `memo(...)`, `React.forwardRef(...)`, `lazy(...)` or an existing
    /// instrumentation call.
    fn is_decorating_call(&self, call: &CallExpr) -> bool {
        match callee_name(&call.callee) {
            Some(name) => self.config.is_component_helper(name) || name == self.config.import_name,
            None => false,
        }
    }

    fn is_element_factory_call(&self, call: &CallExpr) -> bool {
        callee_name(&call.callee)
            .map(|n| self.config.is_element_factory(n))
            .unwrap_or(false)
    }

    fn extends_base_component(&self, class: &Class) -> bool {
        let Some(sup) = &class.super_class else {
            return false;
        };
        match peel(sup) {
            Expr::Ident(id) => self.config.is_base_component(&id.sym),
            Expr::Member(m) => match &m.prop {
                MemberProp::Ident(p) => self.config.is_base_component(&p.sym),
                _ => false,
            },
            _ => false,
        }
    }

    fn function_verdict(&self, function: &Function) -> Verdict {
        match &function.body {
            Some(body) => self.block_verdict(body),
            // overload signature / `declare function`
            None => Verdict::Reject,
        }
    }

    fn arrow_verdict(&self, arrow: &ArrowExpr) -> Verdict {
        match &*arrow.body {
            BlockStmtOrExpr::BlockStmt(body) => self.block_verdict(body),
            BlockStmtOrExpr::Expr(e) => {
                if self.expr_renders_markup(e, 0) {
                    Verdict::Accept
                } else {
                    Verdict::Reject
                }
            }
        }
    }

    /// Accepts when a reachable return yields markup, or when there is no
    /// return at all.
    fn block_verdict(&self, body: &BlockStmt) -> Verdict {
        let scan = self.scan_returns(body, 0);
        if scan.markup || scan.returns == 0 {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }

    fn scan_returns(&self, body: &BlockStmt, depth: usize) -> ReturnScan {
        let mut finder = ReturnFinder {
            detector: self,
            depth,
            scan: ReturnScan::default(),
        };
        body.visit_with(&mut finder);
        finder.scan
    }

    fn expr_renders_markup(&self, expr: &Expr, depth: usize) -> bool {
        if depth > MAX_MARKUP_DEPTH {
            return false;
        }
        let next = depth + 1;
        match expr {
            Expr::JSXElement(_) | Expr::JSXFragment(_) => true,
            Expr::Paren(p) => self.expr_renders_markup(&p.expr, next),
            Expr::Cond(c) => self.expr_renders_markup(&c.cons, next) || self.expr_renders_markup(&c.alt, next),
            Expr::Bin(b) => {
                matches!(b.op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing)
                    && (self.expr_renders_markup(&b.left, next) || self.expr_renders_markup(&b.right, next))
            }
            Expr::Seq(s) => s.exprs.last().map(|e| self.expr_renders_markup(e, next)).unwrap_or(false),
            Expr::Await(a) => self.expr_renders_markup(&a.arg, next),
            Expr::Array(a) => a
                .elems
                .iter()
                .flatten()
                .any(|el| self.expr_renders_markup(&el.expr, next)),
            // createElement(...), or markup handed to a call: items.map(i => <Row />)
            Expr::Call(c) => {
                self.is_element_factory_call(c) || c.args.iter().any(|a| self.expr_renders_markup(&a.expr, next))
            }
            Expr::Arrow(a) => match &*a.body {
                BlockStmtOrExpr::Expr(e) => self.expr_renders_markup(e, next),
                BlockStmtOrExpr::BlockStmt(b) => self.scan_returns(b, next).markup,
            },
            Expr::Fn(f) => f
                .function
                .body
                .as_ref()
                .map(|b| self.scan_returns(b, next).markup)
                .unwrap_or(false),
            Expr::TsAs(e) => self.expr_renders_markup(&e.expr, next),
            Expr::TsSatisfies(e) => self.expr_renders_markup(&e.expr, next),
            Expr::TsNonNull(e) => self.expr_renders_markup(&e.expr, next),
            Expr::TsConstAssertion(e) => self.expr_renders_markup(&e.expr, next),
            Expr::TsTypeAssertion(e) => self.expr_renders_markup(&e.expr, next),
            _ => false,
        }
    }
}

#[derive(Default)]
struct Found {
    out: Vec<ComponentCandidate>,
    seen: HashSet<String>,
}

impl Found {
    fn offer(&mut self, d: &Detector, name: &str, declaration: DeclarationKind, export: ExportKind, node: DeclNode) {
        if self.seen.contains(name) || !d.classify(name, node) {
            return;
        }
        self.seen.insert(name.to_string());
        self.out.push(ComponentCandidate {
            name: name.to_string(),
            declaration,
            export,
        });
    }
}

// -----------------------------------------------------------------------------
// Return statement scan
// -----------------------------------------------------------------------------

#[derive(Default, Clone, Copy)]
struct ReturnScan {
    returns: usize,
    markup: bool,
}

struct ReturnFinder<'a, 'c> {
    detector: &'a Detector<'c>,
    depth: usize,
    scan: ReturnScan,
}

impl Visit for ReturnFinder<'_, '_> {
    fn visit_return_stmt(&mut self, n: &ReturnStmt) {
        self.scan.returns += 1;
        if let Some(arg) = &n.arg {
            if self.detector.expr_renders_markup(arg, self.depth) {
                self.scan.markup = true;
            }
        }
    }

    // nested bodies return for themselves
    fn visit_function(&mut self, _: &Function) {}
    fn visit_arrow_expr(&mut self, _: &ArrowExpr) {}
    fn visit_class(&mut self, _: &Class) {}
    fn visit_getter_prop(&mut self, _: &GetterProp) {}
    fn visit_setter_prop(&mut self, _: &SetterProp) {}
}

// -----------------------------------------------------------------------------
// Top-level bindings
// -----------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum LocalBinding<'a> {
    Function(&'a Function),
    Class(&'a Class),
    Var(&'a Expr),
}

struct LocalBindings<'a> {
    by_name: HashMap<&'a str, LocalBinding<'a>>,
}

impl<'a> LocalBindings<'a> {
    fn collect(module: &'a Module) -> Self {
        let mut by_name = HashMap::new();
        for item in &module.body {
            let decl = match item {
                ModuleItem::Stmt(Stmt::Decl(d)) => d,
                ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ed)) => &ed.decl,
                _ => continue,
            };
            // first declaration wins, so an overloaded function resolves to
            // its first signature
            match decl {
                Decl::Fn(f) => {
                    by_name.entry(&*f.ident.sym).or_insert(LocalBinding::Function(&f.function));
                }
                Decl::Class(c) => {
                    by_name.entry(&*c.ident.sym).or_insert(LocalBinding::Class(&c.class));
                }
                Decl::Var(v) => {
                    for d in &v.decls {
                        if let (Pat::Ident(b), Some(init)) = (&d.name, &d.init) {
                            by_name.entry(&*b.id.sym).or_insert(LocalBinding::Var(init));
                        }
                    }
                }
                _ => {}
            }
        }
        Self { by_name }
    }

    fn get(&self, name: &str) -> Option<LocalBinding<'a>> {
        self.by_name.get(name).copied()
    }
}

// -----------------------------------------------------------------------------
// Shared AST helpers
// -----------------------------------------------------------------------------

pub fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Strips parentheses and TypeScript-only wrappers.
pub fn peel(mut expr: &Expr) -> &Expr {
    loop {
        expr = match expr {
            Expr::Paren(e) => &e.expr,
            Expr::TsAs(e) => &e.expr,
            Expr::TsSatisfies(e) => &e.expr,
            Expr::TsNonNull(e) => &e.expr,
            Expr::TsConstAssertion(e) => &e.expr,
            Expr::TsTypeAssertion(e) => &e.expr,
            _ => return expr,
        }
    }
}

/// `memo` for both `memo(...)` and `React.memo(...)`.
pub fn callee_name(callee: &Callee) -> Option<&str> {
    let Callee::Expr(e) = callee else {
        return None;
    };
    match peel(e) {
        Expr::Ident(id) => Some(id.sym.as_ref()),
        Expr::Member(m) => match &m.prop {
            MemberProp::Ident(p) => Some(p.sym.as_ref()),
            _ => None,
        },
        _ => None,
    }
}

pub fn first_ident_arg(call: &CallExpr) -> Option<&Ident> {
    match call.args.first() {
        Some(arg) if arg.spread.is_none() => match peel(&arg.expr) {
            Expr::Ident(id) => Some(id),
            _ => None,
        },
        _ => None,
    }
}

fn has_render_member(class: &Class) -> bool {
    class.body.iter().any(|member| match member {
        ClassMember::Method(m) => prop_name_is(&m.key, "render"),
        // render = () => ...
        ClassMember::ClassProp(p) => {
            prop_name_is(&p.key, "render")
                && matches!(p.value.as_deref().map(peel), Some(Expr::Arrow(_) | Expr::Fn(_)))
        }
        _ => false,
    })
}

fn prop_name_is(key: &PropName, name: &str) -> bool {
    matches!(key, PropName::Ident(id) if id.sym.as_ref() == name)
}
