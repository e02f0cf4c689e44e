//! Shared analysis predicates and tree walkers
//!
//! Everything here must work without a resolved symbol table: attribute
//! names match by simple name, `...Attribute` suffix, or a trailing dotted
//! qualifier, and type-name comparisons normalise primitive aliases.

use crate::semantic::{SemanticModel, SyncMode};
use crate::syntax::{
    AttributeUse, Block, Expr, FieldDecl, Member, MethodDecl, Stmt, TypeDecl, TypeRef,
};

// ---- attribute matching -------------------------------------------------

/// Whether an attribute use matches a target simple name. Accepts the
/// simple name, the `Attribute`-suffixed form, and either with a dotted
/// qualifier in front.
pub fn attribute_matches(attr: &AttributeUse, target: &str) -> bool {
    let name = attr.name.rsplit('.').next().unwrap_or(&attr.name);
    name == target || name.strip_suffix("Attribute") == Some(target)
}

pub fn find_attribute<'a>(attrs: &'a [AttributeUse], target: &str) -> Option<&'a AttributeUse> {
    attrs.iter().find(|a| attribute_matches(a, target))
}

pub fn has_attribute(attrs: &[AttributeUse], target: &str) -> bool {
    find_attribute(attrs, target).is_some()
}

/// Trailing member name of an attribute-argument path, e.g.
/// `BehaviourSyncMode.Manual` -> `Manual`.
pub fn trailing_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Member { name, .. } => Some(name.clone()),
        Expr::Ident { name, .. } => Some(name.clone()),
        Expr::Paren { value, .. } => trailing_name(value),
        _ => None,
    }
}

// ---- UdonSharp script predicate ----------------------------------------

/// Whether a type declaration is an UdonSharp script: its resolvable
/// inheritance chain reaches the marker base, or the base list names it
/// syntactically, or any attribute (on the type or its members) carries an
/// "Udon" token.
pub fn is_udon_script(model: &SemanticModel, decl: &TypeDecl) -> bool {
    if model.inherits_behaviour(decl) {
        return true;
    }
    if decl
        .base_list
        .iter()
        .any(|base| base.name == "UdonSharpBehaviour")
    {
        return true;
    }
    let udonish = |attrs: &[AttributeUse]| {
        attrs
            .iter()
            .any(|a| a.name.to_ascii_lowercase().contains("udon"))
    };
    if udonish(&decl.attributes) {
        return true;
    }
    decl.members.iter().any(|member| match member {
        Member::Field(f) => udonish(&f.attributes),
        Member::Property(p) => udonish(&p.attributes),
        Member::Method(m) => udonish(&m.attributes),
        Member::Constructor(c) => udonish(&c.attributes),
        _ => false,
    })
}

/// Behaviour sync mode from the `UdonBehaviourSyncMode` attribute. The mode
/// may be a positional `BehaviourSyncMode.X` argument or a named `Mode = X`.
pub fn sync_mode_of(decl: &TypeDecl) -> Option<SyncMode> {
    let attr = find_attribute(&decl.attributes, "UdonBehaviourSyncMode")?;
    for arg in &attr.args {
        if let Some(name) = &arg.name {
            if name != "Mode" {
                continue;
            }
        }
        if let Some(mode) = trailing_name(&arg.value).and_then(|n| SyncMode::from_name(&n)) {
            return Some(mode);
        }
    }
    None
}

/// Tween mode named by an `UdonSynced` attribute argument
/// (`UdonSyncMode.Linear` / `UdonSyncMode.Smooth`), if any.
pub fn tween_mode_of(field: &FieldDecl) -> Option<String> {
    let attr = find_attribute(&field.attributes, "UdonSynced")?;
    for arg in &attr.args {
        if let Some(name) = trailing_name(&arg.value) {
            if matches!(name.as_str(), "Linear" | "Smooth" | "None") {
                return Some(name);
            }
        }
    }
    None
}

// ---- primitive aliases and numeric compatibility ------------------------

/// `(alias, metadata name)` pairs for the primitive types
pub const PRIMITIVE_ALIASES: &[(&str, &str)] = &[
    ("bool", "System.Boolean"),
    ("byte", "System.Byte"),
    ("sbyte", "System.SByte"),
    ("char", "System.Char"),
    ("short", "System.Int16"),
    ("ushort", "System.UInt16"),
    ("int", "System.Int32"),
    ("uint", "System.UInt32"),
    ("long", "System.Int64"),
    ("ulong", "System.UInt64"),
    ("float", "System.Single"),
    ("double", "System.Double"),
    ("decimal", "System.Decimal"),
    ("string", "System.String"),
    ("object", "System.Object"),
];

/// Numeric primitives treated as mutually compatible for argument checking
pub const NUMERIC_FAMILY: &[&str] = &[
    "byte", "sbyte", "short", "ushort", "int", "uint", "long", "ulong", "float", "double",
    "decimal",
];

/// Normalise a type name across primitive aliases: `System.Int32` -> `int`,
/// bare metadata names (`Int32`) included.
pub fn normalize_type_name(name: &str) -> String {
    let trimmed = name.trim();
    for (alias, metadata) in PRIMITIVE_ALIASES {
        if trimmed == *alias
            || trimmed == *metadata
            || trimmed == metadata.strip_prefix("System.").unwrap_or(metadata)
        {
            return (*alias).to_string();
        }
    }
    trimmed.to_string()
}

pub fn is_numeric(name: &str) -> bool {
    NUMERIC_FAMILY.contains(&normalize_type_name(name).as_str())
}

/// Whether an argument of type `from` is acceptable where `to` is expected.
/// Unknown types never produce a mismatch.
pub fn types_compatible(from: &str, to: &str) -> bool {
    if from.is_empty() || to.is_empty() {
        return true;
    }
    let from = normalize_type_name(from);
    let to = normalize_type_name(to);
    if from == to {
        return true;
    }
    if from == "null" {
        // null converts to any reference-ish target; primitives reject it
        return !NUMERIC_FAMILY.contains(&to.as_str()) && to != "bool" && to != "char";
    }
    if to == "object" {
        return true;
    }
    is_numeric(&from) && is_numeric(&to)
}

/// Unwrap one level of nullability: `int?` and `Nullable<int>` both yield
/// `int`. Applied once before any deny-list or support-list check.
pub fn unwrap_nullable(ty: &TypeRef) -> TypeRef {
    if ty.nullable {
        let mut inner = ty.clone();
        inner.nullable = false;
        if inner.text.ends_with('?') {
            inner.text.pop();
        }
        return inner;
    }
    if ty.name == "Nullable" && ty.args.len() == 1 {
        return ty.args[0].clone();
    }
    ty.clone()
}

// ---- constant string resolution -----------------------------------------

/// How a method-name argument was written, for the nameof advisory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub value: String,
    /// `Some(type_name)` when written as `nameof(Type.Member)`
    pub nameof_qualifier: Option<String>,
    pub is_bare_literal: bool,
}

/// Resolve an expression to a compile-time constant string: a literal, a
/// `nameof(...)` reference, or a `const string` local/field.
pub fn resolve_constant_string(
    expr: &Expr,
    method: Option<&MethodDecl>,
    enclosing: &TypeDecl,
) -> Option<ResolvedName> {
    match expr {
        Expr::Literal { .. } => expr.as_str_literal().map(|s| ResolvedName {
            value: s.to_string(),
            nameof_qualifier: None,
            is_bare_literal: true,
        }),
        Expr::Nameof { path, .. } => {
            let value = path.last()?.clone();
            let qualifier = if path.len() > 1 {
                Some(path[path.len() - 2].clone())
            } else {
                None
            };
            Some(ResolvedName {
                value,
                nameof_qualifier: qualifier,
                is_bare_literal: false,
            })
        }
        Expr::Ident { name, .. } => {
            if let Some(method) = method {
                if let Some(value) = const_local_value(method, name) {
                    return Some(ResolvedName {
                        value,
                        nameof_qualifier: None,
                        is_bare_literal: false,
                    });
                }
            }
            const_field_value(enclosing, name).map(|value| ResolvedName {
                value,
                nameof_qualifier: None,
                is_bare_literal: false,
            })
        }
        Expr::Paren { value, .. } => resolve_constant_string(value, method, enclosing),
        _ => None,
    }
}

fn const_local_value(method: &MethodDecl, name: &str) -> Option<String> {
    let body = method.body.as_ref()?;
    let mut found = None;
    walk_stmts(body, &mut |stmt| {
        if let Stmt::LocalVar {
            is_const: true,
            declarators,
            ..
        } = stmt
        {
            for d in declarators {
                if d.name == name {
                    if let Some(value) = d.init.as_ref().and_then(|e| e.as_str_literal()) {
                        found = Some(value.to_string());
                    }
                }
            }
        }
    });
    found
}

fn const_field_value(decl: &TypeDecl, name: &str) -> Option<String> {
    decl.fields()
        .filter(|f| f.is_const())
        .flat_map(|f| f.declarators.iter())
        .find(|d| d.name == name)
        .and_then(|d| d.init.as_ref().and_then(|e| e.as_str_literal()))
        .map(String::from)
}

// ---- expression typing ----------------------------------------------------

/// Static type text of an expression, from purely local evidence: literal
/// shapes, casts, `new` expressions, and declared locals/parameters/fields.
/// Empty when unknown; unknown never produces a mismatch downstream.
pub fn infer_expr_type(expr: &Expr, method: Option<&MethodDecl>, enclosing: &TypeDecl) -> String {
    use crate::syntax::Lit;
    match expr {
        Expr::Literal { value, .. } => match value {
            Lit::Str(_) => "string".to_string(),
            Lit::Char(_) => "char".to_string(),
            Lit::Int(text) => {
                if text.to_ascii_lowercase().contains('l') {
                    "long".to_string()
                } else {
                    "int".to_string()
                }
            }
            Lit::Float(text) => {
                let lower = text.to_ascii_lowercase();
                if lower.ends_with('f') {
                    "float".to_string()
                } else if lower.ends_with('m') {
                    "decimal".to_string()
                } else {
                    "double".to_string()
                }
            }
            Lit::Bool(_) => "bool".to_string(),
            Lit::Null => "null".to_string(),
        },
        Expr::Interpolated(_) => "string".to_string(),
        Expr::Paren { value, .. } => infer_expr_type(value, method, enclosing),
        Expr::Cast { ty, .. } | Expr::As { ty, .. } => ty.text.clone(),
        Expr::New { ty, is_array, .. } => match ty {
            Some(ty) if *is_array => format!("{}[]", ty.text),
            Some(ty) => ty.text.clone(),
            None => String::new(),
        },
        Expr::Ident { name, .. } => {
            if let Some(method) = method {
                for param in &method.params {
                    if param.name == *name {
                        return param.ty.text.clone();
                    }
                }
                if let Some(body) = &method.body {
                    let mut found = None;
                    walk_stmts(body, &mut |stmt| {
                        if let Stmt::LocalVar {
                            ty: Some(ty),
                            declarators,
                            ..
                        } = stmt
                        {
                            if declarators.iter().any(|d| d.name == *name) {
                                found = Some(ty.text.clone());
                            }
                        }
                    });
                    if let Some(found) = found {
                        return found;
                    }
                }
            }
            enclosing
                .fields()
                .find(|f| f.declarators.iter().any(|d| d.name == *name))
                .map(|f| f.ty.text.clone())
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

// ---- tree walkers --------------------------------------------------------

/// Every block in a type declaration: method bodies, constructor bodies,
/// property accessors. Local-function bodies are visited by the statement
/// walker, not listed here.
pub fn bodies_of(decl: &TypeDecl) -> Vec<(Option<&MethodDecl>, &Block)> {
    let mut bodies = Vec::new();
    for member in &decl.members {
        match member {
            Member::Method(m) => {
                if let Some(body) = &m.body {
                    bodies.push((Some(m), body));
                }
            }
            Member::Constructor(c) => {
                if let Some(body) = &c.body {
                    bodies.push((None, body));
                }
            }
            Member::Property(p) => {
                for body in &p.accessor_bodies {
                    bodies.push((None, body));
                }
            }
            _ => {}
        }
    }
    bodies
}

/// Pre-order walk over every statement in a block, including nested blocks
/// and local-function bodies
pub fn walk_stmts<'a>(block: &'a Block, f: &mut impl FnMut(&'a Stmt)) {
    for stmt in &block.statements {
        walk_stmt(stmt, f);
    }
}

fn walk_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Stmt)) {
    f(stmt);
    match stmt {
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            walk_stmt(then_branch, f);
            if let Some(else_branch) = else_branch {
                walk_stmt(else_branch, f);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Foreach { body, .. } => {
            walk_stmt(body, f)
        }
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                walk_stmt(init, f);
            }
            walk_stmt(body, f);
        }
        Stmt::Switch { body, .. } => {
            for s in body {
                walk_stmt(s, f);
            }
        }
        Stmt::Try {
            block,
            catches,
            finally,
            ..
        } => {
            walk_stmts(block, f);
            for catch in catches {
                walk_stmts(&catch.block, f);
            }
            if let Some(finally) = finally {
                walk_stmts(finally, f);
            }
        }
        Stmt::Labeled { stmt, .. } => walk_stmt(stmt, f),
        Stmt::LocalFunction(decl) => {
            if let Some(body) = &decl.body {
                walk_stmts(body, f);
            }
        }
        Stmt::Block(block) => walk_stmts(block, f),
        _ => {}
    }
}

/// Walk every expression reachable from a block, including sub-expressions
pub fn walk_exprs<'a>(block: &'a Block, f: &mut impl FnMut(&'a Expr)) {
    walk_stmts(block, &mut |stmt| {
        for expr in stmt_exprs(stmt) {
            walk_expr(expr, f);
        }
    });
}

fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::LocalVar { declarators, .. } => {
            declarators.iter().filter_map(|d| d.init.as_ref()).collect()
        }
        Stmt::Expr(expr) => vec![expr],
        Stmt::If { cond, .. } | Stmt::While { cond, .. } | Stmt::DoWhile { cond, .. } => {
            vec![cond]
        }
        Stmt::For { cond, step, .. } => {
            let mut out: Vec<&Expr> = cond.iter().collect();
            out.extend(step.iter());
            out
        }
        Stmt::Foreach { iterable, .. } => vec![iterable],
        Stmt::Switch { scrutinee, .. } => vec![scrutinee],
        Stmt::Return { value, .. } | Stmt::Throw { value, .. } => value.iter().collect(),
        _ => Vec::new(),
    }
}

/// Pre-order walk over an expression tree
pub fn walk_expr<'a>(expr: &'a Expr, f: &mut impl FnMut(&'a Expr)) {
    f(expr);
    match expr {
        Expr::Member { target, .. } => walk_expr(target, f),
        Expr::Invocation { target, args, .. } => {
            walk_expr(target, f);
            for arg in args {
                walk_expr(&arg.value, f);
            }
        }
        Expr::ElementAccess {
            target, indices, ..
        } => {
            walk_expr(target, f);
            for index in indices {
                walk_expr(index, f);
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr(&arg.value, f);
            }
        }
        Expr::Is { value, .. } | Expr::As { value, .. } | Expr::Cast { value, .. } => {
            walk_expr(value, f)
        }
        Expr::Unary { value, .. } => walk_expr(value, f),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        Expr::Assign { target, value, .. } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        Expr::Conditional {
            cond,
            then_value,
            else_value,
            ..
        } => {
            walk_expr(cond, f);
            walk_expr(then_value, f);
            walk_expr(else_value, f);
        }
        Expr::Paren { value, .. } => walk_expr(value, f),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::DocumentSnapshot;
    use crate::syntax::parse;
    use std::sync::Arc;
    use tower_lsp::lsp_types::Url;

    fn first_type(source: &str) -> TypeDecl {
        parse(source, "Test").types()[0].0.clone()
    }

    fn model_of(sources: &[&str]) -> SemanticModel {
        let docs = sources
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Arc::new(DocumentSnapshot {
                    uri: Url::parse(&format!("file:///T{}.cs", i)).unwrap(),
                    text: Arc::from(*s),
                    tree: Arc::new(parse(s, &format!("T{}", i))),
                    version: 1,
                })
            })
            .collect();
        SemanticModel::build(docs, false)
    }

    #[test]
    fn test_attribute_matching_forms() {
        let ty = first_type(
            "[NetworkCallable] [VRC.Udon.UdonSyncedAttribute] class Foo { }",
        );
        assert!(attribute_matches(&ty.attributes[0], "NetworkCallable"));
        assert!(attribute_matches(&ty.attributes[1], "UdonSynced"));
        assert!(!attribute_matches(&ty.attributes[0], "UdonSynced"));
    }

    #[test]
    fn test_udon_script_predicate() {
        let model = model_of(&["class A : UdonSharpBehaviour { }"]);
        let direct = first_type("class B : UdonSharpBehaviour { }");
        assert!(is_udon_script(&model, &direct));

        let by_member_attr = first_type("class C { [UdonSynced] int x; }");
        assert!(is_udon_script(&model, &by_member_attr));

        let plain = first_type("class D : MonoBehaviour { int x; }");
        assert!(!is_udon_script(&model, &plain));
    }

    #[test]
    fn test_sync_mode_extraction() {
        let positional =
            first_type("[UdonBehaviourSyncMode(BehaviourSyncMode.NoVariableSync)] class A { }");
        assert_eq!(sync_mode_of(&positional), Some(SyncMode::NoVariableSync));

        let named = first_type("[UdonBehaviourSyncMode(Mode = BehaviourSyncMode.Manual)] class B { }");
        assert_eq!(sync_mode_of(&named), Some(SyncMode::Manual));

        let none = first_type("class C { }");
        assert_eq!(sync_mode_of(&none), None);
    }

    #[test]
    fn test_tween_mode_extraction() {
        let ty = first_type("class A { [UdonSynced(UdonSyncMode.Linear)] float speed; }");
        assert_eq!(tween_mode_of(ty.fields().next().unwrap()), Some("Linear".into()));

        let ty = first_type("class B { [UdonSynced] float speed; }");
        assert_eq!(tween_mode_of(ty.fields().next().unwrap()), None);
    }

    #[test]
    fn test_primitive_alias_normalisation() {
        assert_eq!(normalize_type_name("System.Int32"), "int");
        assert_eq!(normalize_type_name("Int32"), "int");
        assert_eq!(normalize_type_name("int"), "int");
        assert_eq!(normalize_type_name("System.Single"), "float");
        assert_eq!(normalize_type_name("Vector3"), "Vector3");
    }

    #[test]
    fn test_type_compatibility() {
        assert!(types_compatible("int", "System.Int32"));
        assert!(types_compatible("int", "float"));
        assert!(types_compatible("byte", "long"));
        assert!(!types_compatible("string", "int"));
        assert!(types_compatible("string", "object"));
        assert!(types_compatible("null", "string"));
        assert!(!types_compatible("null", "int"));
        assert!(types_compatible("", "int"));
    }

    #[test]
    fn test_unwrap_nullable() {
        let ty = first_type("class A { int? a; Nullable<float> b; int c; }");
        let fields: Vec<_> = ty.fields().collect();
        assert_eq!(unwrap_nullable(&fields[0].ty).name, "int");
        assert!(!unwrap_nullable(&fields[0].ty).nullable);
        assert_eq!(unwrap_nullable(&fields[1].ty).name, "float");
        assert_eq!(unwrap_nullable(&fields[2].ty).name, "int");
    }

    #[test]
    fn test_constant_string_resolution() {
        let ty = first_type(
            r#"class A {
                private const string EventName = "Fire";
                void Go() {
                    const string local = "Local";
                    Use("lit");
                    Use(nameof(A.Go));
                    Use(EventName);
                    Use(local);
                }
            }"#,
        );
        let method = ty.methods().next().unwrap();
        let body = method.body.as_ref().unwrap();
        let mut calls = Vec::new();
        walk_exprs(body, &mut |e| {
            if let Expr::Invocation { args, .. } = e {
                if let Some(arg) = args.first() {
                    calls.push(resolve_constant_string(&arg.value, Some(method), &ty));
                }
            }
        });
        assert_eq!(calls.len(), 4);
        let lit = calls[0].clone().unwrap();
        assert_eq!(lit.value, "lit");
        assert!(lit.is_bare_literal);
        let named = calls[1].clone().unwrap();
        assert_eq!(named.value, "Go");
        assert_eq!(named.nameof_qualifier.as_deref(), Some("A"));
        assert!(!named.is_bare_literal);
        assert_eq!(calls[2].clone().unwrap().value, "Fire");
        assert_eq!(calls[3].clone().unwrap().value, "Local");
    }

    #[test]
    fn test_walkers_reach_nested_statements() {
        let ty = first_type(
            r#"class A {
                void Go() {
                    if (x) { while (y) { try { Do(); } catch { Fail(); } } }
                    int Local() { return Inner(); }
                }
            }"#,
        );
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let mut invocations = 0;
        walk_exprs(body, &mut |e| {
            if matches!(e, Expr::Invocation { .. }) {
                invocations += 1;
            }
        });
        assert_eq!(invocations, 3);
    }
}
