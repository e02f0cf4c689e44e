//! Language constraint rules (USH0022-USH0039)
//!
//! Banned C# features inside UdonSharp scripts: nullable value types,
//! null-conditional access, multidimensional arrays, local functions,
//! nested types, constructors, generic methods, interfaces, method hiding,
//! initializers, `typeof` on scripts, statics, partial methods, and the
//! `goto` family.

use crate::analysis::engine::RuleContext;
use crate::analysis::utils::{
    bodies_of, is_udon_script, normalize_type_name, walk_exprs, walk_stmts,
};
use crate::diagnostic::Span;
use crate::semantic::{SemanticModel, UDON_SHARP_BEHAVIOUR, UDON_SHARP_BEHAVIOUR_METHODS};
use crate::syntax::{Expr, GotoKind, Member, MethodDecl, Stmt, TypeDecl, TypeKind, TypeRef};

pub const IDS: &[&str] = &[
    "USH0022", "USH0023", "USH0024", "USH0025", "USH0026", "USH0027", "USH0028", "USH0029",
    "USH0030", "USH0031", "USH0032", "USH0033", "USH0034", "USH0035", "USH0036", "USH0037",
    "USH0038", "USH0039",
];

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }
        check_members(ctx, model, decl);
        check_declared_types(ctx, decl);
        for (_, body) in bodies_of(decl) {
            check_statements(ctx, body);
            check_expressions(ctx, model, body);
        }
    }
}

fn check_members(ctx: &mut RuleContext, model: &SemanticModel, decl: &TypeDecl) {
    for base in &decl.base_list {
        if base.name == UDON_SHARP_BEHAVIOUR {
            continue;
        }
        if is_interface(model, base) {
            ctx.report("USH0030", base.span, &[]);
        }
    }

    for member in &decl.members {
        match member {
            Member::Nested(nested) => {
                ctx.report("USH0027", nested.name_span, &[]);
            }
            Member::Constructor(ctor) => {
                ctx.report("USH0028", ctor.span, &[]);
            }
            Member::Field(field) => {
                if field.is_static() && !field.is_const() {
                    ctx.report("USH0034", field.span, &[]);
                }
            }
            Member::Property(prop) => {
                if prop.modifiers.contains(&crate::syntax::Modifier::Static) {
                    ctx.report("USH0034", prop.name_span, &[]);
                }
            }
            Member::Method(method) => {
                if method.is_generic() {
                    ctx.report("USH0029", method.name_span, &[]);
                }
                if method.is_partial() {
                    ctx.report("USH0035", method.name_span, &[]);
                }
                if !method.is_override() && hides_base_method(model, decl, method) {
                    ctx.report("USH0031", method.name_span, &[&method.name]);
                }
            }
            Member::Opaque(_) => {}
        }
    }
}

/// Syntactic interface heuristic when the base cannot be resolved: an `I`
/// followed by another capital, the common .NET convention.
fn is_interface(model: &SemanticModel, base: &TypeRef) -> bool {
    if let Some(handle) = model.resolve_type(&base.name) {
        return handle.decl.kind == TypeKind::Interface;
    }
    let mut chars = base.name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Whether a non-override method re-declares a base method's signature
fn hides_base_method(model: &SemanticModel, decl: &TypeDecl, method: &MethodDecl) -> bool {
    let params: Vec<String> = method
        .params
        .iter()
        .map(|p| normalize_type_name(&p.ty.text))
        .collect();

    for base in model.base_chain(decl) {
        for candidate in base.decl.methods() {
            if candidate.name != method.name {
                continue;
            }
            let base_params: Vec<String> = candidate
                .params
                .iter()
                .map(|p| normalize_type_name(&p.ty.text))
                .collect();
            if base_params == params {
                return true;
            }
        }
    }
    if model.inherits_behaviour(decl)
        || decl
            .base_list
            .first()
            .is_some_and(|b| b.name == UDON_SHARP_BEHAVIOUR)
    {
        return UDON_SHARP_BEHAVIOUR_METHODS.iter().any(|(name, sig)| {
            *name == method.name
                && sig.len() == params.len()
                && sig
                    .iter()
                    .zip(&params)
                    .all(|(a, b)| normalize_type_name(a) == *b)
        });
    }
    false
}

fn check_declared_types(ctx: &mut RuleContext, decl: &TypeDecl) {
    let mut check = |ty: &TypeRef, span: Span| {
        if ty.nullable || (ty.name == "Nullable" && !ty.args.is_empty()) {
            ctx.report("USH0022", span, &[]);
        }
        if ty.is_multi_dimensional() {
            ctx.report("USH0024", span, &[]);
        }
    };

    for member in &decl.members {
        match member {
            Member::Field(field) => check(&field.ty, field.ty.span),
            Member::Property(prop) => check(&prop.ty, prop.ty.span),
            Member::Method(method) => {
                check(&method.return_ty, method.return_ty.span);
                for param in &method.params {
                    check(&param.ty, param.ty.span);
                }
                if let Some(body) = &method.body {
                    walk_stmts(body, &mut |stmt| {
                        if let Stmt::LocalVar { ty: Some(ty), .. } = stmt {
                            check(ty, ty.span);
                        }
                    });
                }
            }
            _ => {}
        }
    }
}

fn check_statements(ctx: &mut RuleContext, body: &crate::syntax::Block) {
    walk_stmts(body, &mut |stmt| match stmt {
        Stmt::LocalFunction(decl) => {
            ctx.report("USH0026", decl.name_span, &[]);
        }
        Stmt::Labeled { span, .. } => {
            ctx.report("USH0037", *span, &[]);
        }
        Stmt::Goto { kind, span } => {
            let rule = match kind {
                GotoKind::Label(_) => "USH0036",
                GotoKind::Case => "USH0038",
                GotoKind::Default => "USH0039",
            };
            ctx.report(rule, *span, &[]);
        }
        _ => {}
    });
}

fn check_expressions(ctx: &mut RuleContext, model: &SemanticModel, body: &crate::syntax::Block) {
    walk_exprs(body, &mut |expr| match expr {
        Expr::Member {
            null_conditional: true,
            span,
            ..
        }
        | Expr::ElementAccess {
            null_conditional: true,
            span,
            ..
        } => {
            ctx.report("USH0023", *span, &[]);
        }
        Expr::ElementAccess { indices, span, .. } if indices.len() > 1 => {
            ctx.report("USH0025", *span, &[]);
        }
        Expr::New {
            is_array,
            array_rank,
            initializer,
            span,
            ..
        } => {
            if *is_array && *array_rank > 1 {
                ctx.report("USH0024", *span, &[]);
            }
            if !*is_array && initializer.is_some() {
                ctx.report("USH0032", *span, &[]);
            }
        }
        Expr::Typeof { ty, span } => {
            if let Some(handle) = model.resolve_type(&ty.name) {
                if is_udon_script(model, handle.decl) {
                    ctx.report("USH0033", *span, &[&ty.name]);
                }
            }
        }
        _ => {}
    });
}
