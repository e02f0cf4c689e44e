//! API exposure rules (USH0013-USH0015)
//!
//! A fixed deny-list of namespace prefixes, specific types, and specific
//! member accesses that the runtime does not expose. Nullable wrappers are
//! unwrapped once before any type check.

use crate::analysis::engine::RuleContext;
use crate::analysis::target::infer_receiver_type_name;
use crate::analysis::utils::{bodies_of, is_udon_script, unwrap_nullable, walk_exprs, walk_stmts};
use crate::diagnostic::Span;
use crate::syntax::{Expr, Member, MethodDecl, Stmt, TypeDecl, TypeRef};

pub const IDS: &[&str] = &["USH0013", "USH0014", "USH0015"];

/// Namespace prefixes the runtime never exposes
pub const FORBIDDEN_NAMESPACES: &[&str] = &[
    "System.IO",
    "System.Net",
    "System.Reflection",
    "System.Threading",
    "System.Diagnostics",
    "System.Security",
    "System.Runtime.InteropServices",
    "System.Web",
    "UnityEditor",
];

/// `(simple name, fully-qualified name)` for types inside those namespaces
/// that commonly appear unqualified via `using` directives
const FORBIDDEN_TYPES: &[(&str, &str)] = &[
    ("File", "System.IO.File"),
    ("Directory", "System.IO.Directory"),
    ("Path", "System.IO.Path"),
    ("FileStream", "System.IO.FileStream"),
    ("StreamReader", "System.IO.StreamReader"),
    ("StreamWriter", "System.IO.StreamWriter"),
    ("WebClient", "System.Net.WebClient"),
    ("HttpClient", "System.Net.Http.HttpClient"),
    ("Socket", "System.Net.Sockets.Socket"),
    ("Assembly", "System.Reflection.Assembly"),
    ("MethodInfo", "System.Reflection.MethodInfo"),
    ("FieldInfo", "System.Reflection.FieldInfo"),
    ("Thread", "System.Threading.Thread"),
    ("Task", "System.Threading.Tasks.Task"),
    ("Mutex", "System.Threading.Mutex"),
    ("Process", "System.Diagnostics.Process"),
    ("Stopwatch", "System.Diagnostics.Stopwatch"),
    ("Marshal", "System.Runtime.InteropServices.Marshal"),
    ("AssetDatabase", "UnityEditor.AssetDatabase"),
    ("EditorUtility", "UnityEditor.EditorUtility"),
    ("EditorApplication", "UnityEditor.EditorApplication"),
];

/// `(receiver type, member)` pairs blocked even though the type is exposed
const FORBIDDEN_MEMBERS: &[(&str, &str)] = &[
    ("Component", "GetComponent"),
    ("Component", "GetComponents"),
    ("GameObject", "GetComponent"),
    ("GameObject", "GetComponents"),
];

fn forbidden_namespace_of(path: &str) -> Option<&'static str> {
    FORBIDDEN_NAMESPACES
        .iter()
        .find(|ns| path == **ns || path.starts_with(&format!("{}.", ns)))
        .copied()
}

fn forbidden_type_fq(name: &str) -> Option<&'static str> {
    FORBIDDEN_TYPES
        .iter()
        .find(|(simple, fq)| *simple == name || *fq == name)
        .map(|(_, fq)| *fq)
}

/// Dotted source path of a pure name chain, e.g. `System.IO.File.Open`
fn expr_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident { name, .. } => Some(name.clone()),
        Expr::Member {
            target,
            name,
            null_conditional: false,
            ..
        } => Some(format!("{}.{}", expr_path(target)?, name)),
        _ => None,
    }
}

fn forbidden_declared_type(ty: &TypeRef) -> Option<String> {
    let ty = unwrap_nullable(ty);
    let qualified = ty.qualified_name();
    if forbidden_namespace_of(&qualified).is_some() {
        return Some(qualified);
    }
    forbidden_type_fq(&ty.name).map(String::from)
}

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }

        check_declarations(ctx, decl);

        for (method, body) in bodies_of(decl) {
            // invocation targets claimed by the call check are not
            // re-reported as plain member accesses
            let mut call_targets: Vec<Span> = Vec::new();
            let mut calls: Vec<(&Expr, Span)> = Vec::new();
            let mut members: Vec<(&Expr, Span)> = Vec::new();
            walk_exprs(body, &mut |expr| match expr {
                Expr::Invocation { target, span, .. } => {
                    call_targets.push(target.span());
                    calls.push((&**target, *span));
                }
                Expr::Member { span, .. } => members.push((expr, *span)),
                _ => {}
            });

            for (target, span) in calls {
                check_call(ctx, decl, method, target, span);
            }
            // outermost chains win: members nested inside a claimed call
            // target or an already-reported chain stay quiet
            let mut claimed = call_targets;
            for (member, span) in members {
                if claimed
                    .iter()
                    .any(|outer| outer.start <= span.start && span.end <= outer.end)
                {
                    continue;
                }
                if check_member_access(ctx, member, span) {
                    claimed.push(span);
                }
            }
        }
    }
}

fn check_declarations(ctx: &mut RuleContext, decl: &TypeDecl) {
    for member in &decl.members {
        match member {
            Member::Field(field) => {
                if let Some(fq) = forbidden_declared_type(&field.ty) {
                    ctx.report("USH0015", field.ty.span, &[&fq]);
                }
            }
            Member::Property(prop) => {
                if let Some(fq) = forbidden_declared_type(&prop.ty) {
                    ctx.report("USH0015", prop.ty.span, &[&fq]);
                }
            }
            Member::Method(method) => {
                for param in &method.params {
                    if let Some(fq) = forbidden_declared_type(&param.ty) {
                        ctx.report("USH0015", param.ty.span, &[&fq]);
                    }
                }
                if let Some(body) = &method.body {
                    walk_stmts(body, &mut |stmt| {
                        if let Stmt::LocalVar { ty: Some(ty), .. } = stmt {
                            if let Some(fq) = forbidden_declared_type(ty) {
                                ctx.report("USH0015", ty.span, &[&fq]);
                            }
                        }
                    });
                }
            }
            _ => {}
        }
    }
}

fn check_call(
    ctx: &mut RuleContext,
    enclosing: &TypeDecl,
    method: Option<&MethodDecl>,
    target: &Expr,
    call_span: Span,
) {
    let Expr::Member {
        target: receiver,
        name,
        ..
    } = target
    else {
        return;
    };

    if let Some(path) = expr_path(target) {
        if forbidden_namespace_of(&path).is_some() {
            ctx.report("USH0013", call_span, &[&path]);
            return;
        }
        if let Some(receiver_path) = expr_path(receiver) {
            if !receiver_path.contains('.') {
                if let Some(fq) = forbidden_type_fq(&receiver_path) {
                    ctx.report("USH0013", call_span, &[&format!("{}.{}", fq, name)]);
                    return;
                }
            }
        }
    }

    // blocked members on otherwise-exposed types
    if FORBIDDEN_MEMBERS.iter().any(|(_, m)| m == name) {
        let receiver_type = infer_receiver_type_name(receiver, method, enclosing)
            .or_else(|| match &**receiver {
                // the engine-provided `gameObject` property
                Expr::Ident { name, .. } | Expr::Member { name, .. }
                    if name == "gameObject" =>
                {
                    Some("GameObject".to_string())
                }
                _ => None,
            });
        if let Some(receiver_type) = receiver_type {
            if FORBIDDEN_MEMBERS
                .iter()
                .any(|(ty, m)| *ty == receiver_type && m == name)
            {
                ctx.report(
                    "USH0013",
                    call_span,
                    &[&format!("{}.{}", receiver_type, name)],
                );
            }
        }
    }
}

fn check_member_access(ctx: &mut RuleContext, member: &Expr, span: Span) -> bool {
    let Some(path) = expr_path(member) else {
        return false;
    };
    if forbidden_namespace_of(&path).is_some() {
        ctx.report("USH0014", span, &[&path]);
        return true;
    }
    let Expr::Member { target, name, .. } = member else {
        return false;
    };
    if let Some(receiver_path) = expr_path(target) {
        if !receiver_path.contains('.') {
            if let Some(fq) = forbidden_type_fq(&receiver_path) {
                ctx.report("USH0014", span, &[&format!("{}.{}", fq, name)]);
                return true;
            }
        }
    }
    false
}
