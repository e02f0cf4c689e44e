//! Network-event wiring rules (USH0001-USH0006, USH0043)
//!
//! Fires on `SendCustomEvent*` and `SendCustomNetworkEvent*` calls whose
//! receiver's static type is an UdonSharp script. The target type comes
//! from the semantic resolver when the symbol index can produce it, and
//! from the current-file syntax resolver otherwise; the checks themselves
//! are path-agnostic.

use crate::analysis::engine::RuleContext;
use crate::analysis::target::{
    find_candidates, Candidate, ResolveTarget, SemanticTargetResolver, SyntaxTargetResolver,
    TargetQuery,
};
use crate::analysis::utils::{
    bodies_of, infer_expr_type, is_udon_script, resolve_constant_string, sync_mode_of,
    types_compatible, walk_exprs, ResolvedName,
};
use crate::diagnostic::Span;
use crate::semantic::SyncMode;
use crate::syntax::{Arg, Expr, MethodDecl, TypeDecl};

pub const IDS: &[&str] = &[
    "USH0001", "USH0002", "USH0003", "USH0004", "USH0005", "USH0006", "USH0043",
];

const CUSTOM_EVENT_METHODS: &[&str] = &[
    "SendCustomEvent",
    "SendCustomEventDelayedSeconds",
    "SendCustomEventDelayedFrames",
];

const NETWORK_EVENT_METHODS: &[&str] = &[
    "SendCustomNetworkEvent",
    "SendCustomNetworkEventDelayedSeconds",
    "SendCustomNetworkEventDelayedFrames",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Custom,
    Network,
}

struct CallSite<'a> {
    family: Family,
    /// `None` for bare invocations (implicit `this`)
    receiver: Option<&'a Expr>,
    args: &'a [Arg],
    span: Span,
    /// Whether payload checks apply (the non-delayed network overload)
    supports_payload: bool,
}

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    let doc = ctx.doc;
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }
        for (method, body) in bodies_of(decl) {
            let mut calls: Vec<CallSite> = Vec::new();
            walk_exprs(body, &mut |expr| {
                if let Some(call) = as_event_call(expr) {
                    calls.push(call);
                }
            });
            for call in calls {
                check_call(ctx, decl, method, &call, &doc.tree);
            }
        }
    }
}

fn as_event_call(expr: &Expr) -> Option<CallSite<'_>> {
    let Expr::Invocation {
        target, args, span, ..
    } = expr
    else {
        return None;
    };
    let (invoked, receiver) = match &**target {
        Expr::Ident { name, .. } => (name.as_str(), None),
        Expr::Member { name, target, .. } => (name.as_str(), Some(&**target)),
        _ => return None,
    };
    let family = if CUSTOM_EVENT_METHODS.contains(&invoked) {
        Family::Custom
    } else if NETWORK_EVENT_METHODS.contains(&invoked) {
        Family::Network
    } else {
        return None;
    };
    Some(CallSite {
        family,
        receiver,
        args,
        span: *span,
        supports_payload: invoked == "SendCustomNetworkEvent",
    })
}

fn check_call(
    ctx: &mut RuleContext,
    enclosing: &TypeDecl,
    method: Option<&MethodDecl>,
    call: &CallSite,
    tree: &crate::syntax::SyntaxTree,
) {
    let Some((name, name_idx, name_span)) = resolve_event_name(call, method, enclosing) else {
        return;
    };

    if name.is_bare_literal {
        ctx.report("USH0043", name_span, &[&name.value]);
    }
    if call.family == Family::Network && name.value.starts_with('_') {
        ctx.report("USH0003", name_span, &[&name.value]);
    }

    let model = ctx.model();
    let query = TargetQuery {
        receiver: call.receiver,
        enclosing,
        method,
        nameof_qualifier: name.nameof_qualifier.as_deref(),
    };
    let semantic = SemanticTargetResolver { model };
    let syntax = SyntaxTargetResolver { tree };
    let Some(target) = semantic
        .resolve(&query)
        .or_else(|| syntax.resolve(&query))
    else {
        // absence of the type is not absence of the method
        return;
    };
    if !is_udon_script(model, target.decl) {
        return;
    }
    let target_name = target.decl.name.clone();

    let candidates = find_candidates(model, target, &name.value);
    if candidates.is_empty() {
        ctx.report("USH0001", name_span, &[&name.value, &target_name]);
        return;
    }
    if !candidates.iter().any(Candidate::is_public) {
        ctx.report("USH0002", name_span, &[&name.value, &target_name]);
    }

    if call.family == Family::Network {
        if call.supports_payload {
            let payload = &call.args[(name_idx + 1).min(call.args.len())..];
            if !payload.is_empty() {
                if !candidates.iter().any(Candidate::is_network_callable) {
                    ctx.report("USH0004", call.span, &[&name.value, &target_name]);
                }
                check_payload_types(ctx, method, enclosing, call, payload, &candidates, &name);
            }
        }
        if sync_mode_of(target.decl) == Some(SyncMode::NoSync) {
            ctx.report("USH0006", call.span, &[&target_name]);
        }
    }
}

/// Locate and resolve the method-name argument. The custom family carries
/// it at position 0 and the network family at position 1; when that slot is
/// not a compile-time string the leading arguments are scanned, which
/// covers receiver-first calling shapes.
fn resolve_event_name(
    call: &CallSite,
    method: Option<&MethodDecl>,
    enclosing: &TypeDecl,
) -> Option<(ResolvedName, usize, Span)> {
    let expected = match call.family {
        Family::Custom => 0,
        Family::Network => 1,
    };
    let try_at = |idx: usize| -> Option<(ResolvedName, usize, Span)> {
        let arg = call.args.get(idx)?;
        resolve_constant_string(&arg.value, method, enclosing)
            .map(|name| (name, idx, arg.value.span()))
    };
    if let Some(found) = try_at(expected) {
        return Some(found);
    }
    (0..call.args.len().min(3))
        .filter(|&idx| idx != expected)
        .find_map(try_at)
}

fn check_payload_types(
    ctx: &mut RuleContext,
    method: Option<&MethodDecl>,
    enclosing: &TypeDecl,
    call: &CallSite,
    payload: &[Arg],
    candidates: &[Candidate],
    name: &ResolvedName,
) {
    let arity_matching: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.param_types().len() == payload.len())
        .collect();

    if arity_matching.is_empty() {
        ctx.report("USH0005", call.span, &["0", &name.value]);
        return;
    }

    let payload_types: Vec<String> = payload
        .iter()
        .map(|arg| infer_expr_type(&arg.value, method, enclosing))
        .collect();

    let fits = |candidate: &Candidate| {
        candidate
            .param_types()
            .iter()
            .zip(&payload_types)
            .all(|(param, arg)| types_compatible(arg, param))
    };
    if arity_matching.iter().any(|c| fits(*c)) {
        return;
    }

    let first = arity_matching[0];
    for (i, (param, arg_ty)) in first.param_types().iter().zip(&payload_types).enumerate() {
        if !types_compatible(arg_ty, param) {
            let index = (i + 1).to_string();
            ctx.report("USH0005", payload[i].value.span(), &[&index, &name.value]);
            return;
        }
    }
}

