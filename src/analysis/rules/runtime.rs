//! Runtime restriction rules (USH0016-USH0021)

use crate::analysis::engine::RuleContext;
use crate::analysis::utils::{
    bodies_of, infer_expr_type, is_udon_script, normalize_type_name, walk_exprs, walk_stmts,
};
use crate::syntax::{Expr, Modifier, Stmt};

pub const IDS: &[&str] = &[
    "USH0016", "USH0017", "USH0018", "USH0019", "USH0020", "USH0021",
];

/// Runtime events with a mandated `public override (VRCPlayerApi)` shape
const PLAYER_EVENTS: &[&str] = &[
    "OnStationEntered",
    "OnStationExited",
    "OnOwnershipTransferred",
    "OnPlayerJoined",
    "OnPlayerLeft",
];

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    let allow_ref_out = ctx.settings.allow_ref_out;
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }

        for method in decl.methods() {
            if !PLAYER_EVENTS.contains(&method.name.as_str()) {
                continue;
            }
            let signature_ok = method.is_public()
                && method.is_override()
                && method.params.len() == 1
                && method.params[0].ty.name == "VRCPlayerApi"
                && !method.params[0].ty.is_array()
                && (allow_ref_out
                    || !method.params[0]
                        .modifiers
                        .iter()
                        .any(|m| matches!(m, Modifier::Ref | Modifier::Out)));
            if !signature_ok {
                ctx.report("USH0016", method.name_span, &[&method.name]);
            }
        }

        for (method, body) in bodies_of(decl) {
            walk_stmts(body, &mut |stmt| match stmt {
                Stmt::Try { keyword_span, .. } => {
                    ctx.report("USH0020", *keyword_span, &[]);
                }
                Stmt::Throw { span, .. } => {
                    ctx.report("USH0021", *span, &[]);
                }
                _ => {}
            });

            walk_exprs(body, &mut |expr| match expr {
                Expr::Is { span, .. } => ctx.report("USH0018", *span, &[]),
                Expr::As { span, .. } => ctx.report("USH0019", *span, &[]),
                Expr::Invocation {
                    target,
                    type_args,
                    args,
                    span,
                } => {
                    let path = match &**target {
                        Expr::Ident { name, .. } => name.clone(),
                        // Object.Instantiate / UnityEngine.Object.Instantiate
                        Expr::Member { name, target, .. } => {
                            let on_object = match &**target {
                                Expr::Ident { name: recv, .. } => recv == "Object",
                                Expr::Member { name: recv, .. } => recv == "Object",
                                _ => false,
                            };
                            if !on_object {
                                return;
                            }
                            name.clone()
                        }
                        _ => return,
                    };
                    if path != "Instantiate" {
                        return;
                    }
                    // sole generic argument decides when present
                    if let Some(generic) = type_args.first() {
                        if generic.name != "GameObject" {
                            ctx.report("USH0017", *span, &[]);
                        }
                        return;
                    }
                    // fires unless the argument is provably a GameObject
                    let Some(first) = args.first() else { return };
                    let arg_ty = infer_expr_type(&first.value, method, decl);
                    let base = normalize_type_name(arg_ty.trim_end_matches("[]"));
                    if base != "GameObject" {
                        ctx.report("USH0017", *span, &[]);
                    }
                }
                _ => {}
            });
        }
    }
}
