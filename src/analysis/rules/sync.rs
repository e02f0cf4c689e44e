//! Synchronization rules (USH0007-USH0012)
//!
//! Fire on fields carrying `UdonSynced` inside UdonSharp scripts. Nullable
//! wrappers are unwrapped once before the type checks.

use crate::analysis::engine::RuleContext;
use crate::analysis::utils::{
    find_attribute, is_udon_script, normalize_type_name, sync_mode_of, tween_mode_of,
    unwrap_nullable,
};
use crate::semantic::SyncMode;
use crate::syntax::TypeRef;

pub const IDS: &[&str] = &[
    "USH0007", "USH0008", "USH0009", "USH0010", "USH0011", "USH0012",
];

/// Types the runtime can replicate
const SYNCABLE: &[&str] = &[
    "bool",
    "char",
    "byte",
    "sbyte",
    "short",
    "ushort",
    "int",
    "uint",
    "long",
    "ulong",
    "float",
    "double",
    "string",
    "Vector2",
    "Vector3",
    "Vector4",
    "Quaternion",
    "Color",
    "Color32",
    "GameObject",
    "Transform",
    "VRCUrl",
    "VRCPlayerApi",
];

const LINEAR_TWEENABLE: &[&str] = &["float", "Vector2", "Vector3", "Vector4", "Quaternion"];

const SMOOTH_TWEENABLE: &[&str] = &["float", "int", "Vector2", "Vector3", "Quaternion"];

fn is_syncable(ty: &TypeRef) -> bool {
    if ty.array_ranks.len() > 1 || ty.is_multi_dimensional() {
        return false;
    }
    let element = if ty.is_array() {
        ty.element_type()
    } else {
        ty.clone()
    };
    if element.is_array() || !element.args.is_empty() {
        return false;
    }
    SYNCABLE.contains(&normalize_type_name(&element.name).as_str())
}

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }
        let mode = sync_mode_of(decl);

        for field in decl.fields() {
            if find_attribute(&field.attributes, "UdonSynced").is_none() {
                continue;
            }
            let Some(declarator) = field.declarators.first() else {
                continue;
            };
            let field_name = &declarator.name;
            let span = declarator.name_span;
            let ty = unwrap_nullable(&field.ty);

            if mode == Some(SyncMode::NoVariableSync) {
                ctx.report("USH0007", span, &[field_name, &decl.name]);
            }
            if !is_syncable(&ty) {
                ctx.report("USH0008", span, &[&ty.text, field_name]);
            }
            if ty.is_array() && mode != Some(SyncMode::Manual) {
                ctx.report("USH0009", span, &[field_name]);
            }

            let tween = tween_mode_of(field).filter(|t| t != "None");
            if let Some(tween) = tween {
                if mode == Some(SyncMode::Manual) {
                    ctx.report("USH0010", span, &[field_name]);
                }
                let element = normalize_type_name(&ty.name);
                if tween == "Linear" && !LINEAR_TWEENABLE.contains(&element.as_str()) {
                    ctx.report("USH0011", span, &[&ty.text]);
                }
                if tween == "Smooth" && !SMOOTH_TWEENABLE.contains(&element.as_str()) {
                    ctx.report("USH0012", span, &[&ty.text]);
                }
            }
        }
    }
}
