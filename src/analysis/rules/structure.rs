//! Structural rules (USH0044-USH0045)
//!
//! These fire once per UdonSharp script declaration: scripts belong in a
//! namespace, and a concrete script class must be named after its file.

use crate::analysis::engine::RuleContext;
use crate::analysis::utils::is_udon_script;
use crate::syntax::{Modifier, TypeKind};

pub const IDS: &[&str] = &["USH0044", "USH0045"];

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    let file_stem = ctx.doc.tree.file_stem.clone();
    for (decl, in_namespace) in ctx.types() {
        if decl.kind != TypeKind::Class || !is_udon_script(model, decl) {
            continue;
        }

        if !in_namespace {
            ctx.report("USH0044", decl.name_span, &[&decl.name]);
        }

        if !decl.has_modifier(Modifier::Abstract) && decl.name != file_stem {
            ctx.report("USH0045", decl.name_span, &[&decl.name, &file_stem]);
        }
    }
}
