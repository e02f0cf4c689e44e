//! Attribute cross-referencing rules (USH0040-USH0042)
//!
//! `FieldChangeCallback` names a property that receives change
//! notifications for a field; the property must exist, be unique per
//! target, and match the field's type.

use crate::analysis::engine::RuleContext;
use crate::analysis::utils::{
    find_attribute, is_udon_script, normalize_type_name, resolve_constant_string,
};
use crate::syntax::Expr;

pub const IDS: &[&str] = &["USH0040", "USH0041", "USH0042"];

pub fn run(ctx: &mut RuleContext) {
    let model = ctx.model();
    for (decl, _) in ctx.types() {
        if !is_udon_script(model, decl) {
            continue;
        }

        // (property name, field name) already seen on this type
        let mut seen: Vec<(String, String)> = Vec::new();

        for field in decl.fields() {
            let Some(attr) = find_attribute(&field.attributes, "FieldChangeCallback") else {
                continue;
            };
            let Some(declarator) = field.declarators.first() else {
                continue;
            };
            let target = attr.args.first().and_then(|arg| match &arg.value {
                Expr::Literal { .. } | Expr::Nameof { .. } | Expr::Ident { .. } => {
                    resolve_constant_string(&arg.value, None, decl)
                }
                _ => None,
            });
            let Some(target) = target else { continue };
            let property_name = target.value;
            let span = declarator.name_span;

            if let Some((first_field, _)) = seen
                .iter()
                .find(|(prop, _)| *prop == property_name)
                .map(|(p, f)| (f.clone(), p.clone()))
            {
                ctx.report(
                    "USH0040",
                    span,
                    &[&first_field, &declarator.name, &property_name],
                );
            }
            seen.push((property_name.clone(), declarator.name.clone()));

            match model.find_property(decl, &property_name) {
                None => {
                    ctx.report("USH0041", span, &[&property_name, &decl.name]);
                }
                Some(prop) => {
                    let prop_ty = normalize_type_name(&prop.ty.text);
                    let field_ty = normalize_type_name(&field.ty.text);
                    if prop_ty != field_ty {
                        ctx.report(
                            "USH0042",
                            span,
                            &[&property_name, &prop.ty.text, &declarator.name, &field.ty.text],
                        );
                    }
                }
            }
        }
    }
}
