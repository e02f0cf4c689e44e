//! Event-target resolution for the network-event rules
//!
//! Two implementations of one capability: the semantic resolver consults
//! the compilation's symbol index (any open document, plus the stub-backed
//! surface), the syntax resolver degrades to the current file only, using
//! `nameof` references and invocation ownership. The rule code never
//! branches on which path produced the symbol.

use crate::semantic::{SemanticModel, UDON_SHARP_BEHAVIOUR, UDON_SHARP_BEHAVIOUR_METHODS};
use crate::syntax::{Expr, MethodDecl, Stmt, SyntaxTree, TypeDecl};
use crate::analysis::utils::{has_attribute, walk_stmts};

/// A call site being resolved
pub struct TargetQuery<'q> {
    /// Receiver expression of the `Send*` call; `None` for bare invocations
    pub receiver: Option<&'q Expr>,
    pub enclosing: &'q TypeDecl,
    pub method: Option<&'q MethodDecl>,
    /// Type qualifier from a `nameof(Type.Member)` method-name argument
    pub nameof_qualifier: Option<&'q str>,
}

/// The resolved event-target type
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTarget<'a> {
    pub decl: &'a TypeDecl,
    /// Whether the symbol came from the semantic path
    pub semantic: bool,
}

/// Common capability both resolvers implement
pub trait ResolveTarget<'a> {
    fn resolve(&self, query: &TargetQuery<'_>) -> Option<ResolvedTarget<'a>>;
}

/// Symbol-index-backed resolution across the whole compilation
pub struct SemanticTargetResolver<'a> {
    pub model: &'a SemanticModel,
}

impl<'a> ResolveTarget<'a> for SemanticTargetResolver<'a> {
    fn resolve(&self, query: &TargetQuery<'_>) -> Option<ResolvedTarget<'a>> {
        let type_name = match query.receiver {
            None => Some(query.enclosing.name.clone()),
            Some(receiver) => infer_receiver_type_name(receiver, query.method, query.enclosing),
        }?;
        let handle = self.model.resolve_type(&type_name)?;
        Some(ResolvedTarget {
            decl: handle.decl,
            semantic: true,
        })
    }
}

/// Degraded resolution over the current file's declarations only
pub struct SyntaxTargetResolver<'a> {
    pub tree: &'a SyntaxTree,
}

impl<'a> ResolveTarget<'a> for SyntaxTargetResolver<'a> {
    fn resolve(&self, query: &TargetQuery<'_>) -> Option<ResolvedTarget<'a>> {
        // a nameof(Type.Member) argument names the target type directly
        if let Some(qualifier) = query.nameof_qualifier {
            if let Some(decl) = self.find_in_file(qualifier) {
                return Some(ResolvedTarget {
                    decl,
                    semantic: false,
                });
            }
        }
        let type_name = match query.receiver {
            None => Some(query.enclosing.name.clone()),
            Some(receiver) => infer_receiver_type_name(receiver, query.method, query.enclosing),
        }?;
        let decl = self.find_in_file(&type_name)?;
        Some(ResolvedTarget {
            decl,
            semantic: false,
        })
    }
}

impl<'a> SyntaxTargetResolver<'a> {
    fn find_in_file(&self, name: &str) -> Option<&'a TypeDecl> {
        self.tree
            .types()
            .into_iter()
            .map(|(decl, _)| decl)
            .find(|decl| decl.name == name)
    }
}

/// Static type name of a receiver expression, from purely local evidence:
/// locals and parameters of the enclosing method, fields of the enclosing
/// type, casts, and `GetComponent<T>()`-style generic invocations.
pub fn infer_receiver_type_name(
    receiver: &Expr,
    method: Option<&MethodDecl>,
    enclosing: &TypeDecl,
) -> Option<String> {
    match receiver {
        Expr::This(_) | Expr::Base(_) => Some(enclosing.name.clone()),
        Expr::Paren { value, .. } => infer_receiver_type_name(value, method, enclosing),
        Expr::Cast { ty, .. } | Expr::As { ty, .. } => Some(ty.name.clone()),
        Expr::New { ty, .. } => ty.as_ref().map(|t| t.name.clone()),
        Expr::Invocation {
            target, type_args, ..
        } => {
            // GetComponent<T>() and friends surface the generic argument
            let invoked = match &**target {
                Expr::Ident { name, .. } => Some(name.as_str()),
                Expr::Member { name, .. } => Some(name.as_str()),
                _ => None,
            };
            if invoked.is_some_and(|n| n.starts_with("GetComponent")) {
                return type_args.first().map(|t| t.name.clone());
            }
            None
        }
        Expr::Ident { name, .. } => {
            if let Some(method) = method {
                for param in &method.params {
                    if param.name == *name {
                        return Some(param.ty.name.clone());
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
                                found = Some(ty.name.clone());
                            }
                        }
                    });
                    if found.is_some() {
                        return found;
                    }
                }
            }
            enclosing
                .fields()
                .find(|f| f.declarators.iter().any(|d| d.name == *name))
                .map(|f| f.ty.name.clone())
        }
        Expr::Member { target, name, .. } => {
            // field access through `this`
            if matches!(**target, Expr::This(_)) {
                return enclosing
                    .fields()
                    .find(|f| f.declarators.iter().any(|d| d.name == *name))
                    .map(|f| f.ty.name.clone());
            }
            None
        }
        _ => None,
    }
}

/// A callable event target on the resolved type: a user-written method or
/// one of the `UdonSharpBehaviour` built-ins.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    User(&'a MethodDecl),
    Builtin {
        name: &'static str,
        params: &'static [&'static str],
    },
}

impl Candidate<'_> {
    pub fn is_public(&self) -> bool {
        match self {
            Candidate::User(m) => m.is_public(),
            Candidate::Builtin { .. } => true,
        }
    }

    pub fn param_types(&self) -> Vec<String> {
        match self {
            Candidate::User(m) => m.params.iter().map(|p| p.ty.text.clone()).collect(),
            Candidate::Builtin { params, .. } => params.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn is_network_callable(&self) -> bool {
        match self {
            Candidate::User(m) => has_attribute(&m.attributes, "NetworkCallable"),
            Candidate::Builtin { .. } => false,
        }
    }
}

/// All candidates with a given name on a target type. The semantic path
/// walks resolvable base classes; both paths surface the marker base's
/// built-ins when the type inherits it (syntactically or semantically).
pub fn find_candidates<'a>(
    model: &'a SemanticModel,
    target: ResolvedTarget<'a>,
    name: &str,
) -> Vec<Candidate<'a>> {
    let mut candidates: Vec<Candidate<'a>> = if target.semantic {
        model
            .find_methods(target.decl, name)
            .into_iter()
            .map(Candidate::User)
            .collect()
    } else {
        target
            .decl
            .methods()
            .filter(|m| m.name == name)
            .map(Candidate::User)
            .collect()
    };

    let inherits_marker = model.inherits_behaviour(target.decl)
        || target
            .decl
            .base_list
            .iter()
            .any(|b| b.name == UDON_SHARP_BEHAVIOUR);
    if candidates.is_empty() && inherits_marker {
        candidates.extend(
            UDON_SHARP_BEHAVIOUR_METHODS
                .iter()
                .filter(|(n, _)| *n == name)
                .map(|(n, params)| Candidate::Builtin { name: n, params }),
        );
    }
    candidates
}
