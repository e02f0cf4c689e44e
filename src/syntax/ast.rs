//! Syntax tree for the C# subset UdonSharp scripts use
//!
//! The tree is positioned (every node carries a [`Span`]) and tolerant:
//! constructs the parser does not model degrade to [`Expr::Opaque`] /
//! [`Stmt::Opaque`] nodes rather than failing the parse.

use crate::diagnostic::Span;

/// A parsed source file
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    /// Base name of the source file without extension (e.g. "Wrong" for Wrong.cs)
    pub file_stem: String,
    pub usings: Vec<UsingDirective>,
    pub members: Vec<TopLevel>,
    /// Parser notes for logging; never fatal
    pub errors: Vec<String>,
}

impl SyntaxTree {
    /// Depth-first iteration over every type declaration, with a flag for
    /// whether the declaration sits inside a namespace.
    pub fn types(&self) -> Vec<(&TypeDecl, bool)> {
        let mut out = Vec::new();
        fn walk<'a>(members: &'a [TopLevel], in_ns: bool, out: &mut Vec<(&'a TypeDecl, bool)>) {
            for member in members {
                match member {
                    TopLevel::Namespace(ns) => walk(&ns.members, true, out),
                    TopLevel::Type(ty) => {
                        out.push((ty, in_ns));
                        for m in &ty.members {
                            if let Member::Nested(nested) = m {
                                out.push((nested, in_ns));
                            }
                        }
                    }
                }
            }
        }
        walk(&self.members, false, &mut out);
        out
    }
}

#[derive(Debug, Clone)]
pub struct UsingDirective {
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TopLevel {
    Namespace(NamespaceDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone)]
pub struct NamespaceDecl {
    pub name: String,
    pub members: Vec<TopLevel>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
}

/// One attribute use, e.g. `[UdonSynced(UdonSyncMode.Linear)]`
#[derive(Debug, Clone)]
pub struct AttributeUse {
    /// Dotted name as written, without the `Attribute` suffix stripping
    pub name: String,
    pub args: Vec<AttributeArg>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AttributeArg {
    /// Named argument (`Mode = ...`) when present
    pub name: Option<String>,
    pub value: Expr,
}

/// Modifier keywords on declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Override,
    Virtual,
    Abstract,
    Sealed,
    Partial,
    Readonly,
    Const,
    New,
    Ref,
    Out,
    In,
    Params,
    Async,
    Extern,
    Unsafe,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    /// Span of just the identifier, for diagnostics
    pub name_span: Span,
    pub span: Span,
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub type_params: Vec<String>,
    pub base_list: Vec<TypeRef>,
    pub members: Vec<Member>,
}

impl TypeDecl {
    pub fn has_modifier(&self, m: Modifier) -> bool {
        self.modifiers.contains(&m)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(field) => Some(field),
            _ => None,
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Property(prop) => Some(prop),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDecl),
    Property(PropertyDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Nested(TypeDecl),
    /// Indexers, operators, events and anything else the rules do not inspect
    Opaque(Span),
}

/// One field declaration; several declarators may share a type
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub ty: TypeRef,
    pub declarators: Vec<FieldDeclarator>,
    pub span: Span,
}

impl FieldDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(&Modifier::Static)
    }

    pub fn is_const(&self) -> bool {
        self.modifiers.contains(&Modifier::Const)
    }
}

#[derive(Debug, Clone)]
pub struct FieldDeclarator {
    pub name: String,
    pub name_span: Span,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub ty: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    /// Accessor bodies, for statement-level rules
    pub accessor_bodies: Vec<Block>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub return_ty: TypeRef,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub body: Option<Block>,
}

impl MethodDecl {
    pub fn is_public(&self) -> bool {
        self.modifiers.contains(&Modifier::Public)
    }

    pub fn is_override(&self) -> bool {
        self.modifiers.contains(&Modifier::Override)
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(&Modifier::Static)
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.modifiers.contains(&Modifier::Partial)
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorDecl {
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub name: String,
    pub span: Span,
    pub params: Vec<Param>,
    pub body: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub attributes: Vec<AttributeUse>,
    pub modifiers: Vec<Modifier>,
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

/// A type reference as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Full source text, normalised to single spaces (e.g. "Dictionary<string, int>[]")
    pub text: String,
    /// Rightmost simple name without generic args or array suffixes
    pub name: String,
    /// Dotted qualifier before the simple name, empty when unqualified
    pub qualifier: String,
    /// Generic arguments, outermost level only
    pub args: Vec<TypeRef>,
    /// Array ranks, outermost first; each entry is the dimension count
    pub array_ranks: Vec<u32>,
    /// `?` suffix on the element type
    pub nullable: bool,
    pub span: Span,
}

impl TypeRef {
    pub fn simple(name: &str, span: Span) -> Self {
        Self {
            text: name.to_string(),
            name: name.to_string(),
            qualifier: String::new(),
            args: Vec::new(),
            array_ranks: Vec::new(),
            nullable: false,
            span,
        }
    }

    pub fn is_array(&self) -> bool {
        !self.array_ranks.is_empty()
    }

    pub fn is_multi_dimensional(&self) -> bool {
        self.array_ranks.iter().any(|&rank| rank > 1)
    }

    /// Dotted qualified name without generic args or array suffixes
    pub fn qualified_name(&self) -> String {
        if self.qualifier.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.qualifier, self.name)
        }
    }

    /// The element type with one level of array suffix removed
    pub fn element_type(&self) -> TypeRef {
        let mut element = self.clone();
        if !element.array_ranks.is_empty() {
            element.array_ranks.remove(0);
            if let Some(idx) = element.text.rfind('[') {
                element.text.truncate(idx);
            }
        }
        element
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum GotoKind {
    Label(String),
    Case,
    Default,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    LocalVar {
        /// `None` for `var`
        ty: Option<TypeRef>,
        is_const: bool,
        declarators: Vec<FieldDeclarator>,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Foreach {
        ty: Option<TypeRef>,
        var: String,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        scrutinee: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Try {
        block: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        /// Span of the `try` keyword
        keyword_span: Span,
        span: Span,
    },
    Throw {
        value: Option<Expr>,
        span: Span,
    },
    Goto {
        kind: GotoKind,
        span: Span,
    },
    Labeled {
        label: String,
        stmt: Box<Stmt>,
        span: Span,
    },
    LocalFunction(Box<MethodDecl>),
    Block(Block),
    Empty(Span),
    Opaque(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::LocalVar { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Foreach { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Goto { span, .. }
            | Stmt::Labeled { span, .. } => *span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Empty(span) | Stmt::Opaque(span) => {
                *span
            }
            Stmt::Expr(expr) => expr.span(),
            Stmt::LocalFunction(decl) => decl.span,
            Stmt::Block(block) => block.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub ty: Option<TypeRef>,
    pub var: Option<String>,
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Lit {
    Str(String),
    Char(char),
    Int(String),
    Float(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub modifier: Option<Modifier>,
    pub name: Option<String>,
    pub value: Expr,
}

/// Object/collection initializer attached to a `new` expression
#[derive(Debug, Clone)]
pub struct Initializer {
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: Lit,
        span: Span,
    },
    /// Interpolated string; embedded expressions are not modelled
    Interpolated(Span),
    Ident {
        name: String,
        span: Span,
    },
    This(Span),
    Base(Span),
    Member {
        target: Box<Expr>,
        name: String,
        name_span: Span,
        null_conditional: bool,
        span: Span,
    },
    Invocation {
        target: Box<Expr>,
        /// Explicit generic arguments on the invoked name, if any
        type_args: Vec<TypeRef>,
        args: Vec<Arg>,
        span: Span,
    },
    ElementAccess {
        target: Box<Expr>,
        indices: Vec<Expr>,
        null_conditional: bool,
        span: Span,
    },
    New {
        /// `None` for implicit (`new[]` / target-typed `new(...)`) forms
        ty: Option<TypeRef>,
        args: Vec<Arg>,
        /// Object or collection initializer block
        initializer: Option<Initializer>,
        is_array: bool,
        /// Dimension count for array creations (commas + 1)
        array_rank: u32,
        span: Span,
    },
    Is {
        value: Box<Expr>,
        ty: Option<TypeRef>,
        span: Span,
    },
    As {
        value: Box<Expr>,
        ty: TypeRef,
        span: Span,
    },
    Cast {
        ty: TypeRef,
        value: Box<Expr>,
        span: Span,
    },
    Typeof {
        ty: TypeRef,
        span: Span,
    },
    Nameof {
        /// Dotted path segments, e.g. ["X", "Y"] for nameof(X.Y)
        path: Vec<String>,
        span: Span,
    },
    Unary {
        op: String,
        value: Box<Expr>,
        span: Span,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        op: String,
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Conditional {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
        span: Span,
    },
    Paren {
        value: Box<Expr>,
        span: Span,
    },
    /// Anything the parser does not model (lambdas, queries, patterns)
    Opaque(Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Interpolated(span)
            | Expr::Ident { span, .. }
            | Expr::This(span)
            | Expr::Base(span)
            | Expr::Member { span, .. }
            | Expr::Invocation { span, .. }
            | Expr::ElementAccess { span, .. }
            | Expr::New { span, .. }
            | Expr::Is { span, .. }
            | Expr::As { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Typeof { span, .. }
            | Expr::Nameof { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Paren { span, .. }
            | Expr::Opaque(span) => *span,
        }
    }

    /// String literal value, when this expression is one
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal {
                value: Lit::Str(s), ..
            } => Some(s),
            _ => None,
        }
    }
}
