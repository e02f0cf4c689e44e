//! Tolerant recursive-descent parser
//!
//! Parses the C# subset UdonSharp scripts use into [`SyntaxTree`]. The
//! parser never fails: constructs it does not model become opaque nodes,
//! and malformed input skips forward to the next statement or member
//! boundary. Every node carries a span for diagnostics.

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::diagnostic::{Pos, Span};

/// Parse one source file. `file_stem` is the file's base name without
/// extension, used by structural rules.
pub fn parse(source: &str, file_stem: &str) -> SyntaxTree {
    let tokens = tokenize(source);
    let mut parser = Parser {
        tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let (usings, members) = parser.parse_compilation_unit();
    SyntaxTree {
        file_stem: file_stem.to_string(),
        usings,
        members,
        errors: parser.errors,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<String>,
}

impl Parser {
    // ---- token plumbing -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn at(&self, text: &str) -> bool {
        self.peek().is(text)
    }

    fn at_ident(&self, text: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Ident && t.text == text
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) {
        if !self.eat(text) {
            let found = self.peek().clone();
            self.errors.push(format!(
                "expected '{}' at {}:{}, found '{}'",
                text,
                found.span.start.line + 1,
                found.span.start.col + 1,
                found.text
            ));
        }
    }

    fn here(&self) -> Pos {
        self.peek().span.start
    }

    fn prev_end(&self) -> Pos {
        if self.pos == 0 {
            self.peek().span.start
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: Pos) -> Span {
        Span::new(start, self.prev_end())
    }

    fn checkpoint(&self) -> usize {
        self.pos
    }

    fn rollback(&mut self, checkpoint: usize) {
        self.pos = checkpoint;
    }

    /// Consume a balanced bracket pair starting at the current `open` token
    fn skip_balanced(&mut self, open: &str, close: &str) {
        if !self.eat(open) {
            return;
        }
        let mut depth = 1usize;
        while !self.at_eof() && depth > 0 {
            if self.at(open) {
                depth += 1;
            } else if self.at(close) {
                depth -= 1;
            }
            self.bump();
        }
    }

    fn skip_to_any(&mut self, stops: &[&str]) {
        let mut paren = 0isize;
        let mut brace = 0isize;
        while !self.at_eof() {
            let t = self.peek();
            if paren <= 0 && brace <= 0 && stops.iter().any(|s| t.is(s)) {
                return;
            }
            match t.text.as_str() {
                "(" | "[" => paren += 1,
                ")" | "]" => paren -= 1,
                "{" => brace += 1,
                "}" => {
                    if brace == 0 {
                        return;
                    }
                    brace -= 1;
                }
                _ => {}
            }
            self.bump();
        }
    }

    // ---- compilation unit ----------------------------------------------

    fn parse_compilation_unit(&mut self) -> (Vec<UsingDirective>, Vec<TopLevel>) {
        let mut usings = Vec::new();
        let mut members = Vec::new();
        while !self.at_eof() {
            if self.at("using") && !self.peek_at(1).is("(") {
                if let Some(using) = self.parse_using() {
                    usings.push(using);
                }
            } else if let Some(member) = self.parse_top_level() {
                members.push(member);
            }
        }
        (usings, members)
    }

    fn parse_using(&mut self) -> Option<UsingDirective> {
        let start = self.here();
        self.expect("using");
        let mut path = String::new();
        while !self.at_eof() && !self.at(";") {
            let token = self.bump();
            path.push_str(&token.text);
        }
        self.eat(";");
        Some(UsingDirective {
            path,
            span: self.span_from(start),
        })
    }

    fn parse_top_level(&mut self) -> Option<TopLevel> {
        let attributes = self.parse_attribute_lists();
        let modifiers = self.parse_modifiers();

        if self.at("namespace") {
            return Some(TopLevel::Namespace(self.parse_namespace()));
        }
        if let Some(kind) = self.peek_type_kind() {
            return Some(TopLevel::Type(self.parse_type_decl(kind, attributes, modifiers)));
        }

        // not something we model at the top level; skip one token to make progress
        if !self.at_eof() {
            self.bump();
        }
        None
    }

    fn parse_namespace(&mut self) -> NamespaceDecl {
        let start = self.here();
        self.expect("namespace");
        let mut name = String::new();
        while self.peek().is_ident() || self.at(".") {
            name.push_str(&self.bump().text);
        }

        let mut members = Vec::new();
        if self.eat(";") {
            // file-scoped namespace: the rest of the file belongs to it
            while !self.at_eof() {
                if let Some(member) = self.parse_top_level() {
                    members.push(member);
                }
            }
        } else {
            self.expect("{");
            while !self.at_eof() && !self.at("}") {
                if self.at("using") {
                    self.parse_using();
                } else if let Some(member) = self.parse_top_level() {
                    members.push(member);
                }
            }
            self.eat("}");
        }

        NamespaceDecl {
            name,
            members,
            span: self.span_from(start),
        }
    }

    fn peek_type_kind(&self) -> Option<TypeKind> {
        if self.at("class") {
            Some(TypeKind::Class)
        } else if self.at("struct") {
            Some(TypeKind::Struct)
        } else if self.at("interface") {
            Some(TypeKind::Interface)
        } else if self.at("enum") {
            Some(TypeKind::Enum)
        } else {
            None
        }
    }

    // ---- attributes and modifiers --------------------------------------

    fn parse_attribute_lists(&mut self) -> Vec<AttributeUse> {
        let mut attrs = Vec::new();
        while self.at("[") {
            let checkpoint = self.checkpoint();
            self.bump();
            // attribute target specifier, e.g. `[field: ...]`
            if self.peek().is_ident() && self.peek_at(1).is(":") {
                self.bump();
                self.bump();
            }
            if !self.peek().is_ident() {
                // not an attribute list after all
                self.rollback(checkpoint);
                return attrs;
            }
            loop {
                if let Some(attr) = self.parse_attribute() {
                    attrs.push(attr);
                }
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("]");
        }
        attrs
    }

    fn parse_attribute(&mut self) -> Option<AttributeUse> {
        let start = self.here();
        if !self.peek().is_ident() {
            return None;
        }
        let mut name = self.bump().text;
        while self.at(".") {
            self.bump();
            name.push('.');
            if self.peek().is_ident() {
                name.push_str(&self.bump().text);
            }
        }

        let mut args = Vec::new();
        if self.eat("(") {
            while !self.at_eof() && !self.at(")") {
                let arg_name = if self.peek().is_ident()
                    && self.peek_at(1).is("=")
                    && !self.peek_at(1).is("==")
                {
                    let named = self.bump().text;
                    self.bump();
                    Some(named)
                } else {
                    None
                };
                let value = self.parse_expr();
                args.push(AttributeArg {
                    name: arg_name,
                    value,
                });
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(")");
        }

        Some(AttributeUse {
            name,
            args,
            span: self.span_from(start),
        })
    }

    fn parse_modifiers(&mut self) -> Vec<Modifier> {
        let mut modifiers = Vec::new();
        loop {
            let m = match self.peek().text.as_str() {
                "public" => Modifier::Public,
                "private" => Modifier::Private,
                "protected" => Modifier::Protected,
                "internal" => Modifier::Internal,
                "static" => Modifier::Static,
                "override" => Modifier::Override,
                "virtual" => Modifier::Virtual,
                "abstract" => Modifier::Abstract,
                "sealed" => Modifier::Sealed,
                "partial" => Modifier::Partial,
                "readonly" => Modifier::Readonly,
                "const" => Modifier::Const,
                "extern" => Modifier::Extern,
                "unsafe" => Modifier::Unsafe,
                "async" if self.peek_at(1).is_ident() => Modifier::Async,
                "new" if self.peek_at(1).is_ident() || self.is_modifier_at(1) => Modifier::New,
                _ => break,
            };
            // `new` as a modifier only when followed by more declaration syntax
            self.bump();
            modifiers.push(m);
        }
        modifiers
    }

    fn is_modifier_at(&self, offset: usize) -> bool {
        matches!(
            self.peek_at(offset).text.as_str(),
            "public"
                | "private"
                | "protected"
                | "internal"
                | "static"
                | "override"
                | "virtual"
                | "abstract"
                | "sealed"
                | "partial"
                | "readonly"
                | "const"
        )
    }

    // ---- type declarations ---------------------------------------------

    fn parse_type_decl(
        &mut self,
        kind: TypeKind,
        attributes: Vec<AttributeUse>,
        modifiers: Vec<Modifier>,
    ) -> TypeDecl {
        let start = self.here();
        self.bump(); // class / struct / interface / enum

        let name_token = if self.peek().is_ident() {
            self.bump()
        } else {
            self.peek().clone()
        };
        let name = name_token.text.clone();
        let name_span = name_token.span;

        let mut type_params = Vec::new();
        if self.at("<") {
            self.bump();
            while !self.at_eof() && !self.at(">") {
                let t = self.bump();
                if t.is_ident() {
                    type_params.push(t.text);
                }
            }
            self.eat(">");
        }

        let mut base_list = Vec::new();
        if self.eat(":") {
            loop {
                if let Some(ty) = self.parse_type_ref_opt() {
                    base_list.push(ty);
                } else {
                    break;
                }
                if !self.eat(",") {
                    break;
                }
            }
        }

        // generic constraints
        while self.at_ident("where") {
            self.skip_to_any(&["{", "where"]);
            if self.at_ident("where") {
                continue;
            }
            break;
        }

        let mut members = Vec::new();
        if kind == TypeKind::Enum {
            self.skip_balanced("{", "}");
        } else {
            self.expect("{");
            while !self.at_eof() && !self.at("}") {
                members.push(self.parse_member(&name));
            }
            self.eat("}");
        }
        self.eat(";");

        TypeDecl {
            kind,
            name,
            name_span,
            span: self.span_from(start),
            attributes,
            modifiers,
            type_params,
            base_list,
            members,
        }
    }

    fn parse_member(&mut self, enclosing_name: &str) -> Member {
        let start = self.here();
        let attributes = self.parse_attribute_lists();
        let modifiers = self.parse_modifiers();

        if let Some(kind) = self.peek_type_kind() {
            return Member::Nested(self.parse_type_decl(kind, attributes, modifiers));
        }

        // events, operators, destructors, indexers: opaque
        if self.at("event") || self.at("operator") || self.at("~") || self.at("implicit") || self.at("explicit") {
            self.skip_member_tail();
            return Member::Opaque(self.span_from(start));
        }

        // constructor: Name(
        if self.peek().is_ident()
            && self.peek().text == enclosing_name
            && self.peek_at(1).is("(")
        {
            let name = self.bump().text;
            let params = self.parse_params();
            // `: this(...)` / `: base(...)` initializer
            if self.eat(":") {
                if self.at("this") || self.at("base") {
                    self.bump();
                    self.skip_balanced("(", ")");
                }
            }
            let body = self.parse_body_or_semicolon();
            return Member::Constructor(ConstructorDecl {
                attributes,
                modifiers,
                name,
                span: self.span_from(start),
                params,
                body,
            });
        }

        let Some(return_ty) = self.parse_type_ref_opt() else {
            // cannot make sense of this member; resynchronise
            self.skip_member_tail();
            return Member::Opaque(self.span_from(start));
        };

        if self.at("this") {
            // indexer
            self.skip_member_tail();
            return Member::Opaque(self.span_from(start));
        }

        let Some(name_token) = self.eat_ident() else {
            self.skip_member_tail();
            return Member::Opaque(self.span_from(start));
        };
        let name = name_token.text.clone();
        let name_span = name_token.span;

        // generic method type parameters
        let mut type_params = Vec::new();
        if self.at("<") && self.generic_params_ahead() {
            self.bump();
            while !self.at_eof() && !self.at(">") {
                let t = self.bump();
                if t.is_ident() {
                    type_params.push(t.text);
                }
            }
            self.eat(">");
        }

        if self.at("(") {
            let params = self.parse_params();
            while self.at_ident("where") {
                self.skip_to_any(&["{", ";", "=>"]);
                break;
            }
            let body = self.parse_body_or_semicolon();
            return Member::Method(MethodDecl {
                attributes,
                modifiers,
                return_ty,
                name,
                name_span,
                span: self.span_from(start),
                type_params,
                params,
                body,
            });
        }

        if self.at("{") || self.at("=>") {
            let accessor_bodies = self.parse_property_body();
            // property initializer: `= expr;`
            if self.eat("=") {
                self.parse_expr();
                self.eat(";");
            }
            return Member::Property(PropertyDecl {
                attributes,
                modifiers,
                ty: return_ty,
                name,
                name_span,
                span: self.span_from(start),
                accessor_bodies,
            });
        }

        // field declarators
        let mut declarators = vec![self.parse_declarator(name, name_span)];
        while self.eat(",") {
            if let Some(next) = self.eat_ident() {
                let text = next.text.clone();
                let span = next.span;
                declarators.push(self.parse_declarator(text, span));
            } else {
                break;
            }
        }
        self.eat(";");
        Member::Field(FieldDecl {
            attributes,
            modifiers,
            ty: return_ty,
            declarators,
            span: self.span_from(start),
        })
    }

    fn parse_declarator(&mut self, name: String, name_span: Span) -> FieldDeclarator {
        let init = if self.eat("=") {
            Some(self.parse_initializer_value())
        } else {
            None
        };
        FieldDeclarator {
            name,
            name_span,
            init,
        }
    }

    /// A declarator initializer: either an expression or an array
    /// initializer block `{ 1, 2 }`.
    fn parse_initializer_value(&mut self) -> Expr {
        if self.at("{") {
            let start = self.here();
            self.skip_balanced("{", "}");
            return Expr::Opaque(self.span_from(start));
        }
        self.parse_expr()
    }

    fn eat_ident(&mut self) -> Option<Token> {
        if self.peek().is_ident() {
            Some(self.bump())
        } else {
            None
        }
    }

    fn skip_member_tail(&mut self) {
        self.skip_to_any(&[";", "{"]);
        if self.at("{") {
            self.skip_balanced("{", "}");
        } else {
            self.eat(";");
        }
    }

    fn parse_body_or_semicolon(&mut self) -> Option<Block> {
        if self.at("{") {
            return Some(self.parse_block());
        }
        if self.eat("=>") {
            let start = self.here();
            let expr = self.parse_expr();
            self.eat(";");
            return Some(Block {
                span: self.span_from(start),
                statements: vec![Stmt::Expr(expr)],
            });
        }
        self.eat(";");
        None
    }

    fn parse_property_body(&mut self) -> Vec<Block> {
        let mut bodies = Vec::new();
        if self.eat("=>") {
            let start = self.here();
            let expr = self.parse_expr();
            self.eat(";");
            bodies.push(Block {
                span: self.span_from(start),
                statements: vec![Stmt::Expr(expr)],
            });
            return bodies;
        }
        self.expect("{");
        while !self.at_eof() && !self.at("}") {
            // accessor: [attrs] [modifiers] get/set/init
            self.parse_attribute_lists();
            self.parse_modifiers();
            if self.at_ident("get") || self.at_ident("set") || self.at_ident("init") {
                self.bump();
                if let Some(body) = self.parse_body_or_semicolon() {
                    bodies.push(body);
                }
            } else {
                self.bump();
            }
        }
        self.eat("}");
        bodies
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.expect("(");
        while !self.at_eof() && !self.at(")") {
            let start = self.here();
            let attributes = self.parse_attribute_lists();
            let mut modifiers = Vec::new();
            loop {
                let m = match self.peek().text.as_str() {
                    "ref" => Modifier::Ref,
                    "out" => Modifier::Out,
                    "in" => Modifier::In,
                    "params" => Modifier::Params,
                    "this" => {
                        self.bump();
                        continue;
                    }
                    _ => break,
                };
                self.bump();
                modifiers.push(m);
            }
            let ty = self
                .parse_type_ref_opt()
                .unwrap_or_else(|| TypeRef::simple("", self.span_from(start)));
            let name = self.eat_ident().map(|t| t.text).unwrap_or_default();
            if self.eat("=") {
                self.parse_expr();
            }
            params.push(Param {
                attributes,
                modifiers,
                ty,
                name,
                span: self.span_from(start),
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")");
        params
    }

    // ---- type references -----------------------------------------------

    fn parse_type_ref_opt(&mut self) -> Option<TypeRef> {
        let checkpoint = self.checkpoint();
        match self.try_parse_type_ref() {
            Some(ty) => Some(ty),
            None => {
                self.rollback(checkpoint);
                None
            }
        }
    }

    fn try_parse_type_ref(&mut self) -> Option<TypeRef> {
        let start = self.here();

        // tuple type: consume balanced parens
        if self.at("(") {
            let open = self.checkpoint();
            self.skip_balanced("(", ")");
            // must look like a type usage, not an expression
            if !(self.peek().is_ident() || self.at("?") || self.at("[")) {
                self.rollback(open);
                return None;
            }
            let mut ty = TypeRef::simple("", self.span_from(start));
            ty.text = "(tuple)".to_string();
            self.finish_type_suffixes(&mut ty);
            ty.span = self.span_from(start);
            return Some(ty);
        }

        if !self.peek().is_ident() {
            return None;
        }

        let mut segments: Vec<(String, Vec<TypeRef>)> = Vec::new();
        loop {
            if !self.peek().is_ident() {
                return None;
            }
            let seg_name = self.bump().text;
            let mut seg_args = Vec::new();
            if self.at("<") && self.type_args_ahead() {
                self.bump();
                loop {
                    if let Some(arg) = self.parse_type_ref_opt() {
                        seg_args.push(arg);
                    } else if !self.at(">") {
                        self.bump();
                    }
                    if !self.eat(",") {
                        break;
                    }
                }
                self.eat(">");
            }
            segments.push((seg_name, seg_args));
            if self.at(".") && self.peek_at(1).is_ident() {
                self.bump();
            } else {
                break;
            }
        }

        let (name, args) = segments.last().cloned()?;
        let qualifier = segments[..segments.len() - 1]
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(".");

        let mut text = String::new();
        for (i, (seg, seg_args)) in segments.iter().enumerate() {
            if i > 0 {
                text.push('.');
            }
            text.push_str(seg);
            if !seg_args.is_empty() {
                text.push('<');
                for (j, a) in seg_args.iter().enumerate() {
                    if j > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&a.text);
                }
                text.push('>');
            }
        }

        let mut ty = TypeRef {
            text,
            name,
            qualifier,
            args,
            array_ranks: Vec::new(),
            nullable: false,
            span: self.span_from(start),
        };
        self.finish_type_suffixes(&mut ty);
        ty.span = self.span_from(start);
        Some(ty)
    }

    /// `?` and `[]`/`[,]` suffixes; `[` is only a type suffix when followed
    /// by `]` or commas.
    fn finish_type_suffixes(&mut self, ty: &mut TypeRef) {
        if self.at("?") && !self.peek_at(1).is("[") {
            // in type position `?` is always nullable
            self.bump();
            ty.nullable = true;
            ty.text.push('?');
        }
        while self.at("[") {
            let mut commas = 0u32;
            let mut offset = 1usize;
            loop {
                let t = self.peek_at(offset);
                if t.is(",") {
                    commas += 1;
                    offset += 1;
                } else if t.is("]") {
                    break;
                } else {
                    return; // element access / size specifier, not a type suffix
                }
            }
            for _ in 0..=offset {
                self.bump();
            }
            ty.array_ranks.push(commas + 1);
            ty.text.push('[');
            for _ in 0..commas {
                ty.text.push(',');
            }
            ty.text.push(']');
        }
    }

    /// Whether `<` at the current position opens generic type arguments
    fn type_args_ahead(&self) -> bool {
        let mut offset = 1usize;
        let mut depth = 1usize;
        while offset < 256 {
            let t = self.peek_at(offset);
            match t.kind {
                TokenKind::Ident => {}
                TokenKind::Eof => return false,
                TokenKind::Punct | TokenKind::Keyword => match t.text.as_str() {
                    "<" => depth += 1,
                    ">" => {
                        depth -= 1;
                        if depth == 0 {
                            return true;
                        }
                    }
                    "," | "." | "[" | "]" | "?" | "(" | ")" => {}
                    _ => return false,
                },
                _ => return false,
            }
            offset += 1;
        }
        false
    }

    /// Whether `<` opens type parameters of a declaration (idents/commas only)
    fn generic_params_ahead(&self) -> bool {
        let mut offset = 1usize;
        while offset < 64 {
            let t = self.peek_at(offset);
            if t.is_ident() || t.is(",") {
                offset += 1;
            } else if t.is(">") {
                return true;
            } else {
                return false;
            }
        }
        false
    }

    // ---- statements -----------------------------------------------------

    fn parse_block(&mut self) -> Block {
        let start = self.here();
        self.expect("{");
        let mut statements = Vec::new();
        while !self.at_eof() && !self.at("}") {
            statements.push(self.parse_statement());
        }
        self.eat("}");
        Block {
            statements,
            span: self.span_from(start),
        }
    }

    fn parse_statement(&mut self) -> Stmt {
        let start = self.here();

        if self.at("{") {
            return Stmt::Block(self.parse_block());
        }
        if self.eat(";") {
            return Stmt::Empty(self.span_from(start));
        }
        if self.at("if") {
            self.bump();
            self.expect("(");
            let cond = self.parse_expr();
            self.expect(")");
            let then_branch = Box::new(self.parse_statement());
            let else_branch = if self.eat("else") {
                Some(Box::new(self.parse_statement()))
            } else {
                None
            };
            return Stmt::If {
                cond,
                then_branch,
                else_branch,
                span: self.span_from(start),
            };
        }
        if self.at("while") {
            self.bump();
            self.expect("(");
            let cond = self.parse_expr();
            self.expect(")");
            let body = Box::new(self.parse_statement());
            return Stmt::While {
                cond,
                body,
                span: self.span_from(start),
            };
        }
        if self.at("do") {
            self.bump();
            let body = Box::new(self.parse_statement());
            self.expect("while");
            self.expect("(");
            let cond = self.parse_expr();
            self.expect(")");
            self.eat(";");
            return Stmt::DoWhile {
                body,
                cond,
                span: self.span_from(start),
            };
        }
        if self.at("for") {
            self.bump();
            self.expect("(");
            let init = if self.at(";") {
                None
            } else {
                Some(Box::new(self.parse_local_or_expr_statement(false)))
            };
            self.eat(";");
            let cond = if self.at(";") { None } else { Some(self.parse_expr()) };
            self.eat(";");
            let mut step = Vec::new();
            while !self.at_eof() && !self.at(")") {
                step.push(self.parse_expr());
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(")");
            let body = Box::new(self.parse_statement());
            return Stmt::For {
                init,
                cond,
                step,
                body,
                span: self.span_from(start),
            };
        }
        if self.at("foreach") {
            self.bump();
            self.expect("(");
            let ty = if self.at_ident("var") && self.peek_at(1).is_ident() {
                self.bump();
                None
            } else {
                self.parse_type_ref_opt()
            };
            let var = self.eat_ident().map(|t| t.text).unwrap_or_default();
            self.expect("in");
            let iterable = self.parse_expr();
            self.expect(")");
            let body = Box::new(self.parse_statement());
            return Stmt::Foreach {
                ty,
                var,
                iterable,
                body,
                span: self.span_from(start),
            };
        }
        if self.at("switch") {
            return self.parse_switch(start);
        }
        if self.at("return") {
            self.bump();
            let value = if self.at(";") { None } else { Some(self.parse_expr()) };
            self.eat(";");
            return Stmt::Return {
                value,
                span: self.span_from(start),
            };
        }
        if self.at("break") {
            self.bump();
            self.eat(";");
            return Stmt::Break(self.span_from(start));
        }
        if self.at("continue") {
            self.bump();
            self.eat(";");
            return Stmt::Continue(self.span_from(start));
        }
        if self.at("try") {
            return self.parse_try(start);
        }
        if self.at("throw") {
            self.bump();
            let value = if self.at(";") { None } else { Some(self.parse_expr()) };
            self.eat(";");
            return Stmt::Throw {
                value,
                span: self.span_from(start),
            };
        }
        if self.at("goto") {
            self.bump();
            let kind = if self.at("case") {
                self.skip_to_any(&[";"]);
                GotoKind::Case
            } else if self.at("default") {
                self.bump();
                GotoKind::Default
            } else {
                GotoKind::Label(self.eat_ident().map(|t| t.text).unwrap_or_default())
            };
            self.eat(";");
            return Stmt::Goto {
                kind,
                span: self.span_from(start),
            };
        }
        if self.at("const") {
            self.bump();
            let ty = self.parse_type_ref_opt();
            let mut declarators = Vec::new();
            while let Some(token) = self.eat_ident() {
                let text = token.text.clone();
                let span = token.span;
                declarators.push(self.parse_declarator(text, span));
                if !self.eat(",") {
                    break;
                }
            }
            self.eat(";");
            return Stmt::LocalVar {
                ty,
                is_const: true,
                declarators,
                span: self.span_from(start),
            };
        }
        if self.at("using") {
            self.bump();
            if self.at("(") {
                self.skip_balanced("(", ")");
                let body = self.parse_statement();
                return Stmt::Block(Block {
                    span: self.span_from(start),
                    statements: vec![body],
                });
            }
            self.skip_to_any(&[";"]);
            self.eat(";");
            return Stmt::Opaque(self.span_from(start));
        }
        if self.at("lock") || self.at("fixed") || self.at("checked") || self.at("unchecked") || self.at("unsafe") {
            self.bump();
            if self.at("(") {
                self.skip_balanced("(", ")");
            }
            let body = self.parse_statement();
            return Stmt::Block(Block {
                span: self.span_from(start),
                statements: vec![body],
            });
        }

        // label: `ident :` (but not `ident ::`)
        if self.peek().is_ident() && self.peek_at(1).is(":") {
            let label = self.bump().text;
            self.bump();
            let stmt = Box::new(self.parse_statement());
            return Stmt::Labeled {
                label,
                stmt,
                span: self.span_from(start),
            };
        }

        self.parse_local_or_expr_statement(true)
    }

    fn parse_switch(&mut self, start: Pos) -> Stmt {
        self.bump();
        self.expect("(");
        let scrutinee = self.parse_expr();
        self.expect(")");
        self.expect("{");
        let mut body = Vec::new();
        while !self.at_eof() && !self.at("}") {
            if self.at("case") {
                self.skip_to_any(&[":"]);
                self.eat(":");
            } else if self.at("default") && self.peek_at(1).is(":") {
                self.bump();
                self.bump();
            } else {
                body.push(self.parse_statement());
            }
        }
        self.eat("}");
        Stmt::Switch {
            scrutinee,
            body,
            span: self.span_from(start),
        }
    }

    fn parse_try(&mut self, start: Pos) -> Stmt {
        let keyword_span = self.peek().span;
        self.bump();
        let block = self.parse_block();
        let mut catches = Vec::new();
        while self.at("catch") {
            let catch_start = self.here();
            self.bump();
            let mut ty = None;
            let mut var = None;
            if self.eat("(") {
                ty = self.parse_type_ref_opt();
                var = self.eat_ident().map(|t| t.text);
                self.expect(")");
            }
            if self.at_ident("when") {
                self.bump();
                self.skip_balanced("(", ")");
            }
            let catch_block = self.parse_block();
            catches.push(CatchClause {
                ty,
                var,
                block: catch_block,
                span: self.span_from(catch_start),
            });
        }
        let finally = if self.eat("finally") {
            Some(self.parse_block())
        } else {
            None
        };
        Stmt::Try {
            block,
            catches,
            finally,
            keyword_span,
            span: self.span_from(start),
        }
    }

    /// Local declaration, local function, or expression statement.
    /// `consume_semi` is false inside a `for` initialiser.
    fn parse_local_or_expr_statement(&mut self, consume_semi: bool) -> Stmt {
        let start = self.here();

        // var declaration
        if self.at_ident("var") && self.peek_at(1).is_ident() && !self.peek_at(2).is(".") {
            self.bump();
            let mut declarators = Vec::new();
            while let Some(token) = self.eat_ident() {
                let text = token.text.clone();
                let span = token.span;
                declarators.push(self.parse_declarator(text, span));
                if !self.eat(",") {
                    break;
                }
            }
            if consume_semi {
                self.eat(";");
            }
            return Stmt::LocalVar {
                ty: None,
                is_const: false,
                declarators,
                span: self.span_from(start),
            };
        }

        // typed declaration or local function
        let checkpoint = self.checkpoint();
        if let Some(ty) = self.parse_type_ref_opt() {
            if self.peek().is_ident() {
                let name_token = self.peek().clone();
                // local function: Name ( ... ) { | =>
                if self.peek_at(1).is("(") {
                    let fn_check = self.checkpoint();
                    self.bump();
                    let params = self.parse_params();
                    if self.at("{") || self.at("=>") {
                        let body = self.parse_body_or_semicolon();
                        return Stmt::LocalFunction(Box::new(MethodDecl {
                            attributes: Vec::new(),
                            modifiers: Vec::new(),
                            return_ty: ty,
                            name: name_token.text.clone(),
                            name_span: name_token.span,
                            span: self.span_from(start),
                            type_params: Vec::new(),
                            params,
                            body,
                        }));
                    }
                    self.rollback(fn_check);
                } else if self.peek_at(1).is("=")
                    || self.peek_at(1).is(";")
                    || self.peek_at(1).is(",")
                {
                    let mut declarators = Vec::new();
                    while let Some(token) = self.eat_ident() {
                        let text = token.text.clone();
                        let span = token.span;
                        declarators.push(self.parse_declarator(text, span));
                        if !self.eat(",") {
                            break;
                        }
                    }
                    if consume_semi {
                        self.eat(";");
                    }
                    return Stmt::LocalVar {
                        ty: Some(ty),
                        is_const: false,
                        declarators,
                        span: self.span_from(start),
                    };
                } else if self.peek_at(1).is("<") {
                    // possibly a generic local function
                    let fn_check = self.checkpoint();
                    self.bump();
                    if self.generic_params_ahead() {
                        self.bump();
                        let mut type_params = Vec::new();
                        while !self.at_eof() && !self.at(">") {
                            let t = self.bump();
                            if t.is_ident() {
                                type_params.push(t.text);
                            }
                        }
                        self.eat(">");
                        if self.at("(") {
                            let params = self.parse_params();
                            if self.at("{") || self.at("=>") {
                                let body = self.parse_body_or_semicolon();
                                return Stmt::LocalFunction(Box::new(MethodDecl {
                                    attributes: Vec::new(),
                                    modifiers: Vec::new(),
                                    return_ty: ty,
                                    name: name_token.text.clone(),
                                    name_span: name_token.span,
                                    span: self.span_from(start),
                                    type_params,
                                    params,
                                    body,
                                }));
                            }
                        }
                    }
                    self.rollback(fn_check);
                }
            }
            self.rollback(checkpoint);
        }

        // expression statement
        let expr = self.parse_expr();
        if consume_semi && !self.eat(";") {
            // resynchronise on malformed input
            self.skip_to_any(&[";", "}"]);
            self.eat(";");
        }
        Stmt::Expr(expr)
    }

    // ---- expressions -----------------------------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Expr {
        let start = self.here();
        let target = self.parse_conditional();
        let op = self.peek().text.clone();
        if matches!(
            op.as_str(),
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "??="
        ) && self.peek().kind == TokenKind::Punct
        {
            self.bump();
            let value = if self.at("{") {
                self.parse_initializer_value()
            } else {
                self.parse_assignment()
            };
            return Expr::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
                span: self.span_from(start),
            };
        }
        target
    }

    fn parse_conditional(&mut self) -> Expr {
        let start = self.here();
        let cond = self.parse_null_coalescing();
        if self.at("?") && !self.peek_at(1).is("[") {
            self.bump();
            let then_value = self.parse_expr();
            self.expect(":");
            let else_value = self.parse_expr();
            return Expr::Conditional {
                cond: Box::new(cond),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
                span: self.span_from(start),
            };
        }
        cond
    }

    fn parse_null_coalescing(&mut self) -> Expr {
        let start = self.here();
        let left = self.parse_binary(0);
        if self.at("??") {
            self.bump();
            let right = self.parse_null_coalescing();
            return Expr::Binary {
                op: "??".to_string(),
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        left
    }

    fn binary_precedence(op: &str) -> Option<u8> {
        match op {
            "||" => Some(1),
            "&&" => Some(2),
            "|" => Some(3),
            "^" => Some(4),
            "&" => Some(5),
            "==" | "!=" => Some(6),
            "<" | ">" | "<=" | ">=" => Some(7),
            "+" | "-" => Some(9),
            "*" | "/" | "%" => Some(10),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let start = self.here();
        let mut left = self.parse_unary();
        loop {
            // `is` / `as` sit between relational and equality in C#; the
            // exact level does not matter for these rules
            if self.at("is") {
                self.bump();
                let ty = if self.at_ident("null")
                    || self.at_ident("true")
                    || self.at_ident("false")
                    || !self.peek().is_ident()
                {
                    // constant pattern
                    self.parse_unary();
                    None
                } else {
                    let ty = self.parse_type_ref_opt();
                    // pattern designation: `is Foo f`
                    if self.peek().is_ident() && !self.peek_at(1).is("(") {
                        self.bump();
                    }
                    ty
                };
                left = Expr::Is {
                    value: Box::new(left),
                    ty,
                    span: self.span_from(start),
                };
                continue;
            }
            if self.at("as") {
                self.bump();
                let ty = self
                    .parse_type_ref_opt()
                    .unwrap_or_else(|| TypeRef::simple("", self.span_from(start)));
                left = Expr::As {
                    value: Box::new(left),
                    ty,
                    span: self.span_from(start),
                };
                continue;
            }

            let op = self.peek().text.clone();
            if self.peek().kind != TokenKind::Punct {
                break;
            }
            let Some(prec) = Self::binary_precedence(&op) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            // `<` could be a generic argument list handled in postfix; if we
            // are here, postfix declined it, so treat as comparison
            self.bump();
            let right = self.parse_binary(prec + 1);
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let start = self.here();
        let op = self.peek().text.clone();
        if self.peek().kind == TokenKind::Punct
            && matches!(op.as_str(), "!" | "-" | "+" | "~" | "++" | "--")
        {
            self.bump();
            let value = self.parse_unary();
            return Expr::Unary {
                op,
                value: Box::new(value),
                span: self.span_from(start),
            };
        }
        if self.at_ident("await") && !self.peek_at(1).is(";") && !self.peek_at(1).is(".") {
            self.bump();
            let value = self.parse_unary();
            return Expr::Unary {
                op: "await".to_string(),
                value: Box::new(value),
                span: self.span_from(start),
            };
        }

        // cast: `(Type) unary-operand`
        if self.at("(") {
            let checkpoint = self.checkpoint();
            self.bump();
            if let Some(ty) = self.parse_type_ref_opt() {
                if self.eat(")") {
                    let next = self.peek();
                    let casts = match next.kind {
                        TokenKind::Ident | TokenKind::Int | TokenKind::Float | TokenKind::Str
                        | TokenKind::Char | TokenKind::InterpStr => true,
                        TokenKind::Keyword => {
                            matches!(next.text.as_str(), "this" | "base" | "new" | "typeof")
                        }
                        TokenKind::Punct => matches!(next.text.as_str(), "(" | "!" | "~"),
                        TokenKind::Eof => false,
                    };
                    if casts {
                        let value = self.parse_unary();
                        return Expr::Cast {
                            ty,
                            value: Box::new(value),
                            span: self.span_from(start),
                        };
                    }
                }
            }
            self.rollback(checkpoint);
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.here();
        let mut expr = self.parse_primary();
        loop {
            if self.at(".") || self.at("?.") {
                let null_conditional = self.bump().text == "?.";
                let (name, name_span) = match self.eat_ident() {
                    Some(t) => (t.text.clone(), t.span),
                    None => (String::new(), self.span_from(start)),
                };
                expr = Expr::Member {
                    target: Box::new(expr),
                    name,
                    name_span,
                    null_conditional,
                    span: self.span_from(start),
                };
            } else if self.at("(") {
                let args = self.parse_args();
                expr = Expr::Invocation {
                    target: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                    span: self.span_from(start),
                };
            } else if self.at("[") {
                let indices = self.parse_indices();
                expr = Expr::ElementAccess {
                    target: Box::new(expr),
                    indices,
                    null_conditional: false,
                    span: self.span_from(start),
                };
            } else if self.at("?") && self.peek_at(1).is("[") {
                self.bump();
                let indices = self.parse_indices();
                expr = Expr::ElementAccess {
                    target: Box::new(expr),
                    indices,
                    null_conditional: true,
                    span: self.span_from(start),
                };
            } else if self.at("<") && self.generic_call_ahead() {
                // explicit generic arguments on an invocation
                self.bump();
                let mut type_args = Vec::new();
                loop {
                    if let Some(arg) = self.parse_type_ref_opt() {
                        type_args.push(arg);
                    } else if !self.at(">") {
                        self.bump();
                    }
                    if !self.eat(",") {
                        break;
                    }
                }
                self.eat(">");
                let args = if self.at("(") { self.parse_args() } else { Vec::new() };
                expr = Expr::Invocation {
                    target: Box::new(expr),
                    type_args,
                    args,
                    span: self.span_from(start),
                };
            } else if self.at("++") || self.at("--") {
                let op = self.bump().text;
                expr = Expr::Unary {
                    op,
                    value: Box::new(expr),
                    span: self.span_from(start),
                };
            } else {
                break;
            }
        }
        expr
    }

    fn generic_call_ahead(&self) -> bool {
        if !self.type_args_ahead() {
            return false;
        }
        // find the closing '>' and require '(' after it
        let mut offset = 1usize;
        let mut depth = 1usize;
        while offset < 256 {
            let t = self.peek_at(offset);
            match t.text.as_str() {
                "<" => depth += 1,
                ">" => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(offset + 1).is("(");
                    }
                }
                _ => {}
            }
            if t.kind == TokenKind::Eof {
                return false;
            }
            offset += 1;
        }
        false
    }

    fn parse_args(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        self.expect("(");
        while !self.at_eof() && !self.at(")") {
            let modifier = if self.eat("ref") {
                Some(Modifier::Ref)
            } else if self.eat("out") {
                // `out var x` / `out Foo x` declarations
                if self.at_ident("var") && self.peek_at(1).is_ident() {
                    self.bump();
                }
                Some(Modifier::Out)
            } else if self.at("in") && self.peek_at(1).is_ident() {
                self.bump();
                Some(Modifier::In)
            } else {
                None
            };
            let name = if self.peek().is_ident()
                && self.peek_at(1).is(":")
                && !self.peek_at(2).is(":")
            {
                let n = self.bump().text;
                self.bump();
                Some(n)
            } else {
                None
            };
            let value = self.parse_expr();
            args.push(Arg {
                modifier,
                name,
                value,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")");
        args
    }

    fn parse_indices(&mut self) -> Vec<Expr> {
        let mut indices = Vec::new();
        self.expect("[");
        while !self.at_eof() && !self.at("]") {
            indices.push(self.parse_expr());
            if !self.eat(",") {
                break;
            }
        }
        self.expect("]");
        indices
    }

    fn parse_primary(&mut self) -> Expr {
        let start = self.here();
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Int => {
                self.bump();
                return Expr::Literal {
                    value: Lit::Int(token.text),
                    span: token.span,
                };
            }
            TokenKind::Float => {
                self.bump();
                return Expr::Literal {
                    value: Lit::Float(token.text),
                    span: token.span,
                };
            }
            TokenKind::Str => {
                self.bump();
                return Expr::Literal {
                    value: Lit::Str(token.text),
                    span: token.span,
                };
            }
            TokenKind::Char => {
                self.bump();
                return Expr::Literal {
                    value: Lit::Char(token.text.chars().next().unwrap_or(' ')),
                    span: token.span,
                };
            }
            TokenKind::InterpStr => {
                self.bump();
                return Expr::Interpolated(token.span);
            }
            _ => {}
        }

        if self.at("this") {
            self.bump();
            return Expr::This(token.span);
        }
        if self.at("base") {
            self.bump();
            return Expr::Base(token.span);
        }
        if self.at("typeof") {
            self.bump();
            self.expect("(");
            let ty = self
                .parse_type_ref_opt()
                .unwrap_or_else(|| TypeRef::simple("", token.span));
            self.expect(")");
            return Expr::Typeof {
                ty,
                span: self.span_from(start),
            };
        }
        if self.at("new") {
            return self.parse_new(start);
        }
        if self.at("default") {
            self.bump();
            if self.at("(") {
                self.skip_balanced("(", ")");
            }
            return Expr::Opaque(self.span_from(start));
        }
        if self.at("delegate") {
            self.bump();
            if self.at("(") {
                self.skip_balanced("(", ")");
            }
            if self.at("{") {
                self.skip_balanced("{", "}");
            }
            return Expr::Opaque(self.span_from(start));
        }
        if self.at_ident("nameof") && self.peek_at(1).is("(") {
            self.bump();
            self.bump();
            let mut path = Vec::new();
            while self.peek().is_ident() {
                path.push(self.bump().text);
                if !self.eat(".") {
                    break;
                }
            }
            // tolerate generic arguments or other trailing tokens
            self.skip_to_any(&[")"]);
            self.eat(")");
            return Expr::Nameof {
                path,
                span: self.span_from(start),
            };
        }
        if self.at_ident("true") || self.at_ident("false") {
            self.bump();
            return Expr::Literal {
                value: Lit::Bool(token.text == "true"),
                span: token.span,
            };
        }
        if self.at_ident("null") {
            self.bump();
            return Expr::Literal {
                value: Lit::Null,
                span: token.span,
            };
        }

        if self.at("(") {
            let checkpoint = self.checkpoint();
            self.bump();
            let inner = self.parse_expr();
            if self.eat(")") {
                if self.eat("=>") {
                    // lambda; the body is not modelled
                    if self.at("{") {
                        self.skip_balanced("{", "}");
                    } else {
                        self.parse_expr();
                    }
                    return Expr::Opaque(self.span_from(start));
                }
                return Expr::Paren {
                    value: Box::new(inner),
                    span: self.span_from(start),
                };
            }
            // unbalanced parenthesis: treat as opaque and resynchronise
            self.rollback(checkpoint);
            self.skip_balanced("(", ")");
            return Expr::Opaque(self.span_from(start));
        }

        if token.is_ident() {
            self.bump();
            if self.eat("=>") {
                if self.at("{") {
                    self.skip_balanced("{", "}");
                } else {
                    self.parse_expr();
                }
                return Expr::Opaque(self.span_from(start));
            }
            return Expr::Ident {
                name: token.text,
                span: token.span,
            };
        }

        // unknown token; consume it so the parser always makes progress
        self.bump();
        Expr::Opaque(token.span)
    }

    fn parse_new(&mut self, start: Pos) -> Expr {
        self.bump(); // new

        // implicit array: `new[] { ... }` / `new[,] { ... }`
        if self.at("[") {
            let mut rank = 1u32;
            self.bump();
            while !self.at_eof() && !self.at("]") {
                if self.at(",") {
                    rank += 1;
                }
                self.bump();
            }
            self.eat("]");
            let initializer = self.parse_optional_initializer();
            return Expr::New {
                ty: None,
                args: Vec::new(),
                initializer,
                is_array: true,
                array_rank: rank,
                span: self.span_from(start),
            };
        }

        // target-typed: `new(...)`
        if self.at("(") {
            let args = self.parse_args();
            let initializer = self.parse_optional_initializer();
            return Expr::New {
                ty: None,
                args,
                initializer,
                is_array: false,
                array_rank: 0,
                span: self.span_from(start),
            };
        }

        let ty = self.parse_type_ref_opt();

        // array with explicit sizes: `new int[5]` / `new int[x, y]`
        if self.at("[") {
            let mut rank = 1u32;
            self.bump();
            while !self.at_eof() && !self.at("]") {
                if self.at(",") {
                    rank += 1;
                    self.bump();
                } else {
                    self.parse_expr();
                }
            }
            self.eat("]");
            // further rank specifiers for jagged arrays
            while self.at("[") {
                self.skip_balanced("[", "]");
            }
            let initializer = self.parse_optional_initializer();
            return Expr::New {
                ty,
                args: Vec::new(),
                initializer,
                is_array: true,
                array_rank: rank,
                span: self.span_from(start),
            };
        }

        // `new int[,]`-style creation where the rank came from the type suffix
        if let Some(ref t) = ty {
            if t.is_array() {
                let rank = t.array_ranks.first().copied().unwrap_or(1);
                let initializer = self.parse_optional_initializer();
                return Expr::New {
                    ty,
                    args: Vec::new(),
                    initializer,
                    is_array: true,
                    array_rank: rank,
                    span: self.span_from(start),
                };
            }
        }

        let args = if self.at("(") { self.parse_args() } else { Vec::new() };
        let initializer = self.parse_optional_initializer();
        Expr::New {
            ty,
            args,
            initializer,
            is_array: false,
            array_rank: 0,
            span: self.span_from(start),
        }
    }

    fn parse_optional_initializer(&mut self) -> Option<Initializer> {
        if self.at("{") {
            let start = self.here();
            self.skip_balanced("{", "}");
            Some(Initializer {
                span: self.span_from(start),
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one_type(source: &str) -> TypeDecl {
        let tree = parse(source, "Test");
        let types = tree.types();
        assert!(!types.is_empty(), "no type parsed from: {}", source);
        types[0].0.clone()
    }

    #[test]
    fn test_class_with_base_list() {
        let ty = parse_one_type("public class Foo : UdonSharpBehaviour, IBar { }");
        assert_eq!(ty.name, "Foo");
        assert!(ty.has_modifier(Modifier::Public));
        assert_eq!(ty.base_list.len(), 2);
        assert_eq!(ty.base_list[0].name, "UdonSharpBehaviour");
        assert_eq!(ty.base_list[1].name, "IBar");
    }

    #[test]
    fn test_namespace_tracking() {
        let tree = parse("namespace Game { class A { } } class B { }", "Test");
        let types = tree.types();
        assert_eq!(types.len(), 2);
        assert!(types.iter().any(|(t, in_ns)| t.name == "A" && *in_ns));
        assert!(types.iter().any(|(t, in_ns)| t.name == "B" && !*in_ns));
    }

    #[test]
    fn test_file_scoped_namespace() {
        let tree = parse("namespace Game;\nclass A { }", "Test");
        let types = tree.types();
        assert_eq!(types.len(), 1);
        assert!(types[0].1);
    }

    #[test]
    fn test_attributes_with_args() {
        let ty = parse_one_type(
            "[UdonBehaviourSyncMode(BehaviourSyncMode.Manual)] class Foo { [UdonSynced(UdonSyncMode.Linear)] public float speed; }",
        );
        assert_eq!(ty.attributes.len(), 1);
        assert_eq!(ty.attributes[0].name, "UdonBehaviourSyncMode");
        let field = ty.fields().next().unwrap();
        assert_eq!(field.attributes[0].name, "UdonSynced");
        assert_eq!(field.declarators[0].name, "speed");
    }

    #[test]
    fn test_method_kinds() {
        let ty = parse_one_type(
            r#"class Foo {
                public void Bar() { }
                private int Add(int a, int b) { return a + b; }
                public override void OnPlayerJoined(VRCPlayerApi player) { }
                void Generic<T>(T value) { }
                partial void Hook();
            }"#,
        );
        let methods: Vec<_> = ty.methods().collect();
        assert_eq!(methods.len(), 5);
        assert!(methods[0].is_public());
        assert_eq!(methods[1].params.len(), 2);
        assert!(methods[2].is_override());
        assert_eq!(methods[2].params[0].ty.name, "VRCPlayerApi");
        assert!(methods[3].is_generic());
        assert!(methods[4].is_partial());
        assert!(methods[4].body.is_none());
    }

    #[test]
    fn test_field_declarators_and_types() {
        let ty = parse_one_type(
            "class Foo { int a, b = 2; Dictionary<string, int> map; float[] xs; int[,] grid; int? maybe; }",
        );
        let fields: Vec<_> = ty.fields().collect();
        assert_eq!(fields[0].declarators.len(), 2);
        assert_eq!(fields[1].ty.name, "Dictionary");
        assert_eq!(fields[1].ty.args.len(), 2);
        assert!(fields[2].ty.is_array());
        assert!(fields[3].ty.is_multi_dimensional());
        assert!(fields[4].ty.nullable);
    }

    #[test]
    fn test_invocation_shapes() {
        let ty = parse_one_type(
            r#"class Foo {
                void Bar() {
                    SendCustomEvent("Target");
                    other.SendCustomNetworkEvent(NetworkEventTarget.All, nameof(Shoot), 1);
                    GetComponent<Rigidbody>();
                }
            }"#,
        );
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        assert_eq!(body.statements.len(), 3);
        let Stmt::Expr(Expr::Invocation { target, args, .. }) = &body.statements[0] else {
            panic!("expected invocation");
        };
        assert!(matches!(**target, Expr::Ident { ref name, .. } if name == "SendCustomEvent"));
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].value.as_str_literal(), Some("Target"));

        let Stmt::Expr(Expr::Invocation { target, args, .. }) = &body.statements[1] else {
            panic!("expected invocation");
        };
        assert!(
            matches!(**target, Expr::Member { ref name, .. } if name == "SendCustomNetworkEvent")
        );
        assert_eq!(args.len(), 3);
        assert!(matches!(args[1].value, Expr::Nameof { ref path, .. } if path == &["Shoot"]));

        let Stmt::Expr(Expr::Invocation { type_args, .. }) = &body.statements[2] else {
            panic!("expected generic invocation");
        };
        assert_eq!(type_args.len(), 1);
        assert_eq!(type_args[0].name, "Rigidbody");
    }

    #[test]
    fn test_is_as_try_throw() {
        let ty = parse_one_type(
            r#"class Foo {
                void Bar(object o) {
                    var x = o as Foo;
                    if (o is Foo f) { }
                    try { } catch (Exception e) { } finally { }
                    throw new Exception();
                }
            }"#,
        );
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let Stmt::LocalVar { declarators, .. } = &body.statements[0] else {
            panic!("expected local var");
        };
        assert!(matches!(
            declarators[0].init,
            Some(Expr::As { ref ty, .. }) if ty.name == "Foo"
        ));
        let Stmt::If { cond, .. } = &body.statements[1] else {
            panic!("expected if");
        };
        assert!(matches!(cond, Expr::Is { .. }));
        let Stmt::Try { catches, finally, .. } = &body.statements[2] else {
            panic!("expected try");
        };
        assert_eq!(catches.len(), 1);
        assert!(finally.is_some());
        assert!(matches!(body.statements[3], Stmt::Throw { .. }));
    }

    #[test]
    fn test_goto_and_labels() {
        let ty = parse_one_type(
            r#"class Foo {
                void Bar(int n) {
                    top:
                    switch (n) {
                        case 1: goto case 2;
                        case 2: goto default;
                        default: break;
                    }
                    goto top;
                }
            }"#,
        );
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let Stmt::Labeled { label, stmt, .. } = &body.statements[0] else {
            panic!("expected label");
        };
        assert_eq!(label, "top");
        let Stmt::Switch { body: sections, .. } = &**stmt else {
            panic!("expected switch under label");
        };
        assert!(sections
            .iter()
            .any(|s| matches!(s, Stmt::Goto { kind: GotoKind::Case, .. })));
        assert!(sections
            .iter()
            .any(|s| matches!(s, Stmt::Goto { kind: GotoKind::Default, .. })));
        assert!(matches!(
            body.statements[1],
            Stmt::Goto { kind: GotoKind::Label(ref l), .. } if l == "top"
        ));
    }

    #[test]
    fn test_local_function_detected() {
        let ty = parse_one_type(
            "class Foo { void Bar() { int Helper(int x) { return x; } Helper(1); } }",
        );
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        assert!(matches!(body.statements[0], Stmt::LocalFunction(_)));
        assert!(matches!(body.statements[1], Stmt::Expr(Expr::Invocation { .. })));
    }

    #[test]
    fn test_object_initializer() {
        let ty = parse_one_type("class Foo { void Bar() { var x = new Foo { A = 1 }; var y = new int[] { 1, 2 }; } }");
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let Stmt::LocalVar { declarators, .. } = &body.statements[0] else {
            panic!("expected local");
        };
        assert!(matches!(
            declarators[0].init,
            Some(Expr::New { initializer: Some(_), is_array: false, .. })
        ));
        let Stmt::LocalVar { declarators, .. } = &body.statements[1] else {
            panic!("expected local");
        };
        assert!(matches!(
            declarators[0].init,
            Some(Expr::New { is_array: true, .. })
        ));
    }

    #[test]
    fn test_null_conditional_and_element_access() {
        let ty = parse_one_type("class Foo { void Bar() { a?.B(); c?[0] = 1; d[1, 2] = 3; } }");
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let Stmt::Expr(Expr::Invocation { target, .. }) = &body.statements[0] else {
            panic!("expected invocation");
        };
        assert!(matches!(**target, Expr::Member { null_conditional: true, .. }));
        let Stmt::Expr(Expr::Assign { target, .. }) = &body.statements[1] else {
            panic!("expected assignment");
        };
        assert!(matches!(
            **target,
            Expr::ElementAccess { null_conditional: true, .. }
        ));
        let Stmt::Expr(Expr::Assign { target, .. }) = &body.statements[2] else {
            panic!("expected assignment");
        };
        assert!(matches!(
            **target,
            Expr::ElementAccess { ref indices, .. } if indices.len() == 2
        ));
    }

    #[test]
    fn test_typeof_and_cast() {
        let ty = parse_one_type("class Foo { void Bar() { var t = typeof(Foo); var x = (Foo)obj; } }");
        let body = ty.methods().next().unwrap().body.as_ref().unwrap();
        let Stmt::LocalVar { declarators, .. } = &body.statements[0] else {
            panic!()
        };
        assert!(matches!(
            declarators[0].init,
            Some(Expr::Typeof { ref ty, .. }) if ty.name == "Foo"
        ));
        let Stmt::LocalVar { declarators, .. } = &body.statements[1] else {
            panic!()
        };
        assert!(matches!(
            declarators[0].init,
            Some(Expr::Cast { ref ty, .. }) if ty.name == "Foo"
        ));
    }

    #[test]
    fn test_properties_and_nested_types() {
        let ty = parse_one_type(
            r#"class Foo {
                public int Health { get { return hp; } set { hp = value; } }
                public string Name => name;
                class Inner { }
            }"#,
        );
        let props: Vec<_> = ty.properties().collect();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].name, "Health");
        assert_eq!(props[0].accessor_bodies.len(), 2);
        assert!(ty.members.iter().any(|m| matches!(m, Member::Nested(n) if n.name == "Inner")));
    }

    #[test]
    fn test_constructor_detected() {
        let ty = parse_one_type("class Foo { public Foo() { } public Foo(int x) : this() { } }");
        let ctors = ty
            .members
            .iter()
            .filter(|m| matches!(m, Member::Constructor(_)))
            .count();
        assert_eq!(ctors, 2);
    }

    #[test]
    fn test_malformed_input_recovers() {
        let tree = parse("class Foo { void Bar( { } } class Baz { }", "Test");
        assert!(tree.types().iter().any(|(t, _)| t.name == "Baz"));
        let tree = parse("$$$ class Ok { }", "Test");
        assert!(tree.types().iter().any(|(t, _)| t.name == "Ok"));
    }

    #[test]
    fn test_const_string_field() {
        let ty = parse_one_type(r#"class Foo { private const string EventName = "Fire"; }"#);
        let field = ty.fields().next().unwrap();
        assert!(field.is_const());
        assert_eq!(
            field.declarators[0].init.as_ref().unwrap().as_str_literal(),
            Some("Fire")
        );
    }
}
