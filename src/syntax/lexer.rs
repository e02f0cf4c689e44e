//! Tokenizer for the C# subset
//!
//! Produces a flat token stream with 0-based line/column spans. Comments and
//! preprocessor directives are skipped. `<` and `>` are always lexed as
//! single tokens so the parser can treat them as either comparison operators
//! or generic brackets.

use crate::diagnostic::{Pos, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Str,
    InterpStr,
    Char,
    Punct,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text (for `Str`, the decoded value)
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.text == text && matches!(self.kind, TokenKind::Punct | TokenKind::Keyword)
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }
}

/// Structural keywords. Primitive type names stay identifiers so type
/// references parse uniformly.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "break", "case", "catch", "checked", "class", "const", "continue",
    "default", "delegate", "do", "else", "enum", "event", "explicit", "extern", "finally", "fixed",
    "for", "foreach", "goto", "if", "implicit", "in", "interface", "internal", "is", "lock",
    "namespace", "new", "operator", "out", "override", "params", "partial", "private", "protected",
    "public", "readonly", "ref", "return", "sealed", "static", "struct", "switch", "this", "throw",
    "try", "typeof", "unchecked", "unsafe", "using", "virtual", "while",
];

pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 0,
            col: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn push(&mut self, kind: TokenKind, text: String, start: Pos) {
        self.tokens.push(Token {
            kind,
            text,
            span: Span::new(start, self.here()),
        });
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek() {
            let start = self.here();
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.skip_line(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '#' => self.skip_line(),
                '@' if self.peek_at(1) == Some('"') => self.lex_verbatim_string(start),
                '@' if self.peek_at(1).is_some_and(is_ident_start) => {
                    // @-escaped identifier
                    self.bump();
                    self.lex_word(start);
                }
                '$' if self.peek_at(1) == Some('"') => self.lex_interpolated_string(start),
                '"' => self.lex_string(start),
                '\'' => self.lex_char(start),
                c if c.is_ascii_digit() => self.lex_number(start),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.lex_number(start),
                c if is_ident_start(c) => self.lex_word(start),
                _ => self.lex_punct(start),
            }
        }
        let eof = self.here();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            span: Span::new(eof, eof),
        });
        self.tokens
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(c) = self.bump() {
            if c == '*' && self.peek() == Some('/') {
                self.bump();
                break;
            }
        }
    }

    fn lex_word(&mut self, start: Pos) {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        self.push(kind, text, start);
    }

    fn lex_number(&mut self, start: Pos) {
        let mut text = String::new();
        let mut is_float = false;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X') | Some('b') | Some('B')) {
            text.push(self.bump().unwrap());
            text.push(self.bump().unwrap());
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() || c == '_' {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        } else {
            while let Some(c) = self.peek() {
                match c {
                    '0'..='9' | '_' => {
                        text.push(c);
                        self.bump();
                    }
                    '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) && !is_float => {
                        is_float = true;
                        text.push(c);
                        self.bump();
                    }
                    'e' | 'E' if text.chars().any(|d| d.is_ascii_digit()) => {
                        is_float = true;
                        text.push(c);
                        self.bump();
                        if matches!(self.peek(), Some('+') | Some('-')) {
                            text.push(self.bump().unwrap());
                        }
                    }
                    _ => break,
                }
            }
        }

        // type suffix
        while let Some(c) = self.peek() {
            match c {
                'f' | 'F' | 'd' | 'D' | 'm' | 'M' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                }
                'u' | 'U' | 'l' | 'L' => {
                    text.push(c);
                    self.bump();
                }
                _ => break,
            }
        }

        let kind = if is_float { TokenKind::Float } else { TokenKind::Int };
        self.push(kind, text, start);
    }

    fn lex_string(&mut self, start: Pos) {
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        value.push(unescape(escaped));
                    }
                }
                '\n' => break, // unterminated
                _ => value.push(c),
            }
        }
        self.push(TokenKind::Str, value, start);
    }

    fn lex_verbatim_string(&mut self, start: Pos) {
        self.bump();
        self.bump();
        let mut value = String::new();
        while let Some(c) = self.bump() {
            if c == '"' {
                if self.peek() == Some('"') {
                    value.push('"');
                    self.bump();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        self.push(TokenKind::Str, value, start);
    }

    fn lex_interpolated_string(&mut self, start: Pos) {
        self.bump();
        self.bump();
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '\\' if depth == 0 => {
                    self.bump();
                }
                '{' if self.peek() == Some('{') => {
                    self.bump();
                }
                '}' if self.peek() == Some('}') => {
                    self.bump();
                }
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                '"' if depth == 0 => break,
                _ => {}
            }
        }
        self.push(TokenKind::InterpStr, String::new(), start);
    }

    fn lex_char(&mut self, start: Pos) {
        self.bump();
        let mut value = ' ';
        if let Some(c) = self.bump() {
            value = if c == '\\' {
                self.bump().map(unescape).unwrap_or(' ')
            } else {
                c
            };
        }
        if self.peek() == Some('\'') {
            self.bump();
        }
        self.push(TokenKind::Char, value.to_string(), start);
    }

    fn lex_punct(&mut self, start: Pos) {
        // longest-match over the operators the parser distinguishes;
        // '<' and '>' stay single for generics
        const TWO: &[&str] = &[
            "?.", "??", "=>", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=",
            "&=", "|=", "^=", "++", "--", "::", "->",
        ];
        let rest: String = self.chars[self.pos..self.chars.len().min(self.pos + 3)]
            .iter()
            .collect();
        if rest.starts_with("??=") {
            self.bump();
            self.bump();
            self.bump();
            self.push(TokenKind::Punct, "??=".to_string(), start);
            return;
        }
        for op in TWO {
            if rest.starts_with(op) {
                self.bump();
                self.bump();
                self.push(TokenKind::Punct, (*op).to_string(), start);
                return;
            }
        }
        let c = self.bump().unwrap_or(' ');
        self.push(TokenKind::Punct, c.to_string(), start);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '0' => '\0',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        let tokens = kinds("public class Foo");
        assert_eq!(tokens[0], (TokenKind::Keyword, "public".to_string()));
        assert_eq!(tokens[1], (TokenKind::Keyword, "class".to_string()));
        assert_eq!(tokens[2], (TokenKind::Ident, "Foo".to_string()));
    }

    #[test]
    fn test_primitive_names_are_idents() {
        let tokens = kinds("int string float");
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Ident));
    }

    #[test]
    fn test_string_decoding() {
        let tokens = kinds(r#""hello\nworld""#);
        assert_eq!(tokens[0], (TokenKind::Str, "hello\nworld".to_string()));

        let tokens = kinds(r#"@"C:\path""#);
        assert_eq!(tokens[0], (TokenKind::Str, r"C:\path".to_string()));
    }

    #[test]
    fn test_interpolated_string_is_opaque() {
        let tokens = kinds(r#"$"value {x + 1} end" ;"#);
        assert_eq!(tokens[0].0, TokenKind::InterpStr);
        assert_eq!(tokens[1], (TokenKind::Punct, ";".to_string()));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("42 3.5f 0xFF 1e3");
        assert_eq!(tokens[0].0, TokenKind::Int);
        assert_eq!(tokens[1].0, TokenKind::Float);
        assert_eq!(tokens[2].0, TokenKind::Int);
        assert_eq!(tokens[3].0, TokenKind::Float);
    }

    #[test]
    fn test_multi_char_puncts() {
        let tokens = kinds("a?.b ?? c => d == e");
        let puncts: Vec<_> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Punct)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(puncts, vec!["?.", "??", "=>", "=="]);
    }

    #[test]
    fn test_angle_brackets_stay_single() {
        let tokens = kinds("List<List<int>>");
        let puncts: Vec<_> = tokens
            .iter()
            .filter(|(k, _)| *k == TokenKind::Punct)
            .map(|(_, t)| t.as_str())
            .collect();
        assert_eq!(puncts, vec!["<", "<", ">", ">"]);
    }

    #[test]
    fn test_comments_and_preprocessor_skipped() {
        let tokens = kinds("a // comment\n#region X\nb /* block */ c");
        let words: Vec<_> = tokens.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(words, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = tokenize("a\n  b");
        assert_eq!(tokens[0].span.start, Pos::new(0, 0));
        assert_eq!(tokens[1].span.start, Pos::new(1, 2));
        assert_eq!(tokens[1].span.end, Pos::new(1, 3));
    }
}
