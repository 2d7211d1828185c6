//! Token definitions produced by the lexer.

use std::fmt;

use crate::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Str,

    // Keywords
    Resource,
    Let,
    If,
    Else,
    Match,
    Rescue,
    Fail,
    True,
    False,
    Nil,
    SelfKw,

    // Delimiters
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    At,
    Arrow,
    FatArrow,

    // Operators
    Dot,
    QuestionDot,
    QuestionQuestion,
    /// `!`: negation, unwrap-or-fail, or the required-nullability marker.
    Bang,
    /// `?`: the optional-nullability marker.
    Question,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,

    /// An unrecognized character; the lexer reports it and keeps going.
    Error,
    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "resource" => TokenKind::Resource,
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "match" => TokenKind::Match,
            "rescue" => TokenKind::Rescue,
            "fail" => TokenKind::Fail,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            "self" => TokenKind::SelfKw,
            _ => return None,
        })
    }

    /// Human-readable description used in "expected X, found Y" messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Str => "string",
            TokenKind::Resource => "`resource`",
            TokenKind::Let => "`let`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::Match => "`match`",
            TokenKind::Rescue => "`rescue`",
            TokenKind::Fail => "`fail`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Nil => "`nil`",
            TokenKind::SelfKw => "`self`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Semicolon => "`;`",
            TokenKind::At => "`@`",
            TokenKind::Arrow => "`->`",
            TokenKind::FatArrow => "`=>`",
            TokenKind::Dot => "`.`",
            TokenKind::QuestionDot => "`?.`",
            TokenKind::QuestionQuestion => "`??`",
            TokenKind::Bang => "`!`",
            TokenKind::Question => "`?`",
            TokenKind::Eq => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::Le => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::Ge => "`>=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Text(String),
    /// The raw source of a `#{...}` segment, parsed later as an expression.
    Interpolation {
        source: String,
        span: Span,
        line: usize,
        column: usize,
    },
}

/// The decoded value carried by literal tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(Vec<StringPart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaKind {
    Line,
    Doc,
}

/// A comment kept alongside the token that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<LiteralValue>,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
    pub trivia: Vec<Trivia>,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Doc comment lines attached to this token, joined with newlines.
    pub fn doc(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .trivia
            .iter()
            .filter(|t| t.kind == TriviaKind::Doc)
            .map(|t| t.text.as_str())
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}
