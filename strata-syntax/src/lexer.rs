//! Source text to token stream.
//!
//! The lexer never fails: unrecognized characters become [`TokenKind::Error`]
//! tokens, malformed literals are reported and still produce a token, and the
//! stream always ends with [`TokenKind::Eof`].

use crate::{
    LiteralValue, Span, StringPart, SyntaxError, Token, TokenKind, Trivia, TriviaKind,
};

/// Tokenize a whole source file.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    Lexer::new(source, 0, 1, 1).run()
}

/// Tokenize a fragment embedded at `offset` (line/column of its first
/// character) in a larger file, as with `#{...}` interpolations.
pub fn tokenize_fragment(
    source: &str,
    offset: usize,
    line: usize,
    column: usize,
) -> (Vec<Token>, Vec<SyntaxError>) {
    Lexer::new(source, offset, line, column).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    base: usize,
    line: usize,
    column: usize,
    newline_before: bool,
    trivia: Vec<Trivia>,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, base: usize, line: usize, column: usize) -> Self {
        Self {
            src,
            pos: 0,
            base,
            line,
            column,
            newline_before: false,
            trivia: Vec::new(),
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<SyntaxError>) {
        loop {
            self.skip_trivia();
            let start = self.pos;
            let (line, column) = (self.line, self.column);
            let Some(c) = self.bump() else {
                self.push(TokenKind::Eof, start, line, column, None);
                break;
            };

            let kind = match c {
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semicolon,
                '@' => TokenKind::At,
                '.' => TokenKind::Dot,
                '+' => TokenKind::Plus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '-' if self.eat('>') => TokenKind::Arrow,
                '-' => TokenKind::Minus,
                '=' if self.eat('=') => TokenKind::EqEq,
                '=' if self.eat('>') => TokenKind::FatArrow,
                '=' => TokenKind::Eq,
                '!' if self.eat('=') => TokenKind::NotEq,
                '!' => TokenKind::Bang,
                '?' if self.eat('.') => TokenKind::QuestionDot,
                '?' if self.eat('?') => TokenKind::QuestionQuestion,
                '?' => TokenKind::Question,
                '<' if self.eat('=') => TokenKind::Le,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::Ge,
                '>' => TokenKind::Gt,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                '"' => {
                    let parts = self.string(start);
                    self.push(
                        TokenKind::Str,
                        start,
                        line,
                        column,
                        Some(LiteralValue::Str(parts)),
                    );
                    continue;
                }
                c if c.is_ascii_digit() => {
                    let (kind, literal) = self.number(start);
                    self.push(kind, start, line, column, Some(literal));
                    continue;
                }
                c if c.is_alphabetic() || c == '_' => {
                    self.eat_while(|c| c.is_alphanumeric() || c == '_');
                    let kind =
                        TokenKind::keyword(&self.src[start..self.pos]).unwrap_or(TokenKind::Ident);
                    self.push(kind, start, line, column, None);
                    continue;
                }
                ch => {
                    self.errors.push(SyntaxError::UnexpectedCharacter {
                        ch,
                        span: self.span_from(start),
                    });
                    TokenKind::Error
                }
            };
            self.push(kind, start, line, column, None);
        }
        (self.tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.src[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.base + start, self.base + self.pos)
    }

    fn push(
        &mut self,
        kind: TokenKind,
        start: usize,
        line: usize,
        column: usize,
        literal: Option<LiteralValue>,
    ) {
        self.tokens.push(Token {
            kind,
            lexeme: self.src[start..self.pos].to_string(),
            literal,
            span: self.span_from(start),
            line,
            column,
            newline_before: std::mem::take(&mut self.newline_before),
            trivia: std::mem::take(&mut self.trivia),
        });
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.newline_before = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    let start = self.pos;
                    self.eat_while(|c| c != '\n');
                    let raw = &self.src[start..self.pos];
                    let (kind, text) = match raw.strip_prefix("///") {
                        Some(rest) if !rest.starts_with('/') => (TriviaKind::Doc, rest),
                        _ => (TriviaKind::Line, &raw[2..]),
                    };
                    self.trivia.push(Trivia {
                        kind,
                        text: text.strip_prefix(' ').unwrap_or(text).trim_end().to_string(),
                        span: self.span_from(start),
                    });
                }
                _ => return,
            }
        }
    }

    fn number(&mut self, start: usize) -> (TokenKind, LiteralValue) {
        self.eat_while(|c| c.is_ascii_digit() || c == '_');
        let is_float = self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
        }

        let digits: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let parsed = if is_float {
            digits.parse::<f64>().ok().map(|v| (TokenKind::Float, LiteralValue::Float(v)))
        } else {
            digits.parse::<i64>().ok().map(|v| (TokenKind::Int, LiteralValue::Int(v)))
        };

        parsed.unwrap_or_else(|| {
            self.errors.push(SyntaxError::InvalidNumber {
                lexeme: self.src[start..self.pos].to_string(),
                span: self.span_from(start),
            });
            (TokenKind::Int, LiteralValue::Int(0))
        })
    }

    /// Scan a string literal after its opening quote.
    fn string(&mut self, start: usize) -> Vec<StringPart> {
        let mut parts = Vec::new();
        let mut text = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.errors.push(SyntaxError::UnterminatedString {
                        span: self.span_from(start),
                    });
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('0') => text.push('\0'),
                        Some(c) => text.push(c),
                        None => {}
                    }
                }
                Some('#') if self.peek_second() == Some('{') => {
                    if !text.is_empty() {
                        parts.push(StringPart::Text(std::mem::take(&mut text)));
                    }
                    let marker = self.pos;
                    self.bump();
                    self.bump();
                    match self.interpolation(marker) {
                        Some(part) => parts.push(part),
                        None => break,
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }

        if !text.is_empty() || parts.is_empty() {
            parts.push(StringPart::Text(text));
        }
        parts
    }

    /// Capture the raw source of a `#{...}` segment up to its matching brace.
    fn interpolation(&mut self, marker: usize) -> Option<StringPart> {
        let body_start = self.pos;
        let (line, column) = (self.line, self.column);
        let mut depth = 0usize;
        let mut in_string = false;

        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.errors.push(SyntaxError::UnterminatedInterpolation {
                        span: self.span_from(marker),
                    });
                    return None;
                }
                Some('"') if !in_string && depth == 0 && self.closes_literal() => {
                    self.errors.push(SyntaxError::UnterminatedInterpolation {
                        span: self.span_from(marker),
                    });
                    self.bump();
                    return None;
                }
                Some('"') => in_string = !in_string,
                Some('\\') if in_string => {
                    self.bump();
                }
                Some('{') if !in_string => depth += 1,
                Some('}') if !in_string && depth == 0 => {
                    let source = self.src[body_start..self.pos].to_string();
                    let span = self.span_from(body_start);
                    self.bump();
                    return Some(StringPart::Interpolation {
                        source,
                        span,
                        line,
                        column,
                    });
                }
                Some('}') if !in_string => depth -= 1,
                Some(_) => {}
            }
            self.bump();
        }
    }

    /// Whether the `"` at the cursor is the last quote on its line, meaning
    /// it closes the enclosing literal rather than opening a nested one.
    fn closes_literal(&self) -> bool {
        let rest = &self.src[self.pos + 1..];
        let line = rest.split('\n').next().unwrap_or("");
        !line.contains('"')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_nullability_markers_are_distinct_tokens() {
        assert_eq!(
            kinds("title: string! bio: text?"),
            vec![
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Bang,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Question,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a?.b ?? c != d -> => <= >= && ||"),
            vec![
                TokenKind::Ident,
                TokenKind::QuestionDot,
                TokenKind::Ident,
                TokenKind::QuestionQuestion,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_dotted_call_is_three_tokens() {
        assert_eq!(
            kinds("String.upcase"),
            vec![TokenKind::Ident, TokenKind::Dot, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unknown_character_produces_error_token_and_continues() {
        let (tokens, errors) = tokenize("a $ b");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Ident, TokenKind::Error, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unexpected_character");
        assert_eq!(errors[0].span(), Span::new(2, 3));
    }

    #[test]
    fn test_numbers() {
        let (tokens, errors) = tokenize("42 3.25 1_000 7.x");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, Some(LiteralValue::Int(42)));
        assert_eq!(tokens[1].literal, Some(LiteralValue::Float(3.25)));
        assert_eq!(tokens[2].literal, Some(LiteralValue::Int(1000)));
        assert_eq!(tokens[3].kind, TokenKind::Int);
        assert_eq!(tokens[4].kind, TokenKind::Dot);
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let (_, errors) = tokenize("99999999999999999999");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "invalid_number");
    }

    #[test]
    fn test_string_interpolation_parts() {
        let (tokens, errors) = tokenize(r#""Hello #{self.name}!""#);
        assert!(errors.is_empty());
        let Some(LiteralValue::Str(parts)) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], StringPart::Text("Hello ".into()));
        match &parts[1] {
            StringPart::Interpolation { source, span, column, .. } => {
                assert_eq!(source, "self.name");
                assert_eq!(*span, Span::new(9, 18));
                assert_eq!(*column, 10);
            }
            other => panic!("unexpected part {other:?}"),
        }
        assert_eq!(parts[2], StringPart::Text("!".into()));
    }

    #[test]
    fn test_interpolation_with_nested_string() {
        let (tokens, errors) = tokenize(r##""#{a ?? "none"} left""##);
        assert!(errors.is_empty());
        let Some(LiteralValue::Str(parts)) = &tokens[0].literal else {
            panic!("expected string literal");
        };
        assert!(matches!(&parts[0], StringPart::Interpolation { source, .. } if source == r#"a ?? "none""#));
    }

    #[test]
    fn test_unterminated_string_stops_at_line_end() {
        let (tokens, errors) = tokenize("\"abc\nname");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unterminated_string");
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_unterminated_interpolation() {
        let (_, errors) = tokenize(r#""a #{b""#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unterminated_interpolation");
    }

    #[test]
    fn test_doc_comments_attach_to_next_token() {
        let (tokens, _) = tokenize("// note\n/// A blog post.\n/// Second line.\nresource Post {}");
        let resource = &tokens[0];
        assert_eq!(resource.kind, TokenKind::Resource);
        assert_eq!(resource.trivia.len(), 3);
        assert_eq!(resource.doc().as_deref(), Some("A blog post.\nSecond line."));
        assert!(resource.newline_before);
    }

    #[test]
    fn test_positions() {
        let (tokens, _) = tokenize("resource Post {\n  id: uuid!\n}");
        let id = &tokens[3];
        assert_eq!(id.lexeme, "id");
        assert_eq!((id.line, id.column), (2, 3));
        assert_eq!(id.span, Span::new(18, 20));
    }

    #[test]
    fn test_fragment_offsets() {
        let (tokens, _) = tokenize_fragment("a.b", 100, 4, 7);
        assert_eq!(tokens[2].span, Span::new(102, 103));
        assert_eq!((tokens[2].line, tokens[2].column), (4, 9));
    }
}
