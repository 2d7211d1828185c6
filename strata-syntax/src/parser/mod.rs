//! Recursive-descent parser with panic-mode recovery.
//!
//! Errors never abort the parse. A malformed member is reported, the parser
//! skips to the next synchronization point (a field or annotation starting a
//! new line, or the closing brace of the resource) and carries on, leaving
//! placeholder nodes where statements could not be built.

mod expr;
mod types;

use crate::{
    Program, Resource, Span, SyntaxError, Token, TokenKind,
    ast::{
        Annotation, Computed, Constraint, ConstraintEntry, Field, Function, Hook, HookTiming,
        Ident, Param, Validation,
    },
};

type PResult<T> = Result<T, SyntaxError>;

/// Parse a token stream into a [`Program`], collecting every syntax error.
pub fn parse(tokens: Vec<Token>) -> (Program, Vec<SyntaxError>) {
    let mut parser = Parser::new(tokens);
    let program = parser.program();
    (program, parser.errors)
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        let mut filtered: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut pending_newline = false;
        for mut token in tokens {
            if token.is(TokenKind::Error) {
                pending_newline |= token.newline_before;
                continue;
            }
            token.newline_before |= std::mem::take(&mut pending_newline);
            filtered.push(token);
        }
        if !filtered.last().is_some_and(|t| t.is(TokenKind::Eof)) {
            let end = filtered.last().map_or(0, |t| t.span.end);
            filtered.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                literal: None,
                span: Span::new(end, end),
                line: filtered.last().map_or(1, |t| t.line),
                column: filtered.last().map_or(1, |t| t.column),
                newline_before: false,
                trivia: Vec::new(),
            });
        }
        Self {
            tokens: filtered,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn into_errors(self) -> Vec<SyntaxError> {
        self.errors
    }

    // Token navigation

    fn peek(&self) -> &Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is(kind)
    }

    /// Like [`Parser::check`], but only when the token continues the current line.
    fn check_same_line(&self, kind: TokenKind) -> bool {
        self.check(kind) && !self.peek().newline_before
    }

    fn at_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.check(kind).then(|| self.advance())
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn ident(&mut self) -> PResult<Ident> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Ident::new(token.lexeme, token.span))
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Ident => format!("`{}`", token.lexeme),
            kind => kind.describe().to_string(),
        };
        SyntaxError::unexpected(expected, found, token.span)
    }

    fn report(&mut self, error: SyntaxError) {
        self.errors.push(error);
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .map_or(self.peek().span, |i| self.tokens[i].span)
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.prev_span())
    }

    /// Reconstruct source text for the tokens in `from..to`.
    fn text_between(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        let mut prev_end = None;
        for token in &self.tokens[from..to.min(self.tokens.len())] {
            if prev_end.is_some_and(|end| end < token.span.start) {
                out.push(' ');
            }
            out.push_str(&token.lexeme);
            prev_end = Some(token.span.end);
        }
        out
    }

    // Recovery

    /// Skip to the next field, annotation or closing brace of the resource.
    fn synchronize_member(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof | TokenKind::Resource => return,
                TokenKind::Ident | TokenKind::At if depth == 0 && token.newline_before => return,
                TokenKind::RBrace if depth == 0 => return,
                TokenKind::RBrace => depth -= 1,
                TokenKind::LBrace => depth += 1,
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the start of the next statement in a block.
    fn synchronize_statement(&mut self, start: usize) {
        if self.pos == start {
            self.advance();
        }
        let mut depth = 0usize;
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof | TokenKind::Resource => return,
                TokenKind::RBrace if depth == 0 => return,
                _ if depth == 0 && token.newline_before => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
    }

    // Declarations

    fn program(&mut self) -> Program {
        let mut program = Program::default();
        while !self.at_eof() {
            if self.check(TokenKind::Resource) {
                match self.resource() {
                    Ok(resource) => program.resources.push(resource),
                    Err(err) => {
                        self.report(err);
                        self.skip_to_resource();
                    }
                }
            } else {
                let err = self.unexpected("`resource`");
                self.report(err);
                self.advance();
                self.skip_to_resource();
            }
        }
        program
    }

    fn skip_to_resource(&mut self) {
        while !self.at_eof() && !self.check(TokenKind::Resource) {
            self.advance();
        }
    }

    fn resource(&mut self) -> PResult<Resource> {
        let keyword = self.advance();
        let name = self.ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut resource = Resource {
            name,
            doc: keyword.doc(),
            fields: Vec::new(),
            hooks: Vec::new(),
            constraints: Vec::new(),
            computed: Vec::new(),
            functions: Vec::new(),
            validations: Vec::new(),
            annotations: Vec::new(),
            span: keyword.span,
        };

        loop {
            if self.eat(TokenKind::RBrace).is_some() {
                break;
            }
            if self.at_eof() || self.check(TokenKind::Resource) {
                let err = self.unexpected("`}`");
                self.report(err);
                break;
            }
            let start = self.pos;
            if let Err(err) = self.member(&mut resource) {
                self.report(err);
                self.synchronize_member(start);
            }
        }

        resource.span = self.span_from(keyword.span);
        Ok(resource)
    }

    fn member(&mut self, resource: &mut Resource) -> PResult<()> {
        let doc = self.peek().doc();
        match self.peek().kind {
            TokenKind::Ident => {
                let field = self.field(doc)?;
                resource.fields.push(field);
            }
            TokenKind::At => {
                let at = self.advance();
                let name = self.ident()?;
                match name.name.as_str() {
                    "before" => resource.hooks.push(self.hook(HookTiming::Before, at.span, doc)?),
                    "after" => resource.hooks.push(self.hook(HookTiming::After, at.span, doc)?),
                    "constraint" => resource.constraints.push(self.constraint(at.span, doc)?),
                    "computed" => resource.computed.push(self.computed(at.span, doc)?),
                    "function" => resource.functions.push(self.function(at.span, doc)?),
                    "validate" => resource.validations.push(self.validation(at.span)?),
                    _ => {
                        let args = self.annotation_args()?;
                        resource.annotations.push(Annotation {
                            name,
                            args,
                            span: self.span_from(at.span),
                        });
                    }
                }
            }
            _ => return Err(self.unexpected("field or annotation")),
        }
        Ok(())
    }

    fn field(&mut self, doc: Option<String>) -> PResult<Field> {
        let name = self.ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.marked_type(&name)?;

        let mut default = None;
        let mut annotations = Vec::new();
        while self.check_same_line(TokenKind::At) {
            let at = self.advance();
            let ann_name = self.ident()?;
            let args = self.annotation_args()?;
            let span = self.span_from(at.span);
            if ann_name.name == "default" && args.len() == 1 && default.is_none() {
                default = args.into_iter().next();
            } else {
                annotations.push(Annotation {
                    name: ann_name,
                    args,
                    span,
                });
            }
        }

        Ok(Field {
            span: self.span_from(name.span),
            name,
            ty,
            default,
            annotations,
            doc,
        })
    }

    fn annotation_args(&mut self) -> PResult<Vec<crate::Expr>> {
        if !self.check_same_line(TokenKind::LParen) {
            return Ok(Vec::new());
        }
        self.advance();
        self.comma_list(TokenKind::RParen, |p| p.expr())
    }

    /// Parse `item (',' item)* ','?` up to and including `close`.
    fn comma_list<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(item(self)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn hook(&mut self, timing: HookTiming, start: Span, doc: Option<String>) -> PResult<Hook> {
        let event = self.ident()?;
        let mut modifiers = Vec::new();
        while self.eat(TokenKind::At).is_some() {
            modifiers.push(self.ident()?);
        }
        let body = self.block()?;
        Ok(Hook {
            timing,
            transactional: modifiers.iter().any(|m| m.name == "transaction"),
            is_async: modifiers.iter().any(|m| m.name == "async"),
            event,
            modifiers,
            body,
            doc,
            span: self.span_from(start),
        })
    }

    fn constraint(&mut self, start: Span, doc: Option<String>) -> PResult<Constraint> {
        let name = self.ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let key = self.ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.expr()?;
            entries.push(ConstraintEntry { key, value });
            self.eat(TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Constraint {
            name,
            entries,
            doc,
            span: self.span_from(start),
        })
    }

    fn computed(&mut self, start: Span, doc: Option<String>) -> PResult<Computed> {
        let name = self.ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.marked_type(&name)?;
        let body = self.block()?;
        Ok(Computed {
            name,
            ty,
            body,
            doc,
            span: self.span_from(start),
        })
    }

    fn function(&mut self, start: Span, doc: Option<String>) -> PResult<Function> {
        let name = self.ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.comma_list(TokenKind::RParen, |p| {
            let name = p.ident()?;
            p.expect(TokenKind::Colon)?;
            let ty = p.marked_type(&name)?;
            Ok(Param { name, ty })
        })?;
        self.expect(TokenKind::Arrow)?;
        let ret = self.marked_type(&name)?;
        let body = self.block()?;
        Ok(Function {
            name,
            params,
            ret,
            body,
            doc,
            span: self.span_from(start),
        })
    }

    fn validation(&mut self, start: Span) -> PResult<Validation> {
        let name = if self.check(TokenKind::Ident) {
            Some(self.ident()?)
        } else {
            None
        };
        let body = self.block()?;
        Ok(Validation {
            name,
            body,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests;
