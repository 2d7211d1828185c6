//! Expression parsing by precedence climbing.
//!
//! Lowest to highest: `=` (right), `??` (right), `||`, `&&`, comparisons
//! (non-associative), `+ -`, `* / %`, prefix `! -`, then postfix access,
//! calls, indexing, unwrap and `rescue`.

use super::{PResult, Parser};
use crate::{
    LiteralValue, Span, StringPart, SyntaxError, TokenKind,
    ast::{
        BinaryOp, Block, Expr, ExprKind, Ident, InterpolationPart, Literal, MatchArm, Pattern,
        UnaryOp,
    },
    lexer::tokenize_fragment,
};

impl Parser {
    pub(crate) fn expr(&mut self) -> PResult<Expr> {
        let lhs = self.coalesce()?;
        if self.check(TokenKind::Eq) {
            self.advance();
            let value = self.expr()?;
            let span = lhs.span.to(value.span);
            return Ok(Expr::new(
                ExprKind::Assign {
                    target: Box::new(lhs),
                    value: Box::new(value),
                },
                span,
            ));
        }
        Ok(lhs)
    }

    /// Parse a standalone expression, requiring the input to end after it.
    pub(crate) fn expr_to_end(&mut self) -> PResult<Expr> {
        let expr = self.expr()?;
        if !self.at_eof() {
            return Err(self.unexpected("end of interpolation"));
        }
        Ok(expr)
    }

    fn coalesce(&mut self) -> PResult<Expr> {
        let lhs = self.binary_level(0)?;
        if self.check(TokenKind::QuestionQuestion) {
            self.advance();
            let rhs = self.coalesce()?;
            return Ok(binary(BinaryOp::Coalesce, lhs, rhs));
        }
        Ok(lhs)
    }

    /// Left-associative binary levels, from `||` down to `* / %`.
    fn binary_level(&mut self, level: usize) -> PResult<Expr> {
        const LEVELS: &[&[(TokenKind, BinaryOp)]] = &[
            &[(TokenKind::OrOr, BinaryOp::Or)],
            &[(TokenKind::AndAnd, BinaryOp::And)],
            &[
                (TokenKind::EqEq, BinaryOp::Eq),
                (TokenKind::NotEq, BinaryOp::NotEq),
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
        ];
        const COMPARISON: usize = 2;

        let Some(ops) = LEVELS.get(level) else {
            return self.unary();
        };
        let find_op = |p: &Self| {
            ops.iter()
                .find(|(kind, _)| p.check(*kind))
                .map(|(_, op)| *op)
        };

        let mut lhs = self.binary_level(level + 1)?;
        while let Some(op) = find_op(self) {
            // A leading `-` on a new line starts a new statement.
            if op == BinaryOp::Sub && self.peek().newline_before {
                break;
            }
            self.advance();
            let rhs = self.binary_level(level + 1)?;
            lhs = binary(op, lhs, rhs);
            if level == COMPARISON && find_op(self).is_some() {
                return Err(self.unexpected("end of comparison (comparisons cannot be chained)"));
            }
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let start = self.advance().span;
        let operand = self.unary()?;
        let span = start.to(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let start_index = self.pos;
        let mut expr = self.primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    let dot_index = self.pos;
                    self.advance();
                    let field = self.ident()?;
                    if self.check_same_line(TokenKind::LParen) {
                        expr = self.dotted_call(expr, field, start_index, dot_index)?;
                    } else {
                        let span = expr.span.to(field.span);
                        expr = Expr::new(
                            ExprKind::FieldAccess {
                                receiver: Box::new(expr),
                                field,
                            },
                            span,
                        );
                    }
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    let mut chain = vec![self.ident()?];
                    while self.check(TokenKind::Dot)
                        && self.nth(1).is(TokenKind::Ident)
                        && !self.nth(2).is(TokenKind::LParen)
                    {
                        self.advance();
                        chain.push(self.ident()?);
                    }
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::SafeNav {
                            receiver: Box::new(expr),
                            chain,
                        },
                        span,
                    );
                }
                TokenKind::LParen if !self.peek().newline_before => {
                    let ExprKind::Identifier(name) = &expr.kind else {
                        return Err(self.unexpected("operator or end of expression"));
                    };
                    let name = Ident::new(name.clone(), expr.span);
                    self.advance();
                    let args = self.comma_list(TokenKind::RParen, |p| p.expr())?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Call {
                            namespace: None,
                            name,
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket if !self.peek().newline_before => {
                    self.advance();
                    let index = self.expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::Bang if !self.peek().newline_before => {
                    self.advance();
                    let span = self.span_from(expr.span);
                    expr = Expr::new(ExprKind::Unwrap(Box::new(expr)), span);
                }
                TokenKind::Rescue => {
                    self.advance();
                    let binding = if self.check(TokenKind::Ident) {
                        Some(self.ident()?)
                    } else {
                        None
                    };
                    let body = self.block()?;
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::Rescue {
                            guarded: Box::new(expr),
                            binding,
                            body,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `Namespace.name(args)`, or a rejected `value.name(args)`.
    fn dotted_call(
        &mut self,
        receiver: Expr,
        name: Ident,
        start_index: usize,
        dot_index: usize,
    ) -> PResult<Expr> {
        let namespace = match &receiver.kind {
            ExprKind::Identifier(ns) if ns.starts_with(|c: char| c.is_ascii_uppercase()) => {
                Some(Ident::new(ns.clone(), receiver.span))
            }
            _ => None,
        };

        self.advance();
        let mut arg_texts = Vec::new();
        let args = self.comma_list(TokenKind::RParen, |p| {
            let from = p.pos;
            let arg = p.expr()?;
            arg_texts.push(p.text_between(from, p.pos));
            Ok(arg)
        })?;
        let span = self.span_from(receiver.span);

        match namespace {
            Some(namespace) => Ok(Expr::new(
                ExprKind::Call {
                    namespace: Some(namespace),
                    name,
                    args,
                },
                span,
            )),
            None => {
                let mut arguments = vec![self.text_between(start_index, dot_index)];
                arguments.extend(arg_texts);
                self.report(SyntaxError::MethodCall {
                    method: name.name,
                    arguments: arguments.join(", "),
                    span,
                });
                Ok(Expr::error(span))
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Int | TokenKind::Float => {
                self.advance();
                match token.literal {
                    Some(LiteralValue::Float(v)) => ExprKind::Literal(Literal::Float(v)),
                    Some(LiteralValue::Int(v)) => ExprKind::Literal(Literal::Int(v)),
                    _ => ExprKind::Error,
                }
            }
            TokenKind::Str => {
                self.advance();
                let parts = match token.literal {
                    Some(LiteralValue::Str(parts)) => parts,
                    _ => Vec::new(),
                };
                self.string_literal(parts)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::Nil => {
                self.advance();
                ExprKind::Literal(Literal::Nil)
            }
            TokenKind::SelfKw => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::Ident => {
                self.advance();
                ExprKind::Identifier(token.lexeme)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(Expr::new(inner.kind, self.span_from(token.span)));
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.comma_list(TokenKind::RBracket, |p| p.expr())?)
            }
            TokenKind::LBrace => {
                self.advance();
                let entries = self.comma_list(TokenKind::RBrace, |p| {
                    let key = p.expr()?;
                    p.expect(TokenKind::Colon)?;
                    let value = p.expr()?;
                    Ok((key, value))
                })?;
                ExprKind::Hash(entries)
            }
            TokenKind::If => return self.if_expr(),
            TokenKind::Match => return self.match_expr(),
            TokenKind::Let => {
                self.advance();
                let name = self.ident()?;
                let ty = if self.eat(TokenKind::Colon).is_some() {
                    Some(self.inner_type()?)
                } else {
                    None
                };
                self.expect(TokenKind::Eq)?;
                let value = self.expr()?;
                ExprKind::Let {
                    name,
                    ty,
                    value: Box::new(value),
                }
            }
            TokenKind::Fail => {
                self.advance();
                ExprKind::Fail(Box::new(self.expr()?))
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, self.span_from(token.span)))
    }

    /// Turn lexed string parts into a literal or an interpolation, parsing
    /// each `#{...}` segment as an expression in place.
    fn string_literal(&mut self, parts: Vec<StringPart>) -> ExprKind {
        if let [StringPart::Text(text)] = parts.as_slice() {
            return ExprKind::Literal(Literal::String(text.clone()));
        }

        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                StringPart::Text(text) => out.push(InterpolationPart::Text(text)),
                StringPart::Interpolation {
                    source,
                    span,
                    line,
                    column,
                } => {
                    let (tokens, lex_errors) =
                        tokenize_fragment(&source, span.start, line, column);
                    self.errors.extend(lex_errors);
                    let mut sub = Parser::new(tokens);
                    let expr = sub.expr_to_end().unwrap_or_else(|err| {
                        sub.report(err);
                        Expr::error(span)
                    });
                    self.errors.extend(sub.into_errors());
                    out.push(InterpolationPart::Expr(expr));
                }
            }
        }
        ExprKind::Interpolated(out)
    }

    fn if_expr(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        let cond = self.expr()?;
        let then_block = self.block()?;
        let else_block = if self.eat(TokenKind::Else).is_some() {
            if self.check(TokenKind::If) {
                let nested = self.if_expr()?;
                Some(Block {
                    span: nested.span,
                    exprs: vec![nested],
                })
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_block,
                else_block,
            },
            self.span_from(start),
        ))
    }

    fn match_expr(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        let scrutinee = self.expr()?;
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let pattern = self.pattern()?;
            self.expect(TokenKind::FatArrow)?;
            let body = if self.check(TokenKind::LBrace) {
                let block = self.block()?;
                let span = block.span;
                Expr::new(ExprKind::Block(block), span)
            } else {
                self.expr()?
            };
            arms.push(MatchArm {
                span: pattern.span().to(body.span),
                pattern,
                body,
            });
            self.eat(TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::new(
            ExprKind::Match {
                scrutinee: Box::new(scrutinee),
                arms,
            },
            self.span_from(start),
        ))
    }

    fn pattern(&mut self) -> PResult<Pattern> {
        let token = self.peek().clone();
        let literal = match (&token.kind, token.literal) {
            (TokenKind::Ident, _) if token.lexeme == "_" => {
                self.advance();
                return Ok(Pattern::Wildcard(token.span));
            }
            (TokenKind::Int, Some(LiteralValue::Int(v))) => Literal::Int(v),
            (TokenKind::Float, Some(LiteralValue::Float(v))) => Literal::Float(v),
            (TokenKind::Str, Some(LiteralValue::Str(parts))) => match parts.as_slice() {
                [StringPart::Text(text)] => Literal::String(text.clone()),
                _ => return Err(self.unexpected("literal pattern")),
            },
            (TokenKind::True, _) => Literal::Bool(true),
            (TokenKind::False, _) => Literal::Bool(false),
            (TokenKind::Nil, _) => Literal::Nil,
            (TokenKind::Minus, _) => {
                self.advance();
                let number = self.peek().clone();
                let literal = match number.literal {
                    Some(LiteralValue::Int(v)) => Literal::Int(-v),
                    Some(LiteralValue::Float(v)) => Literal::Float(-v),
                    _ => return Err(self.unexpected("number")),
                };
                self.advance();
                return Ok(Pattern::Literal(literal, token.span.to(number.span)));
            }
            _ => return Err(self.unexpected("pattern")),
        };
        self.advance();
        Ok(Pattern::Literal(literal, token.span))
    }

    /// `{ expr* }`, recovering from bad statements with placeholders.
    pub(super) fn block(&mut self) -> PResult<Block> {
        let open = self.expect(TokenKind::LBrace)?;
        let mut exprs = Vec::new();
        loop {
            if self.check(TokenKind::RBrace) {
                self.advance();
                break;
            }
            if self.at_eof() || self.check(TokenKind::Resource) {
                return Err(self.unexpected("`}`"));
            }
            let start = self.pos;
            let start_span = self.peek().span;
            match self.expr() {
                Ok(expr) => {
                    exprs.push(expr);
                    self.eat(TokenKind::Semicolon);
                }
                Err(err) => {
                    self.report(err);
                    self.synchronize_statement(start);
                    exprs.push(Expr::error(self.span_from(start_span)));
                }
            }
        }
        Ok(Block {
            exprs,
            span: self.span_from(open.span),
        })
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span: Span = lhs.span.to(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}
