use strata_core::Primitive;

use super::{PResult, Parser};
use crate::{
    SyntaxError, TokenKind,
    ast::{Ident, Nullability, TypeExpr, TypeExprKind},
};

impl Parser {
    /// A type that must carry a nullability marker, as on fields and
    /// signatures. A missing marker is reported but does not fail the parse.
    pub(super) fn marked_type(&mut self, owner: &Ident) -> PResult<TypeExpr> {
        let mut ty = self.base_type()?;
        ty.nullability = self.marker();
        if ty.nullability.is_none() {
            self.report(SyntaxError::MissingNullability {
                field: owner.name.clone(),
                span: owner.span.to(ty.span),
                suggestion: format!("{}: {}!", owner.name, ty),
            });
        } else {
            ty.span = self.span_from(ty.span);
        }
        Ok(ty)
    }

    /// A nested type, where an omitted marker means required.
    pub(super) fn inner_type(&mut self) -> PResult<TypeExpr> {
        let mut ty = self.base_type()?;
        ty.nullability = Some(self.marker().unwrap_or(Nullability::Required));
        ty.span = self.span_from(ty.span);
        Ok(ty)
    }

    fn marker(&mut self) -> Option<Nullability> {
        if self.check_same_line(TokenKind::Bang) {
            self.advance();
            Some(Nullability::Required)
        } else if self.check_same_line(TokenKind::Question) {
            self.advance();
            Some(Nullability::Optional)
        } else {
            None
        }
    }

    fn base_type(&mut self) -> PResult<TypeExpr> {
        let start = self.peek().span;
        let kind = match self.peek().kind {
            TokenKind::Ident => {
                let name = self.advance().lexeme;
                match name.as_str() {
                    "array" if self.check(TokenKind::Lt) => {
                        self.advance();
                        let elem = self.inner_type()?;
                        self.expect(TokenKind::Gt)?;
                        TypeExprKind::Array(Box::new(elem))
                    }
                    "hash" if self.check(TokenKind::Lt) => {
                        self.advance();
                        let key = self.inner_type()?;
                        self.expect(TokenKind::Comma)?;
                        let value = self.inner_type()?;
                        self.expect(TokenKind::Gt)?;
                        TypeExprKind::Hash(Box::new(key), Box::new(value))
                    }
                    "enum" if self.check(TokenKind::LBracket) => {
                        self.advance();
                        let values = self.comma_list(TokenKind::RBracket, |p| {
                            let token = p.expect(TokenKind::Str)?;
                            let value = token.lexeme.trim_matches('"').to_string();
                            Ok(Ident::new(value, token.span))
                        })?;
                        TypeExprKind::Enum(values)
                    }
                    _ => match Primitive::from_name(&name) {
                        Some(primitive) => TypeExprKind::Primitive(primitive),
                        None => TypeExprKind::Resource(name),
                    },
                }
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.check(TokenKind::RBrace) && !self.at_eof() {
                    let doc = self.peek().doc();
                    fields.push(self.field(doc)?);
                    self.eat(TokenKind::Comma);
                }
                self.expect(TokenKind::RBrace)?;
                TypeExprKind::Struct(fields)
            }
            _ => return Err(self.unexpected("type")),
        };
        Ok(TypeExpr {
            kind,
            nullability: None,
            span: self.span_from(start),
        })
    }
}
