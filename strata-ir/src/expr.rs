//! Typed expressions.
//!
//! Produced by the type checker from syntax expressions. Every node carries
//! its resolved [`Ty`]; narrowing and coercions are explicit nodes so a
//! backend never has to re-derive nullability.

use crate::Ty;

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TExpr,
    pub ty: Ty,
}

impl TypedExpr {
    pub fn new(kind: TExpr, ty: Ty) -> Self {
        Self { kind, ty }
    }

    pub fn error() -> Self {
        Self::new(TExpr::Error, Ty::error())
    }

    /// Returns true if evaluating this expression can fail, which requires a
    /// fallible context in generated code.
    pub fn is_fallible(&self) -> bool {
        let mut fallible = false;
        self.walk(&mut |e| {
            fallible |= match &e.kind {
                TExpr::Call {
                    fallible: can_fail, ..
                } => *can_fail,
                TExpr::Field { access, .. } => access.is_navigation(),
                TExpr::Unwrap(_) | TExpr::Fail(_) => true,
                _ => false,
            };
        });
        fallible
    }

    /// Visit this node and its descendants in evaluation order, without
    /// descending into `rescue` guards (their failures are handled).
    pub fn walk(&self, f: &mut impl FnMut(&TypedExpr)) {
        f(self);
        match &self.kind {
            TExpr::Literal(_)
            | TExpr::EnumValue { .. }
            | TExpr::Local(_)
            | TExpr::SelfRef
            | TExpr::Error => {}
            TExpr::Field { receiver, .. } => receiver.walk(f),
            TExpr::SafeNav { receiver, body, .. } => {
                receiver.walk(f);
                body.walk(f);
            }
            TExpr::Binary { lhs, rhs, .. } | TExpr::Coalesce { lhs, rhs } => {
                lhs.walk(f);
                rhs.walk(f);
            }
            TExpr::Unary { operand, .. } => operand.walk(f),
            TExpr::Call { args, .. } => args.iter().for_each(|a| a.walk(f)),
            TExpr::If {
                cond,
                then_block,
                else_block,
            } => {
                cond.walk(f);
                then_block.walk(f);
                if let Some(block) = else_block {
                    block.walk(f);
                }
            }
            TExpr::Match { scrutinee, arms } => {
                scrutinee.walk(f);
                arms.iter().for_each(|arm| arm.body.walk(f));
            }
            TExpr::Let { value, .. } | TExpr::Assign { value, .. } => value.walk(f),
            TExpr::Interpolation(segments) => {
                for segment in segments {
                    if let InterpolationSegment::Expr(e) = segment {
                        e.walk(f);
                    }
                }
            }
            TExpr::Unwrap(inner) | TExpr::Fail(inner) | TExpr::Lift(inner) => inner.walk(f),
            TExpr::Rescue { body, .. } => body.walk(f),
            TExpr::Array(items) => items.iter().for_each(|i| i.walk(f)),
            TExpr::Hash(entries) => {
                for (k, v) in entries {
                    k.walk(f);
                    v.walk(f);
                }
            }
            TExpr::Index { target, index } => {
                target.walk(f);
                index.walk(f);
            }
            TExpr::Block(block) => block.walk(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TExpr {
    Literal(Lit),
    EnumValue {
        enum_name: String,
        value: String,
    },
    Local(String),
    SelfRef,
    Field {
        receiver: Box<TypedExpr>,
        name: String,
        access: FieldAccess,
    },
    /// Evaluates `body` with `binding` bound to the non-null receiver;
    /// yields nil without evaluating `body` when the receiver is nil.
    SafeNav {
        receiver: Box<TypedExpr>,
        binding: String,
        body: Box<TypedExpr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Unary {
        op: UnOp,
        operand: Box<TypedExpr>,
    },
    /// `lhs ?? rhs`; `rhs` is evaluated only when `lhs` is nil.
    Coalesce {
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Call {
        callee: Callee,
        args: Vec<TypedExpr>,
        fallible: bool,
    },
    If {
        cond: Box<TypedExpr>,
        then_block: Block,
        else_block: Option<Block>,
    },
    Match {
        scrutinee: Box<TypedExpr>,
        arms: Vec<MatchArm>,
    },
    Let {
        name: String,
        value: Box<TypedExpr>,
    },
    Assign {
        target: AssignTarget,
        value: Box<TypedExpr>,
    },
    Interpolation(Vec<InterpolationSegment>),
    /// Yields the value of a nullable expression or fails.
    Unwrap(Box<TypedExpr>),
    /// Evaluates `body` only when `guarded` fails; `binding` names the
    /// failure message.
    Rescue {
        guarded: Box<TypedExpr>,
        binding: Option<String>,
        body: Block,
    },
    Array(Vec<TypedExpr>),
    Hash(Vec<(TypedExpr, TypedExpr)>),
    Index {
        target: Box<TypedExpr>,
        index: Box<TypedExpr>,
    },
    Block(Block),
    Fail(Box<TypedExpr>),
    /// Wraps a non-null value where a nullable one is expected.
    Lift(Box<TypedExpr>),
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Nil,
}

/// How a field access resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAccess {
    /// A stored column on a resource.
    Column,
    /// A `@computed` accessor.
    Computed,
    /// Loads the referenced record through its foreign key.
    BelongsTo { target: String, foreign_key: String },
    /// Loads the records whose foreign key points back at the receiver.
    HasMany {
        target: String,
        foreign_key: String,
        owner_key: String,
    },
    /// A member of an inline struct value.
    StructField,
}

impl FieldAccess {
    /// Relationship navigation needs storage access and can fail.
    pub fn is_navigation(&self) -> bool {
        matches!(self, FieldAccess::BelongsTo { .. } | FieldAccess::HasMany { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Stdlib { namespace: String, name: String },
    /// A `@function` declared on `resource`.
    Function { resource: String, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub body: TypedExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchPattern {
    Literal(Lit),
    EnumValue { enum_name: String, value: String },
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    /// `self.<field>`, only inside hooks.
    SelfField(String),
    Local(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationSegment {
    Text(String),
    Expr(TypedExpr),
}

/// A sequence of expressions whose value is the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<TypedExpr>,
    pub ty: Ty,
}

impl Block {
    pub fn new(stmts: Vec<TypedExpr>, ty: Ty) -> Self {
        Self { stmts, ty }
    }

    pub fn walk(&self, f: &mut impl FnMut(&TypedExpr)) {
        self.stmts.iter().for_each(|s| s.walk(f));
    }

    pub fn is_fallible(&self) -> bool {
        self.stmts.iter().any(TypedExpr::is_fallible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(fallible: bool) -> TypedExpr {
        TypedExpr::new(
            TExpr::Call {
                callee: Callee::Stdlib {
                    namespace: "Json".into(),
                    name: "parse".into(),
                },
                args: vec![],
                fallible,
            },
            Ty::error(),
        )
    }

    #[test]
    fn test_fallible_calls_propagate_through_nodes() {
        let expr = TypedExpr::new(
            TExpr::Let {
                name: "x".into(),
                value: Box::new(call(true)),
            },
            Ty::unit(),
        );
        assert!(expr.is_fallible());
        assert!(!call(false).is_fallible());
    }

    #[test]
    fn test_rescue_handles_guarded_failure() {
        let expr = TypedExpr::new(
            TExpr::Rescue {
                guarded: Box::new(call(true)),
                binding: None,
                body: Block::new(vec![], Ty::unit()),
            },
            Ty::unit(),
        );
        assert!(!expr.is_fallible());
    }
}
