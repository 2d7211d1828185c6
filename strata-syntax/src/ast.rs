//! Syntax tree for `.strata` sources.
//!
//! The tree is data only. A [`Program`] owns every node beneath it, and
//! resources refer to each other by name, never by pointer.

use strata_core::Primitive;

use crate::Span;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: Ident,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    pub hooks: Vec<Hook>,
    pub constraints: Vec<Constraint>,
    pub computed: Vec<Computed>,
    pub functions: Vec<Function>,
    pub validations: Vec<Validation>,
    /// Resource-level annotations other than the dedicated members above,
    /// such as `@middleware(auth)`.
    pub annotations: Vec<Annotation>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    /// Field annotations except `@default`, in source order.
    pub annotations: Vec<Annotation>,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    /// `None` only where the marker was missing and already reported, or on
    /// element types where it defaults to required.
    pub nullability: Option<Nullability>,
    pub span: Span,
}

impl TypeExpr {
    pub fn is_optional(&self) -> bool {
        self.nullability == Some(Nullability::Optional)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Primitive(Primitive),
    /// A name that is not a primitive; resolved against declared resources.
    Resource(String),
    Array(Box<TypeExpr>),
    Hash(Box<TypeExpr>, Box<TypeExpr>),
    Enum(Vec<Ident>),
    Struct(Vec<Field>),
    /// Placeholder left by error recovery.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

impl HookTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookTiming::Before => "before",
            HookTiming::After => "after",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
    pub timing: HookTiming,
    /// Event name as written; checked against the known events later.
    pub event: Ident,
    pub transactional: bool,
    pub is_async: bool,
    /// Every modifier as written, for validation.
    pub modifiers: Vec<Ident>,
    pub body: Block,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: Ident,
    pub entries: Vec<ConstraintEntry>,
    pub doc: Option<String>,
    pub span: Span,
}

impl Constraint {
    pub fn entry(&self, key: &str) -> Option<&ConstraintEntry> {
        self.entries.iter().find(|e| e.key.name == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintEntry {
    pub key: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    pub name: Ident,
    pub ty: TypeExpr,
    pub body: Block,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    pub body: Block,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub name: Option<Ident>,
    pub body: Block,
    pub span: Span,
}

/// A braced sequence of expressions; its value is the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Interpolated(Vec<InterpolationPart>),
    Identifier(String),
    SelfRef,
    FieldAccess {
        receiver: Box<Expr>,
        field: Ident,
    },
    /// `receiver?.a.b`: the whole chain yields nil when `receiver` is nil.
    SafeNav {
        receiver: Box<Expr>,
        chain: Vec<Ident>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `Namespace.name(args)`, or a bare `name(args)` when `namespace` is `None`.
    Call {
        namespace: Option<Ident>,
        name: Ident,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unwrap(Box<Expr>),
    Rescue {
        guarded: Box<Expr>,
        binding: Option<Ident>,
        body: Block,
    },
    If {
        cond: Box<Expr>,
        then_block: Block,
        else_block: Option<Block>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Let {
        name: Ident,
        ty: Option<TypeExpr>,
        value: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    Block(Block),
    Fail(Box<Expr>),
    /// Placeholder left by error recovery.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
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
    Coalesce,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(Literal, Span),
    Wildcard(Span),
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Literal(_, span) | Pattern::Wildcard(span) => *span,
        }
    }
}

impl TypeExpr {
    fn fmt_inner(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.is_optional() {
            f.write_str("?")?;
        }
        Ok(())
    }
}

/// Renders the type as it would be written in source, with its marker.
impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        match self.nullability {
            Some(Nullability::Required) => f.write_str("!"),
            Some(Nullability::Optional) => f.write_str("?"),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for TypeExprKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExprKind::Primitive(p) => write!(f, "{p}"),
            TypeExprKind::Resource(name) => f.write_str(name),
            TypeExprKind::Array(elem) => {
                f.write_str("array<")?;
                elem.fmt_inner(f)?;
                f.write_str(">")
            }
            TypeExprKind::Hash(key, value) => {
                f.write_str("hash<")?;
                key.fmt_inner(f)?;
                f.write_str(", ")?;
                value.fmt_inner(f)?;
                f.write_str(">")
            }
            TypeExprKind::Enum(values) => {
                let values: Vec<String> = values.iter().map(|v| format!("{:?}", v.name)).collect();
                write!(f, "enum[{}]", values.join(", "))
            }
            TypeExprKind::Struct(fields) => {
                f.write_str("{")?;
                for field in fields {
                    write!(f, " {}: {}", field.name.name, field.ty)?;
                }
                f.write_str(" }")
            }
            TypeExprKind::Error => f.write_str("<error>"),
        }
    }
}
