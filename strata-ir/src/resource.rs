//! Checked resource declarations.

use crate::{Block, EnumTy, StructTy, Ty, TypedExpr};

/// A fully checked resource, ready for code generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIr {
    pub name: String,
    pub doc: Option<String>,
    /// Storage table name (snake case, plural).
    pub table: String,
    /// Name of the `@primary` field, if any.
    pub primary_key: Option<String>,
    /// Stored columns in declaration order, including foreign keys.
    pub fields: Vec<FieldIr>,
    pub relationships: Vec<RelationshipIr>,
    pub hooks: Vec<HookIr>,
    pub computed: Vec<ComputedIr>,
    pub functions: Vec<FunctionIr>,
    pub constraints: Vec<ConstraintIr>,
    pub validations: Vec<ValidationIr>,
    pub middleware: Vec<String>,
    /// Named enums declared by this resource's fields.
    pub enums: Vec<EnumTy>,
    /// Named records declared by this resource's inline struct fields.
    pub structs: Vec<StructTy>,
}

impl ResourceIr {
    pub fn field(&self, name: &str) -> Option<&FieldIr> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_field(&self) -> Option<&FieldIr> {
        self.primary_key.as_deref().and_then(|pk| self.field(pk))
    }

    /// Hooks that run for `op` at `timing`, in declaration order.
    pub fn hooks_for(&self, timing: HookTiming, op: Operation) -> impl Iterator<Item = &HookIr> {
        self.hooks
            .iter()
            .filter(move |h| h.timing == timing && h.event.applies_to(op))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldIr {
    pub name: String,
    pub ty: Ty,
    pub doc: Option<String>,
    pub origin: FieldOrigin,
    pub primary: bool,
    /// Value assigned by storage on insert (`@auto`).
    pub auto: bool,
    pub unique: bool,
    pub default: Option<TypedExpr>,
    pub checks: Vec<FieldCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOrigin {
    Declared,
    /// Synthesized column backing a belongs-to relationship.
    ForeignKey { relation: String },
}

/// Declarative per-field checks from annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCheck {
    /// Lower bound on a number, or on the length of a string or array.
    Min(f64),
    Max(f64),
    /// Regex the string value must match; validated at compile time.
    Pattern(String),
}

impl FieldCheck {
    /// Short description used in metadata constraint lists.
    pub fn describe(&self) -> String {
        match self {
            FieldCheck::Min(n) => format!("min({n})"),
            FieldCheck::Max(n) => format!("max({n})"),
            FieldCheck::Pattern(p) => format!("pattern({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::HasMany => "has_many",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CascadePolicy {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    NoAction,
}

impl CascadePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "restrict" => CascadePolicy::Restrict,
            "cascade" => CascadePolicy::Cascade,
            "set_null" => CascadePolicy::SetNull,
            "no_action" => CascadePolicy::NoAction,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CascadePolicy::Restrict => "restrict",
            CascadePolicy::Cascade => "cascade",
            CascadePolicy::SetNull => "set_null",
            CascadePolicy::NoAction => "no_action",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipIr {
    /// The declaring field, e.g. `author`.
    pub field: String,
    pub kind: RelationKind,
    pub target: String,
    /// Column holding the key: on this resource for belongs-to, on the
    /// target for has-many.
    pub foreign_key: String,
    pub on_delete: CascadePolicy,
    pub nullable: bool,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Create,
    Update,
    Delete,
    /// Both create and update.
    Save,
}

impl HookEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "create" => HookEvent::Create,
            "update" => HookEvent::Update,
            "delete" => HookEvent::Delete,
            "save" => HookEvent::Save,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Create => "create",
            HookEvent::Update => "update",
            HookEvent::Delete => "delete",
            HookEvent::Save => "save",
        }
    }

    pub fn applies_to(&self, op: Operation) -> bool {
        match self {
            HookEvent::Create => op == Operation::Create,
            HookEvent::Update => op == Operation::Update,
            HookEvent::Delete => op == Operation::Delete,
            HookEvent::Save => matches!(op, Operation::Create | Operation::Update),
        }
    }
}

/// A persistence operation that runs hooks and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookIr {
    pub timing: HookTiming,
    pub event: HookEvent,
    pub transactional: bool,
    pub is_async: bool,
    /// Generated method name, unique within the resource.
    pub method: String,
    pub body: Block,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedIr {
    pub name: String,
    pub ty: Ty,
    pub body: Block,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamIr {
    pub name: String,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionIr {
    pub name: String,
    pub params: Vec<ParamIr>,
    pub ret: Ty,
    pub body: Block,
    pub doc: Option<String>,
}

/// A declarative `@constraint` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintIr {
    pub name: String,
    /// Operations the constraint is checked on; empty means create and update.
    pub on: Vec<Operation>,
    /// Guard; the constraint is skipped when it evaluates to false.
    pub when: Option<TypedExpr>,
    pub condition: TypedExpr,
    pub message: String,
    pub doc: Option<String>,
}

impl ConstraintIr {
    pub fn applies_to(&self, op: Operation) -> bool {
        if self.on.is_empty() {
            op != Operation::Delete
        } else {
            self.on.contains(&op)
        }
    }
}

/// A procedural `@validate` block. `fail` ends the block and its message
/// becomes a validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIr {
    pub name: Option<String>,
    pub body: Block,
}
