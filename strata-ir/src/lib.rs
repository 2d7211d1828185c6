//! Intermediate representation for the Strata resource compiler.
//!
//! This crate holds the types that sit between the type checker and the
//! code generators: semantic types with explicit nullability, the typed
//! resource IR produced by checking, and the metadata document handed to the
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! .strata → strata-syntax (AST) → strata-compiler (check) → strata-ir → codegen
//! ```
//!
//! The IR is backend-agnostic. Nothing here knows about Rust syntax.

mod expr;
mod metadata;
mod resource;
mod types;

pub use expr::{
    AssignTarget, BinOp, Block, Callee, FieldAccess, Lit, MatchArm, MatchPattern, TExpr,
    InterpolationSegment, TypedExpr, UnOp,
};
pub use metadata::{
    ComputedMetadata, FieldMetadata, HookMetadata, METADATA_VERSION, MetadataDocument,
    RelationshipMetadata, ResourceMetadata, RouteMetadata,
};
pub use resource::{
    CascadePolicy, ComputedIr, ConstraintIr, FieldCheck, FieldIr, FieldOrigin, FunctionIr,
    HookEvent, HookIr, HookTiming, Operation, ParamIr, RelationKind, RelationshipIr, ResourceIr,
    ValidationIr,
};
pub use strata_core::Primitive;
pub use types::{EnumTy, StructField, StructTy, Ty, TyKind};
