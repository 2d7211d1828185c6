//! Semantic analysis and compilation pipeline for the Strata resource compiler.
//!
//! This crate turns parsed `.strata` sources into checked, typed resources
//! and provides the shared pieces every backend generator builds on.
//!
//! # Module Organization
//!
//! - [`pipeline`] - Compilation context, diagnostics sink, phases and runner
//! - [`symbols`] - Project-wide resource table
//! - [`graph`] - Relationship graph, cycle and cascade validation
//! - [`typeck`] - Type checker for resources and embedded expressions
//! - [`stdlib`] - Standard library call signatures
//! - [`metadata`] - Metadata document construction
//! - [`builder`] - Code generation building blocks (CodeBuilder, CodeFragment, etc.)
//! - [`language`] - Backend abstractions (LanguageCodegen, TypeMapper, etc.)

pub mod builder;
pub mod graph;
pub mod language;
pub mod metadata;
pub mod pipeline;
pub mod stdlib;
pub mod symbols;
pub mod typeck;
