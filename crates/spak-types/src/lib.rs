// Core type definitions for the SPAK kernel

//! Shared value types for the spec-driven agent kernel.
//!
//! This crate holds the data model that every other SPAK crate agrees on:
//! the AISpec abstract syntax tree rooted at [`SystemSpec`], the runtime
//! [`Value`] exchanged between agents and effect handlers, the [`EffectKind`]
//! tags used for handler routing, and the YAML test-vector model consumed by
//! the dynamic verifier.

pub mod ast;
pub mod effect_kind;
pub mod value;
pub mod vectors;

pub use ast::{
    ComponentSpec, EffectSpec, EntryOperation, Field, FunctionSpec, StateSpec, SystemSpec,
    TypeRef, WorkflowSpec,
};
pub use effect_kind::EffectKind;
pub use value::Value;
pub use vectors::{TestFile, TestVector, VectorError};
