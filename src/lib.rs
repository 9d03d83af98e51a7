//! Structured-output shape compilation.
//!
//! Two independent paths produce the same `TypeDescriptor` contract for a
//! downstream text-generation call:
//!
//! - the schema path compiles a JSON-Schema-like document
//!   ([`compiler::compile`]);
//! - the text path takes an untrusted snippet of class definitions through a
//!   pattern prefilter, a structural validator over a typed AST, and a
//!   restricted tree-walking synthesizer ([`snippet::synthesize_snippet`]).
//!
//! Both paths are synchronous, stateless pure functions of their inputs and
//! the immutable [`policy::SafetyPolicy`]; nothing here blocks on I/O or
//! shares mutable state across calls. Note that the synthesizer bounds what a
//! snippet can *reach*, not how long it may run; embedders should wrap calls
//! in a wall-clock timeout.

pub mod cli;
pub mod compiler;
pub mod descriptor;
pub mod emit;
pub mod policy;
pub mod snippet;

pub use compiler::{compile, compile_with, Definitions, SchemaError};
pub use descriptor::{FieldSpec, ObjectShape, Primitive, TypeDescriptor};
pub use policy::{SafetyPolicy, DEFAULT_POLICY};
pub use snippet::{
    prefilter, synthesize_snippet, validate, SnippetError, SynthesisError, SynthesisResult,
    SynthesizedType, ValidationError,
};
