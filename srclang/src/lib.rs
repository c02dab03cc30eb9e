//! Compiler middle and back end for SrcLang.
//!
//! # Architecture
//!
//! ```text
//! AST → Semantic analysis → IR generation → IR optimization → IR text → x86-64
//! ```
//!
//! The IR is serialized to text between the optimizer and the emitter on
//! purpose: the emitter only consumes the text form, so it can be
//! exercised independently by feeding it a hand-written IR file.

// Library code never prints; the srclangc binary owns all user-facing
// output.
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

pub mod codegen;
pub mod error;
pub mod ir;
pub mod optimizer;
pub mod pipeline;
pub mod semantics;
pub mod symtab;
pub mod types;

pub use error::CompileError;
pub use pipeline::{compile_source, CompileOptions, CompileOutput, CompileStats};
