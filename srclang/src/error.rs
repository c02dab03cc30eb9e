//! Top-level compilation error.

use crate::codegen::EmitError;
use crate::semantics::SemanticErrors;
use srclang_parser::ParseErrors;
use thiserror::Error;

/// Any failure of the compilation pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Source code failed to parse
    #[error("parse failed:\n{0}")]
    Parse(ParseErrors),

    /// The analyzer rejected the program
    #[error("semantic analysis failed:\n{0}")]
    Semantic(SemanticErrors),

    /// Code emission failed
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// File I/O failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
