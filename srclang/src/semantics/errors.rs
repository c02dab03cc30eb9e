//! Semantic error types

use crate::types::Ty;
use std::fmt;
use thiserror::Error;

/// A single semantic error with the source line it was found on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    #[error("line {line}: variable '{name}' not declared")]
    UndeclaredVariable { name: String, line: usize },

    #[error("line {line}: function '{name}' not declared")]
    UndeclaredFunction { name: String, line: usize },

    #[error("line {line}: '{name}' is already declared in this scope")]
    DuplicateDeclaration { name: String, line: usize },

    #[error("line {line}: arithmetic operator '{op}' requires integer operands")]
    ArithmeticOperands { op: String, line: usize },

    #[error("line {line}: comparison operator '{op}' requires integer operands")]
    ComparisonOperands { op: String, line: usize },

    #[error("line {line}: equality comparison requires matching integer or bool operands")]
    EqualityOperands { line: usize },

    #[error("line {line}: logical operator '{op}' requires bool operands")]
    LogicalOperands { op: String, line: usize },

    #[error("line {line}: '!' requires a bool operand")]
    NotOperand { line: usize },

    #[error("line {line}: condition of '{construct}' must be bool, found {found}")]
    ConditionNotBool {
        construct: &'static str,
        found: Ty,
        line: usize,
    },

    #[error("line {line}: cannot initialize '{name}': expected {expected}, found {found}")]
    InitializerMismatch {
        name: String,
        expected: Ty,
        found: Ty,
        line: usize,
    },

    #[error("line {line}: cannot assign to '{name}': expected {expected}, found {found}")]
    AssignmentMismatch {
        name: String,
        expected: Ty,
        found: Ty,
        line: usize,
    },

    #[error("line {line}: '{name}' is not a function")]
    NotAFunction { name: String, line: usize },

    #[error("line {line}: wrong number of arguments to '{name}': expected {expected}, found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        line: usize,
    },

    #[error("line {line}: argument {index} of '{name}' has wrong type: expected {expected}, found {found}")]
    ArgumentType {
        name: String,
        index: usize,
        expected: Ty,
        found: Ty,
        line: usize,
    },

    #[error("line {line}: incompatible return type: expected {expected}, found {found}")]
    ReturnMismatch {
        expected: Ty,
        found: Ty,
        line: usize,
    },

    #[error("line {line}: non-void method must return a value of type {expected}")]
    MissingReturnValue { expected: Ty, line: usize },

    #[error("program must contain a method 'main'")]
    MissingMain,

    #[error("'main' must be a function")]
    MainNotFunction,

    #[error("'main' must return void or integer, found {found}")]
    MainBadReturnType { found: Ty },

    #[error("'main' must not take parameters ({count} declared)")]
    MainHasParams { count: usize },
}

/// Accumulated semantic errors from one analysis run.
#[derive(Debug, Default)]
pub struct SemanticErrors {
    errors: Vec<SemanticError>,
}

impl SemanticErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, error: SemanticError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn first(&self) -> Option<&SemanticError> {
        self.errors.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticError> {
        self.errors.iter()
    }
}

impl fmt::Display for SemanticErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl IntoIterator for SemanticErrors {
    type Item = SemanticError;
    type IntoIter = std::vec::IntoIter<SemanticError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
