//! Compile errors for the pascal compiler using thiserror
//!
//! Every error is fatal: the first one aborts compilation. Each variant
//! carries the line it was detected on and maps to a distinct process
//! exit code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Exit code for command line usage errors, kept apart from every
/// `CompileError` code.
pub const USAGE_EXIT_CODE: u8 = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid character '{character}' on line {line}")]
    InvalidCharacter { character: char, line: usize },

    #[error("token mismatch on token '{found}': expected {expected} on line {line}")]
    TokenMismatch {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("input ended while expecting {expected} on line {line}")]
    UnexpectedEndOfFile { expected: String, line: usize },

    #[error("program must begin with 'program' and a name, found '{found}' on line {line}")]
    MalformedProgramHeader { found: String, line: usize },

    #[error("unrecognized data type '{found}', expected 'integer' or 'real' on line {line}")]
    UnrecognizedType { found: String, line: usize },

    #[error("end of file expected after final '.', found '{found}' on line {line}")]
    ExpectedEndOfFile { found: String, line: usize },

    #[error("'{found}' found after statement caused by extra semicolon on line {line}")]
    CompoundStatementSemicolon { found: String, line: usize },

    #[error("variable '{name}' used before declaration on line {line}")]
    UndeclaredVariable { name: String, line: usize },

    #[error("cannot assign a real value to integer variable '{name}' on line {line}")]
    AssignRealToInteger { name: String, line: usize },

    #[error("cannot compare a real number with an integer using '{operator}' on line {line}")]
    RealIntegerComparison { operator: String, line: usize },
}

impl CompileError {
    /// Process exit code reported by `pascalc` for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CompileError::InvalidCharacter { .. } => 2,
            CompileError::TokenMismatch { .. } => 3,
            CompileError::UnexpectedEndOfFile { .. } => 4,
            CompileError::MalformedProgramHeader { .. } => 5,
            CompileError::UnrecognizedType { .. } => 7,
            CompileError::ExpectedEndOfFile { .. } => 8,
            CompileError::CompoundStatementSemicolon { .. } => 9,
            CompileError::UndeclaredVariable { .. } => 10,
            CompileError::AssignRealToInteger { .. } => 11,
            CompileError::RealIntegerComparison { .. } => 12,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            CompileError::InvalidCharacter { line, .. }
            | CompileError::TokenMismatch { line, .. }
            | CompileError::UnexpectedEndOfFile { line, .. }
            | CompileError::MalformedProgramHeader { line, .. }
            | CompileError::UnrecognizedType { line, .. }
            | CompileError::ExpectedEndOfFile { line, .. }
            | CompileError::CompoundStatementSemicolon { line, .. }
            | CompileError::UndeclaredVariable { line, .. }
            | CompileError::AssignRealToInteger { line, .. }
            | CompileError::RealIntegerComparison { line, .. } => *line,
        }
    }
}

/// Failures of the `pascalc` driver: file I/O around a compilation.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl DriverError {
    pub fn exit_code(&self) -> u8 {
        match self {
            DriverError::Read { .. } | DriverError::Write { .. } => 1,
            DriverError::Compile(error) => error.exit_code(),
        }
    }
}
