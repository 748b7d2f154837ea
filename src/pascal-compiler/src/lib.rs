//! Pascal subset compiler
//!
//! Lexing, parsing with inline type checks, and MIPS code generation.

pub mod ast;
pub mod codegen;
pub mod error;
/// 词法分析
pub mod lexer;
/// 语法解析
pub mod parser;
pub mod symbols;
pub mod text;

pub use error::{CompileError, CompileResult, DriverError, USAGE_EXIT_CODE};

use ast::Program;
use symbols::SymbolTable;

/// Everything produced by compiling one source file.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub symbols: SymbolTable,
    pub assembly: String,
}

/// Runs the whole pipeline. Generation only starts once parsing succeeded.
pub fn compile(source: &str) -> CompileResult<Compilation> {
    let parser::Parse { program, symbols } = parser::parse(source)?;
    let assembly = codegen::generate(&program, &symbols);
    Ok(Compilation {
        program,
        symbols,
        assembly,
    })
}
