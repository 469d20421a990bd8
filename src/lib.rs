pub mod analyzer;
pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod options;
pub mod parser;

use tracing::debug;

use analyzer::SemanticVisitor;
use codegen::{Codegen, CodegenError, Executable};
use diagnostics::{has_errors, Diagnostic};
use options::CompileOptions;
use parser::Parser;

/// A successful compilation.
#[derive(Clone, Debug, PartialEq)]
pub struct Compilation {
    pub executable: Executable,
    pub warnings: Vec<Diagnostic>,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum CompileError {
    /// Everything reported by the lexer, parser and analyzer, in the order
    /// it was found.
    #[error("compilation failed with {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    compile_with(source, &CompileOptions::default())
}

pub fn compile_with(source: &str, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let outcome = Parser::new(source).parse();
    let mut program = outcome.program;
    let mut diagnostics = outcome.diagnostics;
    if has_errors(&diagnostics) {
        debug!(count = diagnostics.len(), "parse failed, skipping analysis");
        return Err(CompileError::Diagnostics(diagnostics));
    }

    let mut visitor = SemanticVisitor::new(*options);
    let symbol_table = visitor.visit_program(&mut program);
    diagnostics.extend(visitor.into_diagnostics());
    if has_errors(&diagnostics) {
        debug!(count = diagnostics.len(), "analysis failed, skipping codegen");
        return Err(CompileError::Diagnostics(diagnostics));
    }

    let executable = Codegen::new(&symbol_table).generate(&program)?;
    Ok(Compilation {
        executable,
        warnings: diagnostics,
    })
}
