//! The compilation pipeline.
//!
//! ```text
//! source → parse → analyze → IR → optimize → IR text → x86-64 assembly
//! ```
//!
//! The optimizer output is serialized to IR text and the emitter consumes
//! only that text, keeping the two sides independently testable.

use crate::codegen::{EmitConfig, Emitter};
use crate::error::CompileError;
use crate::ir::gen::generate;
use crate::ir::text::write_ir;
use crate::optimizer::{optimize_ir, OptStats};
use crate::semantics::analyze;
use srclang_parser::ast::Program;
use srclang_parser::parse;

/// Pipeline options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Run the optimizer (on by default)
    pub optimize: bool,
    /// Echo IR instructions as comments in the assembly
    pub emit_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            emit_comments: false,
        }
    }
}

/// Counters describing one compilation.
#[derive(Debug, Default, Clone)]
pub struct CompileStats {
    /// Methods in the program (including externs)
    pub methods: usize,
    /// IR instructions generated before optimization
    pub instructions: usize,
    /// IR instructions surviving optimization
    pub instructions_after_opt: usize,
    /// Optimizer counters
    pub opt: OptStats,
}

/// Everything one compilation produces.
#[derive(Debug)]
pub struct CompileOutput {
    /// GNU-syntax x86-64 assembly
    pub assembly: String,
    /// IR text fed to the emitter (post-optimization)
    pub ir_text: String,
    /// IR text as generated, before optimization
    pub unoptimized_ir_text: String,
    /// Rendered symbol table (for diagnostics)
    pub symbol_table: String,
    pub stats: CompileStats,
}

/// Compile SrcLang source text to assembly.
pub fn compile_source(
    source: &str,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    let program = parse(source).map_err(CompileError::Parse)?;
    compile_program(&program, options)
}

/// Compile an already-parsed program.
pub fn compile_program(
    program: &Program,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    let table = analyze(program).map_err(CompileError::Semantic)?;

    let mut ir = generate(program);
    let unoptimized_ir_text = write_ir(&ir);
    let mut stats = CompileStats {
        methods: program.methods.len(),
        instructions: ir.len(),
        ..CompileStats::default()
    };

    if options.optimize {
        stats.opt = optimize_ir(&mut ir);
    }
    let ir_text = write_ir(&ir);
    stats.instructions_after_opt = ir.live_instrs().count();

    let mut emitter = Emitter::new(EmitConfig {
        emit_comments: options.emit_comments,
    });
    let assembly = emitter.emit_ir_text(&ir_text)?;

    Ok(CompileOutput {
        assembly,
        ir_text,
        unoptimized_ir_text,
        symbol_table: table.to_string(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_program() {
        let output = compile_source(
            "method main(): integer { return 2 + 3; }",
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(output.assembly.contains("main:"));
        assert!(output.assembly.contains("$5"));
        assert!(output.ir_text.contains("LOAD 5"));
        assert!(output.unoptimized_ir_text.contains("ADD t0, t1, t2"));
        assert_eq!(output.stats.methods, 1);
        assert!(output.stats.instructions > output.stats.instructions_after_opt);
    }

    #[test]
    fn test_no_opt_keeps_ir() {
        let output = compile_source(
            "method main(): integer { return 2 + 3; }",
            &CompileOptions {
                optimize: false,
                ..CompileOptions::default()
            },
        )
        .unwrap();
        assert_eq!(output.ir_text, output.unoptimized_ir_text);
        assert_eq!(output.stats.opt.total(), 0);
    }

    #[test]
    fn test_parse_error_propagates() {
        let err = compile_source("method {", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn test_semantic_error_propagates() {
        let err = compile_source(
            "method main() { x := 1; }",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Semantic(_)));
    }

    #[test]
    fn test_symbol_table_rendered() {
        let output = compile_source(
            "method main() { var x: integer := 1; }",
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(output.symbol_table.contains("main: function:void"));
        assert!(output.symbol_table.contains("x: integer"));
    }
}
