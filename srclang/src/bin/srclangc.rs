//! SrcLang compiler CLI.
//!
//! Usage:
//!   srclangc input.src -o output.s
//!   srclangc -e "method main(): integer { return 0; }"
//!   srclangc input.src --emit-ir --stats
//!   srclangc input.src --ast-dot ast.dot --ast-json ast.json

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use srclang::pipeline::{compile_program, CompileOptions};
use srclang::CompileError;
use srclang_parser::{dot, parse};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line arguments
#[derive(Debug, Default)]
struct Args {
    /// Input file path (None if using -e)
    input_file: Option<String>,
    /// Code string (for -e option)
    code: Option<String>,
    /// Output file path
    output_file: Option<String>,
    /// Also write the IR text to inter.s
    emit_ir: bool,
    /// Write a Graphviz rendering of the AST
    ast_dot: Option<String>,
    /// Write the AST as JSON
    ast_json: Option<String>,
    /// Disable the IR optimizer
    no_opt: bool,
    /// Echo IR instructions as assembly comments
    comments: bool,
    /// Verbose progress output and intermediate artifacts
    debug: bool,
    /// Show compilation statistics
    show_stats: bool,
    show_help: bool,
    show_version: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Args::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => parsed.show_help = true,
                "-v" | "--version" => parsed.show_version = true,
                "-o" | "--output" => {
                    i += 1;
                    if i < args.len() {
                        parsed.output_file = Some(args[i].clone());
                    }
                }
                "-e" | "--eval" => {
                    i += 1;
                    if i < args.len() {
                        parsed.code = Some(args[i].clone());
                    }
                }
                "--ast-dot" => {
                    i += 1;
                    if i < args.len() {
                        parsed.ast_dot = Some(args[i].clone());
                    }
                }
                "--ast-json" => {
                    i += 1;
                    if i < args.len() {
                        parsed.ast_json = Some(args[i].clone());
                    }
                }
                "--emit-ir" => parsed.emit_ir = true,
                "--no-opt" => parsed.no_opt = true,
                "--comments" => parsed.comments = true,
                "--debug" => parsed.debug = true,
                "--stats" => parsed.show_stats = true,
                arg if !arg.starts_with('-') => {
                    if parsed.input_file.is_none() && parsed.code.is_none() {
                        parsed.input_file = Some(arg.to_string());
                    }
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                }
            }
            i += 1;
        }

        parsed
    }
}

fn print_help() {
    println!(
        r#"SrcLang compiler v{}

USAGE:
    srclangc [OPTIONS] <input.src>
    srclangc -e <code> [OPTIONS]

OPTIONS:
    -h, --help       Show this help message
    -v, --version    Show version information
    -o, --output     Assembly output path (default: output.s)
    -e, --eval       Compile a code string instead of a file
    --emit-ir        Also write the optimized IR text to inter.s
    --no-opt         Skip the IR optimizer
    --comments       Echo IR instructions as comments in the assembly
    --ast-dot FILE   Write a Graphviz rendering of the AST
    --ast-json FILE  Write the AST as JSON
    --debug          Print phase banners and intermediate artifacts
    --stats          Show compilation statistics

OUTPUT:
    The generated file assembles and links with the GNU toolchain:

    gcc output.s -o program
    ./program
"#,
        VERSION
    );
}

fn main() {
    let args = Args::parse();

    if args.show_help {
        print_help();
        return;
    }
    if args.show_version {
        println!("SrcLang compiler v{}", VERSION);
        return;
    }

    let source = match (&args.code, &args.input_file) {
        (Some(code), _) => code.clone(),
        (None, Some(file)) => {
            if !Path::new(file).exists() {
                eprintln!("Error: file '{}' not found", file);
                process::exit(1);
            }
            match fs::read_to_string(file) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("Error: cannot read '{}': {}", file, e);
                    process::exit(1);
                }
            }
        }
        (None, None) => {
            eprintln!("Error: no input file or code provided");
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    // Parse. Done here rather than inside the pipeline so the AST
    // artifacts are available even when later phases are skipped.
    if args.debug {
        println!("=== parsing ===");
    }
    let program = match parse(&source) {
        Ok(program) => program,
        Err(errors) => {
            eprintln!("{}", errors.format_all(&source));
            process::exit(1);
        }
    };

    if let Some(path) = &args.ast_dot {
        write_artifact(path, &dot::render(&program));
    }
    if let Some(path) = &args.ast_json {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => write_artifact(path, &json),
            Err(e) => {
                eprintln!("Error: cannot serialize AST: {}", e);
                process::exit(1);
            }
        }
    }

    let options = CompileOptions {
        optimize: !args.no_opt,
        emit_comments: args.comments,
    };
    let output = match compile_program(&program, &options) {
        Ok(output) => output,
        Err(CompileError::Semantic(errors)) => {
            for error in errors.iter() {
                eprintln!("Error: {}", error);
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.debug {
        println!("=== symbol table ===");
        print!("{}", output.symbol_table);
        println!("=== IR (before optimization) ===");
        print!("{}", output.unoptimized_ir_text);
        println!("=== IR (after optimization) ===");
        print!("{}", output.ir_text);
        println!("=== emitting ===");
    }

    if args.emit_ir {
        write_artifact("inter.s", &output.ir_text);
        println!("IR written to inter.s");
    }

    let output_file = args.output_file.unwrap_or_else(|| "output.s".to_string());
    write_artifact(&output_file, &output.assembly);
    println!("Generated: {}", output_file);

    if args.show_stats {
        let stats = &output.stats;
        println!();
        println!("Statistics:");
        println!("  Methods: {}", stats.methods);
        println!("  IR instructions: {}", stats.instructions);
        println!("  IR instructions after optimization: {}", stats.instructions_after_opt);
        println!("  Constants folded: {}", stats.opt.folds);
        println!("  Constants propagated: {}", stats.opt.propagations);
        println!("  Peephole rewrites: {}", stats.opt.peephole_rewrites);
        println!("  Shift-eligible mul/div: {}", stats.opt.shift_eligible);
        println!("  Dead instructions removed: {}", stats.opt.dce_eliminated);
    }
}

fn write_artifact(path: &str, contents: &str) {
    if let Err(e) = fs::write(path, contents) {
        eprintln!("Error: cannot write '{}': {}", path, e);
        process::exit(1);
    }
}
