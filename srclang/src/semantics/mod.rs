//! Semantic analysis.
//!
//! `analyze` first populates the symbol table from the AST (one global
//! `function:<ret>` symbol per method, one child scope per method with its
//! parameters and locals), then walks every method body enforcing the
//! typing rules. Errors are accumulated rather than aborting on the first,
//! so a single run reports everything it can find.

mod errors;

pub use errors::{SemanticError, SemanticErrors};

use crate::symtab::{ScopeId, SymbolTable};
use crate::types::Ty;
use srclang_parser::ast::{BinOp, CallExpr, Expr, Method, Program, Stmt, UnaryOp};

/// Analyze a program.
///
/// On success returns the populated symbol table for the later phases; on
/// failure returns every error found.
pub fn analyze(program: &Program) -> Result<SymbolTable, SemanticErrors> {
    let mut analyzer = Analyzer::new();
    analyzer.collect(program);
    analyzer.check(program);
    analyzer.finish()
}

#[derive(Debug)]
struct Analyzer {
    table: SymbolTable,
    errors: SemanticErrors,
    /// Return type of the method currently being checked
    current_return: Ty,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            errors: SemanticErrors::new(),
            current_return: Ty::Void,
        }
    }

    fn finish(self) -> Result<SymbolTable, SemanticErrors> {
        if self.errors.is_empty() {
            Ok(self.table)
        } else {
            Err(self.errors)
        }
    }

    // ==================== Declaration collection ====================

    /// Build the scope tree: global function symbols, then per method a
    /// child scope holding parameters and every local declared anywhere in
    /// its body.
    fn collect(&mut self, program: &Program) {
        for method in &program.methods {
            let ret = Ty::from(method.return_ty);
            if let Err(err) = self
                .table
                .insert(&method.name, Ty::Function(Box::new(ret)), false)
            {
                self.errors.push(SemanticError::DuplicateDeclaration {
                    name: err.name,
                    line: method.line,
                });
            }
            self.table.push_scope(Some(&method.name));
            for param in &method.params {
                if let Err(err) = self.table.insert(&param.name, Ty::from(param.ty), true) {
                    self.errors.push(SemanticError::DuplicateDeclaration {
                        name: err.name,
                        line: param.line,
                    });
                }
            }
            if let Some(body) = &method.body {
                self.collect_locals(body);
            }
            self.table.pop_scope();
        }
    }

    fn collect_locals(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Decl { name, ty, line, .. } => {
                    if let Err(err) = self.table.insert(name, Ty::from(*ty), false) {
                        self.errors.push(SemanticError::DuplicateDeclaration {
                            name: err.name,
                            line: *line,
                        });
                    }
                }
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.collect_locals(then_branch);
                    if let Some(else_branch) = else_branch {
                        self.collect_locals(else_branch);
                    }
                }
                Stmt::While { body, .. } => self.collect_locals(body),
                Stmt::Assign { .. } | Stmt::Return { .. } | Stmt::Call(_) => {}
            }
        }
    }

    // ==================== Rule checking ====================

    fn check(&mut self, program: &Program) {
        for method in &program.methods {
            if let Some(body) = &method.body {
                self.check_method(method, body);
            }
        }
        self.verify_main();
    }

    fn check_method(&mut self, method: &Method, body: &[Stmt]) {
        let scope = self
            .table
            .function_scope(&method.name)
            .expect("collect created a scope per method");
        self.table.set_current(scope);
        let saved_return = std::mem::replace(&mut self.current_return, Ty::from(method.return_ty));

        self.check_stmts(body);

        self.current_return = saved_return;
        self.table.set_current(ScopeId::ROOT);
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl {
                name, init, line, ..
            } => {
                let var_ty = self.table.lookup(name).map(|s| s.ty.clone());
                let init_ty = self.check_expr(init);
                if let (Some(var_ty), Some(init_ty)) = (var_ty, init_ty) {
                    if var_ty != init_ty {
                        self.errors.push(SemanticError::InitializerMismatch {
                            name: name.clone(),
                            expected: var_ty,
                            found: init_ty,
                            line: *line,
                        });
                    }
                }
            }
            Stmt::Assign { name, value, line } => {
                let var_ty = match self.table.lookup(name) {
                    Some(sym) => Some(sym.ty.clone()),
                    None => {
                        self.errors.push(SemanticError::UndeclaredVariable {
                            name: name.clone(),
                            line: *line,
                        });
                        None
                    }
                };
                let value_ty = self.check_expr(value);
                if let (Some(var_ty), Some(value_ty)) = (var_ty, value_ty) {
                    if var_ty != value_ty {
                        self.errors.push(SemanticError::AssignmentMismatch {
                            name: name.clone(),
                            expected: var_ty,
                            found: value_ty,
                            line: *line,
                        });
                    }
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                self.check_condition(cond, "if", *line);
                self.check_stmts(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmts(else_branch);
                }
            }
            Stmt::While { cond, body, line } => {
                self.check_condition(cond, "while", *line);
                self.check_stmts(body);
            }
            Stmt::Return { value, line } => match value {
                Some(value) => {
                    if let Some(found) = self.check_expr(value) {
                        if found != self.current_return {
                            self.errors.push(SemanticError::ReturnMismatch {
                                expected: self.current_return.clone(),
                                found,
                                line: *line,
                            });
                        }
                    }
                }
                None => {
                    if self.current_return != Ty::Void {
                        self.errors.push(SemanticError::MissingReturnValue {
                            expected: self.current_return.clone(),
                            line: *line,
                        });
                    }
                }
            },
            Stmt::Call(call) => {
                self.check_call(call);
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr, construct: &'static str, line: usize) {
        if let Some(ty) = self.check_expr(cond) {
            if ty != Ty::Bool {
                self.errors.push(SemanticError::ConditionNotBool {
                    construct,
                    found: ty,
                    line,
                });
            }
        }
    }

    /// Type an expression, reporting any errors inside it.
    ///
    /// Returns `None` when the type could not be determined because of an
    /// already-reported error, which suppresses cascading diagnostics.
    /// When an operator's operands are wrong the error is reported once
    /// and the operator's result type is still returned.
    fn check_expr(&mut self, expr: &Expr) -> Option<Ty> {
        match expr {
            Expr::Int { .. } => Some(Ty::Integer),
            Expr::Bool { .. } => Some(Ty::Bool),
            Expr::Id { name, line } => match self.table.lookup(name) {
                Some(sym) => Some(sym.ty.clone()),
                None => {
                    self.errors.push(SemanticError::UndeclaredVariable {
                        name: name.clone(),
                        line: *line,
                    });
                    None
                }
            },
            Expr::Unary { op, operand, line } => {
                let operand_ty = self.check_expr(operand);
                match op {
                    UnaryOp::Neg => {
                        if let Some(ty) = operand_ty {
                            if ty != Ty::Integer {
                                self.errors.push(SemanticError::ArithmeticOperands {
                                    op: "-".to_string(),
                                    line: *line,
                                });
                            }
                        }
                        Some(Ty::Integer)
                    }
                    UnaryOp::Not => {
                        if let Some(ty) = operand_ty {
                            if ty != Ty::Bool {
                                self.errors
                                    .push(SemanticError::NotOperand { line: *line });
                            }
                        }
                        Some(Ty::Bool)
                    }
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                line,
            } => {
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                self.check_binary(*op, left_ty, right_ty, *line)
            }
            Expr::Call(call) => self.check_call(call),
        }
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        left: Option<Ty>,
        right: Option<Ty>,
        line: usize,
    ) -> Option<Ty> {
        let known = left.zip(right);
        if op.is_arithmetic() {
            if let Some((l, r)) = known {
                if l != Ty::Integer || r != Ty::Integer {
                    self.errors.push(SemanticError::ArithmeticOperands {
                        op: op.to_string(),
                        line,
                    });
                }
            }
            Some(Ty::Integer)
        } else if op.is_relational() {
            if let Some((l, r)) = known {
                if l != Ty::Integer || r != Ty::Integer {
                    self.errors.push(SemanticError::ComparisonOperands {
                        op: op.to_string(),
                        line,
                    });
                }
            }
            Some(Ty::Bool)
        } else if op.is_equality() {
            if let Some((l, r)) = known {
                if l != r || !l.is_value_type() {
                    self.errors.push(SemanticError::EqualityOperands { line });
                }
            }
            Some(Ty::Bool)
        } else {
            // && and ||
            if let Some((l, r)) = known {
                if l != Ty::Bool || r != Ty::Bool {
                    self.errors.push(SemanticError::LogicalOperands {
                        op: op.to_string(),
                        line,
                    });
                }
            }
            Some(Ty::Bool)
        }
    }

    /// Check a call and return its result type.
    fn check_call(&mut self, call: &CallExpr) -> Option<Ty> {
        let callee_ty = match self.table.lookup(&call.callee) {
            Some(sym) => sym.ty.clone(),
            None => {
                self.errors.push(SemanticError::UndeclaredFunction {
                    name: call.callee.clone(),
                    line: call.line,
                });
                // Still type the arguments for their own errors.
                for arg in &call.args {
                    self.check_expr(arg);
                }
                return None;
            }
        };
        let Some(return_ty) = callee_ty.return_type().cloned() else {
            self.errors.push(SemanticError::NotAFunction {
                name: call.callee.clone(),
                line: call.line,
            });
            for arg in &call.args {
                self.check_expr(arg);
            }
            return None;
        };

        let arg_types: Vec<Option<Ty>> = call.args.iter().map(|a| self.check_expr(a)).collect();

        if let Some(param_types) = self.table.param_types(&call.callee) {
            if call.args.len() != param_types.len() {
                self.errors.push(SemanticError::ArgumentCount {
                    name: call.callee.clone(),
                    expected: param_types.len(),
                    found: call.args.len(),
                    line: call.line,
                });
            }
            for (index, (arg_ty, param_ty)) in arg_types.iter().zip(&param_types).enumerate() {
                if let Some(arg_ty) = arg_ty {
                    if arg_ty != param_ty {
                        self.errors.push(SemanticError::ArgumentType {
                            name: call.callee.clone(),
                            index: index + 1,
                            expected: param_ty.clone(),
                            found: arg_ty.clone(),
                            line: call.line,
                        });
                    }
                }
            }
        }

        Some(return_ty)
    }

    // ==================== Program well-formedness ====================

    fn verify_main(&mut self) {
        let Some(main) = self.table.lookup_in(ScopeId::ROOT, "main") else {
            self.errors.push(SemanticError::MissingMain);
            return;
        };
        let Some(return_ty) = main.ty.return_type() else {
            self.errors.push(SemanticError::MainNotFunction);
            return;
        };
        if *return_ty != Ty::Void && *return_ty != Ty::Integer {
            self.errors.push(SemanticError::MainBadReturnType {
                found: return_ty.clone(),
            });
        }
        if let Some(params) = self.table.param_types("main") {
            if !params.is_empty() {
                self.errors.push(SemanticError::MainHasParams {
                    count: params.len(),
                });
            }
        }
    }
}
