//! AST to IR lowering.
//!
//! Single recursive pass over the typed AST. Lowering an expression
//! returns the temp holding its value; every identifier use re-loads the
//! variable into a fresh temp and the optimizer cleans the traffic up
//! afterwards.

use super::{IrList, Opcode, Operand};
use srclang_parser::ast::{BinOp, CallExpr, Expr, Method, Program, Stmt, UnaryOp};

/// IR generator owning the temp and label counters.
#[derive(Debug, Default)]
pub struct IrGenerator {
    temp_count: u32,
    label_count: u32,
}

/// Lower a whole program to IR.
pub fn generate(program: &Program) -> IrList {
    IrGenerator::new().gen_program(program)
}

impl IrGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_temp(&mut self) -> Operand {
        let id = self.temp_count;
        self.temp_count += 1;
        Operand::Temp(id)
    }

    fn new_label(&mut self) -> Operand {
        let id = self.label_count;
        self.label_count += 1;
        Operand::Label(id)
    }

    /// Lower a program: methods and externs in source order.
    pub fn gen_program(mut self, program: &Program) -> IrList {
        let mut list = IrList::new();
        for method in &program.methods {
            self.gen_method(method, &mut list);
        }
        list
    }

    fn gen_method(&mut self, method: &Method, list: &mut IrList) {
        let func = Operand::Func(method.name.clone());
        match &method.body {
            None => list.emit(Opcode::Extern, None, None, Some(func)),
            Some(body) => {
                list.emit(Opcode::Method, None, None, Some(func));
                for param in &method.params {
                    list.emit(
                        Opcode::Param,
                        None,
                        None,
                        Some(Operand::Var(param.name.clone())),
                    );
                }
                self.gen_stmts(body, list);
                // No implicit terminator: a missing final RETURN is
                // handled by the emitter's appended epilogue.
            }
        }
    }

    fn gen_stmts(&mut self, stmts: &[Stmt], list: &mut IrList) {
        for stmt in stmts {
            self.gen_stmt(stmt, list);
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt, list: &mut IrList) {
        match stmt {
            Stmt::Decl { name, init, .. } => {
                let value = self.gen_expr(init, list);
                list.emit(
                    Opcode::Store,
                    Some(value),
                    None,
                    Some(Operand::Var(name.clone())),
                );
            }
            Stmt::Assign { name, value, .. } => {
                let value = self.gen_expr(value, list);
                list.emit(
                    Opcode::Store,
                    Some(value),
                    None,
                    Some(Operand::Var(name.clone())),
                );
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let cond = self.gen_expr(cond, list);
                let end = self.new_label();
                match else_branch {
                    Some(else_branch) => {
                        let else_label = self.new_label();
                        list.emit(Opcode::IfFalse, Some(cond), None, Some(else_label.clone()));
                        self.gen_stmts(then_branch, list);
                        list.emit(Opcode::Goto, None, None, Some(end.clone()));
                        list.emit(Opcode::Label, None, None, Some(else_label));
                        self.gen_stmts(else_branch, list);
                    }
                    None => {
                        list.emit(Opcode::IfFalse, Some(cond), None, Some(end.clone()));
                        self.gen_stmts(then_branch, list);
                    }
                }
                list.emit(Opcode::Label, None, None, Some(end));
            }
            Stmt::While { cond, body, .. } => {
                let start = self.new_label();
                let end = self.new_label();
                list.emit(Opcode::Label, None, None, Some(start.clone()));
                let cond = self.gen_expr(cond, list);
                list.emit(Opcode::IfFalse, Some(cond), None, Some(end.clone()));
                self.gen_stmts(body, list);
                list.emit(Opcode::Goto, None, None, Some(start));
                list.emit(Opcode::Label, None, None, Some(end));
            }
            Stmt::Return { value, .. } => {
                let value = value.as_ref().map(|v| self.gen_expr(v, list));
                list.emit(Opcode::Return, value, None, None);
            }
            Stmt::Call(call) => {
                // Result discarded: no result temp on the CALL.
                self.gen_call(call, list, false);
            }
        }
    }

    fn gen_expr(&mut self, expr: &Expr, list: &mut IrList) -> Operand {
        match expr {
            Expr::Int { value, .. } => {
                let temp = self.new_temp();
                list.emit(
                    Opcode::Load,
                    Some(Operand::int(*value)),
                    None,
                    Some(temp.clone()),
                );
                temp
            }
            Expr::Bool { value, .. } => {
                let temp = self.new_temp();
                list.emit(
                    Opcode::Load,
                    Some(Operand::boolean(*value)),
                    None,
                    Some(temp.clone()),
                );
                temp
            }
            Expr::Id { name, .. } => {
                let temp = self.new_temp();
                list.emit(
                    Opcode::Load,
                    Some(Operand::Var(name.clone())),
                    None,
                    Some(temp.clone()),
                );
                temp
            }
            Expr::Unary { op, operand, .. } => {
                let operand = self.gen_expr(operand, list);
                let temp = self.new_temp();
                let opcode = match op {
                    UnaryOp::Neg => Opcode::UMinus,
                    UnaryOp::Not => Opcode::Not,
                };
                list.emit(opcode, Some(operand), None, Some(temp.clone()));
                temp
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.gen_expr(left, list);
                let right = self.gen_expr(right, list);
                let temp = self.new_temp();
                list.emit(
                    binop_opcode(*op),
                    Some(left),
                    Some(right),
                    Some(temp.clone()),
                );
                temp
            }
            Expr::Call(call) => self
                .gen_call(call, list, true)
                .expect("call in expression position has a result"),
        }
    }

    /// Lower a call: evaluate every argument, stage them with
    /// `LOAD_PARAM` immediately before the `CALL` so the staging queue
    /// always belongs to the very next call, then call.
    fn gen_call(&mut self, call: &CallExpr, list: &mut IrList, want_result: bool) -> Option<Operand> {
        let args: Vec<Operand> = call
            .args
            .iter()
            .map(|arg| self.gen_expr(arg, list))
            .collect();
        for arg in args {
            list.emit(Opcode::CallParam, Some(arg), None, None);
        }
        let func = Operand::Func(call.callee.clone());
        let result = if want_result {
            Some(self.new_temp())
        } else {
            None
        };
        list.emit(Opcode::Call, Some(func), None, result.clone());
        result
    }
}

fn binop_opcode(op: BinOp) -> Opcode {
    match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        BinOp::Div => Opcode::Div,
        BinOp::Mod => Opcode::Mod,
        BinOp::Eq => Opcode::Eq,
        BinOp::Neq => Opcode::Neq,
        BinOp::Lt => Opcode::Lt,
        BinOp::Le => Opcode::Le,
        BinOp::Gt => Opcode::Gt,
        BinOp::Ge => Opcode::Ge,
        BinOp::And => Opcode::And,
        BinOp::Or => Opcode::Or,
    }
}
