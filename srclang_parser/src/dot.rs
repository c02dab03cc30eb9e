//! Graphviz rendering of the AST.
//!
//! Produces a `digraph` that can be turned into an image with
//! `dot -Tpng ast.dot -o ast.png`, for inspecting what the parser built.

use crate::ast::{CallExpr, Expr, Method, Program, Stmt};

/// Render a program as a Graphviz digraph.
pub fn render(program: &Program) -> String {
    let mut dot = DotBuilder::new();
    let root = dot.node("Program");
    for method in &program.methods {
        let id = dot.method(method);
        dot.edge(root, id, None);
    }
    dot.finish()
}

#[derive(Debug)]
struct DotBuilder {
    out: String,
    next_id: usize,
}

impl DotBuilder {
    fn new() -> Self {
        Self {
            out: String::from("digraph ast {\n  node [shape=box, fontname=\"monospace\"];\n"),
            next_id: 0,
        }
    }

    fn node(&mut self, label: &str) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.out
            .push_str(&format!("  n{} [label=\"{}\"];\n", id, escape(label)));
        id
    }

    fn edge(&mut self, from: usize, to: usize, label: Option<&str>) {
        match label {
            Some(l) => self
                .out
                .push_str(&format!("  n{} -> n{} [label=\"{}\"];\n", from, to, escape(l))),
            None => self.out.push_str(&format!("  n{} -> n{};\n", from, to)),
        }
    }

    fn method(&mut self, method: &Method) -> usize {
        let kind = if method.is_extern() { "Extern" } else { "Method" };
        let id = self.node(&format!("{} {}: {}", kind, method.name, method.return_ty));
        for param in &method.params {
            let p = self.node(&format!("Param {}: {}", param.name, param.ty));
            self.edge(id, p, None);
        }
        if let Some(body) = &method.body {
            for stmt in body {
                let s = self.stmt(stmt);
                self.edge(id, s, None);
            }
        }
        id
    }

    fn stmt(&mut self, stmt: &Stmt) -> usize {
        match stmt {
            Stmt::Decl { name, ty, init, .. } => {
                let id = self.node(&format!("Decl {}: {}", name, ty));
                let e = self.expr(init);
                self.edge(id, e, None);
                id
            }
            Stmt::Assign { name, value, .. } => {
                let id = self.node(&format!("Assign {}", name));
                let e = self.expr(value);
                self.edge(id, e, None);
                id
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let id = self.node("If");
                let c = self.expr(cond);
                self.edge(id, c, Some("cond"));
                for stmt in then_branch {
                    let s = self.stmt(stmt);
                    self.edge(id, s, Some("then"));
                }
                if let Some(else_branch) = else_branch {
                    for stmt in else_branch {
                        let s = self.stmt(stmt);
                        self.edge(id, s, Some("else"));
                    }
                }
                id
            }
            Stmt::While { cond, body, .. } => {
                let id = self.node("While");
                let c = self.expr(cond);
                self.edge(id, c, Some("cond"));
                for stmt in body {
                    let s = self.stmt(stmt);
                    self.edge(id, s, Some("body"));
                }
                id
            }
            Stmt::Return { value, .. } => {
                let id = self.node("Return");
                if let Some(value) = value {
                    let e = self.expr(value);
                    self.edge(id, e, None);
                }
                id
            }
            Stmt::Call(call) => self.call(call),
        }
    }

    fn expr(&mut self, expr: &Expr) -> usize {
        match expr {
            Expr::Int { value, .. } => self.node(&format!("Int {}", value)),
            Expr::Bool { value, .. } => self.node(&format!("Bool {}", value)),
            Expr::Id { name, .. } => self.node(&format!("Id {}", name)),
            Expr::Unary { op, operand, .. } => {
                let id = self.node(&format!("Unary {}", op));
                let e = self.expr(operand);
                self.edge(id, e, None);
                id
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let id = self.node(&format!("BinOp {}", op));
                let l = self.expr(left);
                let r = self.expr(right);
                self.edge(id, l, None);
                self.edge(id, r, None);
                id
            }
            Expr::Call(call) => self.call(call),
        }
    }

    fn call(&mut self, call: &CallExpr) -> usize {
        let id = self.node(&format!("Call {}", call.callee));
        for arg in &call.args {
            let a = self.expr(arg);
            self.edge(id, a, None);
        }
        id
    }

    fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
