//! x86-64 code emission.
//!
//! The emitter consumes the IR *text* form, re-parses it, and lowers each
//! method to GNU-syntax assembly. Per method it runs two passes: a
//! pre-scan builds the variable table and the register assignment (so the
//! `enter` frame size is exact up front), then the instructions are
//! lowered one by one.
//!
//! Calls follow the System V AMD64 integer ABI for up to six arguments:
//! `LOAD_PARAM` pushes the staged value, and `CALL` moves the staged
//! values into `%rdi, %rsi, %rdx, %rcx, %r8, %r9`, saving any pool
//! registers whose temps live across the call. `%r10`/`%r11` are scratch
//! and never allocated.

pub mod regalloc;
pub mod vars;

use crate::ir::text::{format_instr, parse_ir, IrTextError};
use crate::ir::{Instr, Opcode, Operand};
use regalloc::{Allocation, Location, ARG_REGS, POOL};
use std::path::Path;
use thiserror::Error;
use vars::VarTable;

/// Emission error.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("cannot read IR file '{path}': {source}")]
    ReadIr {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    IrText(#[from] IrTextError),

    #[error("IR instruction '{instr}' appears outside a method body")]
    OutsideMethod { instr: String },

    #[error("call to '{name}' stages {count} arguments; at most 6 are supported")]
    TooManyCallArgs { name: String, count: usize },

    #[error("method '{name}' declares {count} parameters; at most 6 are supported")]
    TooManyParams { name: String, count: usize },
}

/// Emitter configuration.
#[derive(Debug, Clone, Default)]
pub struct EmitConfig {
    /// Echo each IR instruction as an assembly comment
    pub emit_comments: bool,
}

/// Emit assembly from an IR text file.
pub fn emit_ir_file(path: &Path, config: EmitConfig) -> Result<String, EmitError> {
    let text = std::fs::read_to_string(path).map_err(|source| EmitError::ReadIr {
        path: path.display().to_string(),
        source,
    })?;
    Emitter::new(config).emit_ir_text(&text)
}

/// x86-64 emitter.
#[derive(Debug)]
pub struct Emitter {
    config: EmitConfig,
    lines: Vec<String>,
    // Per-function state, reset at every METHOD.
    vars: VarTable,
    alloc: Option<Allocation>,
    /// `%rbp`-relative slot where `%rbx` is preserved, when the pool
    /// handed `%rbx` to a temp
    rbx_offset: Option<i64>,
    /// Offset of the first spill slot (below the named variables)
    spill_base: i64,
    /// Operands staged by LOAD_PARAM for the next CALL
    staged: usize,
}

impl Emitter {
    pub fn new(config: EmitConfig) -> Self {
        Self {
            config,
            lines: Vec::new(),
            vars: VarTable::new(),
            alloc: None,
            rbx_offset: None,
            spill_base: 0,
            staged: 0,
        }
    }

    /// Lower IR text to a complete assembly file.
    pub fn emit_ir_text(&mut self, text: &str) -> Result<String, EmitError> {
        let list = parse_ir(text)?;
        let instrs: Vec<Instr> = list.instrs.into_iter().filter(|i| !i.is_nop()).collect();

        self.lines.clear();
        self.line(".text");

        let mut i = 0;
        while i < instrs.len() {
            match instrs[i].op {
                // The linker resolves extern names; nothing to emit.
                Opcode::Extern => i += 1,
                Opcode::Method => {
                    let end = instrs[i + 1..]
                        .iter()
                        .position(|instr| matches!(instr.op, Opcode::Method | Opcode::Extern))
                        .map(|p| i + 1 + p)
                        .unwrap_or(instrs.len());
                    self.emit_function(&instrs[i..end])?;
                    i = end;
                }
                _ => {
                    return Err(EmitError::OutsideMethod {
                        instr: format_instr(&instrs[i]),
                    })
                }
            }
        }

        self.line(".section\t.note.GNU-stack,\"\",@progbits");
        Ok(self.lines.join("\n") + "\n")
    }

    // ==================== Function emission ====================

    fn emit_function(&mut self, instrs: &[Instr]) -> Result<(), EmitError> {
        let name = match &instrs[0].result {
            Some(Operand::Func(name)) => name.clone(),
            _ => unreachable!("METHOD carries a function operand"),
        };

        // Pre-scan: named variables first (parameters, then stores in
        // order of appearance), then the register plan.
        self.vars = VarTable::new();
        self.rbx_offset = None;
        self.staged = 0;

        let params: Vec<String> = instrs
            .iter()
            .filter(|i| i.op == Opcode::Param)
            .filter_map(|i| match &i.result {
                Some(Operand::Var(v)) => Some(v.clone()),
                _ => None,
            })
            .collect();
        if params.len() > ARG_REGS.len() {
            return Err(EmitError::TooManyParams {
                name,
                count: params.len(),
            });
        }
        for param in &params {
            self.vars.add(param);
        }
        for instr in instrs {
            if instr.op == Opcode::Store {
                if let Some(Operand::Var(v)) = &instr.result {
                    self.vars.add(v);
                }
            }
        }

        let alloc = Allocation::plan(instrs);
        self.spill_base = self.vars.stack_size();
        let mut frame = self.spill_base + 8 * alloc.spill_count as i64;
        if alloc.uses_rbx {
            frame += 8;
            self.rbx_offset = Some(-frame);
        }
        // Keep %rsp 16-byte aligned after the prologue.
        frame = (frame + 15) & !15;
        self.alloc = Some(alloc);

        // Prologue.
        self.line(format!(".globl {}", name));
        self.line(format!(".type {}, @function", name));
        self.line(format!("{}:", name));
        self.line(format!("\tenter\t${}, $0", frame));
        if let Some(offset) = self.rbx_offset {
            self.line(format!("\tmovq\t%rbx, {}(%rbp)", offset));
        }
        for (j, param) in params.iter().enumerate() {
            let offset = self.vars.offset_of(param).expect("param has a slot");
            self.line(format!("\tmovq\t{}, {}(%rbp)", ARG_REGS[j], offset));
        }

        // Body.
        let mut ended_with_return = false;
        for (idx, instr) in instrs.iter().enumerate() {
            if matches!(instr.op, Opcode::Method | Opcode::Param) {
                continue;
            }
            if self.config.emit_comments {
                self.line(format!("\t# {}", format_instr(instr)));
            }
            self.emit_instr(instr, idx)?;
            ended_with_return = instr.op == Opcode::Return;
        }

        // A body that does not end in RETURN still needs an epilogue.
        if !ended_with_return {
            self.line("\tmovq\t$0, %rax");
            self.epilogue();
        }
        Ok(())
    }

    fn emit_instr(&mut self, instr: &Instr, idx: usize) -> Result<(), EmitError> {
        match instr.op {
            Opcode::Load | Opcode::Store => {
                let src = instr.arg1.as_ref().expect("source operand");
                let dst = instr.result.as_ref().expect("destination operand");
                self.move_value(src, dst);
            }
            Opcode::Add => self.emit_arith("addq", instr),
            Opcode::Sub => self.emit_arith("subq", instr),
            Opcode::Mul => self.emit_mul(instr),
            Opcode::Div => self.emit_div(instr, false),
            Opcode::Mod => self.emit_div(instr, true),
            Opcode::UMinus => {
                let (rd, writeback) = self.dest_reg(instr.result.as_ref().expect("result"));
                let src = self.resolve(instr.arg1.as_ref().expect("operand"));
                self.mov(&src, rd);
                self.line(format!("\tnegq\t{}", rd));
                self.write_back(rd, writeback);
            }
            Opcode::Not => {
                let src = self.cmp_operand(instr.arg1.as_ref().expect("operand"), "%r11");
                self.line(format!("\tcmpq\t$0, {}", src));
                self.line("\tsete\t%r10b");
                self.line("\tmovzbq\t%r10b, %r10");
                self.store_from_scratch(instr.result.as_ref().expect("result"));
            }
            Opcode::Eq => self.emit_compare("sete", instr),
            Opcode::Neq => self.emit_compare("setne", instr),
            Opcode::Lt => self.emit_compare("setl", instr),
            Opcode::Le => self.emit_compare("setle", instr),
            Opcode::Gt => self.emit_compare("setg", instr),
            Opcode::Ge => self.emit_compare("setge", instr),
            Opcode::And => self.emit_logical("andq", instr),
            Opcode::Or => self.emit_logical("orq", instr),
            Opcode::Label => {
                let label = instr.result.as_ref().expect("label operand");
                self.line(format!("{}:", label));
            }
            Opcode::Goto => {
                let label = instr.result.as_ref().expect("target label");
                self.line(format!("\tjmp\t{}", label));
            }
            Opcode::IfFalse => self.emit_branch("je", instr),
            Opcode::IfTrue => self.emit_branch("jne", instr),
            Opcode::Return => {
                match &instr.arg1 {
                    Some(value) => {
                        let src = self.resolve(value);
                        self.mov(&src, "%rax");
                    }
                    None => self.line("\tmovq\t$0, %rax"),
                }
                self.epilogue();
            }
            Opcode::CallParam => {
                let src = instr.arg1.as_ref().expect("staged operand");
                self.emit_stage(src);
            }
            Opcode::Call => self.emit_call(instr, idx)?,
            Opcode::Method | Opcode::Extern | Opcode::Param => {
                unreachable!("handled by emit_function")
            }
        }
        Ok(())
    }

    // ==================== Instruction groups ====================

    /// Add/Sub: `movq arg1, rd; op arg2, rd`.
    fn emit_arith(&mut self, op: &str, instr: &Instr) {
        let (rd, writeback) = self.dest_reg(instr.result.as_ref().expect("result"));
        let a = self.resolve(instr.arg1.as_ref().expect("left operand"));
        self.mov(&a, rd);
        let b = self.arith_source(instr.arg2.as_ref().expect("right operand"));
        self.line(format!("\t{}\t{}, {}", op, b, rd));
        self.write_back(rd, writeback);
    }

    /// Mul, with the power-of-two strength reduction realized as `salq`.
    fn emit_mul(&mut self, instr: &Instr) {
        let (rd, writeback) = self.dest_reg(instr.result.as_ref().expect("result"));
        let a = self.resolve(instr.arg1.as_ref().expect("left operand"));
        self.mov(&a, rd);
        let arg2 = instr.arg2.as_ref().expect("right operand");
        match arg2.const_value() {
            Some(value) if crate::optimizer::is_shiftable_power_of_two(value) => {
                self.line(format!("\tsalq\t${}, {}", crate::optimizer::log2(value), rd));
            }
            _ => {
                let b = self.arith_source(arg2);
                self.line(format!("\timulq\t{}, {}", b, rd));
            }
        }
        self.write_back(rd, writeback);
    }

    /// Div/Mod through `idivq`, preserving `%rax`/`%rdx`. Division by a
    /// power of two becomes an arithmetic shift with the usual
    /// round-toward-zero fixup for negative dividends.
    fn emit_div(&mut self, instr: &Instr, want_remainder: bool) {
        let arg1 = instr.arg1.as_ref().expect("dividend");
        let arg2 = instr.arg2.as_ref().expect("divisor");
        let result = instr.result.as_ref().expect("result");

        if !want_remainder {
            if let Some(value) = arg2.const_value() {
                // The mask must fit an immediate; larger powers fall
                // through to idivq.
                if crate::optimizer::is_shiftable_power_of_two(value) && value <= i64::from(i32::MAX)
                {
                    let n = crate::optimizer::log2(value);
                    let src = self.resolve(arg1);
                    self.mov(&src, "%r10");
                    self.line("\tmovq\t%r10, %r11");
                    self.line("\tsarq\t$63, %r11");
                    self.line(format!("\tandq\t${}, %r11", value - 1));
                    self.line("\taddq\t%r11, %r10");
                    self.line(format!("\tsarq\t${}, %r10", n));
                    self.store_from_scratch(result);
                    return;
                }
            }
        }

        self.line("\tpushq\t%rax");
        self.line("\tpushq\t%rdx");
        let divisor = self.resolve(arg2);
        self.mov(&divisor, "%r11");
        let dividend = self.resolve(arg1);
        self.mov(&dividend, "%rax");
        self.line("\tcqto");
        self.line("\tidivq\t%r11");
        if want_remainder {
            self.line("\tmovq\t%rdx, %r10");
        } else {
            self.line("\tmovq\t%rax, %r10");
        }
        self.line("\tpopq\t%rdx");
        self.line("\tpopq\t%rax");
        self.store_from_scratch(result);
    }

    /// Comparisons: `cmpq arg2, arg1; set<cc> %r10b; zero-extend; store`.
    fn emit_compare(&mut self, set: &str, instr: &Instr) {
        let left = self.cmp_operand(instr.arg1.as_ref().expect("left operand"), "%r10");
        let right = self.cmp_right_operand(instr.arg2.as_ref().expect("right operand"), &left);
        self.line(format!("\tcmpq\t{}, {}", right, left));
        self.line(format!("\t{}\t%r10b", set));
        self.line("\tmovzbq\t%r10b, %r10");
        self.store_from_scratch(instr.result.as_ref().expect("result"));
    }

    /// And/Or: normalize both operands to 0/1, combine, store.
    fn emit_logical(&mut self, op: &str, instr: &Instr) {
        let a = self.cmp_operand(instr.arg1.as_ref().expect("left operand"), "%r10");
        self.line(format!("\tcmpq\t$0, {}", a));
        self.line("\tsetne\t%r10b");
        self.line("\tmovzbq\t%r10b, %r10");
        let b = self.cmp_operand(instr.arg2.as_ref().expect("right operand"), "%r11");
        self.line(format!("\tcmpq\t$0, {}", b));
        self.line("\tsetne\t%r11b");
        self.line("\tmovzbq\t%r11b, %r11");
        self.line(format!("\t{}\t%r11, %r10", op));
        self.store_from_scratch(instr.result.as_ref().expect("result"));
    }

    /// IF_FALSE/IF_TRUE. A constant condition resolves statically.
    fn emit_branch(&mut self, jump: &str, instr: &Instr) {
        let label = instr.result.as_ref().expect("target label");
        let cond = instr.arg1.as_ref().expect("condition");
        if let Some(value) = cond.const_value() {
            let taken = match jump {
                "je" => value == 0,
                _ => value != 0,
            };
            if taken {
                self.line(format!("\tjmp\t{}", label));
            }
            return;
        }
        let src = self.cmp_operand(cond, "%r10");
        self.line(format!("\tcmpq\t$0, {}", src));
        self.line(format!("\t{}\t{}", jump, label));
    }

    /// Stage one argument for the next CALL.
    fn emit_stage(&mut self, src: &Operand) {
        match src {
            Operand::Const { value, .. } if !imm_fits_i32(*value) => {
                self.line(format!("\tmovq\t${}, %r11", value));
                self.line("\tpushq\t%r11");
            }
            _ => {
                let resolved = self.resolve(src);
                self.line(format!("\tpushq\t{}", resolved));
            }
        }
        self.staged += 1;
    }

    fn emit_call(&mut self, instr: &Instr, idx: usize) -> Result<(), EmitError> {
        let callee = match &instr.arg1 {
            Some(Operand::Func(name)) => name.clone(),
            _ => unreachable!("CALL carries a function operand"),
        };
        let argc = self.staged;
        self.staged = 0;
        if argc > ARG_REGS.len() {
            return Err(EmitError::TooManyCallArgs {
                name: callee,
                count: argc,
            });
        }
        // Save pool registers whose temps survive the call. %rbx is
        // callee-saved and needs no help.
        let saves = self
            .alloc
            .as_ref()
            .expect("allocation planned")
            .live_caller_saved_at(idx);
        for &s in &saves {
            self.line(format!("\tpushq\t{}", POOL[s]));
        }
        let pad = (argc + saves.len()) % 2 == 1;
        if pad {
            self.line("\tsubq\t$8, %rsp");
        }

        // Pop-free argument pickup: the staged values sit below the
        // saves, deepest first.
        let fixed = (saves.len() + usize::from(pad)) as i64 * 8;
        for j in 0..argc {
            let offset = fixed + (argc - 1 - j) as i64 * 8;
            self.line(format!("\tmovq\t{}(%rsp), {}", offset, ARG_REGS[j]));
        }

        self.line(format!("\tcall\t{}", callee));

        if let Some(result) = &instr.result {
            let dst = self.resolve(result);
            if dst != "%rax" {
                self.line(format!("\tmovq\t%rax, {}", dst));
            }
        }

        if pad {
            self.line("\taddq\t$8, %rsp");
        }
        for &s in saves.iter().rev() {
            self.line(format!("\tpopq\t{}", POOL[s]));
        }
        if argc > 0 {
            self.line(format!("\taddq\t${}, %rsp", argc as i64 * 8));
        }
        Ok(())
    }

    fn epilogue(&mut self) {
        if let Some(offset) = self.rbx_offset {
            self.line(format!("\tmovq\t{}(%rbp), %rbx", offset));
        }
        self.line("\tleave");
        self.line("\tret");
    }

    // ==================== Operand plumbing ====================

    /// Resolve an operand to an assembly operand string.
    fn resolve(&self, operand: &Operand) -> String {
        match operand {
            Operand::Const { value, .. } => format!("${}", value),
            Operand::Temp(id) => match self.location(*id) {
                Location::Reg(s) => POOL[s].to_string(),
                Location::Spill(k) => format!("{}(%rbp)", self.spill_offset(k)),
            },
            Operand::Var(name) => match self.vars.offset_of(name) {
                Some(offset) => format!("{}(%rbp)", offset),
                // Free symbol: leave it to the assembler/linker.
                None => name.clone(),
            },
            Operand::Func(name) => name.clone(),
            Operand::Label(id) => format!("L{}", id),
        }
    }

    fn location(&self, id: u32) -> Location {
        self.alloc
            .as_ref()
            .and_then(|a| a.location(id))
            .unwrap_or(Location::Reg(0))
    }

    fn spill_offset(&self, k: usize) -> i64 {
        -(self.spill_base + 8 * (k as i64 + 1))
    }

    /// Working register for a result operand: its own pool register, or
    /// `%r10` plus a write-back location when it lives in memory.
    fn dest_reg(&self, result: &Operand) -> (&'static str, Option<String>) {
        match result {
            Operand::Temp(id) => match self.location(*id) {
                Location::Reg(s) => (POOL[s], None),
                Location::Spill(k) => ("%r10", Some(format!("{}(%rbp)", self.spill_offset(k)))),
            },
            _ => ("%r10", Some(self.resolve(result))),
        }
    }

    fn write_back(&mut self, rd: &str, writeback: Option<String>) {
        if let Some(mem) = writeback {
            self.line(format!("\tmovq\t{}, {}", rd, mem));
        }
    }

    /// `movq src, dst` honoring the no-two-memory-operands rule and
    /// 64-bit immediates; elides moves onto the same register.
    fn move_value(&mut self, src: &Operand, dst: &Operand) {
        let to = self.resolve(dst);
        match src {
            Operand::Const { value, .. } if !imm_fits_i32(*value) && is_mem(&to) => {
                self.line(format!("\tmovq\t${}, %r10", value));
                self.line(format!("\tmovq\t%r10, {}", to));
            }
            _ => {
                let from = self.resolve(src);
                if is_mem(&from) && is_mem(&to) {
                    self.line(format!("\tmovq\t{}, %r10", from));
                    self.line(format!("\tmovq\t%r10, {}", to));
                } else if from != to {
                    self.line(format!("\tmovq\t{}, {}", from, to));
                }
            }
        }
    }

    /// Plain move into a specific register.
    fn mov(&mut self, from: &str, to: &str) {
        if from != to {
            self.line(format!("\tmovq\t{}, {}", from, to));
        }
    }

    /// Store `%r10` into a result operand.
    fn store_from_scratch(&mut self, result: &Operand) {
        let dst = self.resolve(result);
        self.line(format!("\tmovq\t%r10, {}", dst));
    }

    /// Source operand for add/sub/imul: immediates that do not fit 32
    /// bits are materialized in `%r11` first.
    fn arith_source(&mut self, operand: &Operand) -> String {
        if let Some(value) = operand.const_value() {
            if !imm_fits_i32(value) {
                self.line(format!("\tmovq\t${}, %r11", value));
                return "%r11".to_string();
            }
        }
        self.resolve(operand)
    }

    /// Operand usable as the register/memory side of a `cmpq`;
    /// constants are materialized into `scratch`.
    fn cmp_operand(&mut self, operand: &Operand, scratch: &str) -> String {
        if operand.is_const() {
            let imm = self.resolve(operand);
            self.line(format!("\tmovq\t{}, {}", imm, scratch));
            return scratch.to_string();
        }
        self.resolve(operand)
    }

    /// Right-hand side of a comparison: an immediate is fine, but two
    /// memory operands are not.
    fn cmp_right_operand(&mut self, operand: &Operand, left: &str) -> String {
        if let Some(value) = operand.const_value() {
            if !imm_fits_i32(value) {
                self.line(format!("\tmovq\t${}, %r11", value));
                return "%r11".to_string();
            }
            return format!("${}", value);
        }
        let resolved = self.resolve(operand);
        if is_mem(&resolved) && is_mem(left) {
            self.line(format!("\tmovq\t{}, %r11", resolved));
            return "%r11".to_string();
        }
        resolved
    }

    fn line(&mut self, s: impl Into<String>) {
        self.lines.push(s.into());
    }
}

fn is_mem(operand: &str) -> bool {
    operand.ends_with(')')
}

fn imm_fits_i32(value: i64) -> bool {
    i32::try_from(value).is_ok()
}
