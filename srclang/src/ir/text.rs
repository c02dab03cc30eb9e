//! The IR text format.
//!
//! One instruction per line, operands comma-separated:
//!
//! ```text
//! METHOD fn:                 EXTERN fn
//! PARAM v                    LABEL L0:
//! LOAD src, dst              STORE src, dst
//! ADD a, b, r                (SUB/MUL/DIV/MOD/AND/OR/EQ/NEQ/LT/LE/GT/GE analogous)
//! NOT a, r                   UMINUS a, r
//! GOTO L0                    IF_FALSE cond, L0    IF_TRUE cond, L0
//! RETURN [v]                 CALL fn[, r]         LOAD_PARAM v
//! ```
//!
//! This format is the hand-off between the optimizer and the emitter, so
//! `parse_ir(&write_ir(list))` must reproduce `list` (minus NOPs).

use super::{Instr, IrList, Opcode, Operand};
use std::fmt::Write as _;
use thiserror::Error;

/// Error parsing IR text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IrTextError {
    #[error("IR line {line}: unknown instruction '{mnemonic}'")]
    UnknownMnemonic { mnemonic: String, line: usize },

    #[error("IR line {line}: {mnemonic} expects {expected} operand(s), found {found}")]
    WrongOperandCount {
        mnemonic: &'static str,
        expected: &'static str,
        found: usize,
        line: usize,
    },

    #[error("IR line {line}: '{token}' is not a label")]
    NotALabel { token: String, line: usize },
}

/// Serialize an IR list; NOP-ed instructions produce no output.
pub fn write_ir(list: &IrList) -> String {
    let mut out = String::new();
    for instr in list.live_instrs() {
        write_instr(&mut out, instr);
    }
    out
}

/// Format one instruction as a single IR text line, without the
/// trailing newline.
pub fn format_instr(instr: &Instr) -> String {
    let mut out = String::new();
    write_instr(&mut out, instr);
    out.truncate(out.trim_end().len());
    out
}

fn write_instr(out: &mut String, instr: &Instr) {
    let mnemonic = instr.op.mnemonic();
    match instr.op {
        Opcode::Load | Opcode::Store | Opcode::Not | Opcode::UMinus => {
            let _ = writeln!(
                out,
                "{} {}, {}",
                mnemonic,
                instr.arg1.as_ref().expect("source operand"),
                instr.result.as_ref().expect("destination operand"),
            );
        }
        op if op.is_binary() => {
            let _ = writeln!(
                out,
                "{} {}, {}, {}",
                mnemonic,
                instr.arg1.as_ref().expect("left operand"),
                instr.arg2.as_ref().expect("right operand"),
                instr.result.as_ref().expect("result operand"),
            );
        }
        Opcode::Label | Opcode::Method => {
            let _ = writeln!(
                out,
                "{} {}:",
                mnemonic,
                instr.result.as_ref().expect("name operand"),
            );
        }
        Opcode::Extern | Opcode::Param | Opcode::Goto => {
            let _ = writeln!(
                out,
                "{} {}",
                mnemonic,
                instr.result.as_ref().expect("name operand"),
            );
        }
        Opcode::IfFalse | Opcode::IfTrue => {
            let _ = writeln!(
                out,
                "{} {}, {}",
                mnemonic,
                instr.arg1.as_ref().expect("condition operand"),
                instr.result.as_ref().expect("target label"),
            );
        }
        Opcode::Return | Opcode::CallParam => match &instr.arg1 {
            Some(arg) => {
                let _ = writeln!(out, "{} {}", mnemonic, arg);
            }
            None => {
                let _ = writeln!(out, "{}", mnemonic);
            }
        },
        Opcode::Call => {
            let func = instr.arg1.as_ref().expect("callee operand");
            match &instr.result {
                Some(result) => {
                    let _ = writeln!(out, "{} {}, {}", mnemonic, func, result);
                }
                None => {
                    let _ = writeln!(out, "{} {}", mnemonic, func);
                }
            }
        }
        _ => unreachable!("all opcodes are covered above"),
    }
}

/// Parse IR text back into an instruction list.
pub fn parse_ir(text: &str) -> Result<IrList, IrTextError> {
    let mut list = IrList::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, rest.trim()),
            None => (line, ""),
        };
        let Some(op) = Opcode::from_mnemonic(mnemonic) else {
            return Err(IrTextError::UnknownMnemonic {
                mnemonic: mnemonic.to_string(),
                line: line_no,
            });
        };
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };
        list.instrs.push(parse_instr(op, &operands, line_no)?);
    }
    Ok(list)
}

fn parse_instr(op: Opcode, operands: &[&str], line: usize) -> Result<Instr, IrTextError> {
    let count_err = |expected: &'static str| IrTextError::WrongOperandCount {
        mnemonic: op.mnemonic(),
        expected,
        found: operands.len(),
        line,
    };

    match op {
        Opcode::Load | Opcode::Store | Opcode::Not | Opcode::UMinus => match operands {
            [src, dst] => Ok(Instr::new(
                op,
                Some(classify(src)),
                None,
                Some(classify(dst)),
            )),
            _ => Err(count_err("2")),
        },
        o if o.is_binary() => match operands {
            [a, b, r] => Ok(Instr::new(
                op,
                Some(classify(a)),
                Some(classify(b)),
                Some(classify(r)),
            )),
            _ => Err(count_err("3")),
        },
        Opcode::Label => match operands {
            // A bare LABEL line is a NOP-ed instruction.
            [] => Ok(Instr::new(Opcode::Label, None, None, None)),
            [name] => Ok(Instr::new(
                op,
                None,
                None,
                Some(parse_label(name.trim_end_matches(':'), line)?),
            )),
            _ => Err(count_err("0 or 1")),
        },
        Opcode::Method | Opcode::Extern => match operands {
            [name] => Ok(Instr::new(
                op,
                None,
                None,
                Some(Operand::Func(name.trim_end_matches(':').to_string())),
            )),
            _ => Err(count_err("1")),
        },
        Opcode::Param => match operands {
            [name] => Ok(Instr::new(
                op,
                None,
                None,
                Some(Operand::Var((*name).to_string())),
            )),
            _ => Err(count_err("1")),
        },
        Opcode::Goto => match operands {
            [target] => Ok(Instr::new(op, None, None, Some(parse_label(target, line)?))),
            _ => Err(count_err("1")),
        },
        Opcode::IfFalse | Opcode::IfTrue => match operands {
            [cond, target] => Ok(Instr::new(
                op,
                Some(classify(cond)),
                None,
                Some(parse_label(target, line)?),
            )),
            _ => Err(count_err("2")),
        },
        Opcode::Return => match operands {
            [] => Ok(Instr::new(op, None, None, None)),
            [value] => Ok(Instr::new(op, Some(classify(value)), None, None)),
            _ => Err(count_err("0 or 1")),
        },
        Opcode::CallParam => match operands {
            [value] => Ok(Instr::new(op, Some(classify(value)), None, None)),
            _ => Err(count_err("1")),
        },
        Opcode::Call => match operands {
            [func] => Ok(Instr::new(
                op,
                Some(Operand::Func((*func).to_string())),
                None,
                None,
            )),
            [func, result] => Ok(Instr::new(
                op,
                Some(Operand::Func((*func).to_string())),
                None,
                Some(classify(result)),
            )),
            _ => Err(count_err("1 or 2")),
        },
        _ => unreachable!("all opcodes are covered above"),
    }
}

/// Classify a value operand by shape: `tN` is a temp, `LN` a label, a
/// (possibly negative) number a constant, anything else a variable.
fn classify(token: &str) -> Operand {
    if let Some(id) = numbered(token, 't') {
        return Operand::Temp(id);
    }
    if let Some(id) = numbered(token, 'L') {
        return Operand::Label(id);
    }
    if let Ok(value) = token.parse::<i64>() {
        return Operand::int(value);
    }
    Operand::Var(token.to_string())
}

fn parse_label(token: &str, line: usize) -> Result<Operand, IrTextError> {
    match numbered(token, 'L') {
        Some(id) => Ok(Operand::Label(id)),
        None => Err(IrTextError::NotALabel {
            token: token.to_string(),
            line,
        }),
    }
}

fn numbered(token: &str, prefix: char) -> Option<u32> {
    let rest = token.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}
