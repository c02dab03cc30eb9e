//! Constant folding.
//!
//! Any binary operation whose operands are both constants is rewritten
//! into a `LOAD` of the folded value. Division and modulo by zero are
//! left alone: their behavior belongs to the emitted program, not the
//! compiler.

use crate::ir::{IrList, Opcode, Operand};

/// Constant folder with a counter of applied folds.
#[derive(Debug, Default)]
pub struct ConstantFolder {
    fold_count: usize,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of folds performed so far.
    pub fn fold_count(&self) -> usize {
        self.fold_count
    }

    /// Fold every constant-constant operation in the list; returns the
    /// number of rewrites.
    pub fn optimize(&mut self, list: &mut IrList) -> usize {
        let mut folds = 0;
        for instr in &mut list.instrs {
            if !instr.op.is_binary() {
                continue;
            }
            let (Some(a), Some(b)) = (
                instr.arg1.as_ref().and_then(Operand::const_value),
                instr.arg2.as_ref().and_then(Operand::const_value),
            ) else {
                continue;
            };
            let Some(folded) = fold(instr.op, a, b) else {
                continue;
            };
            instr.arg1 = Some(folded);
            instr.arg2 = None;
            instr.op = Opcode::Load;
            folds += 1;
        }
        self.fold_count += folds;
        folds
    }
}

/// Evaluate `a op b`, or `None` when the operation must stay (div/mod by
/// zero). Comparisons and logic fold to 0/1 marked as bool.
fn fold(op: Opcode, a: i64, b: i64) -> Option<Operand> {
    let int = |v: i64| Some(Operand::int(v));
    let boolean = |v: bool| Some(Operand::boolean(v));
    match op {
        Opcode::Add => int(a.wrapping_add(b)),
        Opcode::Sub => int(a.wrapping_sub(b)),
        Opcode::Mul => int(a.wrapping_mul(b)),
        Opcode::Div if b != 0 => int(a.wrapping_div(b)),
        Opcode::Mod if b != 0 => int(a.wrapping_rem(b)),
        Opcode::Div | Opcode::Mod => None,
        Opcode::Eq => boolean(a == b),
        Opcode::Neq => boolean(a != b),
        Opcode::Lt => boolean(a < b),
        Opcode::Le => boolean(a <= b),
        Opcode::Gt => boolean(a > b),
        Opcode::Ge => boolean(a >= b),
        Opcode::And => boolean(a != 0 && b != 0),
        Opcode::Or => boolean(a != 0 || b != 0),
        _ => None,
    }
}

/// Run constant folding once over a list.
pub fn optimize_with_constant_folding(list: &mut IrList) -> usize {
    ConstantFolder::new().optimize(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instr;

    fn binop(op: Opcode, a: i64, b: i64) -> IrList {
        let mut list = IrList::new();
        list.emit(
            op,
            Some(Operand::int(a)),
            Some(Operand::int(b)),
            Some(Operand::Temp(0)),
        );
        list
    }

    fn folded_value(list: &IrList) -> Option<i64> {
        match &list.instrs[0] {
            Instr {
                op: Opcode::Load,
                arg1: Some(operand),
                ..
            } => operand.const_value(),
            _ => None,
        }
    }

    #[test]
    fn test_arithmetic_folds() {
        for (op, a, b, expected) in [
            (Opcode::Add, 2, 3, 5),
            (Opcode::Sub, 2, 3, -1),
            (Opcode::Mul, 6, 7, 42),
            (Opcode::Div, 7, 2, 3),
            (Opcode::Mod, 7, 2, 1),
        ] {
            let mut list = binop(op, a, b);
            assert_eq!(optimize_with_constant_folding(&mut list), 1);
            assert_eq!(folded_value(&list), Some(expected), "{:?}", op);
        }
    }

    #[test]
    fn test_comparisons_fold_to_zero_one() {
        for (op, a, b, expected) in [
            (Opcode::Eq, 1, 1, 1),
            (Opcode::Neq, 1, 1, 0),
            (Opcode::Lt, 1, 2, 1),
            (Opcode::Le, 2, 2, 1),
            (Opcode::Gt, 1, 2, 0),
            (Opcode::Ge, 1, 2, 0),
            (Opcode::And, 1, 0, 0),
            (Opcode::Or, 1, 0, 1),
        ] {
            let mut list = binop(op, a, b);
            optimize_with_constant_folding(&mut list);
            assert_eq!(folded_value(&list), Some(expected), "{:?}", op);
        }
    }

    #[test]
    fn test_division_by_zero_skipped() {
        let mut list = binop(Opcode::Div, 1, 0);
        assert_eq!(optimize_with_constant_folding(&mut list), 0);
        assert_eq!(list.instrs[0].op, Opcode::Div);

        let mut list = binop(Opcode::Mod, 1, 0);
        assert_eq!(optimize_with_constant_folding(&mut list), 0);
    }

    #[test]
    fn test_non_const_operands_left_alone() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Add,
            Some(Operand::Temp(0)),
            Some(Operand::int(1)),
            Some(Operand::Temp(1)),
        );
        assert_eq!(optimize_with_constant_folding(&mut list), 0);
        assert_eq!(list.instrs[0].op, Opcode::Add);
    }

    #[test]
    fn test_counter_accumulates() {
        let mut folder = ConstantFolder::new();
        let mut list = binop(Opcode::Add, 1, 1);
        folder.optimize(&mut list);
        let mut list = binop(Opcode::Mul, 2, 2);
        folder.optimize(&mut list);
        assert_eq!(folder.fold_count(), 2);
    }
}
