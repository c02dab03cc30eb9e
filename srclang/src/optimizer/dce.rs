//! Dead-code elimination.
//!
//! Mark-and-sweep over the flat instruction list. Instructions with
//! side effects or control-flow meaning are live from the start; any
//! live instruction then marks the nearest earlier definition of each of
//! its temp operands, iterated to a fixed point. Unmarked instructions
//! that only produce a temp are NOP-ed in place.

use crate::ir::{IrList, Opcode, Operand};

/// Dead-code eliminator with an elimination counter.
#[derive(Debug, Default)]
pub struct DeadCodeEliminator {
    elimination_count: usize,
}

impl DeadCodeEliminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions eliminated so far.
    pub fn elimination_count(&self) -> usize {
        self.elimination_count
    }

    /// Eliminate dead instructions; returns how many were NOP-ed.
    pub fn optimize(&mut self, list: &mut IrList) -> usize {
        let instrs = &mut list.instrs;
        let mut live = vec![false; instrs.len()];

        // Roots: anything observable or structural.
        for (i, instr) in instrs.iter().enumerate() {
            if matches!(
                instr.op,
                Opcode::Store
                    | Opcode::Return
                    | Opcode::Call
                    | Opcode::Label
                    | Opcode::Goto
                    | Opcode::IfFalse
                    | Opcode::IfTrue
                    | Opcode::Method
                    | Opcode::Extern
                    | Opcode::Param
                    | Opcode::CallParam
            ) {
                live[i] = true;
            }
        }

        // Propagate liveness backwards to defining instructions until
        // nothing changes.
        let mut changed = true;
        while changed {
            changed = false;
            for i in (0..instrs.len()).rev() {
                if !live[i] {
                    continue;
                }
                for arg in [&instrs[i].arg1, &instrs[i].arg2] {
                    let Some(Operand::Temp(id)) = arg else {
                        continue;
                    };
                    if let Some(def) = nearest_definition(instrs, i, *id) {
                        if !live[def] {
                            live[def] = true;
                            changed = true;
                        }
                    }
                }
            }
        }

        // Sweep: NOP pure temp-producing instructions nobody marked.
        let mut eliminated = 0;
        for (i, instr) in instrs.iter_mut().enumerate() {
            if live[i] {
                continue;
            }
            let produces_temp = matches!(instr.result, Some(Operand::Temp(_)));
            let pure = instr.op.is_binary()
                || matches!(instr.op, Opcode::Not | Opcode::UMinus | Opcode::Load);
            if produces_temp && pure {
                instr.make_nop();
                eliminated += 1;
            }
        }

        self.elimination_count += eliminated;
        eliminated
    }
}

/// Index of the nearest definition of `tN` strictly before `use_index`.
fn nearest_definition(instrs: &[crate::ir::Instr], use_index: usize, id: u32) -> Option<usize> {
    (0..use_index)
        .rev()
        .find(|&j| instrs[j].result == Some(Operand::Temp(id)))
}

/// Run dead-code elimination once over a list.
pub fn optimize_with_dce(list: &mut IrList) -> usize {
    DeadCodeEliminator::new().optimize(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unused_load_removed() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::int(5)),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(Opcode::Return, None, None, None);
        assert_eq!(optimize_with_dce(&mut list), 1);
        assert!(list.instrs[0].is_nop());
    }

    #[test]
    fn test_returned_value_chain_kept() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::int(2)),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(
            Opcode::Load,
            Some(Operand::int(3)),
            None,
            Some(Operand::Temp(1)),
        );
        list.emit(
            Opcode::Add,
            Some(Operand::Temp(0)),
            Some(Operand::Temp(1)),
            Some(Operand::Temp(2)),
        );
        list.emit(Opcode::Return, Some(Operand::Temp(2)), None, None);
        assert_eq!(optimize_with_dce(&mut list), 0);
    }

    #[test]
    fn test_transitive_deadness() {
        // t1 feeds only t2, and t2 is unused: both go.
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::Var("x".into())),
            None,
            Some(Operand::Temp(1)),
        );
        list.emit(
            Opcode::UMinus,
            Some(Operand::Temp(1)),
            None,
            Some(Operand::Temp(2)),
        );
        list.emit(Opcode::Return, None, None, None);
        assert_eq!(optimize_with_dce(&mut list), 2);
    }

    #[test]
    fn test_stored_value_kept() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::int(1)),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(
            Opcode::Store,
            Some(Operand::Temp(0)),
            None,
            Some(Operand::Var("x".into())),
        );
        assert_eq!(optimize_with_dce(&mut list), 0);
    }

    #[test]
    fn test_call_is_never_removed() {
        // A call with an unused result temp stays: it may have effects.
        let mut list = IrList::new();
        list.emit(
            Opcode::Call,
            Some(Operand::Func("f".into())),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(Opcode::Return, None, None, None);
        assert_eq!(optimize_with_dce(&mut list), 0);
        assert_eq!(list.instrs[0].op, Opcode::Call);
    }

    #[test]
    fn test_branch_condition_kept() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::Var("b".into())),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(
            Opcode::IfFalse,
            Some(Operand::Temp(0)),
            None,
            Some(Operand::Label(0)),
        );
        list.emit(Opcode::Label, None, None, Some(Operand::Label(0)));
        assert_eq!(optimize_with_dce(&mut list), 0);
    }

    #[test]
    fn test_nearest_definition_wins() {
        // t0 is defined twice; only the second definition feeds the
        // return, so the first is dead.
        let mut list = IrList::new();
        list.emit(
            Opcode::Load,
            Some(Operand::int(1)),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(
            Opcode::Load,
            Some(Operand::int(2)),
            None,
            Some(Operand::Temp(0)),
        );
        list.emit(Opcode::Return, Some(Operand::Temp(0)), None, None);
        assert_eq!(optimize_with_dce(&mut list), 1);
        assert!(list.instrs[0].is_nop());
        assert!(!list.instrs[1].is_nop());
    }
}
