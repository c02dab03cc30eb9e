//! Peephole rewrites: algebraic identities and strength-reduction
//! bookkeeping.
//!
//! Identity rewrites turn an instruction into a cheaper one in place:
//! `x + 0`, `x - 0`, `x * 1` become plain loads, `x * 0` a load of zero,
//! `0 - x` a negation, `x - x` zero and `x / x` one. Multiplication and
//! division by a power of two are only counted here; the emitter lowers
//! those sites to `salq`/`sarq`.

use crate::ir::{IrList, Opcode, Operand};

/// Peephole rewriter with counters.
#[derive(Debug, Default)]
pub struct Peephole {
    rewrite_count: usize,
}

impl Peephole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identity rewrites applied so far.
    pub fn rewrite_count(&self) -> usize {
        self.rewrite_count
    }

    /// Apply identity rewrites once over the list; returns the number of
    /// rewrites.
    pub fn optimize(&mut self, list: &mut IrList) -> usize {
        let mut rewrites = 0;
        for instr in &mut list.instrs {
            let arg2_value = instr.arg2.as_ref().and_then(Operand::const_value);
            let arg1_value = instr.arg1.as_ref().and_then(Operand::const_value);
            // Equal non-constant operands (t - t, v / v). Equal constants
            // are folding's business, and 0/0 must stay a division.
            let operands_equal = match (&instr.arg1, &instr.arg2) {
                (Some(a), Some(b)) => !a.is_const() && a == b,
                _ => false,
            };

            match instr.op {
                Opcode::Add if arg2_value == Some(0) => {
                    let src = instr.arg1.take();
                    rewrite_to_load(instr, src);
                    rewrites += 1;
                }
                Opcode::Sub if arg2_value == Some(0) => {
                    let src = instr.arg1.take();
                    rewrite_to_load(instr, src);
                    rewrites += 1;
                }
                Opcode::Sub if operands_equal => {
                    rewrite_to_load(instr, Some(Operand::int(0)));
                    rewrites += 1;
                }
                Opcode::Sub if arg1_value == Some(0) => {
                    let operand = instr.arg2.take();
                    instr.op = Opcode::UMinus;
                    instr.arg1 = operand;
                    rewrites += 1;
                }
                Opcode::Mul if arg2_value == Some(1) => {
                    let src = instr.arg1.take();
                    rewrite_to_load(instr, src);
                    rewrites += 1;
                }
                Opcode::Mul if arg2_value == Some(0) => {
                    rewrite_to_load(instr, Some(Operand::int(0)));
                    rewrites += 1;
                }
                Opcode::Div if operands_equal => {
                    rewrite_to_load(instr, Some(Operand::int(1)));
                    rewrites += 1;
                }
                _ => {}
            }
        }
        self.rewrite_count += rewrites;
        rewrites
    }

    /// Count MUL/DIV instructions whose right operand is a power of two,
    /// the sites the emitter lowers to shifts.
    pub fn count_shift_candidates(&self, list: &IrList) -> usize {
        list.live_instrs()
            .filter(|instr| {
                matches!(instr.op, Opcode::Mul | Opcode::Div)
                    && instr
                        .arg2
                        .as_ref()
                        .and_then(Operand::const_value)
                        .is_some_and(is_shiftable_power_of_two)
            })
            .count()
    }
}

fn rewrite_to_load(instr: &mut crate::ir::Instr, src: Option<Operand>) {
    instr.op = Opcode::Load;
    instr.arg1 = src;
    instr.arg2 = None;
}

/// Powers of two worth shifting by: 2 and up (1 is the `x * 1` identity).
pub fn is_shiftable_power_of_two(value: i64) -> bool {
    value >= 2 && (value & (value - 1)) == 0
}

/// Exponent of a positive power of two.
pub fn log2(value: i64) -> u32 {
    debug_assert!(value > 0);
    63 - value.leading_zeros()
}

/// Run the peephole pass once over a list.
pub fn optimize_with_peephole(list: &mut IrList) -> usize {
    Peephole::new().optimize(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instr;

    fn single(op: Opcode, arg1: Operand, arg2: Operand) -> IrList {
        let mut list = IrList::new();
        list.emit(op, Some(arg1), Some(arg2), Some(Operand::Temp(9)));
        list
    }

    fn rewritten(list: &IrList) -> &Instr {
        &list.instrs[0]
    }

    #[test]
    fn test_add_zero() {
        let mut list = single(Opcode::Add, Operand::Temp(0), Operand::int(0));
        assert_eq!(optimize_with_peephole(&mut list), 1);
        let instr = rewritten(&list);
        assert_eq!(instr.op, Opcode::Load);
        assert_eq!(instr.arg1, Some(Operand::Temp(0)));
        assert_eq!(instr.result, Some(Operand::Temp(9)));
    }

    #[test]
    fn test_sub_zero_and_zero_sub() {
        let mut list = single(Opcode::Sub, Operand::Temp(0), Operand::int(0));
        optimize_with_peephole(&mut list);
        assert_eq!(rewritten(&list).op, Opcode::Load);

        let mut list = single(Opcode::Sub, Operand::int(0), Operand::Temp(0));
        optimize_with_peephole(&mut list);
        let instr = rewritten(&list);
        assert_eq!(instr.op, Opcode::UMinus);
        assert_eq!(instr.arg1, Some(Operand::Temp(0)));
        assert_eq!(instr.arg2, None);
    }

    #[test]
    fn test_mul_identities() {
        let mut list = single(Opcode::Mul, Operand::Temp(0), Operand::int(1));
        optimize_with_peephole(&mut list);
        assert_eq!(rewritten(&list).arg1, Some(Operand::Temp(0)));

        let mut list = single(Opcode::Mul, Operand::Temp(0), Operand::int(0));
        optimize_with_peephole(&mut list);
        assert_eq!(rewritten(&list).arg1, Some(Operand::int(0)));
    }

    #[test]
    fn test_sub_self_and_div_self() {
        let mut list = single(Opcode::Sub, Operand::Temp(4), Operand::Temp(4));
        optimize_with_peephole(&mut list);
        assert_eq!(rewritten(&list).arg1, Some(Operand::int(0)));

        let mut list = single(Opcode::Div, Operand::Var("x".into()), Operand::Var("x".into()));
        optimize_with_peephole(&mut list);
        assert_eq!(rewritten(&list).arg1, Some(Operand::int(1)));
    }

    #[test]
    fn test_zero_div_zero_untouched() {
        // 0 / 0 has equal constant operands but must stay a division.
        let mut list = single(Opcode::Div, Operand::int(0), Operand::int(0));
        assert_eq!(optimize_with_peephole(&mut list), 0);
        assert_eq!(rewritten(&list).op, Opcode::Div);
    }

    #[test]
    fn test_shift_candidates() {
        let mut list = IrList::new();
        list.emit(
            Opcode::Mul,
            Some(Operand::Temp(0)),
            Some(Operand::int(8)),
            Some(Operand::Temp(1)),
        );
        list.emit(
            Opcode::Div,
            Some(Operand::Temp(1)),
            Some(Operand::int(4)),
            Some(Operand::Temp(2)),
        );
        list.emit(
            Opcode::Mul,
            Some(Operand::Temp(2)),
            Some(Operand::int(6)),
            Some(Operand::Temp(3)),
        );
        let peephole = Peephole::new();
        assert_eq!(peephole.count_shift_candidates(&list), 2);
    }

    #[test]
    fn test_power_of_two_predicate() {
        assert!(is_shiftable_power_of_two(2));
        assert!(is_shiftable_power_of_two(1024));
        assert!(!is_shiftable_power_of_two(1));
        assert!(!is_shiftable_power_of_two(0));
        assert!(!is_shiftable_power_of_two(-8));
        assert!(!is_shiftable_power_of_two(6));
    }

    #[test]
    fn test_log2() {
        assert_eq!(log2(2), 1);
        assert_eq!(log2(8), 3);
        assert_eq!(log2(1024), 10);
    }
}
