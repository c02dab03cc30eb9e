//! Constant propagation.
//!
//! One linear scan keeps a map from temp id to known constant value:
//! `LOAD <const>, tN` records the value, later uses of `tN` in operand
//! position are replaced by the constant, and a temp is invalidated as
//! soon as it is redefined by anything other than another constant load.
//!
//! `RETURN` operands are deliberately not substituted: the defining load
//! stays the single value channel of a returned constant, so dead-code
//! elimination keeps exactly that one `LOAD`.

use crate::ir::{IrList, Opcode, Operand};
use std::collections::HashMap;

/// Constant propagator with a counter of substituted operands.
#[derive(Debug, Default)]
pub struct ConstantPropagator {
    propagation_count: usize,
}

impl ConstantPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operands substituted so far.
    pub fn propagation_count(&self) -> usize {
        self.propagation_count
    }

    /// Propagate constants through the list once; returns the number of
    /// substituted operands.
    pub fn optimize(&mut self, list: &mut IrList) -> usize {
        let mut known: HashMap<u32, (i64, bool)> = HashMap::new();
        let mut substitutions = 0;

        for instr in &mut list.instrs {
            // Record constant loads.
            if instr.op == Opcode::Load {
                if let (Some(Operand::Const { value, is_bool }), Some(Operand::Temp(id))) =
                    (&instr.arg1, &instr.result)
                {
                    known.insert(*id, (*value, *is_bool));
                }
            }

            // Substitute known temps in use positions.
            if instr.op != Opcode::Return {
                for arg in [&mut instr.arg1, &mut instr.arg2] {
                    let Some(operand) = arg else { continue };
                    let Some(id) = operand.temp_id() else {
                        continue;
                    };
                    if let Some(&(value, is_bool)) = known.get(&id) {
                        *operand = Operand::Const { value, is_bool };
                        substitutions += 1;
                    }
                }
            }

            // Invalidate temps redefined by anything but a constant load.
            if let Some(Operand::Temp(id)) = &instr.result {
                let still_const = instr.op == Opcode::Load
                    && instr.arg1.as_ref().is_some_and(Operand::is_const);
                if !still_const {
                    known.remove(id);
                }
            }
        }

        self.propagation_count += substitutions;
        substitutions
    }
}

/// Run constant propagation once over a list.
pub fn optimize_with_constant_propagation(list: &mut IrList) -> usize {
    ConstantPropagator::new().optimize(list)
}
