//! IR optimization passes.
//!
//! The pipeline applies constant folding, constant propagation and the
//! peephole rewrites in that fixed order, repeating the three until a
//! fixed point is reached (folding exposes constants, propagation turns
//! temp reads into constants, and the new constants let the next round
//! fold further). Dead-code elimination runs last and is itself iterated
//! to a fixed point internally.

mod constant_folding;
mod constant_propagation;
mod dce;
mod peephole;

pub use constant_folding::{optimize_with_constant_folding, ConstantFolder};
pub use constant_propagation::{optimize_with_constant_propagation, ConstantPropagator};
pub use dce::{optimize_with_dce, DeadCodeEliminator};
pub use peephole::{is_shiftable_power_of_two, log2, optimize_with_peephole, Peephole};

use crate::ir::IrList;

/// Counters collected while optimizing one IR list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptStats {
    /// Constant-constant operations evaluated at compile time
    pub folds: usize,
    /// Temp operands replaced by known constants
    pub propagations: usize,
    /// Algebraic identity rewrites applied
    pub peephole_rewrites: usize,
    /// MUL/DIV by a power of two that the emitter may lower to a shift
    pub shift_eligible: usize,
    /// Instructions NOP-ed by dead-code elimination
    pub dce_eliminated: usize,
    /// Rounds of the fold/propagate/peephole loop
    pub iterations: usize,
}

impl OptStats {
    /// Total rewrites applied by all passes.
    pub fn total(&self) -> usize {
        self.folds + self.propagations + self.peephole_rewrites + self.dce_eliminated
    }
}

/// Run the whole optimization pipeline on an IR list in place.
pub fn optimize_ir(list: &mut IrList) -> OptStats {
    let mut stats = OptStats::default();
    let mut folder = ConstantFolder::new();
    let mut propagator = ConstantPropagator::new();
    let mut peephole = Peephole::new();

    // Every rewrite strictly reduces the amount of foldable or
    // propagatable material, so this loop terminates.
    loop {
        stats.iterations += 1;
        let mut changes = 0;
        changes += folder.optimize(list);
        changes += propagator.optimize(list);
        changes += peephole.optimize(list);
        if changes == 0 {
            break;
        }
    }

    stats.folds = folder.fold_count();
    stats.propagations = propagator.propagation_count();
    stats.peephole_rewrites = peephole.rewrite_count();
    stats.shift_eligible = peephole.count_shift_candidates(list);

    let mut dce = DeadCodeEliminator::new();
    stats.dce_eliminated = dce.optimize(list);

    stats
}
