//! Register assignment for temps.
//!
//! The pool is assigned round-robin the first time a temp is seen, and a
//! temp keeps its register for its whole live range. A pre-computed
//! last-use table lets registers be reused once their temp is dead; when
//! all eight registers hold live temps the new temp falls back to a
//! stack slot instead of silently colliding.

use crate::ir::{Instr, Operand};
use std::collections::HashMap;

/// The register pool, assigned round-robin.
pub const POOL: [&str; 8] = [
    "%rax", "%rbx", "%rcx", "%rdx", "%rsi", "%rdi", "%r8", "%r9",
];

/// Pool index of `%rbx`, the only callee-saved member.
pub const RBX: usize = 1;

/// Argument registers of the System V AMD64 integer ABI, in order.
pub const ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

/// Where a temp lives for its whole range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Index into [`POOL`]
    Reg(usize),
    /// Index of a dedicated spill slot in the frame
    Spill(usize),
}

/// Register assignment for one function.
#[derive(Debug)]
pub struct Allocation {
    location: HashMap<u32, Location>,
    ranges: HashMap<u32, (usize, usize)>,
    /// Number of spill slots handed out
    pub spill_count: usize,
    /// Whether any temp was placed in `%rbx`
    pub uses_rbx: bool,
}

impl Allocation {
    /// Plan the assignment for a function's instructions.
    pub fn plan(instrs: &[Instr]) -> Self {
        let mut ranges: HashMap<u32, (usize, usize)> = HashMap::new();
        for (idx, instr) in instrs.iter().enumerate() {
            for operand in [&instr.arg1, &instr.arg2, &instr.result] {
                if let Some(Operand::Temp(id)) = operand {
                    ranges
                        .entry(*id)
                        .and_modify(|(_, end)| *end = idx)
                        .or_insert((idx, idx));
                }
            }
        }

        let mut location = HashMap::new();
        let mut holder: [Option<u32>; POOL.len()] = [None; POOL.len()];
        let mut cursor = 0usize;
        let mut spill_count = 0usize;
        let mut uses_rbx = false;

        for (idx, instr) in instrs.iter().enumerate() {
            for operand in [&instr.arg1, &instr.arg2, &instr.result] {
                let Some(Operand::Temp(id)) = operand else {
                    continue;
                };
                if location.contains_key(id) {
                    continue;
                }
                // Registers whose temp died strictly before this
                // instruction are free again. Temps last used here keep
                // theirs, so an operand and its result never alias.
                for slot in holder.iter_mut() {
                    if let Some(held) = slot {
                        if ranges[held].1 < idx {
                            *slot = None;
                        }
                    }
                }
                let free = (0..POOL.len())
                    .map(|k| (cursor + k) % POOL.len())
                    .find(|&s| holder[s].is_none());
                match free {
                    Some(s) => {
                        holder[s] = Some(*id);
                        cursor = (s + 1) % POOL.len();
                        if s == RBX {
                            uses_rbx = true;
                        }
                        location.insert(*id, Location::Reg(s));
                    }
                    None => {
                        location.insert(*id, Location::Spill(spill_count));
                        spill_count += 1;
                    }
                }
            }
        }

        Self {
            location,
            ranges,
            spill_count,
            uses_rbx,
        }
    }

    /// Location of a temp.
    pub fn location(&self, id: u32) -> Option<Location> {
        self.location.get(&id).copied()
    }

    /// Pool indices of caller-saved registers holding temps that are
    /// live across instruction `idx` (defined before it, used after it).
    /// `%rbx` is excluded: callees preserve it.
    pub fn live_caller_saved_at(&self, idx: usize) -> Vec<usize> {
        let mut regs: Vec<usize> = self
            .location
            .iter()
            .filter_map(|(id, loc)| {
                let Location::Reg(s) = loc else { return None };
                if *s == RBX {
                    return None;
                }
                let (start, end) = self.ranges[id];
                (start < idx && end > idx).then_some(*s)
            })
            .collect();
        regs.sort_unstable();
        regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    fn load(temp: u32) -> Instr {
        Instr::new(
            Opcode::Load,
            Some(Operand::int(1)),
            None,
            Some(Operand::Temp(temp)),
        )
    }

    fn ret(temp: u32) -> Instr {
        Instr::new(Opcode::Return, Some(Operand::Temp(temp)), None, None)
    }

    #[test]
    fn test_round_robin_first_seen() {
        let instrs = vec![load(0), load(1), load(2), ret(0)];
        let alloc = Allocation::plan(&instrs);
        assert_eq!(alloc.location(0), Some(Location::Reg(0)));
        assert_eq!(alloc.location(1), Some(Location::Reg(1)));
        assert_eq!(alloc.location(2), Some(Location::Reg(2)));
        assert!(alloc.uses_rbx);
        assert_eq!(alloc.spill_count, 0);
    }

    #[test]
    fn test_dead_register_reused() {
        // t0..t7 fill the pool; t0 dies at its load, so once the pool
        // wraps the cursor finds t0's register free for t8.
        let mut instrs: Vec<Instr> = (0..8).map(load).collect();
        instrs.push(load(8));
        instrs.push(ret(8));
        let alloc = Allocation::plan(&instrs);
        assert_eq!(alloc.location(8), Some(Location::Reg(0)));
        assert_eq!(alloc.spill_count, 0);
    }

    #[test]
    fn test_spill_when_all_live() {
        let add = |a: u32, b: u32, r: u32| {
            Instr::new(
                Opcode::Add,
                Some(Operand::Temp(a)),
                Some(Operand::Temp(b)),
                Some(Operand::Temp(r)),
            )
        };
        // t0..t7 fill the pool and every one of them is still live when
        // t8 is defined at index 8, so t8 must spill. By index 9 the
        // first pair has died and t9 gets a register again.
        let mut instrs: Vec<Instr> = (0..8).map(load).collect();
        instrs.push(add(0, 1, 8));
        instrs.push(add(2, 3, 9));
        instrs.push(add(4, 5, 10));
        instrs.push(add(6, 7, 11));
        let alloc = Allocation::plan(&instrs);
        assert_eq!(alloc.location(8), Some(Location::Spill(0)));
        assert_eq!(alloc.spill_count, 1);
        assert!(matches!(alloc.location(9), Some(Location::Reg(_))));
    }

    #[test]
    fn test_result_never_aliases_operand_dying_at_same_instruction() {
        let instrs = vec![
            load(0),
            load(1),
            Instr::new(
                Opcode::Add,
                Some(Operand::Temp(0)),
                Some(Operand::Temp(1)),
                Some(Operand::Temp(2)),
            ),
            ret(2),
        ];
        let alloc = Allocation::plan(&instrs);
        let r0 = alloc.location(0).unwrap();
        let r1 = alloc.location(1).unwrap();
        let r2 = alloc.location(2).unwrap();
        assert_ne!(r2, r0);
        assert_ne!(r2, r1);
    }

    #[test]
    fn test_live_across_call() {
        // t0 defined before the call and used after it is live across;
        // t1 (the call result) is not.
        let instrs = vec![
            load(0),
            Instr::new(
                Opcode::Call,
                Some(Operand::Func("f".into())),
                None,
                Some(Operand::Temp(1)),
            ),
            Instr::new(
                Opcode::Add,
                Some(Operand::Temp(0)),
                Some(Operand::Temp(1)),
                Some(Operand::Temp(2)),
            ),
            ret(2),
        ];
        let alloc = Allocation::plan(&instrs);
        let live = alloc.live_caller_saved_at(1);
        assert_eq!(live, vec![0]); // t0 in %rax
    }
}
