//! Per-function variable table.
//!
//! Named variables get negative 8-byte slots off `%rbp`, handed out in
//! first-seen order; insertion de-duplicates by name.

/// Mapping from variable name to stack offset.
#[derive(Debug, Default)]
pub struct VarTable {
    vars: Vec<(String, i64)>,
    stack_size: i64,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `name`, allocating the next slot when absent.
    pub fn add(&mut self, name: &str) -> i64 {
        if let Some(offset) = self.offset_of(name) {
            return offset;
        }
        self.stack_size += 8;
        let offset = -self.stack_size;
        self.vars.push((name.to_string(), offset));
        offset
    }

    /// Offset of `name`, if it has a slot.
    pub fn offset_of(&self, name: &str) -> Option<i64> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, offset)| *offset)
    }

    /// Bytes occupied by variable slots.
    pub fn stack_size(&self) -> i64 {
        self.stack_size
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_negative_multiples_of_eight() {
        let mut table = VarTable::new();
        assert_eq!(table.add("x"), -8);
        assert_eq!(table.add("y"), -16);
        assert_eq!(table.add("z"), -24);
        assert_eq!(table.stack_size(), 24);
    }

    #[test]
    fn test_insertion_deduplicates() {
        let mut table = VarTable::new();
        assert_eq!(table.add("x"), -8);
        assert_eq!(table.add("x"), -8);
        assert_eq!(table.len(), 1);
        assert_eq!(table.stack_size(), 8);
    }

    #[test]
    fn test_missing_name() {
        let table = VarTable::new();
        assert_eq!(table.offset_of("ghost"), None);
    }
}
