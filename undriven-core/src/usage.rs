//! Symbol usage table.
//!
//! One [`UsageRecord`] per declaration, filled in by the traversal and read by
//! the policy engine once traversal ends. Counters only ever grow during a
//! pass; shards built by parallel workers are combined with [`UsageTable::merge`].

use serde::Serialize;

use crate::design::DeclId;

/// Access counters for one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub reads: u32,
    /// Reads that only touched part of the value (bit/part/field select)
    pub partial_reads: u32,
    pub writes: u32,
    /// Writes that only covered part of the value
    pub partial_writes: u32,
    /// Object or covergroup constructed into this declaration
    pub constructed: bool,
    /// Reached through a handle that could not be bound to a concrete source
    pub unresolved: bool,
}

impl UsageRecord {
    pub fn is_read(&self) -> bool {
        self.reads > 0
    }

    pub fn is_written(&self) -> bool {
        self.writes > 0
    }

    pub fn is_accessed(&self) -> bool {
        self.reads > 0 || self.writes > 0 || self.constructed
    }

    /// Every write was partial, so the value may never be fully assigned.
    pub fn only_partial_writes(&self) -> bool {
        self.writes > 0 && self.writes == self.partial_writes
    }

    pub fn whole_reads(&self) -> u32 {
        self.reads - self.partial_reads
    }

    fn absorb(&mut self, other: &UsageRecord) {
        self.reads += other.reads;
        self.partial_reads += other.partial_reads;
        self.writes += other.writes;
        self.partial_writes += other.partial_writes;
        self.constructed |= other.constructed;
        self.unresolved |= other.unresolved;
    }
}

/// Usage records for every declaration of one design.
///
/// Besides the counters the table remembers the order in which the traversal
/// first met each declaration, and which declarations had their whole
/// container traversed.
#[derive(Debug, Clone)]
pub struct UsageTable {
    records: Vec<UsageRecord>,
    registered: Vec<bool>,
    completed: Vec<bool>,
    order: Vec<DeclId>,
}

impl UsageTable {
    pub fn new(decl_count: usize) -> Self {
        Self {
            records: vec![UsageRecord::default(); decl_count],
            registered: vec![false; decl_count],
            completed: vec![false; decl_count],
            order: Vec::new(),
        }
    }

    /// Notes that the traversal reached the declaration site of `id`.
    ///
    /// Only the first call has an effect.
    pub fn register(&mut self, id: DeclId) {
        let slot = &mut self.registered[id.index()];
        if !*slot {
            *slot = true;
            self.order.push(id);
        }
    }

    pub fn is_registered(&self, id: DeclId) -> bool {
        self.registered[id.index()]
    }

    /// Declarations in first-visit order.
    pub fn order(&self) -> &[DeclId] {
        &self.order
    }

    pub fn record(&self, id: DeclId) -> &UsageRecord {
        &self.records[id.index()]
    }

    pub fn add_read(&mut self, id: DeclId, partial: bool) {
        let rec = &mut self.records[id.index()];
        rec.reads += 1;
        if partial {
            rec.partial_reads += 1;
        }
    }

    pub fn add_write(&mut self, id: DeclId, partial: bool) {
        let rec = &mut self.records[id.index()];
        rec.writes += 1;
        if partial {
            rec.partial_writes += 1;
        }
    }

    pub fn mark_constructed(&mut self, id: DeclId) {
        self.records[id.index()].constructed = true;
    }

    pub fn mark_unresolved(&mut self, id: DeclId) {
        self.records[id.index()].unresolved = true;
    }

    /// Every reference to `id` has been visited.
    pub fn mark_completed(&mut self, id: DeclId) {
        self.completed[id.index()] = true;
    }

    pub fn is_completed(&self, id: DeclId) -> bool {
        self.completed[id.index()]
    }

    /// Folds a shard produced by another worker into this table.
    ///
    /// Counters are summed; first-visit order continues with the shard's
    /// declarations not already seen.
    pub fn merge(&mut self, shard: &UsageTable) {
        for (mine, theirs) in self.records.iter_mut().zip(&shard.records) {
            mine.absorb(theirs);
        }
        for (mine, theirs) in self.completed.iter_mut().zip(&shard.completed) {
            *mine |= *theirs;
        }
        for id in &shard.order {
            self.register(*id);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_keeps_first_visit_order() {
        let mut table = UsageTable::new(4);
        table.register(DeclId(2));
        table.register(DeclId(0));
        table.register(DeclId(2));
        assert_eq!(table.order(), &[DeclId(2), DeclId(0)]);
        assert!(!table.is_registered(DeclId(1)));
    }

    #[test]
    fn test_partial_write_tracking() {
        let mut table = UsageTable::new(1);
        table.add_write(DeclId(0), true);
        assert!(table.record(DeclId(0)).only_partial_writes());
        table.add_write(DeclId(0), false);
        assert!(!table.record(DeclId(0)).only_partial_writes());
    }

    #[test]
    fn test_whole_reads() {
        let mut table = UsageTable::new(1);
        table.add_read(DeclId(0), true);
        table.add_read(DeclId(0), false);
        assert_eq!(table.record(DeclId(0)).whole_reads(), 1);
    }

    #[test]
    fn test_merge_sums_counters() {
        let mut a = UsageTable::new(3);
        a.register(DeclId(1));
        a.add_read(DeclId(1), false);

        let mut b = UsageTable::new(3);
        b.register(DeclId(2));
        b.register(DeclId(1));
        b.add_read(DeclId(1), false);
        b.add_write(DeclId(2), false);
        b.mark_constructed(DeclId(2));
        b.mark_completed(DeclId(2));

        a.merge(&b);
        assert_eq!(a.record(DeclId(1)).reads, 2);
        assert_eq!(a.record(DeclId(2)).writes, 1);
        assert!(a.record(DeclId(2)).constructed);
        assert!(a.is_completed(DeclId(2)));
        assert_eq!(a.order(), &[DeclId(1), DeclId(2)]);
    }
}
