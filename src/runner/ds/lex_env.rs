use crate::runner::ds::env_record::EnvironmentRecordType;
use crate::runner::ds::heap::{CellId, CellVisitor};

/// One node of an environment chain. `outer` is a plain handle: the chain is
/// kept alive by whoever references its innermost node, not by the links.
pub struct LexEnvironment {
    pub record: EnvironmentRecordType,
    pub outer: Option<CellId>,
}

impl LexEnvironment {
    pub fn new(record: EnvironmentRecordType, outer: Option<CellId>) -> Self {
        LexEnvironment { record, outer }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        self.record.visit_edges(visitor);
        if let Some(outer) = self.outer {
            visitor.visit(outer);
        }
    }
}

/// Cached position of a binding relative to the environment a lookup started
/// from: follow `hops` outer links, then read slot `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvironmentCoordinate {
    pub hops: u32,
    pub index: u32,
}
