//! Heap management for the JavaScript runtime.
//!
//! Every garbage-collected thing (strings, symbols, objects, environments and
//! realms) lives in a slot of one arena owned by the [`Heap`]. Cells refer to
//! each other through [`CellId`] handles, so cyclic structures such as
//! environment chains need no owning pointers. A handle carries the generation
//! of the slot it was issued for; once the slot is swept and reused, the old
//! handle no longer resolves.
//!
//! Liveness is decided only by reachability from the root set handed to
//! [`Heap::collect`].

use std::collections::HashMap;
use std::fmt;
use std::mem::size_of;

use crate::runner::ds::env_record::Binding;
use crate::runner::ds::error::{ErrorMessage, JErrorType};
use crate::runner::ds::lex_env::LexEnvironment;
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::realm::CodeRealm;
use crate::runner::ds::symbol::SymbolData;
use crate::runner::ds::value::JsValue;

/// Handle to a cell in the [`Heap`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    index: u32,
    generation: u32,
}

impl CellId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell#{}.{}", self.index, self.generation)
    }
}

/// Receives the outgoing edges of a cell or of any other structure that holds cells.
pub trait CellVisitor {
    fn visit(&mut self, cell: CellId);

    fn visit_value(&mut self, value: &JsValue) {
        if let Some(cell) = value.as_cell() {
            self.visit(cell);
        }
    }
}

/// Why a cell was reported as a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapRoot {
    Vm,
    Realm,
    ExecutionContext,
    SavedExecutionContext,
    StoredModule,
    Script,
    PromiseJob,
    FinalizationRegistry,
}

pub enum HeapCell {
    String(String),
    Symbol(SymbolData),
    Object(JsObject),
    Environment(LexEnvironment),
    Realm(CodeRealm),
}

impl HeapCell {
    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        match self {
            HeapCell::String(_) | HeapCell::Symbol(_) => {}
            HeapCell::Object(o) => o.visit_edges(visitor),
            HeapCell::Environment(e) => e.visit_edges(visitor),
            HeapCell::Realm(r) => r.visit_edges(visitor),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            HeapCell::String(_) => "String",
            HeapCell::Symbol(_) => "Symbol",
            HeapCell::Object(_) => "Object",
            HeapCell::Environment(_) => "Environment",
            HeapCell::Realm(_) => "Realm",
        }
    }

    /// Rough footprint, taken once when the cell is allocated.
    fn estimated_size(&self) -> usize {
        size_of::<HeapCell>()
            + match self {
                HeapCell::String(s) => s.len(),
                HeapCell::Symbol(s) => s.description().map(|d| d.len()).unwrap_or(0),
                HeapCell::Object(o) => o.estimated_size(),
                HeapCell::Environment(e) => {
                    e.record.declarative().map(|d| d.len() * size_of::<Binding>()).unwrap_or(0)
                }
                HeapCell::Realm(_) => 0,
            }
    }
}

/// Configuration for the heap manager.
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Maximum heap size in bytes. None means unlimited.
    pub max_bytes: Option<usize>,
}

impl HeapConfig {
    /// Create a new heap configuration with no memory limit.
    pub fn unlimited() -> Self {
        HeapConfig { max_bytes: None }
    }

    /// Create a new heap configuration with a memory limit.
    pub fn with_limit(max_bytes: usize) -> Self {
        HeapConfig {
            max_bytes: Some(max_bytes),
        }
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::unlimited()
    }
}

struct Slot {
    generation: u32,
    bytes: usize,
    cell: Option<HeapCell>,
}

/// Outcome of one [`Heap::collect`] run.
#[derive(Debug, Default)]
pub struct CollectionReport {
    pub freed_cells: usize,
    pub freed_bytes: usize,
    /// Registries that lost at least one target and now owe a cleanup.
    pub registries_needing_cleanup: Vec<CellId>,
}

pub struct Heap {
    config: HeapConfig,
    allocated_bytes: usize,
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    collections: u64,
}

impl Heap {
    /// Create a new heap with the given configuration.
    pub fn new(config: HeapConfig) -> Self {
        Heap {
            config,
            allocated_bytes: 0,
            slots: Vec::new(),
            free_list: Vec::new(),
            collections: 0,
        }
    }

    /// Place `cell` in the arena.
    ///
    /// Returns an error if the allocation would exceed the memory limit.
    pub fn allocate(&mut self, cell: HeapCell) -> Result<CellId, JErrorType> {
        let bytes = cell.estimated_size();
        if !self.can_allocate(bytes) {
            return Err(JErrorType::InternalError(ErrorMessage::OutOfMemory.format("")));
        }
        self.allocated_bytes += bytes;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.bytes = bytes;
            slot.cell = Some(cell);
            Ok(CellId {
                index,
                generation: slot.generation,
            })
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                bytes,
                cell: Some(cell),
            });
            Ok(CellId {
                index,
                generation: 0,
            })
        }
    }

    /// Get the current allocated bytes.
    pub fn get_allocated(&self) -> usize {
        self.allocated_bytes
    }

    /// Get the maximum allowed bytes, if any.
    pub fn get_max_bytes(&self) -> Option<usize> {
        self.config.max_bytes
    }

    /// Check if allocation of the given size would succeed.
    pub fn can_allocate(&self, bytes: usize) -> bool {
        if let Some(max_bytes) = self.config.max_bytes {
            self.allocated_bytes + bytes <= max_bytes
        } else {
            true
        }
    }

    /// Get the remaining available bytes, if limited.
    pub fn available_bytes(&self) -> Option<usize> {
        self.config
            .max_bytes
            .map(|max| max.saturating_sub(self.allocated_bytes))
    }

    pub fn live_cells(&self) -> usize {
        self.slots.iter().filter(|s| s.cell.is_some()).count()
    }

    pub fn collections(&self) -> u64 {
        self.collections
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: CellId) -> Option<&HeapCell> {
        match self.slots.get(id.index()) {
            Some(slot) if slot.generation == id.generation => slot.cell.as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut HeapCell> {
        match self.slots.get_mut(id.index()) {
            Some(slot) if slot.generation == id.generation => slot.cell.as_mut(),
            _ => None,
        }
    }

    pub fn string(&self, id: CellId) -> &str {
        match self.get(id) {
            Some(HeapCell::String(s)) => s,
            other => mistyped(id, "String", other),
        }
    }

    pub fn symbol(&self, id: CellId) -> &SymbolData {
        match self.get(id) {
            Some(HeapCell::Symbol(s)) => s,
            other => mistyped(id, "Symbol", other),
        }
    }

    pub fn object(&self, id: CellId) -> &JsObject {
        match self.get(id) {
            Some(HeapCell::Object(o)) => o,
            other => mistyped(id, "Object", other),
        }
    }

    pub fn object_mut(&mut self, id: CellId) -> &mut JsObject {
        match self.get_mut(id) {
            Some(HeapCell::Object(o)) => o,
            _ => panic!("{:?} is not a live Object cell", id),
        }
    }

    pub fn environment(&self, id: CellId) -> &LexEnvironment {
        match self.get(id) {
            Some(HeapCell::Environment(e)) => e,
            other => mistyped(id, "Environment", other),
        }
    }

    pub fn environment_mut(&mut self, id: CellId) -> &mut LexEnvironment {
        match self.get_mut(id) {
            Some(HeapCell::Environment(e)) => e,
            _ => panic!("{:?} is not a live Environment cell", id),
        }
    }

    pub fn realm(&self, id: CellId) -> &CodeRealm {
        match self.get(id) {
            Some(HeapCell::Realm(r)) => r,
            other => mistyped(id, "Realm", other),
        }
    }

    pub fn realm_mut(&mut self, id: CellId) -> &mut CodeRealm {
        match self.get_mut(id) {
            Some(HeapCell::Realm(r)) => r,
            _ => panic!("{:?} is not a live Realm cell", id),
        }
    }

    /// Mark everything reachable from `roots`, clear dead weak targets held by
    /// finalization registries, then sweep the rest.
    pub fn collect(&mut self, roots: &HashMap<CellId, HeapRoot>) -> CollectionReport {
        let mut marks = vec![false; self.slots.len()];
        {
            let mut marker = Marker {
                slots: &self.slots,
                marks: &mut marks,
                worklist: Vec::new(),
            };
            for cell in roots.keys() {
                marker.visit(*cell);
            }
            while let Some(cell) = marker.worklist.pop() {
                let slots = marker.slots;
                if let Some(c) = slots[cell.index()].cell.as_ref() {
                    c.visit_edges(&mut marker);
                }
            }
        }

        let mut report = CollectionReport::default();
        let generations: Vec<u32> = self.slots.iter().map(|s| s.generation).collect();
        let is_live = |cell: CellId| {
            marks.get(cell.index()).copied().unwrap_or(false)
                && generations[cell.index()] == cell.generation
        };
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !marks[index] {
                continue;
            }
            if let Some(HeapCell::Object(object)) = slot.cell.as_mut() {
                if let ObjectKind::FinalizationRegistry(registry) = &mut object.kind {
                    if registry.clear_dead_targets(&is_live) {
                        report.registries_needing_cleanup.push(CellId {
                            index: index as u32,
                            generation: slot.generation,
                        });
                    }
                }
            }
        }

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if marks[index] || slot.cell.is_none() {
                continue;
            }
            slot.cell = None;
            slot.generation = slot.generation.wrapping_add(1);
            report.freed_cells += 1;
            report.freed_bytes += slot.bytes;
            self.allocated_bytes = self.allocated_bytes.saturating_sub(slot.bytes);
            slot.bytes = 0;
            self.free_list.push(index as u32);
        }
        self.collections += 1;
        report
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

fn mistyped(id: CellId, expected: &str, found: Option<&HeapCell>) -> ! {
    match found {
        Some(cell) => panic!("{:?} is a {} cell, expected {}", id, cell.type_name(), expected),
        None => panic!("{:?} is not a live {} cell", id, expected),
    }
}

struct Marker<'a> {
    slots: &'a [Slot],
    marks: &'a mut [bool],
    worklist: Vec<CellId>,
}

impl<'a> CellVisitor for Marker<'a> {
    fn visit(&mut self, cell: CellId) {
        let index = cell.index();
        if let Some(slot) = self.slots.get(index) {
            if slot.generation == cell.generation && slot.cell.is_some() && !self.marks[index] {
                self.marks[index] = true;
                self.worklist.push(cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::object::JsObject;
    use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};

    fn string_cell(s: &str) -> HeapCell {
        HeapCell::String(s.to_string())
    }

    #[test]
    fn test_heap_unlimited() {
        let mut heap = Heap::new(HeapConfig::unlimited());
        assert!(heap.allocate(string_cell("a")).is_ok());
        assert!(heap.allocate(string_cell(&"x".repeat(100_000))).is_ok());
        assert_eq!(heap.live_cells(), 2);
        assert!(heap.get_allocated() > 100_000);
    }

    #[test]
    fn test_heap_limited() {
        let mut heap = Heap::new(HeapConfig::with_limit(size_of::<HeapCell>() * 2 + 8));
        assert!(heap.allocate(string_cell("abcd")).is_ok());
        assert!(heap.allocate(string_cell("efgh")).is_ok());

        // This should fail
        let result = heap.allocate(string_cell("ijkl"));
        assert!(result.is_err());
        if let Err(JErrorType::InternalError(msg)) = result {
            assert_eq!(msg, "Out of memory");
        }
    }

    #[test]
    fn test_heap_collect_frees_unrooted() {
        let mut heap = Heap::default();
        let kept = heap.allocate(string_cell("kept")).unwrap();
        let dropped = heap.allocate(string_cell("dropped")).unwrap();
        let before = heap.get_allocated();

        let mut roots = HashMap::new();
        roots.insert(kept, HeapRoot::Vm);
        let report = heap.collect(&roots);

        assert_eq!(report.freed_cells, 1);
        assert_eq!(heap.get_allocated(), before - report.freed_bytes);
        assert!(heap.contains(kept));
        assert!(!heap.contains(dropped));
        assert_eq!(heap.string(kept), "kept");
    }

    #[test]
    fn test_heap_collect_follows_edges() {
        let mut heap = Heap::default();
        let name = heap.allocate(string_cell("value")).unwrap();
        let mut object = JsObject::ordinary(None);
        object.define_own_property(
            PropertyKey::from("v"),
            PropertyDescriptor::data(JsValue::String(name)),
        );
        let holder = heap.allocate(HeapCell::Object(object)).unwrap();

        let mut roots = HashMap::new();
        roots.insert(holder, HeapRoot::ExecutionContext);
        let report = heap.collect(&roots);

        assert_eq!(report.freed_cells, 0);
        assert!(heap.contains(name));
    }

    #[test]
    fn test_heap_stale_handle_after_reuse() {
        let mut heap = Heap::default();
        let first = heap.allocate(string_cell("first")).unwrap();
        heap.collect(&HashMap::new());
        let second = heap.allocate(string_cell("second")).unwrap();

        assert_eq!(first.index(), second.index());
        assert!(heap.get(first).is_none());
        assert_eq!(heap.string(second), "second");
    }

    #[test]
    fn test_heap_available_bytes() {
        let mut heap = Heap::new(HeapConfig::with_limit(10_000));
        assert_eq!(heap.available_bytes(), Some(10_000));
        heap.allocate(string_cell("abc")).unwrap();
        assert_eq!(
            heap.available_bytes(),
            Some(10_000 - heap.get_allocated())
        );
        assert!(heap.can_allocate(100));
        assert!(!heap.can_allocate(10_001));
    }
}
