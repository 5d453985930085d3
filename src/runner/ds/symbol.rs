use std::fmt;
use std::fmt::{Display, Formatter};

use crate::runner::ds::error::ThrowCompletionOr;
use crate::runner::ds::heap::{CellId, CellVisitor, Heap, HeapCell};

pub struct SymbolData {
    description: Option<String>,
    /// Set for symbols created through the global registry (`Symbol.for`).
    is_registered: bool,
}

impl SymbolData {
    pub fn new(description: Option<String>) -> Self {
        SymbolData {
            description,
            is_registered: false,
        }
    }

    pub fn new_registered(key: String) -> Self {
        SymbolData {
            description: Some(key),
            is_registered: true,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.is_registered
    }
}

impl Display for SymbolData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description.as_deref().unwrap_or(""))
    }
}

/* Well known symbols */
pub const SYMBOL_ASYNC_ITERATOR: &str = "Symbol.asyncIterator";
pub const SYMBOL_HAS_INSTANCE: &str = "Symbol.hasInstance";
pub const SYMBOL_IS_CONCAT_SPREADABLE: &str = "Symbol.isConcatSpreadable";
pub const SYMBOL_ITERATOR: &str = "Symbol.iterator";
pub const SYMBOL_MATCH: &str = "Symbol.match";
pub const SYMBOL_MATCH_ALL: &str = "Symbol.matchAll";
pub const SYMBOL_REPLACE: &str = "Symbol.replace";
pub const SYMBOL_SEARCH: &str = "Symbol.search";
pub const SYMBOL_SPECIES: &str = "Symbol.species";
pub const SYMBOL_SPLIT: &str = "Symbol.split";
pub const SYMBOL_TO_PRIMITIVE: &str = "Symbol.toPrimitive";
pub const SYMBOL_TO_STRING_TAG: &str = "Symbol.toStringTag";
pub const SYMBOL_UNSCOPABLES: &str = "Symbol.unscopables";

/// The well-known symbols shared by every realm of one engine instance.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownSymbols {
    pub async_iterator: CellId,
    pub has_instance: CellId,
    pub is_concat_spreadable: CellId,
    pub iterator: CellId,
    pub match_: CellId,
    pub match_all: CellId,
    pub replace: CellId,
    pub search: CellId,
    pub species: CellId,
    pub split: CellId,
    pub to_primitive: CellId,
    pub to_string_tag: CellId,
    pub unscopables: CellId,
}

impl WellKnownSymbols {
    pub fn create(heap: &mut Heap) -> ThrowCompletionOr<Self> {
        let mut make = |description: &str| {
            heap.allocate(HeapCell::Symbol(SymbolData::new(Some(
                description.to_string(),
            ))))
        };
        Ok(WellKnownSymbols {
            async_iterator: make(SYMBOL_ASYNC_ITERATOR)?,
            has_instance: make(SYMBOL_HAS_INSTANCE)?,
            is_concat_spreadable: make(SYMBOL_IS_CONCAT_SPREADABLE)?,
            iterator: make(SYMBOL_ITERATOR)?,
            match_: make(SYMBOL_MATCH)?,
            match_all: make(SYMBOL_MATCH_ALL)?,
            replace: make(SYMBOL_REPLACE)?,
            search: make(SYMBOL_SEARCH)?,
            species: make(SYMBOL_SPECIES)?,
            split: make(SYMBOL_SPLIT)?,
            to_primitive: make(SYMBOL_TO_PRIMITIVE)?,
            to_string_tag: make(SYMBOL_TO_STRING_TAG)?,
            unscopables: make(SYMBOL_UNSCOPABLES)?,
        })
    }

    pub fn all(&self) -> [CellId; 13] {
        [
            self.async_iterator,
            self.has_instance,
            self.is_concat_spreadable,
            self.iterator,
            self.match_,
            self.match_all,
            self.replace,
            self.search,
            self.species,
            self.split,
            self.to_primitive,
            self.to_string_tag,
            self.unscopables,
        ]
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for symbol in self.all().iter() {
            visitor.visit(*symbol);
        }
    }
}
