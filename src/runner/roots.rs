//! Root enumeration for the collector.

use std::collections::HashMap;

use tracing::debug;

use crate::runner::ds::heap::{CellId, CellVisitor, CollectionReport, HeapRoot};
use crate::runner::vm::Vm;

/// Adds every visited cell to the root map under one reason. A cell that is
/// already present keeps the reason it was first reported with.
struct RootCollector<'a> {
    roots: &'a mut HashMap<CellId, HeapRoot>,
    reason: HeapRoot,
}

impl<'a> CellVisitor for RootCollector<'a> {
    fn visit(&mut self, cell: CellId) {
        self.roots.entry(cell).or_insert(self.reason);
    }
}

impl Vm {
    /// Report every cell the engine itself keeps alive.
    pub fn gather_roots(&self, roots: &mut HashMap<CellId, HeapRoot>) {
        let mut vm_roots = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::Vm,
        };
        vm_roots.visit(self.empty_string);
        for string in &self.single_ascii_character_strings {
            vm_roots.visit(*string);
        }
        self.well_known_symbols.visit_edges(&mut vm_roots);
        for symbol in self.global_symbol_registry.values() {
            vm_roots.visit(*symbol);
        }

        if let Some(realm) = self.realm {
            roots.entry(realm).or_insert(HeapRoot::Realm);
        }

        let mut registries = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::FinalizationRegistry,
        };
        for registry in self.job_queues.pending_cleanup_registries() {
            registries.visit(*registry);
        }

        let mut live = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::ExecutionContext,
        };
        for ctx in self.execution_context_stack.contexts() {
            ctx.visit_edges(&mut live);
        }

        let mut saved = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::SavedExecutionContext,
        };
        for stack in self.execution_context_stack.saved_stacks() {
            for ctx in stack {
                ctx.visit_edges(&mut saved);
            }
        }

        let mut jobs = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::PromiseJob,
        };
        self.job_queues.visit_promise_job_edges(&mut jobs);

        let mut modules = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::StoredModule,
        };
        for stored in &self.stored_modules {
            stored.visit_edges(&mut modules);
        }
        for module in &self.modules {
            module.visit_edges(&mut modules);
        }

        let mut scripts = RootCollector {
            roots: &mut *roots,
            reason: HeapRoot::Script,
        };
        for script in &self.scripts {
            script.visit_edges(&mut scripts);
        }
    }

    /// Mark from the gathered roots and sweep. Registries that lost a target
    /// get their cleanup enqueued through the host hook.
    pub fn collect_garbage(&mut self) -> CollectionReport {
        let mut roots = HashMap::new();
        self.gather_roots(&mut roots);
        let report = self.heap.collect(&roots);
        debug!(
            vm = %self.id(),
            roots = roots.len(),
            freed_cells = report.freed_cells,
            freed_bytes = report.freed_bytes,
            "collected garbage"
        );
        let enqueue = self.host_hooks.enqueue_finalization_registry_cleanup_job.clone();
        for registry in &report.registries_needing_cleanup {
            enqueue(self, *registry);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ds::execution_context::ExecutionContext;
    use crate::runner::ds::value::JsValue;
    use crate::runner::vm::test_support::bare_vm;

    #[test]
    fn ascii_strings_and_symbols_are_vm_roots() {
        let vm = bare_vm();
        let mut roots = HashMap::new();
        vm.gather_roots(&mut roots);
        assert_eq!(roots.get(&vm.empty_string), Some(&HeapRoot::Vm));
        assert_eq!(roots.get(&vm.single_ascii_character_strings[b'a' as usize]), Some(&HeapRoot::Vm));
        assert_eq!(roots.get(&vm.well_known_symbols.iterator), Some(&HeapRoot::Vm));
        assert_eq!(roots.get(&vm.current_realm()), Some(&HeapRoot::Realm));
    }

    #[test]
    fn registered_symbols_are_roots() {
        let mut vm = bare_vm();
        let symbol = vm.symbol_for("app.key").unwrap();
        let mut roots = HashMap::new();
        vm.gather_roots(&mut roots);
        assert_eq!(roots.get(&symbol), Some(&HeapRoot::Vm));
    }

    #[test]
    fn saved_stack_keeps_its_cells() {
        let mut vm = bare_vm();
        let realm = vm.current_realm();
        let held = vm.new_object().unwrap();
        let mut ctx = ExecutionContext::new(realm);
        ctx.arguments.push(JsValue::Object(held));
        vm.push_execution_context(ctx);
        vm.save_execution_context_stack();

        let mut roots = HashMap::new();
        vm.gather_roots(&mut roots);
        assert_eq!(roots.get(&held), Some(&HeapRoot::SavedExecutionContext));

        vm.collect_garbage();
        assert!(vm.heap().contains(held));
        vm.restore_execution_context_stack();
    }

    #[test]
    fn unreachable_objects_are_freed() {
        let mut vm = bare_vm();
        let garbage = vm.new_object().unwrap();
        let report = vm.collect_garbage();
        assert!(report.freed_cells >= 1);
        assert!(!vm.heap().contains(garbage));
    }
}
