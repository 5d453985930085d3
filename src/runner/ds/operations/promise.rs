//! The slice of promise machinery the engine itself needs: settling promises,
//! registering reactions and turning reactions into queued jobs.

use std::mem;

use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, HeapCell};
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::promise::{
    PromiseData, PromiseReaction, PromiseState, ReactionHandler, RejectionOperation,
};
use crate::runner::ds::realm::WellKnownIntrinsics;
use crate::runner::ds::value::JsValue;
use crate::runner::jobs::Job;
use crate::runner::vm::Vm;

impl Vm {
    pub fn new_promise(&mut self) -> ThrowCompletionOr<CellId> {
        let proto = self.intrinsic(WellKnownIntrinsics::PromisePrototype);
        self.heap.allocate(HeapCell::Object(JsObject::new(
            Some(proto),
            ObjectKind::Promise(PromiseData::new()),
        )))
    }

    pub fn is_promise(&self, value: &JsValue) -> bool {
        match value {
            JsValue::Object(o) => matches!(self.heap.object(*o).kind, ObjectKind::Promise(_)),
            _ => false,
        }
    }

    fn promise_data_mut(&mut self, promise: CellId) -> ThrowCompletionOr<&mut PromiseData> {
        match &mut self.heap.object_mut(promise).kind {
            ObjectKind::Promise(data) => Ok(data),
            _ => Err(JErrorType::TypeError("object is not a Promise".to_string())),
        }
    }

    pub fn promise_state(&self, promise: CellId) -> ThrowCompletionOr<PromiseState> {
        match &self.heap.object(promise).kind {
            ObjectKind::Promise(data) => Ok(data.state),
            _ => Err(JErrorType::TypeError("object is not a Promise".to_string())),
        }
    }

    /// Resolve `promise` with `resolution`. Another promise of this engine is
    /// adopted, anything else fulfils. Only the first resolve or reject counts.
    pub fn resolve_promise(&mut self, promise: CellId, resolution: JsValue) -> ThrowCompletionOr<()> {
        {
            let data = self.promise_data_mut(promise)?;
            if data.already_resolved {
                return Ok(());
            }
            data.already_resolved = true;
        }
        if resolution == JsValue::Object(promise) {
            let reason = self.error_to_value(&JErrorType::TypeError(
                "Chaining cycle detected for promise".to_string(),
            ))?;
            return self.settle_rejected(promise, reason);
        }
        if let (true, JsValue::Object(other)) = (self.is_promise(&resolution), resolution) {
            let job = Job::new(Box::new(move |vm: &mut Vm| {
                let reaction = PromiseReaction::native(
                    Box::new(move |vm: &mut Vm, value| {
                        vm.settle_fulfilled(promise, value)?;
                        Ok(JsValue::Undefined)
                    }),
                    Box::new(move |vm: &mut Vm, reason| {
                        vm.settle_rejected(promise, reason)?;
                        Ok(JsValue::Undefined)
                    }),
                )
                .holding(&[JsValue::Object(promise)]);
                vm.perform_promise_then(other, reaction)?;
                Ok(JsValue::Undefined)
            }))
            .holding(&[JsValue::Object(promise), resolution]);
            let realm = Some(self.current_realm());
            let enqueue = self.host_hooks.enqueue_promise_job.clone();
            enqueue(self, job, realm);
            return Ok(());
        }
        self.settle_fulfilled(promise, resolution)
    }

    pub fn reject_promise(&mut self, promise: CellId, reason: JsValue) -> ThrowCompletionOr<()> {
        {
            let data = self.promise_data_mut(promise)?;
            if data.already_resolved {
                return Ok(());
            }
            data.already_resolved = true;
        }
        self.settle_rejected(promise, reason)
    }

    fn settle_fulfilled(&mut self, promise: CellId, value: JsValue) -> ThrowCompletionOr<()> {
        let reactions = {
            let data = self.promise_data_mut(promise)?;
            if data.state != PromiseState::Pending {
                return Ok(());
            }
            data.state = PromiseState::Fulfilled(value);
            mem::take(&mut data.reactions)
        };
        self.trigger_promise_reactions(reactions, value, true);
        Ok(())
    }

    fn settle_rejected(&mut self, promise: CellId, reason: JsValue) -> ThrowCompletionOr<()> {
        let (reactions, is_handled) = {
            let data = self.promise_data_mut(promise)?;
            if data.state != PromiseState::Pending {
                return Ok(());
            }
            data.state = PromiseState::Rejected(reason);
            (mem::take(&mut data.reactions), data.is_handled)
        };
        if !is_handled {
            let tracker = self.host_hooks.promise_rejection_tracker.clone();
            tracker(self, promise, RejectionOperation::Reject);
        }
        self.trigger_promise_reactions(reactions, reason, false);
        Ok(())
    }

    /// Register `reaction` on `promise`. A promise that has already settled
    /// gets its reaction queued right away.
    pub fn perform_promise_then(&mut self, promise: CellId, reaction: PromiseReaction) -> ThrowCompletionOr<()> {
        let (state, was_handled) = {
            let data = self.promise_data_mut(promise)?;
            let was_handled = data.is_handled;
            data.is_handled = true;
            if data.state == PromiseState::Pending {
                data.reactions.push(reaction);
                return Ok(());
            }
            (data.state, was_handled)
        };
        match state {
            PromiseState::Fulfilled(value) => self.trigger_promise_reactions(vec![reaction], value, true),
            PromiseState::Rejected(reason) => {
                if !was_handled {
                    let tracker = self.host_hooks.promise_rejection_tracker.clone();
                    tracker(self, promise, RejectionOperation::Handle);
                }
                self.trigger_promise_reactions(vec![reaction], reason, false)
            }
            PromiseState::Pending => {}
        }
        Ok(())
    }

    /// `then` with script callables. Non-callable handlers are skipped.
    pub fn perform_promise_then_with_callbacks(
        &mut self,
        promise: CellId,
        on_fulfilled: JsValue,
        on_rejected: JsValue,
    ) -> ThrowCompletionOr<()> {
        let make_job_callback = self.host_hooks.make_job_callback.clone();
        let mut reaction = PromiseReaction {
            on_fulfilled: None,
            on_rejected: None,
            held: Vec::new(),
        };
        if let (true, Some(f)) = (self.is_callable(&on_fulfilled), on_fulfilled.as_object()) {
            reaction.on_fulfilled = Some(ReactionHandler::Callback(make_job_callback(self, f)));
        }
        if let (true, Some(f)) = (self.is_callable(&on_rejected), on_rejected.as_object()) {
            reaction.on_rejected = Some(ReactionHandler::Callback(make_job_callback(self, f)));
        }
        self.perform_promise_then(promise, reaction)
    }

    fn trigger_promise_reactions(&mut self, reactions: Vec<PromiseReaction>, argument: JsValue, fulfilled: bool) {
        let realm = Some(self.current_realm());
        for reaction in reactions {
            let PromiseReaction {
                on_fulfilled,
                on_rejected,
                mut held,
            } = reaction;
            let handler = if fulfilled { on_fulfilled } else { on_rejected };
            held.push(argument);
            if let Some(ReactionHandler::Callback(cb)) = &handler {
                held.push(JsValue::Object(cb.callback));
            }
            let job = Job::new(Box::new(move |vm: &mut Vm| match handler {
                None => Ok(argument),
                Some(ReactionHandler::Native(f)) => f(vm, argument),
                Some(ReactionHandler::Callback(cb)) => {
                    let call_job_callback = vm.host_hooks.call_job_callback.clone();
                    call_job_callback(vm, &cb, JsValue::Undefined, &[argument])
                }
            }))
            .holding(&held);
            let enqueue = self.host_hooks.enqueue_promise_job.clone();
            enqueue(self, job, realm);
        }
    }

    /// Materialise an engine error so it can travel as a rejection reason.
    pub fn error_to_value(&mut self, error: &JErrorType) -> ThrowCompletionOr<JsValue> {
        if let JErrorType::Thrown(value) = error {
            return Ok(*value);
        }
        let proto = self.intrinsic(WellKnownIntrinsics::ErrorPrototype);
        let object = self.new_object_with_prototype(Some(proto))?;
        let name = self.js_string(error.name())?;
        let message = self.js_string(error.message().unwrap_or(""))?;
        let o = self.heap.object_mut(object);
        o.define_own_property(PropertyKey::from("name"), PropertyDescriptor::hidden(name));
        o.define_own_property(PropertyKey::from("message"), PropertyDescriptor::hidden(message));
        Ok(JsValue::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use crate::runner::ds::heap::CellId;
    use crate::runner::ds::promise::{PromiseReaction, PromiseState};
    use crate::runner::ds::value::JsValue;
    use crate::runner::vm::test_support::bare_vm;
    use crate::runner::vm::Vm;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn reactions_run_as_jobs_in_order() {
        let mut vm = bare_vm();
        let promise = vm.new_promise().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let seen = seen.clone();
            let reaction = PromiseReaction::native(
                Box::new(move |_, v| {
                    seen.borrow_mut().push((tag, v));
                    Ok(JsValue::Undefined)
                }),
                Box::new(|_, _| Ok(JsValue::Undefined)),
            );
            vm.perform_promise_then(promise, reaction).unwrap();
        }
        vm.resolve_promise(promise, JsValue::from_i64(7)).unwrap();
        assert!(seen.borrow().is_empty());

        vm.run_queued_promise_jobs();
        let tags: Vec<i32> = seen.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![0, 1, 2]);
        assert!(seen.borrow().iter().all(|(_, v)| *v == JsValue::from_i64(7)));
    }

    #[test]
    fn adopting_a_promise_follows_its_outcome() {
        let mut vm = bare_vm();
        let outer = vm.new_promise().unwrap();
        let inner = vm.new_promise().unwrap();
        vm.resolve_promise(outer, JsValue::Object(inner)).unwrap();
        vm.reject_promise(outer, JsValue::Null).unwrap();
        vm.run_queued_promise_jobs();
        assert_eq!(vm.promise_state(outer).unwrap(), PromiseState::Pending);

        vm.reject_promise(inner, JsValue::from_i64(3)).unwrap();
        vm.run_queued_promise_jobs();
        assert_eq!(
            vm.promise_state(outer).unwrap(),
            PromiseState::Rejected(JsValue::from_i64(3))
        );
    }

    #[test]
    fn self_resolution_rejects_with_type_error() {
        let mut vm = bare_vm();
        let promise = vm.new_promise().unwrap();
        vm.resolve_promise(promise, JsValue::Object(promise)).unwrap();
        match vm.promise_state(promise).unwrap() {
            PromiseState::Rejected(JsValue::Object(_)) => {}
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn rejection_tracker_sees_reject_then_handle() {
        let mut vm = bare_vm();
        let events = Rc::new(RefCell::new(Vec::new()));
        let unhandled = events.clone();
        vm.set_on_promise_unhandled_rejection(Rc::new(move |_: &mut Vm, p: CellId| unhandled.borrow_mut().push(("reject", p))));
        let handled = events.clone();
        vm.set_on_promise_rejection_handled(Rc::new(move |_: &mut Vm, p: CellId| handled.borrow_mut().push(("handle", p))));

        let promise = vm.new_promise().unwrap();
        vm.reject_promise(promise, JsValue::Null).unwrap();
        let reaction = PromiseReaction::native(
            Box::new(|_, v| Ok(v)),
            Box::new(|_, v| Ok(v)),
        );
        vm.perform_promise_then(promise, reaction).unwrap();

        assert_eq!(*events.borrow(), vec![("reject", promise), ("handle", promise)]);
    }
}
