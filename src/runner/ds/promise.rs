use crate::runner::ds::error::ThrowCompletionOr;
use crate::runner::ds::heap::CellVisitor;
use crate::runner::ds::value::JsValue;
use crate::runner::jobs::JobCallback;
use crate::runner::vm::Vm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

/// Operation passed to the host's rejection tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOperation {
    Reject,
    Handle,
}

pub type NativeReaction = Box<dyn FnOnce(&mut Vm, JsValue) -> ThrowCompletionOr<JsValue>>;

pub enum ReactionHandler {
    Callback(JobCallback),
    Native(NativeReaction),
}

/// One registered `then` pair. Native handlers must list whatever cells they
/// close over in `held`.
pub struct PromiseReaction {
    pub on_fulfilled: Option<ReactionHandler>,
    pub on_rejected: Option<ReactionHandler>,
    pub held: Vec<JsValue>,
}

impl PromiseReaction {
    pub fn native(on_fulfilled: NativeReaction, on_rejected: NativeReaction) -> Self {
        PromiseReaction {
            on_fulfilled: Some(ReactionHandler::Native(on_fulfilled)),
            on_rejected: Some(ReactionHandler::Native(on_rejected)),
            held: Vec::new(),
        }
    }

    pub fn holding(mut self, values: &[JsValue]) -> Self {
        self.held.extend_from_slice(values);
        self
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for handler in [&self.on_fulfilled, &self.on_rejected].iter() {
            if let Some(ReactionHandler::Callback(cb)) = handler {
                visitor.visit(cb.callback);
            }
        }
        for value in &self.held {
            visitor.visit_value(value);
        }
    }
}

pub struct PromiseData {
    pub state: PromiseState,
    /// Set by the first resolve or reject, including one that adopted another
    /// promise and left this one pending.
    pub already_resolved: bool,
    pub is_handled: bool,
    pub reactions: Vec<PromiseReaction>,
}

impl PromiseData {
    pub fn new() -> Self {
        PromiseData {
            state: PromiseState::Pending,
            already_resolved: false,
            is_handled: false,
            reactions: Vec::new(),
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        match &self.state {
            PromiseState::Pending => {}
            PromiseState::Fulfilled(v) | PromiseState::Rejected(v) => visitor.visit_value(v),
        }
        for reaction in &self.reactions {
            reaction.visit_edges(visitor);
        }
    }
}

impl Default for PromiseData {
    fn default() -> Self {
        Self::new()
    }
}
