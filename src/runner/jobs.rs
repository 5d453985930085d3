//! Deferred work: promise-reaction jobs and finalization-registry cleanups.
//!
//! Both queues are strict FIFO and are drained to empty, including anything a
//! running job enqueues. A job's failure never reaches the code that drains
//! the queue; it is logged (unless disabled in the configuration) and offered
//! to [`Vm::set_on_job_error`].

use std::collections::VecDeque;
use std::fmt;

use tracing::{trace, warn};

use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

/// A callable captured for later invocation by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCallback {
    pub callback: CellId,
}

pub type JobFn = Box<dyn FnOnce(&mut Vm) -> ThrowCompletionOr<JsValue>>;

/// One queued unit of work plus the values it must keep alive until it runs.
pub struct Job {
    callback: JobFn,
    held: Vec<JsValue>,
}

impl Job {
    pub fn new(callback: JobFn) -> Self {
        Job {
            callback,
            held: Vec::new(),
        }
    }

    pub fn holding(mut self, values: &[JsValue]) -> Self {
        self.held.extend_from_slice(values);
        self
    }

    pub fn run(self, vm: &mut Vm) -> ThrowCompletionOr<JsValue> {
        (self.callback)(vm)
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for value in &self.held {
            visitor.visit_value(value);
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job(holding {})", self.held.len())
    }
}

/// Which queue a failed job came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSource {
    Promise,
    FinalizationRegistryCleanup,
}

#[derive(Default)]
pub struct JobQueues {
    promise_jobs: VecDeque<Job>,
    finalization_registry_cleanup_jobs: VecDeque<CellId>,
}

impl JobQueues {
    pub fn new() -> Self {
        JobQueues::default()
    }

    pub fn push_promise_job(&mut self, job: Job) {
        self.promise_jobs.push_back(job);
    }

    pub fn pop_promise_job(&mut self) -> Option<Job> {
        self.promise_jobs.pop_front()
    }

    pub fn promise_job_count(&self) -> usize {
        self.promise_jobs.len()
    }

    pub fn push_cleanup_job(&mut self, registry: CellId) {
        self.finalization_registry_cleanup_jobs.push_back(registry);
    }

    pub fn pop_cleanup_job(&mut self) -> Option<CellId> {
        self.finalization_registry_cleanup_jobs.pop_front()
    }

    pub fn pending_cleanup_registries(&self) -> impl Iterator<Item = &CellId> {
        self.finalization_registry_cleanup_jobs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.promise_jobs.is_empty() && self.finalization_registry_cleanup_jobs.is_empty()
    }

    pub fn visit_promise_job_edges(&self, visitor: &mut dyn CellVisitor) {
        for job in &self.promise_jobs {
            job.visit_edges(visitor);
        }
    }
}

impl Vm {
    /// Default `enqueue_promise_job` host hook.
    pub fn enqueue_promise_job(&mut self, job: Job, _realm: Option<CellId>) {
        self.job_queues.push_promise_job(job);
    }

    pub fn run_queued_promise_jobs(&mut self) {
        trace!(vm = %self.id(), pending = self.job_queues.promise_job_count(), "draining promise jobs");
        while let Some(job) = self.job_queues.pop_promise_job() {
            if let Err(error) = job.run(self) {
                self.report_job_error(JobSource::Promise, error);
            }
        }
    }

    /// Default `enqueue_finalization_registry_cleanup_job` host hook.
    pub fn enqueue_finalization_registry_cleanup_job(&mut self, registry: CellId) {
        self.job_queues.push_cleanup_job(registry);
    }

    pub fn run_queued_finalization_registry_cleanup_jobs(&mut self) {
        while let Some(registry) = self.job_queues.pop_cleanup_job() {
            trace!(vm = %self.id(), registry = ?registry, "running finalization registry cleanup");
            if let Err(error) = self.cleanup_finalization_registry(registry) {
                self.report_job_error(JobSource::FinalizationRegistryCleanup, error);
            }
        }
    }

    /// Invoke the registry's cleanup callback once per cleared record.
    pub fn cleanup_finalization_registry(&mut self, registry: CellId) -> ThrowCompletionOr<()> {
        let (callback, held) = match &mut self.heap.object_mut(registry).kind {
            ObjectKind::FinalizationRegistry(data) => (data.cleanup_callback, data.take_cleared()),
            _ => {
                return Err(JErrorType::TypeError(
                    "cleanup requested for an object that is not a FinalizationRegistry".to_string(),
                ))
            }
        };
        let call_job_callback = self.host_hooks.call_job_callback.clone();
        for value in held {
            call_job_callback(self, &callback, JsValue::Undefined, &[value])?;
        }
        Ok(())
    }

    pub(crate) fn report_job_error(&mut self, source: JobSource, error: JErrorType) {
        if self.config.jobs.log_errors {
            warn!(vm = %self.id(), ?source, %error, "job completed abruptly");
        }
        if let Some(handler) = self.on_job_error.clone() {
            handler(self, source, &error);
        }
    }
}
