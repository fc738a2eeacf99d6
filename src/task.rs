// src/task.rs
use crate::types::{HostResult, ReconError, Target};
use crate::engine::RunContext;
use crate::sources::Source;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Everything one task invocation produced.
#[derive(Debug)]
pub struct TaskOutcome {
    pub source: String,
    pub results: Vec<HostResult>,
    pub errors: Vec<ReconError>,
}

impl TaskOutcome {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            results: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn failed(source: impl Into<String>, error: ReconError) -> Self {
        let mut outcome = Self::new(source);
        outcome.errors.push(error);
        outcome
    }

    /// Renames the outcome; results added afterwards carry the new name.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn add_result(&mut self, ip: impl Into<String>, hostname: impl Into<String>) {
        self.results
            .push(HostResult::new(self.source.clone(), ip, hostname));
    }

    pub fn add_error(&mut self, error: ReconError) {
        self.errors.push(error);
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A single-use unit of work. Consumed by `run`, so a task can only ever
/// execute once.
#[async_trait]
pub trait TaskProducer: Send {
    fn name(&self) -> &str;
    async fn run(self: Box<Self>) -> TaskOutcome;
}

pub type Task = Box<dyn TaskProducer>;

/// Adapts a zero-argument async closure into a task.
pub struct FnTask<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    pub fn boxed(name: impl Into<String>, func: F) -> Task {
        Box::new(Self::new(name, func))
    }
}

#[async_trait]
impl<F, Fut> TaskProducer for FnTask<F>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> TaskOutcome {
        let this = *self;
        (this.func)().await
    }
}

/// Binds one source to one target. The target is owned, never shared with
/// another task.
pub struct SourceTask {
    source: Box<dyn Source>,
    target: Target,
    ctx: Arc<RunContext>,
}

impl SourceTask {
    pub fn new(source: Box<dyn Source>, target: Target, ctx: Arc<RunContext>) -> Self {
        Self { source, target, ctx }
    }
}

#[async_trait]
impl TaskProducer for SourceTask {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn run(self: Box<Self>) -> TaskOutcome {
        self.source.probe(&self.target, &self.ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_results_carry_source() {
        let mut outcome = TaskOutcome::new("Dictionary IPv4");
        outcome.add_result("1.2.3.4", "www.example.com");
        outcome.set_source("Dictionary-CNAME");
        outcome.add_result("1.2.3.4", "edge.example.net");

        assert!(outcome.has_results());
        assert!(!outcome.has_errors());
        assert_eq!(outcome.results[0].source, "Dictionary IPv4");
        assert_eq!(outcome.results[1].source, "Dictionary-CNAME");
    }

    #[tokio::test]
    async fn test_fn_task_runs_captured_value() {
        let host = String::from("a.example.com");
        let task = FnTask::boxed("static", move || async move {
            let mut outcome = TaskOutcome::new("static");
            outcome.add_result("10.0.0.1", host);
            outcome
        });

        assert_eq!(task.name(), "static");
        let outcome = task.run().await;
        assert_eq!(outcome.results, vec![HostResult::new("static", "10.0.0.1", "a.example.com")]);
    }
}
