//! Sequential step executor with first-error-wins semantics.
//!
//! A [`Procedure`] owns a context value and runs [`Step`]s against it one at
//! a time. The first failing step halts the procedure: every later
//! [`execute`](Procedure::execute) call is a no-op, and the stored
//! [`ProcedureError`] records which step failed, what the context looked
//! like, and the trail of steps that ran.
//!
//! ```text
//! Idle ──execute──▶ Running(i) ──ok──▶ Running(i+1)
//!                        │
//!                        └──err──▶ Halted (terminal)
//! ```
//!
//! Effects of steps that already succeeded are not rolled back.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use code_overview_core::procedure::{Procedure, ProcedureContext, Step};
//!
//! struct Counter(u32);
//!
//! impl ProcedureContext for Counter {
//!     fn context_id(&self) -> String { "counter".into() }
//!     fn context_string(&self) -> String { format!("{{\"count\":{}}}", self.0) }
//! }
//!
//! struct Increment;
//!
//! #[async_trait]
//! impl Step<Counter> for Increment {
//!     fn id(&self) -> &str { "Increment" }
//!     async fn run(&self, ctx: &mut Counter) -> anyhow::Result<()> {
//!         ctx.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test(async {
//! let mut procedure = Procedure::new(Counter(0));
//! procedure.execute(&Increment).await.execute(&Increment).await;
//! assert!(!procedure.is_err());
//! assert_eq!(procedure.context().0, 2);
//! # });
//! # fn tokio_test<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use async_trait::async_trait;

/// Context shared by all steps of one procedure run.
pub trait ProcedureContext: Send {
    /// Stable identifier for the run (used in logs).
    fn context_id(&self) -> String;

    /// Human-readable snapshot embedded into error messages.
    fn context_string(&self) -> String;
}

/// One named unit of work in a procedure.
///
/// The step may finish synchronously or await collaborator calls; either
/// way the executor awaits it before running the next step.
#[async_trait]
pub trait Step<C: ProcedureContext>: Send + Sync {
    fn id(&self) -> &str;

    async fn run(&self, ctx: &mut C) -> anyhow::Result<()>;
}

/// Failure of a procedure step, with the diagnostic trail.
#[derive(Debug, thiserror::Error)]
#[error("process failed in '{step}' [ctx: {context}] [stack: {}]: {source:#}", render_stack(.stack))]
pub struct ProcedureError {
    /// Identifier of the step that failed.
    pub step: String,
    /// [`ProcedureContext::context_string`] at the time of failure.
    pub context: String,
    /// Every step id pushed so far, the failing one last.
    pub stack: Vec<String>,
    /// The step's own error, with its full chain.
    #[source]
    pub source: anyhow::Error,
}

fn render_stack(stack: &[String]) -> String {
    serde_json::to_string(stack).unwrap_or_else(|_| format!("{:?}", stack))
}

/// Runs steps in order against an owned context.
pub struct Procedure<C: ProcedureContext> {
    ctx: C,
    err: Option<ProcedureError>,
    stack: Vec<String>,
}

impl<C: ProcedureContext> Procedure<C> {
    pub fn new(ctx: C) -> Self {
        Self {
            ctx,
            err: None,
            stack: Vec::new(),
        }
    }

    /// Run `step` unless an earlier step already failed.
    ///
    /// Returns `&mut Self` so calls can be chained.
    pub async fn execute<S>(&mut self, step: &S) -> &mut Self
    where
        S: Step<C> + ?Sized,
    {
        if self.err.is_some() {
            return self;
        }

        let step_id = step.id().to_string();
        tracing::debug!(context = %self.ctx.context_id(), step = %step_id, "start process");
        self.stack.push(step_id.clone());

        if let Err(source) = step.run(&mut self.ctx).await {
            let err = ProcedureError {
                step: step_id,
                context: self.ctx.context_string(),
                stack: self.stack.clone(),
                source,
            };
            tracing::error!(
                context = %self.ctx.context_id(),
                step = %err.step,
                stack = %render_stack(&err.stack),
                "process failed: {:#}",
                err.source
            );
            self.err = Some(err);
        }

        self
    }

    /// True exactly when a step has failed.
    pub fn is_err(&self) -> bool {
        self.err.is_some()
    }

    pub fn err(&self) -> Option<&ProcedureError> {
        self.err.as_ref()
    }

    /// Step ids executed so far, in order.
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Finish the run, yielding the context or the first error.
    pub fn into_result(self) -> Result<C, ProcedureError> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.ctx),
        }
    }
}
