//! ExecutionStateMachine (C2): drives one Story's `ExecutionContext` through
//! `IDLE -> PLANNING -> EXECUTING -> VERIFYING -> COMMITTING -> COMPLETED`,
//! with a `VERIFYING -> EXECUTING` retry loop and a fail-from-any-state
//! escape hatch, per the transition table already encoded on `ExecState`.
//!
//! Handlers take the `ExecutionContext` by value and hand it back alongside
//! their result: a boxed `Fn` can't return a future borrowing its argument
//! without an unconstrained lifetime, so ownership passes through instead.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::TransitionError;
use crate::domain::models::{
    is_valid_transition, ExecState, ExecutionContext, ExecutionResult, ExecutionStateMachineConfig,
    HistoryEntry,
};

type HandlerOutput = (ExecutionContext, Result<(), TransitionError>);
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerOutput> + Send>>;
pub type Handler = Box<dyn Fn(ExecutionContext) -> HandlerFuture + Send + Sync>;

/// Per-phase callbacks the caller supplies; each returns the (possibly
/// mutated) context plus an error to drive a retry (if under `maxRetries`)
/// or a terminal failure otherwise.
pub struct ExecutionHandlers {
    pub on_planning: Handler,
    pub on_executing: Handler,
    pub on_verifying: Handler,
    pub on_committing: Handler,
    pub on_state_change: Option<Box<dyn Fn(&HistoryEntry) + Send + Sync>>,
    pub on_error: Option<Box<dyn Fn(&TransitionError) + Send + Sync>>,
}

pub struct ExecutionStateMachine {
    config: ExecutionStateMachineConfig,
}

impl ExecutionStateMachine {
    pub const fn new(config: ExecutionStateMachineConfig) -> Self {
        Self { config }
    }

    /// Runs `ctx` to a terminal state. `ctx.state` must be `IDLE`.
    pub async fn execute(
        &self,
        ctx: ExecutionContext,
        handlers: ExecutionHandlers,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, TransitionError> {
        if ctx.state != ExecState::Idle {
            return Err(TransitionError::NotIdle);
        }

        let mut history = Vec::new();
        let mut retry_count = 0u32;
        let started = Instant::now();

        let (mut ctx, outcome) = self.run_phases(ctx, &handlers, &mut history, &mut retry_count, cancel).await;

        let total_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        ctx.end_time = Some(Utc::now());

        let (final_state, success, error) = match &outcome {
            Ok(()) => (ExecState::Completed, true, None),
            Err(TransitionError::Cancelled) => {
                (ExecState::Failed, false, Some("cancelled".to_string()))
            }
            Err(e) => {
                ctx.error = Some(e.to_string());
                (ExecState::Failed, false, Some(e.to_string()))
            }
        };
        ctx.state = final_state;

        Ok(ExecutionResult { final_state, success, context: ctx, history, total_duration_ms, retry_count, error })
    }

    async fn run_phases(
        &self,
        ctx: ExecutionContext,
        handlers: &ExecutionHandlers,
        history: &mut Vec<HistoryEntry>,
        retry_count: &mut u32,
        cancel: CancellationToken,
    ) -> (ExecutionContext, Result<(), TransitionError>) {
        let (ctx, result) =
            self.transition(ctx, ExecState::Planning, history, handlers, &handlers.on_planning, cancel.clone()).await;
        let Ok(mut ctx) = result.map(|()| ctx) else {
            return (ctx, result);
        };

        loop {
            let (next_ctx, result) = self
                .transition(ctx, ExecState::Executing, history, handlers, &handlers.on_executing, cancel.clone())
                .await;
            ctx = next_ctx;
            if let Err(e) = result {
                return (ctx, Err(e));
            }

            let (next_ctx, result) = self
                .transition(ctx, ExecState::Verifying, history, handlers, &handlers.on_verifying, cancel.clone())
                .await;
            ctx = next_ctx;
            if let Err(e) = result {
                return (ctx, Err(e));
            }

            if ctx.error.is_none() {
                break;
            }

            *retry_count += 1;
            if *retry_count > self.config.max_retries {
                return (ctx, Err(TransitionError::MaxRetriesExceeded));
            }
            ctx.error = None;
            ctx.state = ExecState::Verifying;
        }

        let (ctx, result) = self
            .transition(ctx, ExecState::Committing, history, handlers, &handlers.on_committing, cancel)
            .await;
        (ctx, result)
    }

    async fn transition(
        &self,
        ctx: ExecutionContext,
        to: ExecState,
        history: &mut Vec<HistoryEntry>,
        handlers: &ExecutionHandlers,
        handler: &Handler,
        cancel: CancellationToken,
    ) -> (ExecutionContext, Result<(), TransitionError>) {
        if cancel.is_cancelled() {
            return (ctx, Err(TransitionError::Cancelled));
        }
        let from = ctx.state;
        if !is_valid_transition(from, to, self.config.allow_fail_from_any) {
            let err = TransitionError::InvalidTransition { from: from.to_string(), to: to.to_string() };
            if let Some(on_error) = &handlers.on_error {
                on_error(&err);
            }
            return (ctx, Err(err));
        }

        // Keep a pre-call snapshot: the timeout/cancel branches can't recover
        // `ctx` from the handler future once it's been moved in, since the
        // future is dropped rather than resolved on those paths.
        let pre_call = ctx.clone();
        let start = Instant::now();
        let timeout_ms = self.config.transition_timeout_ms;
        let (mut ctx, result) = tokio::select! {
            r = timeout(Duration::from_millis(timeout_ms), handler(ctx)) => {
                match r {
                    Ok((ctx, inner)) => (ctx, inner),
                    Err(_) => (pre_call, Err(TransitionError::Timeout)),
                }
            }
            () = cancel.cancelled() => (pre_call, Err(TransitionError::Cancelled)),
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let success = result.is_ok();
        if success {
            ctx.state = to;
        }

        let entry = HistoryEntry {
            transition_id: Uuid::new_v4().to_string(),
            from_state: from,
            to_state: to,
            success,
            duration_ms,
            timestamp: Utc::now(),
            error: result.as_ref().err().map(std::string::ToString::to_string),
            retry_attempt: None,
        };
        if let Some(on_state_change) = &handlers.on_state_change {
            on_state_change(&entry);
        }
        history.push(entry);

        if let Err(e) = &result {
            if let Some(on_error) = &handlers.on_error {
                on_error(e);
            }
        }
        (ctx, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Box::new(|ctx| Box::pin(async move { (ctx, Ok(())) }))
    }

    #[tokio::test]
    async fn happy_path_reaches_completed() {
        let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
        let ctx = ExecutionContext::new("scope", "task-1");
        let handlers = ExecutionHandlers {
            on_planning: noop(),
            on_executing: noop(),
            on_verifying: noop(),
            on_committing: noop(),
            on_state_change: None,
            on_error: None,
        };
        let result = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();
        assert_eq!(result.final_state, ExecState::Completed);
        assert!(result.success);
        assert_eq!(result.history.len(), 4);
    }

    #[tokio::test]
    async fn non_idle_start_is_rejected() {
        let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
        let mut ctx = ExecutionContext::new("scope", "task-1");
        ctx.state = ExecState::Executing;
        let handlers = ExecutionHandlers {
            on_planning: noop(),
            on_executing: noop(),
            on_verifying: noop(),
            on_committing: noop(),
            on_state_change: None,
            on_error: None,
        };
        let err = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransitionError::NotIdle));
    }

    #[tokio::test]
    async fn verify_retries_until_max_retries_exceeded() {
        let config = ExecutionStateMachineConfig { max_retries: 1, ..ExecutionStateMachineConfig::default() };
        let sm = ExecutionStateMachine::new(config);
        let ctx = ExecutionContext::new("scope", "task-1");
        let handlers = ExecutionHandlers {
            on_planning: noop(),
            on_executing: noop(),
            on_verifying: Box::new(|mut ctx| {
                ctx.error = Some("verification failed".to_string());
                Box::pin(async move { (ctx, Ok(())) })
            }),
            on_committing: noop(),
            on_state_change: None,
            on_error: None,
        };
        let result = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();
        assert_eq!(result.final_state, ExecState::Failed);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn cancellation_fails_the_run() {
        let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
        let ctx = ExecutionContext::new("scope", "task-1");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let handlers = ExecutionHandlers {
            on_planning: noop(),
            on_executing: noop(),
            on_verifying: noop(),
            on_committing: noop(),
            on_state_change: None,
            on_error: None,
        };
        let result = sm.execute(ctx, handlers, cancel).await.unwrap();
        assert_eq!(result.final_state, ExecState::Failed);
    }
}
