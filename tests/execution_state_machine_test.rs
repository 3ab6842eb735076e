//! Integration tests exercising `ExecutionStateMachine` through its public
//! handler and observer hooks, rather than the state-transition table
//! directly (that's covered by the crate's own unit tests).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wavework::domain::errors::TransitionError;
use wavework::domain::models::{
    ExecState, ExecutionContext, ExecutionStateMachineConfig,
};
use wavework::services::{ExecutionHandlers, ExecutionStateMachine, Handler};

fn noop() -> Handler {
    Box::new(|ctx| Box::pin(async move { (ctx, Ok(())) }))
}

#[tokio::test]
async fn handlers_can_thread_outputs_through_to_the_result_context() {
    let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
    let ctx = ExecutionContext::new("scope", "task-1").with_input("seed", serde_json::json!(1));

    let on_executing: Handler = Box::new(|mut ctx| {
        Box::pin(async move {
            let mut outputs = std::collections::HashMap::new();
            outputs.insert("answer".to_string(), serde_json::json!(42));
            ctx.outputs = Some(outputs);
            (ctx, Ok(()))
        })
    });

    let handlers = ExecutionHandlers {
        on_planning: noop(),
        on_executing,
        on_verifying: noop(),
        on_committing: noop(),
        on_state_change: None,
        on_error: None,
    };

    let result = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.context.outputs.unwrap()["answer"], 42);
}

#[tokio::test]
async fn on_state_change_observes_every_transition() {
    let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
    let ctx = ExecutionContext::new("scope", "task-1");
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_for_hook = Arc::clone(&seen);

    let handlers = ExecutionHandlers {
        on_planning: noop(),
        on_executing: noop(),
        on_verifying: noop(),
        on_committing: noop(),
        on_state_change: Some(Box::new(move |entry| {
            seen_for_hook.lock().unwrap().push(entry.to_state);
        })),
        on_error: None,
    };

    sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();

    let states = seen.lock().unwrap().clone();
    assert_eq!(
        states,
        vec![ExecState::Planning, ExecState::Executing, ExecState::Verifying, ExecState::Committing]
    );
}

#[tokio::test]
async fn a_failing_handler_surfaces_as_a_handler_fault_and_calls_on_error() {
    let sm = ExecutionStateMachine::new(ExecutionStateMachineConfig::default());
    let ctx = ExecutionContext::new("scope", "task-1");
    let error_count = Arc::new(AtomicU32::new(0));
    let error_count_for_hook = Arc::clone(&error_count);

    let on_executing: Handler =
        Box::new(|ctx| Box::pin(async move { (ctx, Err(TransitionError::HandlerFault("boom".to_string()))) }));

    let handlers = ExecutionHandlers {
        on_planning: noop(),
        on_executing,
        on_verifying: noop(),
        on_committing: noop(),
        on_state_change: None,
        on_error: Some(Box::new(move |_| {
            error_count_for_hook.fetch_add(1, Ordering::SeqCst);
        })),
    };

    let result = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();

    assert_eq!(result.final_state, ExecState::Failed);
    assert_eq!(result.error.as_deref(), Some("handler fault: boom"));
    assert_eq!(error_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_slow_handler_times_out_and_the_context_survives() {
    let config = ExecutionStateMachineConfig { transition_timeout_ms: 20, ..ExecutionStateMachineConfig::default() };
    let sm = ExecutionStateMachine::new(config);
    let ctx = ExecutionContext::new("scope", "task-1");

    let on_planning: Handler = Box::new(|ctx| {
        Box::pin(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
            (ctx, Ok(()))
        })
    });

    let handlers = ExecutionHandlers {
        on_planning,
        on_executing: noop(),
        on_verifying: noop(),
        on_committing: noop(),
        on_state_change: None,
        on_error: None,
    };

    let result = sm.execute(ctx, handlers, CancellationToken::new()).await.unwrap();

    assert_eq!(result.final_state, ExecState::Failed);
    assert_eq!(result.context.task_id, "task-1");
}
