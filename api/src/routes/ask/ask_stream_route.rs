//! POST /sessions/{id}/ask/stream: the same turn as Server-Sent Events.
//!
//! Event order: one `context`, any number of `token`, then `done` with the
//! full answer or `error` with `{code, message, stage}`. Failures before the
//! first token (rewrite, embed, search) are returned as a plain JSON error.
//! A client that disconnects cancels the turn and no answer is recorded.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use contextor::StreamedTurn;
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
    routes::{
        ask::ask_request::{AskRequest, ContextEvent, DoneEvent, millis},
        sessions::session_routes::lookup,
    },
};

#[derive(Debug, Serialize)]
struct ErrorEvent {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
}

fn json_event(name: &'static str, payload: &impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| {
            warn!(event = name, error = %e, "sse payload not serializable");
            Event::default().event("error").data("internal error")
        })
}

fn error_event(e: contextor::ContextorError) -> Event {
    let stage = match &e {
        contextor::ContextorError::AnswerGeneration { stage, .. } => Some(stage.to_string()),
        _ => None,
    };
    let app = AppError::from(e);
    warn!(code = app.error_code(), error = %app, "streamed turn failed");
    json_event(
        "error",
        &ErrorEvent {
            code: app.error_code(),
            message: app.user_message(),
            stage,
        },
    )
}

/// `token` events until the turn ends, then a single terminal event.
fn turn_events(turn: StreamedTurn, top_k: usize, started: Instant) -> impl Stream<Item = Event> + Send {
    stream::unfold(Some(turn), move |state| async move {
        let mut turn = state?;
        match turn.next().await {
            // SSE cannot carry carriage returns.
            Some(Ok(fragment)) => {
                let ev = Event::default().event("token").data(fragment.replace('\r', ""));
                Some((ev, Some(turn)))
            }
            Some(Err(e)) => Some((error_event(e), None)),
            None => {
                debug!(answer_chars = turn.text().len(), "stream finished");
                let done = DoneEvent {
                    answer: turn.text(),
                    top_k,
                    elapsed_ms: millis(started.elapsed()),
                };
                let ev = json_event("done", &done);
                Some((ev, None))
            }
        }
    })
}

/// Handler: POST /sessions/{id}/ask/stream
///
/// # Example
/// ```bash
/// curl -N -X POST http://127.0.0.1:8080/sessions/$ID/ask/stream \
///   -H 'content-type: application/json' \
///   -d '{"question":"And what goes on top?"}'
/// ```
pub async fn ask_question_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Json(body) = body?;
    let handle = lookup(&state, id).await?;
    let started = Instant::now();
    let turn = state.conversation.ask_stream(handle, &body.question).await?;
    let top_k = state.conversation.answerer().config().top_k;

    let head = json_event(
        "context",
        &ContextEvent {
            standalone_question: &turn.standalone_question,
            context: &turn.used_chunks,
        },
    );
    let events = stream::once(async move { head })
        .chain(turn_events(turn, top_k, started))
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
