//! The `Op`/`Event` queue pair: the surface the host process (cli, exec,
//! mcp-server) talks to instead of calling [`crate::turn::run_turn`]
//! directly. One [`Session`] owns a background task that drains submitted
//! `Op`s one at a time and emits `Event`s as each turn progresses, so a
//! host can keep its own UI loop decoupled from turn execution and can
//! cancel an in-flight turn without tearing down the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::state::AgentState;
use crate::turn::TurnInput;

/// Submission channel capacity. A session is meant to process one turn at
/// a time; this just bounds how many callers can queue up behind it.
pub const SUBMISSION_CHANNEL_CAPACITY: usize = 64;

/// An operation submitted to a running [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum Op {
    /// Run one turn for `message`.
    UserInput { message: String },
    /// Cancel the turn currently in flight, if any.
    Interrupt,
    /// Shut the session down after the current turn (if any) finishes.
    Shutdown,
}

/// One submission, with the id a matching [`Event`] will echo back.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub op: Op,
}

/// An event emitted by a running [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum Event {
    TurnStarted { submission_id: String },
    TurnComplete { submission_id: String, surface_response: String },
    TurnAborted { submission_id: String },
    TurnFailed { submission_id: String, error: String },
    SessionShutdown,
}

/// A running agent session: a background task draining `Op`s against one
/// [`AgentState`] and reporting `Event`s back. Cloning a `Session` clones
/// only the channel handles, so multiple callers can submit into and
/// listen on the same underlying session.
#[derive(Clone)]
pub struct Session {
    tx_sub: async_channel::Sender<Submission>,
    rx_evt: async_channel::Receiver<Event>,
    cancel: CancellationToken,
}

impl Session {
    /// Spawn the background loop owning `state`. `state` is moved in; the
    /// only way to reach it again is through submitted `Op`s.
    pub fn spawn(state: AgentState) -> Self {
        let (tx_sub, rx_sub) = async_channel::bounded(SUBMISSION_CHANNEL_CAPACITY);
        let (tx_evt, rx_evt) = async_channel::bounded(SUBMISSION_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            run_loop(state, rx_sub, tx_evt, loop_cancel).await;
        });

        Self {
            tx_sub,
            rx_evt,
            cancel,
        }
    }

    /// Submit `op` under a freshly generated id and return that id.
    pub async fn submit(&self, op: Op) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.submit_with_id(Submission { id: id.clone(), op }).await?;
        Ok(id)
    }

    pub async fn submit_with_id(&self, sub: Submission) -> Result<()> {
        self.tx_sub
            .send(sub)
            .await
            .map_err(|_| Error::Cancelled)
    }

    /// Receive the next event. Returns `Err(Error::Cancelled)` once the
    /// session has shut down and no more events will ever arrive.
    pub async fn next_event(&self) -> Result<Event> {
        self.rx_evt.recv().await.map_err(|_| Error::Cancelled)
    }

    /// Request cancellation of the turn currently in flight, if any. Takes
    /// effect at the next cancellation-safe point inside `run_turn`; a turn
    /// that has already passed its last checkpoint still completes.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }
}

async fn run_loop(
    mut state: AgentState,
    rx_sub: async_channel::Receiver<Submission>,
    tx_evt: async_channel::Sender<Event>,
    cancel: CancellationToken,
) {
    while let Ok(sub) = rx_sub.recv().await {
        match sub.op {
            Op::UserInput { message } => {
                let _ = tx_evt
                    .send(Event::TurnStarted {
                        submission_id: sub.id.clone(),
                    })
                    .await;

                let turn_cancel = cancel.child_token();
                let input = TurnInput::root(message);
                let outcome = tokio::select! {
                    result = crate::turn::run_turn(&mut state, input) => Ok(result),
                    _ = turn_cancel.cancelled() => Err(()),
                };

                let event = match outcome {
                    Ok(Ok(output)) => Event::TurnComplete {
                        submission_id: sub.id,
                        surface_response: output.surface_response,
                    },
                    Ok(Err(err)) => {
                        warn!(submission_id = %sub.id, %err, "turn failed");
                        Event::TurnFailed {
                            submission_id: sub.id,
                            error: err.to_string(),
                        }
                    }
                    Err(()) => Event::TurnAborted {
                        submission_id: sub.id,
                    },
                };
                if tx_evt.send(event).await.is_err() {
                    break;
                }
            }
            Op::Interrupt => {
                cancel.cancel();
            }
            Op::Shutdown => {
                let _ = tx_evt.send(Event::SessionShutdown).await;
                break;
            }
        }
    }
    info!("session loop exiting");
}
