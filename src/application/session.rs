//! Per-window event loop: a one-second tick plus the broadcast inbox, raced
//! in a single task so the engine is only ever driven from one place.

use crate::application::commands::{WindowState, handle_envelope_impl, tick_impl};
use crate::infrastructure::bus::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

/// Runs until the broadcast channel closes. A lagged inbox is logged and
/// skipped; the next periodic state broadcast re-converges the window.
pub async fn run_window_session(state: Arc<WindowState>, mut inbox: broadcast::Receiver<Envelope>) {
    let mut ticker = time::interval(Duration::from_secs(1));
    // The first interval tick fires immediately; swallow it so ticks land on
    // whole seconds after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = tick_impl(&state) {
                    state.log_error("tick", &error.to_string());
                }
            }
            received = inbox.recv() => match received {
                Ok(envelope) => {
                    if let Err(error) = handle_envelope_impl(&state, &envelope) {
                        state.log_error("handle_envelope", &error.to_string());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    state.log_error(
                        "handle_envelope",
                        &format!("inbox lagged, dropped {skipped} messages"),
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
