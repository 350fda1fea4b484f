//! Installs the ambient cancellation signal for each request.

use crate::signal::Signal;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Gives every request a child of the server's root signal. The child is
/// cancelled when the server shuts down or when the request future is dropped
/// (for example after a client disconnect).
pub async fn signal_middleware(
    State(root): State<Signal>,
    mut request: Request,
    next: Next,
) -> Response {
    let signal = root.child();
    let _cancel_on_drop = signal.drop_guard();
    request.extensions_mut().insert(signal);

    next.run(request).await
}
