use std::error::Error;

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::ErrorKind;

/// The error type for a chat backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;

    /// Returns the HTTP status the endpoint answered with, if the error
    /// originated from a well-formed endpoint response. Callers relay
    /// this status so the original failure stays visible end to end.
    fn status(&self) -> Option<u16> {
        None
    }
}

/// A type that represents a chat-completion backend.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the backend should be prepared for being dropped anytime.
///
/// Backends do not retry: a failed completion is terminal for the request
/// that issued it. Retry behavior belongs to the upstream tool transport,
/// which has its own policy.
pub trait ChatBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Requests one completion for `req`.
    fn complete(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, Self::Error>> + Send + 'static;
}
