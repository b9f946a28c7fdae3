/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The endpoint rejected the credentials.
    AuthenticationFailed,
    /// The endpoint is rate limited.
    RateLimitExceeded,
    /// The endpoint rejected the request itself (unknown model, bad
    /// parameter, oversized payload).
    InvalidRequest,
    /// Any other errors.
    Other,
}
