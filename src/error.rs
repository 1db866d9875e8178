/// Errors raised by the chat session. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Validation(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("no such user: {0}")]
    UnknownRecipient(String),

    #[error("{0} message(s) could not be delivered")]
    Undelivered(usize),

    #[error("failed to encode message: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::MalformedMessage(err.to_string())
    }
}
