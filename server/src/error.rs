use thiserror::Error;

/// Errors raised inside the chatroom core and its wire codec.
///
/// None of these are fatal to the server: callers log them and drop the
/// offending event so other connections are unaffected.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Every draw in the retry budget collided with an active session.
    #[error("could not allocate a unique {kind} after {attempts} attempts")]
    NamespaceExhausted { kind: &'static str, attempts: usize },

    /// Inbound frame was not valid JSON or did not match the expected payload.
    #[error("malformed client event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unknown client event `{0}`")]
    UnknownEvent(String),

    /// `message` carried a history entry other than a chat message.
    #[error("`message` event carried a `{0}` entry, expected `chatmessage`")]
    UnexpectedMessageType(&'static str),

    /// Outbound event could not be serialized.
    #[error("failed to encode server event: {0}")]
    Encode(#[source] serde_json::Error),
}
