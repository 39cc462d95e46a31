use crate::CommentId;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Comment content is empty")]
    EmptyContent,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Parent comment does not exist {0}")]
    UnknownParent(CommentId),
}

impl Error {
    /// Recovers the error reported by the backend in a non-success response
    pub fn from_response(status: http::StatusCode, body: &[u8]) -> Error {
        use http::StatusCode;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Error::PermissionDenied;
        }
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|data| {
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        Error::Unknown(format!("{status}: {message}"))
    }
}
