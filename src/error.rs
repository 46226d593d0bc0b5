use std::io;

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, TodoError>;

#[derive(thiserror::Error, Debug)]
pub enum TodoError {
    /// Timeout, refused connection, or a backend that could not be located at all.
    #[error("cannot reach backend: {0}")]
    Connectivity(String),
    #[error("HTTP error! status: {0}")]
    Http(StatusCode),
    /// The backend answered `success: false`; the message is its own.
    #[error("{0}")]
    Application(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("todo text is empty")]
    EmptyText,
    #[error("no todo with id {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for TodoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            TodoError::Connectivity(err.to_string())
        } else if let Some(status) = err.status() {
            TodoError::Http(status)
        } else if err.is_decode() {
            TodoError::Malformed(err.to_string())
        } else {
            TodoError::Request(err)
        }
    }
}

impl TodoError {
    /// Network and HTTP failures are the ones worth a troubleshooting hint.
    pub fn is_connection_problem(&self) -> bool {
        matches!(
            self,
            TodoError::Connectivity(_) | TodoError::Http(_) | TodoError::Request(_)
        )
    }

    /// Likely causes for a failed round trip, shown alongside the error.
    pub fn hint(&self, api_url: &str) -> Option<String> {
        if !self.is_connection_problem() {
            return None;
        }
        Some(format!(
            "Could not talk to the backend at {api_url}.\n\
             - Check that the server is running and which port it listens on.\n\
             - On macOS port 5000 is taken by the AirPlay Receiver; run the server on another port \
               (3000, 3001, 5001) or disable AirPlay Receiver.\n\
             - Make sure the server enables CORS before its routes and lets OPTIONS requests through.\n\
             - Use `vibetodo probe` to look for a local server, or `vibetodo use hosted` to go back \
               to the hosted backend."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_problems_get_a_hint() {
        let err = TodoError::Http(StatusCode::FORBIDDEN);
        assert!(err.hint("http://localhost:5000/api/todos").unwrap().contains("AirPlay"));

        assert!(TodoError::Application("quota exceeded".into()).hint("x").is_none());
        assert!(TodoError::EmptyText.hint("x").is_none());
    }

    #[test]
    fn application_message_is_verbatim() {
        let err = TodoError::Application("Title is required".into());
        assert_eq!(err.to_string(), "Title is required");
    }
}
