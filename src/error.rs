use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Not connected to the message bus")]
    NotConnected,

    #[error("Handler already registered for agent kind: {0}")]
    HandlerExists(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Task validation failed: {0}")]
    Validation(String),

    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MeshError>;
