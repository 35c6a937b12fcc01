use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum UdmError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing echo input")]
    MissingEcho,
    #[error("missing trigger output")]
    MissingTrigger,
    #[error("missing display")]
    MissingDisplay,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
