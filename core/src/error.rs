//! Error types for Steward

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Steward operations
pub type Result<T> = std::result::Result<T, StewardError>;

/// Main error type for Steward
#[derive(Error, Debug)]
pub enum StewardError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Command schema and validation errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Time expression parsing errors
    #[error("Time error: {0}")]
    Time(#[from] TimeError),

    /// LLM provider errors
    #[error("LLM provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Chat platform errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Command schema and parameter validation errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Duplicate action name: {0}")]
    DuplicateName(String),

    /// Classification scans model replies for action names as substrings,
    /// so one name containing another is a schema bug. Caught at startup.
    #[error("Action name {name:?} is a substring of {of:?}")]
    ShadowedName { name: String, of: String },

    #[error("Optional parameter {param:?} of {action:?} has no default")]
    MissingDefault { action: String, param: String },

    #[error("Bad extraction pattern for {param:?}: {reason}")]
    BadPattern { param: String, reason: String },

    #[error("Name must be between {min} and {max} characters, got {len}")]
    NameLength { len: usize, min: usize, max: usize },

    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrl,

    #[error("{0} is not a bot")]
    NotABot(String),

    #[error("No role named {0:?} exists on this server")]
    UnknownRole(String),

    #[error("Malformed value for {param}: {reason}")]
    MalformedValue { param: String, reason: String },
}

/// Time expression parsing errors
#[derive(Error, Debug)]
pub enum TimeError {
    #[error("Unrecognized time format: {0:?}")]
    InvalidFormat(String),
}

/// LLM provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("No API key configured")]
    NoApiKey,
}

/// Chat platform errors, as seen at the dispatcher boundary
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The bot lacks the privilege for the requested operation
    #[error("permission denied")]
    PermissionDenied,

    /// Generic transport or platform failure
    #[error("{0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Channel-related errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Channel connection failed: {0}")]
    ConnectionFailed(String),
}

impl From<serde_json::Error> for StewardError {
    fn from(err: serde_json::Error) -> Self {
        StewardError::Other(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::RequestFailed(err.to_string())
    }
}

impl From<serenity::Error> for GatewayError {
    fn from(err: serenity::Error) -> Self {
        match err {
            serenity::Error::Http(http_err) => {
                if let serenity::http::HttpError::UnsuccessfulRequest(ref resp) = http_err
                    && resp.status_code.as_u16() == 403
                {
                    return GatewayError::PermissionDenied;
                }
                GatewayError::Transport(http_err.to_string())
            }
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::UnknownRole("mods".to_string());
        assert_eq!(
            err.to_string(),
            "No role named \"mods\" exists on this server"
        );
    }

    #[test]
    fn test_error_conversion() {
        let time_err = TimeError::InvalidFormat("soonish".to_string());
        let steward_err: StewardError = time_err.into();
        assert!(matches!(steward_err, StewardError::Time(_)));
    }
}
