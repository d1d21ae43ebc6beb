use thiserror::Error;

/// Errors raised while wiring up the decision engine
///
/// Decisions and notifications never fail; these only surface when building
/// ladders, loading configuration or constructing the engine.
#[derive(Debug, Error)]
pub enum AbrError {
    #[error("Invalid bitrate ladder: {0}")]
    InvalidLadder(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config file not found at {0}")]
    NotFound(String),
}
