//! Configuration error types.

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// TOML deserialization failed.
    #[error(transparent)]
    Deserialization(#[from] toml::de::Error),

    /// TOML serialization failed.
    #[error(transparent)]
    Serialization(#[from] toml::ser::Error),

    #[error("Configuration `{name}` is invalid: {reason}")]
    InvalidConfiguration { name: String, reason: String },

    #[error("Invalid configuration list `{0}`, expected comma separated names")]
    InvalidSelection(String),

    #[error("None of the requested configurations can be built")]
    NoValidConfigurations,

    #[error("Unknown test letter `{0}`, expected any of r, p, f, v, e")]
    InvalidTestLetter(char),
}
