#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] nb_config::error::Error),

    #[error(transparent)]
    Report(#[from] nb_report::error::Error),

    #[error("Configuration `{0}` is not in the catalog")]
    UnknownConfiguration(String),

    #[error("Slave `{0}` is not in the catalog")]
    UnknownSlave(String),

    #[error("{0} not found in the source tree")]
    MissingBuildFile(String),

    #[error("Failed to retrieve the sources of `{config}`, status {status}")]
    Checkout { config: String, status: i32 },

    #[error("Failed to create the source package of `{config}`, status {status}")]
    Package { config: String, status: i32 },

    #[error("Mailer exited with status {0}")]
    Mail(i32),

    #[error(transparent)]
    Glob(#[from] globset::Error),
}
