use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("boat '{0}' already exists")]
    Exists(String),
    #[error("boat '{0}' does not exist")]
    NotExists(String),
    #[error("registry operation failed")]
    Failed,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("missing field in command")]
    MissingField,
    #[error("unknown command action '{0}'")]
    UnknownAction(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

#[derive(Debug, Error)]
pub enum NetServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
    #[error("connection io error: {0}")]
    Io(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("csv io error: {0}")]
    Csv(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum InitLoaderError {
    #[error("io error reading init data: {0}")]
    Io(#[source] std::io::Error),
    #[error("parse error in init data: {0}")]
    Parse(String),
    #[error("sql error reading init data: {0}")]
    Sql(#[from] sqlx::Error),
}
