use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] mysql_async::Error),
}
