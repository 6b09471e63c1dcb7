use franchise_gateway::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
