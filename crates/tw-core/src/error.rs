use thiserror::Error;

pub type TwResult<T> = Result<T, TwError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
