#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("percent-decoded value is not utf-8: {0}")]
    InvalidUtf8(String),
}
