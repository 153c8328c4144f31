#[derive(Debug, thiserror::Error)]
pub enum DutError {
    #[error("lost connection to the device under test: {0}")]
    ConnectionLost(String),

    #[error("`{0}` is not supported by this driver")]
    Unsupported(&'static str),

    #[error("protocol error talking to the device under test: {0}")]
    Protocol(String),

    #[error("no such backup handle: {0}")]
    NoSuchBackup(String),

    #[error("no such session: {0:?}")]
    NoSuchSession(super::SessionId),
}
