use shoal_protocol::ProtocolError;

/// Crate-wide result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Top-level code outside every agreed band. The counterpart broke the
    /// protocol contract; fatal by default, overridable to drop.
    #[error("unroutable code {code}")]
    UnroutableCode { code: u32 },

    /// Command `type_code` outside the basic/notice/feature windows.
    #[error("command type_code {type_code} outside every dispatch window")]
    UnclassifiedCommand { type_code: u32 },

    /// `type_code` has no entry in the table its band selects.
    #[error("no {table} handler registered for type_code {type_code}")]
    UnregisteredHandler {
        table: &'static str,
        type_code: u32,
    },

    /// Envelope payload violated the shape its code requires.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
