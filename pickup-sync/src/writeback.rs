//! SourceStatusWriter: marks a Source order handled.

use pickup_core::{AccessToken, RemoteError, SourceOrderId, SourceSystem, StatusCode};

pub struct SourceStatusWriter<'a> {
    source: &'a dyn SourceSystem,
    terminal_status: StatusCode,
}

impl<'a> SourceStatusWriter<'a> {
    pub fn new(source: &'a dyn SourceSystem, terminal_status: StatusCode) -> Self {
        Self {
            source,
            terminal_status,
        }
    }

    /// Only call once the Target side is settled. No rollback is attempted on
    /// failure; the caller records `SourceWritebackFailed`.
    pub fn write(&self, token: &AccessToken, id: SourceOrderId) -> Result<(), RemoteError> {
        self.source.write_status(token, id, self.terminal_status)
    }
}
