//! Transport and connection abstractions.

use crate::error::Result;
use mailforge_mime::Message;

/// Opens connections to a mail server.
///
/// Implementations hold only configuration; all session state lives in the
/// returned [`Connection`].
pub trait Transport: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or rejects the login.
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// An open session that can deliver messages until closed.
pub trait Connection: Send {
    /// Delivers one message.
    ///
    /// The envelope is derived from `From`, `To`, `Cc` and `Bcc`; the `Bcc`
    /// header itself is not transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be delivered.
    fn send(&mut self, message: &Message) -> Result<()>;

    /// Checks whether the session is still usable.
    fn is_alive(&mut self) -> bool;

    /// Closes the session. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to acknowledge the close.
    fn close(&mut self) -> Result<()>;
}
