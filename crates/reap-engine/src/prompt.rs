//! Interactive credential prompting seam

use std::io;

/// Source of the credentials requested during authorization.
///
/// The state machine calls these synchronously from the dispatch loop; the
/// whole pipeline blocks on the answer, which is fine because nothing else
/// is in flight during bootstrap.
pub trait CredentialPrompt: Send {
    /// The account phone number
    fn phone(&mut self) -> io::Result<String>;

    /// The login code delivered to the account
    fn code(&mut self) -> io::Result<String>;

    /// The two-step-verification password
    fn password(&mut self) -> io::Result<String>;
}
