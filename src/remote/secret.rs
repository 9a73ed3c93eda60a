//! In-memory handling of the remote password.

use std::fmt;
use zeroize::Zeroize;

/// A password held only for the lifetime of the run.
///
/// The bytes are overwritten with zeros when the value is dropped, `Debug`
/// never prints the content, and there is no `Display` impl.
/// The only way to read it is [`Secret::expose`], which is used when placing
/// it into a child process environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a password read from the terminal.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Borrow the cleartext value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True if the operator entered an empty password.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Zeroize for Secret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.zeroize();
    }
}
