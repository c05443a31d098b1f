//! Type aliases and small wrappers for domain concepts.

use std::fmt;
use std::ops::Deref;

use zeroize::Zeroize;

/// An encrypted secret: base64 of `iv || tag || ciphertext`.
pub type EncryptedSecret = String;

/// An environment variable name (e.g. `mysql_user`, `main_db_conn`).
pub type VariableName = String;

/// Ordered `NAME -> value` pairs. Insertion order is significant.
pub type OrderedParams = Vec<(VariableName, String)>;

/// A value that must never show up in logs or debug output.
///
/// Memory is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Sensitive<T: Zeroize>(T);

impl<T: Zeroize> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the wrapped value.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> Deref for Sensitive<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> From<T> for Sensitive<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T: Zeroize> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl<T: Zeroize> Drop for Sensitive<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
