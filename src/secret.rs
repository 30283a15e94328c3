use std::fmt;

/// A wrapper that keeps sensitive values out of logs and envelopes.
///
/// Credentials handed to [`AuthService::authenticate`](crate::AuthService::authenticate)
/// carry their password in a `Secret`, so a stray `{:?}` on a request,
/// a credential or a fault entry never prints it.
///
/// # Examples
///
/// ```
/// use rest_dispatch::Secret;
///
/// let password = Secret::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose_secret(), "hunter2");
/// ```
// Do NOT derive Clone, Debug or Serialize; all access goes through expose_secret().
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// Never log or serialize the returned reference.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
