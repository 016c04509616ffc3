// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verification-token check for inbound platform payloads.
//!
//! The token travels inside each payload (JSON envelope, command form or
//! interaction JSON), so it is checked by the handlers after decoding rather
//! than by a middleware layer.

/// Shared secret the platform sends with every payload.
#[derive(Clone, Default)]
pub struct VerificationToken(Option<String>);

impl VerificationToken {
    /// `None` (or an empty token) disables the check.
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// True when checking is disabled or `presented` matches.
    pub fn accepts(&self, presented: &str) -> bool {
        match &self.0 {
            None => true,
            Some(expected) => expected == presented,
        }
    }
}

impl std::fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VerificationToken")
            .field(&self.0.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_accepts_anything() {
        let token = VerificationToken::new(None);
        assert!(!token.is_enabled());
        assert!(token.accepts(""));
        assert!(VerificationToken::new(Some(String::new())).accepts("x"));
    }

    #[test]
    fn enabled_requires_match() {
        let token = VerificationToken::new(Some("s3cret".into()));
        assert!(token.accepts("s3cret"));
        assert!(!token.accepts("nope"));
        assert!(!token.accepts(""));
    }

    #[test]
    fn debug_is_redacted() {
        let token = VerificationToken::new(Some("s3cret".into()));
        let debug = format!("{token:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[redacted]"));
    }
}
