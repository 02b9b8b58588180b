//! Password strength checks and bcrypt hashing.
//!
//! A raw password must first pass [ValidatedPassword::new] before it can be
//! turned into a [PasswordHash] and stored.

use std::fmt::Display;

use bcrypt::{hash, verify};
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A password that is strong enough to be stored, but has not been hashed yet.
#[derive(Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Check that `raw_password` is hard enough to guess.
    ///
    /// `user_inputs` are strings the password should not be built from, such as the
    /// user's name or email address.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] with suggestions for a stronger password if the
    /// estimated strength is below "safely unguessable".
    pub fn new(raw_password: &str, user_inputs: &[&str]) -> Result<Self, Error> {
        let estimate = zxcvbn(raw_password, user_inputs);

        match estimate.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => {
                let feedback = estimate
                    .feedback()
                    .unwrap_or(&Feedback::default())
                    .to_string();

                Err(Error::TooWeak(feedback))
            }
        }
    }

    /// Wrap `raw_password` without checking its strength.
    ///
    /// Only intended for seeding test databases.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl std::fmt::Debug for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValidatedPassword(********)")
    }
}

/// A salted bcrypt hash of a password.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// The bcrypt cost used outside of tests.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `password` with the bcrypt `cost`.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt rejects the cost or fails to hash.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash that was read back from the database.
    pub fn new_unchecked(raw_hash: &str) -> Self {
        Self(raw_hash.to_owned())
    }

    /// Validate and hash `raw_password` in one step.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] if the password is too easy to guess, or
    /// [Error::HashingError] if it could not be hashed.
    pub fn from_raw_password(
        raw_password: &str,
        user_inputs: &[&str],
        cost: u32,
    ) -> Result<Self, Error> {
        let password = ValidatedPassword::new(raw_password, user_inputs)?;

        Self::new(password, cost)
    }

    /// Check whether `raw_password` produced this hash.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if the stored hash is malformed.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        verify(raw_password, &self.0).map_err(|error| Error::HashingError(error.to_string()))
    }

    /// The hash in the modular crypt format, as stored in the database.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod password_hash_tests {
    use crate::{Error, PasswordHash, ValidatedPassword};

    #[test]
    fn verifies_matching_password_only() {
        let password = "pelicans-prefer-plain-pancakes";
        let hash = PasswordHash::from_raw_password(password, &[], 4).unwrap();

        assert!(hash.verify(password).unwrap());
        assert!(!hash.verify("pelicans-prefer-syrup").unwrap());
    }

    #[test]
    fn same_password_gets_different_salt() {
        let password = ValidatedPassword::new_unchecked("turkeysgogobblegobble");

        let first = PasswordHash::new(password.clone(), 4).unwrap();
        let second = PasswordHash::new(password, 4).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_is_hashing_error() {
        let hash = PasswordHash::new_unchecked("not a bcrypt hash");

        assert!(matches!(hash.verify("hunter2"), Err(Error::HashingError(_))));
    }

    #[test]
    fn weak_password_is_not_hashed() {
        let result = PasswordHash::from_raw_password("qwerty", &[], 4);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }
}
