use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::error;

use placegate_db::Store;

/// Validates caller credentials against the user store.
///
/// Every failure mode — unknown user, unreadable stored material, storage
/// errors, missing store — validates as false. The gateway fails closed.
pub struct CredentialValidator {
    store: Option<Arc<Store>>,
    allow_anonymous: bool,
}

impl CredentialValidator {
    pub fn new(store: Option<Arc<Store>>, allow_anonymous: bool) -> Self {
        Self {
            store,
            allow_anonymous,
        }
    }

    /// Check a username/password pair. An absent username is the anonymous
    /// case and follows the configured flag; otherwise the stored digest is
    /// recomputed from the request password and compared in full.
    pub fn validate(&self, username: Option<&str>, password: Option<&str>) -> bool {
        let Some(username) = username else {
            return self.allow_anonymous;
        };
        let Some(store) = &self.store else {
            return false;
        };

        let row = match store.credential(username) {
            Ok(Some(row)) => row,
            Ok(None) => return false,
            Err(e) => {
                error!("Error validating credentials against store: {e:#}");
                return false;
            }
        };

        let salt = match placegate_crypto::decode(&row.salt) {
            Ok(salt) => salt,
            Err(e) => {
                error!("Stored salt for user is unreadable: {e:#}");
                return false;
            }
        };

        let digest = placegate_crypto::hash_password(password.unwrap_or(""), &salt);
        placegate_crypto::verify_encoded(&row.passhash, &digest)
    }

    /// Register a new user with a fresh random salt. A duplicate username
    /// fails the insert and surfaces as an error here.
    pub fn add_user(&self, username: &str, password: &str) -> Result<()> {
        let Some(store) = &self.store else {
            bail!("no user store configured");
        };

        let salt = placegate_crypto::generate_salt();
        let digest = placegate_crypto::hash_password(password, &salt);
        store.add_user(
            username,
            &placegate_crypto::encode(&salt),
            &placegate_crypto::encode(&digest),
        )
    }
}
