/// Database row types — these map directly to SQLite rows.

/// Stored credential material for one user, both fields base64-encoded.
pub struct CredentialRow {
    pub salt: String,
    pub passhash: String,
}
