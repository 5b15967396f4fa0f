use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};

/// One account's login material. The secret never shows up in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    secret: String,
}

impl Credential {
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"***")
            .finish()
    }
}

/// Read-only account pool, loaded once at startup. Iteration order is
/// id-sorted so downstream scheduling stays reproducible.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    creds: Vec<Credential>,
}

impl CredentialSet {
    /// Parse an id -> secret mapping. Template rows that were never filled
    /// in (`your_...`) are skipped rather than rejected.
    pub fn load<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut creds: Vec<Credential> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (id, secret) in entries {
            let id = id.trim().to_string();
            if id.is_empty() {
                return Err(Error::Config("account with empty identifier".to_string()));
            }
            if id.starts_with("your_") || secret.starts_with("your_") {
                warn!(account = %id, "skipping placeholder account entry");
                continue;
            }
            if secret.is_empty() {
                return Err(Error::Config(format!("account '{}' has an empty secret", id)));
            }
            if !seen.insert(id.clone()) {
                return Err(Error::Config(format!("duplicate account identifier '{}'", id)));
            }
            creds.push(Credential { id, secret });
        }

        if creds.is_empty() {
            return Err(Error::Config("no accounts configured".to_string()));
        }

        creds.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { creds })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.creds.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Credential> {
        self.creds.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.creds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creds.is_empty()
    }
}
