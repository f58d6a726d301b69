use crate::combat::rng::RollStream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Hex sha1 digest of a password. Only digests are ever stored or
/// compared; plaintext dies with the login packet.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

#[derive(Debug, Clone)]
struct AccountRecord {
    password_digest: String,
}

/// Account table plus the set of live sessions. A session key is an
/// opaque base64 token derived from the account name and a random
/// nonce; holding the key is holding the session.
#[derive(Debug)]
pub struct SessionManager {
    accounts: HashMap<String, AccountRecord>,
    sessions: HashMap<String, String>,
    rng: RollStream,
}

impl SessionManager {
    pub fn new(seed: u64) -> Self {
        Self {
            accounts: HashMap::new(),
            sessions: HashMap::new(),
            rng: RollStream::from_seed(seed),
        }
    }

    pub fn register(&mut self, account: &str, password: &str) -> Result<(), String> {
        if account.is_empty() || password.is_empty() {
            return Err("account name and password are required".to_string());
        }
        if self.accounts.contains_key(account) {
            return Err(format!("account '{}' already exists", account));
        }
        self.accounts.insert(
            account.to_string(),
            AccountRecord {
                password_digest: digest_password(password),
            },
        );
        Ok(())
    }

    /// Verifies credentials and opens a session. A second login for
    /// the same account replaces the old session.
    pub fn login(&mut self, account: &str, password: &str) -> Result<String, String> {
        let record = self
            .accounts
            .get(account)
            .ok_or_else(|| "bad account or password".to_string())?;
        if record.password_digest != digest_password(password) {
            return Err("bad account or password".to_string());
        }

        self.sessions.retain(|_, owner| owner != account);
        let nonce: u64 = (u64::from(self.rng.roll_range(0, u32::MAX - 1)) << 32)
            | u64::from(self.rng.roll_range(0, u32::MAX - 1));
        let mut hasher = Sha1::new();
        hasher.update(account.as_bytes());
        hasher.update(nonce.to_le_bytes());
        let key = BASE64.encode(hasher.finalize());
        self.sessions.insert(key.clone(), account.to_string());
        Ok(key)
    }

    pub fn validate(&self, key: &str) -> Option<&str> {
        self.sessions.get(key).map(String::as_str)
    }

    pub fn logout(&mut self, key: &str) {
        self.sessions.remove(key);
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let digest = digest_password("hunter2");
        assert_eq!(digest.len(), 40);
        assert_eq!(digest, digest_password("hunter2"));
        assert_ne!(digest, digest_password("hunter3"));
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let mut sessions = SessionManager::new(42);
        sessions.register("eira", "hunter2").expect("register");
        assert!(sessions.login("eira", "wrong").is_err());
        assert!(sessions.login("nobody", "hunter2").is_err());
        let key = sessions.login("eira", "hunter2").expect("valid login");
        assert_eq!(sessions.validate(&key), Some("eira"));
    }

    #[test]
    fn relogin_invalidates_the_old_session() {
        let mut sessions = SessionManager::new(42);
        sessions.register("eira", "hunter2").expect("register");
        let first = sessions.login("eira", "hunter2").expect("login");
        let second = sessions.login("eira", "hunter2").expect("login");
        assert_eq!(sessions.validate(&first), None);
        assert_eq!(sessions.validate(&second), Some("eira"));
    }

    #[test]
    fn duplicate_account_is_rejected() {
        let mut sessions = SessionManager::new(7);
        sessions.register("eira", "a").expect("register");
        assert!(sessions.register("eira", "b").is_err());
    }
}
