use crate::credential::{CredentialIssuer, SessionCredential};
use crate::crypto::{PublicKey, Signature};
use crate::nonce::{ChallengeNonce, NonceStore};

use super::{Directory, LoginError};

/// Result of a successful login.
#[derive(Debug, Clone)]
#[must_use = "login grant carries the session credential"]
pub struct LoginGrant {
    credential: SessionCredential,
    public_key: PublicKey,
}

impl LoginGrant {
    pub fn token(&self) -> &str {
        &self.credential.token
    }

    pub fn username(&self) -> &str {
        &self.credential.subject
    }

    pub fn expires_at(&self) -> i64 {
        self.credential.expires_at
    }

    /// The key the login was proven against.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn into_credential(self) -> SessionCredential {
        self.credential
    }
}

/// Runs the challenge-response handshake.
///
/// Generic over its collaborators so tests and the daemon can plug in their
/// own directory and nonce storage.
pub struct Authenticator<D, N> {
    directory: D,
    nonces: N,
    issuer: CredentialIssuer,
}

impl<D: Directory, N: NonceStore> Authenticator<D, N> {
    pub fn new(directory: D, nonces: N, issuer: CredentialIssuer) -> Self {
        Self {
            directory,
            nonces,
            issuer,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn nonces(&self) -> &N {
        &self.nonces
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Issue a challenge for `username`, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns `LoginError::UnknownIdentity` if the username is not registered.
    pub fn begin_login(&self, username: &str) -> Result<ChallengeNonce, LoginError> {
        if self.directory.lookup_public_key(username).is_none() {
            return Err(LoginError::UnknownIdentity);
        }
        Ok(self.nonces.issue(username))
    }

    /// Answer the outstanding challenge for `username` with `(r, s)`.
    ///
    /// The challenge is consumed before anything else is checked and is never
    /// restored, so every attempt (good or bad) burns it.
    ///
    /// # Errors
    ///
    /// - `NoPendingChallenge` if nothing is outstanding or it expired
    /// - `UnknownIdentity` if the user vanished between the two steps
    /// - `InvalidSignature` on malformed scalars or a failed verification
    /// - `Credential` if minting the token fails
    pub fn complete_login(
        &self,
        username: &str,
        signature_r: &str,
        signature_s: &str,
        now_unix_seconds: i64,
    ) -> Result<LoginGrant, LoginError> {
        let nonce = self
            .nonces
            .consume(username)
            .map_err(|_| LoginError::NoPendingChallenge)?;

        let public_key = self
            .directory
            .lookup_public_key(username)
            .ok_or(LoginError::UnknownIdentity)?;

        let signature = Signature::from_hex(signature_r, signature_s)
            .map_err(|_| LoginError::InvalidSignature)?;
        if !public_key.verify_digest(&nonce.signing_digest(), &signature) {
            return Err(LoginError::InvalidSignature);
        }

        let credential = self.issuer.mint(username, now_unix_seconds)?;
        Ok(LoginGrant {
            credential,
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{TokenSecret, DEFAULT_TOKEN_TTL_SECONDS};
    use crate::crypto::PrivateKey;
    use crate::nonce::{MemoryNonceStore, NonceError};
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};
    use std::thread;
    use std::time::Duration;

    /// Test directory backed by a lock-protected map.
    #[derive(Default)]
    struct TestDirectory(RwLock<HashMap<String, PublicKey>>);

    impl TestDirectory {
        fn register(&self, username: &str, key: PublicKey) {
            self.0.write().unwrap().insert(username.to_owned(), key);
        }

        fn remove(&self, username: &str) {
            self.0.write().unwrap().remove(username);
        }
    }

    impl Directory for TestDirectory {
        fn lookup_public_key(&self, username: &str) -> Option<PublicKey> {
            self.0.read().unwrap().get(username).cloned()
        }
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn authenticator(
        directory: Arc<TestDirectory>,
    ) -> Authenticator<Arc<TestDirectory>, MemoryNonceStore> {
        Authenticator::new(
            directory,
            MemoryNonceStore::default(),
            CredentialIssuer::new(
                TokenSecret::new(vec![0x42; 32]).unwrap(),
                DEFAULT_TOKEN_TTL_SECONDS,
            ),
        )
    }

    fn setup() -> (
        Authenticator<Arc<TestDirectory>, MemoryNonceStore>,
        Arc<TestDirectory>,
        PrivateKey,
    ) {
        let directory = Arc::new(TestDirectory::default());
        let key = PrivateKey::generate();
        directory.register("alice", key.public_key());
        (authenticator(Arc::clone(&directory)), directory, key)
    }

    fn answer(key: &PrivateKey, nonce: &ChallengeNonce) -> (String, String) {
        let sig = key.sign_digest(&nonce.signing_digest());
        (sig.r_hex(), sig.s_hex())
    }

    #[test]
    fn test_full_handshake() {
        let (auth, _, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&key, &nonce);

        let grant = auth.complete_login("alice", &r, &s, now()).unwrap();

        assert_eq!(grant.username(), "alice");
        assert_eq!(grant.public_key(), &key.public_key());
        assert_eq!(auth.issuer().validate(grant.token(), now()).unwrap(), "alice");
    }

    #[test]
    fn test_begin_login_unknown_user() {
        let (auth, _, _) = setup();
        assert_eq!(
            auth.begin_login("bob").unwrap_err(),
            LoginError::UnknownIdentity
        );
        assert!(auth.nonces().is_empty());
    }

    #[test]
    fn test_complete_without_challenge() {
        let (auth, _, _) = setup();
        assert_eq!(
            auth.complete_login("alice", "01", "01", now()).unwrap_err(),
            LoginError::NoPendingChallenge
        );
    }

    #[test]
    fn test_replay_is_rejected() {
        let (auth, _, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&key, &nonce);

        assert!(auth.complete_login("alice", &r, &s, now()).is_ok());
        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::NoPendingChallenge
        );
    }

    #[test]
    fn test_failed_attempt_burns_challenge() {
        let (auth, _, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&PrivateKey::generate(), &nonce);

        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::InvalidSignature
        );

        // Even the right answer is too late now.
        let (r, s) = answer(&key, &nonce);
        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::NoPendingChallenge
        );
    }

    #[test]
    fn test_malformed_scalars_are_invalid_signature() {
        let (auth, _, _) = setup();
        auth.begin_login("alice").unwrap();

        assert_eq!(
            auth.complete_login("alice", "xyz", "abc", now()).unwrap_err(),
            LoginError::InvalidSignature
        );
        assert_eq!(
            auth.nonces().consume("alice").unwrap_err(),
            NonceError::NotFound
        );
    }

    #[test]
    fn test_answer_to_superseded_challenge_fails() {
        let (auth, _, key) = setup();
        let first = auth.begin_login("alice").unwrap();
        let second = auth.begin_login("alice").unwrap();

        let (r, s) = answer(&key, &first);
        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::InvalidSignature
        );

        let nonce = auth.begin_login("alice").unwrap();
        assert_ne!(nonce, second);
        let (r, s) = answer(&key, &nonce);
        assert!(auth.complete_login("alice", &r, &s, now()).is_ok());
    }

    #[test]
    fn test_signature_over_raw_bytes_is_rejected() {
        let (auth, _, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        let sig = key.sign_message(nonce.as_bytes());

        assert_eq!(
            auth.complete_login("alice", &sig.r_hex(), &sig.s_hex(), now())
                .unwrap_err(),
            LoginError::InvalidSignature
        );
    }

    #[test]
    fn test_user_removed_mid_handshake() {
        let (auth, directory, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        directory.remove("alice");

        let (r, s) = answer(&key, &nonce);
        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::UnknownIdentity
        );
    }

    #[test]
    fn test_expired_challenge() {
        let directory = Arc::new(TestDirectory::default());
        let key = PrivateKey::generate();
        directory.register("alice", key.public_key());
        let auth = Authenticator::new(
            Arc::clone(&directory),
            MemoryNonceStore::new(Duration::ZERO),
            CredentialIssuer::new(
                TokenSecret::new(vec![0x42; 32]).unwrap(),
                DEFAULT_TOKEN_TTL_SECONDS,
            ),
        );

        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&key, &nonce);
        assert_eq!(
            auth.complete_login("alice", &r, &s, now()).unwrap_err(),
            LoginError::NoPendingChallenge
        );
    }

    #[test]
    fn test_uppercase_scalars_accepted() {
        let (auth, _, key) = setup();
        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&key, &nonce);

        assert!(auth
            .complete_login("alice", &r.to_uppercase(), &s.to_uppercase(), now())
            .is_ok());
    }

    #[test]
    fn test_concurrent_completions_single_winner() {
        let (auth, _, key) = setup();
        let auth = Arc::new(auth);
        let nonce = auth.begin_login("alice").unwrap();
        let (r, s) = answer(&key, &nonce);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = Arc::clone(&auth);
                let (r, s) = (r.clone(), s.clone());
                thread::spawn(move || auth.complete_login("alice", &r, &s, now()))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();

        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LoginError::NoPendingChallenge));
    }
}
