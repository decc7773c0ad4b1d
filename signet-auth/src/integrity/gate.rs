use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, PublicKey, Signature, SignatureHex, DIGEST_LEN};

use super::IntegrityError;

/// The fields the gate reads from a protected body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(rename = "encryptedData")]
    pub payload: String,
    pub signature: SignatureHex,
    #[serde(rename = "senderPublicKey")]
    pub sender_public_key: String,
}

/// Which sender keys the gate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPolicy {
    /// Any valid key, registered or not.
    AnyKey,
    /// Only keys that belong to a registered user.
    #[default]
    RegisteredOnly,
}

/// Reverse lookup from public key to owner.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the gate runs on every protected
/// request.
pub trait KeyRegistry: Send + Sync {
    /// The username that registered `key`, if any.
    fn owner_of(&self, key: &PublicKey) -> Option<String>;
}

impl<T: KeyRegistry + ?Sized> KeyRegistry for Arc<T> {
    fn owner_of(&self, key: &PublicKey) -> Option<String> {
        (**self).owner_of(key)
    }
}

/// Registry that knows nobody. Pair with [`SenderPolicy::AnyKey`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistry;

impl KeyRegistry for NoRegistry {
    fn owner_of(&self, _key: &PublicKey) -> Option<String> {
        None
    }
}

/// The sender of a request that passed the gate.
///
/// Derived only from the key that verified; nothing the client declares
/// about itself ends up here unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSender {
    public_key: PublicKey,
    username: Option<String>,
}

impl VerifiedSender {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The registered owner of the key, when the registry knows one.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

/// A body that passed the gate.
///
/// # Visibility
///
/// Only [`IntegrityGate::check`] constructs this, so holding one means the
/// signature was verified.
#[derive(Debug, Clone)]
#[must_use = "verification result must be checked"]
pub struct VerifiedEnvelope {
    sender: VerifiedSender,
    payload: String,
    digest: [u8; DIGEST_LEN],
    signature: Signature,
}

impl VerifiedEnvelope {
    pub fn sender(&self) -> &VerifiedSender {
        &self.sender
    }

    /// The signed payload string.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// SHA3-256 of the payload.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

/// Verifies signed request bodies.
pub struct IntegrityGate<R> {
    registry: R,
    policy: SenderPolicy,
}

impl IntegrityGate<NoRegistry> {
    /// A gate that accepts any well-signed body.
    pub fn permissive() -> Self {
        Self::new(NoRegistry, SenderPolicy::AnyKey)
    }
}

impl<R: KeyRegistry> IntegrityGate<R> {
    pub fn new(registry: R, policy: SenderPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> SenderPolicy {
        self.policy
    }

    /// Check a raw request body.
    ///
    /// The body is borrowed, never consumed; the caller can hand the same
    /// bytes to its handler afterwards.
    ///
    /// # Errors
    ///
    /// - `MalformedRequest` if the body is not an envelope
    /// - `IntegrityFailure` for bad hex, an invalid key or signature, or a
    ///   key the sender policy does not admit
    pub fn check(&self, body: &[u8]) -> Result<VerifiedEnvelope, IntegrityError> {
        let envelope: SignedEnvelope =
            serde_json::from_slice(body).map_err(|_| IntegrityError::MalformedRequest)?;

        let public_key = PublicKey::from_hex(&envelope.sender_public_key)
            .map_err(|_| IntegrityError::IntegrityFailure)?;

        // Cheap registry lookup before the curve arithmetic.
        let username = self.registry.owner_of(&public_key);
        if self.policy == SenderPolicy::RegisteredOnly && username.is_none() {
            return Err(IntegrityError::IntegrityFailure);
        }

        let signature = Signature::from_hex(&envelope.signature.r, &envelope.signature.s)
            .map_err(|_| IntegrityError::IntegrityFailure)?;
        let digest = crypto::digest(envelope.payload.as_bytes());
        if !public_key.verify_digest(&digest, &signature) {
            return Err(IntegrityError::IntegrityFailure);
        }

        Ok(VerifiedEnvelope {
            sender: VerifiedSender {
                public_key,
                username,
            },
            payload: envelope.payload,
            digest,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use std::collections::HashMap;

    /// Test registry keyed by compressed hex.
    #[derive(Default)]
    struct TestRegistry(HashMap<String, String>);

    impl TestRegistry {
        fn with(mut self, username: &str, key: &PublicKey) -> Self {
            self.0
                .insert(crypto::encode_hex(&key.to_compressed()), username.to_owned());
            self
        }
    }

    impl KeyRegistry for TestRegistry {
        fn owner_of(&self, key: &PublicKey) -> Option<String> {
            self.0.get(&crypto::encode_hex(&key.to_compressed())).cloned()
        }
    }

    fn envelope(key: &PrivateKey, payload: &str) -> serde_json::Value {
        let sig = key.sign_message(payload.as_bytes());
        serde_json::json!({
            "encryptedData": payload,
            "signature": { "r": sig.r_hex(), "s": sig.s_hex() },
            "senderPublicKey": key.public_key().to_hex(),
        })
    }

    fn bytes(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn test_valid_envelope_passes() {
        let key = PrivateKey::generate();
        let gate = IntegrityGate::permissive();

        let verified = gate.check(&bytes(&envelope(&key, "ciphertext"))).unwrap();

        assert_eq!(verified.sender().public_key(), &key.public_key());
        assert_eq!(verified.sender().username(), None);
        assert_eq!(verified.payload(), "ciphertext");
        assert_eq!(verified.digest(), &crypto::digest(b"ciphertext"));
    }

    #[test]
    fn test_any_payload_change_fails() {
        let key = PrivateKey::generate();
        let gate = IntegrityGate::permissive();
        let mut body = envelope(&key, "ciphertext");
        body["encryptedData"] = "ciphertexT".into();

        assert_eq!(
            gate.check(&bytes(&body)).unwrap_err(),
            IntegrityError::IntegrityFailure
        );
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let sender = PrivateKey::generate();
        let gate = IntegrityGate::permissive();
        let body = envelope(&sender, "hello");

        let verified = gate.check(&bytes(&body)).unwrap();
        assert_eq!(verified.sender().public_key(), &sender.public_key());
        assert_eq!(verified.payload(), "hello");

        for field in ["r", "s"] {
            let mut scalar = crypto::decode_hex(body["signature"][field].as_str().unwrap()).unwrap();
            let last = scalar.len() - 1;
            scalar[last] ^= 0x01;
            let mut tampered = body.clone();
            tampered["signature"][field] = crypto::encode_hex(&scalar).into();

            assert_eq!(
                gate.check(&bytes(&tampered)).unwrap_err(),
                IntegrityError::IntegrityFailure,
                "flipped byte in {field}"
            );
        }
    }

    #[test]
    fn test_swapped_sender_key_fails() {
        let key = PrivateKey::generate();
        let gate = IntegrityGate::permissive();
        let mut body = envelope(&key, "ciphertext");
        body["senderPublicKey"] = PrivateKey::generate().public_key().to_hex().into();

        assert_eq!(
            gate.check(&bytes(&body)).unwrap_err(),
            IntegrityError::IntegrityFailure
        );
    }

    #[test]
    fn test_field_order_and_whitespace_are_irrelevant() {
        let key = PrivateKey::generate();
        let sig = key.sign_message(b"hello");
        let body = format!(
            "{{ \"senderPublicKey\" : \"{}\",\n  \"signature\": {{\"s\":\"{}\", \"r\":\"{}\"}},\n  \"encryptedData\": \"hello\" }}",
            key.public_key().to_hex(),
            sig.s_hex(),
            sig.r_hex(),
        );

        assert!(IntegrityGate::permissive().check(body.as_bytes()).is_ok());
    }

    #[test]
    fn test_escaped_payload_is_signed_decoded() {
        let key = PrivateKey::generate();
        let payload = "line one\nline \"two\" \u{00e9}";
        let body = envelope(&key, payload);

        let verified = IntegrityGate::permissive().check(&bytes(&body)).unwrap();
        assert_eq!(verified.payload(), payload);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let key = PrivateKey::generate();
        let mut body = envelope(&key, "ciphertext");
        body["receiverUsername"] = "bob".into();

        assert!(IntegrityGate::permissive().check(&bytes(&body)).is_ok());
    }

    #[test]
    fn test_malformed_bodies() {
        let gate = IntegrityGate::permissive();
        let bodies: [&[u8]; 6] = [
            b"",
            b"not json",
            b"[]",
            b"{}",
            br#"{"encryptedData": "x", "senderPublicKey": "02"}"#,
            br#"{"encryptedData": 5, "signature": {"r": "1", "s": "1"}, "senderPublicKey": "02"}"#,
        ];
        for body in bodies {
            assert_eq!(
                gate.check(body).unwrap_err(),
                IntegrityError::MalformedRequest,
                "body: {}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_bad_hex_is_integrity_failure() {
        let key = PrivateKey::generate();
        let gate = IntegrityGate::permissive();

        let mut body = envelope(&key, "ciphertext");
        body["signature"]["r"] = "zz".into();
        assert_eq!(
            gate.check(&bytes(&body)).unwrap_err(),
            IntegrityError::IntegrityFailure
        );

        let mut body = envelope(&key, "ciphertext");
        body["senderPublicKey"] = "abc".into();
        assert_eq!(
            gate.check(&bytes(&body)).unwrap_err(),
            IntegrityError::IntegrityFailure
        );
    }

    #[test]
    fn test_registered_only_policy() {
        let alice = PrivateKey::generate();
        let stranger = PrivateKey::generate();
        let registry = TestRegistry::default().with("alice", &alice.public_key());
        let gate = IntegrityGate::new(registry, SenderPolicy::RegisteredOnly);

        let verified = gate.check(&bytes(&envelope(&alice, "hi"))).unwrap();
        assert_eq!(verified.sender().username(), Some("alice"));

        assert_eq!(
            gate.check(&bytes(&envelope(&stranger, "hi"))).unwrap_err(),
            IntegrityError::IntegrityFailure
        );
    }

    #[test]
    fn test_any_key_policy_still_reports_owner() {
        let alice = PrivateKey::generate();
        let registry = TestRegistry::default().with("alice", &alice.public_key());
        let gate = IntegrityGate::new(registry, SenderPolicy::AnyKey);

        let verified = gate.check(&bytes(&envelope(&alice, "hi"))).unwrap();
        assert_eq!(verified.sender().username(), Some("alice"));

        let stranger = PrivateKey::generate();
        let verified = gate.check(&bytes(&envelope(&stranger, "hi"))).unwrap();
        assert_eq!(verified.sender().username(), None);
    }

    #[test]
    fn test_uncompressed_sender_key_matches_registration() {
        let alice = PrivateKey::generate();
        let registry = TestRegistry::default().with("alice", &alice.public_key());
        let gate = IntegrityGate::new(registry, SenderPolicy::RegisteredOnly);

        let mut body = envelope(&alice, "hi");
        body["senderPublicKey"] =
            crypto::encode_hex(&alice.public_key().to_uncompressed()).into();

        let verified = gate.check(&bytes(&body)).unwrap();
        assert_eq!(verified.sender().username(), Some("alice"));
    }

    #[test]
    fn test_body_is_reusable_after_check() {
        let key = PrivateKey::generate();
        let mut body = envelope(&key, "ciphertext");
        body["receiverUsername"] = "bob".into();
        let raw = bytes(&body);

        let verified = IntegrityGate::permissive().check(&raw).unwrap();
        assert_eq!(verified.payload(), "ciphertext");
        let reparsed: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(reparsed["receiverUsername"], "bob");
    }
}
