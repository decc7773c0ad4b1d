/// Errors produced while decoding cryptographic material from the wire.
///
/// Every variant is the caller's fault: odd-length or non-hex text, wrong
/// byte counts, or bytes that do not describe a secp256k1 point or scalar.
/// A signature that decodes fine but does not verify is not an error; the
/// verification functions report it as `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CryptoError {
    /// The input could not be decoded.
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),
}
