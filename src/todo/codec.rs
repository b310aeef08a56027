//! Obfuscated-id seam.
//!
//! Numeric repository ids never cross the service boundary: the wire carries
//! an opaque encoded form. The concrete scheme (hashids in the production
//! wiring) lives outside this crate; the coherence layer only needs the two
//! conversions below, because list reads encode each id once at cache-fill
//! time and point reads decode the id a request carries.

use thiserror::Error;

/// Errors raised while converting between numeric and wire-form ids.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The wire form does not decode to a valid id.
    #[error("malformed id `{0}`")]
    Malformed(String),
}

/// Two-way conversion between numeric ids and their obfuscated wire form.
pub trait IdCodec: Send + Sync {
    /// Encodes a numeric id into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the id cannot be represented by the
    /// underlying scheme.
    fn encode(&self, id: u64) -> Result<String, CodecError>;

    /// Decodes a wire-form id back into the numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] when the input is not a valid
    /// encoding.
    fn decode(&self, encoded: &str) -> Result<u64, CodecError>;
}
