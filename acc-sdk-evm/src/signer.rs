//! EIP-191 signing of message digests.
//!
//! A digest produced by [`Message::digest`](crate::Message::digest) is signed
//! as a personal message: the signer hashes
//! `"\x19Ethereum Signed Message:\n32" || digest` and signs that. The result
//! travels as `0x` followed by 130 hex digits (`r || s || v`, `v` in `{27, 28}`).

use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature, SignatureError, hex};

#[cfg(feature = "signer")]
use alloy_signer_local::PrivateKeySigner;

/// Failure while producing or checking a signature.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The private key is not a valid secp256k1 scalar.
    #[error("invalid private key")]
    InvalidKey,
    /// The underlying signer failed.
    #[cfg(feature = "signer")]
    #[error(transparent)]
    Signer(#[from] alloy_signer::Error),
    /// The signature string is not 65 hex-encoded bytes.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    /// Public-key recovery failed.
    #[error(transparent)]
    Recovery(#[from] SignatureError),
}

/// Abstracts over owned and shared signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, yet clients share one
/// key between several role clients and the event collector.
pub trait SignerLike: Send + Sync {
    /// Address derived from the signer's key.
    fn address(&self) -> Address;

    /// Signs `message` with the EIP-191 personal-message prefix.
    fn sign_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Signature, SigningError>> + Send;
}

#[cfg(feature = "signer")]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SigningError> {
        Ok(alloy_signer::Signer::sign_message(self, message).await?)
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SigningError> {
        (**self).sign_message(message).await
    }
}

/// Builds a signer from a hex private key, with or without `0x`.
///
/// # Errors
///
/// Returns [`SigningError::InvalidKey`] if the key is malformed.
#[cfg(feature = "signer")]
pub fn signer_from_private_key(private_key: &str) -> Result<PrivateKeySigner, SigningError> {
    private_key
        .trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| SigningError::InvalidKey)
}

/// Signs a 32-byte digest and returns the wire form of the signature.
///
/// # Errors
///
/// Propagates failures from the signer.
pub async fn sign_digest<S: SignerLike>(signer: &S, digest: &B256) -> Result<String, SigningError> {
    let signature = signer.sign_message(digest.as_slice()).await?;
    Ok(hex::encode_prefixed(signature.as_bytes()))
}

/// Recovers the address that produced `signature` over `digest`.
///
/// # Errors
///
/// - [`SigningError::MalformedSignature`] if `signature` is not 65 hex bytes
/// - [`SigningError::Recovery`] if no public key matches
pub fn recover_signer(digest: &B256, signature: &str) -> Result<Address, SigningError> {
    let malformed = || SigningError::MalformedSignature(signature.to_owned());
    let bytes = hex::decode(signature.trim()).map_err(|_| malformed())?;
    if bytes.len() != 65 {
        return Err(malformed());
    }
    let signature = Signature::from_raw(&bytes)?;
    Ok(signature.recover_address_from_msg(digest.as_slice())?)
}
