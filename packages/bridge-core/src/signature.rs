//! Signatures and signing keys
//!
//! Signers attest to an intent by signing its 32-byte [`IntentHash`] with
//! Ed25519. A relayer gathers those attestations into a [`SignatureSet`].

use ed25519_dalek::{Signature, Signer as _, SigningKey};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;
use crate::types::{IntentHash, SignerId};

/// Raw 64-byte Ed25519 signature. Hex-encoded in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignatureBytes(pub [u8; 64]);

impl SignatureBytes {
    pub fn to_signature(&self) -> Signature {
        Signature::from_bytes(&self.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<Signature> for SignatureBytes {
    fn from(sig: Signature) -> Self {
        SignatureBytes(sig.to_bytes())
    }
}

impl FromStr for SignatureBytes {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| BridgeError::InvalidInput(format!("signature is not valid hex: {}", e)))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
            BridgeError::InvalidInput(format!("signature must be 64 bytes, got {}", b.len()))
        })?;
        Ok(SignatureBytes(arr))
    }
}

impl TryFrom<String> for SignatureBytes {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SignatureBytes> for String {
    fn from(sig: SignatureBytes) -> Self {
        sig.to_hex()
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes(0x{}…)", hex::encode(&self.0[..8]))
    }
}

/// One signer's attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer: SignerId,
    pub signature: SignatureBytes,
}

/// Ordered attestations attached to one intent.
///
/// The set itself allows repeated signers; verification rejects them, so a
/// relayer bug surfaces as `DuplicateSignerInSet` instead of being silently
/// collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureSet(Vec<SignatureEntry>);

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signer: SignerId, signature: SignatureBytes) {
        self.0.push(SignatureEntry { signer, signature });
    }

    pub fn with(mut self, signer: SignerId, signature: SignatureBytes) -> Self {
        self.push(signer, signature);
        self
    }

    /// Sign `hash` with every key, in order.
    pub fn signed_by<'a>(
        hash: &IntentHash,
        signers: impl IntoIterator<Item = &'a IntentSigner>,
    ) -> Self {
        signers
            .into_iter()
            .fold(Self::new(), |set, s| set.with(s.signer_id(), s.sign(hash)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignatureEntry> {
        self.0.iter()
    }

    pub fn signers(&self) -> Vec<SignerId> {
        self.0.iter().map(|e| e.signer).collect()
    }
}

impl FromIterator<SignatureEntry> for SignatureSet {
    fn from_iter<I: IntoIterator<Item = SignatureEntry>>(iter: I) -> Self {
        SignatureSet(iter.into_iter().collect())
    }
}

/// An Ed25519 signing key held by a bridge signer or test harness.
pub struct IntentSigner {
    key: SigningKey,
}

impl IntentSigner {
    /// Fresh key from the OS random source.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill(&mut secret);
        Self::from_bytes(&secret)
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    pub fn from_hex(secret: &str) -> Result<Self, BridgeError> {
        let secret = secret.trim();
        let bytes = hex::decode(secret.strip_prefix("0x").unwrap_or(secret))
            .map_err(|e| BridgeError::InvalidInput(format!("signing key is not valid hex: {}", e)))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            BridgeError::InvalidInput(format!("signing key must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::from_bytes(&arr))
    }

    pub fn signer_id(&self) -> SignerId {
        SignerId::from_verifying_key(&self.key.verifying_key())
    }

    pub fn sign(&self, hash: &IntentHash) -> SignatureBytes {
        self.key.sign(hash.as_bytes()).into()
    }

    /// Secret key as `0x` hex. Only for key export tooling.
    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }
}

impl fmt::Debug for IntentSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentSigner")
            .field("signer", &self.signer_id())
            .field("key", &"<redacted>")
            .finish()
    }
}
