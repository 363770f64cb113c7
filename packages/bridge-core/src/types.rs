//! Fixed-width identity and value types
//!
//! Every type here is validated when it is constructed (or deserialized), so
//! code that receives one never re-checks its shape.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Decode a fixed-width hex string, with or without `0x` prefix.
fn decode_fixed_hex<const N: usize>(what: &str, s: &str) -> Result<[u8; N], BridgeError> {
    let hex = s.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let bytes = hex::decode(hex)
        .map_err(|e| BridgeError::InvalidInput(format!("{} is not valid hex: {}", what, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        BridgeError::InvalidInput(format!("{} must be {} bytes, got {}", what, N, b.len()))
    })
}

// ============================================================================
// Chain ID (4 bytes)
// ============================================================================

/// Represents a 4-byte chain ID
///
/// Serialized as its `u32` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct ChainId(pub [u8; 4]);

impl ChainId {
    /// Create from u32
    pub fn from_u32(id: u32) -> Self {
        ChainId(id.to_be_bytes())
    }

    /// Convert to u32
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self, BridgeError> {
        decode_fixed_hex::<4>("ChainId", hex).map(ChainId)
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        crate::hash::bytes4_to_hex(&self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u32())
    }
}

impl From<u32> for ChainId {
    fn from(id: u32) -> Self {
        ChainId::from_u32(id)
    }
}

impl From<ChainId> for u32 {
    fn from(id: ChainId) -> Self {
        id.to_u32()
    }
}

// ============================================================================
// Account ID (32 bytes)
// ============================================================================

/// Universal 32-byte account identifier.
///
/// EVM addresses are left-padded with zeros; native 32-byte keys are used
/// as-is.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; 32]);

impl AccountId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }

    /// Left-pad a 20-byte EVM address into the universal form.
    pub fn from_evm(addr: &[u8; 20]) -> Self {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(addr);
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed_hex::<32>("AccountId", s).map(AccountId)
    }
}

impl TryFrom<String> for AccountId {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_hex()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

// ============================================================================
// Signer ID (Ed25519 public key)
// ============================================================================

/// Ed25519 public key of a bridge signer.
///
/// Construction rejects bytes that do not decompress to a curve point and
/// small-order (weak) keys, so a `SignerId` is always usable for strict
/// verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignerId([u8; 32]);

impl SignerId {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, BridgeError> {
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|_| BridgeError::InvalidInput("signer key is not a valid Ed25519 point".into()))?;
        if key.is_weak() {
            return Err(BridgeError::InvalidInput(
                "signer key has small order".to_string(),
            ));
        }
        Ok(SignerId(bytes))
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        SignerId(key.to_bytes())
    }

    /// The Ed25519 verifying key for this signer.
    pub fn verifying_key(&self) -> Result<VerifyingKey, BridgeError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| BridgeError::InvalidSignature(*self))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Short form for log lines.
    pub fn short(&self) -> String {
        format!("0x{}…", hex::encode(&self.0[..4]))
    }
}

impl FromStr for SignerId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignerId::from_bytes(decode_fixed_hex::<32>("SignerId", s)?)
    }
}

impl TryFrom<String> for SignerId {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SignerId> for String {
    fn from(id: SignerId) -> Self {
        id.to_hex()
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignerId({})", self.short())
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Token amount in base units. Always strictly positive.
///
/// Serialized as a decimal string since JSON numbers cannot carry a u128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    pub fn new(value: u128) -> Result<Self, BridgeError> {
        if value == 0 {
            return Err(BridgeError::InvalidInput(
                "Amount must be greater than zero".to_string(),
            ));
        }
        Ok(Amount(value))
    }

    pub fn get(&self) -> u128 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u128 = s
            .trim()
            .parse()
            .map_err(|_| BridgeError::InvalidInput(format!("invalid amount: {:?}", s)))?;
        Amount::new(value)
    }
}

impl TryFrom<String> for Amount {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Which side of the bridge an intent acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Lock,
    Unlock,
}

impl Direction {
    /// Byte used in the canonical intent encoding.
    pub fn tag(&self) -> u8 {
        match self {
            Direction::Lock => 0,
            Direction::Unlock => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Lock => "lock",
            Direction::Unlock => "unlock",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Intent Hash
// ============================================================================

/// Content hash identifying an intent (keccak256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntentHash(pub [u8; 32]);

impl IntentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        crate::hash::bytes32_to_hex(&self.0)
    }
}

impl FromStr for IntentHash {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed_hex::<32>("IntentHash", s).map(IntentHash)
    }
}

impl TryFrom<String> for IntentHash {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IntentHash> for String {
    fn from(hash: IntentHash) -> Self {
        hash.to_hex()
    }
}

impl fmt::Display for IntentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for IntentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntentHash({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn test_chain_id_from_u32() {
        let id = ChainId::from_u32(1);
        assert_eq!(id.to_u32(), 1);
        assert_eq!(id.0, [0, 0, 0, 1]);
    }

    #[test]
    fn test_chain_id_from_hex() {
        let id = ChainId::from_hex("0x00000001").unwrap();
        assert_eq!(id.to_u32(), 1);

        let id2 = ChainId::from_hex("00000002").unwrap();
        assert_eq!(id2.to_u32(), 2);

        assert!(ChainId::from_hex("0x0001").is_err());
    }

    #[test]
    fn test_chain_id_to_hex_and_display() {
        let id = ChainId::from_u32(256);
        assert_eq!(id.to_hex(), "0x00000100");
        assert_eq!(format!("{}", ChainId::from_u32(42)), "42");
    }

    #[test]
    fn test_chain_id_serializes_as_number() {
        let json = serde_json::to_string(&ChainId::from_u32(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: ChainId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, ChainId::from_u32(7));
    }

    #[test]
    fn test_account_id_from_evm_pads_left() {
        let addr = [0xabu8; 20];
        let account = AccountId::from_evm(&addr);
        assert_eq!(&account.as_bytes()[..12], &[0u8; 12]);
        assert_eq!(&account.as_bytes()[12..], &addr);
    }

    #[test]
    fn test_account_id_rejects_wrong_width() {
        assert!("0xdead".parse::<AccountId>().is_err());
        assert!("not-hex".parse::<AccountId>().is_err());
        let ok = format!("0x{}", "11".repeat(32));
        assert_eq!(ok.parse::<AccountId>().unwrap().to_hex(), ok);
    }

    #[test]
    fn test_signer_id_accepts_real_key() {
        let key = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let id = SignerId::from_bytes(key.to_bytes()).unwrap();
        assert_eq!(id, SignerId::from_verifying_key(&key));
        assert_eq!(id.to_hex().parse::<SignerId>().unwrap(), id);
    }

    #[test]
    fn test_signer_id_rejects_identity_point() {
        // Compressed identity point: small order, must be refused
        let mut identity = [0u8; 32];
        identity[0] = 1;
        assert!(SignerId::from_bytes(identity).is_err());
    }

    #[test]
    fn test_amount_rejects_zero() {
        assert!(Amount::new(0).is_err());
        assert_eq!(Amount::new(5).unwrap().get(), 5);
        assert!("0".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let amount = Amount::new(u128::MAX).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, format!("\"{}\"", u128::MAX));
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }

    #[test]
    fn test_direction_tags() {
        assert_eq!(Direction::Lock.tag(), 0);
        assert_eq!(Direction::Unlock.tag(), 1);
        assert_eq!(format!("{}", Direction::Unlock), "unlock");
    }

    #[test]
    fn test_intent_hash_hex() {
        let hash = IntentHash([1u8; 32]);
        let hex = hash.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(hex.parse::<IntentHash>().unwrap(), hash);
    }
}
