//! Hash computation for intent identities
//!
//! Intents are identified by keccak256 over a packed, fixed-layout encoding.
//! The layout is part of the wire contract with relayers and signers: any
//! change here invalidates every outstanding signature.
//!
//! ## Transfer intent layout (90 bytes)
//!
//! ```text
//! tag(1)=0x01 | srcChain(4) | destChain(4) | account(32) | amount(32) | nonce(8) | direction(1) | expiry(8)
//! ```
//!
//! `amount` is a big-endian uint256 (u128 left-padded), all other integers
//! are big-endian. Admin intents use tag `0x02` so that no admin signature
//! can be replayed as a transfer signature.

use tiny_keccak::{Hasher, Keccak};

/// Domain tag for transfer intents.
pub const TRANSFER_INTENT_TAG: u8 = 0x01;

/// Domain tag for administrative intents.
pub const ADMIN_INTENT_TAG: u8 = 0x02;

/// Length of the packed transfer intent encoding.
pub const TRANSFER_INTENT_LEN: usize = 90;

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Pack the fields of a transfer intent into the canonical layout.
#[allow(clippy::too_many_arguments)]
pub fn encode_transfer_intent(
    src_chain: &[u8; 4],
    dest_chain: &[u8; 4],
    account: &[u8; 32],
    amount: u128,
    nonce: u64,
    direction: u8,
    expiry: u64,
) -> [u8; TRANSFER_INTENT_LEN] {
    let mut data = [0u8; TRANSFER_INTENT_LEN];

    data[0] = TRANSFER_INTENT_TAG;

    // srcChain (4 bytes)
    data[1..5].copy_from_slice(src_chain);

    // destChain (4 bytes)
    data[5..9].copy_from_slice(dest_chain);

    // account (32 bytes)
    data[9..41].copy_from_slice(account);

    // amount (uint256 as 32 bytes, big-endian; upper 16 bytes stay zero)
    data[41 + 16..73].copy_from_slice(&amount.to_be_bytes());

    // nonce (uint64 as 8 bytes, big-endian)
    data[73..81].copy_from_slice(&nonce.to_be_bytes());

    data[81] = direction;

    // expiry (uint64 as 8 bytes, big-endian)
    data[82..90].copy_from_slice(&expiry.to_be_bytes());

    data
}

/// Compute the transfer intent hash (keccak256 of the packed layout).
#[allow(clippy::too_many_arguments)]
pub fn compute_transfer_hash(
    src_chain: &[u8; 4],
    dest_chain: &[u8; 4],
    account: &[u8; 32],
    amount: u128,
    nonce: u64,
    direction: u8,
    expiry: u64,
) -> [u8; 32] {
    keccak256(&encode_transfer_intent(
        src_chain, dest_chain, account, amount, nonce, direction, expiry,
    ))
}

/// Convert bytes to hex string with 0x prefix
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Convert 4-byte array to hex string with 0x prefix
pub fn bytes4_to_hex(bytes: &[u8; 4]) -> String {
    format!("0x{}", hex::encode(bytes))
}
