//! Minimal Solidity ABI helpers for the handful of calls and events used.

use alloy_primitives::U256;

use crate::crypto::{keccak256, parse_eth_address};
use crate::error::{BridgeError, BridgeResult};

const WORD: usize = 32;

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `topic0` of an event, `0x`-prefixed.
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Calldata for a call taking a single address argument.
pub fn encode_call_with_address(signature: &str, address: &str) -> BridgeResult<Vec<u8>> {
    let address = parse_eth_address(address).map_err(|e| BridgeError::Validation(e.to_string()))?;
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&address);
    Ok(data)
}

fn word(data: &[u8], index: usize) -> BridgeResult<&[u8]> {
    data.get(index * WORD..(index + 1) * WORD)
        .ok_or_else(|| BridgeError::ChainRpc(format!("ABI data too short for word {}", index)))
}

pub fn decode_u256(data: &[u8], index: usize) -> BridgeResult<U256> {
    Ok(U256::from_be_slice(word(data, index)?))
}

/// Address in the low 20 bytes of a word, lowercase `0x` form.
pub fn decode_address(data: &[u8], index: usize) -> BridgeResult<String> {
    Ok(format!("0x{}", hex::encode(&word(data, index)?[12..])))
}

/// Dynamic `string` whose head offset sits at word `index`.
pub fn decode_string(data: &[u8], index: usize) -> BridgeResult<String> {
    let offset = u64::try_from(decode_u256(data, index)?)
        .map_err(|_| BridgeError::ChainRpc("ABI string offset overflow".to_string()))? as usize;
    let length_word = data
        .get(offset..offset + WORD)
        .ok_or_else(|| BridgeError::ChainRpc("ABI string length out of range".to_string()))?;
    let length = u64::try_from(U256::from_be_slice(length_word))
        .map_err(|_| BridgeError::ChainRpc("ABI string length overflow".to_string()))? as usize;
    let bytes = data
        .get(offset + WORD..offset + WORD + length)
        .ok_or_else(|| BridgeError::ChainRpc("ABI string data out of range".to_string()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| BridgeError::ChainRpc(format!("ABI string not UTF-8: {}", e)))
}

fn topic_bytes(topic: &str) -> BridgeResult<[u8; WORD]> {
    let bytes = hex::decode(topic.strip_prefix("0x").unwrap_or(topic))
        .map_err(|e| BridgeError::ChainRpc(format!("invalid topic {}: {}", topic, e)))?;
    bytes
        .try_into()
        .map_err(|_| BridgeError::ChainRpc(format!("topic is not 32 bytes: {}", topic)))
}

pub fn topic_to_u256(topic: &str) -> BridgeResult<U256> {
    Ok(U256::from_be_bytes(topic_bytes(topic)?))
}

/// Raw 20 bytes of an address topic.
pub fn topic_to_address_bytes(topic: &str) -> BridgeResult<[u8; 20]> {
    let bytes = topic_bytes(topic)?;
    let mut address = [0u8; 20];
    address.copy_from_slice(&bytes[12..]);
    Ok(address)
}

pub fn topic_to_address(topic: &str) -> BridgeResult<String> {
    Ok(format!("0x{}", hex::encode(topic_to_address_bytes(topic)?)))
}
