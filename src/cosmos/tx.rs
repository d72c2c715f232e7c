//! Multisig return transactions on the source chain.
//!
//! A return transaction is a single bank send out of the vault. Its body is
//! persisted as JSON on the transfer document and accumulates one partial
//! signature per validator until the threshold is reached. Partials sign the
//! legacy amino JSON sign document; the final broadcast bytes are a protobuf
//! `TxRaw` carrying a `MultiSignature`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use prost::Message;
use serde::{Deserialize, Serialize};

use super::multisig::MultisigKey;
use super::proto::{
    self, mode_info, AuthInfo, CompactBitArray, Fee, ModeInfo, MsgSend, MultiSignature, SignerInfo, TxBody, TxRaw,
};
use crate::crypto::{cosmos_address_bytes, verify_cosmos_signature, COSMOS_PUBLIC_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};
use crate::models::Signature;

const AMINO_MSG_SEND_TYPE: &str = "cosmos-sdk/MsgSend";

// ============================================================================
// PERSISTED BODY
// ============================================================================

/// Amount in a single denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinAmount {
    pub amount: String,
    pub denom: String,
}

impl CoinAmount {
    pub fn new(amount: impl Into<String>, denom: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            denom: denom.into(),
        }
    }

    fn to_proto(&self) -> proto::Coin {
        proto::Coin {
            denom: self.denom.clone(),
            amount: self.amount.clone(),
        }
    }
}

/// One member's signature over the sign document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSignature {
    /// Hex of the member's compressed public key
    pub public_key: String,
    /// Hex of the 64-byte `r || s` signature
    pub signature: String,
}

/// Unsigned send plus the partials collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigTxBody {
    pub from_address: String,
    pub to_address: String,
    pub amount: CoinAmount,
    pub fee: CoinAmount,
    pub gas_limit: u64,
    pub memo: String,
    pub sequence: u64,
    #[serde(default)]
    pub signatures: Vec<PartialSignature>,
}

// Field order of the sign document structs is alphabetical, which is the
// canonical key order of amino JSON.

#[derive(Serialize)]
struct StdSignDoc<'a> {
    account_number: String,
    chain_id: &'a str,
    fee: StdFee<'a>,
    memo: &'a str,
    msgs: Vec<AminoMsg<'a>>,
    sequence: String,
}

#[derive(Serialize)]
struct StdFee<'a> {
    amount: Vec<&'a CoinAmount>,
    gas: String,
}

#[derive(Serialize)]
struct AminoMsg<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    value: AminoMsgSend<'a>,
}

#[derive(Serialize)]
struct AminoMsgSend<'a> {
    amount: Vec<&'a CoinAmount>,
    from_address: &'a str,
    to_address: &'a str,
}

impl MultisigTxBody {
    pub fn new_send(
        from_address: &str,
        to_address: &str,
        amount: CoinAmount,
        fee: CoinAmount,
        gas_limit: u64,
        memo: &str,
        sequence: u64,
    ) -> Self {
        Self {
            from_address: from_address.to_string(),
            to_address: to_address.to_string(),
            amount,
            fee,
            gas_limit,
            memo: memo.to_string(),
            sequence,
            signatures: Vec::new(),
        }
    }

    pub fn from_json(body: &str) -> BridgeResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| BridgeError::ProtocolViolation(format!("malformed transaction body: {}", e)))
    }

    pub fn to_json(&self) -> BridgeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Legacy amino JSON sign bytes for this body at its sequence.
    pub fn sign_bytes(&self, chain_id: &str, account_number: u64) -> BridgeResult<Vec<u8>> {
        let doc = StdSignDoc {
            account_number: account_number.to_string(),
            chain_id,
            fee: StdFee {
                amount: vec![&self.fee],
                gas: self.gas_limit.to_string(),
            },
            memo: &self.memo,
            msgs: vec![AminoMsg {
                msg_type: AMINO_MSG_SEND_TYPE,
                value: AminoMsgSend {
                    amount: vec![&self.amount],
                    from_address: &self.from_address,
                    to_address: &self.to_address,
                },
            }],
            sequence: self.sequence.to_string(),
        };
        let json = serde_json::to_string(&doc)?;
        Ok(escape_html(&json).into_bytes())
    }

    /// Adds a member's partial, keeping partials in multisig key order.
    pub fn add_signature(
        &mut self,
        multisig: &MultisigKey,
        public_key: &[u8; COSMOS_PUBLIC_KEY_LENGTH],
        signature: &[u8; 64],
    ) -> BridgeResult<()> {
        if multisig.index_of(public_key).is_none() {
            return Err(BridgeError::ProtocolViolation(
                "signer is not a multisig member".to_string(),
            ));
        }
        let key_hex = hex::encode(public_key);
        if self.signatures.iter().any(|s| s.public_key == key_hex) {
            return Err(BridgeError::ProtocolViolation("already signed".to_string()));
        }
        self.signatures.push(PartialSignature {
            public_key: key_hex,
            signature: hex::encode(signature),
        });
        self.signatures
            .sort_by_key(|s| decode_hex(&s.public_key).ok().and_then(|k| multisig.index_of(&k)));
        Ok(())
    }

    /// Verifies every partial against the member set at this body's sequence.
    pub fn verify_signatures(&self, multisig: &MultisigKey, chain_id: &str, account_number: u64) -> BridgeResult<()> {
        let sign_bytes = self.sign_bytes(chain_id, account_number)?;
        let mut seen = Vec::with_capacity(self.signatures.len());

        for partial in &self.signatures {
            let public_key = decode_hex(&partial.public_key)?;
            let signature = decode_hex(&partial.signature)?;
            let Some(index) = multisig.index_of(&public_key) else {
                return Err(BridgeError::ProtocolViolation(format!(
                    "partial from non-member key {}",
                    partial.public_key
                )));
            };
            if seen.contains(&index) {
                return Err(BridgeError::ProtocolViolation(format!(
                    "duplicate partial from key {}",
                    partial.public_key
                )));
            }
            seen.push(index);
            if !verify_cosmos_signature(&public_key, &sign_bytes, &signature) {
                return Err(BridgeError::ProtocolViolation(format!(
                    "invalid partial signature from key {}",
                    partial.public_key
                )));
            }
        }
        Ok(())
    }

    /// Partials as stored on the transfer document.
    pub fn signature_records(&self) -> BridgeResult<Vec<Signature>> {
        self.signatures
            .iter()
            .map(|partial| {
                let public_key = decode_hex(&partial.public_key)?;
                Ok(Signature {
                    signer: format!("0x{}", hex::encode(cosmos_address_bytes(&public_key))),
                    signature: partial.signature.clone(),
                })
            })
            .collect()
    }

    /// Aggregates the partials and encodes the broadcastable `TxRaw`.
    pub fn encode_tx_raw(&self, multisig: &MultisigKey) -> BridgeResult<Vec<u8>> {
        let members = multisig.public_keys().len();
        let mut bitarray = CompactBitArray {
            extra_bits_stored: (members % 8) as u32,
            elems: vec![0u8; (members + 7) / 8],
        };
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; members];
        for partial in &self.signatures {
            let public_key = decode_hex(&partial.public_key)?;
            let index = multisig.index_of(&public_key).ok_or_else(|| {
                BridgeError::ProtocolViolation(format!("partial from non-member key {}", partial.public_key))
            })?;
            slots[index] = Some(decode_hex(&partial.signature)?);
        }

        let mut signatures = Vec::new();
        let mut mode_infos = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            if let Some(signature) = slot {
                bitarray.elems[index / 8] |= 1 << (7 - index % 8);
                signatures.push(signature);
                mode_infos.push(ModeInfo {
                    sum: Some(mode_info::Sum::Single(mode_info::Single {
                        mode: proto::SIGN_MODE_LEGACY_AMINO_JSON,
                    })),
                });
            }
        }

        let msg = MsgSend {
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            amount: vec![self.amount.to_proto()],
        };
        let body = TxBody {
            messages: vec![proto::Any {
                type_url: proto::MSG_SEND_TYPE_URL.to_string(),
                value: msg.encode_to_vec(),
            }],
            memo: self.memo.clone(),
            timeout_height: 0,
        };
        let auth_info = AuthInfo {
            signer_infos: vec![SignerInfo {
                public_key: Some(multisig.to_any()),
                mode_info: Some(ModeInfo {
                    sum: Some(mode_info::Sum::Multi(mode_info::Multi {
                        bitarray: Some(bitarray),
                        mode_infos,
                    })),
                }),
                sequence: self.sequence,
            }],
            fee: Some(Fee {
                amount: vec![self.fee.to_proto()],
                gas_limit: self.gas_limit,
                payer: String::new(),
                granter: String::new(),
            }),
        };
        let tx = TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: auth_info.encode_to_vec(),
            signatures: vec![MultiSignature { signatures }.encode_to_vec()],
        };
        Ok(tx.encode_to_vec())
    }

    pub fn encode_tx_base64(&self, multisig: &MultisigKey) -> BridgeResult<String> {
        Ok(BASE64.encode(self.encode_tx_raw(multisig)?))
    }
}

fn decode_hex(value: &str) -> BridgeResult<Vec<u8>> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| BridgeError::ProtocolViolation(format!("invalid hex {}: {}", value, e)))
}

/// HTML-safe escaping applied by the source chain's JSON encoder.
fn escape_html(json: &str) -> String {
    json.replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}
