//! Legacy Solana transaction wire format.
//!
//! Transactions are compiled by hand rather than through an SDK. Signing is
//! never done here: the message bytes go to the connected wallet and the
//! returned signature is spliced back in by [`Transaction::into_wire`].
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        program index, account indices, data
//! ```

use crate::blockchain::{Address, Amount};
use crate::errors::{WalletError, WalletResult};

/// SPL Token program: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
]);

const SYSTEM_TRANSFER_IX_INDEX: u32 = 2;
const TOKEN_CLOSE_ACCOUNT_IX_INDEX: u8 = 9;
const SIGNATURE_LEN: usize = 64;

/// Encode a `u16` in Solana's compact-u16 (7 bits per byte) format.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// System Program `Transfer` of `amount` from `from` to `to`.
pub fn system_transfer(from: &Address, to: &Address, amount: Amount) -> WalletResult<Instruction> {
    if amount.is_zero() {
        return Err(WalletError::InvalidAmount(
            "transfer amount must be at least one lamport".into(),
        ));
    }

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&amount.lamports().to_le_bytes());

    Ok(Instruction {
        program_id: Address::SYSTEM_PROGRAM,
        accounts: vec![AccountMeta::writable(*from, true), AccountMeta::writable(*to, false)],
        data,
    })
}

/// SPL Token `CloseAccount`: the account's lamports go to `destination`.
pub fn close_token_account(
    account: &Address,
    destination: &Address,
    owner: &Address,
) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*account, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
        data: vec![TOKEN_CLOSE_ACCOUNT_IX_INDEX],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned legacy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Canonical order: writable signers (fee payer first), read-only signers,
    /// writable non-signers, read-only non-signers.
    pub account_keys: Vec<Address>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: &Address,
        recent_blockhash: [u8; 32],
    ) -> WalletResult<Self> {
        if instructions.is_empty() {
            return Err(WalletError::TransactionError(
                "transaction has no instructions".into(),
            ));
        }

        struct Entry {
            pubkey: Address,
            is_signer: bool,
            is_writable: bool,
        }

        let mut entries: Vec<Entry> = Vec::new();
        let mut upsert = |pubkey: Address, signer: bool, writable: bool| {
            if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
                entry.is_signer |= signer;
                entry.is_writable |= writable;
            } else {
                entries.push(Entry {
                    pubkey,
                    is_signer: signer,
                    is_writable: writable,
                });
            }
        };

        upsert(*fee_payer, true, true);
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        // Stable sort keeps the fee payer at index 0.
        entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
            (true, true) => 0u8,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        if entries.len() > u8::MAX as usize {
            return Err(WalletError::TransactionError(
                "too many accounts for a legacy message".into(),
            ));
        }

        let count = |pred: fn(&Entry) -> bool| entries.iter().filter(|e| pred(e)).count() as u8;
        let num_required_signatures = count(|e| e.is_signer);
        let num_readonly_signed = count(|e| e.is_signer && !e.is_writable);
        let num_readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

        let account_keys: Vec<Address> = entries.iter().map(|e| e.pubkey).collect();
        let index_of = |key: &Address| -> WalletResult<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or_else(|| {
                    WalletError::TransactionError(format!("account {} missing from keys", key))
                })
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for ix in instructions {
            compiled.push(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.pubkey))
                    .collect::<WalletResult<Vec<u8>>>()?,
                data: ix.data.clone(),
            });
        }

        Ok(Message {
            account_keys,
            num_required_signatures,
            num_readonly_signed,
            num_readonly_unsigned,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The bytes a wallet signs.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.push(self.num_required_signatures);
        buf.push(self.num_readonly_signed);
        buf.push(self.num_readonly_unsigned);

        buf.extend_from_slice(&encode_compact_u16(self.account_keys.len() as u16));
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(&self.recent_blockhash);

        buf.extend_from_slice(&encode_compact_u16(self.instructions.len() as u16));
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            buf.extend_from_slice(&encode_compact_u16(ix.account_indices.len() as u16));
            buf.extend_from_slice(&ix.account_indices);
            buf.extend_from_slice(&encode_compact_u16(ix.data.len() as u16));
            buf.extend_from_slice(&ix.data);
        }

        buf
    }

    pub fn fee_payer(&self) -> &Address {
        &self.account_keys[0]
    }
}

/// A message plus the signatures collected for it.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub message: Message,
    pub signatures: Vec<[u8; SIGNATURE_LEN]>,
}

impl Transaction {
    pub fn new_unsigned(message: Message) -> Self {
        Self {
            message,
            signatures: Vec::new(),
        }
    }

    pub fn add_signature(&mut self, signature: [u8; SIGNATURE_LEN]) {
        self.signatures.push(signature);
    }

    /// Serialize for `sendTransaction`. Every required signer must have signed.
    pub fn into_wire(self) -> WalletResult<Vec<u8>> {
        let required = self.message.num_required_signatures as usize;
        if self.signatures.len() != required {
            return Err(WalletError::TransactionError(format!(
                "expected {} signature(s), got {}",
                required,
                self.signatures.len()
            )));
        }

        let message_bytes = self.message.serialize();
        let mut wire = Vec::with_capacity(3 + required * SIGNATURE_LEN + message_bytes.len());
        wire.extend_from_slice(&encode_compact_u16(required as u16));
        for signature in &self.signatures {
            wire.extend_from_slice(signature);
        }
        wire.extend_from_slice(&message_bytes);
        Ok(wire)
    }

    /// Base58 of the first signature: the transaction id used by explorers and RPC.
    pub fn signature_string(&self) -> Option<String> {
        self.signatures
            .first()
            .map(|sig| bs58::encode(sig).into_string())
    }
}

/// Decode a Base58 blockhash as returned by `getLatestBlockhash`.
pub fn decode_blockhash(blockhash: &str) -> WalletResult<[u8; 32]> {
    let bytes = bs58::decode(blockhash)
        .into_vec()
        .map_err(|e| WalletError::InvalidResponse(format!("bad blockhash: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        WalletError::InvalidResponse(format!("blockhash has {} bytes", v.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    #[test]
    fn token_program_constant_matches_base58() {
        assert_eq!(
            TOKEN_PROGRAM_ID.as_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
    }

    #[test]
    fn compact_u16_encoding() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
        assert_eq!(encode_compact_u16(0x7f), vec![0x7f]);
        assert_eq!(encode_compact_u16(0x80), vec![0x80, 0x01]);
        assert_eq!(encode_compact_u16(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode_compact_u16(0x4000), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn system_transfer_layout() {
        let ix = system_transfer(&addr(1), &addr(2), Amount::from_lamports(5)).unwrap();
        assert_eq!(ix.program_id, Address::SYSTEM_PROGRAM);
        assert_eq!(&ix.data[..4], &2u32.to_le_bytes());
        assert_eq!(&ix.data[4..], &5u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer);
        assert!(!ix.accounts[1].is_signer);
    }

    #[test]
    fn zero_transfer_is_rejected() {
        assert!(system_transfer(&addr(1), &addr(2), Amount::ZERO).is_err());
    }

    #[test]
    fn transfer_message_ordering() {
        let payer = addr(1);
        let ix = system_transfer(&payer, &addr(2), Amount::from_lamports(10)).unwrap();
        let message = Message::compile(&[ix], &payer, [9u8; 32]).unwrap();

        assert_eq!(message.account_keys, vec![payer, addr(2), Address::SYSTEM_PROGRAM]);
        assert_eq!(message.num_required_signatures, 1);
        assert_eq!(message.num_readonly_signed, 0);
        assert_eq!(message.num_readonly_unsigned, 1);
        assert_eq!(message.instructions[0].program_id_index, 2);
        assert_eq!(message.instructions[0].account_indices, vec![0, 1]);
        assert_eq!(message.fee_payer(), &payer);
    }

    #[test]
    fn close_account_message_merges_owner_into_payer() {
        let owner = addr(1);
        let account = addr(3);
        let ix = close_token_account(&account, &owner, &owner);
        let message = Message::compile(&[ix], &owner, [0u8; 32]).unwrap();

        assert_eq!(message.account_keys, vec![owner, account, TOKEN_PROGRAM_ID]);
        assert_eq!(message.num_required_signatures, 1);
        assert_eq!(message.instructions[0].account_indices, vec![1, 0, 0]);
        assert_eq!(message.instructions[0].data, vec![9]);
    }

    #[test]
    fn serialized_message_length() {
        let payer = addr(1);
        let ix = system_transfer(&payer, &addr(2), Amount::from_lamports(1)).unwrap();
        let bytes = Message::compile(&[ix], &payer, [7u8; 32]).unwrap().serialize();
        // header 3 + keys (1 + 3*32) + blockhash 32 + ix count 1
        // + ix (1 + 1 + 2 + 1 + 12)
        assert_eq!(bytes.len(), 3 + 97 + 32 + 1 + 17);
        assert_eq!(&bytes[..3], &[1, 0, 1]);
    }

    #[test]
    fn wire_requires_all_signatures() {
        let payer = addr(1);
        let ix = system_transfer(&payer, &addr(2), Amount::from_lamports(1)).unwrap();
        let message = Message::compile(&[ix], &payer, [7u8; 32]).unwrap();

        let unsigned = Transaction::new_unsigned(message.clone());
        assert!(unsigned.into_wire().is_err());

        let mut signed = Transaction::new_unsigned(message.clone());
        signed.add_signature([0xab; 64]);
        let expected_sig = bs58::encode([0xab; 64]).into_string();
        assert_eq!(signed.signature_string(), Some(expected_sig));
        let wire = signed.into_wire().unwrap();
        assert_eq!(wire[0], 1);
        assert_eq!(&wire[1..65], &[0xab; 64]);
        assert_eq!(&wire[65..], message.serialize().as_slice());
    }

    #[test]
    fn blockhash_decoding() {
        let encoded = bs58::encode([5u8; 32]).into_string();
        assert_eq!(decode_blockhash(&encoded).unwrap(), [5u8; 32]);
        assert!(decode_blockhash("1").is_err());
        assert!(decode_blockhash("0OIl").is_err());
    }
}
