//! Transaction construction and envelope encoding.
//!
//! Covers the slice of the ledger's XDR schema the wallet produces: a
//! `ENVELOPE_TYPE_TX` envelope holding one transaction with time bounds, no
//! memo, and payment or change-trust operations.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::blockchain::{Account, Address, Amount, Asset};
use crate::errors::{WalletError, WalletResult};

/// Fee charged per operation when the configuration does not override it.
pub const BASE_FEE: u32 = 100;
/// Seconds a built transaction stays valid.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_OPERATIONS: usize = 100;
const MAX_SIGNATURES: u32 = 20;

const ENVELOPE_TYPE_TX: i32 = 2;
const KEY_TYPE_ED25519: i32 = 0;
const PRECOND_NONE: i32 = 0;
const PRECOND_TIME: i32 = 1;
const MEMO_NONE: i32 = 0;
const OP_PAYMENT: i32 = 1;
const OP_CHANGE_TRUST: i32 = 6;
const ASSET_TYPE_NATIVE: i32 = 0;
const ASSET_TYPE_CREDIT_ALPHANUM4: i32 = 1;
const ASSET_TYPE_CREDIT_ALPHANUM12: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Payment {
        destination: Address,
        asset: Asset,
        amount: Amount,
    },
    ChangeTrust {
        asset: Asset,
        limit: Amount,
    },
}

impl Operation {
    pub fn payment(destination: Address, asset: Asset, amount: Amount) -> WalletResult<Self> {
        if amount.is_zero() {
            return Err(WalletError::InvalidAmount(
                "Payment amount must be positive".to_string(),
            ));
        }
        Ok(Operation::Payment {
            destination,
            asset,
            amount,
        })
    }

    /// Opt in to an issued asset with the maximum limit.
    pub fn change_trust(asset: Asset) -> WalletResult<Self> {
        Self::change_trust_with_limit(asset, Amount::MAX)
    }

    pub fn change_trust_with_limit(asset: Asset, limit: Amount) -> WalletResult<Self> {
        if asset.is_native() {
            return Err(WalletError::InvalidAsset(
                "The native asset does not need a trustline".to_string(),
            ));
        }
        Ok(Operation::ChangeTrust { asset, limit })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    /// Zero means no upper bound.
    pub max_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source: Address,
    pub fee: u32,
    pub sequence: i64,
    pub time_bounds: Option<TimeBounds>,
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn to_xdr(&self) -> Vec<u8> {
        let mut writer = XdrWriter::default();
        write_transaction(&mut writer, self);
        writer.into_inner()
    }

    /// Hash that signers commit to, scoped to a network passphrase.
    pub fn signature_hash(&self, network_passphrase: &str) -> [u8; 32] {
        let network_id = Sha256::digest(network_passphrase.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(network_id);
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(self.to_xdr());
        hasher.finalize().into()
    }

    /// Hex transaction id as the ledger reports it.
    pub fn hash_hex(&self, network_passphrase: &str) -> String {
        hex::encode(self.signature_hash(network_passphrase))
    }

    pub fn into_envelope(self) -> TransactionEnvelope {
        TransactionEnvelope {
            transaction: self,
            signatures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Vec<u8>,
}

/// Transaction plus the signatures collected for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub transaction: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl TransactionEnvelope {
    pub fn add_signature(&mut self, signer: &Address, signature: [u8; 64]) -> WalletResult<()> {
        if self.signatures.len() >= MAX_SIGNATURES as usize {
            return Err(WalletError::CryptoError(
                "Envelope already carries the maximum number of signatures".to_string(),
            ));
        }
        self.signatures.push(DecoratedSignature {
            hint: signer.signature_hint(),
            signature: signature.to_vec(),
        });
        Ok(())
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    pub fn to_xdr(&self) -> Vec<u8> {
        let mut writer = XdrWriter::default();
        writer.write_i32(ENVELOPE_TYPE_TX);
        write_transaction(&mut writer, &self.transaction);
        writer.write_u32(self.signatures.len() as u32);
        for signature in &self.signatures {
            writer.write_fixed(&signature.hint);
            writer.write_var(&signature.signature);
        }
        writer.into_inner()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_xdr())
    }

    pub fn from_xdr(bytes: &[u8]) -> WalletResult<Self> {
        let mut reader = XdrReader::new(bytes);
        let envelope_type = reader.read_i32()?;
        if envelope_type != ENVELOPE_TYPE_TX {
            return Err(xdr_error(format!(
                "unsupported envelope type {}",
                envelope_type
            )));
        }

        let transaction = read_transaction(&mut reader)?;

        let count = reader.read_u32()?;
        if count > MAX_SIGNATURES {
            return Err(xdr_error("too many signatures".to_string()));
        }
        let mut signatures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let hint = reader.read_array::<4>()?;
            let signature = reader.read_var(64)?;
            signatures.push(DecoratedSignature { hint, signature });
        }

        reader.finish()?;
        Ok(Self {
            transaction,
            signatures,
        })
    }

    pub fn from_base64(encoded: &str) -> WalletResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| xdr_error(format!("invalid base64: {}", e)))?;
        Self::from_xdr(&bytes)
    }
}

/// Builds single-source transactions against a freshly loaded account.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    source: Address,
    sequence: i64,
    base_fee: u32,
    timeout_secs: u64,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    pub fn new(account: &Account) -> WalletResult<Self> {
        Ok(Self {
            source: account.address.clone(),
            sequence: account.next_sequence()?,
            base_fee: BASE_FEE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            operations: Vec::new(),
        })
    }

    pub fn base_fee(mut self, base_fee: u32) -> Self {
        self.base_fee = base_fee;
        self
    }

    /// Validity window in seconds; zero leaves the transaction unbounded.
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn add_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn build(self) -> WalletResult<Transaction> {
        let now = u64::try_from(Utc::now().timestamp())
            .map_err(|_| WalletError::CryptoError("System clock before epoch".to_string()))?;
        self.build_at(now)
    }

    pub fn build_at(self, now_unix: u64) -> WalletResult<Transaction> {
        if self.operations.is_empty() {
            return Err(WalletError::validation_failed("operations"));
        }
        if self.operations.len() > MAX_OPERATIONS {
            return Err(WalletError::validation_failed("operations"));
        }

        let fee = self
            .base_fee
            .checked_mul(self.operations.len() as u32)
            .ok_or_else(|| WalletError::InvalidAmount("Fee overflow".to_string()))?;

        let max_time = if self.timeout_secs == 0 {
            0
        } else {
            now_unix.saturating_add(self.timeout_secs)
        };

        Ok(Transaction {
            source: self.source,
            fee,
            sequence: self.sequence,
            time_bounds: Some(TimeBounds {
                min_time: 0,
                max_time,
            }),
            operations: self.operations,
        })
    }
}

fn xdr_error(msg: String) -> WalletError {
    WalletError::InvalidResponse(format!("Malformed transaction envelope: {}", msg))
}

fn write_transaction(writer: &mut XdrWriter, tx: &Transaction) {
    write_account(writer, &tx.source);
    writer.write_u32(tx.fee);
    writer.write_i64(tx.sequence);
    match &tx.time_bounds {
        None => writer.write_i32(PRECOND_NONE),
        Some(bounds) => {
            writer.write_i32(PRECOND_TIME);
            writer.write_u64(bounds.min_time);
            writer.write_u64(bounds.max_time);
        }
    }
    writer.write_i32(MEMO_NONE);
    writer.write_u32(tx.operations.len() as u32);
    for operation in &tx.operations {
        // no per-operation source account
        writer.write_u32(0);
        match operation {
            Operation::Payment {
                destination,
                asset,
                amount,
            } => {
                writer.write_i32(OP_PAYMENT);
                write_account(writer, destination);
                write_asset(writer, asset);
                writer.write_i64(amount.stroops());
            }
            Operation::ChangeTrust { asset, limit } => {
                writer.write_i32(OP_CHANGE_TRUST);
                write_asset(writer, asset);
                writer.write_i64(limit.stroops());
            }
        }
    }
    // TransactionExt v0
    writer.write_i32(0);
}

fn write_account(writer: &mut XdrWriter, address: &Address) {
    writer.write_i32(KEY_TYPE_ED25519);
    writer.write_fixed(address.public_key_bytes());
}

fn write_asset(writer: &mut XdrWriter, asset: &Asset) {
    match asset {
        Asset::Native => writer.write_i32(ASSET_TYPE_NATIVE),
        Asset::CreditAlphanum4 { code, issuer } => {
            writer.write_i32(ASSET_TYPE_CREDIT_ALPHANUM4);
            writer.write_fixed(&padded_code::<4>(code));
            write_account(writer, issuer);
        }
        Asset::CreditAlphanum12 { code, issuer } => {
            writer.write_i32(ASSET_TYPE_CREDIT_ALPHANUM12);
            writer.write_fixed(&padded_code::<12>(code));
            write_account(writer, issuer);
        }
    }
}

fn padded_code<const N: usize>(code: &str) -> [u8; N] {
    let mut out = [0u8; N];
    for (slot, byte) in out.iter_mut().zip(code.bytes()) {
        *slot = byte;
    }
    out
}

fn read_transaction(reader: &mut XdrReader<'_>) -> WalletResult<Transaction> {
    let source = read_account(reader)?;
    let fee = reader.read_u32()?;
    let sequence = reader.read_i64()?;
    let time_bounds = match reader.read_i32()? {
        PRECOND_NONE => None,
        PRECOND_TIME => Some(TimeBounds {
            min_time: reader.read_u64()?,
            max_time: reader.read_u64()?,
        }),
        other => return Err(xdr_error(format!("unsupported precondition {}", other))),
    };

    let memo = reader.read_i32()?;
    if memo != MEMO_NONE {
        return Err(xdr_error(format!("unsupported memo type {}", memo)));
    }

    let count = reader.read_u32()? as usize;
    if count > MAX_OPERATIONS {
        return Err(xdr_error("too many operations".to_string()));
    }
    let mut operations = Vec::with_capacity(count);
    for _ in 0..count {
        if reader.read_u32()? != 0 {
            return Err(xdr_error(
                "operation source accounts are not supported".to_string(),
            ));
        }
        let operation = match reader.read_i32()? {
            OP_PAYMENT => Operation::Payment {
                destination: read_account(reader)?,
                asset: read_asset(reader)?,
                amount: read_amount(reader)?,
            },
            OP_CHANGE_TRUST => Operation::ChangeTrust {
                asset: read_asset(reader)?,
                limit: read_amount(reader)?,
            },
            other => return Err(xdr_error(format!("unsupported operation {}", other))),
        };
        operations.push(operation);
    }

    let ext = reader.read_i32()?;
    if ext != 0 {
        return Err(xdr_error(format!("unsupported transaction ext {}", ext)));
    }

    Ok(Transaction {
        source,
        fee,
        sequence,
        time_bounds,
        operations,
    })
}

fn read_account(reader: &mut XdrReader<'_>) -> WalletResult<Address> {
    let key_type = reader.read_i32()?;
    if key_type != KEY_TYPE_ED25519 {
        return Err(xdr_error(format!("unsupported account key type {}", key_type)));
    }
    Ok(Address::from_public_key(reader.read_array::<32>()?))
}

fn read_asset(reader: &mut XdrReader<'_>) -> WalletResult<Asset> {
    match reader.read_i32()? {
        ASSET_TYPE_NATIVE => Ok(Asset::Native),
        ASSET_TYPE_CREDIT_ALPHANUM4 => {
            let code = reader.read_array::<4>()?;
            let issuer = read_account(reader)?;
            Asset::credit(&decode_code(&code)?, issuer)
        }
        ASSET_TYPE_CREDIT_ALPHANUM12 => {
            let code = reader.read_array::<12>()?;
            let issuer = read_account(reader)?;
            // Short codes may still arrive in the wide encoding; keep the width read.
            match Asset::credit(&decode_code(&code)?, issuer)? {
                Asset::CreditAlphanum4 { code, issuer } | Asset::CreditAlphanum12 { code, issuer } => {
                    Ok(Asset::CreditAlphanum12 { code, issuer })
                }
                Asset::Native => Err(xdr_error("credit asset decoded as native".to_string())),
            }
        }
        other => Err(xdr_error(format!("unsupported asset type {}", other))),
    }
}

fn decode_code(raw: &[u8]) -> WalletResult<String> {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec())
        .map_err(|_| xdr_error("asset code is not valid UTF-8".to_string()))
}

fn read_amount(reader: &mut XdrReader<'_>) -> WalletResult<Amount> {
    Amount::from_stroops(reader.read_i64()?)
}

#[derive(Debug, Default)]
struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
    }

    fn write_var(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_fixed(bytes);
    }

    fn pad(&mut self, len: usize) {
        let padding = (4 - len % 4) % 4;
        self.buf.extend(std::iter::repeat(0u8).take(padding));
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

struct XdrReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> XdrReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> WalletResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| xdr_error("unexpected end of input".to_string()))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> WalletResult<u32> {
        let raw = self.read_array::<4>()?;
        Ok(u32::from_be_bytes(raw))
    }

    fn read_i32(&mut self) -> WalletResult<i32> {
        let raw = self.read_array::<4>()?;
        Ok(i32::from_be_bytes(raw))
    }

    fn read_u64(&mut self) -> WalletResult<u64> {
        let raw = self.read_array::<8>()?;
        Ok(u64::from_be_bytes(raw))
    }

    fn read_i64(&mut self) -> WalletResult<i64> {
        let raw = self.read_array::<8>()?;
        Ok(i64::from_be_bytes(raw))
    }

    fn read_array<const N: usize>(&mut self) -> WalletResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        self.skip_padding(N)?;
        Ok(out)
    }

    fn read_var(&mut self, max_len: usize) -> WalletResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        if len > max_len {
            return Err(xdr_error(format!("opaque field longer than {}", max_len)));
        }
        let bytes = self.take(len)?.to_vec();
        self.skip_padding(len)?;
        Ok(bytes)
    }

    fn skip_padding(&mut self, len: usize) -> WalletResult<()> {
        let padding = (4 - len % 4) % 4;
        if self.take(padding)?.iter().any(|b| *b != 0) {
            return Err(xdr_error("non-zero padding".to_string()));
        }
        Ok(())
    }

    fn finish(&self) -> WalletResult<()> {
        if self.offset != self.bytes.len() {
            return Err(xdr_error("trailing bytes after envelope".to_string()));
        }
        Ok(())
    }
}
