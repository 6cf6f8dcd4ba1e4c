//! App Store receipt decoding.
//!
//! The receipt is a PKCS#7 `signedData` container whose encapsulated content is a
//! DER `SET` of attributes:
//!
//! ```text
//! ReceiptAttribute ::= SEQUENCE {
//!     type    INTEGER,
//!     version INTEGER,
//!     value   OCTET STRING
//! }
//! ```
//!
//! In-app purchases (attribute 17) nest another attribute set inside their value.
//! Newer receipts use BER indefinite lengths in the outer container, so the reader
//! accepts both encodings.

use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::models::receipt::{PurchaseRecord, Receipt};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OCTET_STRING_CONSTRUCTED: u8 = 0x24;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_PRINTABLE_STRING: u8 = 0x13;
const TAG_IA5_STRING: u8 = 0x16;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_CONTEXT_0: u8 = 0xa0;

/// 1.2.840.113549.1.7.2
const OID_SIGNED_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
/// 1.2.840.113549.1.7.1
const OID_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];

const MAX_DEPTH: usize = 32;

// Receipt attribute types
const ATTR_BUNDLE_ID: i64 = 2;
const ATTR_APP_VERSION: i64 = 3;
const ATTR_CREATION_DATE: i64 = 12;
const ATTR_IN_APP: i64 = 17;
const ATTR_ORIGINAL_APP_VERSION: i64 = 19;

// In-app purchase attribute types
const IAP_QUANTITY: i64 = 1701;
const IAP_PRODUCT_ID: i64 = 1702;
const IAP_TRANSACTION_ID: i64 = 1703;
const IAP_PURCHASE_DATE: i64 = 1704;
const IAP_ORIGINAL_TRANSACTION_ID: i64 = 1705;
const IAP_ORIGINAL_PURCHASE_DATE: i64 = 1706;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiptDecodeError {
    #[error("receipt is truncated")]
    Truncated,

    #[error("unexpected tag 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("unsupported tag 0x{0:02x}")]
    UnsupportedTag(u8),

    #[error("invalid length encoding")]
    InvalidLength,

    #[error("nesting too deep")]
    NestingTooDeep,

    #[error("container is not PKCS#7 signed data")]
    NotSignedData,

    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("attribute {0} does not hold a valid string")]
    InvalidString(i64),

    #[error("attribute {0} does not hold a valid integer")]
    InvalidInteger(i64),

    #[error("signature rejected: {0}")]
    SignatureRejected(String),
}

type DecodeResult<T> = std::result::Result<T, ReceiptDecodeError>;

/// Signed container pieces handed to a [`ReceiptVerifier`]
#[derive(Debug, Clone)]
pub struct SignedReceipt<'a> {
    /// Encapsulated attribute set, as signed
    pub payload: Cow<'a, [u8]>,
    /// Raw `certificates` block, if present
    pub certificates: Option<&'a [u8]>,
    /// Raw `signerInfos` block, if present
    pub signer_infos: Option<&'a [u8]>,
}

/// Checks a receipt's signature before any attribute is trusted
pub trait ReceiptVerifier: Send + Sync {
    fn verify(&self, receipt: &SignedReceipt<'_>) -> std::result::Result<(), String>;
}

/// Trusts the container's cleartext fields, performing no signature check.
/// Embedders that need tamper resistance inject their own verifier pinned to a trust anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptUnverified;

impl ReceiptVerifier for AcceptUnverified {
    fn verify(&self, _receipt: &SignedReceipt<'_>) -> std::result::Result<(), String> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct ReceiptParser {
    verifier: Arc<dyn ReceiptVerifier>,
}

impl Default for ReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReceiptParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptParser").finish_non_exhaustive()
    }
}

impl ReceiptParser {
    pub fn new() -> Self {
        Self {
            verifier: Arc::new(AcceptUnverified),
        }
    }

    pub fn with_verifier(verifier: Arc<dyn ReceiptVerifier>) -> Self {
        Self { verifier }
    }

    /// Decode a raw receipt blob
    pub fn parse(&self, bytes: &[u8]) -> DecodeResult<Receipt> {
        let signed = unwrap_signed_data(bytes)?;

        self.verifier
            .verify(&signed)
            .map_err(ReceiptDecodeError::SignatureRejected)?;

        decode_receipt(&signed.payload)
    }

    /// Hex SHA-256 of the raw blob, for diagnostics
    pub fn fingerprint(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }
}

fn unwrap_signed_data(bytes: &[u8]) -> DecodeResult<SignedReceipt<'_>> {
    let content_info = DerReader::new(bytes).expect(TAG_SEQUENCE)?;
    let mut content_info = DerReader::new(content_info.contents);

    if content_info.expect(TAG_OID)?.contents != OID_SIGNED_DATA {
        return Err(ReceiptDecodeError::NotSignedData);
    }

    let explicit = content_info.expect(TAG_CONTEXT_0)?;
    let signed_data = DerReader::new(explicit.contents).expect(TAG_SEQUENCE)?;
    let mut signed_data = DerReader::new(signed_data.contents);

    signed_data.expect(TAG_INTEGER)?; // version
    signed_data.expect(TAG_SET)?; // digestAlgorithms

    let encapsulated = signed_data.expect(TAG_SEQUENCE)?;
    let mut encapsulated = DerReader::new(encapsulated.contents);
    if encapsulated.expect(TAG_OID)?.contents != OID_DATA {
        return Err(ReceiptDecodeError::NotSignedData);
    }
    let wrapped = encapsulated.expect(TAG_CONTEXT_0)?;
    let payload = octet_string(&DerReader::new(wrapped.contents).read()?)?;

    let mut certificates = None;
    let mut signer_infos = None;
    while !signed_data.is_empty() {
        let tlv = signed_data.read()?;
        match tlv.tag {
            TAG_CONTEXT_0 => certificates = Some(tlv.contents),
            TAG_SET => signer_infos = Some(tlv.contents),
            _ => {} // crls
        }
    }

    Ok(SignedReceipt {
        payload,
        certificates,
        signer_infos,
    })
}

fn decode_receipt(payload: &[u8]) -> DecodeResult<Receipt> {
    let mut original_app_version = None;
    let mut bundle_identifier = None;
    let mut app_version = None;
    let mut creation_date = None;
    let mut in_app_purchases = Vec::new();

    for attribute in attributes(payload)? {
        match attribute.kind {
            ATTR_ORIGINAL_APP_VERSION => original_app_version = Some(attribute.string()?),
            ATTR_BUNDLE_ID => bundle_identifier = Some(attribute.string()?),
            ATTR_APP_VERSION => app_version = Some(attribute.string()?),
            ATTR_CREATION_DATE => creation_date = attribute.date()?,
            ATTR_IN_APP => {
                if let Some(record) = decode_purchase(&attribute.value)? {
                    in_app_purchases.push(record);
                }
            }
            _ => {}
        }
    }

    let original_app_version = original_app_version
        .ok_or(ReceiptDecodeError::MissingAttribute("original_application_version"))?;

    Ok(Receipt {
        original_app_version,
        bundle_identifier,
        app_version,
        creation_date,
        in_app_purchases,
    })
}

/// `None` when the record carries no product identifier
fn decode_purchase(payload: &[u8]) -> DecodeResult<Option<PurchaseRecord>> {
    let mut product_identifier = None;
    let mut record = PurchaseRecord::new(String::new());

    for attribute in attributes(payload)? {
        match attribute.kind {
            IAP_PRODUCT_ID => product_identifier = Some(attribute.string()?),
            IAP_ORIGINAL_PURCHASE_DATE => record.original_purchase_date = attribute.date()?,
            IAP_PURCHASE_DATE => record.purchase_date = attribute.date()?,
            IAP_TRANSACTION_ID => record.transaction_identifier = Some(attribute.string()?),
            IAP_ORIGINAL_TRANSACTION_ID => {
                record.original_transaction_identifier = Some(attribute.string()?)
            }
            IAP_QUANTITY => record.quantity = Some(attribute.integer()?),
            _ => {}
        }
    }

    Ok(product_identifier.map(|id| PurchaseRecord {
        product_identifier: id,
        ..record
    }))
}

struct Attribute<'a> {
    kind: i64,
    value: Cow<'a, [u8]>,
}

impl Attribute<'_> {
    fn string(&self) -> DecodeResult<String> {
        let tlv = DerReader::new(&self.value)
            .read()
            .map_err(|_| ReceiptDecodeError::InvalidString(self.kind))?;

        match tlv.tag {
            TAG_UTF8_STRING | TAG_IA5_STRING | TAG_PRINTABLE_STRING => {
                String::from_utf8(tlv.contents.to_vec())
                    .map_err(|_| ReceiptDecodeError::InvalidString(self.kind))
            }
            _ => Err(ReceiptDecodeError::InvalidString(self.kind)),
        }
    }

    /// Empty or unparseable dates are treated as absent
    fn date(&self) -> DecodeResult<Option<OffsetDateTime>> {
        let text = self.string()?;
        Ok(OffsetDateTime::parse(&text, &Rfc3339).ok())
    }

    fn integer(&self) -> DecodeResult<i64> {
        let tlv = DerReader::new(&self.value)
            .expect(TAG_INTEGER)
            .map_err(|_| ReceiptDecodeError::InvalidInteger(self.kind))?;
        integer(tlv.contents).map_err(|_| ReceiptDecodeError::InvalidInteger(self.kind))
    }
}

fn attributes(payload: &[u8]) -> DecodeResult<Vec<Attribute<'_>>> {
    let set = DerReader::new(payload).expect(TAG_SET)?;
    let mut reader = DerReader::new(set.contents);
    let mut attributes = Vec::new();

    while !reader.is_empty() {
        let sequence = reader.expect(TAG_SEQUENCE)?;
        let mut fields = DerReader::new(sequence.contents);
        let kind = integer(fields.expect(TAG_INTEGER)?.contents)?;
        fields.expect(TAG_INTEGER)?; // version
        let value = octet_string(&fields.read()?)?;
        attributes.push(Attribute { kind, value });
    }

    Ok(attributes)
}

fn integer(contents: &[u8]) -> DecodeResult<i64> {
    if contents.is_empty() || contents.len() > 8 {
        return Err(ReceiptDecodeError::InvalidLength);
    }
    let negative = contents[0] & 0x80 != 0;
    let initial: i64 = if negative { -1 } else { 0 };
    Ok(contents
        .iter()
        .fold(initial, |acc, byte| (acc << 8) | i64::from(*byte)))
}

/// Primitive octet strings borrow, constructed ones are concatenated
fn octet_string<'a>(tlv: &Tlv<'a>) -> DecodeResult<Cow<'a, [u8]>> {
    octet_string_at(tlv, 0)
}

fn octet_string_at<'a>(tlv: &Tlv<'a>, depth: usize) -> DecodeResult<Cow<'a, [u8]>> {
    match tlv.tag {
        TAG_OCTET_STRING => Ok(Cow::Borrowed(tlv.contents)),
        TAG_OCTET_STRING_CONSTRUCTED => {
            if depth >= MAX_DEPTH {
                return Err(ReceiptDecodeError::NestingTooDeep);
            }
            let mut reader = DerReader::new(tlv.contents);
            let mut joined = Vec::new();
            while !reader.is_empty() {
                joined.extend_from_slice(&octet_string_at(&reader.read()?, depth + 1)?);
            }
            Ok(Cow::Owned(joined))
        }
        found => Err(ReceiptDecodeError::UnexpectedTag {
            expected: TAG_OCTET_STRING,
            found,
        }),
    }
}

#[derive(Debug, Clone, Copy)]
struct Tlv<'a> {
    tag: u8,
    contents: &'a [u8],
}

/// Minimal BER/DER reader over single-byte tags
struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn expect(&mut self, tag: u8) -> DecodeResult<Tlv<'a>> {
        let tlv = self.read()?;
        if tlv.tag != tag {
            return Err(ReceiptDecodeError::UnexpectedTag {
                expected: tag,
                found: tlv.tag,
            });
        }
        Ok(tlv)
    }

    fn read(&mut self) -> DecodeResult<Tlv<'a>> {
        self.read_at(0)
    }

    fn read_at(&mut self, depth: usize) -> DecodeResult<Tlv<'a>> {
        if depth > MAX_DEPTH {
            return Err(ReceiptDecodeError::NestingTooDeep);
        }

        let tag = self.byte()?;
        if tag & 0x1f == 0x1f {
            return Err(ReceiptDecodeError::UnsupportedTag(tag));
        }

        let first = self.byte()?;
        if first == 0x80 {
            // indefinite length, contents run until the end-of-contents marker
            if tag & 0x20 == 0 {
                return Err(ReceiptDecodeError::InvalidLength);
            }
            let start = self.pos;
            loop {
                if self.data[self.pos..].starts_with(&[0, 0]) {
                    let contents = &self.data[start..self.pos];
                    self.pos += 2;
                    return Ok(Tlv { tag, contents });
                }
                if self.is_empty() {
                    return Err(ReceiptDecodeError::Truncated);
                }
                self.read_at(depth + 1)?;
            }
        }

        let len = if first < 0x80 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7f);
            if count > 4 {
                return Err(ReceiptDecodeError::InvalidLength);
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.byte()?);
            }
            len
        };

        let end = self
            .pos
            .checked_add(len)
            .ok_or(ReceiptDecodeError::InvalidLength)?;
        let contents = self
            .data
            .get(self.pos..end)
            .ok_or(ReceiptDecodeError::Truncated)?;
        self.pos = end;

        Ok(Tlv { tag, contents })
    }

    fn byte(&mut self) -> DecodeResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(ReceiptDecodeError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }
}
