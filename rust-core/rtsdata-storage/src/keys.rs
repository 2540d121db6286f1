// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Order-preserving key codec for the measurement tables.
//
// Every key starts with a one-byte namespace. Identities are big-endian u64
// and timestamps are signed microseconds with the sign bit flipped, so plain
// lexicographic byte order equals (well, tag, [label], timestamp, row) order.
//
//   well        W | well
//   tag         T | tag
//   label       L | label
//   numeric     M | well | tag | ts | row          -> f64 (BE)
//   interval    C | well | tag | label | ts | row  -> u8
//   label index I | well | tag | label             -> empty
//   sequence    S | namespace                      -> next id (BE)

use rtsdata_model::{LabelId, TagId, WellId};

use crate::error::StorageError;

pub const WELL: u8 = b'W';
pub const TAG: u8 = b'T';
pub const LABEL: u8 = b'L';
pub const NUMERIC: u8 = b'M';
pub const INTERVAL: u8 = b'C';
pub const LABEL_INDEX: u8 = b'I';
pub const SEQUENCE: u8 = b'S';

const ID_LEN: usize = 8;
pub const NUMERIC_KEY_LEN: usize = 1 + ID_LEN * 4;
pub const INTERVAL_KEY_LEN: usize = 1 + ID_LEN * 5;
pub const LABEL_INDEX_KEY_LEN: usize = 1 + ID_LEN * 3;

const SIGN_BIT: u64 = 1 << 63;

/// Map signed microseconds onto an unsigned, byte-sortable encoding.
pub fn encode_timestamp(micros: i64) -> [u8; 8] {
    ((micros as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_timestamp(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64
}

/// Incremental key writer
#[derive(Debug, Clone)]
pub struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    pub fn new(namespace: u8) -> Self {
        let mut buf = Vec::with_capacity(INTERVAL_KEY_LEN);
        buf.push(namespace);
        Self(buf)
    }

    pub fn id(mut self, id: u64) -> Self {
        self.0.extend_from_slice(&id.to_be_bytes());
        self
    }

    pub fn timestamp(mut self, micros: i64) -> Self {
        self.0.extend_from_slice(&encode_timestamp(micros));
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.0
    }
}

pub fn reference_key(namespace: u8, id: u64) -> Vec<u8> {
    KeyBuilder::new(namespace).id(id).finish()
}

pub fn sequence_key(namespace: u8) -> Vec<u8> {
    vec![SEQUENCE, namespace]
}

/// Prefix shared by every numeric row of one (well, tag) channel
pub fn numeric_prefix(well: WellId, tag: TagId) -> Vec<u8> {
    KeyBuilder::new(NUMERIC).id(well.0).id(tag.0).finish()
}

/// Prefix shared by every interval row of one (well, tag, label) channel
pub fn interval_prefix(well: WellId, tag: TagId, label: LabelId) -> Vec<u8> {
    KeyBuilder::new(INTERVAL).id(well.0).id(tag.0).id(label.0).finish()
}

/// Prefix of the label index entries for one (well, tag) channel
pub fn label_index_prefix(well: WellId, tag: TagId) -> Vec<u8> {
    KeyBuilder::new(LABEL_INDEX).id(well.0).id(tag.0).finish()
}

pub fn label_index_key(well: WellId, tag: TagId, label: LabelId) -> Vec<u8> {
    KeyBuilder::new(LABEL_INDEX)
        .id(well.0)
        .id(tag.0)
        .id(label.0)
        .finish()
}

/// Append a timestamp and row number to a channel prefix
pub fn observation_key(prefix: &[u8], micros: i64, row: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + ID_LEN * 2);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&encode_timestamp(micros));
    key.extend_from_slice(&row.to_be_bytes());
    key
}

/// Lowest key of a channel at `micros` (inclusive lower bound of a scan)
pub fn timestamp_floor(prefix: &[u8], micros: i64) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend_from_slice(&encode_timestamp(micros));
    key
}

fn read_u64(key: &[u8], offset: usize) -> Result<u64, StorageError> {
    key.get(offset..offset + ID_LEN)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| StorageError::CorruptedData(format!("key too short: {} bytes", key.len())))
}

fn expect_layout(key: &[u8], namespace: u8, len: usize) -> Result<(), StorageError> {
    if key.len() != len || key[0] != namespace {
        return Err(StorageError::CorruptedData(format!(
            "unexpected key layout (namespace {:?}, {} bytes)",
            key.first().map(|b| *b as char),
            key.len()
        )));
    }
    Ok(())
}

/// Decoded numeric row key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericKey {
    pub well: WellId,
    pub tag: TagId,
    pub micros: i64,
    pub row: u64,
}

pub fn decode_numeric_key(key: &[u8]) -> Result<NumericKey, StorageError> {
    expect_layout(key, NUMERIC, NUMERIC_KEY_LEN)?;
    Ok(NumericKey {
        well: WellId(read_u64(key, 1)?),
        tag: TagId(read_u64(key, 9)?),
        micros: decode_timestamp(read_u64(key, 17)?.to_be_bytes()),
        row: read_u64(key, 25)?,
    })
}

/// Decoded interval row key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalKey {
    pub well: WellId,
    pub tag: TagId,
    pub label: LabelId,
    pub micros: i64,
    pub row: u64,
}

pub fn decode_interval_key(key: &[u8]) -> Result<IntervalKey, StorageError> {
    expect_layout(key, INTERVAL, INTERVAL_KEY_LEN)?;
    Ok(IntervalKey {
        well: WellId(read_u64(key, 1)?),
        tag: TagId(read_u64(key, 9)?),
        label: LabelId(read_u64(key, 17)?),
        micros: decode_timestamp(read_u64(key, 25)?.to_be_bytes()),
        row: read_u64(key, 33)?,
    })
}

/// Label identity from a label index key
pub fn decode_label_index_key(key: &[u8]) -> Result<LabelId, StorageError> {
    expect_layout(key, LABEL_INDEX, LABEL_INDEX_KEY_LEN)?;
    Ok(LabelId(read_u64(key, 17)?))
}
