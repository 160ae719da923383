//! Buffer packer
//!
//! A batch leaves the engine as one contiguous buffer:
//!
//! ```text
//! u8           pool kind tag
//! u32 BE       entry count N
//! N times      u32 BE length L, then L bytes of the record tuple's abi parameter encoding
//!              (L == 0 is a skipped entry)
//! u8           diagnostics flag, 0 or 1
//! N times      u16 BE length M, then M bytes of utf-8 (M == 0 is no error), only when flagged
//! ```
//!
//! Records carry no leading offset word. The buffer is sized up front and written once.

use alloy_dyn_abi::DynSolValue;

use crate::batch::BatchResult;
use crate::errors::PoolSyncError;
use crate::pools::{Pool, PoolKind};

const TAG_LEN: usize = 1;
const COUNT_LEN: usize = 4;
const RECORD_LEN: usize = 4;
const FLAG_LEN: usize = 1;
const NOTE_LEN: usize = 2;

fn encode_record(pool: &Pool) -> Vec<u8> {
    DynSolValue::Tuple(pool.to_sol_values()).abi_encode_params()
}

// Longest prefix of `note` that fits a u16 length without splitting a character
fn clip_note(note: &str) -> &str {
    if note.len() <= u16::MAX as usize {
        return note;
    }
    let mut end = u16::MAX as usize;
    while !note.is_char_boundary(end) {
        end -= 1;
    }
    &note[..end]
}

/// Serialize a batch result into its wire form
pub fn pack(result: &BatchResult) -> Vec<u8> {
    let records: Vec<Option<Vec<u8>>> = result
        .pools
        .iter()
        .map(|pool| pool.as_ref().map(encode_record))
        .collect();
    let notes: Option<Vec<&str>> = result.diagnostics.as_ref().map(|diagnostics| {
        diagnostics
            .iter()
            .map(|note| clip_note(note.as_deref().unwrap_or_default()))
            .collect()
    });

    let size = TAG_LEN
        + COUNT_LEN
        + records
            .iter()
            .map(|r| RECORD_LEN + r.as_ref().map_or(0, Vec::len))
            .sum::<usize>()
        + FLAG_LEN
        + notes
            .as_ref()
            .map_or(0, |notes| notes.iter().map(|n| NOTE_LEN + n.len()).sum());

    let mut buffer = Vec::with_capacity(size);
    buffer.push(result.kind as u8);
    buffer.extend_from_slice(&(records.len() as u32).to_be_bytes());
    for record in &records {
        let record = record.as_deref().unwrap_or_default();
        buffer.extend_from_slice(&(record.len() as u32).to_be_bytes());
        buffer.extend_from_slice(record);
    }
    match &notes {
        Some(notes) => {
            buffer.push(1);
            for note in notes {
                buffer.extend_from_slice(&(note.len() as u16).to_be_bytes());
                buffer.extend_from_slice(note.as_bytes());
            }
        }
        None => buffer.push(0),
    }
    debug_assert_eq!(buffer.len(), size);
    buffer
}

// Sequential reader over a packed buffer
struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], PoolSyncError> {
        if self.data.len() < len {
            return Err(PoolSyncError::Decode(format!(
                "needed {len} bytes, {} remain",
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, PoolSyncError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, PoolSyncError> {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(self.take(2)?);
        Ok(u16::from_be_bytes(bytes))
    }

    fn u32(&mut self) -> Result<u32, PoolSyncError> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(bytes))
    }
}

fn decode_record(kind: PoolKind, raw: &[u8]) -> Result<Pool, PoolSyncError> {
    let value = kind
        .pool_repr()
        .abi_decode_params(raw)
        .map_err(|e| PoolSyncError::Decode(e.to_string()))?;
    let fields = value
        .as_tuple()
        .ok_or_else(|| PoolSyncError::Decode("record is not a tuple".to_string()))?;
    let pool = kind
        .decode_pool(fields)
        .ok_or_else(|| PoolSyncError::Decode(format!("record does not match {kind:?}")))?;
    if encode_record(&pool) != raw {
        return Err(PoolSyncError::Decode("record is not canonically encoded".to_string()));
    }
    Ok(pool)
}

/// Decode a buffer produced by `pack`
pub fn unpack(buffer: &[u8]) -> Result<BatchResult, PoolSyncError> {
    let mut cursor = Cursor { data: buffer };

    let tag = cursor.u8()?;
    let kind = PoolKind::try_from(tag)
        .map_err(|tag| PoolSyncError::Decode(format!("unknown pool kind {tag}")))?;
    let count = cursor.u32()? as usize;

    // every entry takes at least its length prefix
    let mut pools = Vec::with_capacity(count.min(buffer.len() / RECORD_LEN));
    for _ in 0..count {
        let len = cursor.u32()? as usize;
        if len == 0 {
            pools.push(None);
        } else {
            pools.push(Some(decode_record(kind, cursor.take(len)?)?));
        }
    }

    let diagnostics = match cursor.u8()? {
        0 => None,
        1 => {
            let mut notes = Vec::with_capacity(count.min(buffer.len() / NOTE_LEN));
            for _ in 0..count {
                let len = cursor.u16()? as usize;
                let note = std::str::from_utf8(cursor.take(len)?)
                    .map_err(|e| PoolSyncError::Decode(e.to_string()))?;
                notes.push((!note.is_empty()).then(|| note.to_string()));
            }
            Some(notes)
        }
        flag => return Err(PoolSyncError::Decode(format!("bad diagnostics flag {flag}"))),
    };

    if !cursor.data.is_empty() {
        return Err(PoolSyncError::Decode(format!(
            "{} trailing bytes",
            cursor.data.len()
        )));
    }

    Ok(BatchResult {
        kind,
        pools,
        diagnostics,
    })
}
