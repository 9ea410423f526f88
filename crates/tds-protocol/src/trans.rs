//! Transaction Manager request encoding (packet type `0x0E`).
//!
//! These are the binary `TM_BEGIN_XACT` / `TM_COMMIT_XACT` / `TM_ROLLBACK_XACT`
//! messages SQL Server uses to manage explicit transactions, as distinct from
//! sending `BEGIN TRANSACTION` as SQL batch text. The server always replies
//! with an ENVCHANGE token carrying the new transaction descriptor (or an
//! all-zero descriptor when the transaction ends).

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::write_utf16_string;
use crate::prelude::*;

/// Transaction manager request type, carried as the first `u16` of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TmReqType {
    /// Begin a new transaction.
    BeginXact = 5,
    /// Commit the current transaction.
    CommitXact = 7,
    /// Roll back the current transaction (optionally to a savepoint).
    RollbackXact = 8,
}

/// Transaction isolation level as encoded on the wire for `TM_BEGIN_XACT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WireIsolationLevel {
    /// Use the connection's current isolation level.
    #[default]
    Unspecified = 0x00,
    /// READ UNCOMMITTED.
    ReadUncommitted = 0x01,
    /// READ COMMITTED.
    ReadCommitted = 0x02,
    /// REPEATABLE READ.
    RepeatableRead = 0x03,
    /// SERIALIZABLE.
    Serializable = 0x04,
    /// SNAPSHOT.
    Snapshot = 0x05,
}

fn all_headers(transaction_descriptor: u64) -> BytesMut {
    let mut buf = BytesMut::with_capacity(22);
    let start = buf.len();
    buf.put_u32_le(0); // total length placeholder
    buf.put_u32_le(18); // header length
    buf.put_u16_le(0x0002); // transaction descriptor header type
    buf.put_u64_le(transaction_descriptor);
    buf.put_u32_le(1); // outstanding request count
    let total_len = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&total_len.to_le_bytes());
    buf
}

/// Encode a `TM_BEGIN_XACT` request.
///
/// `name` is an optional transaction name (mostly cosmetic, surfaced in
/// `sys.dm_tran_active_transactions`); pass `""` for an unnamed transaction.
#[must_use]
pub fn encode_begin(
    transaction_descriptor: u64,
    isolation_level: WireIsolationLevel,
    name: &str,
) -> Bytes {
    let mut buf = all_headers(transaction_descriptor);
    buf.put_u16_le(TmReqType::BeginXact as u16);
    buf.put_u8(isolation_level as u8);
    buf.put_u8(name.encode_utf16().count() as u8);
    write_utf16_string(&mut buf, name);
    buf.freeze()
}

/// Encode a `TM_COMMIT_XACT` request.
///
/// Set `flags` bit 0 to ask the server to immediately begin a new
/// transaction after committing (chained transactions); `0` for the common
/// case of not chaining.
#[must_use]
pub fn encode_commit(transaction_descriptor: u64, name: &str, flags: u8) -> Bytes {
    let mut buf = all_headers(transaction_descriptor);
    buf.put_u16_le(TmReqType::CommitXact as u16);
    buf.put_u8(name.encode_utf16().count() as u8);
    write_utf16_string(&mut buf, name);
    buf.put_u8(flags);
    buf.freeze()
}

/// Encode a `TM_ROLLBACK_XACT` request.
///
/// `name` may identify a savepoint to roll back to; an empty name rolls
/// back the entire transaction.
#[must_use]
pub fn encode_rollback(transaction_descriptor: u64, name: &str, flags: u8) -> Bytes {
    let mut buf = all_headers(transaction_descriptor);
    buf.put_u16_le(TmReqType::RollbackXact as u16);
    buf.put_u8(name.encode_utf16().count() as u8);
    write_utf16_string(&mut buf, name);
    buf.put_u8(flags);
    buf.freeze()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn begin_has_isolation_and_name_length() {
        let payload = encode_begin(0, WireIsolationLevel::Serializable, "sp1");
        // ALL_HEADERS (22) + type (2) + isolation (1) + name_len (1) + name (3*2)
        assert_eq!(payload.len(), 22 + 2 + 1 + 1 + 6);
        assert_eq!(payload[22], 0x05); // TmReqType::BeginXact low byte
        assert_eq!(payload[24], WireIsolationLevel::Serializable as u8);
        assert_eq!(payload[25], 3); // name length in UTF-16 code units
    }

    #[test]
    fn commit_carries_transaction_descriptor() {
        let payload = encode_commit(0xDEAD_BEEF_0000_0001, "", 0);
        let descriptor = u64::from_le_bytes(payload[10..18].try_into().unwrap());
        assert_eq!(descriptor, 0xDEAD_BEEF_0000_0001);
    }

    #[test]
    fn rollback_empty_name_rolls_back_whole_transaction() {
        let payload = encode_rollback(1, "", 0);
        assert_eq!(payload.len(), 22 + 2 + 1 + 1); // no name bytes
        assert_eq!(payload[payload.len() - 2], 0); // name_len = 0
    }
}
