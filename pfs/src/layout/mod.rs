//! # On-disk records
//!
//! Device layout:
//! 分区表扇区 | 分区头 | 超级块 | 索引节点表 | 数据区
//!
//! Every record is little-endian and encoded with `binrw`. Name fields hold
//! NUL-padded ASCII.

mod dir_entry;
mod header;
mod inode;
mod super_block;
mod table;

pub use self::{
    dir_entry::{dir_slots, DirEntry},
    header::PartitionHeader,
    inode::{inode_position, Inode, InodeMode, FILE_MODE},
    super_block::SuperBlock,
    table::{TableSector, TableSlot},
};

/// Bytes up to the first NUL with non-ASCII bytes dropped.
pub(crate) fn decode_name(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii())
        .map(|&b| char::from(b))
        .collect()
}

/// NUL-padded ASCII field; the last byte is always NUL.
pub(crate) fn encode_name<const N: usize>(name: &str) -> [u8; N] {
    let mut field = [0; N];
    let bytes = name.bytes().filter(|&b| b.is_ascii() && b != 0);
    for (dst, b) in field.iter_mut().zip(bytes.take(N.saturating_sub(1))) {
        *dst = b;
    }
    field
}

/// The form a name takes once stored in a field of `max` usable bytes.
pub fn sanitize_name(name: &str, max: usize) -> String {
    name.chars()
        .filter(|&c| c.is_ascii() && c != '\0')
        .take(max)
        .collect()
}
