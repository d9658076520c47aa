use crate::elf::{ElfError, Ph64};

#[inline]
pub fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
pub fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
pub fn le64(x: &[u8]) -> u64 {
    u64::from_le_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]])
}

/// Get the file bytes backing a `PT_LOAD` (filesz may be < memsz).
pub fn segment_file_bytes<'a>(bytes: &'a [u8], ph: &Ph64) -> Result<&'a [u8], ElfError> {
    let off = usize::try_from(ph.p_offset).map_err(|_| ElfError::OutOfBounds)?;
    let sz = usize::try_from(ph.p_filesz).map_err(|_| ElfError::OutOfBounds)?;
    let end = off.checked_add(sz).ok_or(ElfError::OutOfBounds)?;
    bytes.get(off..end).ok_or(ElfError::OutOfBounds)
}
