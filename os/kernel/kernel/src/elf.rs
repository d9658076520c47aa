//! Minimal ELF64 reader for program images.
//!
//! Only statically linked little-endian x86-64 executables are accepted.
//! The reader never allocates; [`ProgramImage::from_elf`] copies the
//! `PT_LOAD` contents out of the file.

mod helpers;

use crate::program::{ProgramImage, ProgramSegment};
use alloc::string::String;
use bitfield_struct::bitfield;
use helpers::{le16, le32, le64, segment_file_bytes};
use kernel_memory_addresses::VirtualAddress;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ElfError {
    #[error("file is shorter than an ELF header")]
    TooShort,
    #[error("bad ELF magic")]
    BadMagic,
    #[error("not a 64-bit ELF file")]
    BadClass,
    #[error("not an x86-64 executable")]
    BadMachine,
    #[error("malformed ELF header")]
    BadHeader,
    #[error("position-independent executables are not supported")]
    PositionIndependent,
    #[error("program header or segment lies outside the file")]
    OutOfBounds,
    #[error("segment at {0} is larger in the file than in memory")]
    BadSegment(VirtualAddress),
}

#[derive(Copy, Clone, Debug)]
#[allow(clippy::struct_field_names)]
pub struct Eh64 {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: VirtualAddress,
    pub e_phoff: u64,
    pub e_phentsize: u16,
    pub e_phnum: u16,
}

#[derive(Copy, Clone, Debug)]
#[allow(clippy::struct_field_names)]
pub struct Ph64 {
    pub p_type: u32,
    pub p_flags: PFlags,
    pub p_offset: u64,
    pub p_vaddr: VirtualAddress,
    pub p_filesz: u64,
    pub p_memsz: u64,
}

/// `Elf64_Phdr.p_flags` (SVr4): bit0=X, bit1=W, bit2=R.
#[bitfield(u32)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool, // PF_X = 1
    #[bits(1)]
    pub write: bool, // PF_W = 2
    #[bits(1)]
    pub read: bool, // PF_R = 4
    #[bits(29)]
    __: u32,
}

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const EM_X86_64: u16 = 62;
const PT_LOAD: u32 = 1;

pub struct ElfView<'a> {
    bytes: &'a [u8],
    pub eh: Eh64,
}

/// Validate the header of `bytes` and return a view over it.
///
/// # Errors
/// Any [`ElfError`] describing why the file is not a loadable executable.
pub fn elf64_view(bytes: &[u8]) -> Result<ElfView<'_>, ElfError> {
    use ElfError::{BadClass, BadHeader, BadMachine, BadMagic, OutOfBounds, TooShort};
    if bytes.len() < EHDR_SIZE {
        return Err(TooShort);
    }

    // e_ident
    if &bytes[0..4] != b"\x7FELF" {
        return Err(BadMagic);
    }

    // ELFCLASS64
    if bytes[4] != 2 {
        return Err(BadClass);
    }

    // little-endian
    if bytes[5] != 1 {
        return Err(BadHeader);
    }

    let eh = Eh64 {
        e_type: le16(&bytes[16..18]),
        e_machine: le16(&bytes[18..20]),
        e_version: le32(&bytes[20..24]),
        e_entry: VirtualAddress::new(le64(&bytes[24..32])),
        e_phoff: le64(&bytes[32..40]),
        e_phentsize: le16(&bytes[54..56]),
        e_phnum: le16(&bytes[56..58]),
    };

    match eh.e_type {
        ET_EXEC => {}
        ET_DYN => return Err(ElfError::PositionIndependent),
        _ => return Err(BadHeader),
    }

    if eh.e_machine != EM_X86_64 {
        return Err(BadMachine);
    }

    if eh.e_version != 1 || usize::from(eh.e_phentsize) != PHDR_SIZE {
        return Err(BadHeader);
    }

    let phoff = usize::try_from(eh.e_phoff).map_err(|_| OutOfBounds)?;
    let need = usize::from(eh.e_phnum)
        .checked_mul(PHDR_SIZE)
        .and_then(|n| n.checked_add(phoff))
        .ok_or(OutOfBounds)?;
    if need > bytes.len() {
        return Err(OutOfBounds);
    }

    Ok(ElfView { bytes, eh })
}

impl ElfView<'_> {
    /// Iterate all program headers.
    pub fn iter_ph(&self) -> impl Iterator<Item = Ph64> + '_ {
        #[allow(clippy::cast_possible_truncation)]
        let phoff = self.eh.e_phoff as usize;
        (0..usize::from(self.eh.e_phnum)).filter_map(move |i| {
            let p = phoff + i * PHDR_SIZE;
            let s = self.bytes.get(p..p + PHDR_SIZE)?;
            Some(Ph64 {
                p_type: le32(&s[0..4]),
                p_flags: PFlags::from_bits(le32(&s[4..8])),
                p_offset: le64(&s[8..16]),
                p_vaddr: VirtualAddress::new(le64(&s[16..24])),
                p_filesz: le64(&s[32..40]),
                p_memsz: le64(&s[40..48]),
            })
        })
    }

    /// Iterate only `PT_LOAD` headers.
    pub fn iter_pt_load(&self) -> impl Iterator<Item = Ph64> + '_ {
        self.iter_ph().filter(|ph| ph.p_type == PT_LOAD)
    }

    pub const fn entry(&self) -> VirtualAddress {
        self.eh.e_entry
    }
}

impl ProgramImage {
    /// Build an image from an ELF64 executable.
    ///
    /// Every `PT_LOAD` header becomes one segment; `PF_W` decides whether it
    /// is mapped writable. Bytes past `p_filesz` are zero-filled on load.
    ///
    /// # Errors
    /// [`ElfError`] if the file is malformed.
    pub fn from_elf(name: impl Into<String>, bytes: &[u8]) -> Result<Self, ElfError> {
        let view = elf64_view(bytes)?;
        let mut builder = Self::builder(name).entry(view.entry());
        for ph in view.iter_pt_load() {
            if ph.p_filesz > ph.p_memsz {
                return Err(ElfError::BadSegment(ph.p_vaddr));
            }
            let data = segment_file_bytes(bytes, &ph)?;
            builder = builder.segment(ProgramSegment::new(
                ph.p_vaddr,
                data.to_vec(),
                ph.p_memsz,
                ph.p_flags.write(),
            ));
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// A one-segment executable: `code` at `0x10_0000`, writable if `flags` has `PF_W`.
    fn tiny_elf(code: &[u8], memsz: u64, flags: u32) -> Vec<u8> {
        let mut b = alloc::vec![0u8; EHDR_SIZE + PHDR_SIZE];
        b[0..4].copy_from_slice(b"\x7FELF");
        b[4] = 2;
        b[5] = 1;
        b[6] = 1;
        b[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        b[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        b[20..24].copy_from_slice(&1u32.to_le_bytes());
        b[24..32].copy_from_slice(&0x10_0004u64.to_le_bytes());
        b[32..40].copy_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
        b[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        b[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        b[56..58].copy_from_slice(&1u16.to_le_bytes());

        let ph = &mut b[EHDR_SIZE..];
        ph[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
        ph[4..8].copy_from_slice(&flags.to_le_bytes());
        ph[8..16].copy_from_slice(&((EHDR_SIZE + PHDR_SIZE) as u64).to_le_bytes());
        ph[16..24].copy_from_slice(&0x10_0000u64.to_le_bytes());
        ph[24..32].copy_from_slice(&0x10_0000u64.to_le_bytes());
        ph[32..40].copy_from_slice(&(code.len() as u64).to_le_bytes());
        ph[40..48].copy_from_slice(&memsz.to_le_bytes());
        ph[48..56].copy_from_slice(&0x1000u64.to_le_bytes());

        b.extend_from_slice(code);
        b
    }

    #[test]
    fn loads_single_segment() {
        let elf = tiny_elf(&[0x90, 0x90, 0xCD, 0x80], 0x20, 0b101);
        let image = ProgramImage::from_elf("nop", &elf).unwrap();
        assert_eq!(image.name(), "nop");
        assert_eq!(image.entry(), VirtualAddress::new(0x10_0004));
        assert_eq!(image.segments().len(), 1);

        let seg = &image.segments()[0];
        assert_eq!(seg.va, VirtualAddress::new(0x10_0000));
        assert_eq!(seg.data, [0x90, 0x90, 0xCD, 0x80]);
        assert_eq!(seg.size, 0x20);
        assert!(!seg.writable);
    }

    #[test]
    fn pf_w_makes_segment_writable() {
        let elf = tiny_elf(&[1, 2, 3], 3, 0b110);
        let image = ProgramImage::from_elf("data", &elf).unwrap();
        assert!(image.segments()[0].writable);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(elf64_view(&[0; 8]).err(), Some(ElfError::TooShort));

        let mut elf = tiny_elf(&[], 0, 0);
        elf[0] = 0;
        assert_eq!(elf64_view(&elf).err(), Some(ElfError::BadMagic));

        let mut elf = tiny_elf(&[], 0, 0);
        elf[16..18].copy_from_slice(&ET_DYN.to_le_bytes());
        assert_eq!(elf64_view(&elf).err(), Some(ElfError::PositionIndependent));

        let mut elf = tiny_elf(&[], 0, 0);
        elf[18..20].copy_from_slice(&3u16.to_le_bytes());
        assert_eq!(elf64_view(&elf).err(), Some(ElfError::BadMachine));
    }

    #[test]
    fn rejects_truncated_segment() {
        let mut elf = tiny_elf(&[1, 2, 3, 4], 4, 0);
        elf.truncate(elf.len() - 2);
        assert_eq!(
            ProgramImage::from_elf("cut", &elf).err(),
            Some(ElfError::OutOfBounds)
        );
    }

    #[test]
    fn rejects_filesz_above_memsz() {
        let elf = tiny_elf(&[1, 2, 3, 4], 2, 0);
        assert_eq!(
            ProgramImage::from_elf("odd", &elf).err(),
            Some(ElfError::BadSegment(VirtualAddress::new(0x10_0000)))
        );
    }
}
