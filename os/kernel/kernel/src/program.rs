//! Program images and the registry the boot code loads them from.

use alloc::string::String;
use alloc::vec::Vec;
use kernel_memory_addresses::VirtualAddress;

/// One loadable segment of a program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramSegment {
    /// Virtual address of the first byte.
    pub va: VirtualAddress,
    /// Size in memory; bytes past `data` are zero.
    pub size: u64,
    /// Initial contents.
    pub data: Vec<u8>,
    pub writable: bool,
}

impl ProgramSegment {
    /// A segment at `va` holding `data`, occupying at least `size` bytes.
    #[must_use]
    pub fn new(va: VirtualAddress, data: Vec<u8>, size: u64, writable: bool) -> Self {
        let size = size.max(data.len() as u64);
        Self {
            va,
            size,
            data,
            writable,
        }
    }

    /// One past the last byte.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.va.as_u64().saturating_add(self.size)
    }
}

/// A named, loadable program.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramImage {
    name: String,
    entry: VirtualAddress,
    segments: Vec<ProgramSegment>,
}

impl ProgramImage {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ProgramImageBuilder {
        ProgramImageBuilder {
            name: name.into(),
            entry: None,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        self.entry
    }

    #[must_use]
    pub fn segments(&self) -> &[ProgramSegment] {
        &self.segments
    }
}

/// Assembles a [`ProgramImage`] segment by segment.
///
/// ```rust,ignore
/// let image = ProgramImage::builder("counter")
///     .code(VirtualAddress::new(0x10_0000), &[0xCD, 0x80])
///     .data(VirtualAddress::new(0x10_1000), &[0; 8])
///     .build();
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct ProgramImageBuilder {
    name: String,
    entry: Option<VirtualAddress>,
    segments: Vec<ProgramSegment>,
}

impl ProgramImageBuilder {
    /// A read-only segment.
    pub fn code(self, va: VirtualAddress, bytes: &[u8]) -> Self {
        self.segment(ProgramSegment::new(va, bytes.to_vec(), 0, false))
    }

    /// A writable segment.
    pub fn data(self, va: VirtualAddress, bytes: &[u8]) -> Self {
        self.segment(ProgramSegment::new(va, bytes.to_vec(), 0, true))
    }

    /// A writable, zero-initialized segment of `size` bytes.
    pub fn bss(self, va: VirtualAddress, size: u64) -> Self {
        self.segment(ProgramSegment::new(va, Vec::new(), size, true))
    }

    pub fn segment(mut self, segment: ProgramSegment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Entry point; defaults to the start of the first segment.
    pub const fn entry(mut self, va: VirtualAddress) -> Self {
        self.entry = Some(va);
        self
    }

    #[must_use]
    pub fn build(self) -> ProgramImage {
        let entry = self
            .entry
            .or_else(|| self.segments.first().map(|s| s.va))
            .unwrap_or_else(VirtualAddress::zero);
        ProgramImage {
            name: self.name,
            entry,
            segments: self.segments,
        }
    }
}

/// Named programs available at boot, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    programs: Vec<ProgramImage>,
}

impl ProgramRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            programs: Vec::new(),
        }
    }

    /// Add `image`, replacing a program of the same name in place.
    pub fn register(&mut self, image: ProgramImage) {
        match self.programs.iter_mut().find(|p| p.name == image.name) {
            Some(slot) => *slot = image,
            None => self.programs.push(image),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProgramImage> {
        self.programs.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramImage> {
        self.programs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl FromIterator<ProgramImage> for ProgramRegistry {
    fn from_iter<T: IntoIterator<Item = ProgramImage>>(iter: T) -> Self {
        let mut registry = Self::new();
        for image in iter {
            registry.register(image);
        }
        registry
    }
}
