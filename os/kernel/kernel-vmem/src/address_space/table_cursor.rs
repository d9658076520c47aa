use crate::{AddressSpace, ENTRIES_PER_TABLE, PhysMapper, TableIndex, TableLevel};
use alloc::vec::Vec;
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// One table frame found by a [`TableCursor`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableFrame {
    /// First virtual address covered by the table.
    pub va: VirtualAddress,
    /// Level of the table.
    pub level: TableLevel,
    /// The frame holding the table.
    pub page: PhysicalPage,
}

/// Pre-order walk over the **internal table frames** of an address space.
///
/// The root itself is not yielded and leaf data frames are never visited.
/// Teardown uses this to release table structure separately from data.
pub struct TableCursor<'m, M: PhysMapper> {
    mem: &'m M,
    stack: Vec<Pending>,
}

struct Pending {
    table: PhysicalPage,
    level: TableLevel,
    va: u64,
    next: usize,
}

impl<'m, M: PhysMapper> TableCursor<'m, M> {
    #[must_use]
    pub fn new(mem: &'m M, space: AddressSpace) -> Self {
        let mut stack = Vec::with_capacity(TableLevel::LINKS.len());
        stack.push(Pending {
            table: space.root_page(),
            level: TableLevel::Pml4,
            va: 0,
            next: 0,
        });
        Self { mem, stack }
    }
}

impl<M: PhysMapper> Iterator for TableCursor<'_, M> {
    type Item = TableFrame;

    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let Some(child_level) = top.level.next() else {
                self.stack.pop();
                continue;
            };
            if top.next == ENTRIES_PER_TABLE {
                self.stack.pop();
                continue;
            }

            let index = TableIndex::new(top.next as u16);
            top.next += 1;

            let entry = self.mem.read_entry(top.table, index);
            if !entry.present() || entry.large_page() {
                continue;
            }

            let frame = TableFrame {
                va: VirtualAddress::new(top.va + index.as_u64() * top.level.entry_span()),
                level: child_level,
                page: entry.physical_page(),
            };
            if child_level != TableLevel::Pt {
                self.stack.push(Pending {
                    table: frame.page,
                    level: child_level,
                    va: frame.va.as_u64(),
                    next: 0,
                });
            }
            return Some(frame);
        }
    }
}
