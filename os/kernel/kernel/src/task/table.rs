use crate::task::{NPROC, Pid, Process};
use core::ops::{Index, IndexMut};

/// Fixed array of process slots, indexed by [`Pid`].
#[derive(Debug, Clone)]
pub struct ProcessTable<const N: usize = NPROC> {
    slots: [Process; N],
}

impl<const N: usize> Default for ProcessTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ProcessTable<N> {
    /// A table with every slot free.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|slot| Process::free(Pid::new(slot))),
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots.get(pid.as_usize())
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots.get_mut(pid.as_usize())
    }

    /// Lowest free slot other than the kernel slot.
    #[must_use]
    pub fn first_free(&self) -> Option<Pid> {
        self.slots
            .iter()
            .skip(1)
            .find(|p| p.space.is_none() && p.state == crate::ProcessState::Free)
            .map(Process::pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter()
    }
}

impl<const N: usize> Index<Pid> for ProcessTable<N> {
    type Output = Process;

    fn index(&self, pid: Pid) -> &Self::Output {
        &self.slots[pid.as_usize()]
    }
}

impl<const N: usize> IndexMut<Pid> for ProcessTable<N> {
    fn index_mut(&mut self, pid: Pid) -> &mut Self::Output {
        &mut self.slots[pid.as_usize()]
    }
}
