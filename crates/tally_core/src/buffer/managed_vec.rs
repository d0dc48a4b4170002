use tally_error::Result;
use tracing::trace;

use super::buffer_manager::{BufferManager, Reservation};

/// A zero-initialized `Vec` whose memory is accounted for by a buffer
/// manager.
///
/// The reservation is sized to the vec's length, and is given back to the
/// manager when the vec is dropped.
#[derive(Debug)]
pub struct ManagedVec<T, B: BufferManager> {
    data: Vec<T>,
    reservation: Reservation<B>,
}

impl<T, B> ManagedVec<T, B>
where
    T: Copy + Default,
    B: BufferManager,
{
    /// Create a new vec with `len` default-initialized elements.
    pub fn try_with_len(manager: &B, len: usize) -> Result<Self> {
        let reservation = manager.try_reserve(Self::byte_size(len))?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, T::default());

        Ok(ManagedVec { data, reservation })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes currently reserved for this vec.
    pub fn reserved_bytes(&self) -> usize {
        self.reservation.size()
    }

    pub fn get(&self, idx: usize) -> Option<T> {
        self.data.get(idx).copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Grow the vec so that it holds at least `min_len` elements.
    ///
    /// Does nothing if the vec is already long enough. Otherwise the length
    /// is at least doubled to amortize reallocations. New elements are
    /// default-initialized, existing elements are preserved.
    ///
    /// On error the vec is left unchanged.
    pub fn grow_to(&mut self, min_len: usize) -> Result<()> {
        let len = self.data.len();
        if len >= min_len {
            return Ok(());
        }

        let new_len = usize::max(min_len, len.saturating_mul(2));
        let additional = new_len - len;

        // Only merged once the allocation succeeds, dropping the local
        // reservation gives the bytes back otherwise.
        let grown = self
            .reservation
            .manager()
            .try_reserve(Self::byte_size(additional))?;
        self.data.try_reserve_exact(additional)?;
        self.data.resize(new_len, T::default());
        self.reservation.merge(grown);

        trace!(old_len = len, new_len, "grew managed vec");

        Ok(())
    }

    fn byte_size(len: usize) -> usize {
        len.saturating_mul(std::mem::size_of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use tally_error::ErrorKind;

    use super::*;
    use crate::buffer::buffer_manager::{NopBufferManager, TrackedBufferManager};

    #[test]
    fn new_is_zeroed() {
        let v = ManagedVec::<u64, _>::try_with_len(&NopBufferManager, 4).unwrap();
        assert_eq!(&[0, 0, 0, 0], v.as_slice());
    }

    #[test]
    fn grow_to_no_increase() {
        let mut v = ManagedVec::<u64, _>::try_with_len(&NopBufferManager, 14).unwrap();
        v.grow_to(12).unwrap();
        assert_eq!(14, v.len());
    }

    #[test]
    fn grow_to_doubles() {
        let mut v = ManagedVec::<u64, _>::try_with_len(&NopBufferManager, 8).unwrap();
        v.grow_to(9).unwrap();
        assert_eq!(16, v.len());
    }

    #[test]
    fn grow_to_large_jump() {
        let mut v = ManagedVec::<u64, _>::try_with_len(&NopBufferManager, 1).unwrap();
        v.as_slice_mut()[0] = 7;
        v.grow_to(1001).unwrap();
        assert_eq!(1001, v.len());
        assert_eq!(Some(7), v.get(0));
        assert_eq!(Some(0), v.get(1000));
        assert_eq!(None, v.get(1001));
    }

    #[test]
    fn reservation_tracks_growth() {
        let manager = TrackedBufferManager::unlimited();
        let mut v = ManagedVec::<u64, _>::try_with_len(&manager, 2).unwrap();
        assert_eq!(16, manager.reserved());

        v.grow_to(3).unwrap();
        assert_eq!(4, v.len());
        assert_eq!(32, manager.reserved());
        assert_eq!(32, v.reserved_bytes());

        drop(v);
        assert_eq!(0, manager.reserved());
    }

    #[test]
    fn grow_past_limit_leaves_vec_unchanged() {
        let manager = TrackedBufferManager::with_limit(64);
        let mut v = ManagedVec::<u64, _>::try_with_len(&manager, 4).unwrap();
        v.as_slice_mut()[3] = 9;

        let err = v.grow_to(100).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
        assert_eq!(4, v.len());
        assert_eq!(Some(9), v.get(3));
        assert_eq!(32, manager.reserved());
    }

    #[test]
    fn failed_allocation_returns_reservation() {
        let manager = TrackedBufferManager::unlimited();
        let mut v = ManagedVec::<u64, _>::try_with_len(&manager, 1).unwrap();
        assert_eq!(8, manager.reserved());

        // Accepted by the manager, but too large for the allocator.
        let err = v.grow_to(usize::MAX / 16).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
        assert_eq!(1, v.len());
        assert_eq!(8, v.reserved_bytes());
        assert_eq!(8, manager.reserved());

        v.grow_to(4).unwrap();
        assert_eq!(32, manager.reserved());
    }
}
