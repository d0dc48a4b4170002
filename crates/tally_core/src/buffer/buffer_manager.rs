use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tally_error::{DbError, Result};

pub trait BufferManager: Debug + Sync + Send + Clone + Sized {
    /// Try to reserve some number of bytes.
    ///
    /// Returns a reservation for keeping track of "used" bytes. The bytes are
    /// given back to the manager when the reservation is dropped.
    ///
    /// This should never error when attempting to reserve zero bytes.
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>>;

    /// Drops a memory reservation.
    ///
    /// Called exactly once per non-empty reservation.
    fn drop_reservation(&self, reservation: &Reservation<Self>);
}

#[derive(Debug)]
pub struct Reservation<B: BufferManager> {
    manager: B,
    /// Size in bytes of the memory reservation.
    size: usize,
}

impl<B> Reservation<B>
where
    B: BufferManager,
{
    /// Absorb another reservation into this one.
    ///
    /// `other` is emptied so that its bytes are only given back once, when
    /// `self` is dropped.
    pub fn merge(&mut self, mut other: Self) {
        self.size += other.size;
        other.size = 0;
    }

    pub const fn manager(&self) -> &B {
        &self.manager
    }

    pub const fn size(&self) -> usize {
        self.size
    }
}

impl<B> Drop for Reservation<B>
where
    B: BufferManager,
{
    fn drop(&mut self) {
        if self.size > 0 {
            self.manager.drop_reservation(self);
            self.size = 0;
        }
    }
}

/// Buffer manager that doesn't track anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopBufferManager;

impl BufferManager for NopBufferManager {
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>> {
        Ok(Reservation {
            manager: *self,
            size: size_bytes,
        })
    }

    fn drop_reservation(&self, _reservation: &Reservation<Self>) {
        // Ok
    }
}

/// Buffer manager that tracks the number of reserved bytes, optionally
/// refusing reservations past a limit.
///
/// Clones share the same accounting.
#[derive(Debug, Clone)]
pub struct TrackedBufferManager {
    inner: Arc<TrackedInner>,
}

#[derive(Debug)]
struct TrackedInner {
    reserved: AtomicUsize,
    limit: Option<usize>,
}

impl TrackedBufferManager {
    pub fn new(limit: Option<usize>) -> Self {
        TrackedBufferManager {
            inner: Arc::new(TrackedInner {
                reserved: AtomicUsize::new(0),
                limit,
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self::new(Some(limit))
    }

    /// Number of bytes currently reserved across all reservations.
    pub fn reserved(&self) -> usize {
        self.inner.reserved.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }
}

impl BufferManager for TrackedBufferManager {
    fn try_reserve(&self, size_bytes: usize) -> Result<Reservation<Self>> {
        let limit = self.inner.limit.unwrap_or(usize::MAX);

        self.inner
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |curr| {
                curr.checked_add(size_bytes).filter(|&next| next <= limit)
            })
            .map_err(|curr| {
                DbError::resource_exhausted("Memory limit exceeded")
                    .with_field("requested", size_bytes)
                    .with_field("reserved", curr)
                    .with_field("limit", limit)
            })?;

        Ok(Reservation {
            manager: self.clone(),
            size: size_bytes,
        })
    }

    fn drop_reservation(&self, reservation: &Reservation<Self>) {
        let prev = self
            .inner
            .reserved
            .fetch_sub(reservation.size, Ordering::AcqRel);
        debug_assert!(prev >= reservation.size, "released more than reserved");
    }
}

#[cfg(test)]
mod tests {
    use tally_error::ErrorKind;

    use super::*;

    #[test]
    fn nop_reserve_zero() {
        let r = NopBufferManager.try_reserve(0).unwrap();
        assert_eq!(0, r.size());
    }

    #[test]
    fn tracked_reserve_and_drop() {
        let manager = TrackedBufferManager::unlimited();
        let r1 = manager.try_reserve(64).unwrap();
        let r2 = manager.try_reserve(32).unwrap();
        assert_eq!(96, manager.reserved());

        drop(r1);
        assert_eq!(32, manager.reserved());
        drop(r2);
        assert_eq!(0, manager.reserved());
    }

    #[test]
    fn tracked_merge_releases_once() {
        let manager = TrackedBufferManager::unlimited();
        let mut r1 = manager.try_reserve(10).unwrap();
        let r2 = r1.manager().try_reserve(20).unwrap();
        r1.merge(r2);
        assert_eq!(30, r1.size());
        assert_eq!(30, manager.reserved());

        drop(r1);
        assert_eq!(0, manager.reserved());
    }

    #[test]
    fn tracked_limit_exceeded() {
        let manager = TrackedBufferManager::with_limit(100);
        let _r = manager.try_reserve(80).unwrap();

        let err = manager.try_reserve(40).unwrap_err();
        assert_eq!(ErrorKind::ResourceExhausted, err.kind());
        assert_eq!(Some("40"), err.get_field("requested"));

        // Failed reservation doesn't leak into the accounting.
        assert_eq!(80, manager.reserved());
    }

    #[test]
    fn tracked_clones_share_accounting() {
        let manager = TrackedBufferManager::unlimited();
        let other = manager.clone();
        let _r = other.try_reserve(8).unwrap();
        assert_eq!(8, manager.reserved());
    }
}
