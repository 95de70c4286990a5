//! Atomic totals
//!
//! Maps plain numeric totals onto their hardware atomic cells so the atomic
//! accumulation strategy can use `fetch_add` or a compare-and-swap loop.
//! `f64` is stored as its bit pattern in an `AtomicU64`.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// A total type with a lock-free atomic representation.
pub trait AtomicTotal: Copy + Send + Sync + 'static {
    /// Atomic cell holding the total
    type Cell: Send + Sync;

    /// Wrap an initial value.
    fn new_cell(value: Self) -> Self::Cell;

    /// Read the current value.
    fn load(cell: &Self::Cell) -> Self;

    /// Replace `current` with `new` if the cell still holds `current`.
    /// On failure returns the value actually observed.
    fn compare_exchange_weak(cell: &Self::Cell, current: Self, new: Self) -> Result<Self, Self>;

    /// Add `delta`, returning the previous value. Integers wrap on overflow.
    fn fetch_add(cell: &Self::Cell, delta: Self) -> Self;

    /// Plain addition with the same overflow behaviour as `fetch_add`.
    fn add_wrapping(self, rhs: Self) -> Self;
}

macro_rules! impl_atomic_int {
    ($($ty:ty => $cell:ty),* $(,)?) => {
        $(
            impl AtomicTotal for $ty {
                type Cell = $cell;

                fn new_cell(value: Self) -> Self::Cell {
                    <$cell>::new(value)
                }

                fn load(cell: &Self::Cell) -> Self {
                    cell.load(Ordering::Acquire)
                }

                fn compare_exchange_weak(
                    cell: &Self::Cell,
                    current: Self,
                    new: Self,
                ) -> Result<Self, Self> {
                    cell.compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
                }

                fn fetch_add(cell: &Self::Cell, delta: Self) -> Self {
                    cell.fetch_add(delta, Ordering::AcqRel)
                }

                fn add_wrapping(self, rhs: Self) -> Self {
                    <$ty>::wrapping_add(self, rhs)
                }
            }
        )*
    };
}

impl_atomic_int!(
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
    i32 => AtomicI32,
    i64 => AtomicI64,
);

impl AtomicTotal for f64 {
    type Cell = AtomicU64;

    fn new_cell(value: Self) -> Self::Cell {
        AtomicU64::new(value.to_bits())
    }

    fn load(cell: &Self::Cell) -> Self {
        f64::from_bits(cell.load(Ordering::Acquire))
    }

    fn compare_exchange_weak(cell: &Self::Cell, current: Self, new: Self) -> Result<Self, Self> {
        cell.compare_exchange_weak(
            current.to_bits(),
            new.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map(f64::from_bits)
        .map_err(f64::from_bits)
    }

    fn fetch_add(cell: &Self::Cell, delta: Self) -> Self {
        // No hardware float add: CAS on the bit pattern
        let previous = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            Some((f64::from_bits(bits) + delta).to_bits())
        });
        match previous {
            Ok(bits) | Err(bits) => f64::from_bits(bits),
        }
    }

    fn add_wrapping(self, rhs: Self) -> Self {
        self + rhs
    }
}
