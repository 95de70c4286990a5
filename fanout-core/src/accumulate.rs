//! Accumulation Strategies
//!
//! An [`Accumulator`] folds the successful results of a batch into one total.
//! Three interchangeable disciplines are provided; for a commutative and
//! associative [`Combine`] they produce the same total and differ only in
//! where the synchronization cost is paid:
//!
//! | Strategy      | During execution                         | After the batch                  |
//! |---------------|------------------------------------------|----------------------------------|
//! | `Locked`      | mutex around read-modify-write           | read the total                   |
//! | `Atomic`      | `fetch_add`, or a CAS retry loop         | read the total                   |
//! | `Partitioned` | nothing shared; item returns its partial | parallel divide-and-conquer fold |
//!
//! `contribute` runs on the worker thread right after a computation returns
//! `Ok`. Its return value (the *partial*) travels back to the collector with the
//! completion and is handed to `finish` once every item is terminal.
//!
//! # Implementor notes
//! - `combine` and `merge` must be associative and commutative; completion order
//!   is arbitrary, and so is the order partials are merged.
//! - `identity` must be neutral for both `combine` and `merge`.
//! - Every strategy must see the same arithmetic. [`Sum`] and [`Count`] wrap
//!   on integer overflow, which is what `fetch_add` does.

use crate::atomic::AtomicTotal;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::marker::PhantomData;

/// Synchronization discipline, fixed for the lifetime of an accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Mutual exclusion around every update
    Locked,
    /// Hardware atomics (fetch-and-add or compare-and-swap)
    Atomic,
    /// Per-item partials reduced once at the end (default)
    #[default]
    Partitioned,
}

impl Strategy {
    /// All strategies, in display order.
    pub const ALL: [Strategy; 3] = [Strategy::Locked, Strategy::Atomic, Strategy::Partitioned];

    /// Lowercase name as used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Locked => "locked",
            Strategy::Atomic => "atomic",
            Strategy::Partitioned => "partitioned",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "locked" | "lock" | "mutex" => Ok(Strategy::Locked),
            "atomic" => Ok(Strategy::Atomic),
            "partitioned" | "reduce" | "partitioned-reduce" => Ok(Strategy::Partitioned),
            other => Err(format!("Unknown accumulation strategy: {}", other)),
        }
    }
}

/// How results of type `R` fold into a total.
pub trait Combine<R>: Send + Sync {
    /// Running total type
    type Total: Clone + Send + Sync + Debug;

    /// Neutral starting value.
    fn identity(&self) -> Self::Total;

    /// Fold one result into a total.
    fn combine(&self, total: Self::Total, value: &R) -> Self::Total;

    /// Fold two totals together.
    fn merge(&self, left: Self::Total, right: Self::Total) -> Self::Total;

    /// If folding `value` is plain addition, the amount to add.
    ///
    /// Lets the atomic strategy use `fetch_add` instead of a CAS loop.
    fn delta(&self, _value: &R) -> Option<Self::Total> {
        None
    }
}

/// Sum of the results themselves. Integer totals wrap on overflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<T> Combine<T> for Sum
where
    T: AtomicTotal + Default + Debug,
{
    type Total = T;

    fn identity(&self) -> T {
        T::default()
    }

    fn combine(&self, total: T, value: &T) -> T {
        total.add_wrapping(*value)
    }

    fn merge(&self, left: T, right: T) -> T {
        left.add_wrapping(right)
    }

    fn delta(&self, value: &T) -> Option<T> {
        Some(*value)
    }
}

/// Number of successful results, ignoring their values
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<R> Combine<R> for Count {
    type Total = u64;

    fn identity(&self) -> u64 {
        0
    }

    fn combine(&self, total: u64, _value: &R) -> u64 {
        total.wrapping_add(1)
    }

    fn merge(&self, left: u64, right: u64) -> u64 {
        left.wrapping_add(right)
    }

    fn delta(&self, _value: &R) -> Option<u64> {
        Some(1)
    }
}

/// [`Combine`] built from closures, see [`combine_with`].
#[derive(Clone)]
pub struct FnCombine<A, C, M> {
    identity: A,
    combine: C,
    merge: M,
}

/// Build a [`Combine`] from an identity value and two closures.
pub fn combine_with<A, R, C, M>(identity: A, combine: C, merge: M) -> FnCombine<A, C, M>
where
    C: Fn(A, &R) -> A,
    M: Fn(A, A) -> A,
{
    FnCombine {
        identity,
        combine,
        merge,
    }
}

impl<A, R, C, M> Combine<R> for FnCombine<A, C, M>
where
    A: Clone + Send + Sync + Debug,
    C: Fn(A, &R) -> A + Send + Sync,
    M: Fn(A, A) -> A + Send + Sync,
{
    type Total = A;

    fn identity(&self) -> A {
        self.identity.clone()
    }

    fn combine(&self, total: A, value: &R) -> A {
        (self.combine)(total, value)
    }

    fn merge(&self, left: A, right: A) -> A {
        (self.merge)(left, right)
    }
}

impl<A: Debug, C, M> Debug for FnCombine<A, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCombine")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Aggregation target shared by every worker of a batch.
pub trait Accumulator<R>: Send + Sync {
    /// Final value handed to the report
    type Total: Send;
    /// Per-item value returned by `contribute` and given back to `finish`
    type Partial: Send;

    /// Discipline in use, `None` for accumulators that aggregate nothing.
    fn strategy(&self) -> Option<Strategy>;

    /// Account for one successful result. Called concurrently from workers.
    fn contribute(&self, value: &R) -> Self::Partial;

    /// Produce the total from every partial returned by `contribute`.
    fn finish(self, partials: Vec<Self::Partial>) -> Self::Total;
}

/// Accumulator that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl<R> Accumulator<R> for Discard {
    type Total = ();
    type Partial = ();

    fn strategy(&self) -> Option<Strategy> {
        None
    }

    fn contribute(&self, _value: &R) {}

    fn finish(self, _partials: Vec<()>) {}
}

/// Mutex-guarded running total
pub struct LockedAccumulator<R, C: Combine<R>> {
    combine: C,
    total: Mutex<C::Total>,
    _value: PhantomData<fn(&R)>,
}

impl<R, C: Combine<R>> LockedAccumulator<R, C> {
    /// Start from `combine.identity()`.
    pub fn new(combine: C) -> Self {
        let total = Mutex::new(combine.identity());
        Self {
            combine,
            total,
            _value: PhantomData,
        }
    }
}

impl<R, C: Combine<R>> Accumulator<R> for LockedAccumulator<R, C> {
    type Total = C::Total;
    type Partial = ();

    fn strategy(&self) -> Option<Strategy> {
        Some(Strategy::Locked)
    }

    fn contribute(&self, value: &R) {
        let mut total = self.total.lock();
        // A panicking combine leaves the previous total in place
        let next = self.combine.combine(total.clone(), value);
        *total = next;
    }

    fn finish(self, _partials: Vec<()>) -> C::Total {
        self.total.into_inner()
    }
}

/// Lock-free running total for numeric [`AtomicTotal`] types
pub struct AtomicAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    combine: C,
    cell: <C::Total as AtomicTotal>::Cell,
    _value: PhantomData<fn(&R)>,
}

impl<R, C> AtomicAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    /// Start from `combine.identity()`.
    pub fn new(combine: C) -> Self {
        let cell = <C::Total as AtomicTotal>::new_cell(combine.identity());
        Self {
            combine,
            cell,
            _value: PhantomData,
        }
    }
}

impl<R, C> Accumulator<R> for AtomicAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    type Total = C::Total;
    type Partial = ();

    fn strategy(&self) -> Option<Strategy> {
        Some(Strategy::Atomic)
    }

    fn contribute(&self, value: &R) {
        if let Some(delta) = self.combine.delta(value) {
            <C::Total as AtomicTotal>::fetch_add(&self.cell, delta);
            return;
        }

        let mut current = <C::Total as AtomicTotal>::load(&self.cell);
        loop {
            let next = self.combine.combine(current, value);
            match <C::Total as AtomicTotal>::compare_exchange_weak(&self.cell, current, next) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn finish(self, _partials: Vec<()>) -> C::Total {
        <C::Total as AtomicTotal>::load(&self.cell)
    }
}

/// Contention-free accumulation: every item produces its own partial and the
/// partials are reduced once, in parallel, after the batch.
pub struct PartitionedAccumulator<R, C: Combine<R>> {
    combine: C,
    _value: PhantomData<fn(&R)>,
}

impl<R, C: Combine<R>> PartitionedAccumulator<R, C> {
    /// Wrap a combine function.
    pub fn new(combine: C) -> Self {
        Self {
            combine,
            _value: PhantomData,
        }
    }
}

impl<R, C: Combine<R>> Accumulator<R> for PartitionedAccumulator<R, C> {
    type Total = C::Total;
    type Partial = C::Total;

    fn strategy(&self) -> Option<Strategy> {
        Some(Strategy::Partitioned)
    }

    fn contribute(&self, value: &R) -> C::Total {
        self.combine.combine(self.combine.identity(), value)
    }

    fn finish(self, partials: Vec<C::Total>) -> C::Total {
        let combine = &self.combine;
        partials
            .into_par_iter()
            .reduce(|| combine.identity(), |left, right| combine.merge(left, right))
    }
}

/// One of the three strategies, chosen at runtime (e.g. from configuration).
pub enum StrategyAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    /// See [`LockedAccumulator`]
    Locked(LockedAccumulator<R, C>),
    /// See [`AtomicAccumulator`]
    Atomic(AtomicAccumulator<R, C>),
    /// See [`PartitionedAccumulator`]
    Partitioned(PartitionedAccumulator<R, C>),
}

impl<R, C> StrategyAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    /// Build the accumulator for `strategy`.
    pub fn new(strategy: Strategy, combine: C) -> Self {
        match strategy {
            Strategy::Locked => Self::Locked(LockedAccumulator::new(combine)),
            Strategy::Atomic => Self::Atomic(AtomicAccumulator::new(combine)),
            Strategy::Partitioned => Self::Partitioned(PartitionedAccumulator::new(combine)),
        }
    }
}

impl<R, C> Accumulator<R> for StrategyAccumulator<R, C>
where
    C: Combine<R>,
    C::Total: AtomicTotal,
{
    type Total = C::Total;
    type Partial = Option<C::Total>;

    fn strategy(&self) -> Option<Strategy> {
        match self {
            Self::Locked(acc) => acc.strategy(),
            Self::Atomic(acc) => acc.strategy(),
            Self::Partitioned(acc) => acc.strategy(),
        }
    }

    fn contribute(&self, value: &R) -> Option<C::Total> {
        match self {
            Self::Locked(acc) => {
                acc.contribute(value);
                None
            }
            Self::Atomic(acc) => {
                acc.contribute(value);
                None
            }
            Self::Partitioned(acc) => Some(acc.contribute(value)),
        }
    }

    fn finish(self, partials: Vec<Option<C::Total>>) -> C::Total {
        match self {
            Self::Locked(acc) => acc.finish(Vec::new()),
            Self::Atomic(acc) => acc.finish(Vec::new()),
            Self::Partitioned(acc) => acc.finish(partials.into_iter().flatten().collect()),
        }
    }
}
