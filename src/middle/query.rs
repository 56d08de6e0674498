//! Demand-driven computation with memoization.
//!
//! Every derived fact (the target of an import, the signature of a function,
//! the types inside a body, ...) is a *query*: a small `Copy` key type which
//! knows how to compute its output given a context. The [`QueryEngine`] runs
//! each key's computation at most once per compilation unit and hands out
//! clones of the cached result afterwards.
//!
//! The cache is shared between worker threads. Finished entries live in their
//! own table that readers only share a read lock on, so hits never contend
//! with each other or with running computations. The first requester of a
//! missing key marks it in progress and computes it without holding any lock;
//! anyone else asking for that key blocks until the result is published. A
//! request that
//! would wait on itself, directly or through a chain of threads waiting on
//! each other, fails immediately with a [`CycleError`].

use std::{
    any::Any,
    sync::Arc,
    thread::{self, ThreadId},
};

use hashbrown::{HashMap, HashSet};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::middle::{
    def::DefId,
    module_tree::ImportId,
    ty::Type,
    type_check::{AdtDef, FnSig, ImplMap, Members, OperatorKey, TypeckResults},
};

/// Static information about a query kind
pub trait QueryDescription: Copy + Into<QueryKey> {
    type Output: Clone + Send + Sync + 'static;

    const NAME: &'static str;
}

/// A query computable within the context `C`
pub trait Query<C: ?Sized>: QueryDescription {
    fn execute(self, cx: &C) -> Self::Output;
}

macro_rules! define_queries {
    ($($(#[$attr:meta])* $name:ident($key:ty) -> $output:ty;)*) => {
        paste::paste! {
            /// Identifies one memoized fact
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum QueryKey {
                $([<$name:camel>]($key),)*
            }

            $(
                $(#[$attr])*
                #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
                pub struct [<$name:camel>](pub $key);

                impl From<[<$name:camel>]> for QueryKey {
                    fn from(query: [<$name:camel>]) -> Self {
                        QueryKey::[<$name:camel>](query.0)
                    }
                }

                impl QueryDescription for [<$name:camel>] {
                    type Output = $output;

                    const NAME: &'static str = stringify!($name);
                }
            )*
        }
    };
}

define_queries! {
    /// Target of an import directive, `None` if it failed to resolve (the
    /// failure has already been reported)
    resolve_import(ImportId) -> Option<DefId>;
    /// Parameter and return types of a function or method
    fn_signature(DefId) -> Arc<FnSig>;
    /// Type of a constant, inferred from its initializer if unannotated
    const_type(DefId) -> Type;
    /// Fields or variants of a struct or enum
    adt_definition(DefId) -> Arc<AdtDef>;
    /// All impl blocks grouped by the type they implement
    impl_blocks(()) -> Arc<ImplMap>;
    /// Methods, properties and operator overrides available on a type
    type_members(DefId) -> Arc<Members>;
    /// The `override(op)` method a type provides for an operator
    operator_override(OperatorKey) -> Option<DefId>;
    /// Position of a variant within its enum
    variant_index(DefId) -> usize;
    /// Types and resolutions for every node in a body
    typeck_body(DefId) -> Arc<TypeckResults>;
}

/// A query was requested while its own computation was still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cycle detected while computing {key:?}")]
pub struct CycleError {
    pub key: QueryKey,
}

type Published = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct EngineState {
    /// Keys currently being computed and the thread computing each
    in_progress: HashMap<QueryKey, ThreadId>,
    /// The key each blocked thread is waiting on
    waiting_on: HashMap<ThreadId, QueryKey>,
    executions: HashMap<QueryKey, usize>,
    reported_cycles: HashSet<QueryKey>,
}

impl EngineState {
    /// Whether following "waits on a key owned by" edges from `thread` leads
    /// back to `target`
    fn chain_reaches(&self, mut thread: ThreadId, target: ThreadId) -> bool {
        let mut visited = HashSet::new();

        while let Some(key) = self.waiting_on.get(&thread) {
            let Some(owner) = self.in_progress.get(key) else {
                return false;
            };

            if *owner == target {
                return true;
            }

            if !visited.insert(*owner) {
                return false;
            }

            thread = *owner;
        }

        false
    }
}

#[derive(Default)]
pub struct QueryEngine {
    /// Finished results. Entries are inserted once and never replaced.
    done: RwLock<HashMap<QueryKey, Published>>,
    state: Mutex<EngineState>,
    published: Condvar,
}

impl core::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.done.read().len();
        let state = self.state.lock();

        f.debug_struct("QueryEngine")
            .field("cached", &cached)
            .field("executions", &state.executions.values().sum::<usize>())
            .finish()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached output for `query`, computing it first if nobody
    /// has yet
    pub fn get<C: ?Sized, Q: Query<C>>(&self, cx: &C, query: Q) -> Result<Q::Output, CycleError> {
        let key: QueryKey = query.into();

        if let Some(value) = self.lookup::<Q>(key) {
            return Ok(value);
        }

        let me = thread::current().id();

        {
            let mut state = self.state.lock();

            loop {
                // Results are published before their in-progress marker is
                // cleared, so a missing marker here means either done or new
                if let Some(value) = self.lookup::<Q>(key) {
                    return Ok(value);
                }

                let Some(&owner) = state.in_progress.get(&key) else {
                    break;
                };

                if owner == me || state.chain_reaches(owner, me) {
                    tracing::debug!(query = Q::NAME, ?key, "cycle detected");
                    return Err(CycleError { key });
                }

                state.waiting_on.insert(me, key);
                self.published.wait(&mut state);
                state.waiting_on.remove(&me);
            }

            state.in_progress.insert(key, me);
            *state.executions.entry(key).or_default() += 1;
        }

        let guard = InProgressGuard { engine: self, key };

        tracing::trace!(query = Q::NAME, ?key, "executing");
        let value = query.execute(cx);

        self.done.write().insert(key, Arc::new(value.clone()));
        drop(guard);

        Ok(value)
    }

    fn lookup<Q: QueryDescription>(&self, key: QueryKey) -> Option<Q::Output> {
        self.done.read().get(&key).map(Self::downcast::<Q>)
    }

    fn downcast<Q: QueryDescription>(value: &Published) -> Q::Output {
        value
            .downcast_ref::<Q::Output>()
            .expect("query keys are only ever stored with their own output type")
            .clone()
    }

    /// How many times the computation behind `key` has been started
    pub fn execution_count(&self, key: impl Into<QueryKey>) -> usize {
        let key = key.into();

        self.state
            .lock()
            .executions
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_computed(&self, key: impl Into<QueryKey>) -> bool {
        let key = key.into();

        self.done.read().contains_key(&key)
    }

    /// Returns true the first time a cycle through `key` is reported so that
    /// each cycle produces a single diagnostic
    pub fn first_cycle_report(&self, key: QueryKey) -> bool {
        self.state.lock().reported_cycles.insert(key)
    }
}

/// Clears the in-progress marker if the computation unwinds, and wakes anyone
/// waiting on the key either way
struct InProgressGuard<'e> {
    engine: &'e QueryEngine,
    key: QueryKey,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.engine.state.lock().in_progress.remove(&self.key);
        self.engine.published.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{AssertUnwindSafe, catch_unwind},
        sync::{
            Barrier,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::index::Index;

    const SLOW: usize = 0;
    const SELF_CYCLE: usize = 1;
    const CROSS_A: usize = 2;
    const CROSS_B: usize = 3;
    const PANICS_ONCE: usize = 4;
    const CHAIN_START: usize = 10;

    struct TestCx {
        engine: QueryEngine,
        slow_runs: AtomicUsize,
        barrier: Barrier,
        panicked: AtomicBool,
    }

    impl TestCx {
        fn new(threads: usize) -> Self {
            Self {
                engine: QueryEngine::new(),
                slow_runs: AtomicUsize::new(0),
                barrier: Barrier::new(threads),
                panicked: AtomicBool::new(false),
            }
        }
    }

    const CYCLE_SENTINEL: usize = usize::MAX;

    impl Query<TestCx> for VariantIndex {
        fn execute(self, cx: &TestCx) -> usize {
            match self.0.index() {
                SLOW => {
                    cx.slow_runs.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    42
                }
                SELF_CYCLE => cx
                    .engine
                    .get(cx, VariantIndex(DefId::new(SELF_CYCLE)))
                    .unwrap_or(CYCLE_SENTINEL),
                CROSS_A | CROSS_B => {
                    cx.barrier.wait();
                    let other = if self.0.index() == CROSS_A { CROSS_B } else { CROSS_A };

                    cx.engine
                        .get(cx, VariantIndex(DefId::new(other)))
                        .unwrap_or(CYCLE_SENTINEL)
                }
                PANICS_ONCE => {
                    if !cx.panicked.swap(true, Ordering::SeqCst) {
                        panic!("first attempt fails");
                    }
                    7
                }
                n if n >= CHAIN_START && n < CHAIN_START + 5 => {
                    // Each key depends on the next one; the last one closes
                    // the loop back to the start
                    let next = if n == CHAIN_START + 4 { CHAIN_START } else { n + 1 };

                    cx.engine
                        .get(cx, VariantIndex(DefId::new(next)))
                        .map(|v| v + 1)
                        .unwrap_or(0)
                }
                n => n * 2,
            }
        }
    }

    #[test]
    fn repeated_requests_execute_once() {
        let cx = TestCx::new(1);
        let query = VariantIndex(DefId::new(21));

        let first = cx.engine.get(&cx, query).unwrap();
        let second = cx.engine.get(&cx, query).unwrap();

        assert_eq!(first, 42);
        assert_eq!(first, second);
        assert_eq!(cx.engine.execution_count(query), 1);
        assert!(cx.engine.is_computed(query));
    }

    #[test]
    fn finished_entries_are_read_without_the_engine_lock() {
        let cx = TestCx::new(1);
        let query = VariantIndex(DefId::new(5));
        assert_eq!(cx.engine.get(&cx, query), Ok(10));

        // The lock is not reentrant, so a hit that took it would hang here
        let state = cx.engine.state.lock();
        assert_eq!(cx.engine.get(&cx, query), Ok(10));
        assert!(cx.engine.is_computed(query));
        drop(state);

        assert_eq!(cx.engine.execution_count(query), 1);
    }

    #[test]
    fn self_dependency_fails_with_cycle_error() {
        let cx = TestCx::new(1);
        let query = VariantIndex(DefId::new(SELF_CYCLE));

        assert_eq!(cx.engine.get(&cx, query), Ok(CYCLE_SENTINEL));
        assert_eq!(cx.engine.execution_count(query), 1);
    }

    #[test]
    fn long_cycles_terminate() {
        let cx = TestCx::new(1);

        let value = cx
            .engine
            .get(&cx, VariantIndex(DefId::new(CHAIN_START)))
            .unwrap();

        // The request closing the loop fails and each of the other 4 keys on
        // the way out adds one
        assert_eq!(value, 4);
        for n in CHAIN_START..CHAIN_START + 5 {
            assert_eq!(cx.engine.execution_count(VariantIndex(DefId::new(n))), 1);
        }
    }

    #[test]
    fn concurrent_requesters_share_one_computation() {
        let cx = TestCx::new(1);
        let query = VariantIndex(DefId::new(SLOW));

        let results = std::thread::scope(|s| {
            let handles = (0..8)
                .map(|_| s.spawn(|| cx.engine.get(&cx, query).unwrap()))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert_eq!(results, vec![42; 8]);
        assert_eq!(cx.slow_runs.load(Ordering::SeqCst), 1);
        assert_eq!(cx.engine.execution_count(query), 1);
    }

    #[test]
    fn cycles_across_threads_do_not_deadlock() {
        let cx = TestCx::new(2);

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| cx.engine.get(&cx, VariantIndex(DefId::new(CROSS_A))));
            let b = s.spawn(|| cx.engine.get(&cx, VariantIndex(DefId::new(CROSS_B))));

            (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
        });

        // One side observes the cycle and the other receives its fallback
        assert_eq!([a, b], [CYCLE_SENTINEL, CYCLE_SENTINEL]);
        assert_eq!(
            cx.engine.execution_count(VariantIndex(DefId::new(CROSS_A))),
            1
        );
        assert_eq!(
            cx.engine.execution_count(VariantIndex(DefId::new(CROSS_B))),
            1
        );
    }

    #[test]
    fn unwinding_computation_releases_its_key() {
        let cx = TestCx::new(1);
        let query = VariantIndex(DefId::new(PANICS_ONCE));

        let first = catch_unwind(AssertUnwindSafe(|| cx.engine.get(&cx, query)));
        assert!(first.is_err());
        assert!(!cx.engine.is_computed(query));

        assert_eq!(cx.engine.get(&cx, query), Ok(7));
        assert_eq!(cx.engine.execution_count(query), 2);
    }

    #[test]
    fn cycle_reports_are_deduplicated() {
        let engine = QueryEngine::new();
        let key = QueryKey::from(ConstType(DefId::new(3)));

        assert!(engine.first_cycle_report(key));
        assert!(!engine.first_cycle_report(key));
    }
}
