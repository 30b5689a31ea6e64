//! This module implements the runtime representation of Thunks.
//!
//! Thunks are a special kind of Nix value, similar to a 0-argument
//! closure that yields some value. Thunks are used to implement the
//! lazy evaluation behaviour of Nix: the transpiler wraps every
//! binding whose evaluation must be deferred in a thunk, and emits a
//! forcing call at every point where the actual value is required.
//!
//! Thunks have interior mutability to be able to memoise their
//! computation: once a thunk has been forced, its internal
//! representation becomes the result of the suspended computation and
//! the producer is never run again.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::fmt::Debug;
use std::rc::Rc;

use crate::errors::Error;
use crate::Value;

use super::TotalDisplay;

/// A suspended computation, shared so that it can be put back if
/// running it fails (which allows `tryEval` and `or_default` callers
/// to observe the same error again on a retry, rather than a
/// poisoned thunk).
#[derive(Clone)]
struct Producer(Rc<dyn Fn() -> Result<Value, Error>>);

impl Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Producer({:p})", Rc::as_ptr(&self.0))
    }
}

/// Internal representation of the different states of a thunk.
#[derive(Debug)]
enum ThunkRepr {
    /// Thunk is suspended and awaiting execution.
    Suspended(Producer),

    /// Thunk currently under evaluation; encountering a blackhole
    /// during forcing means that the computation refers to itself.
    Blackhole,

    /// Fully evaluated thunk.
    Evaluated(Value),
}

/// A thunk is created for any value which requires non-strict
/// evaluation due to self-reference or lazy semantics (or both).
/// Every reference cycle involving `Value`s will contain at least
/// one `Thunk`.
#[derive(Clone, Debug)]
pub struct Thunk(Rc<RefCell<ThunkRepr>>);

impl Thunk {
    pub fn new_suspended<F>(producer: F) -> Self
    where
        F: Fn() -> Result<Value, Error> + 'static,
    {
        Thunk(Rc::new(RefCell::new(ThunkRepr::Suspended(Producer(
            Rc::new(producer),
        )))))
    }

    /// Drive this thunk to its evaluated state and return the
    /// resulting value.
    ///
    /// Forcing is idempotent: the producer runs at most once, and
    /// every subsequent call yields the memoised value. If the
    /// producer itself returns a thunk, the outer thunk collapses
    /// onto the inner one, so no nested `Thunk`-of-`Thunk` is ever
    /// observable. If forcing fails, the suspended producer is
    /// restored so the thunk is not poisoned for later retries.
    pub fn force(&self) -> Result<Value, Error> {
        enum Step {
            Done(Value),
            Collapse(Thunk),
            Run(Producer),
        }

        loop {
            // Inspect the current state without holding the borrow
            // over any evaluation.
            let step = match &*self.0.borrow() {
                ThunkRepr::Evaluated(Value::Thunk(inner)) => Step::Collapse(inner.clone()),
                ThunkRepr::Evaluated(value) => Step::Done(value.clone()),
                ThunkRepr::Blackhole => return Err(Error::SelfReference),
                ThunkRepr::Suspended(producer) => Step::Run(producer.clone()),
            };

            match step {
                Step::Done(value) => return Ok(value),

                // Collapse onto the inner thunk. The inner thunk
                // memoises itself, and its settled value is copied
                // into this thunk's slot as well.
                Step::Collapse(inner) => {
                    let value = inner.force()?;
                    self.0.replace(ThunkRepr::Evaluated(value.clone()));
                    return Ok(value);
                }

                Step::Run(producer) => {
                    // Mark in-progress while the producer runs, so
                    // that a re-entrant force of this thunk hits the
                    // blackhole above.
                    self.0.replace(ThunkRepr::Blackhole);

                    match (producer.0)() {
                        // The result may itself be a thunk; loop so
                        // the collapse case handles it.
                        Ok(value) => {
                            self.0.replace(ThunkRepr::Evaluated(value));
                        }
                        Err(err) => {
                            self.0.replace(ThunkRepr::Suspended(producer));
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(
            &*self.0.borrow(),
            ThunkRepr::Evaluated(v) if !matches!(v, Value::Thunk(_))
        )
    }

    /// Returns a reference to the inner evaluated value of a thunk.
    /// It is an error to call this on a thunk that has not been
    /// forced, or is not otherwise known to be fully evaluated.
    pub fn value(&self) -> Ref<Value> {
        Ref::map(self.0.borrow(), |thunk| match thunk {
            ThunkRepr::Evaluated(value) => value,
            ThunkRepr::Blackhole => panic!("Thunk::value called on a black-holed thunk"),
            ThunkRepr::Suspended(_) => panic!("Thunk::value called on a suspended thunk"),
        })
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl TotalDisplay for Thunk {
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, set: &mut ThunkSet) -> std::fmt::Result {
        if !set.insert(self) {
            return f.write_str("<CYCLE>");
        }

        match self.0.try_borrow() {
            Ok(repr) => match &*repr {
                ThunkRepr::Evaluated(v) => v.total_fmt(f, set),
                _ => f.write_str("<CODE>"),
            },

            _ => f.write_str("<CODE>"),
        }
    }
}

/// A wrapper type for tracking which thunks have already been seen in a
/// context. This is necessary for cycle detection in deep forcing,
/// display and serialisation of self-referential structures.
///
/// The inner `HashSet` is not available on the outside, as it would be
/// potentially unsafe to interact with the pointers in the set.
#[derive(Default)]
pub struct ThunkSet(HashSet<*mut ThunkRepr>);

impl ThunkSet {
    /// Check whether the given thunk has already been seen. Will mark the
    /// thunk as seen otherwise.
    pub fn insert(&mut self, thunk: &Thunk) -> bool {
        let ptr: *mut ThunkRepr = thunk.0.as_ptr();
        self.0.insert(ptr)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn force_is_idempotent_and_runs_producer_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let t = Thunk::new_suspended(move || {
            counter.set(counter.get() + 1);
            Ok(Value::Integer(counter.get()))
        });

        assert_eq!(t.force().unwrap().as_int().unwrap(), 1);
        assert_eq!(t.force().unwrap().as_int().unwrap(), 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn nested_thunks_collapse() {
        let inner = Thunk::new_suspended(|| Ok(Value::Integer(42)));
        let inner_clone = inner.clone();
        let outer = Thunk::new_suspended(move || Ok(Value::Thunk(inner_clone.clone())));

        assert_eq!(outer.force().unwrap().as_int().unwrap(), 42);
        assert!(outer.is_forced());
        assert!(inner.is_forced());
        assert!(!matches!(&*outer.value(), Value::Thunk(_)));
    }

    #[test]
    fn self_reference_is_detected() {
        // A thunk whose producer forces the thunk itself.
        let slot: Rc<RefCell<Option<Thunk>>> = Rc::new(RefCell::new(None));
        let slot_clone = slot.clone();
        let t = Thunk::new_suspended(move || {
            let me = slot_clone.borrow().clone().unwrap();
            me.force()
        });
        *slot.borrow_mut() = Some(t.clone());

        assert!(matches!(t.force(), Err(Error::SelfReference)));
    }

    #[test]
    fn failed_force_is_retryable() {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let t = Thunk::new_suspended(move || {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                Err(Error::Throw("first time fails".into()))
            } else {
                Ok(Value::Integer(7))
            }
        });

        assert!(t.force().is_err());
        assert_eq!(t.force().unwrap().as_int().unwrap(), 7);
        assert_eq!(attempts.get(), 2);
    }
}
