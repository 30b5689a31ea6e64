//! This module implements the runtime representation of a Nix
//! builtin.
//!
//! Builtins are directly backed by Rust code operating on Nix values.
//! They are the only functions in the language with varying arities
//! (`hasAttr` has an arity of 2, but `isAttrs` an arity of 1), while
//! application always supplies one argument at a time. Partially
//! applied builtins therefore "capture" the arguments applied so far
//! and only run once saturated.

use std::fmt::{Debug, Display};
use std::rc::Rc;

use crate::errors::Error;

use super::Value;

/// Trait for closure types of builtins, implemented automatically for
/// all eligible functions. Use the `#[builtins]` attribute macro to
/// create these instead of handling argument-passing logic manually.
pub trait BuiltinFn: Fn(Vec<Value>) -> Result<Value, Error> {}
impl<F: Fn(Vec<Value>) -> Result<Value, Error>> BuiltinFn for F {}

#[derive(Clone)]
struct BuiltinRepr {
    name: &'static str,

    /// Strictness of each argument: strict arguments are forced
    /// before the function body runs, the rest are passed through
    /// unforced. The length of this slice is the builtin's arity.
    strictness: &'static [bool],

    func: Rc<dyn BuiltinFn>,

    /// Partially applied function arguments.
    partials: Vec<Value>,
}

/// Represents a single built-in function which directly executes Rust
/// code that operates on a Nix value.
#[derive(Clone)]
pub struct Builtin(Box<BuiltinRepr>);

impl Builtin {
    pub fn new<F: BuiltinFn + 'static>(
        name: &'static str,
        strictness: &'static [bool],
        func: F,
    ) -> Self {
        Builtin(Box::new(BuiltinRepr {
            name,
            strictness,
            func: Rc::new(func),
            partials: vec![],
        }))
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.strictness.len()
    }

    /// Apply a single additional argument to the builtin. Returns the
    /// partially applied builtin as a value until it is saturated, at
    /// which point the underlying function runs.
    pub fn apply(mut self, arg: Value) -> Result<Value, Error> {
        self.0.partials.push(arg);

        if self.0.partials.len() < self.0.strictness.len() {
            return Ok(Value::Builtin(self));
        }

        let BuiltinRepr {
            strictness,
            func,
            mut partials,
            ..
        } = *self.0;

        for (arg, strict) in partials.iter_mut().zip(strictness) {
            if *strict {
                *arg = arg.clone().force()?;
            }
        }

        (func)(partials)
    }
}

impl Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "builtin[{}]", self.0.name)
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.0.partials.is_empty() {
            f.write_str("<PRIMOP-APP>")
        } else {
            f.write_str("<PRIMOP>")
        }
    }
}

/// Builtins are uniquely identified by their name.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}
