//! This module implements the runtime representation of functions.
//!
//! Nix functions always take exactly one argument; the transpiler
//! curries multi-argument functions into nested single-argument
//! lambdas backed by host closures. Lambdas with an attribute-set
//! pattern additionally carry [`Formals`] describing the expected
//! argument names, which `functionArgs` reflects back into the
//! language.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::errors::Error;

use super::string::NixString;
use super::Value;

/// The argument pattern of a lambda declared with an attribute-set
/// pattern, e.g. `{ a, b ? 2, ... }: …`. Maps each named argument to
/// whether it has a default.
#[derive(Clone, Debug, Default)]
pub struct Formals {
    pub arguments: BTreeMap<NixString, bool>,
    pub ellipsis: bool,
}

impl Formals {
    /// Whether the given argument name is accepted by this pattern.
    pub fn contains(&self, arg: &str) -> bool {
        self.ellipsis || self.arguments.contains_key(&NixString::from(arg))
    }
}

type LambdaFn = Rc<dyn Fn(Value) -> Result<Value, Error>>;

/// A single-argument function value backed by a host closure.
#[derive(Clone)]
pub struct Lambda {
    pub name: Option<SmolStr>,
    pub formals: Option<Formals>,
    func: LambdaFn,
}

impl Lambda {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Error> + 'static,
    {
        Lambda {
            name: None,
            formals: None,
            func: Rc::new(func),
        }
    }

    pub fn with_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_formals(mut self, formals: Formals) -> Self {
        self.formals = Some(formals);
        self
    }

    pub fn call(&self, arg: Value) -> Result<Value, Error> {
        (self.func)(arg)
    }
}

impl Debug for Lambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "lambda[{}]", name),
            None => write!(f, "lambda({:p})", Rc::as_ptr(&self.func)),
        }
    }
}
