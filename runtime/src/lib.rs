//! Runtime support library for executing ahead-of-time transpiled Nix
//! expressions.
//!
//! A separate translator converts each Nix source file into a host
//! module which calls into this library for every semantic primitive:
//! constructing lazy thunks ([`Value::lazy`]), binding scopes
//! ([`Scope`]), applying operators ([`ops`]), invoking builtins
//! ([`Builtins`]), importing other files and resolving path anchors
//! (the [`Runtime`] facade). The library itself never parses Nix; the
//! translator is an external collaborator behind the [`Translator`]
//! trait.
//!
//! Evaluation is call-by-need over a single-threaded cooperative
//! model: pure operations are synchronous and only ever *force*
//! already-constructed values, while everything that touches the
//! filesystem is routed through the [`SourceIO`] trait.

mod builtins;
mod errors;
mod import;
mod io;
mod nix_search_path;
mod ops;
mod runtime;
mod scope;
mod value;

use std::path::Path;
use std::rc::Rc;

pub use crate::builtins::{or_default, Builtins};
pub use crate::errors::{Error, ErrorClass, EvalResult};
pub use crate::import::ImportEngine;
pub use crate::io::{DummyIO, FileType, SourceIO, StdIO};
pub use crate::nix_search_path::NixSearchPath;
pub use crate::runtime::{Anchor, ModuleInit, Runtime, TranslatedModule, Translator};
pub use crate::scope::{Scope, ScopeLayer};
pub use crate::value::{
    Builtin, CoercionKind, Formals, Lambda, NixAttrs, NixList, NixString, Thunk, Value,
};

pub mod operators {
    //! Re-export of the operator group under the name transpiled code
    //! is bound to.
    pub use crate::ops::*;
}

/// An evaluation session: one import engine configured with I/O, a
/// translator and a search path, evaluating files on demand.
pub struct Evaluation {
    engine: Rc<ImportEngine>,
}

impl Evaluation {
    /// Create an evaluation with the search path taken from the
    /// `NIX_PATH` environment variable.
    pub fn new(io: Rc<dyn SourceIO>, translator: Rc<dyn Translator>) -> Self {
        Evaluation {
            engine: ImportEngine::new(io, translator),
        }
    }

    pub fn with_search_path(
        io: Rc<dyn SourceIO>,
        translator: Rc<dyn Translator>,
        search_path: NixSearchPath,
    ) -> Self {
        Evaluation {
            engine: ImportEngine::with_search_path(io, translator, search_path),
        }
    }

    /// Access the underlying engine, e.g. to inspect the module cache.
    pub fn engine(&self) -> &Rc<ImportEngine> {
        &self.engine
    }

    /// Evaluate the module at the given path. The returned value is
    /// often still a function expecting an argument set; forcing and
    /// application are up to the caller.
    pub fn evaluate(&self, path: impl AsRef<Path>) -> EvalResult<Value> {
        self.engine.import(path.as_ref())
    }
}
