//! Lexical scopes for transpiled Nix bindings.
//!
//! Two kinds of scope exist, sharing one read interface (name lookup
//! and key enumeration):
//!
//! * *Binding scopes* back `let … in` and `rec { }`: they accept new
//!   bindings exactly once, never allow rebinding or removal, and fall
//!   through to an optional parent scope on lookup misses. Because
//!   each binding is typically a thunk that captures the scope it
//!   lives in, this is also what makes cyclic `rec`-bindings work.
//!
//! * *Overlay scopes* back `with e; …`: they are read-only views over
//!   one or more layers (attribute sets, or further scopes), tried in
//!   order on lookup.
//!
//! The reserved name `__proto__` can never be bound. The original
//! runtime needed this to keep Nix code from tampering with the host
//! object prototype; the rejection is kept so that transpiled code
//! behaves identically on every host.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use itertools::Itertools;
use smol_str::SmolStr;

use crate::errors::Error;
use crate::value::{NixAttrs, Value};

const RESERVED_NAME: &str = "__proto__";

/// A single lookup layer of an overlay scope.
#[derive(Clone, Debug)]
pub enum ScopeLayer {
    Attrs(Box<NixAttrs>),
    Scope(Scope),
}

impl ScopeLayer {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self {
            ScopeLayer::Attrs(attrs) => attrs.select(name).cloned(),
            ScopeLayer::Scope(scope) => scope.lookup(name),
        }
    }

    fn keys(&self) -> Vec<SmolStr> {
        match self {
            ScopeLayer::Attrs(attrs) => {
                attrs.keys().map(|k| SmolStr::new(k.as_str())).collect()
            }
            ScopeLayer::Scope(scope) => scope.all_keys(),
        }
    }
}

impl From<NixAttrs> for ScopeLayer {
    fn from(attrs: NixAttrs) -> Self {
        ScopeLayer::Attrs(Box::new(attrs))
    }
}

impl From<Scope> for ScopeLayer {
    fn from(scope: Scope) -> Self {
        ScopeLayer::Scope(scope)
    }
}

#[derive(Debug)]
enum ScopeRepr {
    Binding {
        parent: Option<Scope>,
        bindings: RefCell<BTreeMap<SmolStr, Value>>,
    },

    Overlay {
        layers: Vec<ScopeLayer>,
    },
}

/// A scope handle. Scopes are reference-counted so that thunks and
/// child scopes can capture them freely; a parent always outlives its
/// children that way.
#[derive(Clone, Debug)]
pub struct Scope(Rc<ScopeRepr>);

impl Scope {
    /// Create a writable binding scope, optionally chained to a
    /// parent that lookups fall through to.
    pub fn new(parent: Option<Scope>) -> Self {
        Scope(Rc::new(ScopeRepr::Binding {
            parent,
            bindings: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Create a read-only overlay scope over the given layers, which
    /// are consulted in order on lookup.
    pub fn with_layers<I>(layers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScopeLayer>,
    {
        Scope(Rc::new(ScopeRepr::Overlay {
            layers: layers.into_iter().map(Into::into).collect(),
        }))
    }

    /// Install a binding. Bindings are single-assignment: a second
    /// write to the same name fails, as does any write to an overlay
    /// scope or to the reserved name.
    pub fn bind(&self, name: impl Into<SmolStr>, value: Value) -> Result<(), Error> {
        let name = name.into();

        if name == RESERVED_NAME {
            return Err(Error::ScopePrototype);
        }

        match &*self.0 {
            ScopeRepr::Overlay { .. } => Err(Error::ScopeReadOnly),

            ScopeRepr::Binding { bindings, .. } => {
                let mut bindings = bindings.borrow_mut();
                if bindings.contains_key(&name) {
                    return Err(Error::ScopeRebind {
                        name: name.to_string(),
                    });
                }

                bindings.insert(name, value);
                Ok(())
            }
        }
    }

    /// Look up a name, falling through parents (binding scopes) or
    /// layers (overlay scopes) as appropriate.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match &*self.0 {
            ScopeRepr::Binding { parent, bindings } => {
                if let Some(value) = bindings.borrow().get(name) {
                    return Some(value.clone());
                }

                parent.as_ref().and_then(|p| p.lookup(name))
            }

            ScopeRepr::Overlay { layers } => {
                layers.iter().find_map(|layer| layer.lookup(name))
            }
        }
    }

    /// Enumerate all names visible through this scope.
    ///
    /// For binding scopes this is the sorted, de-duplicated union of
    /// the scope's own names and everything visible through the
    /// parent. Overlay scopes preserve the first-seen layer order
    /// instead, as the layers themselves define shadowing.
    pub fn all_keys(&self) -> Vec<SmolStr> {
        match &*self.0 {
            ScopeRepr::Binding { parent, bindings } => {
                let own = bindings.borrow().keys().cloned().collect::<Vec<_>>();
                match parent {
                    None => own,
                    Some(p) => own
                        .into_iter()
                        .chain(p.all_keys())
                        .sorted()
                        .dedup()
                        .collect(),
                }
            }

            ScopeRepr::Overlay { layers } => layers
                .iter()
                .flat_map(|layer| layer.keys())
                .unique()
                .collect(),
        }
    }

    /// Detach this scope's own bindings into a plain attribute set,
    /// without parent bindings. This is what a transpiled `rec { }`
    /// or `let … in` expression evaluates to when the bindings
    /// themselves are the result.
    pub fn extract_scope(&self) -> NixAttrs {
        match &*self.0 {
            ScopeRepr::Binding { bindings, .. } => bindings
                .borrow()
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect(),

            ScopeRepr::Overlay { .. } => NixAttrs::empty(),
        }
    }
}
