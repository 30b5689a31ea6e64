//! This module implements Nix attribute sets, the primary composite
//! value of the language.
//!
//! Attribute sets are a finite mapping from string keys to values,
//! enumerated in sorted key order. Construction and management of
//! attribute sets has some peculiarities (representation promotion,
//! nested insertion for transpiled `a.b.c = …` bindings) that are
//! encapsulated within this module.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::errors::Error;

use super::string::NixString;
use super::thunk::ThunkSet;
use super::{TotalDisplay, Value};


#[derive(Clone, Debug, Default)]
enum AttrsRep {
    #[default]
    Empty,
    Map(BTreeMap<NixString, Value>),
}

impl AttrsRep {
    /// Retrieve a reference to the mutable map inside of an attrs,
    /// promoting the representation if required.
    fn map_mut(&mut self) -> &mut BTreeMap<NixString, Value> {
        match self {
            AttrsRep::Map(m) => m,

            AttrsRep::Empty => {
                *self = AttrsRep::Map(BTreeMap::new());
                self.map_mut()
            }
        }
    }

    fn select(&self, key: &str) -> Option<&Value> {
        match self {
            AttrsRep::Empty => None,
            AttrsRep::Map(map) => map.get(&key.into()),
        }
    }
}

#[repr(transparent)]
#[derive(Clone, Debug, Default)]
pub struct NixAttrs(AttrsRep);

impl NixAttrs {
    pub fn empty() -> Self {
        NixAttrs(AttrsRep::Empty)
    }

    pub fn len(&self) -> usize {
        match &self.0 {
            AttrsRep::Empty => 0,
            AttrsRep::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.select(key).is_some()
    }

    /// Select a value from an attribute set by key.
    pub fn select(&self, key: &str) -> Option<&Value> {
        self.0.select(key)
    }

    pub fn select_required(&self, key: &str) -> Result<&Value, Error> {
        self.select(key).ok_or_else(|| Error::AttributeNotFound {
            name: key.to_string(),
        })
    }

    /// Insert a binding, replacing any previous value under the same
    /// key. Callers that need single-assignment discipline (scopes)
    /// enforce it before calling this.
    pub fn insert(&mut self, key: NixString, value: Value) -> Option<Value> {
        self.0.map_mut().insert(key, value)
    }

    /// Update one attribute set with the values of the other, with the
    /// right-hand side winning on key collisions. Always produces
    /// fresh backing storage; neither operand is modified.
    pub fn update(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (AttrsRep::Empty, AttrsRep::Empty) => NixAttrs(AttrsRep::Empty),
            (AttrsRep::Empty, _) => other.clone(),
            (_, AttrsRep::Empty) => self.clone(),

            (AttrsRep::Map(m1), AttrsRep::Map(m2)) => {
                let mut m1 = m1.clone();
                let mut m2 = m2.clone();
                m1.append(&mut m2);
                NixAttrs(AttrsRep::Map(m1))
            }
        }
    }

    /// Ensure `self.path[0].path[1]…[n] = value`, creating intermediate
    /// attribute sets on demand.
    ///
    /// This backs the transpiler's nested-assignment emission for
    /// attribute sets written as `{ a.b.c = …; }`. An empty path and a
    /// path component that would descend through a non-attrset value
    /// are both evaluation errors.
    pub fn deep_merge(&mut self, path: &[&str], value: Value) -> Result<(), Error> {
        let (first, rest) = path.split_first().ok_or(Error::DeepMergeEmptyPath)?;

        if rest.is_empty() {
            self.insert((*first).into(), value);
            return Ok(());
        }

        match self.0.map_mut().entry((*first).into()) {
            btree_map::Entry::Vacant(entry) => {
                let mut nested = NixAttrs::empty();
                nested.deep_merge(rest, value)?;
                entry.insert(Value::attrs(nested));
            }

            btree_map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Attrs(nested) => nested.deep_merge(rest, value)?,
                _ => {
                    return Err(Error::DeepMergeConflict {
                        key: first.to_string(),
                    })
                }
            },
        }

        Ok(())
    }

    /// Iterate over all contained values, in sorted key order.
    pub fn iter(&self) -> Iter<'_> {
        match &self.0 {
            AttrsRep::Empty => Iter(None),
            AttrsRep::Map(map) => Iter(Some(map.iter())),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &NixString> {
        self.iter().map(|(k, _)| k)
    }

    pub fn into_iter_sorted(self) -> std::vec::IntoIter<(NixString, Value)> {
        match self.0 {
            AttrsRep::Empty => Vec::new().into_iter(),
            AttrsRep::Map(map) => map.into_iter().collect::<Vec<_>>().into_iter(),
        }
    }
}

pub struct Iter<'a>(Option<btree_map::Iter<'a, NixString, Value>>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a NixString, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.as_mut()?.next()
    }
}

impl<K, V> FromIterator<(K, V)> for NixAttrs
where
    K: Into<NixString>,
    V: Into<Value>,
{
    fn from_iter<T>(iter: T) -> NixAttrs
    where
        T: IntoIterator<Item = (K, V)>,
    {
        let map: BTreeMap<NixString, Value> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if map.is_empty() {
            NixAttrs(AttrsRep::Empty)
        } else {
            NixAttrs(AttrsRep::Map(map))
        }
    }
}

impl TotalDisplay for NixAttrs {
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, set: &mut ThunkSet) -> std::fmt::Result {
        f.write_str("{ ")?;

        for (name, value) in self.iter() {
            write!(f, "{} = ", name.ident_str())?;
            value.total_fmt(f, set)?;
            f.write_str("; ")?;
        }

        f.write_str("}")
    }
}
