//! This module implements the backing representation of runtime
//! values in the Nix language.
use std::cmp::Ordering;
use std::fmt::Display;
use std::path::PathBuf;
use std::rc::Rc;

mod attrs;
mod builtin;
mod function;
mod json;
mod list;
mod string;
mod thunk;

use crate::errors::Error;

pub use attrs::NixAttrs;
pub use builtin::Builtin;
pub use function::{Formals, Lambda};
pub use list::NixList;
pub use string::NixString;
pub use thunk::{Thunk, ThunkSet};

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(NixString),
    Path(Box<PathBuf>),
    Attrs(Box<NixAttrs>),
    List(NixList),
    Lambda(Rc<Lambda>),
    Builtin(Builtin),

    /// Internal to the runtime in the sense that transpiled code only
    /// ever creates thunks through [`Value::lazy`] and observes their
    /// contents through forcing.
    Thunk(Thunk),
}

/// Generate an `as_*`/`to_*` accessor method that returns either the
/// expected type, or a type error. Unforced thunks are forced and
/// looked through, so a cast behaves like transparent field access.
macro_rules! gen_cast {
    ( $name:ident, $type:ty, $expected:expr, $variant:pat, $result:expr ) => {
        pub fn $name(&self) -> Result<$type, Error> {
            match self {
                $variant => Ok($result),
                Value::Thunk(thunk) => {
                    let forced = thunk.force()?;
                    Self::$name(&forced)
                }
                other => Err(type_error($expected, other)),
            }
        }
    };
}

/// Generate an `is_*` type-checking method.
macro_rules! gen_is {
    ( $name:ident, $variant:pat ) => {
        pub fn $name(&self) -> Result<bool, Error> {
            match self {
                $variant => Ok(true),
                Value::Thunk(thunk) => {
                    let forced = thunk.force()?;
                    Self::$name(&forced)
                }
                _ => Ok(false),
            }
        }
    };
}

/// Describes what input types are allowed when coercing a `Value` to a string.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum CoercionKind {
    /// Only coerce already "stringly" types like strings and paths, but also
    /// coerce sets that have a `__toString` attribute.
    Weak,
    /// Coerce all value types included by `Weak`, but also coerce `null`,
    /// booleans, integers, floats and lists of coercible types.
    Strong,
}

/// Constructors
impl Value {
    /// Construct a [`Value::Attrs`] from a [`NixAttrs`].
    pub fn attrs(attrs: NixAttrs) -> Self {
        Self::Attrs(Box::new(attrs))
    }

    /// Construct a suspended computation. This is the primitive the
    /// transpiler emits for every binding with call-by-need semantics.
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> Result<Value, Error> + 'static,
    {
        Self::Thunk(Thunk::new_suspended(producer))
    }
}

impl Value {
    /// Reduce this value to weak head normal form, stripping any thunk
    /// wrapper. Non-thunk values are returned verbatim.
    pub fn force(self) -> Result<Value, Error> {
        if let Value::Thunk(thunk) = self {
            return thunk.force();
        }

        Ok(self)
    }

    /// Deeply force a value, traversing lists and attribute sets and
    /// forcing their contents too. Reference cycles (which can only
    /// occur through thunks) are detected and traversed only once.
    pub fn deep_force(&self) -> Result<Value, Error> {
        let mut seen = ThunkSet::default();
        self.deep_force_(&mut seen)?;
        self.clone().force()
    }

    fn deep_force_(&self, seen: &mut ThunkSet) -> Result<(), Error> {
        if let Value::Thunk(thunk) = self {
            if !seen.insert(thunk) {
                return Ok(());
            }
        }

        match self.clone().force()? {
            Value::List(list) => {
                for val in &list {
                    val.deep_force_(seen)?;
                }
            }

            Value::Attrs(attrs) => {
                for (_, val) in attrs.iter() {
                    val.deep_force_(seen)?;
                }
            }

            _ => (),
        }

        Ok(())
    }

    /// Transparent attribute access: forces `self`, requires it to be
    /// an attribute set and selects `key` from it.
    pub fn select(&self, key: &str) -> Result<Option<Value>, Error> {
        match self.clone().force()? {
            Value::Attrs(attrs) => Ok(attrs.select(key).cloned()),
            other => Err(type_error("set", &other)),
        }
    }

    /// Like [`Value::select`], but a missing attribute is an error.
    /// This is what transpiled attribute-path selection compiles to;
    /// the distinct error kind is what `or_default` intercepts.
    pub fn select_required(&self, key: &str) -> Result<Value, Error> {
        self.select(key)?.ok_or_else(|| Error::AttributeNotFound {
            name: key.to_string(),
        })
    }

    /// Apply this value (which must force to a lambda or builtin) to a
    /// single argument.
    pub fn call(&self, arg: Value) -> Result<Value, Error> {
        match self.clone().force()? {
            Value::Lambda(lambda) => lambda.call(arg),
            Value::Builtin(builtin) => builtin.apply(arg),
            other => Err(type_error("lambda", &other)),
        }
    }

    /// Apply this value to several arguments in sequence (curried).
    pub fn call_with<I>(&self, args: I) -> Result<Value, Error>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut result = self.clone();
        for arg in args {
            result = result.call(arg)?;
        }
        Ok(result)
    }

    /// Coerce a `Value` to a string. See `CoercionKind` for a rundown of what
    /// input types are accepted under what circumstances.
    pub fn coerce_to_string(&self, kind: CoercionKind) -> Result<NixString, Error> {
        let value = self.clone().force()?;

        match (value, kind) {
            // coercions that are always done
            (Value::String(s), _) => Ok(s),
            (Value::Path(p), _) => Ok(p.to_string_lossy().into_owned().into()),

            // Attribute sets can be converted to strings if they either have a
            // `__toString` attribute which holds a function that receives the
            // set itself, or an `outPath` attribute which should be a string.
            // `__toString` is preferred.
            (Value::Attrs(attrs), kind) => {
                if let Some(to_string) = attrs.select("__toString") {
                    let callable = to_string.clone().force()?;
                    let result = callable.call(Value::Attrs(attrs.clone()))?;
                    return result.coerce_to_string(CoercionKind::Weak);
                }

                if let Some(out_path) = attrs.select("outPath") {
                    return out_path.coerce_to_string(kind);
                }

                Err(Error::NotCoercibleToString { from: "set" })
            }

            // strong coercions
            (Value::Null, CoercionKind::Strong) | (Value::Bool(false), CoercionKind::Strong) => {
                Ok("".into())
            }
            (Value::Bool(true), CoercionKind::Strong) => Ok("1".into()),

            (Value::Integer(i), CoercionKind::Strong) => Ok(i.to_string().into()),

            // Coercing a float to a string unconditionally yields six
            // decimal places.
            (Value::Float(f), CoercionKind::Strong) => Ok(format!("{:.6}", f).into()),

            // Lists are coerced by coercing their elements and interspersing
            // spaces.
            (Value::List(list), CoercionKind::Strong) => {
                let mut out = String::new();

                for (idx, elem) in list.into_iter().enumerate() {
                    if idx > 0 {
                        out.push(' ');
                    }

                    out.push_str(elem.coerce_to_string(kind)?.as_str());
                }

                Ok(out.into())
            }

            (val, _) => Err(Error::NotCoercibleToString {
                from: val.type_of(),
            }),
        }
    }

    /// Compare two Nix values for equality, forcing nested parts of the
    /// structure as needed. Structurally identical values compare equal
    /// regardless of thunk wrapping depth.
    pub fn nix_eq(&self, other: &Value) -> Result<bool, Error> {
        // If both sides are the same unforced thunk they are equal
        // without forcing; this also makes cyclic structures built via
        // `rec { }` comparable to themselves.
        if let (Value::Thunk(t1), Value::Thunk(t2)) = (self, other) {
            if t1.ptr_eq(t2) {
                return Ok(true);
            }
        }

        let a = self.clone().force()?;
        let b = other.clone().force()?;

        let result = match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(b1), Value::Bool(b2)) => b1 == b2,
            (Value::String(s1), Value::String(s2)) => s1 == s2,
            (Value::Path(p1), Value::Path(p2)) => p1 == p2,

            // Numerical comparisons work between int & float
            (Value::Integer(i1), Value::Integer(i2)) => i1 == i2,
            (Value::Integer(i), Value::Float(f)) => i as f64 == f,
            (Value::Float(f1), Value::Float(f2)) => f1 == f2,
            (Value::Float(f), Value::Integer(i)) => i as f64 == f,

            (Value::List(l1), Value::List(l2)) => {
                if l1.ptr_eq(&l2) {
                    return Ok(true);
                }

                if l1.len() != l2.len() {
                    return Ok(false);
                }

                for (v1, v2) in l1.iter().zip(l2.iter()) {
                    if !v1.nix_eq(v2)? {
                        return Ok(false);
                    }
                }

                true
            }

            (_, Value::List(_)) | (Value::List(_), _) => false,

            (Value::Attrs(a1), Value::Attrs(a2)) => {
                if a1.len() != a2.len() {
                    return Ok(false);
                }

                for ((k1, v1), (k2, v2)) in a1.iter().zip(a2.iter()) {
                    if k1 != k2 || !v1.nix_eq(v2)? {
                        return Ok(false);
                    }
                }

                true
            }

            (Value::Attrs(_), _) | (_, Value::Attrs(_)) => false,

            // Functions compare equal only when they are the same
            // function object.
            (Value::Lambda(l1), Value::Lambda(l2)) => Rc::ptr_eq(&l1, &l2),
            (Value::Builtin(b1), Value::Builtin(b2)) => b1 == b2,

            _ => false,
        };

        Ok(result)
    }

    /// Compare `self` against `other` using Nix ordering semantics.
    /// Only numbers are comparable; `None` is yielded for unordered
    /// floats (NaN).
    pub fn nix_cmp(&self, other: &Value) -> Result<Option<Ordering>, Error> {
        let a = self.clone().force()?;
        let b = other.clone().force()?;

        match (&a, &b) {
            (Value::Integer(i1), Value::Integer(i2)) => Ok(Some(i1.cmp(i2))),
            (Value::Float(f1), Value::Float(f2)) => Ok(f1.partial_cmp(f2)),
            (Value::Integer(i1), Value::Float(f2)) => Ok((*i1 as f64).partial_cmp(f2)),
            (Value::Float(f1), Value::Integer(i2)) => Ok(f1.partial_cmp(&(*i2 as f64))),

            _ => {
                let (lhs, rhs) = (operand_type(&a), operand_type(&b));
                if lhs != rhs {
                    Err(Error::TypeMismatch { lhs, rhs })
                } else {
                    Err(Error::OperandType {
                        expected: "number",
                        actual: lhs,
                    })
                }
            }
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Path(_) => "path",
            Value::Attrs(_) => "set",
            Value::List(_) => "list",
            Value::Lambda(_) | Value::Builtin(_) => "lambda",

            // This is only elaborated to make debugging easier; if a
            // user ever sees this string, it's a bug.
            Value::Thunk(_) => "internal[thunk]",
        }
    }

    gen_cast!(as_bool, bool, "bool", Value::Bool(b), *b);
    gen_cast!(as_int, i64, "int", Value::Integer(x), *x);
    gen_cast!(as_float, f64, "float", Value::Float(x), *x);
    gen_cast!(to_str, NixString, "string", Value::String(s), s.clone());
    gen_cast!(to_attrs, Box<NixAttrs>, "set", Value::Attrs(a), a.clone());
    gen_cast!(to_list, NixList, "list", Value::List(l), l.clone());
    gen_cast!(to_path, Box<PathBuf>, "path", Value::Path(p), p.clone());
    gen_cast!(
        as_lambda,
        Rc<Lambda>,
        "lambda",
        Value::Lambda(l),
        l.clone()
    );

    gen_is!(is_path, Value::Path(_));
    gen_is!(is_number, Value::Integer(_) | Value::Float(_));
    gen_is!(is_bool, Value::Bool(_));
    gen_is!(is_attrs, Value::Attrs(_));
    gen_is!(is_null, Value::Null);
}

/// The type name of an operand as reported by operator type errors,
/// which collapse int and float into "number".
pub(crate) fn operand_type(v: &Value) -> &'static str {
    match v {
        Value::Integer(_) | Value::Float(_) => "number",
        other => other.type_of(),
    }
}

pub(crate) fn type_error(expected: &'static str, actual: &Value) -> Error {
    Error::TypeError {
        expected,
        actual: actual.type_of(),
    }
}

pub(crate) trait TotalDisplay {
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, set: &mut ThunkSet) -> std::fmt::Result;
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.total_fmt(f, &mut Default::default())
    }
}

impl TotalDisplay for Value {
    fn total_fmt(&self, f: &mut std::fmt::Formatter<'_>, set: &mut ThunkSet) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(true) => f.write_str("true"),
            Value::Bool(false) => f.write_str("false"),
            Value::Integer(num) => write!(f, "{}", num),
            Value::Float(num) => write!(f, "{}", num),
            Value::String(s) => s.fmt(f),
            Value::Path(p) => p.display().fmt(f),
            Value::Attrs(attrs) => attrs.total_fmt(f, set),
            Value::List(list) => list.total_fmt(f, set),
            Value::Lambda(_) => f.write_str("lambda"),
            Value::Builtin(builtin) => builtin.fmt(f),

            // Delegate thunk display to the type, as it must handle
            // the case of already evaluated or cyclic thunks.
            Value::Thunk(t) => t.total_fmt(f, set),
        }
    }
}

impl<T> From<T> for Value
where
    T: Into<NixString>,
{
    fn from(t: T) -> Self {
        Self::String(t.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<PathBuf> for Value {
    fn from(path: PathBuf) -> Self {
        Self::Path(Box::new(path))
    }
}

impl From<NixAttrs> for Value {
    fn from(attrs: NixAttrs) -> Self {
        Self::attrs(attrs)
    }
}

impl From<NixList> for Value {
    fn from(list: NixList) -> Self {
        Self::List(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_equality_through_thunks() {
        let a = Value::lazy(|| {
            Ok(Value::List(
                [Value::Integer(1), Value::lazy(|| Ok(Value::Integer(2)))]
                    .into_iter()
                    .collect(),
            ))
        });
        let b = Value::List([Value::Integer(1), Value::Integer(2)].into_iter().collect());

        assert!(a.nix_eq(&b).unwrap());
    }

    #[test]
    fn attrs_equality_is_structural() {
        let a: NixAttrs = [("x", 1i64), ("y", 2)].into_iter().collect();
        let b: NixAttrs = [("y", 2i64), ("x", 1)].into_iter().collect();
        let c: NixAttrs = [("x", 1i64)].into_iter().collect();

        assert!(Value::attrs(a.clone()).nix_eq(&Value::attrs(b)).unwrap());
        assert!(!Value::attrs(a).nix_eq(&Value::attrs(c)).unwrap());
    }

    #[test]
    fn numbers_compare_across_types() {
        assert!(Value::Integer(1).nix_eq(&Value::Float(1.0)).unwrap());
        assert_eq!(
            Value::Integer(1).nix_cmp(&Value::Float(2.0)).unwrap(),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn strong_coercion() {
        assert_eq!(
            Value::Bool(true)
                .coerce_to_string(CoercionKind::Strong)
                .unwrap()
                .as_str(),
            "1"
        );
        assert_eq!(
            Value::Null
                .coerce_to_string(CoercionKind::Strong)
                .unwrap()
                .as_str(),
            ""
        );

        let list: Value = Value::List(
            [Value::Integer(1), Value::from("x")].into_iter().collect(),
        );
        assert_eq!(
            list.coerce_to_string(CoercionKind::Strong).unwrap().as_str(),
            "1 x"
        );
    }

    #[test]
    fn to_string_via_attr() {
        let attrs: NixAttrs = [(
            "__toString",
            Value::Lambda(Rc::new(Lambda::new(|_self_ref| Ok(Value::from("rendered"))))),
        )]
        .into_iter()
        .collect();

        assert_eq!(
            Value::attrs(attrs)
                .coerce_to_string(CoercionKind::Weak)
                .unwrap()
                .as_str(),
            "rendered"
        );
    }

    #[test]
    fn weak_coercion_rejects_numbers() {
        assert!(matches!(
            Value::Integer(1).coerce_to_string(CoercionKind::Weak),
            Err(Error::NotCoercibleToString { .. })
        ));
    }
}
