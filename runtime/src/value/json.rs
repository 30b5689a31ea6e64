//! Implementation of Value serialisation *to* and parsing *from* JSON.
//!
//! This can not be implemented through standard serde-derive methods,
//! as there is internal Nix logic that must happen within the
//! conversions (forcing, `__toString`/`outPath` handling, and the
//! reserved-key rename on input).

use serde_json::value::to_value;
use serde_json::Value as Json; // name clash with *our* `Value`
use serde_json::{Map, Number};

use crate::errors::Error;

use super::{CoercionKind, NixAttrs, Value};

/// Keys with this name in parsed JSON input are renamed on the way in.
/// The original runtime did this to keep attacker-controlled JSON from
/// polluting the host object prototype; the rename is kept so that the
/// scope layer's reserved-name guard can never be bypassed through
/// `fromJSON`, and so that transpiled code sees the same attribute
/// names on every host.
const RESERVED_KEY: &str = "__proto__";
const RESERVED_KEY_RENAMED: &str = "__pollutants__";

impl Value {
    pub fn into_json(self) -> Result<Json, Error> {
        let value = self.force()?;

        let json = match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Integer(i) => Json::Number(Number::from(i)),
            Value::Float(f) => to_value(f)?,
            Value::String(s) => Json::String(s.as_str().into()),
            Value::Path(p) => Json::String(p.to_string_lossy().to_string()),

            Value::List(l) => {
                let mut out = vec![];

                for val in l.into_iter() {
                    out.push(val.into_json()?);
                }

                Json::Array(out)
            }

            Value::Attrs(attrs) => {
                // Attribute sets with a callable `__toString` attribute
                // serialise to the string-coerced version of the result of
                // calling that.
                if attrs.select("__toString").is_some() {
                    let s = Value::Attrs(attrs).coerce_to_string(CoercionKind::Weak)?;
                    return Ok(Json::String(s.as_str().to_owned()));
                }

                // Attribute sets with an `outPath` attribute serialise
                // to a JSON serialisation of that inner value
                // (regardless of what it is!).
                if let Some(out_path) = attrs.select("outPath") {
                    return out_path.clone().into_json();
                }

                let mut out = Map::with_capacity(attrs.len());
                for (name, value) in attrs.into_iter_sorted() {
                    out.insert(name.as_str().to_string(), value.into_json()?);
                }

                Json::Object(out)
            }

            val @ (Value::Lambda(_) | Value::Builtin(_)) => {
                return Err(Error::NotCoercibleToString {
                    from: val.type_of(),
                })
            }

            Value::Thunk(_) => unreachable!("force returned an unforced thunk"),
        };

        Ok(json)
    }
}

/// Parsed JSON values convert directly into runtime values; object keys
/// named `__proto__` are renamed during the conversion.
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),

            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }

            Json::String(s) => Value::from(s),
            Json::Array(values) => Value::List(values.into_iter().map(Value::from).collect()),

            Json::Object(obj) => Value::attrs(
                obj.into_iter()
                    .map(|(key, value)| {
                        let key = if key == RESERVED_KEY {
                            RESERVED_KEY_RENAMED.to_string()
                        } else {
                            key
                        };
                        (key, Value::from(value))
                    })
                    .collect::<NixAttrs>(),
            ),
        }
    }
}
