//! This module implements the builtins exposed in the Nix language.
//!
//! The set covered here is the non-IO surface: list, attribute set,
//! string and version operations, arithmetic, JSON, and evaluation
//! control. Store-side builtins (`derivation`, `fetch*`, `toFile`,
//! hashing) and the regex builtins are provided by other layers, if at
//! all.
//!
//! Builtins are declared with the `#[builtins]` attribute macro, which
//! assembles them into the `builtins()` vector from which the
//! [`Builtins`] table is built.

use std::cmp::Ordering;

use builtin_macros::builtins;

use crate::errors::Error;
use crate::value::{NixAttrs, Value};

mod versions;

/// Fallback lookup used by transpiled `e.a.b or default` expressions.
///
/// Forces `primary`; if evaluation fails because an attribute along
/// the selection path was missing, the forced fallback is substituted.
/// Every other error propagates.
pub fn or_default(primary: Value, fallback: Value) -> Result<Value, Error> {
    match primary.force() {
        Ok(value) => Ok(value),
        Err(Error::AttributeNotFound { .. }) => fallback.force(),
        Err(err) => Err(err),
    }
}

#[builtins]
mod pure_builtins {
    use std::collections::{BTreeMap, HashSet};
    use std::path::PathBuf;

    use imbl::Vector;

    use crate::ops;
    use crate::value::{type_error, CoercionKind, NixList, NixString};

    use super::versions::{compare_versions, split_version, VersionPart};
    use super::*;

    #[builtin("abort")]
    fn builtin_abort(message: Value) -> Result<Value, Error> {
        Err(Error::Abort(message.to_str()?.as_str().to_string()))
    }

    #[builtin("add")]
    fn builtin_add(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        ops::add(x, y)
    }

    #[builtin("all")]
    fn builtin_all(pred: Value, list: Value) -> Result<Value, Error> {
        for value in list.to_list()? {
            if !pred.call(value)?.as_bool()? {
                return Ok(Value::Bool(false));
            }
        }

        Ok(Value::Bool(true))
    }

    #[builtin("any")]
    fn builtin_any(pred: Value, list: Value) -> Result<Value, Error> {
        for value in list.to_list()? {
            if pred.call(value)?.as_bool()? {
                return Ok(Value::Bool(true));
            }
        }

        Ok(Value::Bool(false))
    }

    #[builtin("assert")]
    fn builtin_assert(condition: Value) -> Result<Value, Error> {
        match condition {
            Value::Bool(true) => Ok(Value::Bool(true)),
            Value::Bool(false) => Err(Error::AssertionFailed),
            other => Err(type_error("bool", &other)),
        }
    }

    #[builtin("attrNames")]
    fn builtin_attr_names(set: Value) -> Result<Value, Error> {
        let xs = set.to_attrs()?;
        Ok(Value::List(
            xs.keys().map(|k| Value::String(k.clone())).collect(),
        ))
    }

    #[builtin("attrValues")]
    fn builtin_attr_values(set: Value) -> Result<Value, Error> {
        let xs = set.to_attrs()?;
        Ok(Value::List(xs.iter().map(|(_, v)| v.clone()).collect()))
    }

    #[builtin("baseNameOf")]
    fn builtin_base_name_of(s: Value) -> Result<Value, Error> {
        let s = s.coerce_to_string(CoercionKind::Weak)?;
        let result: &str = s.as_str().rsplit_once('/').map(|(_, x)| x).unwrap_or_else(|| s.as_str());
        Ok(Value::from(result))
    }

    #[builtin("bitAnd")]
    fn builtin_bit_and(x: Value, y: Value) -> Result<Value, Error> {
        Ok(Value::Integer(x.as_int()? & y.as_int()?))
    }

    #[builtin("bitOr")]
    fn builtin_bit_or(x: Value, y: Value) -> Result<Value, Error> {
        Ok(Value::Integer(x.as_int()? | y.as_int()?))
    }

    #[builtin("bitXor")]
    fn builtin_bit_xor(x: Value, y: Value) -> Result<Value, Error> {
        Ok(Value::Integer(x.as_int()? ^ y.as_int()?))
    }

    #[builtin("catAttrs")]
    fn builtin_cat_attrs(key: Value, list: Value) -> Result<Value, Error> {
        let key = key.to_str()?;
        let mut output = Vector::new();

        for item in list.to_list()? {
            let set = item.to_attrs()?;
            if let Some(value) = set.select(key.as_str()) {
                output.push_back(value.clone());
            }
        }

        Ok(Value::List(output.into()))
    }

    #[builtin("ceil")]
    fn builtin_ceil(double: Value) -> Result<Value, Error> {
        match double {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Float(f) => Ok(Value::Integer(f.ceil() as i64)),
            other => Err(type_error("float", &other)),
        }
    }

    #[builtin("compareVersions")]
    fn builtin_compare_versions(x: Value, y: Value) -> Result<Value, Error> {
        let s1 = x.to_str()?;
        let s2 = y.to_str()?;

        match compare_versions(s1.as_str(), s2.as_str()) {
            Ordering::Less => Ok(Value::Integer(-1)),
            Ordering::Equal => Ok(Value::Integer(0)),
            Ordering::Greater => Ok(Value::Integer(1)),
        }
    }

    #[builtin("concatLists")]
    fn builtin_concat_lists(lists: Value) -> Result<Value, Error> {
        let mut out = Vector::new();

        for value in lists.to_list()? {
            out.append(value.to_list()?.into_inner());
        }

        Ok(Value::List(out.into()))
    }

    #[builtin("concatMap")]
    fn builtin_concat_map(f: Value, list: Value) -> Result<Value, Error> {
        let mut out = Vector::new();

        for value in list.to_list()? {
            out.append(f.call(value)?.to_list()?.into_inner());
        }

        Ok(Value::List(out.into()))
    }

    #[builtin("concatStringsSep")]
    fn builtin_concat_strings_sep(separator: Value, list: Value) -> Result<Value, Error> {
        let separator = separator.to_str()?;
        let mut res = String::new();

        for (i, val) in list.to_list()?.into_iter().enumerate() {
            if i != 0 {
                res.push_str(separator.as_str());
            }
            res.push_str(val.coerce_to_string(CoercionKind::Weak)?.as_str());
        }

        Ok(res.into())
    }

    #[builtin("deepSeq")]
    fn builtin_deep_seq(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        x.deep_force()?;
        Ok(y)
    }

    #[builtin("dirOf")]
    fn builtin_dir_of(s: Value) -> Result<Value, Error> {
        let is_path = s.is_path()?;
        let str = s.coerce_to_string(CoercionKind::Weak)?;
        let result = str.as_str().rsplit_once('/').map(|(x, _)| x).unwrap_or("");

        if is_path {
            Ok(Value::Path(Box::new(PathBuf::from(result))))
        } else {
            Ok(Value::from(result))
        }
    }

    #[builtin("div")]
    fn builtin_div(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        ops::div(x, y)
    }

    #[builtin("elem")]
    fn builtin_elem(x: Value, xs: Value) -> Result<Value, Error> {
        for val in xs.to_list()? {
            if val.nix_eq(&x)? {
                return Ok(Value::Bool(true));
            }
        }

        Ok(Value::Bool(false))
    }

    #[builtin("elemAt")]
    fn builtin_elem_at(xs: Value, i: Value) -> Result<Value, Error> {
        let xs = xs.to_list()?;
        let i = i.as_int()?;

        if i < 0 {
            return Err(Error::IndexOutOfBounds { index: i });
        }

        match xs.get(i as usize) {
            Some(x) => Ok(x.clone()),
            None => Err(Error::IndexOutOfBounds { index: i }),
        }
    }

    #[builtin("filter")]
    fn builtin_filter(pred: Value, list: Value) -> Result<Value, Error> {
        let mut out = Vector::new();

        for value in list.to_list()? {
            if pred.call(value.clone())?.as_bool()? {
                out.push_back(value);
            }
        }

        Ok(Value::List(out.into()))
    }

    #[builtin("floor")]
    fn builtin_floor(double: Value) -> Result<Value, Error> {
        match double {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Float(f) => Ok(Value::Integer(f.floor() as i64)),
            other => Err(type_error("float", &other)),
        }
    }

    #[builtin("foldl'")]
    fn builtin_foldl(op: Value, #[lazy] nul: Value, list: Value) -> Result<Value, Error> {
        let mut nul = nul;

        for val in list.to_list()? {
            nul = op.call_with([nul, val])?.force()?;
        }

        nul.force()
    }

    #[builtin("fromJSON")]
    fn builtin_from_json(json: Value) -> Result<Value, Error> {
        let json_str = json.to_str()?;
        let parsed: serde_json::Value = serde_json::from_str(json_str.as_str())?;
        Ok(Value::from(parsed))
    }

    #[builtin("functionArgs")]
    fn builtin_function_args(f: Value) -> Result<Value, Error> {
        match f {
            Value::Lambda(lambda) => match &lambda.formals {
                None => Ok(Value::attrs(NixAttrs::empty())),
                Some(formals) => Ok(Value::attrs(
                    formals
                        .arguments
                        .iter()
                        .map(|(k, has_default)| (k.clone(), Value::Bool(*has_default)))
                        .collect(),
                )),
            },
            Value::Builtin(_) => Ok(Value::attrs(NixAttrs::empty())),
            other => Err(type_error("lambda", &other)),
        }
    }

    #[builtin("genList")]
    fn builtin_gen_list(generator: Value, length: Value) -> Result<Value, Error> {
        let len = length.as_int()?;
        if len < 0 {
            return Err(Error::NegativeLength { length: len });
        }

        // The generated elements are thunks; nothing is called until
        // an element is forced.
        let mut out = Vector::new();
        for i in 0..len {
            let f = generator.clone();
            out.push_back(Value::lazy(move || f.call(Value::Integer(i))));
        }

        Ok(Value::List(out.into()))
    }

    #[builtin("getAttr")]
    fn builtin_get_attr(key: Value, set: Value) -> Result<Value, Error> {
        let k = key.to_str()?;
        let xs = set.to_attrs()?;
        Ok(xs.select_required(k.as_str())?.clone())
    }

    #[builtin("getEnv")]
    fn builtin_get_env(name: Value) -> Result<Value, Error> {
        let name = name.to_str()?;
        Ok(Value::from(
            std::env::var(name.as_str()).unwrap_or_default(),
        ))
    }

    #[builtin("groupBy")]
    fn builtin_group_by(f: Value, list: Value) -> Result<Value, Error> {
        let mut res: BTreeMap<NixString, Vector<Value>> = BTreeMap::new();

        for val in list.to_list()? {
            let key = f.call(val.clone())?.to_str()?;
            res.entry(key).or_insert_with(Vector::new).push_back(val);
        }

        Ok(Value::attrs(
            res.into_iter()
                .map(|(k, v)| (k, Value::List(v.into())))
                .collect(),
        ))
    }

    #[builtin("hasAttr")]
    fn builtin_has_attr(key: Value, set: Value) -> Result<Value, Error> {
        let k = key.to_str()?;
        let xs = set.to_attrs()?;
        Ok(Value::Bool(xs.contains(k.as_str())))
    }

    #[builtin("head")]
    fn builtin_head(list: Value) -> Result<Value, Error> {
        match list.to_list()?.get(0) {
            Some(x) => Ok(x.clone()),
            None => Err(Error::IndexOutOfBounds { index: 0 }),
        }
    }

    #[builtin("intersectAttrs")]
    fn builtin_intersect_attrs(x: Value, y: Value) -> Result<Value, Error> {
        let attrs1 = x.to_attrs()?;
        let attrs2 = y.to_attrs()?;

        // keys present in both, values from the second set
        Ok(Value::attrs(
            attrs2
                .iter()
                .filter(|(k, _)| attrs1.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))
    }

    #[builtin("isAttrs")]
    fn builtin_is_attrs(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Attrs(_))))
    }

    #[builtin("isBool")]
    fn builtin_is_bool(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Bool(_))))
    }

    #[builtin("isFloat")]
    fn builtin_is_float(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Float(_))))
    }

    #[builtin("isFunction")]
    fn builtin_is_function(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(
            x,
            Value::Lambda(_) | Value::Builtin(_)
        )))
    }

    #[builtin("isInt")]
    fn builtin_is_int(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Integer(_))))
    }

    #[builtin("isList")]
    fn builtin_is_list(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::List(_))))
    }

    // isNull is deprecated in Nix, but still present.
    #[builtin("isNull")]
    fn builtin_is_null(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Null)))
    }

    #[builtin("isPath")]
    fn builtin_is_path(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::Path(_))))
    }

    #[builtin("isString")]
    fn builtin_is_string(x: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(x, Value::String(_))))
    }

    #[builtin("length")]
    fn builtin_length(list: Value) -> Result<Value, Error> {
        Ok(Value::Integer(list.to_list()?.len() as i64))
    }

    #[builtin("lessThan")]
    fn builtin_less_than(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        Ok(Value::Bool(matches!(
            x.nix_cmp(&y)?,
            Some(Ordering::Less)
        )))
    }

    #[builtin("listToAttrs")]
    fn builtin_list_to_attrs(list: Value) -> Result<Value, Error> {
        let mut map = BTreeMap::new();

        for val in list.to_list()? {
            let attrs = val.to_attrs()?;
            let name = attrs.select_required("name")?.to_str()?;
            let value = attrs.select_required("value")?.clone();

            // Entries earlier in the list take precedence over entries
            // later in the list.
            map.entry(name).or_insert(value);
        }

        Ok(Value::attrs(map.into_iter().collect()))
    }

    #[builtin("map")]
    fn builtin_map(f: Value, list: Value) -> Result<Value, Error> {
        // As with genList, the produced elements stay lazy.
        let mut out = Vector::new();

        for val in list.to_list()? {
            let f = f.clone();
            out.push_back(Value::lazy(move || f.call(val.clone())));
        }

        Ok(Value::List(out.into()))
    }

    #[builtin("mapAttrs")]
    fn builtin_map_attrs(f: Value, attrs: Value) -> Result<Value, Error> {
        let attrs = attrs.to_attrs()?;
        let mut out = NixAttrs::empty();

        for (key, value) in attrs.iter() {
            let mapped = f.call_with([Value::String(key.clone()), value.clone()])?;
            out.insert(key.clone(), mapped);
        }

        Ok(Value::attrs(out))
    }

    #[builtin("mul")]
    fn builtin_mul(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        ops::mul(x, y)
    }

    #[builtin("parseDrvName")]
    fn builtin_parse_drv_name(s: Value) -> Result<Value, Error> {
        let s = s.to_str()?;
        let text = s.as_str();

        // The name ends at the first dash followed by a character that
        // cannot start a name continuation.
        let split_at = text
            .as_bytes()
            .windows(2)
            .enumerate()
            .find_map(|(idx, w)| match w {
                [b'-', c] if !c.is_ascii_alphabetic() => Some(idx),
                _ => None,
            })
            .unwrap_or(text.len());

        let name = &text[..split_at];
        let version = text.get(split_at + 1..).unwrap_or("");

        Ok(Value::attrs(
            [("name", name), ("version", version)].into_iter().collect(),
        ))
    }

    #[builtin("partition")]
    fn builtin_partition(pred: Value, list: Value) -> Result<Value, Error> {
        let mut right: Vector<Value> = Vector::new();
        let mut wrong: Vector<Value> = Vector::new();

        for elem in list.to_list()? {
            if pred.call(elem.clone())?.as_bool()? {
                right.push_back(elem);
            } else {
                wrong.push_back(elem);
            }
        }

        Ok(Value::attrs(
            [
                ("right", Value::List(right.into())),
                ("wrong", Value::List(wrong.into())),
            ]
            .into_iter()
            .collect(),
        ))
    }

    #[builtin("removeAttrs")]
    fn builtin_remove_attrs(attrs: Value, keys: Value) -> Result<Value, Error> {
        let attrs = attrs.to_attrs()?;
        let keys = keys
            .to_list()?
            .into_iter()
            .map(|v| v.to_str())
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Value::attrs(
            attrs
                .iter()
                .filter(|(k, _)| !keys.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))
    }

    #[builtin("replaceStrings")]
    fn builtin_replace_strings(from: Value, to: Value, s: Value) -> Result<Value, Error> {
        let from = from.to_list()?;
        from.force_elements()?;
        let to = to.to_list()?;
        to.force_elements()?;

        let pairs = from
            .iter()
            .zip(to.iter())
            .map(|(f, t)| Ok((f.to_str()?, t.to_str()?)))
            .collect::<Result<Vec<_>, Error>>()?;

        let string = s.to_str()?;
        let text = string.as_str();

        let mut res = String::new();
        let mut i = 0;

        // Scan left to right; replacements never overlap, and inserted
        // text is not rescanned. An empty `from` matches before every
        // character and once more at the end, with a marker preventing
        // it from matching its own insertion point twice.
        let mut empty_inserted = false;

        'outer: while i < text.len() {
            for (from, to) in &pairs {
                if from.as_str().is_empty() {
                    if empty_inserted {
                        continue;
                    }
                    res.push_str(to.as_str());
                    empty_inserted = true;
                    continue 'outer;
                }

                if text[i..].starts_with(from.as_str()) {
                    res.push_str(to.as_str());
                    i += from.as_str().len();
                    empty_inserted = false;
                    continue 'outer;
                }
            }

            let c = text[i..].chars().next().expect("i is a char boundary");
            res.push(c);
            i += c.len_utf8();
            empty_inserted = false;
        }

        if !empty_inserted {
            if let Some((_, to)) = pairs.iter().find(|(f, _)| f.as_str().is_empty()) {
                res.push_str(to.as_str());
            }
        }

        Ok(Value::String(res.into()))
    }

    #[builtin("seq")]
    fn builtin_seq(_x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        // The first argument was forced to weak head normal form by
        // the calling infrastructure; the second is returned as-is,
        // possibly still a thunk.
        Ok(y)
    }

    #[builtin("sort")]
    fn builtin_sort(comparator: Value, list: Value) -> Result<Value, Error> {
        let mut list = list.to_list()?.into_iter().collect::<Vec<_>>();

        // Used to let errors "escape" from the sorting closure; the
        // first error encountered is returned from this function.
        let mut error: Option<Error> = None;

        list.sort_by(|lhs, rhs| {
            let result = comparator
                .call_with([lhs.clone(), rhs.clone()])
                .and_then(|v| v.as_bool());

            match (&error, result) {
                // The comparator only yields "less than?", there is no
                // way for it to express equality.
                (None, Ok(true)) => Ordering::Less,
                (None, Ok(false)) => Ordering::Greater,

                // Closest thing to short-circuiting out if an error
                // was encountered.
                (Some(_), _) => Ordering::Equal,

                (_, Err(e)) => {
                    error = Some(e);
                    Ordering::Equal
                }
            }
        });

        match error {
            None => Ok(Value::List(list.into_iter().collect())),
            Some(e) => Err(e),
        }
    }

    #[builtin("splitVersion")]
    fn builtin_split_version(s: Value) -> Result<Value, Error> {
        let s = s.to_str()?;
        let parts = split_version(s.as_str())
            .into_iter()
            .map(|part| {
                Value::from(match part {
                    VersionPart::Number(n) => n,
                    VersionPart::Word(w) => w,
                })
            })
            .collect::<NixList>();
        Ok(Value::List(parts))
    }

    #[builtin("stringLength")]
    fn builtin_string_length(s: Value) -> Result<Value, Error> {
        Ok(Value::Integer(s.to_str()?.as_str().len() as i64))
    }

    #[builtin("sub")]
    fn builtin_sub(#[lazy] x: Value, #[lazy] y: Value) -> Result<Value, Error> {
        ops::sub(x, y)
    }

    #[builtin("substring")]
    fn builtin_substring(start: Value, len: Value, s: Value) -> Result<Value, Error> {
        let beg = start.as_int()?;
        let len = len.as_int()?;
        let x = s.to_str()?;

        if beg < 0 {
            return Err(Error::IndexOutOfBounds { index: beg });
        }
        let beg = beg as usize;

        // A length argument is only validated when the start index
        // still lies within the string.
        if beg >= x.as_str().len() {
            return Ok(Value::from(""));
        }

        if len < 0 {
            return Err(Error::NegativeLength { length: len });
        }

        let end = std::cmp::min(beg + len as usize, x.as_str().len());
        Ok(Value::from(&x.as_str()[beg..end]))
    }

    #[builtin("tail")]
    fn builtin_tail(list: Value) -> Result<Value, Error> {
        let xs = list.to_list()?;

        // The tail of an empty list is tolerated and empty.
        Ok(Value::List(xs.into_iter().skip(1).collect()))
    }

    #[builtin("throw")]
    fn builtin_throw(message: Value) -> Result<Value, Error> {
        Err(Error::Throw(message.to_str()?.as_str().to_string()))
    }

    #[builtin("toJSON")]
    fn builtin_to_json(#[lazy] x: Value) -> Result<Value, Error> {
        let json = x.into_json()?;
        Ok(Value::from(serde_json::to_string(&json)?))
    }

    #[builtin("toString")]
    fn builtin_to_string(#[lazy] x: Value) -> Result<Value, Error> {
        x.coerce_to_string(CoercionKind::Strong).map(Value::String)
    }

    #[builtin("trace")]
    fn builtin_trace(message: Value, #[lazy] value: Value) -> Result<Value, Error> {
        eprintln!("trace: {}", message);
        Ok(value)
    }

    #[builtin("tryEval")]
    fn builtin_try_eval(#[lazy] e: Value) -> Result<Value, Error> {
        match e.force() {
            Ok(value) => Ok(Value::attrs(
                [("success", Value::Bool(true)), ("value", value)]
                    .into_iter()
                    .collect(),
            )),

            Err(err) if err.is_catchable() => Ok(Value::attrs(
                [
                    ("success", Value::Bool(false)),
                    ("value", Value::Bool(false)),
                ]
                .into_iter()
                .collect(),
            )),

            Err(err) => Err(err),
        }
    }

    #[builtin("typeOf")]
    fn builtin_type_of(x: Value) -> Result<Value, Error> {
        Ok(Value::from(x.type_of()))
    }
}

/// The assembled builtins table handed to every instantiated module.
///
/// The table contains everything declared in this module; the operator
/// group and the `deep_merge`/`lambda_arg` auxiliaries are separate
/// free functions in [`crate::ops`], bound directly by the transpiler.
/// Adding a name here is additive, renaming one is a breaking change
/// for all previously transpiled code.
#[derive(Clone)]
pub struct Builtins {
    attrs: NixAttrs,
}

impl Builtins {
    pub fn new() -> Self {
        let attrs = pure_builtins::builtins()
            .into_iter()
            .map(|b| (b.name(), Value::Builtin(b)))
            .collect();

        Builtins { attrs }
    }

    /// Look up a builtin by the name the transpiler was bound to.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.attrs.select(name).cloned()
    }

    /// The table as an attribute set, i.e. the value of the `builtins`
    /// global inside the language.
    pub fn as_attrs(&self) -> &NixAttrs {
        &self.attrs
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Lambda;
    use std::rc::Rc;

    fn builtin(name: &str) -> Value {
        Builtins::new().lookup(name).expect("builtin should exist")
    }

    fn int_list(ints: &[i64]) -> Value {
        Value::List(ints.iter().map(|i| Value::Integer(*i)).collect())
    }

    #[test]
    fn table_covers_the_contract() {
        let builtins = Builtins::new();
        for name in [
            "abort", "add", "all", "any", "assert", "attrNames", "attrValues", "baseNameOf",
            "bitAnd", "bitOr", "bitXor", "catAttrs", "ceil", "compareVersions",
            "concatLists", "concatMap", "concatStringsSep", "deepSeq", "dirOf",
            "div", "elem", "elemAt", "filter", "floor", "foldl'", "fromJSON",
            "functionArgs", "genList", "getAttr", "getEnv", "groupBy", "hasAttr",
            "head", "intersectAttrs", "isAttrs", "isBool", "isFloat", "isFunction",
            "isInt", "isList", "isNull", "isPath", "isString", "length",
            "lessThan", "listToAttrs", "map", "mapAttrs", "mul", "parseDrvName",
            "partition", "removeAttrs", "replaceStrings", "seq", "sort",
            "splitVersion", "stringLength", "sub", "substring", "tail", "throw",
            "toJSON", "toString", "trace", "tryEval", "typeOf",
        ] {
            assert!(builtins.lookup(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn currying() {
        let add = builtin("add");
        let add_one = add.call(Value::Integer(1)).unwrap();
        assert!(matches!(add_one, Value::Builtin(_)));
        assert_eq!(
            add_one.call(Value::Integer(2)).unwrap().as_int().unwrap(),
            3
        );
    }

    #[test]
    fn compare_versions_scenarios() {
        let cmp = |a: &str, b: &str| {
            builtin("compareVersions")
                .call_with([Value::from(a), Value::from(b)])
                .unwrap()
                .as_int()
                .unwrap()
        };

        assert_eq!(cmp("2.3pre1", "2.3"), -1);
        assert_eq!(cmp("2.3.1", "2.3"), 1);
        assert_eq!(cmp("2.3pre3", "2.3pre12"), -1);
        assert_eq!(cmp("2.3a", "2.3c"), -1);
        assert_eq!(cmp("2.3", "2.3"), 0);
    }

    #[test]
    fn try_eval_over_throw() {
        let result = builtin("tryEval")
            .call(Value::lazy(|| Err(Error::Throw("boo".into()))))
            .unwrap();

        assert!(!result
            .select_required("success")
            .unwrap()
            .as_bool()
            .unwrap());
        assert!(!result.select_required("value").unwrap().as_bool().unwrap());
    }

    #[test]
    fn try_eval_passes_through_aborts_and_type_errors() {
        assert!(matches!(
            builtin("tryEval").call(Value::lazy(|| Err(Error::Abort("fatal".into())))),
            Err(Error::Abort(_))
        ));

        assert!(matches!(
            builtin("tryEval").call(Value::lazy(|| Err(Error::DivisionByZero))),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn try_eval_success() {
        let result = builtin("tryEval").call(Value::Integer(5)).unwrap();
        assert!(result.select_required("success").unwrap().as_bool().unwrap());
        assert_eq!(
            result.select_required("value").unwrap().as_int().unwrap(),
            5
        );
    }

    #[test]
    fn seq_forces_first_returns_second_lazily() {
        assert!(matches!(
            builtin("seq").call_with([
                Value::lazy(|| Err(Error::Throw("forced".into()))),
                Value::Integer(1)
            ]),
            Err(Error::Throw(_))
        ));

        // the second argument is passed through unforced
        let result = builtin("seq")
            .call_with([
                Value::Integer(0),
                Value::lazy(|| Err(Error::Throw("not yet".into()))),
            ])
            .unwrap();
        assert!(matches!(result, Value::Thunk(_)));
    }

    #[test]
    fn deep_seq_forces_recursively() {
        let nested = Value::attrs(
            [(
                "inner",
                Value::List(
                    [Value::lazy(|| Err(Error::Throw("deep".into())))]
                        .into_iter()
                        .collect(),
                ),
            )]
            .into_iter()
            .collect(),
        );

        assert!(matches!(
            builtin("deepSeq").call_with([nested, Value::Integer(1)]),
            Err(Error::Throw(_))
        ));
    }

    #[test]
    fn list_basics() {
        assert_eq!(
            builtin("head")
                .call(int_list(&[1, 2, 3]))
                .unwrap()
                .as_int()
                .unwrap(),
            1
        );
        assert!(matches!(
            builtin("head").call(int_list(&[])),
            Err(Error::IndexOutOfBounds { .. })
        ));

        // tail of the empty list is tolerated
        let tail = builtin("tail").call(int_list(&[])).unwrap();
        assert_eq!(tail.to_list().unwrap().len(), 0);

        assert!(matches!(
            builtin("elemAt").call_with([int_list(&[1]), Value::Integer(3)]),
            Err(Error::IndexOutOfBounds { index: 3 })
        ));

        assert!(builtin("elem")
            .call_with([Value::Integer(2), int_list(&[1, 2, 3])])
            .unwrap()
            .as_bool()
            .unwrap());
    }

    #[test]
    fn gen_list_is_lazy() {
        let poison = Value::Lambda(Rc::new(Lambda::new(|i| {
            if i.as_int()? > 1 {
                Err(Error::Throw("too big".into()))
            } else {
                Ok(Value::Integer(i.as_int()? * 10))
            }
        })));

        let list = builtin("genList")
            .call_with([poison, Value::Integer(5)])
            .unwrap()
            .to_list()
            .unwrap();

        assert_eq!(list.len(), 5);

        // forcing an early element works, the poisoned tail is never touched
        assert_eq!(list[0].clone().force().unwrap().as_int().unwrap(), 0);
        assert_eq!(list[1].clone().force().unwrap().as_int().unwrap(), 10);
    }

    #[test]
    fn foldl_is_strict() {
        let plus = builtin("add");
        let sum = builtin("foldl'")
            .call_with([plus, Value::Integer(0), int_list(&[1, 2, 3, 4])])
            .unwrap();
        assert_eq!(sum.as_int().unwrap(), 10);
    }

    #[test]
    fn partition_splits() {
        let is_even = Value::Lambda(Rc::new(Lambda::new(|v| {
            Ok(Value::Bool(v.as_int()? % 2 == 0))
        })));

        let result = builtin("partition")
            .call_with([is_even, int_list(&[1, 2, 3, 4])])
            .unwrap();

        let right = result.select_required("right").unwrap().to_list().unwrap();
        let wrong = result.select_required("wrong").unwrap().to_list().unwrap();
        assert_eq!(right.len(), 2);
        assert_eq!(wrong.len(), 2);
        assert_eq!(right[0].as_int().unwrap(), 2);
        assert_eq!(wrong[0].as_int().unwrap(), 1);
    }

    #[test]
    fn sort_is_stable_on_less_than() {
        let less = Value::Lambda(Rc::new(Lambda::new(|a| {
            Ok(Value::Lambda(Rc::new(Lambda::new(move |b| {
                crate::ops::lt(a.clone(), b)
            }))))
        })));

        let sorted = builtin("sort")
            .call_with([less, int_list(&[3, 1, 2])])
            .unwrap()
            .to_list()
            .unwrap();

        let ints: Vec<i64> = sorted.iter().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn group_by() {
        let parity = Value::Lambda(Rc::new(Lambda::new(|v| {
            Ok(Value::from(if v.as_int()? % 2 == 0 { "even" } else { "odd" }))
        })));

        let grouped = builtin("groupBy")
            .call_with([parity, int_list(&[1, 2, 3, 4, 5])])
            .unwrap();

        assert_eq!(
            grouped
                .select_required("even")
                .unwrap()
                .to_list()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            grouped
                .select_required("odd")
                .unwrap()
                .to_list()
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn attr_builtins() {
        let set = Value::attrs(
            [("b", 2i64), ("a", 1), ("c", 3)].into_iter().collect(),
        );

        let names = builtin("attrNames").call(set.clone()).unwrap().to_list().unwrap();
        let names: Vec<String> = names
            .iter()
            .map(|v| v.to_str().unwrap().as_str().to_owned())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let values = builtin("attrValues").call(set.clone()).unwrap().to_list().unwrap();
        assert_eq!(values[0].as_int().unwrap(), 1);
        assert_eq!(values[2].as_int().unwrap(), 3);

        assert!(builtin("hasAttr")
            .call_with([Value::from("a"), set.clone()])
            .unwrap()
            .as_bool()
            .unwrap());

        assert!(matches!(
            builtin("getAttr").call_with([Value::from("zzz"), set.clone()]),
            Err(Error::AttributeNotFound { .. })
        ));

        let removed = builtin("removeAttrs")
            .call_with([
                set.clone(),
                Value::List([Value::from("a")].into_iter().collect()),
            ])
            .unwrap();
        let removed = removed.to_attrs().unwrap();
        assert!(!removed.contains("a"));
        assert!(removed.contains("b"));

        // input not mutated
        assert!(set.to_attrs().unwrap().contains("a"));
    }

    #[test]
    fn intersect_attrs_takes_right_values() {
        let left = Value::attrs([("a", 1i64), ("b", 2)].into_iter().collect());
        let right = Value::attrs([("b", 20i64), ("c", 30)].into_iter().collect());

        let result = builtin("intersectAttrs")
            .call_with([left, right])
            .unwrap()
            .to_attrs()
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(matches!(result.select("b"), Some(Value::Integer(20))));
    }

    #[test]
    fn list_to_attrs_round_trips_attr_names() {
        // listToAttrs (map (k: { name = k; value = s.${k}; }) (attrNames s)) == s
        let s = Value::attrs([("x", 1i64), ("y", 2)].into_iter().collect());

        let names = builtin("attrNames").call(s.clone()).unwrap();
        let s_for_lambda = s.clone();
        let to_entry = Value::Lambda(Rc::new(Lambda::new(move |k| {
            let key = k.to_str()?;
            Ok(Value::attrs(
                [
                    ("name", Value::String(key.clone())),
                    ("value", s_for_lambda.select_required(key.as_str())?),
                ]
                .into_iter()
                .collect(),
            ))
        })));

        let entries = builtin("map").call_with([to_entry, names]).unwrap();
        let rebuilt = builtin("listToAttrs").call(entries).unwrap();

        assert!(rebuilt.nix_eq(&s).unwrap());
    }

    #[test]
    fn replace_strings() {
        let call = |from: Vec<&str>, to: Vec<&str>, s: &str| {
            builtin("replaceStrings")
                .call_with([
                    Value::List(from.into_iter().map(Value::from).collect()),
                    Value::List(to.into_iter().map(Value::from).collect()),
                    Value::from(s),
                ])
                .unwrap()
                .to_str()
                .unwrap()
                .as_str()
                .to_owned()
        };

        assert_eq!(call(vec!["oo"], vec!["a"], "foobar"), "fabar");

        // simultaneous, left-to-right, no rescanning of inserted text
        assert_eq!(call(vec!["a", "b"], vec!["b", "a"], "ab"), "ba");

        // the replacement of a swap does not cascade
        assert_eq!(call(vec!["ab", "b"], vec!["b", "x"], "abb"), "bx");

        // empty from inserts at every position
        assert_eq!(call(vec![""], vec!["-"], "ab"), "-a-b-");
    }

    #[test]
    fn string_builtins() {
        assert_eq!(
            builtin("baseNameOf")
                .call(Value::from("/dir/file.nix"))
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "file.nix"
        );

        assert_eq!(
            builtin("dirOf")
                .call(Value::from("/dir/file.nix"))
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "/dir"
        );

        assert_eq!(
            builtin("dirOf")
                .call(Value::from("file.nix"))
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            ""
        );

        assert_eq!(
            builtin("stringLength")
                .call(Value::from("abcde"))
                .unwrap()
                .as_int()
                .unwrap(),
            5
        );

        assert_eq!(
            builtin("substring")
                .call_with([Value::Integer(1), Value::Integer(3), Value::from("abcde")])
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "bcd"
        );

        assert_eq!(
            builtin("concatStringsSep")
                .call_with([
                    Value::from(", "),
                    Value::List(
                        [Value::from("a"), Value::from("b")].into_iter().collect()
                    )
                ])
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "a, b"
        );
    }

    #[test]
    fn split_version_builtin() {
        let parts = builtin("splitVersion")
            .call(Value::from("1.2pre3"))
            .unwrap()
            .to_list()
            .unwrap();

        let parts: Vec<String> = parts
            .iter()
            .map(|v| v.to_str().unwrap().as_str().to_owned())
            .collect();
        assert_eq!(parts, vec!["1", "2", "pre", "3"]);
    }

    #[test]
    fn parse_drv_name() {
        let result = builtin("parseDrvName")
            .call(Value::from("nginx-1.25.3"))
            .unwrap();
        assert_eq!(
            result
                .select_required("name")
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "nginx"
        );
        assert_eq!(
            result
                .select_required("version")
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "1.25.3"
        );

        // a dash followed by a letter is part of the name
        let result = builtin("parseDrvName")
            .call(Value::from("gnome-shell-44.1"))
            .unwrap();
        assert_eq!(
            result
                .select_required("name")
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "gnome-shell"
        );
    }

    #[test]
    fn json_round_trip_through_builtins() {
        let input = Value::attrs(
            [
                ("num", Value::Integer(42)),
                ("list", int_list(&[1, 2])),
                ("s", Value::from("x")),
                ("b", Value::Bool(true)),
                ("nothing", Value::Null),
            ]
            .into_iter()
            .collect(),
        );

        let json = builtin("toJSON").call(input.clone()).unwrap();
        let back = builtin("fromJSON").call(json).unwrap();
        assert!(back.nix_eq(&input).unwrap());
    }

    #[test]
    fn from_json_guards_reserved_key() {
        let back = builtin("fromJSON")
            .call(Value::from(r#"{"__proto__": 1}"#))
            .unwrap();
        let attrs = back.to_attrs().unwrap();
        assert!(attrs.select("__proto__").is_none());
        assert!(attrs.select("__pollutants__").is_some());
    }

    #[test]
    fn arithmetic_builtins() {
        assert_eq!(
            builtin("add")
                .call_with([Value::Integer(1), Value::Integer(2)])
                .unwrap()
                .as_int()
                .unwrap(),
            3
        );
        assert_eq!(
            builtin("bitXor")
                .call_with([Value::Integer(6), Value::Integer(3)])
                .unwrap()
                .as_int()
                .unwrap(),
            5
        );
        assert_eq!(
            builtin("ceil").call(Value::Float(1.2)).unwrap().as_int().unwrap(),
            2
        );
        assert_eq!(
            builtin("floor").call(Value::Float(1.8)).unwrap().as_int().unwrap(),
            1
        );
        assert!(builtin("lessThan")
            .call_with([Value::Integer(1), Value::Integer(2)])
            .unwrap()
            .as_bool()
            .unwrap());
    }

    #[test]
    fn type_predicates() {
        assert!(builtin("isNull").call(Value::Null).unwrap().as_bool().unwrap());
        assert!(builtin("isString")
            .call(Value::from("x"))
            .unwrap()
            .as_bool()
            .unwrap());
        assert!(builtin("isList").call(int_list(&[])).unwrap().as_bool().unwrap());

        // predicates force their argument first
        assert!(builtin("isInt")
            .call(Value::lazy(|| Ok(Value::Integer(1))))
            .unwrap()
            .as_bool()
            .unwrap());

        assert_eq!(
            builtin("typeOf")
                .call(Value::attrs(NixAttrs::empty()))
                .unwrap()
                .to_str()
                .unwrap()
                .as_str(),
            "set"
        );
    }

    #[test]
    fn assert_builtin() {
        assert!(builtin("assert").call(Value::Bool(true)).is_ok());
        assert!(matches!(
            builtin("assert").call(Value::Bool(false)),
            Err(Error::AssertionFailed)
        ));
        assert!(matches!(
            builtin("assert").call(Value::Integer(1)),
            Err(Error::TypeError { .. })
        ));
    }

    #[test]
    fn or_default_intercepts_only_missing_attrs() {
        let missing = Value::lazy(|| {
            Err(Error::AttributeNotFound {
                name: "x".into(),
            })
        });
        assert_eq!(
            or_default(missing, Value::Integer(5)).unwrap().as_int().unwrap(),
            5
        );

        let present = Value::Integer(1);
        assert_eq!(
            or_default(present, Value::Integer(5)).unwrap().as_int().unwrap(),
            1
        );

        let throw = Value::lazy(|| Err(Error::Throw("no".into())));
        assert!(matches!(
            or_default(throw, Value::Integer(5)),
            Err(Error::Throw(_))
        ));
    }
}
