//! The operator group consumed by transpiled code.
//!
//! Every Nix operator expression compiles to a call into one of these
//! functions. Binary operators force both operands before applying
//! their typed rule, with two exceptions: the boolean connectives
//! short-circuit (their right operand is only forced when needed), and
//! the auxiliary helpers at the bottom have their own forcing rules.
//!
//! Failure modes are uniform: operands of two different types report a
//! mismatch, supported pairings of an unsupported type report the
//! expected type.

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::errors::Error;
use crate::value::{operand_type, NixAttrs, Value};

/// `+` — addition, string concatenation, path extension.
pub fn add(lhs: Value, rhs: Value) -> Result<Value, Error> {
    let a = lhs.force()?;
    let b = rhs.force()?;

    match (a, b) {
        (Value::Integer(i1), Value::Integer(i2)) => Ok(Value::Integer(i1 + i2)),
        (Value::Integer(i1), Value::Float(f2)) => Ok(Value::Float(i1 as f64 + f2)),
        (Value::Float(f1), Value::Integer(i2)) => Ok(Value::Float(f1 + i2 as f64)),
        (Value::Float(f1), Value::Float(f2)) => Ok(Value::Float(f1 + f2)),

        (Value::String(s1), Value::String(s2)) => Ok(Value::String(s1.concat(&s2))),

        // A path extended with a string stays a path; a string
        // extended with a path coerces the path.
        (Value::Path(p), Value::String(s)) => {
            let mut out = p.to_string_lossy().into_owned();
            out.push_str(s.as_str());
            Ok(Value::Path(Box::new(PathBuf::from(out))))
        }
        (Value::String(s), Value::Path(p)) => {
            let mut out = s.as_str().to_owned();
            out.push_str(&p.to_string_lossy());
            Ok(Value::String(out.into()))
        }

        (a, b) => Err(mismatch("number or string", &a, &b)),
    }
}

/// `-` (binary)
pub fn sub(lhs: Value, rhs: Value) -> Result<Value, Error> {
    arithmetic(lhs, rhs, |i1, i2| i1 - i2, |f1, f2| f1 - f2)
}

/// `*`
pub fn mul(lhs: Value, rhs: Value) -> Result<Value, Error> {
    arithmetic(lhs, rhs, |i1, i2| i1 * i2, |f1, f2| f1 * f2)
}

/// `/` — integer division when both operands are integers. A zero
/// divisor of either flavour is a range error.
pub fn div(lhs: Value, rhs: Value) -> Result<Value, Error> {
    let a = lhs.force()?;
    let b = rhs.force()?;

    match (a, b) {
        (Value::Integer(_), Value::Integer(0)) => Err(Error::DivisionByZero),
        (Value::Integer(i1), Value::Integer(i2)) => Ok(Value::Integer(i1 / i2)),

        (Value::Integer(i1), Value::Float(f2)) => checked_float_div(i1 as f64, f2),
        (Value::Float(f1), Value::Integer(i2)) => checked_float_div(f1, i2 as f64),
        (Value::Float(f1), Value::Float(f2)) => checked_float_div(f1, f2),

        (a, b) => Err(mismatch("number", &a, &b)),
    }
}

fn checked_float_div(dividend: f64, divisor: f64) -> Result<Value, Error> {
    if divisor == 0.0 {
        return Err(Error::DivisionByZero);
    }
    Ok(Value::Float(dividend / divisor))
}

fn arithmetic(
    lhs: Value,
    rhs: Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, Error> {
    let a = lhs.force()?;
    let b = rhs.force()?;

    match (a, b) {
        (Value::Integer(i1), Value::Integer(i2)) => Ok(Value::Integer(int_op(i1, i2))),
        (Value::Integer(i1), Value::Float(f2)) => Ok(Value::Float(float_op(i1 as f64, f2))),
        (Value::Float(f1), Value::Integer(i2)) => Ok(Value::Float(float_op(f1, i2 as f64))),
        (Value::Float(f1), Value::Float(f2)) => Ok(Value::Float(float_op(f1, f2))),
        (a, b) => Err(mismatch("number", &a, &b)),
    }
}

/// `++` — list concatenation.
pub fn concat(lhs: Value, rhs: Value) -> Result<Value, Error> {
    let a = lhs.force()?;
    let b = rhs.force()?;

    match (a, b) {
        (Value::List(l1), Value::List(l2)) => {
            let mut out = l1.into_inner();
            out.append(l2.into_inner());
            Ok(Value::List(out.into()))
        }
        (a, b) => Err(mismatch("list", &a, &b)),
    }
}

/// `//` — shallow right-biased attribute set merge, producing a new
/// set and leaving both operands untouched.
pub fn update(lhs: Value, rhs: Value) -> Result<Value, Error> {
    let a = lhs.force()?;
    let b = rhs.force()?;

    match (a, b) {
        (Value::Attrs(a1), Value::Attrs(a2)) => Ok(Value::attrs(a1.update(&a2))),
        (a, b) => Err(mismatch("set", &a, &b)),
    }
}

/// `&&` — the right operand is only forced when the left is true.
pub fn and(lhs: Value, rhs: Value) -> Result<Value, Error> {
    if !force_bool(lhs)? {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(force_bool(rhs)?))
}

/// `||` — the right operand is only forced when the left is false.
pub fn or(lhs: Value, rhs: Value) -> Result<Value, Error> {
    if force_bool(lhs)? {
        return Ok(Value::Bool(true));
    }
    Ok(Value::Bool(force_bool(rhs)?))
}

/// `->` — material implication, `!a || b`.
pub fn implication(lhs: Value, rhs: Value) -> Result<Value, Error> {
    if !force_bool(lhs)? {
        return Ok(Value::Bool(true));
    }
    Ok(Value::Bool(force_bool(rhs)?))
}

/// `==` — deep structural equality.
pub fn eq(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(lhs.nix_eq(&rhs)?))
}

/// `!=`
pub fn neq(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(!lhs.nix_eq(&rhs)?))
}

/// `<`
pub fn lt(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(
        lhs.nix_cmp(&rhs)?,
        Some(Ordering::Less)
    )))
}

/// `<=`
pub fn le(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(
        lhs.nix_cmp(&rhs)?,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

/// `>`
pub fn gt(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(
        lhs.nix_cmp(&rhs)?,
        Some(Ordering::Greater)
    )))
}

/// `>=`
pub fn ge(lhs: Value, rhs: Value) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(
        lhs.nix_cmp(&rhs)?,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}

/// unary `!`
pub fn not(operand: Value) -> Result<Value, Error> {
    Ok(Value::Bool(!force_bool(operand)?))
}

/// unary `-`
pub fn neg(operand: Value) -> Result<Value, Error> {
    match operand.force()? {
        Value::Integer(i) => Ok(Value::Integer(-i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Error::OperandType {
            expected: "number",
            actual: operand_type(&other),
        }),
    }
}

fn force_bool(v: Value) -> Result<bool, Error> {
    match v.force()? {
        Value::Bool(b) => Ok(b),
        other => Err(Error::OperandType {
            expected: "bool",
            actual: operand_type(&other),
        }),
    }
}

fn mismatch(expected: &'static str, a: &Value, b: &Value) -> Error {
    let (lhs, rhs) = (operand_type(a), operand_type(b));
    if lhs != rhs {
        Error::TypeMismatch { lhs, rhs }
    } else {
        Error::OperandType {
            expected,
            actual: lhs,
        }
    }
}

/// Ensure `attrs.path[0]….path[n] = value`, creating intermediate
/// attribute sets on demand. Used by transpiled nested attribute
/// bindings; see [`NixAttrs::deep_merge`] for the failure modes.
pub fn deep_merge(
    attrs: &mut NixAttrs,
    value: Value,
    path: &[&str],
) -> Result<(), Error> {
    attrs.deep_merge(path, value)
}

/// Resolve a named argument of an attrset-pattern lambda: the value
/// bound under `key` in the call-site attribute set, or the forced
/// fallback (the declared default) when the key is absent.
pub fn lambda_arg(
    actual: &NixAttrs,
    key: &str,
    fallback: Option<Value>,
) -> Result<Value, Error> {
    match actual.select(key) {
        Some(value) => Ok(value.clone()),
        None => match fallback {
            Some(default) => default.force(),
            None => Err(Error::MissingLambdaArg {
                name: key.to_string(),
            }),
        },
    }
}
