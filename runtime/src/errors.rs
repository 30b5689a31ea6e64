//! Error taxonomy of the runtime.
//!
//! Every failure a transpiled module can observe is an [`Error`]. The
//! variants are fine-grained (they carry whatever context their production
//! site has), but for catchability and reporting they collapse into five
//! classes via [`Error::class`]: type errors, range errors, scope
//! discipline violations, evaluation errors and fatal aborts. Only
//! evaluation errors are interceptable by `tryEval`; aborts in particular
//! must never be swallowed.

use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

/// Classification of an [`Error`] for propagation decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operand or argument of the wrong type.
    Type,
    /// Out-of-domain numeric or index operation.
    Range,
    /// Violation of scope binding discipline.
    Scope,
    /// Runtime failure raised from evaluated Nix code.
    Eval,
    /// Fatal abort, semantically non-catchable.
    Abort,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("expected {expected}, got {actual}")]
    TypeError {
        expected: &'static str,
        actual: &'static str,
    },

    /// A typed operator applied to a supported operand pairing of an
    /// unsupported type (e.g. `+` on two booleans).
    #[error("invalid input type ({actual}), expected ({expected})")]
    OperandType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A binary operator applied to operands of two different types.
    #[error("given types mismatch ({lhs} != {rhs})")]
    TypeMismatch {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("cannot coerce {from} to a string")]
    NotCoercibleToString { from: &'static str },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("list index {index} is out of bounds")]
    IndexOutOfBounds { index: i64 },

    #[error("cannot create a list of size {length}")]
    NegativeLength { length: i64 },

    #[error("cannot write to a read-only scope")]
    ScopeReadOnly,

    #[error("attempted to rebind '{name}'")]
    ScopeRebind { name: String },

    #[error("tried modifying prototype")]
    ScopePrototype,

    #[error("{0}")]
    Throw(String),

    #[error("{0}")]
    Abort(String),

    #[error("assertion failed")]
    AssertionFailed,

    #[error("attribute '{name}' not found")]
    AttributeNotFound { name: String },

    #[error("attrset element {name} missing at lambda call")]
    MissingLambdaArg { name: String },

    #[error("deep merge requires a non-empty attribute path")]
    DeepMergeEmptyPath,

    #[error("cannot deep-merge through non-attrset value at '{key}'")]
    DeepMergeConflict { key: String },

    #[error("self-referential evaluation detected")]
    SelfReference,

    #[error("import of '{}' failed: {message}", .path.display())]
    ImportFailed { path: PathBuf, message: String },

    #[error("import cycle through '{}' forced before it settled", .path.display())]
    ImportCycle { path: PathBuf },

    #[error("export did not resolve: {0}")]
    PathResolution(String),

    #[error("I/O error{}: {error}", .path.as_deref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        error: Rc<std::io::Error>,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::TypeError { .. }
            | Error::OperandType { .. }
            | Error::TypeMismatch { .. }
            | Error::NotCoercibleToString { .. } => ErrorClass::Type,

            Error::DivisionByZero
            | Error::IndexOutOfBounds { .. }
            | Error::NegativeLength { .. } => ErrorClass::Range,

            Error::ScopeReadOnly | Error::ScopeRebind { .. } | Error::ScopePrototype => {
                ErrorClass::Scope
            }

            Error::Throw(_)
            | Error::AssertionFailed
            | Error::AttributeNotFound { .. }
            | Error::MissingLambdaArg { .. }
            | Error::DeepMergeEmptyPath
            | Error::DeepMergeConflict { .. }
            | Error::SelfReference
            | Error::ImportFailed { .. }
            | Error::ImportCycle { .. }
            | Error::PathResolution(_)
            | Error::Io { .. }
            | Error::Json(_) => ErrorClass::Eval,

            Error::Abort(_) => ErrorClass::Abort,
        }
    }

    /// Whether `tryEval` may intercept this error. Exactly the evaluation
    /// class is catchable; aborts and the type/range/scope classes always
    /// propagate.
    pub fn is_catchable(&self) -> bool {
        self.class() == ErrorClass::Eval
    }
}

pub type EvalResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(Error::DivisionByZero.class(), ErrorClass::Range);
        assert_eq!(Error::ScopePrototype.class(), ErrorClass::Scope);
        assert_eq!(Error::Abort("x".into()).class(), ErrorClass::Abort);
        assert!(Error::Throw("x".into()).is_catchable());
        assert!(!Error::Abort("x".into()).is_catchable());
        assert!(!Error::DivisionByZero.is_catchable());
    }

    #[test]
    fn spec_pinned_messages() {
        assert_eq!(
            Error::TypeMismatch {
                lhs: "number",
                rhs: "string"
            }
            .to_string(),
            "given types mismatch (number != string)"
        );
        assert_eq!(Error::DivisionByZero.to_string(), "Division by zero");
        assert_eq!(
            Error::ScopePrototype.to_string(),
            "tried modifying prototype"
        );
    }
}
