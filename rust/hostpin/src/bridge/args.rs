//! Call arguments and their conversion to native values.

use hostpin_common::{Result, error::Error, verify_arg};

use crate::bridge::value::Value;

static UNDEFINED: Value = Value::Undefined;

/// The arguments of a call from the managed runtime into a native function.
#[derive(Debug, Clone)]
pub struct CallbackArgs {
    construct_call: bool,
    args: Vec<Value>,
}

impl CallbackArgs {
    /// Arguments of a `new`-style call.
    pub fn construct(args: impl Into<Vec<Value>>) -> CallbackArgs {
        CallbackArgs {
            construct_call: true,
            args: args.into(),
        }
    }

    /// Arguments of a plain function or method call.
    pub fn call(args: impl Into<Vec<Value>>) -> CallbackArgs {
        CallbackArgs {
            construct_call: false,
            args: args.into(),
        }
    }

    #[inline]
    pub fn is_construct_call(&self) -> bool {
        self.construct_call
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The argument at `index`, or `Undefined` past the end of the list.
    pub fn get(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&UNDEFINED)
    }

    /// Reads an optional integer offset.
    ///
    /// `Undefined` means the argument was omitted. Numbers are truncated toward
    /// zero, with NaN mapped to 0 and infinities saturating; bigints saturate at
    /// `i64::MAX`. Any other type is an invalid argument.
    pub fn offset(&self, index: usize, name: &str) -> Result<Option<i64>> {
        match self.get(index) {
            Value::Undefined => Ok(None),
            Value::Number(n) => Ok(Some(if n.is_nan() { 0 } else { n.trunc() as i64 })),
            Value::BigInt(n) => Ok(Some(i64::try_from(*n).unwrap_or(i64::MAX))),
            other => Err(Error::invalid_arg(
                name,
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    }

    /// Reads a byte length: a finite, non-negative number (fractions truncated).
    /// An omitted argument is a length of 0.
    pub fn byte_length(&self, index: usize) -> Result<usize> {
        match self.get(index) {
            Value::Undefined => Ok(0),
            Value::Number(n) => {
                let n = *n;
                verify_arg!(byteLength, n.is_finite() && n >= 0.0);
                Ok(n.trunc() as usize)
            }
            other => Err(Error::invalid_arg(
                "byteLength",
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_past_end_is_undefined() {
        let args = CallbackArgs::call(vec![Value::Number(1.0)]);
        assert_eq!(args.len(), 1);
        assert_eq!(args.get(0), &Value::Number(1.0));
        assert!(args.get(1).is_undefined());
        assert!(!args.is_construct_call());
        assert!(CallbackArgs::construct(vec![]).is_construct_call());
    }

    #[test]
    fn test_offset_coercion() {
        let args = CallbackArgs::call(vec![
            Value::Number(-3.7),
            Value::Number(f64::NAN),
            Value::Number(f64::INFINITY),
            Value::BigInt(u64::MAX),
            Value::Undefined,
        ]);
        assert_eq!(args.offset(0, "start").unwrap(), Some(-3));
        assert_eq!(args.offset(1, "start").unwrap(), Some(0));
        assert_eq!(args.offset(2, "start").unwrap(), Some(i64::MAX));
        assert_eq!(args.offset(3, "start").unwrap(), Some(i64::MAX));
        assert_eq!(args.offset(4, "start").unwrap(), None);
        assert_eq!(args.offset(9, "start").unwrap(), None);
    }

    #[test]
    fn test_offset_rejects_non_numbers() {
        let args = CallbackArgs::call(vec![Value::from("1"), Value::Boolean(true)]);
        assert!(args.offset(0, "start").is_err());
        assert!(args.offset(1, "end").is_err());
    }

    #[test]
    fn test_byte_length() {
        let args = CallbackArgs::construct(vec![
            Value::Number(16.9),
            Value::Number(-1.0),
            Value::Number(f64::NAN),
            Value::Null,
        ]);
        assert_eq!(args.byte_length(0).unwrap(), 16);
        assert!(args.byte_length(1).is_err());
        assert!(args.byte_length(2).is_err());
        assert!(args.byte_length(3).is_err());
        assert_eq!(args.byte_length(4).unwrap(), 0);
    }
}
