// The value lattice: booleans, integers, doubles, strings, and bare
// identifiers, plus the widening rules between them.

use crate::error::{Result, RuntimeError};
use enumflags2::BitFlags;
use std::cell::RefCell;
use std::fmt;

#[derive(BitFlags, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Boolean = 0b00001,
    Integer = 0b00010,
    Number = 0b00100,
    String = 0b01000,
    Identifier = 0b10000,
}

pub type KindSet = BitFlags<Kind>;

/// "Numbery": any value that may be widened to a number.
pub fn numbery() -> KindSet {
    Kind::Boolean | Kind::Integer | Kind::Number
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Identifier(String),
}

fn expected(expect: KindSet, got: Kind) -> RuntimeError {
    RuntimeError::type_mismatch(expect, got)
}

// Factors out the boilerplate in operator method implementations: each
// whitelists the operand patterns that implement it, anything else is a
// runtime TypeMismatch.
macro_rules! operator {
    (un $name:ident ($expect:expr) { $( $p:pat => $e:expr ),+ $(,)? }) => {
        pub fn $name(&self) -> Result<Value> {
            use Value::*;
            match self {
                $($p => Ok($e)),+ ,
                value => Err(expected($expect, value.kind()))
            }
        }
    };

    (bin $name:ident ($expect:expr) { $( $p:pat => $e:expr ),+ $(,)? }) => {
        pub fn $name(&self, other: &Value) -> Result<Value> {
            use Value::*;
            #[allow(unreachable_patterns)]
            match (self, other) {
                $($p => Ok($e)),+ ,
                (a, _) => Err(expected($expect, a.kind()))
            }
        }
    };
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Boolean(_) => Kind::Boolean,
            Value::Integer(_) => Kind::Integer,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Identifier(_) => Kind::Identifier,
        }
    }

    pub fn is_numbery(&self) -> bool {
        numbery().contains(self.kind())
    }

    /// Widen a numbery value to f64, for arithmetic/comparison against a
    /// Number, or as the common representation for mixed int/bool ops.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Integer(i) => Ok(*i as f64),
            Value::Number(n) => Ok(*n),
            v => Err(expected(numbery(), v.kind())),
        }
    }

    /// Widen a numbery value to i64; used by bitwise/shift operators,
    /// which operate on integers only (booleans coerce to 0/1).
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Boolean(b) => Ok(if *b { 1 } else { 0 }),
            Value::Integer(i) => Ok(*i),
            v => Err(expected(Kind::Boolean | Kind::Integer, v.kind())),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            v => Err(expected(Kind::Boolean.into(), v.kind())),
        }
    }

    /// Coerce a value for assignment into a cell of the given kind, per
    /// the assignment contract: exact kind match, or Number accepting any
    /// numbery value. Integer cells never accept Number (no implicit
    /// float-to-int narrowing).
    pub fn coerce(self, kind: Kind) -> Result<Value> {
        match (self, kind) {
            (v, k) if v.kind() == k => Ok(v),
            (v, Kind::Number) if v.is_numbery() => Ok(Value::Number(v.as_f64()?)),
            (v, k) => Err(expected(k.into(), v.kind())),
        }
    }

    operator! { bin add (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) => {
            if let (Value::Integer(a), Value::Integer(b)) = (self, other) {
                Value::Integer(a + b)
            } else {
                Value::Number(self.as_f64()? + other.as_f64()?)
            }
        }
    } }

    operator! { bin sub (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) => {
            if let (Value::Integer(a), Value::Integer(b)) = (self, other) {
                Value::Integer(a - b)
            } else {
                Value::Number(self.as_f64()? - other.as_f64()?)
            }
        }
    } }

    operator! { bin mul (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) => {
            if let (Value::Integer(a), Value::Integer(b)) = (self, other) {
                Value::Integer(a * b)
            } else {
                Value::Number(self.as_f64()? * other.as_f64()?)
            }
        }
    } }

    operator! { bin div (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) => {
            if let (Value::Integer(a), Value::Integer(b)) = (self, other) {
                if *b == 0 {
                    return Err(RuntimeError::Device("division by zero".into()));
                }
                Value::Integer(a / b)
            } else {
                Value::Number(self.as_f64()? / other.as_f64()?)
            }
        }
    } }

    operator! { bin floordiv (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) =>
            Value::Number((self.as_f64()? / other.as_f64()?).floor())
    } }

    operator! { bin modulo (numbery()) {
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) => {
            if let (Value::Integer(a), Value::Integer(b)) = (self, other) {
                if *b == 0 {
                    return Err(RuntimeError::Device("modulo by zero".into()));
                }
                Value::Integer(a % b)
            } else {
                Value::Number(self.as_f64()?.rem_euclid(other.as_f64()?))
            }
        }
    } }

    operator! { bin power (numbery()) {
        (Integer(a), Integer(b)) if *b >= 0 => Value::Integer(a.pow(*b as u32)),
        (Boolean(_), _) | (Integer(_), _) | (Number(_), _) =>
            Value::Number(self.as_f64()?.powf(other.as_f64()?))
    } }

    operator! { un negate (numbery()) {
        Boolean(b)  => Value::Integer(-(*b as i64)),
        Integer(i)  => Value::Integer(-i),
        Number(n)   => Value::Number(-n)
    } }

    operator! { bin bitand (Kind::Boolean | Kind::Integer) {
        (Boolean(_), _) | (Integer(_), _) => Value::Integer(self.as_i64()? & other.as_i64()?)
    } }

    operator! { bin bitor (Kind::Boolean | Kind::Integer) {
        (Boolean(_), _) | (Integer(_), _) => Value::Integer(self.as_i64()? | other.as_i64()?)
    } }

    operator! { bin bitxor (Kind::Boolean | Kind::Integer) {
        (Boolean(_), _) | (Integer(_), _) => Value::Integer(self.as_i64()? ^ other.as_i64()?)
    } }

    operator! { bin shl (Kind::Boolean | Kind::Integer) {
        (Boolean(_), _) | (Integer(_), _) => Value::Integer(self.as_i64()? << other.as_i64()?)
    } }

    operator! { bin shr (Kind::Boolean | Kind::Integer) {
        (Boolean(_), _) | (Integer(_), _) => Value::Integer(self.as_i64()? >> other.as_i64()?)
    } }

    operator! { bin and_ (Kind::Boolean.into()) {
        Boolean(a) => Value::Boolean(*a && other.as_bool()?)
    } }

    operator! { bin or_ (Kind::Boolean.into()) {
        Boolean(a) => Value::Boolean(*a || other.as_bool()?)
    } }

    operator! { un not_ (Kind::Boolean.into()) {
        Boolean(b) => Value::Boolean(!b)
    } }

    pub fn lt(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self.as_f64()? < other.as_f64()?))
    }

    pub fn lte(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self.as_f64()? <= other.as_f64()?))
    }

    pub fn gt(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self.as_f64()? > other.as_f64()?))
    }

    pub fn gte(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self.as_f64()? >= other.as_f64()?))
    }

    pub fn eq_(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self == other))
    }

    pub fn neq(&self, other: &Value) -> Result<Value> {
        Ok(Value::Boolean(self != other))
    }

    /// The canonical textual form used by diagnostics and the broadcast
    /// protocol.
    pub fn format(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => format!("{:.6}", n),
            Value::String(s) => format!("\"{}\"", s),
            Value::Identifier(s) => s.clone(),
        }
    }

    pub fn default_for(kind: Kind) -> Value {
        match kind {
            Kind::Boolean => Value::Boolean(false),
            Kind::Integer => Value::Integer(0),
            Kind::Number => Value::Number(0.0),
            Kind::String => Value::String(String::new()),
            Kind::Identifier => Value::Identifier(String::new()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// A named, typed, mutable cell. A variable's kind is fixed for its
/// entire lifetime; only its content may change.
#[derive(Debug)]
pub struct Variable {
    name: String,
    kind: Kind,
    cell: RefCell<Value>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: Kind) -> Variable {
        Variable {
            name: name.into(),
            kind,
            cell: RefCell::new(Value::default_for(kind)),
        }
    }

    pub fn with_value(name: impl Into<String>, value: Value) -> Variable {
        let kind = value.kind();
        Variable {
            name: name.into(),
            kind,
            cell: RefCell::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Assign per the assignment contract: exact kind match, or a
    /// Number cell accepting any numbery value. Assigning to an
    /// Identifier variable is always an error.
    pub fn assign(&self, value: Value) -> Result<()> {
        if self.kind == Kind::Identifier {
            return Err(RuntimeError::TypeMismatch {
                expected: Kind::Identifier.into(),
                got: value.kind(),
            });
        }
        let coerced = value.coerce(self.kind)?;
        *self.cell.borrow_mut() = coerced;
        Ok(())
    }

    pub fn read(&self) -> Value {
        self.cell.borrow().clone()
    }

    pub fn format(&self) -> String {
        self.cell.borrow().format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_stays_integer() {
        let a = Value::Integer(2);
        let b = Value::Integer(3);
        assert_eq!(a.add(&b).unwrap(), Value::Integer(5));
    }

    #[test]
    fn mixed_addition_widens_to_number() {
        let a = Value::Integer(2);
        let b = Value::Number(1.5);
        assert_eq!(a.add(&b).unwrap(), Value::Number(3.5));
    }

    #[test]
    fn division_by_zero_is_device_error() {
        let a = Value::Integer(1);
        let b = Value::Integer(0);
        assert!(matches!(a.div(&b), Err(RuntimeError::Device(_))));
    }

    #[test]
    fn boolean_and_requires_boolean_operands() {
        let a = Value::Integer(1);
        let b = Value::Boolean(true);
        assert!(matches!(a.and_(&b), Err(RuntimeError::TypeMismatch { .. })));
    }

    #[test]
    fn variable_assignment_contract() {
        let number = Variable::new("x", Kind::Number);
        assert!(number.assign(Value::Integer(3)).is_ok());
        assert_eq!(number.read(), Value::Number(3.0));

        let integer = Variable::new("i", Kind::Integer);
        assert!(integer.assign(Value::Number(1.5)).is_err());
        assert_eq!(integer.read(), Value::Integer(0));

        let id = Variable::new("m", Kind::Identifier);
        assert!(id.assign(Value::Identifier("m".into())).is_err());
    }

    #[test]
    fn number_formats_with_six_places() {
        let v = Value::Number(3.5);
        assert_eq!(v.format(), "3.500000");
    }
}
