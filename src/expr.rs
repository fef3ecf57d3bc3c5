// The expression tree. Every node exclusively owns its children - this
// is a tree, not a DAG, and nodes are immutable once built, so there is
// no benefit to reference-counted sharing here (contrast with Variable
// leaves, which *are* shared, via Rc, with the registry that owns them).

use crate::error::{Result, RuntimeError};
use crate::value::{Kind, Value};
use std::rc::Rc;

pub type VarRef = Rc<crate::value::Variable>;

#[derive(Debug)]
pub enum Expr {
    BoolLit(bool),
    IntLit(i64),
    NumberLit(f64),
    StringLit(String),
    IdLit(String),
    Variable(VarRef),
    Property(VarRef),

    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    FloorDiv(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),

    BitAnd(Box<Expr>, Box<Expr>),
    BitOr(Box<Expr>, Box<Expr>),
    BitXor(Box<Expr>, Box<Expr>),
    Shl(Box<Expr>, Box<Expr>),
    Shr(Box<Expr>, Box<Expr>),

    Lt(Box<Expr>, Box<Expr>),
    Lte(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Gte(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Neq(Box<Expr>, Box<Expr>),

    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// The statically known result kind of this node. Computed
    /// structurally; construction via the compiler is expected to have
    /// already validated operand kinds (see `Expr::checked_*`
    /// constructors), so this never fails.
    pub fn kind(&self) -> Kind {
        use Expr::*;
        match self {
            BoolLit(_) => Kind::Boolean,
            IntLit(_) => Kind::Integer,
            NumberLit(_) => Kind::Number,
            StringLit(_) => Kind::String,
            IdLit(_) => Kind::Identifier,
            Variable(v) => v.kind(),
            Property(v) => v.kind(),
            Add(l, r) | Sub(l, r) | Mul(l, r) => {
                if l.kind() == Kind::Integer && r.kind() == Kind::Integer {
                    Kind::Integer
                } else {
                    Kind::Number
                }
            }
            Div(_, _) | FloorDiv(_, _) | Mod(_, _) | Pow(l, r) => {
                if let Pow(_, _) = self {
                    if l.kind() == Kind::Integer && r.kind() == Kind::Integer {
                        return Kind::Integer;
                    }
                }
                Kind::Number
            }
            Negate(e) => e.kind(),
            BitAnd(_, _) | BitOr(_, _) | BitXor(_, _) | Shl(_, _) | Shr(_, _) => Kind::Integer,
            Lt(_, _) | Lte(_, _) | Gt(_, _) | Gte(_, _) | Eq(_, _) | Neq(_, _) => Kind::Boolean,
            And(_, _) | Or(_, _) | Not(_) => Kind::Boolean,
        }
    }

    /// Evaluate this node to a runtime value.
    pub fn evaluate(&self) -> Result<Value> {
        use Expr::*;
        match self {
            BoolLit(b) => Ok(Value::Boolean(*b)),
            IntLit(i) => Ok(Value::Integer(*i)),
            NumberLit(n) => Ok(Value::Number(*n)),
            StringLit(s) => Ok(Value::String(s.clone())),
            IdLit(s) => Ok(Value::Identifier(s.clone())),
            Variable(v) => Ok(v.read()),
            Property(v) => Ok(v.read()),
            Add(l, r) => l.evaluate()?.add(&r.evaluate()?),
            Sub(l, r) => l.evaluate()?.sub(&r.evaluate()?),
            Mul(l, r) => l.evaluate()?.mul(&r.evaluate()?),
            Div(l, r) => l.evaluate()?.div(&r.evaluate()?),
            FloorDiv(l, r) => l.evaluate()?.floordiv(&r.evaluate()?),
            Mod(l, r) => l.evaluate()?.modulo(&r.evaluate()?),
            Pow(l, r) => l.evaluate()?.power(&r.evaluate()?),
            Negate(e) => e.evaluate()?.negate(),
            BitAnd(l, r) => l.evaluate()?.bitand(&r.evaluate()?),
            BitOr(l, r) => l.evaluate()?.bitor(&r.evaluate()?),
            BitXor(l, r) => l.evaluate()?.bitxor(&r.evaluate()?),
            Shl(l, r) => l.evaluate()?.shl(&r.evaluate()?),
            Shr(l, r) => l.evaluate()?.shr(&r.evaluate()?),
            Lt(l, r) => l.evaluate()?.lt(&r.evaluate()?),
            Lte(l, r) => l.evaluate()?.lte(&r.evaluate()?),
            Gt(l, r) => l.evaluate()?.gt(&r.evaluate()?),
            Gte(l, r) => l.evaluate()?.gte(&r.evaluate()?),
            Eq(l, r) => l.evaluate()?.eq_(&r.evaluate()?),
            Neq(l, r) => l.evaluate()?.neq(&r.evaluate()?),
            And(l, r) => l.evaluate()?.and_(&r.evaluate()?),
            Or(l, r) => l.evaluate()?.or_(&r.evaluate()?),
            Not(e) => e.evaluate()?.not_(),
        }
    }

    /// Evaluate and require a boolean result; used for rule conditions
    /// and `AwaitCondition` actions.
    pub fn evaluate_bool(&self) -> Result<bool> {
        self.evaluate()?.as_bool().map_err(|_| RuntimeError::TypeMismatch {
            expected: Kind::Boolean.into(),
            got: self.kind(),
        })
    }
}
