// A routine is an ordered list of these. Each either completes within
// the tick it runs (Advance) or parks the routine's cursor on itself
// for another attempt next tick (Stay).

use crate::error::Result;
use crate::expr::{Expr, VarRef};
use crate::module::ModuleRef;
use crate::routine::RoutineRef;
use crate::value::Value;
use std::cell::Cell;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    Advance,
    Stay,
}

#[derive(Debug)]
pub enum Action {
    MethodCall {
        module: ModuleRef,
        method: String,
        args: Vec<Expr>,
    },
    PropertyAssignment {
        module: ModuleRef,
        property: String,
        expr: Expr,
    },
    VariableAssignment {
        var: VarRef,
        expr: Expr,
    },
    AwaitCondition {
        expr: Expr,
    },
    AwaitRoutine {
        routine: RoutineRef,
        started: Cell<bool>,
    },
    RoutineCall {
        routine: RoutineRef,
    },
}

impl Action {
    pub fn await_routine(routine: RoutineRef) -> Action {
        Action::AwaitRoutine {
            routine,
            started: Cell::new(false),
        }
    }

    pub fn run(&self) -> Result<Progress> {
        match self {
            Action::MethodCall { module, method, args } => {
                let values: Result<Vec<Value>> = args.iter().map(|e| e.evaluate()).collect();
                module.call_with_shadows(method, &values?)?;
                Ok(Progress::Advance)
            }
            Action::PropertyAssignment { module, property, expr } => {
                module.write_property(property, expr)?;
                Ok(Progress::Advance)
            }
            Action::VariableAssignment { var, expr } => {
                var.assign(expr.evaluate()?)?;
                Ok(Progress::Advance)
            }
            Action::AwaitCondition { expr } => {
                if expr.evaluate_bool()? {
                    Ok(Progress::Advance)
                } else {
                    Ok(Progress::Stay)
                }
            }
            Action::AwaitRoutine { routine, started } => {
                if !started.get() {
                    routine.start();
                    started.set(true);
                }
                routine.step()?;
                if routine.is_running() {
                    Ok(Progress::Stay)
                } else {
                    started.set(false);
                    Ok(Progress::Advance)
                }
            }
            Action::RoutineCall { routine } => {
                if !routine.is_running() {
                    routine.start();
                }
                Ok(Progress::Advance)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::routine::Routine;
    use crate::value::{Kind, Variable};
    use std::rc::Rc;

    #[test]
    fn await_condition_stays_until_true() {
        let x = Rc::new(Variable::new("x", Kind::Integer));
        let a = Action::AwaitCondition {
            expr: Expr::Gt(
                Box::new(Expr::Variable(x.clone())),
                Box::new(Expr::IntLit(3)),
            ),
        };
        assert_eq!(a.run().unwrap(), Progress::Stay);
        x.assign(Value::Integer(4)).unwrap();
        assert_eq!(a.run().unwrap(), Progress::Advance);
    }

    #[test]
    fn method_call_dispatches_to_module() {
        let m = Module::output("lamp");
        let a = Action::MethodCall {
            module: m.clone(),
            method: "on".into(),
            args: vec![],
        };
        assert_eq!(a.run().unwrap(), Progress::Advance);
        assert_eq!(m.get_property("state").unwrap().read(), Value::Boolean(true));
    }

    #[test]
    fn await_routine_advances_only_when_inner_finishes() {
        let x = Rc::new(Variable::new("x", Kind::Integer));
        let inner = Routine::new(
            "inner",
            vec![Action::VariableAssignment {
                var: x.clone(),
                expr: Expr::IntLit(9),
            }],
        );
        let a = Action::await_routine(inner);
        assert_eq!(a.run().unwrap(), Progress::Advance);
        assert_eq!(x.read(), Value::Integer(9));
    }
}
