use crate::error::Result;
use crate::expr::Expr;
use crate::routine::RoutineRef;

/// A (condition, routine) pair, evaluated every tick. A rule never
/// restarts a routine that is already running - it only starts it on
/// the idle-to-true transition, then steps it regardless.
#[derive(Debug)]
pub struct Rule {
    pub condition: Expr,
    pub routine: RoutineRef,
}

impl Rule {
    pub fn new(condition: Expr, routine: RoutineRef) -> Rule {
        Rule { condition, routine }
    }

    pub fn tick(&self) -> Result<()> {
        if self.condition.evaluate_bool()? && !self.routine.is_running() {
            self.routine.start();
        }
        self.routine.step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::routine::Routine;
    use crate::value::{Kind, Value, Variable};
    use std::rc::Rc;

    #[test]
    fn restarts_only_after_completion() {
        let flag = Rc::new(Variable::new("flag", Kind::Boolean));
        flag.assign(Value::Boolean(true)).unwrap();
        let counter = Rc::new(Variable::new("n", Kind::Integer));

        let routine = Routine::new(
            "bump",
            vec![Action::VariableAssignment {
                var: counter.clone(),
                expr: Expr::Add(
                    Box::new(Expr::Variable(counter.clone())),
                    Box::new(Expr::IntLit(1)),
                ),
            }],
        );
        let rule = Rule::new(Expr::Variable(flag.clone()), routine);

        rule.tick().unwrap();
        rule.tick().unwrap();
        rule.tick().unwrap();
        assert_eq!(counter.read(), Value::Integer(3));
    }
}
