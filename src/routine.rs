// A routine is a stable identity shared by every rule and action that
// references it - there is exactly one cursor per routine no matter how
// many places hold an Rc to it, so `RoutineCall`/`AwaitRoutine` against
// an already-running routine only ever step it, never refork it.

use crate::action::{Action, Progress};
use crate::error::Result;
use std::cell::Cell;
use std::rc::Rc;

pub type RoutineRef = Rc<Routine>;

#[derive(Debug)]
pub struct Routine {
    name: String,
    actions: Vec<Action>,
    cursor: Cell<Option<usize>>,
}

impl Routine {
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> RoutineRef {
        Rc::new(Routine {
            name: name.into(),
            actions,
            cursor: Cell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.cursor.get().is_some()
    }

    pub fn start(&self) {
        self.cursor.set(Some(0));
    }

    /// Advance through as many actions as complete within this tick.
    /// Every `Stay` parks the cursor on the same action; `Advance`
    /// proceeds immediately, within the same call, to the next one.
    pub fn step(&self) -> Result<()> {
        loop {
            let i = match self.cursor.get() {
                None => return Ok(()),
                Some(i) => i,
            };
            if i >= self.actions.len() {
                self.cursor.set(None);
                return Ok(());
            }
            match self.actions[i].run()? {
                Progress::Stay => return Ok(()),
                Progress::Advance => self.cursor.set(Some(i + 1)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::value::{Kind, Value, Variable};

    #[test]
    fn runs_to_completion_with_no_blocking_actions() {
        let x = Rc::new(Variable::new("x", Kind::Integer));
        let r = Routine::new(
            "r",
            vec![
                Action::VariableAssignment {
                    var: x.clone(),
                    expr: Expr::IntLit(1),
                },
                Action::VariableAssignment {
                    var: x.clone(),
                    expr: Expr::IntLit(2),
                },
            ],
        );
        r.start();
        r.step().unwrap();
        assert!(!r.is_running());
        assert_eq!(x.read(), Value::Integer(2));
    }

    #[test]
    fn stays_parked_on_a_false_await_condition() {
        let cond = Rc::new(Variable::new("flag", Kind::Boolean));
        let r = Routine::new(
            "r",
            vec![Action::AwaitCondition {
                expr: Expr::Variable(cond.clone()),
            }],
        );
        r.start();
        r.step().unwrap();
        assert!(r.is_running());
        cond.assign(Value::Boolean(true)).unwrap();
        r.step().unwrap();
        assert!(!r.is_running());
    }

    #[test]
    fn never_restarts_a_running_routine() {
        let r = Routine::new(
            "r",
            vec![Action::AwaitCondition {
                expr: Expr::BoolLit(false),
            }],
        );
        r.start();
        r.step().unwrap();
        assert!(r.is_running());
        r.start(); // top-level re-invocation while running is caller's job to reject;
                   // Routine itself just resets, exercised here to document that
                   // RoutineCall/AwaitRoutine never call start() on a running routine.
        assert_eq!(r.is_running(), true);
    }
}
