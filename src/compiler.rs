// The statement processor: a pure translation from parsed syntax
// references to compiled expression/action trees and registry
// mutations. Name resolution is single-pass and eager - every
// referenced module, variable, or routine must already exist when its
// use is compiled.

use crate::action::Action;
use crate::error::{Result, RuntimeError};
use crate::expr::Expr;
use crate::module::{InputSource, Module, ModuleRef, VecChannel};
use crate::parser::{self, BinOp as POp, ParsedExpr, ParsedStatement};
use crate::registry::Registry;
use crate::routine::Routine;
use crate::rule::Rule;
use crate::value::{numbery, Kind, Value};
use std::rc::Rc;
use tracing::{debug, instrument};

#[derive(Debug)]
struct NullSource;

impl InputSource for NullSource {
    fn read(&self) -> bool {
        false
    }
}

pub struct Compiler<'a> {
    registry: &'a mut Registry,
    anon_counter: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a mut Registry) -> Compiler<'a> {
        Compiler { registry, anon_counter: 0 }
    }

    /// Parse and compile a single line, returning a diagnostic payload
    /// when the line was a bare expression statement.
    #[instrument(skip(self))]
    pub fn compile_line(&mut self, line: &str) -> Result<Option<String>> {
        let stmt = parser::parse_line(line)?;
        self.compile_statement(stmt)
    }

    fn compile_statement(&mut self, stmt: ParsedStatement) -> Result<Option<String>> {
        match stmt {
            ParsedStatement::Expression(e) => {
                let expr = self.build_expr(&e)?;
                Ok(Some(expr.evaluate()?.format()))
            }
            ParsedStatement::Constructor { name, expander, type_name, args } => {
                self.compile_constructor(name, expander, type_name, args)?;
                Ok(None)
            }
            ParsedStatement::MethodCall { target, method, args } => {
                let module = self.registry.module(&target)?;
                let values = self.evaluate_all(&args)?;
                if method == "shadow" {
                    return self.compile_shadow(&module, &args).map(|_| None);
                }
                module.call_with_shadows(&method, &values)?;
                Ok(None)
            }
            ParsedStatement::RoutineCallStmt(name) => {
                let routine = self.registry.routine(&name)?;
                if routine.is_running() {
                    return Err(RuntimeError::AlreadyRunning(name));
                }
                routine.start();
                Ok(None)
            }
            ParsedStatement::PropertyAssignment { target, property, expr } => {
                let module = self.registry.module(&target)?;
                let e = self.build_expr(&expr)?;
                module.write_property(&property, &e)?;
                Ok(None)
            }
            ParsedStatement::VariableAssignment { name, expr } => {
                let var = self.registry.variable(&name)?;
                let e = self.build_expr(&expr)?;
                var.assign(e.evaluate()?)?;
                Ok(None)
            }
            ParsedStatement::VariableDecl { type_name, name, init } => {
                let kind = kind_of(&type_name)?;
                let var = Rc::new(crate::value::Variable::new(name.clone(), kind));
                self.registry.add_variable(var.clone())?;
                if let Some(e) = init {
                    let expr = self.build_expr(&e)?;
                    var.assign(expr.evaluate()?)?;
                }
                Ok(None)
            }
            ParsedStatement::RoutineDef { name, actions } => {
                let actions: Result<Vec<Action>> =
                    actions.into_iter().map(|a| self.build_action(a)).collect();
                let routine = Routine::new(name, actions?);
                self.registry.add_routine(routine)?;
                Ok(None)
            }
            ParsedStatement::RuleDef { condition, actions } => {
                let cond = self.build_expr(&condition)?;
                if cond.kind() != Kind::Boolean {
                    return Err(RuntimeError::TypeMismatch {
                        expected: Kind::Boolean.into(),
                        got: cond.kind(),
                    });
                }
                let actions: Result<Vec<Action>> =
                    actions.into_iter().map(|a| self.build_action(a)).collect();
                self.anon_counter += 1;
                let routine = Routine::new(format!("__rule_{}", self.anon_counter), actions?);
                self.registry.add_rule(Rule::new(cond, routine));
                Ok(None)
            }
            ParsedStatement::Await(_) | ParsedStatement::AwaitRoutine(_) => {
                Err(RuntimeError::Parse {
                    location: String::new(),
                    message: "await is only valid inside a routine or rule body".to_string(),
                })
            }
        }
    }

    fn build_action(&mut self, stmt: ParsedStatement) -> Result<Action> {
        match stmt {
            ParsedStatement::MethodCall { target, method, args } => {
                let module = self.registry.module(&target)?;
                let args: Result<Vec<Expr>> = args.iter().map(|a| self.build_expr(a)).collect();
                Ok(Action::MethodCall { module, method, args: args? })
            }
            ParsedStatement::PropertyAssignment { target, property, expr } => {
                let module = self.registry.module(&target)?;
                let expr = self.build_expr(&expr)?;
                Ok(Action::PropertyAssignment { module, property, expr })
            }
            ParsedStatement::VariableAssignment { name, expr } => {
                let var = self.registry.variable(&name)?;
                let expr = self.build_expr(&expr)?;
                Ok(Action::VariableAssignment { var, expr })
            }
            ParsedStatement::RoutineCallStmt(name) => {
                let routine = self.registry.routine(&name)?;
                Ok(Action::RoutineCall { routine })
            }
            ParsedStatement::Await(e) => {
                let expr = self.build_expr(&e)?;
                if expr.kind() != Kind::Boolean {
                    return Err(RuntimeError::TypeMismatch {
                        expected: Kind::Boolean.into(),
                        got: expr.kind(),
                    });
                }
                Ok(Action::AwaitCondition { expr })
            }
            ParsedStatement::AwaitRoutine(name) => {
                let routine = self.registry.routine(&name)?;
                Ok(Action::await_routine(routine))
            }
            other => Err(RuntimeError::Parse {
                location: String::new(),
                message: format!("'{:?}' is not valid inside an action body", other),
            }),
        }
    }

    fn evaluate_all(&mut self, exprs: &[ParsedExpr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| Ok(self.build_expr(e)?.evaluate()?)).collect()
    }

    fn compile_shadow(&mut self, module: &ModuleRef, args: &[ParsedExpr]) -> Result<()> {
        if args.len() != 1 {
            return Err(RuntimeError::ArityMismatch { expected: 1, got: args.len() });
        }
        let other_name = match &args[0] {
            ParsedExpr::Id(name) => name.clone(),
            _ => {
                return Err(RuntimeError::Parse {
                    location: String::new(),
                    message: "shadow() expects a bare module name".to_string(),
                })
            }
        };
        let other = self.registry.module(&other_name)?;
        module.shadow(&other)
    }

    fn compile_constructor(
        &mut self,
        name: String,
        expander: Option<String>,
        type_name: String,
        args: Vec<ParsedExpr>,
    ) -> Result<()> {
        let values = self.evaluate_all(&args)?;

        let module = if let Some(expander_name) = expander {
            let expander_module = self.registry.module(&expander_name)?;
            Module::proxy(name.clone(), expander_module, &type_name, &values)?
        } else {
            match type_name.as_str() {
                "Core" => {
                    expect_arity(&values, 0)?;
                    Module::core(name.clone())
                }
                "Output" => {
                    expect_arity(&values, 1)?;
                    let pin = self.require_integer(&values[0])?;
                    let m = Module::output(name.clone());
                    m.define_property("pin", Value::Integer(pin));
                    m
                }
                "Input" => {
                    expect_arity(&values, 1)?;
                    let pin = self.require_integer(&values[0])?;
                    let m = Module::input(name.clone(), Rc::new(NullSource));
                    m.define_property("pin", Value::Integer(pin));
                    m
                }
                "Can" => {
                    expect_arity(&values, 0)?;
                    Module::can(name.clone())
                }
                "Expander" => {
                    expect_arity(&values, 0)?;
                    Module::expander(name.clone(), Rc::new(VecChannel::default()))
                }
                other => {
                    return Err(RuntimeError::UnknownName(other.to_string()));
                }
            }
        };
        debug!(module = %name, kind = %module.kind(), "constructed module");
        self.registry.add_module(module)
    }

    fn require_integer(&self, v: &Value) -> Result<i64> {
        v.as_i64()
    }

    fn build_expr(&mut self, e: &ParsedExpr) -> Result<Expr> {
        match e {
            ParsedExpr::Bool(b) => Ok(Expr::BoolLit(*b)),
            ParsedExpr::Int(i) => Ok(Expr::IntLit(*i)),
            ParsedExpr::Number(n) => Ok(Expr::NumberLit(*n)),
            ParsedExpr::Str(s) => Ok(Expr::StringLit(s.clone())),
            ParsedExpr::Id(name) => {
                let var = self.registry.variable(name)?;
                Ok(Expr::Variable(var))
            }
            ParsedExpr::Dot(target, field) => {
                let module = self.registry.module(target)?;
                let var = module.get_property(field)?;
                Ok(Expr::Property(var))
            }
            ParsedExpr::Negate(inner) => {
                let e = self.build_expr(inner)?;
                require(e.kind(), numbery())?;
                Ok(Expr::Negate(Box::new(e)))
            }
            ParsedExpr::Not(inner) => {
                let e = self.build_expr(inner)?;
                require(e.kind(), Kind::Boolean.into())?;
                Ok(Expr::Not(Box::new(e)))
            }
            ParsedExpr::Binary(op, l, r) => self.build_binary(*op, l, r),
        }
    }

    fn build_binary(&mut self, op: POp, l: &ParsedExpr, r: &ParsedExpr) -> Result<Expr> {
        let l = self.build_expr(l)?;
        let r = self.build_expr(r)?;
        use POp::*;
        match op {
            Add | Sub | Mul | Div | FloorDiv | Mod | Pow => {
                require(l.kind(), numbery())?;
                require(r.kind(), numbery())?;
                Ok(match op {
                    Add => Expr::Add(Box::new(l), Box::new(r)),
                    Sub => Expr::Sub(Box::new(l), Box::new(r)),
                    Mul => Expr::Mul(Box::new(l), Box::new(r)),
                    Div => Expr::Div(Box::new(l), Box::new(r)),
                    FloorDiv => Expr::FloorDiv(Box::new(l), Box::new(r)),
                    Mod => Expr::Mod(Box::new(l), Box::new(r)),
                    Pow => Expr::Pow(Box::new(l), Box::new(r)),
                    _ => unreachable!(),
                })
            }
            BitAnd | BitOr | BitXor | Shl | Shr => {
                let intset = Kind::Boolean | Kind::Integer;
                require(l.kind(), intset)?;
                require(r.kind(), intset)?;
                Ok(match op {
                    BitAnd => Expr::BitAnd(Box::new(l), Box::new(r)),
                    BitOr => Expr::BitOr(Box::new(l), Box::new(r)),
                    BitXor => Expr::BitXor(Box::new(l), Box::new(r)),
                    Shl => Expr::Shl(Box::new(l), Box::new(r)),
                    Shr => Expr::Shr(Box::new(l), Box::new(r)),
                    _ => unreachable!(),
                })
            }
            Lt | Lte | Gt | Gte | Eq | Neq => {
                require(l.kind(), numbery())?;
                require(r.kind(), numbery())?;
                Ok(match op {
                    Lt => Expr::Lt(Box::new(l), Box::new(r)),
                    Lte => Expr::Lte(Box::new(l), Box::new(r)),
                    Gt => Expr::Gt(Box::new(l), Box::new(r)),
                    Gte => Expr::Gte(Box::new(l), Box::new(r)),
                    Eq => Expr::Eq(Box::new(l), Box::new(r)),
                    Neq => Expr::Neq(Box::new(l), Box::new(r)),
                    _ => unreachable!(),
                })
            }
            And | Or => {
                require(l.kind(), Kind::Boolean.into())?;
                require(r.kind(), Kind::Boolean.into())?;
                Ok(match op {
                    And => Expr::And(Box::new(l), Box::new(r)),
                    Or => Expr::Or(Box::new(l), Box::new(r)),
                    _ => unreachable!(),
                })
            }
        }
    }
}

fn require(got: Kind, expect: crate::value::KindSet) -> Result<()> {
    if expect.contains(got) {
        Ok(())
    } else {
        Err(RuntimeError::TypeMismatch { expected: expect, got })
    }
}

fn expect_arity(values: &[Value], n: usize) -> Result<()> {
    if values.len() == n {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch { expected: n, got: values.len() })
    }
}

fn kind_of(type_name: &str) -> Result<Kind> {
    match type_name {
        "boolean" => Ok(Kind::Boolean),
        "integer" => Ok(Kind::Integer),
        "number" => Ok(Kind::Number),
        "string" => Ok(Kind::String),
        other => Err(RuntimeError::UnknownName(other.to_string())),
    }
}
