// The process-wide namespace: modules, variables, and routines share a
// single name space (registering a module also defines an identifier
// variable of the same name), plus an ordered list of rules. Unlike the
// original, which only checked a new name against the map it was being
// inserted into, every insert here is checked against the union of all
// three maps - see DESIGN.md.

use crate::error::{Result, RuntimeError};
use crate::expr::VarRef;
use crate::module::ModuleRef;
use crate::routine::RoutineRef;
use crate::rule::Rule;
use crate::value::{Value, Variable};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
pub struct Registry {
    modules: HashMap<String, ModuleRef>,
    module_order: Vec<String>,
    variables: HashMap<String, VarRef>,
    routines: HashMap<String, RoutineRef>,
    routine_order: Vec<String>,
    rules: Vec<Rule>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.modules.contains_key(name) || self.variables.contains_key(name) || self.routines.contains_key(name)
    }

    pub fn add_module(&mut self, module: ModuleRef) -> Result<()> {
        if self.name_taken(module.name()) {
            return Err(RuntimeError::Duplicate(module.name().to_string()));
        }
        let name = module.name().to_string();
        let identity = Rc::new(Variable::with_value(name.clone(), Value::Identifier(name.clone())));
        self.variables.insert(name.clone(), identity);
        self.module_order.push(name.clone());
        self.modules.insert(name, module);
        Ok(())
    }

    pub fn add_variable(&mut self, var: VarRef) -> Result<()> {
        if self.name_taken(var.name()) {
            return Err(RuntimeError::Duplicate(var.name().to_string()));
        }
        self.variables.insert(var.name().to_string(), var);
        Ok(())
    }

    pub fn add_routine(&mut self, routine: RoutineRef) -> Result<()> {
        if self.name_taken(routine.name()) {
            return Err(RuntimeError::Duplicate(routine.name().to_string()));
        }
        self.routine_order.push(routine.name().to_string());
        self.routines.insert(routine.name().to_string(), routine);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn module(&self, name: &str) -> Result<ModuleRef> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownName(name.to_string()))
    }

    pub fn variable(&self, name: &str) -> Result<VarRef> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownName(name.to_string()))
    }

    pub fn routine(&self, name: &str) -> Result<RoutineRef> {
        self.routines
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownName(name.to_string()))
    }

    /// Modules in registration order, for the scheduler's per-tick
    /// step pass.
    pub fn modules_in_order(&self) -> impl Iterator<Item = &ModuleRef> {
        self.module_order.iter().map(move |n| &self.modules[n])
    }

    pub fn routines_in_order(&self) -> impl Iterator<Item = &RoutineRef> {
        self.routine_order.iter().map(move |n| &self.routines[n])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::value::Kind;

    #[test]
    fn duplicate_name_rejected_across_maps() {
        let mut reg = Registry::new();
        reg.add_module(Module::output("thing")).unwrap();
        let dup = Rc::new(Variable::new("thing", Kind::Integer));
        assert!(matches!(reg.add_variable(dup), Err(RuntimeError::Duplicate(_))));
    }

    #[test]
    fn registering_a_module_defines_an_identifier_variable() {
        let mut reg = Registry::new();
        reg.add_module(Module::output("lamp")).unwrap();
        assert_eq!(reg.variable("lamp").unwrap().read(), Value::Identifier("lamp".into()));
    }

    #[test]
    fn modules_step_in_registration_order() {
        let mut reg = Registry::new();
        reg.add_module(Module::output("a")).unwrap();
        reg.add_module(Module::output("b")).unwrap();
        let names: Vec<&str> = reg.modules_in_order().map(|m| m.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
