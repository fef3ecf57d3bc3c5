// Modules: a closed, finite set of module variants modeled as a tagged
// sum. The `kind` tag drives constructor argument type-checking and
// shadow compatibility; dispatch for step/call/property access happens
// through plain match on `extra`, not a trait object - there are few
// enough variants that a dispatch table buys nothing over a match.

use crate::error::{Result, RuntimeError};
use crate::expr::{Expr, VarRef};
use crate::proxy;
use crate::value::{Kind, Value, Variable};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type ModuleRef = Rc<Module>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Core,
    Output,
    Input,
    Can,
    Expander,
    Proxy,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ModuleKind::Core => "core",
            ModuleKind::Output => "output",
            ModuleKind::Input => "input",
            ModuleKind::Can => "can",
            ModuleKind::Expander => "expander",
            ModuleKind::Proxy => "proxy",
        };
        write!(f, "{}", s)
    }
}

/// A remote peer's outbound wire, as seen by an Expander. Production
/// deployments hand in a real UART/BLE writer; tests use `VecChannel`.
pub trait ByteChannel: fmt::Debug {
    fn write_line(&self, line: &str);
}

#[derive(Debug, Default)]
pub struct VecChannel {
    pub lines: RefCell<Vec<String>>,
}

impl ByteChannel for VecChannel {
    fn write_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// An external collaborator an Input module polls on each step. Kept
/// abstract since concrete sensors are out of scope for this crate.
pub trait InputSource: fmt::Debug {
    fn read(&self) -> bool;
}

#[derive(Debug)]
pub enum Extra {
    None,
    Input(Rc<dyn InputSource>),
    Expander(Rc<dyn ByteChannel>),
    Proxy { expander: ModuleRef, remote: String },
}

#[derive(Debug)]
pub struct Module {
    name: String,
    kind: ModuleKind,
    properties: RefCell<HashMap<String, VarRef>>,
    property_order: RefCell<Vec<String>>,
    shadows: RefCell<Vec<ModuleRef>>,
    output_on: Cell<bool>,
    broadcast: Cell<bool>,
    extra: Extra,
}

impl Module {
    fn new(name: impl Into<String>, kind: ModuleKind, extra: Extra) -> Module {
        Module {
            name: name.into(),
            kind,
            properties: RefCell::new(HashMap::new()),
            property_order: RefCell::new(Vec::new()),
            shadows: RefCell::new(Vec::new()),
            output_on: Cell::new(false),
            broadcast: Cell::new(false),
            extra,
        }
    }

    pub fn core(name: impl Into<String>) -> ModuleRef {
        let m = Module::new(name, ModuleKind::Core, Extra::None);
        m.define_property("debug", Value::Boolean(false));
        m.define_property("time", Value::Number(0.0));
        Rc::new(m)
    }

    pub fn output(name: impl Into<String>) -> ModuleRef {
        let m = Module::new(name, ModuleKind::Output, Extra::None);
        m.define_property("state", Value::Boolean(false));
        Rc::new(m)
    }

    pub fn input(name: impl Into<String>, source: Rc<dyn InputSource>) -> ModuleRef {
        let m = Module::new(name, ModuleKind::Input, Extra::Input(source));
        m.define_property("state", Value::Boolean(false));
        Rc::new(m)
    }

    pub fn can(name: impl Into<String>) -> ModuleRef {
        Rc::new(Module::new(name, ModuleKind::Can, Extra::None))
    }

    pub fn expander(name: impl Into<String>, channel: Rc<dyn ByteChannel>) -> ModuleRef {
        Rc::new(Module::new(name, ModuleKind::Expander, Extra::Expander(channel)))
    }

    /// Construct a proxy for a module of `type_name` living on the
    /// other side of `expander`'s byte channel. The proxy shares its
    /// own name with the remote instance, mirroring how a script
    /// replayed verbatim on both ends names the same module twice.
    /// `expander` must itself be a module of kind `Expander`.
    pub fn proxy(
        name: impl Into<String>,
        expander: ModuleRef,
        type_name: &str,
        args: &[Value],
    ) -> Result<ModuleRef> {
        if expander.kind != ModuleKind::Expander {
            return Err(RuntimeError::TypeMismatch {
                expected: Kind::Identifier.into(),
                got: Kind::Identifier,
            });
        }
        let name = name.into();
        let m = Rc::new(Module::new(
            name.clone(),
            ModuleKind::Proxy,
            Extra::Proxy { expander, remote: name },
        ));
        proxy::emit_constructor(&m, type_name, args);
        Ok(m)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    pub fn define_property(&self, name: impl Into<String>, default: Value) -> VarRef {
        let name = name.into();
        let var = Rc::new(Variable::with_value(name.clone(), default));
        self.property_order.borrow_mut().push(name.clone());
        self.properties.borrow_mut().insert(name, var.clone());
        var
    }

    pub fn get_property(&self, name: &str) -> Result<VarRef> {
        self.properties
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownProperty {
                module: self.name.clone(),
                property: name.to_string(),
            })
    }

    pub fn write_property(&self, name: &str, expr: &Expr) -> Result<()> {
        let value = expr.evaluate()?;
        if self.kind == ModuleKind::Proxy {
            proxy::emit_write(self, name, &value)?;
        }
        if let Ok(var) = self.get_property(name) {
            var.assign(value)
        } else {
            // Proxies create properties on demand; every other kind
            // requires the property to pre-exist.
            if self.kind == ModuleKind::Proxy {
                self.define_property(name, value);
                Ok(())
            } else {
                Err(RuntimeError::UnknownProperty {
                    module: self.name.clone(),
                    property: name.to_string(),
                })
            }
        }
    }

    /// Inbound broadcast handling: `!!<module>.<prop>=<value>` lines
    /// route here for proxies, creating properties on demand with the
    /// kind inferred from the incoming textual value (§9: fixed once
    /// inferred, never re-inferred thereafter).
    pub fn receive_broadcast(&self, name: &str, value: Value) -> Result<()> {
        match self.properties.borrow().get(name) {
            Some(var) => var.assign(value),
            None => {
                drop(self.properties.borrow());
                self.define_property(name, value);
                Ok(())
            }
        }
    }

    /// The four built-ins every module understands, plus
    /// kind-specific methods. Does not recurse into shadows; see
    /// `call_with_shadows`.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<()> {
        match method {
            "mute" => {
                self.output_on.set(false);
                Ok(())
            }
            "unmute" => {
                self.output_on.set(true);
                Ok(())
            }
            "broadcast" => {
                self.broadcast.set(true);
                Ok(())
            }
            _ => self.call_kind_specific(method, args),
        }
    }

    fn call_kind_specific(&self, method: &str, args: &[Value]) -> Result<()> {
        if self.kind == ModuleKind::Proxy {
            proxy::emit_call(self, method, args)?;
        }
        match (self.kind, method) {
            (ModuleKind::Output, "on") => self.set_state(true),
            (ModuleKind::Output, "off") => self.set_state(false),
            (ModuleKind::Output, "toggle") => {
                let cur = self.get_property("state")?.read().as_bool()?;
                self.set_state(!cur)
            }
            (ModuleKind::Proxy, _) => Ok(()),
            _ => Err(RuntimeError::UnknownMethod {
                module: self.name.clone(),
                method: method.to_string(),
            }),
        }
    }

    fn set_state(&self, on: bool) -> Result<()> {
        self.get_property("state")?.assign(Value::Boolean(on))
    }

    /// Dispatch `method` on self, then mirror the call to every shadow
    /// in insertion order. Property reads/writes are never shadowed.
    pub fn call_with_shadows(&self, method: &str, args: &[Value]) -> Result<()> {
        self.call(method, args)?;
        for shadow in self.shadows.borrow().iter() {
            shadow.call(method, args)?;
        }
        Ok(())
    }

    /// Append `other` to this module's shadow list. Rejects a shadow of
    /// a different kind, rejects shadowing self, and rejects indirect
    /// cycles (an improvement over the original, which only rejected
    /// the direct self-shadow case - see DESIGN.md).
    pub fn shadow(&self, other: &ModuleRef) -> Result<()> {
        if other.kind != self.kind {
            return Err(RuntimeError::TypeMismatch {
                expected: Kind::Identifier.into(),
                got: Kind::Identifier,
            });
        }
        if std::ptr::eq(self, other.as_ref()) || other.reaches(self) {
            return Err(RuntimeError::TypeMismatch {
                expected: Kind::Identifier.into(),
                got: Kind::Identifier,
            });
        }
        self.shadows.borrow_mut().push(other.clone());
        Ok(())
    }

    /// True if `target` is reachable from `self` through the shadow
    /// graph (used for cycle detection in `shadow`).
    fn reaches(&self, target: &Module) -> bool {
        for s in self.shadows.borrow().iter() {
            if std::ptr::eq(s.as_ref(), target) || s.reaches(target) {
                return true;
            }
        }
        false
    }

    /// Default per-tick behavior: emit a diagnostic line when output is
    /// on, and independently emit a broadcast line when broadcasting -
    /// these are two distinct payload kinds and either can be toggled
    /// without affecting the other. Kind-specific polling (e.g. Input
    /// reading its source) happens first.
    pub fn step(&self) -> Result<Vec<String>> {
        if let Extra::Input(source) = &self.extra {
            self.get_property("state")?.assign(Value::Boolean(source.read()))?;
        }
        let mut lines = Vec::new();
        if self.output_on.get() {
            lines.push(self.format_output());
        }
        if self.broadcast.get() {
            lines.push(self.format_broadcast());
        }
        Ok(lines)
    }

    /// Plain space-joined property values, in definition order - the
    /// diagnostic form used by `output_on`.
    fn format_output(&self) -> String {
        let props = self.properties.borrow();
        let order = self.property_order.borrow();
        order
            .iter()
            .filter_map(|name| props.get(name).map(|v| v.format()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The `!!<module>.<prop>=<value>;…` wire form used by `broadcast`.
    fn format_broadcast(&self) -> String {
        let props = self.properties.borrow();
        let order = self.property_order.borrow();
        let body: Vec<String> = order
            .iter()
            .filter_map(|name| props.get(name).map(|v| format!("{}={}", name, v.format())))
            .collect();
        format!("!!{}.{}", self.name, body.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_defines_debug_and_time_properties() {
        let m = Module::core("core");
        assert_eq!(m.get_property("debug").unwrap().read(), Value::Boolean(false));
        assert_eq!(m.get_property("time").unwrap().read(), Value::Number(0.0));
    }

    #[test]
    fn output_on_off_toggle() {
        let m = Module::output("lamp");
        m.call("on", &[]).unwrap();
        assert_eq!(m.get_property("state").unwrap().read(), Value::Boolean(true));
        m.call("toggle", &[]).unwrap();
        assert_eq!(m.get_property("state").unwrap().read(), Value::Boolean(false));
    }

    #[test]
    fn unknown_method_is_an_error() {
        let m = Module::output("lamp");
        assert!(matches!(
            m.call("spin", &[]),
            Err(RuntimeError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn shadow_mirrors_calls_in_order() {
        let a = Module::output("a");
        let b = Module::output("b");
        a.shadow(&b).unwrap();
        a.call_with_shadows("on", &[]).unwrap();
        assert_eq!(b.get_property("state").unwrap().read(), Value::Boolean(true));
    }

    #[test]
    fn shadow_rejects_self() {
        let a = Module::output("a");
        assert!(a.shadow(&a).is_err());
    }

    #[test]
    fn shadow_rejects_indirect_cycles() {
        let a = Module::output("a");
        let b = Module::output("b");
        a.shadow(&b).unwrap();
        assert!(b.shadow(&a).is_err());
    }

    #[test]
    fn shadow_rejects_mismatched_kind() {
        let a = Module::output("a");
        let b = Module::can("b");
        assert!(a.shadow(&b).is_err());
    }

    #[test]
    fn output_on_and_broadcast_emit_distinct_lines() {
        let m = Module::output("lamp");
        m.call("on", &[]).unwrap();
        m.call("unmute", &[]).unwrap();
        let lines = m.step().unwrap();
        assert_eq!(lines, vec!["true".to_string()]);

        m.call("broadcast", &[]).unwrap();
        let lines = m.step().unwrap();
        assert_eq!(lines, vec!["true".to_string(), "!!lamp.state=true".to_string()]);
    }

    #[test]
    fn muted_module_emits_only_the_broadcast_line() {
        let m = Module::output("lamp");
        m.call("on", &[]).unwrap();
        m.call("broadcast", &[]).unwrap();
        let lines = m.step().unwrap();
        assert_eq!(lines, vec!["!!lamp.state=true".to_string()]);
    }
}
