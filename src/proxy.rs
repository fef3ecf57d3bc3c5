// A proxy is a write-through forwarder: constructor, method calls, and
// property writes are serialized and sent to the expander's byte
// channel; property reads are not proxied synchronously. Instead the
// remote side is expected to broadcast, and inbound broadcast lines are
// routed back in through `Module::receive_broadcast`.

use crate::error::{Result, RuntimeError};
use crate::module::{Extra, Module, ModuleKind};
use crate::value::Value;

fn channel_of(module: &Module) -> Result<std::rc::Rc<dyn crate::module::ByteChannel>> {
    match module.extra() {
        Extra::Proxy { expander, .. } => match expander.extra() {
            Extra::Expander(channel) => Ok(channel.clone()),
            _ => unreachable!("proxy expander field always names an Expander module"),
        },
        _ => Err(RuntimeError::TypeMismatch {
            expected: crate::value::Kind::Identifier.into(),
            got: crate::value::Kind::Identifier,
        }),
    }
}

fn remote_of(module: &Module) -> Result<String> {
    match module.extra() {
        Extra::Proxy { remote, .. } => Ok(remote.clone()),
        _ => Err(RuntimeError::TypeMismatch {
            expected: crate::value::Kind::Identifier.into(),
            got: crate::value::Kind::Identifier,
        }),
    }
}

pub fn emit_constructor(module: &Module, type_name: &str, args: &[Value]) {
    if module.kind() != ModuleKind::Proxy {
        return;
    }
    if let Ok(channel) = channel_of(module) {
        let args: Vec<String> = args.iter().map(|v| v.format()).collect();
        channel.write_line(&format!("{} = {}({})", module.name(), type_name, args.join(",")));
    }
}

pub fn emit_call(module: &Module, method: &str, args: &[Value]) -> Result<()> {
    let channel = channel_of(module)?;
    let remote = remote_of(module)?;
    let args: Vec<String> = args.iter().map(|v| v.format()).collect();
    channel.write_line(&format!("{}.{}({})", remote, method, args.join(",")));
    Ok(())
}

pub fn emit_write(module: &Module, property: &str, value: &Value) -> Result<()> {
    let channel = channel_of(module)?;
    let remote = remote_of(module)?;
    channel.write_line(&format!("{}.{}={}", remote, property, value.format()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::VecChannel;
    use std::rc::Rc;

    #[test]
    fn constructor_and_call_are_forwarded() {
        let channel = Rc::new(VecChannel::default());
        let expander = Module::expander("exp", channel.clone());
        let proxy = Module::proxy("p", expander, "Output", &[Value::Integer(3)]).unwrap();
        proxy.call_with_shadows("on", &[]).unwrap();

        let lines = channel.lines.borrow();
        assert_eq!(lines[0], "p = Output(3)");
        assert_eq!(lines[1], "p.on()");
    }

    #[test]
    fn broadcast_creates_property_on_demand() {
        let channel = Rc::new(VecChannel::default());
        let expander = Module::expander("exp", channel);
        let proxy = Module::proxy("p", expander, "Output", &[]).unwrap();
        proxy.receive_broadcast("state", Value::Boolean(true)).unwrap();
        assert_eq!(proxy.get_property("state").unwrap().read(), Value::Boolean(true));
    }
}
