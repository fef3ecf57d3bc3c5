// uDashBoard: featherweight dashboard application.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

// The main loop: drain input, step modules, evaluate rules, step
// routines, sleep. Every per-entity operation is wrapped in its own
// error boundary - a failing line/module/rule/routine never halts the
// scheduler, it just becomes a diagnostic line and a tracing event.

use crate::checksum;
use crate::clock::Clock;
use crate::compiler::Compiler;
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::module::{Module, ModuleKind, ModuleRef};
use crate::parser;
use crate::registry::Registry;
use crate::routine::RoutineRef;
use crate::storage::{StartupScript, Storage};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{error, info_span};

/// A source of complete, `\n`-terminated lines. `poll_lines` never
/// blocks; it returns whatever has accumulated since the last call.
pub trait LineSource {
    fn poll_lines(&mut self) -> Vec<String>;
}

/// A programmatic line feed, for tests and embedding.
#[derive(Default)]
pub struct QueueLineSource {
    lines: VecDeque<String>,
}

impl QueueLineSource {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }
}

impl LineSource for QueueLineSource {
    fn poll_lines(&mut self) -> Vec<String> {
        self.lines.drain(..).collect()
    }
}

/// Reads lines from a blocking `BufRead` on a dedicated thread and
/// relays them through a channel, so the scheduler's own poll never
/// blocks on I/O - the concrete realization of the external line
/// channel for the host binary.
pub struct ChannelLineSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelLineSource {
    pub fn from_reader<R: std::io::BufRead + Send + 'static>(mut reader: R) -> ChannelLineSource {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx.send(trimmed).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        ChannelLineSource { rx }
    }
}

impl LineSource for ChannelLineSource {
    fn poll_lines(&mut self) -> Vec<String> {
        self.rx.try_iter().collect()
    }
}

/// Where diagnostic lines (checksummed wire output, §6) go.
pub trait DiagnosticSink {
    fn emit(&mut self, line: &str);
}

#[derive(Default)]
pub struct VecSink {
    pub lines: Vec<String>,
}

impl DiagnosticSink for VecSink {
    fn emit(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// A sink that hands out a cloneable handle to its accumulated lines,
/// so a caller can keep observing output after handing the sink itself
/// into a `Scheduler` as a `Box<dyn DiagnosticSink>`.
#[derive(Clone, Default)]
pub struct SharedSink(Rc<RefCell<Vec<String>>>);

impl SharedSink {
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

impl DiagnosticSink for SharedSink {
    fn emit(&mut self, line: &str) {
        self.0.borrow_mut().push(line.to_string());
    }
}

const CORE_MODULE_NAME: &str = "core";

pub struct Scheduler {
    registry: Registry,
    storage: Box<dyn Storage>,
    startup: StartupScript,
    input: Box<dyn LineSource>,
    output: Box<dyn DiagnosticSink>,
    config: RuntimeConfig,
    clock: Clock,
    tick: u64,
}

impl Scheduler {
    pub fn new(
        config: RuntimeConfig,
        storage: Box<dyn Storage>,
        input: Box<dyn LineSource>,
        output: Box<dyn DiagnosticSink>,
    ) -> Result<Scheduler> {
        let mut registry = Registry::new();
        registry.add_module(Module::core(CORE_MODULE_NAME))?;
        let startup = StartupScript::load_from(storage.as_ref())?;

        let mut scheduler = Scheduler {
            registry,
            storage,
            startup,
            input,
            output,
            config,
            clock: Clock::new(),
            tick: 0,
        };
        let boot_lines = scheduler.startup.lines();
        for line in boot_lines {
            if let Err(e) = scheduler.process_line(&line) {
                scheduler.report_error("startup", &e);
            }
        }
        Ok(scheduler)
    }

    /// Run one tick: drain input, step modules (core last), evaluate
    /// rules, step standalone routines.
    pub fn tick(&mut self) {
        let span = info_span!("tick", n = self.tick);
        let _enter = span.enter();

        let lines = self.input.poll_lines();
        for line in lines {
            if line.len() > self.config.line_buffer_size {
                self.report_error(
                    "line",
                    &RuntimeError::MalformedControl("line exceeds configured buffer size".into()),
                );
                continue;
            }
            if let Err(e) = self.process_line(&line) {
                self.report_error("line", &e);
            }
        }

        let modules: Vec<ModuleRef> = self.registry.modules_in_order().cloned().collect();
        for m in modules.iter().filter(|m| m.kind() != ModuleKind::Core) {
            self.step_module(m);
        }
        if let Some(core) = modules.iter().find(|m| m.kind() == ModuleKind::Core) {
            if let Ok(time) = core.get_property("time") {
                let _ = time.assign(Value::Number(self.clock.seconds()));
            }
            self.step_module(core);
        }

        let rule_count = self.registry.rules().len();
        for i in 0..rule_count {
            let result = self.registry.rules()[i].tick();
            if let Err(e) = result {
                self.report_error("rule", &e);
            }
        }

        let routines: Vec<RoutineRef> = self.registry.routines_in_order().cloned().collect();
        for r in &routines {
            if let Err(e) = r.step() {
                self.report_error(r.name(), &e);
            }
        }

        self.tick += 1;
    }

    /// The process-wide namespace, for embedders that need to inspect
    /// variable or module state between ticks.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run ticks forever, sleeping the configured period between each.
    pub fn run_forever(&mut self) -> ! {
        loop {
            self.tick();
            thread::sleep(Duration::from_millis(self.config.tick_period_ms));
        }
    }

    fn step_module(&mut self, m: &ModuleRef) {
        match m.step() {
            Ok(lines) => {
                for line in lines {
                    self.emit(&line);
                }
            }
            Err(e) => self.report_error(m.name(), &e),
        }
    }

    /// Verify checksum, dispatch control prefixes, else compile as DSL.
    fn process_line(&mut self, raw: &str) -> Result<()> {
        let payload = checksum::strip_and_verify(raw)?;

        if let Some(rest) = payload.strip_prefix("!+") {
            self.startup.append(rest);
            return Ok(());
        }
        if let Some(rest) = payload.strip_prefix("!-") {
            self.startup.remove(rest);
            return Ok(());
        }
        if let Some(rest) = payload.strip_prefix("!?") {
            for line in self.startup.matching(rest) {
                self.emit(&line);
            }
            return Ok(());
        }
        if payload.strip_prefix("!.").is_some() {
            self.startup.persist(self.storage.as_ref())?;
            return Ok(());
        }
        if let Some(rest) = payload.strip_prefix("!!") {
            return self.process_broadcast_or_dsl(rest);
        }
        if let Some(rest) = payload.strip_prefix("!\"") {
            self.emit(rest);
            return Ok(());
        }
        if payload.starts_with('!') {
            return Err(RuntimeError::MalformedControl(payload.to_string()));
        }
        self.process_dsl_line(payload)
    }

    /// `!!` carries either an inbound proxy broadcast or an ordinary DSL
    /// line (§6). A broadcast's wire shape is unambiguous
    /// (`name.prop=value;…`); when `text` parses as one *and* names a
    /// proxy module, route it straight into that module's read cache via
    /// `receive_broadcast` rather than through `write_property` - going
    /// through `write_property` would forward the value right back out
    /// the proxy's own channel, echoing every inbound update. Anything
    /// else falls through to the normal compiler path.
    fn process_broadcast_or_dsl(&mut self, text: &str) -> Result<()> {
        if let Some((name, pairs)) = parser::parse_broadcast(text) {
            if let Ok(module) = self.registry.module(&name) {
                if module.kind() == ModuleKind::Proxy {
                    for (prop, value) in pairs {
                        module.receive_broadcast(&prop, value)?;
                    }
                    return Ok(());
                }
            }
        }
        self.process_dsl_line(text)
    }

    fn process_dsl_line(&mut self, text: &str) -> Result<()> {
        let diagnostic = Compiler::new(&mut self.registry).compile_line(text)?;
        if let Some(d) = diagnostic {
            self.emit(&d);
        }
        Ok(())
    }

    fn emit(&mut self, payload: &str) {
        self.output.emit(&checksum::append(payload));
    }

    fn report_error(&mut self, tag: &str, e: &RuntimeError) {
        error!(entity = tag, error = %e, "error boundary caught");
        self.emit(&format!("!ERR {} {}", tag, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn scheduler_with(input: QueueLineSource) -> Scheduler {
        Scheduler::new(
            RuntimeConfig::default(),
            Box::new(MemoryStorage::default()),
            Box::new(input),
            Box::new(VecSink::default()),
        )
        .unwrap()
    }

    #[test]
    fn core_module_is_registered_on_construction() {
        let scheduler = scheduler_with(QueueLineSource::default());
        assert_eq!(
            scheduler.registry.module(CORE_MODULE_NAME).unwrap().kind(),
            ModuleKind::Core
        );
    }

    #[test]
    fn drains_input_and_compiles_dsl_lines() {
        let mut input = QueueLineSource::default();
        input.push("m = Output(1)");
        input.push("m.on()");
        let mut scheduler = scheduler_with(input);
        scheduler.tick();
        assert_eq!(
            scheduler.registry.module("m").unwrap().get_property("state").unwrap().read(),
            crate::value::Value::Boolean(true)
        );
    }

    #[test]
    fn control_prefix_round_trips_through_startup_script() {
        let mut scheduler = scheduler_with(QueueLineSource::default());
        scheduler.process_line("!+number x = 0").unwrap();
        assert_eq!(scheduler.startup.matching("number").len(), 1);
        scheduler.process_line("!-number").unwrap();
        assert_eq!(scheduler.startup.matching("number").len(), 0);
    }

    #[test]
    fn malformed_line_is_contained_not_fatal() {
        let mut input = QueueLineSource::default();
        input.push("!@unknown");
        input.push("m = Output(1)");
        let mut scheduler = scheduler_with(input);
        scheduler.tick();
        assert!(scheduler.registry.module("m").is_ok());
    }

    #[test]
    fn core_time_property_advances_across_ticks() {
        let mut scheduler = scheduler_with(QueueLineSource::default());
        scheduler.tick();
        let first = scheduler.registry.module(CORE_MODULE_NAME).unwrap().get_property("time").unwrap().read();
        thread::sleep(Duration::from_millis(5));
        scheduler.tick();
        let second = scheduler.registry.module(CORE_MODULE_NAME).unwrap().get_property("time").unwrap().read();
        assert!(second.as_f64().unwrap() > first.as_f64().unwrap());
    }

    #[test]
    fn inbound_proxy_broadcast_updates_cache_without_echoing() {
        use crate::module::VecChannel;
        let mut scheduler = scheduler_with(QueueLineSource::default());
        let channel = Rc::new(VecChannel::default());
        let expander = Module::expander("exp", channel.clone());
        scheduler.registry.add_module(expander.clone()).unwrap();
        let proxy = Module::proxy("p", expander, "Output", &[]).unwrap();
        scheduler.registry.add_module(proxy).unwrap();
        channel.lines.borrow_mut().clear();

        scheduler.process_line("!!p.state=true").unwrap();

        assert!(channel.lines.borrow().is_empty());
        assert_eq!(
            scheduler.registry.module("p").unwrap().get_property("state").unwrap().read(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn checksum_mismatch_is_contained() {
        let mut line = checksum::append("m = Output(1)");
        line.replace_range(0..1, "x");
        let mut scheduler = scheduler_with(QueueLineSource::default());
        assert!(matches!(scheduler.process_line(&line), Err(RuntimeError::ChecksumMismatch)));
    }
}
