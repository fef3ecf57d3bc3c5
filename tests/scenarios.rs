// Black-box, end-to-end scenarios driven entirely through the
// scheduler's line interface - no internal module is reached into
// directly except via `Scheduler::registry()` to read back final
// state, the same seam an embedder would use.

use lizardrt::checksum;
use lizardrt::config::RuntimeConfig;
use lizardrt::error::RuntimeError;
use lizardrt::module::ModuleKind;
use lizardrt::scheduler::{QueueLineSource, Scheduler, SharedSink};
use lizardrt::storage::{MemoryStorage, Storage};
use lizardrt::value::Value;
use std::rc::Rc;

struct SharedStorage(Rc<MemoryStorage>);

impl Storage for SharedStorage {
    fn load(&self) -> lizardrt::error::Result<String> {
        self.0.load()
    }

    fn save(&self, data: &str) -> lizardrt::error::Result<()> {
        self.0.save(data)
    }
}

fn scheduler_with(input: QueueLineSource, sink: SharedSink) -> Scheduler {
    Scheduler::new(
        RuntimeConfig::default(),
        Box::new(MemoryStorage::default()),
        Box::new(input),
        Box::new(sink),
    )
    .unwrap()
}

#[test]
fn arithmetic_assignment_and_readback() {
    let mut input = QueueLineSource::default();
    input.push("number x = 1.5");
    input.push("x = x + 2");
    input.push("x");
    let sink = SharedSink::default();
    let mut scheduler = scheduler_with(input, sink.clone());

    scheduler.tick();

    let lines = sink.lines();
    let last = lines.last().expect("a diagnostic was emitted for the bare expression");
    assert_eq!(checksum::strip_and_verify(last).unwrap(), "3.500000");
    assert_eq!(
        scheduler.registry().variable("x").unwrap().read(),
        Value::Number(3.5)
    );
}

#[test]
fn rule_runs_once_and_does_not_restart() {
    let mut input = QueueLineSource::default();
    input.push("boolean flag = true");
    input.push("when flag (flag = false)");
    let mut scheduler = scheduler_with(input, SharedSink::default());

    scheduler.tick();
    assert_eq!(
        scheduler.registry().variable("flag").unwrap().read(),
        Value::Boolean(false)
    );

    // Second tick: condition is now false, rule must not restart it.
    scheduler.tick();
    assert_eq!(
        scheduler.registry().variable("flag").unwrap().read(),
        Value::Boolean(false)
    );
}

#[test]
fn routine_parks_on_await_until_an_external_write_satisfies_it() {
    let mut input = QueueLineSource::default();
    input.push("number x = 0");
    input.push("r := (await x > 3; x = 0)");
    input.push("r()");
    let mut scheduler = scheduler_with(input, SharedSink::default());

    scheduler.tick(); // defines x, r, starts r; await x > 3 is false, parks
    assert_eq!(scheduler.registry().variable("x").unwrap().read(), Value::Integer(0));

    scheduler.tick(); // still parked, nothing changed x
    assert_eq!(scheduler.registry().variable("x").unwrap().read(), Value::Integer(0));

    // An external collaborator raises x past the threshold on tick 3.
    scheduler.registry().variable("x").unwrap().assign(Value::Integer(4)).unwrap();
    scheduler.tick(); // await now true: advances immediately and resets x
    assert_eq!(scheduler.registry().variable("x").unwrap().read(), Value::Integer(0));
}

#[test]
fn assignment_type_mismatch_is_a_contained_diagnostic() {
    let mut input = QueueLineSource::default();
    input.push("integer i = 0");
    input.push("i = 1.5");
    let sink = SharedSink::default();
    let mut scheduler = scheduler_with(input, sink.clone());

    scheduler.tick();

    assert_eq!(scheduler.registry().variable("i").unwrap().read(), Value::Integer(0));
    let lines = sink.lines();
    assert!(lines.iter().any(|l| l.contains("!ERR")));
}

#[test]
fn startup_script_survives_a_simulated_reboot() {
    let shared = Rc::new(MemoryStorage::default());

    let mut input = QueueLineSource::default();
    input.push("!+number boot_counter = 0");
    input.push("!.");
    let mut scheduler = Scheduler::new(
        RuntimeConfig::default(),
        Box::new(SharedStorage(shared.clone())),
        Box::new(input),
        Box::new(SharedSink::default()),
    )
    .unwrap();
    scheduler.tick();
    drop(scheduler);

    let rebooted = Scheduler::new(
        RuntimeConfig::default(),
        Box::new(SharedStorage(shared.clone())),
        Box::new(QueueLineSource::default()),
        Box::new(SharedSink::default()),
    )
    .unwrap();
    assert_eq!(
        rebooted.registry().variable("boot_counter").unwrap().read(),
        Value::Integer(0)
    );
}

#[test]
fn shadowed_modules_turn_on_together_in_shadow_order() {
    let mut input = QueueLineSource::default();
    input.push("m = Output(2)");
    input.push("m2 = Output(3)");
    input.push("m.shadow(m2)");
    input.push("m.on()");
    let mut scheduler = scheduler_with(input, SharedSink::default());

    scheduler.tick();

    let m = scheduler.registry().module("m").unwrap();
    let m2 = scheduler.registry().module("m2").unwrap();
    assert_eq!(m.kind(), ModuleKind::Output);
    assert_eq!(m.get_property("state").unwrap().read(), Value::Boolean(true));
    assert_eq!(m2.get_property("state").unwrap().read(), Value::Boolean(true));
}

#[test]
fn checksum_mismatch_never_reaches_the_compiler() {
    let mut input = QueueLineSource::default();
    let mut tampered = checksum::append("m = Output(1)");
    tampered.replace_range(0..1, "n");
    input.push(tampered);
    let sink = SharedSink::default();
    let mut scheduler = scheduler_with(input, sink.clone());

    scheduler.tick();

    assert!(matches!(
        scheduler.registry().module("m"),
        Err(RuntimeError::UnknownName(_))
    ));
    assert!(sink.lines().iter().any(|l| l.contains("!ERR")));
}
