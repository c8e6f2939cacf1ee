/*!
 * Suspension Primitive Tests
 * Wait, Activate, Passivate, Interrupt, Terminate and WaitUntil
 */

use pretty_assertions::assert_eq;
use procsim::{ProcessError, ProcessStatus, SimError, Simulation};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<(&'static str, f64)>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Counts how many times it was dropped
struct DropFlag(Rc<Cell<u32>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_activate_other_does_not_suspend() {
    let sim = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    let b = sim
        .process("b")
        .create(move |p| {
            ev.borrow_mut().push(("b", p.now()?));
            Ok(())
        })
        .unwrap();
    assert!(b.is_passive());

    let ev = events.clone();
    let target = b.clone();
    sim.process("a")
        .spawn(move |p| {
            ev.borrow_mut().push(("a1", p.now()?));
            target.activate_at(3.0)?;
            ev.borrow_mut().push(("a2", p.now()?));
            p.wait(10.0)?;
            ev.borrow_mut().push(("a3", p.now()?));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(
        events.borrow().clone(),
        vec![("a1", 0.0), ("a2", 0.0), ("b", 3.0), ("a3", 10.0)]
    );
    assert_eq!(b.status(), ProcessStatus::Terminated);
}

#[test]
fn test_activate_self_yields() {
    let sim = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    sim.process("a")
        .spawn(move |p| {
            ev.borrow_mut().push(("a-before", p.now()?));
            p.activate()?;
            ev.borrow_mut().push(("a-after", p.now()?));
            Ok(())
        })
        .unwrap();
    let ev = events.clone();
    sim.process("c")
        .spawn(move |p| {
            ev.borrow_mut().push(("c", p.now()?));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(
        events.borrow().clone(),
        vec![("a-before", 0.0), ("c", 0.0), ("a-after", 0.0)]
    );
}

#[test]
fn test_passivate_until_activated() {
    let sim = Simulation::new().unwrap();
    let events = log();
    let observed = Rc::new(Cell::new(false));

    let ev = events.clone();
    let sleeper = sim
        .process("sleeper")
        .start_at(0.0)
        .create(move |p| {
            p.passivate()?;
            ev.borrow_mut().push(("woken", p.now()?));
            Ok(())
        })
        .unwrap();

    let target = sleeper.clone();
    let seen = observed.clone();
    sim.process("waker")
        .start_at(4.0)
        .spawn(move |_| {
            seen.set(target.is_passive() && target.status() == ProcessStatus::Interrupted);
            target.activate()
        })
        .unwrap();

    sim.run().unwrap();

    assert!(observed.get());
    assert_eq!(events.borrow().clone(), vec![("woken", 4.0)]);
}

#[test]
fn test_interrupt_lets_equal_priority_run_first() {
    let sim = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    sim.process("a")
        .spawn(move |p| {
            ev.borrow_mut().push(("a1", p.now()?));
            p.interrupt()?;
            ev.borrow_mut().push(("a2", p.now()?));
            Ok(())
        })
        .unwrap();
    let ev = events.clone();
    sim.process("b")
        .spawn(move |p| {
            ev.borrow_mut().push(("b", p.now()?));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(
        events.borrow().clone(),
        vec![("a1", 0.0), ("b", 0.0), ("a2", 0.0)]
    );
}

#[test]
fn test_interrupt_lower_priority_keeps_running() {
    let sim = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    sim.process("high")
        .priority(5)
        .spawn(move |p| {
            ev.borrow_mut().push(("high1", p.now()?));
            p.interrupt()?;
            ev.borrow_mut().push(("high2", p.now()?));
            Ok(())
        })
        .unwrap();
    let ev = events.clone();
    sim.process("low")
        .priority(1)
        .spawn(move |p| {
            ev.borrow_mut().push(("low", p.now()?));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(
        events.borrow().clone(),
        vec![("high1", 0.0), ("high2", 0.0), ("low", 0.0)]
    );
}

#[test]
fn test_interrupt_requires_current() {
    let sim = Simulation::new().unwrap();
    let other = sim.process("other").create(|_| Ok(())).unwrap();
    let result = Rc::new(RefCell::new(None));

    let out = result.clone();
    let target = other.clone();
    sim.spawn(move |_| {
        *out.borrow_mut() = Some(target.interrupt());
        Ok(())
    })
    .unwrap();

    sim.run().unwrap();

    assert_eq!(
        result.borrow().clone(),
        Some(Err(SimError::Process(ProcessError::NotCurrent(other.id()))))
    );
    // also from outside any dispatch
    assert!(other.interrupt().is_err());
}

#[test]
fn test_self_terminate_never_returns() {
    let sim = Simulation::new().unwrap();
    let events = log();
    let drops = Rc::new(Cell::new(0));

    let ev = events.clone();
    let flag = drops.clone();
    let p = sim
        .process("quitter")
        .start_at(0.0)
        .create(move |p| {
            let _guard = DropFlag(flag);
            ev.borrow_mut().push(("before", p.now()?));
            p.wait(1.0)?;
            p.terminate()?;
            ev.borrow_mut().push(("after", p.now()?));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(events.borrow().clone(), vec![("before", 0.0)]);
    assert_eq!(drops.get(), 1);
    assert_eq!(p.status(), ProcessStatus::Terminated);
    assert!(!p.has_context());
    assert_eq!(sim.stats().terminations, 1);
}

#[test]
fn test_terminate_suspended_process_unwinds_it() {
    let sim = Simulation::new().unwrap();
    sim.init(0.0, 1000.0).unwrap();
    let events = log();
    let drops = Rc::new(Cell::new(0));

    let ev = events.clone();
    let flag = drops.clone();
    let victim = sim
        .process("victim")
        .spawn(move |p| {
            let _guard = DropFlag(flag);
            p.wait(100.0)?;
            ev.borrow_mut().push(("victim-resumed", p.now()?));
            Ok(())
        })
        .unwrap();

    let status_seen = Rc::new(Cell::new(None));
    let release_seen = Rc::new(Cell::new(None));
    let seen = status_seen.clone();
    let released = release_seen.clone();
    let unwound = drops.clone();
    let target = victim.clone();
    sim.process("killer")
        .start_at(1.0)
        .spawn(move |_| {
            target.terminate()?;
            seen.set(Some(target.status()));
            // still held until the current dispatch returns
            released.set(Some((target.is_alive(), unwound.get())));
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(status_seen.get(), Some(ProcessStatus::Terminated));
    assert_eq!(release_seen.get(), Some((true, 0)));
    assert!(events.borrow().is_empty());
    assert_eq!(drops.get(), 1);
    assert!(!victim.is_alive());
    assert_eq!(sim.stats().reaped, 1);
    assert_eq!(sim.calendar_len(), 0);
}

#[test]
fn test_terminate_prepared_and_twice() {
    let sim = Simulation::new().unwrap();
    let p = sim.process("idle").start_at(5.0).create(|_| Ok(())).unwrap();
    assert_eq!(p.activation_time(), Some(5.0));

    p.terminate().unwrap();
    assert_eq!(p.status(), ProcessStatus::Terminated);
    assert!(p.is_idle());
    p.terminate().unwrap();

    assert!(matches!(
        sim.dispatch(&p),
        Err(SimError::Process(ProcessError::NotDispatchable { .. }))
    ));
    assert!(matches!(
        p.activate(),
        Err(SimError::Process(ProcessError::Terminated(_)))
    ));
}

#[test]
fn test_invalid_wait_and_schedule_times() {
    let sim = Simulation::new().unwrap();
    sim.init(10.0, 100.0).unwrap();
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    assert!(matches!(
        p.wait(-1.0),
        Err(SimError::Process(ProcessError::InvalidDuration { .. }))
    ));
    assert!(matches!(
        p.wait(f64::NAN),
        Err(SimError::Process(ProcessError::InvalidDuration { .. }))
    ));
    assert_eq!(
        p.activate_at(5.0),
        Err(SimError::Process(ProcessError::ScheduleInPast {
            time: 5.0,
            now: 10.0
        }))
    );
    assert!(matches!(
        p.activate_at(f64::NAN),
        Err(SimError::Process(ProcessError::InvalidTime { .. }))
    ));
    assert!(p.is_idle());
}

#[test]
fn test_wait_outside_dispatch_only_schedules() {
    let sim = Simulation::new().unwrap();
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.wait(7.0).unwrap();

    assert_eq!(p.status(), ProcessStatus::Prepared);
    assert_eq!(p.activation_time(), Some(7.0));
    assert_eq!(sim.next_time(), Some(7.0));
}

#[test]
fn test_wait_until_resumes_when_condition_holds() {
    let sim = Simulation::new().unwrap();
    let counter = Rc::new(Cell::new(0u32));
    let events = log();

    let ev = events.clone();
    let c = counter.clone();
    sim.process("watcher")
        .spawn(move |p| {
            p.wait_until(|| c.get() >= 3)?;
            ev.borrow_mut().push(("condition", p.now()?));
            Ok(())
        })
        .unwrap();

    let c = counter.clone();
    sim.process("ticker")
        .spawn(move |p| {
            for _ in 0..5 {
                p.wait(1.0)?;
                c.set(c.get() + 1);
            }
            Ok(())
        })
        .unwrap();

    sim.run().unwrap();

    assert_eq!(events.borrow().clone(), vec![("condition", 3.0)]);
    assert_eq!(sim.waiting_len(), 0);
}

#[test]
fn test_wait_until_already_true_returns_immediately() {
    let sim = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    sim.spawn(move |p| {
        p.wait_until(|| true)?;
        ev.borrow_mut().push(("done", p.now()?));
        Ok(())
    })
    .unwrap();

    sim.run().unwrap();

    assert_eq!(events.borrow().clone(), vec![("done", 0.0)]);
    assert_eq!(sim.stats().suspensions, 0);
}
