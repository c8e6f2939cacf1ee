/*!
 * Process Lifecycle Tests
 * Status transitions, ownership, naming and simulation shutdown
 */

use pretty_assertions::assert_eq;
use procsim::{EngineConfig, Ownership, ProcessStatus, Simulation};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct DropFlag(Rc<Cell<u32>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_status_seen_from_inside_and_outside() {
    let sim = Simulation::new().unwrap();
    let inside = Rc::new(RefCell::new(Vec::new()));

    let out = inside.clone();
    let p = sim
        .process("observed")
        .start_at(0.0)
        .create(move |p| {
            out.borrow_mut().push((p.status(), p.is_current(), p.has_context()));
            p.wait(1.0)?;
            out.borrow_mut().push((p.status(), p.is_current(), p.has_context()));
            Ok(())
        })
        .unwrap();

    assert_eq!(p.status(), ProcessStatus::Prepared);
    assert!(!p.is_current());

    assert!(sim.step().unwrap());
    assert_eq!(p.status(), ProcessStatus::Interrupted);
    assert!(p.has_context());
    assert!(p.context_size().unwrap_or(0) > 0);
    assert_eq!(p.activation_time(), Some(1.0));
    assert!(!p.is_idle());

    assert!(sim.step().unwrap());
    assert_eq!(p.status(), ProcessStatus::Terminated);
    assert!(!p.has_context());
    assert!(!sim.step().unwrap());

    assert_eq!(
        inside.borrow().clone(),
        vec![
            (ProcessStatus::Running, true, false),
            (ProcessStatus::Running, true, false),
        ]
    );
}

#[test]
fn test_engine_owned_process_is_released_at_termination() {
    let sim = Simulation::new().unwrap();
    let handle = sim.spawn(|p| p.wait(1.0)).unwrap();

    assert!(handle.is_alive());
    let strong = handle.upgrade().unwrap();
    assert_eq!(strong.ownership(), Ownership::Engine);
    drop(strong);

    sim.run().unwrap();

    assert!(!handle.is_alive());
    assert!(handle.upgrade().is_none());
    assert_eq!(handle.status(), ProcessStatus::Terminated);
}

#[test]
fn test_caller_owned_process_outlives_termination() {
    let sim = Simulation::new().unwrap();
    let p = sim.process("kept").start_at(0.0).create(|_| Ok(())).unwrap();

    sim.run().unwrap();

    assert_eq!(p.ownership(), Ownership::Caller);
    assert_eq!(p.status(), ProcessStatus::Terminated);
    assert_eq!(p.name().as_str(), "kept");
}

#[test]
fn test_default_name_uses_id() {
    let sim = Simulation::new().unwrap();
    let handle = sim.spawn(|_| Ok(())).unwrap();
    let p = handle.upgrade().unwrap();

    assert_eq!(p.name().as_str(), format!("Process#{}", p.id()));
}

#[test]
fn test_ids_are_unique() {
    let sim = Simulation::new().unwrap();
    let a = sim.process("a").create(|_| Ok(())).unwrap();
    let b = sim.process("b").create(|_| Ok(())).unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
}

#[test]
fn test_shutdown_unwinds_suspended_processes() {
    let drops = Rc::new(Cell::new(0));
    let sim = Simulation::new().unwrap();

    for _ in 0..10 {
        let flag = drops.clone();
        sim.spawn(move |p| {
            let _guard = DropFlag(flag);
            p.passivate()?;
            unreachable!("passive processes are never resumed");
        })
        .unwrap();
    }

    sim.run().unwrap();
    assert_eq!(sim.live_processes().len(), 10);
    assert_eq!(drops.get(), 0);

    drop(sim);
    assert_eq!(drops.get(), 10);
}

#[test]
fn test_stop_ends_run_early() {
    let sim = Simulation::new().unwrap();
    sim.init(0.0, 100.0).unwrap();
    let late = Rc::new(Cell::new(false));

    sim.process("stopper")
        .start_at(5.0)
        .spawn(|p| p.sim().stop())
        .unwrap();
    let flag = late.clone();
    sim.process("late")
        .start_at(6.0)
        .spawn(move |_| {
            flag.set(true);
            Ok(())
        })
        .unwrap();

    assert_eq!(sim.run().unwrap(), 5.0);
    assert!(!late.get());

    // a second run continues where the first stopped
    assert_eq!(sim.run().unwrap(), 100.0);
    assert!(late.get());
}

#[test]
fn test_run_advances_to_horizon() {
    let sim = Simulation::new().unwrap();
    sim.init(0.0, 50.0).unwrap();
    let handle = sim.spawn(|p| p.wait(80.0)).unwrap();

    assert_eq!(sim.run().unwrap(), 50.0);
    // still waiting beyond the horizon
    assert_eq!(handle.status(), ProcessStatus::Interrupted);
    assert_eq!(sim.calendar_len(), 1);
}

#[test]
fn test_init_rejects_bad_interval() {
    let sim = Simulation::new().unwrap();
    assert!(sim.init(10.0, 5.0).is_err());
    assert!(sim.init(f64::NAN, 5.0).is_err());
    assert!(sim.init(0.0, f64::INFINITY).is_ok());
}

#[test]
fn test_small_stack_configuration() {
    let config = EngineConfig::default()
        .with_stack_size(128 * 1024)
        .with_guard_size(1024)
        .with_dispatch_logging(true);
    let sim = Simulation::builder().with_config(config).build().unwrap();
    let hits = Rc::new(Cell::new(0));

    for _ in 0..5 {
        let h = hits.clone();
        sim.spawn(move |p| {
            for _ in 0..4 {
                p.wait(0.5)?;
                h.set(h.get() + 1);
            }
            Ok(())
        })
        .unwrap();
    }

    assert_eq!(sim.run().unwrap(), 2.0);
    assert_eq!(hits.get(), 20);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = EngineConfig::default().with_stack_size(1000);
    assert!(Simulation::builder().with_config(config).build().is_err());
}

#[test]
fn test_handle_outlives_simulation() {
    let sim = Simulation::new().unwrap();
    let handle = sim.handle();
    let p = sim.process("orphan").create(|_| Ok(())).unwrap();
    assert!(handle.is_alive());

    drop(sim);

    assert!(!handle.is_alive());
    assert!(handle.now().is_err());
    assert!(p.is_terminated());
    assert!(p.now().is_err());
}
