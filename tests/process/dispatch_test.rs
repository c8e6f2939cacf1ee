/*!
 * Dispatcher Tests
 * Start, suspend, resume and error paths of the trampoline
 */

use pretty_assertions::assert_eq;
use procsim::{EngineConfig, ProcessError, ProcessStatus, SimError, Simulation};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Log = Rc<RefCell<Vec<(String, f64)>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<(String, f64)> {
    log.borrow().clone()
}

#[test]
fn test_wait_resumes_after_delay() {
    let sim = Simulation::new().unwrap();
    sim.init(0.0, 100.0).unwrap();
    let events = log();

    let ev = events.clone();
    sim.spawn(move |p| {
        ev.borrow_mut().push(("start".into(), p.now()?));
        p.wait(5.0)?;
        ev.borrow_mut().push(("resume".into(), p.now()?));
        Ok(())
    })
    .unwrap();

    let end = sim.run().unwrap();

    assert_eq!(
        entries(&events),
        vec![("start".to_string(), 0.0), ("resume".to_string(), 5.0)]
    );
    assert_eq!(end, 100.0);

    let stats = sim.stats();
    assert_eq!(stats.starts, 1);
    assert_eq!(stats.suspensions, 1);
    assert_eq!(stats.resumes, 1);
    assert_eq!(stats.terminations, 1);
    assert!(stats.peak_image_bytes > 0);
}

#[test]
fn test_locals_survive_suspension() {
    let sim = Simulation::new().unwrap();
    let result = Rc::new(RefCell::new(None));

    let out = result.clone();
    sim.spawn(move |p| {
        let mut numbers = [0u64; 64];
        for (i, n) in numbers.iter_mut().enumerate() {
            *n = (i as u64) * 3 + 1;
        }
        let text = String::from("carried across suspensions");
        let mut heap = vec![1.5f64; 16];

        for round in 0..10 {
            p.wait(1.0)?;
            numbers[round] += 1000;
            heap.push(round as f64);
        }

        let sum: u64 = numbers.iter().sum();
        *out.borrow_mut() = Some((sum, text, heap.len()));
        Ok(())
    })
    .unwrap();

    sim.run().unwrap();

    let expected_sum: u64 = (0..64u64).map(|i| i * 3 + 1).sum::<u64>() + 10 * 1000;
    assert_eq!(
        result.borrow().clone(),
        Some((expected_sum, "carried across suspensions".to_string(), 26))
    );
    assert_eq!(sim.now(), 10.0);
}

fn descend(p: &procsim::Process, depth: u32) -> procsim::SimResult<u64> {
    let pad = [depth as u64; 8];
    if depth == 0 {
        p.wait(1.0)?;
        return Ok(pad.iter().sum());
    }
    let below = descend(p, depth - 1)?;
    Ok(below + pad[7])
}

#[test]
fn test_deep_stack_is_restored() {
    let sim = Simulation::new().unwrap();
    let result = Rc::new(RefCell::new(0u64));

    let out = result.clone();
    sim.spawn(move |p| {
        *out.borrow_mut() = descend(p, 200)?;
        Ok(())
    })
    .unwrap();

    sim.run().unwrap();

    assert_eq!(*result.borrow(), (1..=200u64).sum::<u64>());
    assert!(sim.stats().peak_image_bytes >= 200 * 16);
}

#[test]
fn test_direct_dispatch_steps_through_states() {
    let sim = Simulation::new().unwrap();
    let p = sim
        .process("stepper")
        .create(|p| {
            p.passivate()?;
            p.passivate()?;
            Ok(())
        })
        .unwrap();

    assert_eq!(p.status(), ProcessStatus::Prepared);
    assert_eq!(sim.dispatch(&p).unwrap(), ProcessStatus::Interrupted);
    assert!(p.has_context());
    assert_eq!(sim.dispatch(&p).unwrap(), ProcessStatus::Interrupted);
    assert_eq!(sim.dispatch(&p).unwrap(), ProcessStatus::Terminated);
    assert!(!p.has_context());

    let err = sim.dispatch(&p).unwrap_err();
    assert_eq!(
        err,
        SimError::Process(ProcessError::NotDispatchable {
            id: p.id(),
            status: ProcessStatus::Terminated,
        })
    );
}

#[test]
fn test_process_of_another_simulation_is_rejected() {
    let home = Simulation::new().unwrap();
    let other = Simulation::new().unwrap();
    let events = log();

    let ev = events.clone();
    let p = home
        .process("visitor")
        .create(move |p| {
            p.wait(2.0)?;
            ev.borrow_mut().push(("woke".into(), p.now()?));
            Ok(())
        })
        .unwrap();

    let err = other.dispatch(&p).unwrap_err();
    assert_eq!(err, SimError::Process(ProcessError::ForeignProcess(p.id())));
    assert_eq!(p.status(), ProcessStatus::Prepared);
    assert_eq!(other.stats().starts, 0);

    assert_eq!(home.dispatch(&p).unwrap(), ProcessStatus::Interrupted);
    assert_eq!(
        other.dispatch(&p).unwrap_err(),
        SimError::Process(ProcessError::ForeignProcess(p.id()))
    );
    assert!(p.has_context());

    home.run().unwrap();
    assert_eq!(entries(&events), vec![("woke".to_string(), 2.0)]);
    assert_eq!(p.status(), ProcessStatus::Terminated);
}

#[test]
fn test_reentrant_dispatch_is_rejected() {
    let sim = Rc::new(Simulation::new().unwrap());
    let weak: Weak<Simulation> = Rc::downgrade(&sim);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let other = sim.process("other").create(|_| Ok(())).unwrap();
    let out = seen.clone();
    let target = other.clone();
    sim.spawn(move |_| {
        if let Some(sim) = weak.upgrade() {
            out.borrow_mut().push(sim.dispatch(&target).map(|_| ()));
            out.borrow_mut().push(sim.run().map(|_| ()));
        }
        Ok(())
    })
    .unwrap();

    sim.run().unwrap();

    assert_eq!(
        seen.borrow().clone(),
        vec![
            Err(SimError::Process(ProcessError::ReentrantDispatch)),
            Err(SimError::Process(ProcessError::ReentrantDispatch)),
        ]
    );
    assert_eq!(other.status(), ProcessStatus::Prepared);
}

#[test]
fn test_behavior_error_terminates_and_propagates() {
    let sim = Simulation::new().unwrap();
    let p = sim
        .process("failing")
        .start_at(0.0)
        .create(|p| {
            p.wait(2.0)?;
            Err(SimError::behavior("out of stock"))
        })
        .unwrap();

    let err = sim.run().unwrap_err();

    assert_eq!(err, SimError::behavior("out of stock"));
    assert_eq!(p.status(), ProcessStatus::Terminated);
    assert_eq!(sim.now(), 2.0);
}

#[test]
#[should_panic(expected = "behavior exploded")]
fn test_panic_propagates_out_of_run() {
    let sim = Simulation::new().unwrap();
    sim.spawn(|p| {
        p.wait(1.0)?;
        panic!("behavior exploded");
    })
    .unwrap();

    let _ = sim.run();
}

#[test]
fn test_many_processes_interleave_deterministically() {
    let sim = Simulation::new().unwrap();
    let events = log();

    for i in 1..=20u32 {
        let ev = events.clone();
        sim.process(format!("p{}", i))
            .spawn(move |p| {
                for _ in 0..3 {
                    p.wait(f64::from(i))?;
                    ev.borrow_mut().push((p.name().to_string(), p.now()?));
                }
                Ok(())
            })
            .unwrap();
    }

    sim.run().unwrap();

    let events = entries(&events);
    assert_eq!(events.len(), 60);
    // non-decreasing time
    assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(events.last().map(|e| e.1), Some(60.0));
    assert_eq!(sim.live_processes().len(), 0);
}

const OVERFLOW_CHILD_ENV: &str = "PROCSIM_OVERFLOW_CHILD";

fn overflow(depth: u32) -> u64 {
    let pad = std::hint::black_box([u64::from(depth); 64]);
    if depth == 0 {
        return pad[0];
    }
    std::hint::black_box(overflow(depth - 1)) + pad[63]
}

#[cfg(unix)]
#[test]
fn test_stack_overflow_is_fatal() {
    if std::env::var_os(OVERFLOW_CHILD_ENV).is_some() {
        let config = EngineConfig::default().with_stack_size(64 * 1024);
        let sim = Simulation::builder().with_config(config).build().unwrap();
        sim.spawn(|_| {
            std::hint::black_box(overflow(10_000));
            Ok(())
        })
        .unwrap();
        let _ = sim.run();
        // reaching this line means the overflow went unnoticed
        std::process::exit(0);
    }

    use std::os::unix::process::ExitStatusExt;

    let status = std::process::Command::new(std::env::current_exe().unwrap())
        .args([
            "--exact",
            "dispatch_test::test_stack_overflow_is_fatal",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(OVERFLOW_CHILD_ENV, "1")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();

    assert!(!status.success());
    assert!(status.signal().is_some(), "child exited with {:?}", status);
}
