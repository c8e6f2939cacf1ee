/*!
 * Queue Tests
 * Into/Out, rank ordering and interaction with the calendar
 */

use pretty_assertions::assert_eq;
use procsim::{Name, ProcessQueue, Queue, ResourceError, SimError, Simulation};

#[test]
fn test_into_and_out_of_queue() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.into_queue(&queue).unwrap();
    assert!(queue.contains(&p));
    assert_eq!(p.queue().map(|q| q.name()), Some(Name::from("line")));

    p.out_of_queue().unwrap();
    assert!(queue.is_empty());
    assert!(p.queue().is_none());

    assert_eq!(
        p.out_of_queue(),
        Err(SimError::Resource(ResourceError::NotQueued {
            queue: "<none>".into(),
            process: "p".into(),
        }))
    );
}

#[test]
fn test_joining_another_queue_leaves_the_first() {
    let sim = Simulation::new().unwrap();
    let first = Queue::new("first");
    let second = Queue::new("second");
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.into_queue(&first).unwrap();
    p.into_queue(&second).unwrap();

    assert!(first.is_empty());
    assert_eq!(second.processes(), vec![p.clone()]);
    assert_eq!(p.queue().map(|q| q.name()), Some(Name::from("second")));
}

#[test]
fn test_rank_order_with_fifo_ties() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("ranked");
    let a = sim.process("a").create(|_| Ok(())).unwrap();
    let b = sim.process("b").create(|_| Ok(())).unwrap();
    let c = sim.process("c").create(|_| Ok(())).unwrap();
    let d = sim.process("d").create(|_| Ok(())).unwrap();

    queue.insert_ranked(&a, (0, 1));
    queue.insert_ranked(&b, (2, 0));
    queue.insert_ranked(&c, (0, 1));
    queue.insert_ranked(&d, (0, 5));

    assert_eq!(
        queue.processes(),
        vec![b.clone(), d.clone(), a.clone(), c.clone()]
    );
    assert_eq!(queue.front(), Some(b.clone()));

    assert_eq!(queue.pop_front(), Some(b.clone()));
    assert!(b.queue().is_none());
    assert_eq!(queue.len(), 3);
}

#[test]
fn test_plain_insert_uses_process_priority() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let low = sim.process("low").priority(1).create(|_| Ok(())).unwrap();
    let high = sim.process("high").priority(7).create(|_| Ok(())).unwrap();

    low.into_queue(&queue).unwrap();
    high.into_queue(&queue).unwrap();

    assert_eq!(queue.processes(), vec![high.clone(), low.clone()]);
}

#[test]
fn test_joining_a_queue_cancels_pending_activation() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let p = sim.process("p").start_at(3.0).create(|_| Ok(())).unwrap();
    assert_eq!(p.activation_time(), Some(3.0));

    p.into_queue(&queue).unwrap();

    assert_eq!(p.activation_time(), None);
    assert_eq!(sim.calendar_len(), 0);
}

#[test]
fn test_activating_a_queued_process_removes_it() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.into_queue(&queue).unwrap();
    p.activate_at(2.0).unwrap();

    assert!(queue.is_empty());
    assert!(p.queue().is_none());
    assert_eq!(p.activation_time(), Some(2.0));
}

#[test]
fn test_terminated_process_leaves_queue_and_cannot_rejoin() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.into_queue(&queue).unwrap();
    p.terminate().unwrap();

    assert!(queue.is_empty());
    assert!(p.into_queue(&queue).is_err());
}

#[test]
fn test_queue_seen_through_trait_object() {
    let sim = Simulation::new().unwrap();
    let queue = Queue::new("line");
    let p = sim.process("p").create(|_| Ok(())).unwrap();

    p.into_queue(&queue).unwrap();
    let membership = p.queue().unwrap();

    assert_eq!(membership.len(), 1);
    assert!(!membership.is_empty());
    assert!(membership.remove(&p));
    assert!(!membership.remove(&p));
    assert!(queue.is_empty());
}
