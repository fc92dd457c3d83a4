use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use millrace::{
    spawn, Actor, ActorRef, ActorError, FlowError, FuncActor, LinearizedScheduler, Node,
    RunResult, Scheduler, Splitter, Task, ThreadedScheduler, Value,
};

fn increment(name: &str) -> ActorRef {
    spawn(
        FuncActor::new(name, &["x"], &["x"], |args| {
            vec![Value::from(args[0].as_int().unwrap() + 1)]
        })
        .unwrap(),
    )
}

/// A three-stage increment pipeline; returns its entry and exit ports.
fn pipeline() -> (millrace::Port, millrace::Port) {
    let stages = [increment("s1"), increment("s2"), increment("s3")];
    millrace::chain_actors(&stages).unwrap();
    (
        stages[0].inport("x").unwrap(),
        stages[2].outport("x").unwrap(),
    )
}

#[test]
fn linearized_and_threaded_agree_on_final_buffers() {
    let reference = {
        let (entry, exit) = pipeline();
        let mut scheduler = LinearizedScheduler::new();
        for seed in [1, 2, 3] {
            scheduler.put_value(&entry, Value::from(seed)).unwrap();
        }
        scheduler.execute().unwrap();
        std::iter::from_fn(|| exit.try_pop()).collect::<Vec<_>>()
    };
    assert_eq!(reference, vec![Value::from(4), Value::from(5), Value::from(6)]);

    let (entry, exit) = pipeline();
    let mut scheduler = ThreadedScheduler::new(4);
    for seed in [1, 2, 3] {
        scheduler.put_value(&entry, Value::from(seed)).unwrap();
    }
    scheduler.execute().unwrap();
    let threaded = std::iter::from_fn(|| exit.try_pop()).collect::<Vec<_>>();

    assert_eq!(threaded, reference);
}

#[test]
fn threaded_never_overlaps_firings_of_one_actor() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));
    let active_in_task = Arc::clone(&active);
    let overlapped_in_task = Arc::clone(&overlapped);
    let slow = spawn(
        FuncActor::new("slow", &["x"], &["x"], move |args| {
            if active_in_task.fetch_add(1, Ordering::SeqCst) > 0 {
                overlapped_in_task.store(true, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(2));
            active_in_task.fetch_sub(1, Ordering::SeqCst);
            vec![args[0].clone()]
        })
        .unwrap(),
    );

    let mut scheduler = ThreadedScheduler::new(4);
    let entry = slow.inport("x").unwrap();
    for seed in 0..8 {
        scheduler.put_value(&entry, Value::from(seed)).unwrap();
    }
    scheduler.execute().unwrap();

    assert!(!overlapped.load(Ordering::SeqCst));
    assert_eq!(slow.outport("x").unwrap().len(), 8);
}

#[test]
fn one_value_consumed_per_inport_per_firing() {
    let merge = spawn(
        FuncActor::new("merge", &["a", "b"], &["sum"], |args| {
            vec![Value::from(
                args[0].as_int().unwrap() + args[1].as_int().unwrap(),
            )]
        })
        .unwrap(),
    );
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&merge.inport("a").unwrap(), Value::from(1)).unwrap();
    scheduler.put_value(&merge.inport("a").unwrap(), Value::from(2)).unwrap();
    scheduler.put_value(&merge.inport("b").unwrap(), Value::from(10)).unwrap();
    scheduler.put_value(&merge.inport("b").unwrap(), Value::from(20)).unwrap();
    scheduler.execute().unwrap();

    let sum = merge.outport("sum").unwrap();
    assert_eq!(sum.pop().unwrap(), Value::from(11));
    assert_eq!(sum.pop().unwrap(), Value::from(22));
    assert!(sum.is_empty());
}

#[test]
fn fan_out_reaches_every_connection_or_stays_buffered() {
    let source = increment("source");
    let left = increment("left");
    let right = increment("right");
    let out = source.outport("x").unwrap();
    out.connect(&left.inport("x").unwrap()).unwrap();
    out.connect(&right.inport("x").unwrap()).unwrap();

    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&source.inport("x").unwrap(), Value::from(1)).unwrap();
    scheduler.execute().unwrap();

    // Both peers received the emission; the connected outport is drained.
    assert!(out.is_empty());
    assert_eq!(left.outport("x").unwrap().pop().unwrap(), Value::from(3));
    assert_eq!(right.outport("x").unwrap().pop().unwrap(), Value::from(3));

    let lonely = increment("lonely");
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&lonely.inport("x").unwrap(), Value::from(1)).unwrap();
    scheduler.execute().unwrap();
    assert_eq!(lonely.outport("x").unwrap().len(), 1);
}

#[test]
fn copies_share_configuration_but_not_queues() {
    let mut original = LinearizedScheduler::new();
    let actor = increment("queued");
    original.put_value(&actor.inport("x").unwrap(), Value::from(1)).unwrap();
    assert_eq!(original.pending(), 1);

    // The copy starts with an empty queue: executing it fires nothing.
    let mut copy = original.copy();
    copy.execute().unwrap();
    assert_eq!(original.pending(), 1);
    assert!(actor.outport("x").unwrap().is_empty());

    let threaded = ThreadedScheduler::new(7);
    let mut copy = threaded.copy();
    copy.execute().unwrap();
    assert_eq!(threaded.max_threads(), 7);
}

#[test]
fn splitter_round_robin_preserves_state_across_firings() {
    let splitter = spawn(Splitter::new("splitter", 3).unwrap());
    let mut scheduler = LinearizedScheduler::new();
    let entry = splitter.inport("in").unwrap();
    for seed in [1, 2, 3, 4] {
        scheduler.put_value(&entry, Value::from(seed)).unwrap();
    }
    scheduler.execute().unwrap();

    let first = splitter.outport("in_1").unwrap();
    assert_eq!(first.pop().unwrap(), Value::from(1));
    assert_eq!(first.pop().unwrap(), Value::from(4));
    assert_eq!(splitter.outport("in_2").unwrap().pop().unwrap(), Value::from(2));
    assert_eq!(splitter.outport("in_3").unwrap().pop().unwrap(), Value::from(3));
}

struct MisbehavingActor {
    node: Node,
}

impl MisbehavingActor {
    fn new() -> MisbehavingActor {
        let mut node = Node::new("misbehaving");
        node.add_inport("x").unwrap();
        node.add_outport("out").unwrap();
        MisbehavingActor { node }
    }
}

impl Actor for MisbehavingActor {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        Arc::new(|_| Ok(RunResult::emit_one("nope", Value::None)))
    }
}

#[test]
fn undeclared_result_keys_abort_execution() {
    let actor = spawn(MisbehavingActor::new());
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&actor.inport("x").unwrap(), Value::from(1)).unwrap();
    match scheduler.execute() {
        Err(FlowError::UnknownOutport { actor, port }) => {
            assert_eq!(actor, "misbehaving");
            assert_eq!(port, "nope");
        }
        other => panic!("expected UnknownOutport, got {:?}", other),
    }
}

#[test]
fn failing_runs_surface_as_actor_failures() {
    let failing = spawn(
        FuncActor::fallible("failing", &["x"], &["out"], |_| {
            Err(ActorError::message("boom"))
        })
        .unwrap(),
    );
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&failing.inport("x").unwrap(), Value::from(1)).unwrap();
    match scheduler.execute() {
        Err(FlowError::ActorFailed { actor, .. }) => assert_eq!(actor, "failing"),
        other => panic!("expected ActorFailed, got {:?}", other),
    }
}

#[test]
fn empty_pop_is_a_programmer_error() {
    let actor = increment("empty");
    match actor.outport("x").unwrap().pop() {
        Err(FlowError::EmptyPort { port }) => assert_eq!(port, "x"),
        other => panic!("expected EmptyPort, got {:?}", other),
    }
}
