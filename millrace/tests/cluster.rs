use std::time::Duration;

use millrace::cluster::{register_profile, ClusterConfig};
use millrace::{
    spawn, ActorError, ActorRef, ClusterScheduler, FlowError, FuncActor, LinearizedScheduler,
    MultiClusterConfig, MultiClusterScheduler, Scheduler, Splitter, ThreadedScheduler, Value,
    Workflow,
};

fn increment(name: &str) -> ActorRef {
    spawn(
        FuncActor::new(name, &["x"], &["x"], |args| {
            vec![Value::from(args[0].as_int().unwrap() + 1)]
        })
        .unwrap(),
    )
}

fn increment_chain() -> Workflow {
    let stages = [increment("s1"), increment("s2"), increment("s3")];
    Workflow::chain("chain", &stages).unwrap()
}

fn run_chain(scheduler: &mut dyn Scheduler) -> Value {
    let chain = increment_chain();
    scheduler
        .run_workflow(&chain, vec![("x".to_owned(), Value::from(5))])
        .unwrap();
    chain.outport("x").unwrap().pop().unwrap()
}

#[test]
fn chain_output_is_scheduler_independent() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut linearized = LinearizedScheduler::new();
    assert_eq!(run_chain(&mut linearized), Value::from(8));

    let mut threaded = ThreadedScheduler::new(3);
    assert_eq!(run_chain(&mut threaded), Value::from(8));

    let mut cluster = ClusterScheduler::local(2).unwrap();
    assert_eq!(run_chain(&mut cluster), Value::from(8));
}

#[test]
fn system_actors_keep_state_under_the_cluster_scheduler() {
    let splitter = spawn(Splitter::new("splitter", 3).unwrap());
    let mut scheduler = ClusterScheduler::local(2).unwrap();
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

#[test]
fn remote_failures_abort_execute() {
    let failing = spawn(
        FuncActor::fallible("failing", &["x"], &["out"], |_| {
            Err(ActorError::message("engine-side failure"))
        })
        .unwrap(),
    );
    let mut scheduler = ClusterScheduler::local(1).unwrap();
    scheduler.put_value(&failing.inport("x").unwrap(), Value::from(1)).unwrap();
    match scheduler.execute() {
        Err(FlowError::ActorFailed { actor, .. }) => assert_eq!(actor, "failing"),
        other => panic!("expected ActorFailed, got {:?}", other),
    }
}

#[test]
fn cluster_scheduler_respects_the_connection_budget() {
    let config = ClusterConfig::profile("never-registered")
        .with_timeout(Duration::from_millis(50));
    assert!(matches!(
        ClusterScheduler::connect(config),
        Err(FlowError::Cluster(_))
    ));
}

#[test]
fn multi_cluster_rotates_over_registered_profiles() {
    register_profile("mc-left", 1);
    register_profile("mc-right", 1);
    let config = MultiClusterConfig {
        profiles: vec!["mc-left".to_owned(), "mc-right".to_owned()],
        ..MultiClusterConfig::default()
    };
    let mut scheduler = MultiClusterScheduler::connect(config).unwrap();
    assert_eq!(scheduler.clusters(), 2);
    assert_eq!(run_chain(&mut scheduler), Value::from(8));
}

#[test]
fn multi_cluster_requires_some_source() {
    let config = MultiClusterConfig::default();
    assert!(matches!(
        MultiClusterScheduler::connect(config),
        Err(FlowError::BadConfiguration(_))
    ));
}

#[test]
fn workflow_owned_scheduler_takes_over() {
    let chain = increment_chain();
    chain.set_scheduler(Box::new(LinearizedScheduler::new()));

    // The driving scheduler only forwards; the owned one does the work.
    let mut outer = ClusterScheduler::local(1).unwrap();
    outer
        .run_workflow(&chain, vec![("x".to_owned(), Value::from(5))])
        .unwrap();
    assert_eq!(chain.outport("x").unwrap().pop().unwrap(), Value::from(8));
}

#[test]
fn unknown_workflow_inputs_are_rejected() {
    let chain = increment_chain();
    let mut scheduler = LinearizedScheduler::new();
    match scheduler.run_workflow(&chain, vec![("nope".to_owned(), Value::from(1))]) {
        Err(FlowError::UnknownInport { actor, port }) => {
            assert_eq!(actor, "chain");
            assert_eq!(port, "nope");
        }
        other => panic!("expected UnknownInport, got {:?}", other),
    }
}
