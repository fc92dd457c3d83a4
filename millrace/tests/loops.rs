use millrace::{
    spawn, ActorRef, FuncActor, LinearizedScheduler, LoopWhile, NaiveScheduler, Scheduler, Value,
};

fn increment(name: &str) -> ActorRef {
    spawn(
        FuncActor::new(name, &["x"], &["x"], |args| {
            vec![Value::from(args[0].as_int().unwrap() + 1)]
        })
        .unwrap(),
    )
}

#[test]
fn while_loop_wired_by_hand() {
    let body = increment("inc");
    let looper = spawn(LoopWhile::new("a_loop", |v| v.as_int().unwrap() < 10).unwrap());

    looper.outport("loop_out").unwrap().connect(&body.inport("x").unwrap()).unwrap();
    body.outport("x").unwrap().connect(&looper.inport("loop_in").unwrap()).unwrap();

    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&looper.inport("loop_in").unwrap(), Value::from(0)).unwrap();
    scheduler.execute().unwrap();

    assert_eq!(looper.outport("final").unwrap().pop().unwrap(), Value::from(10));
    assert!(looper.outport("loop_out").unwrap().is_empty());
    assert!(looper.outport("final").unwrap().is_empty());
}

#[test]
fn while_loop_with_inner_actor() {
    let body = increment("inc");
    let looper = spawn(
        LoopWhile::with_inner("a_loop", |v| v.as_int().unwrap() < 10, &body).unwrap(),
    );

    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&looper.inport("loop_in").unwrap(), Value::from(0)).unwrap();
    scheduler.execute().unwrap();

    assert_eq!(looper.outport("final").unwrap().pop().unwrap(), Value::from(10));
}

#[test]
fn while_loop_under_the_naive_scheduler() {
    let body = increment("inc");
    let looper = spawn(
        LoopWhile::with_inner("a_loop", |v| v.as_int().unwrap() < 10, &body).unwrap(),
    );

    let mut scheduler = NaiveScheduler::new();
    scheduler.put_value(&looper.inport("loop_in").unwrap(), Value::from(0)).unwrap();
    scheduler.execute().unwrap();

    assert_eq!(looper.outport("final").unwrap().pop().unwrap(), Value::from(10));
}
