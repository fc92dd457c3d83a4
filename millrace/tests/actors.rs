use std::io::Write;

use millrace::{
    spawn, FuncActor, Iterate, LineReader, LinearizedScheduler, Scheduler, ShellRunner, Sink,
    Value,
};

fn plus_one_plus_two() -> FuncActor {
    FuncActor::new("f", &["x", "y"], &["a", "b"], |args| {
        vec![
            Value::from(args[0].as_int().unwrap() + 1),
            Value::from(args[1].as_float().unwrap() + 2.0),
        ]
    })
    .unwrap()
}

#[test]
fn func_actor_routes_results_to_named_outports() {
    let actor = spawn(plus_one_plus_two());
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&actor.inport("x").unwrap(), Value::from(2)).unwrap();
    scheduler.put_value(&actor.inport("y").unwrap(), Value::from(3.1)).unwrap();
    scheduler.execute().unwrap();

    assert_eq!(actor.outport("a").unwrap().pop().unwrap(), Value::from(2 + 1));
    assert_eq!(actor.outport("b").unwrap().pop().unwrap(), Value::from(3.1 + 2.0));
}

#[test]
fn func_actor_call_matches_the_dataflow_path() {
    let direct = plus_one_plus_two();
    let called = direct.call(&[Value::from(2), Value::from(3.1)]).unwrap();

    let actor = spawn(plus_one_plus_two());
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&actor.inport("x").unwrap(), Value::from(2)).unwrap();
    scheduler.put_value(&actor.inport("y").unwrap(), Value::from(3.1)).unwrap();
    scheduler.execute().unwrap();

    assert_eq!(actor.outport("a").unwrap().pop().unwrap(), called[0]);
    assert_eq!(actor.outport("b").unwrap().pop().unwrap(), called[1]);
}

#[test]
fn shell_runner_captures_exit_code_and_output() {
    let runner = spawn(ShellRunner::new("echo", &["echo"]).unwrap().shell(true));
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&runner.inport("inp").unwrap(), Value::from("test")).unwrap();
    scheduler.execute().unwrap();

    let ret = runner.outport("ret").unwrap().pop().unwrap();
    let stdout = runner.outport("stdout").unwrap().pop().unwrap();
    let stderr = runner.outport("stderr").unwrap().pop().unwrap();
    assert_eq!(ret, Value::from(0));
    assert_eq!(stdout.as_str().unwrap().trim(), "test");
    assert_eq!(stderr.as_str().unwrap().trim(), "");
}

#[test]
fn line_reader_streams_trimmed_lines() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "  first  ").unwrap();
    writeln!(file, "second").unwrap();
    file.flush().unwrap();

    let reader = spawn(LineReader::new("lines").unwrap());
    let mut scheduler = LinearizedScheduler::new();
    let path = file.path().to_str().unwrap().to_owned();
    scheduler.put_value(&reader.inport("path").unwrap(), Value::from(path)).unwrap();
    scheduler.execute().unwrap();

    let line = reader.outport("line").unwrap();
    assert_eq!(line.pop().unwrap(), Value::from("first"));
    assert_eq!(line.pop().unwrap(), Value::from("second"));
    assert!(line.is_empty());
}

#[test]
fn iterate_emits_collection_items_in_order() {
    let iterate = spawn(Iterate::new("items").unwrap());
    let mut scheduler = LinearizedScheduler::new();
    let collection = Value::List(vec![Value::from(1), Value::from(2), Value::from(3)]);
    scheduler.put_value(&iterate.inport("collection").unwrap(), collection).unwrap();
    scheduler.execute().unwrap();

    let item = iterate.outport("item").unwrap();
    assert_eq!(item.pop().unwrap(), Value::from(1));
    assert_eq!(item.pop().unwrap(), Value::from(2));
    assert_eq!(item.pop().unwrap(), Value::from(3));
}

#[test]
fn sink_discards_everything() {
    let sink = spawn(Sink::new("drain", &["a", "b"]).unwrap());
    let mut scheduler = LinearizedScheduler::new();
    scheduler.put_value(&sink.inport("a").unwrap(), Value::from(1)).unwrap();
    scheduler.put_value(&sink.inport("b").unwrap(), Value::from(2)).unwrap();
    scheduler.execute().unwrap();

    assert!(sink.inport("a").unwrap().is_empty());
    assert!(sink.inport("b").unwrap().is_empty());
}
