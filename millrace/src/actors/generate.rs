//! Generator actors: one firing, a stream of emissions.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use crate::actor::{Actor, Node, RunResult, Task};
use crate::error::{ActorError, FlowError};
use crate::value::Value;

/// An actor that reads a file and emits every line separately.
///
/// One firing pops a path from the inport and streams the file's lines,
/// trimmed, on the outport. The file is opened where the firing executes,
/// so under a cluster scheduler the path must resolve on the engines.
pub struct LineReader {
    node: Node,
    outport_name: String,
}

impl LineReader {
    /// A reader with inport `path` and outport `line`.
    pub fn new(name: &str) -> Result<LineReader, FlowError> {
        LineReader::with_port_names(name, "path", "line")
    }

    /// A reader with custom port names.
    pub fn with_port_names(
        name: &str,
        inport_name: &str,
        outport_name: &str,
    ) -> Result<LineReader, FlowError> {
        let mut node = Node::new(name);
        node.add_inport(inport_name)?;
        node.add_outport(outport_name)?;
        Ok(LineReader { node, outport_name: outport_name.to_owned() })
    }
}

impl Actor for LineReader {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        let outport = self.outport_name.clone();
        Arc::new(move |args| {
            let path = args
                .args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| ActorError::message("line reader expects a path string"))?
                .to_owned();
            let reader = BufReader::new(File::open(path)?);
            let outport = outport.clone();
            Ok(RunResult::Stream(Box::new(
                reader
                    .lines()
                    .map_while(Result::ok)
                    .map(move |line| (outport.clone(), Value::Str(line.trim().to_owned()))),
            )))
        })
    }
}

/// An actor that emits the items of a collection one by one.
///
/// One firing pops a `List` (or a `Str`, iterated per character) and
/// streams the items on the outport.
pub struct Iterate {
    node: Node,
    outport_name: String,
}

impl Iterate {
    /// An iterator actor with inport `collection` and outport `item`.
    pub fn new(name: &str) -> Result<Iterate, FlowError> {
        Iterate::with_port_names(name, "collection", "item")
    }

    /// An iterator actor with custom port names.
    pub fn with_port_names(
        name: &str,
        inport_name: &str,
        outport_name: &str,
    ) -> Result<Iterate, FlowError> {
        let mut node = Node::new(name);
        node.add_inport(inport_name)?;
        node.add_outport(outport_name)?;
        Ok(Iterate { node, outport_name: outport_name.to_owned() })
    }
}

impl Actor for Iterate {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        let outport = self.outport_name.clone();
        Arc::new(move |args| {
            let collection = args
                .args
                .into_iter()
                .next()
                .ok_or_else(|| ActorError::message("iterate expects a collection"))?;
            let items: Vec<Value> = match collection {
                Value::List(items) => items,
                Value::Str(text) => {
                    text.chars().map(|c| Value::Str(c.to_string())).collect()
                }
                other => {
                    return Err(ActorError::message(format!(
                        "iterate cannot split {:?}",
                        other,
                    )))
                }
            };
            let outport = outport.clone();
            Ok(RunResult::Stream(Box::new(
                items.into_iter().map(move |item| (outport.clone(), item)),
            )))
        })
    }
}
