//! Buffered, connectable endpoints on actors and workflow boundaries.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use smallvec::SmallVec;

use crate::actor::{ActorRef, ActorSlot};
use crate::error::FlowError;
use crate::value::Value;

/// Whether a port consumes or emits values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// The port consumes values; firing rules are evaluated over it.
    Input,
    /// The port emits values; propagation drains it.
    Output,
}

pub(crate) enum Owner {
    /// A port on a registered actor.
    Actor(Weak<ActorSlot>),
    /// A pass-through proxy on a workflow boundary.
    Boundary,
}

struct Links {
    /// Dataflow peers (inports seen from an outport and vice versa).
    connections: SmallVec<[Weak<PortCell>; 2]>,
    /// Proxy delivery targets; only boundary ports have any.
    forwards: SmallVec<[Weak<PortCell>; 2]>,
}

pub(crate) struct PortCell {
    name: String,
    direction: Direction,
    owner: OnceLock<Owner>,
    buffer: Mutex<VecDeque<Value>>,
    links: Mutex<Links>,
}

/// A cheap cloneable handle to one port.
///
/// All handles to the same port share the buffer and connection state, so a
/// port can sit in an actor's group while schedulers pass copies of the
/// handle through their queues.
#[derive(Clone)]
pub struct Port {
    cell: Arc<PortCell>,
}

impl Port {
    pub(crate) fn new(name: &str, direction: Direction) -> Port {
        Port {
            cell: Arc::new(PortCell {
                name: name.to_owned(),
                direction,
                owner: OnceLock::new(),
                buffer: Mutex::new(VecDeque::new()),
                links: Mutex::new(Links {
                    connections: SmallVec::new(),
                    forwards: SmallVec::new(),
                }),
            }),
        }
    }

    /// The port's name within its group.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Whether the port consumes or emits.
    pub fn direction(&self) -> Direction {
        self.cell.direction
    }

    /// Buffers `value` and reports whether the owning actor's firing rule
    /// is now satisfied.
    ///
    /// `put` never fires anything itself; acting on the report is the
    /// scheduler's decision. Output and boundary ports always report
    /// `false`.
    pub fn put(&self, value: Value) -> bool {
        self.cell
            .buffer
            .lock()
            .expect("port buffer poisoned")
            .push_back(value);
        if self.cell.direction != Direction::Input {
            return false;
        }
        match self.owner_actor() {
            Some(actor) => actor.can_run(),
            None => false,
        }
    }

    /// Removes and returns the oldest buffered value.
    pub fn pop(&self) -> Result<Value, FlowError> {
        self.try_pop().ok_or_else(|| FlowError::EmptyPort {
            port: self.cell.name.clone(),
        })
    }

    /// Removes and returns the oldest buffered value, if any.
    pub fn try_pop(&self) -> Option<Value> {
        self.cell
            .buffer
            .lock()
            .expect("port buffer poisoned")
            .pop_front()
    }

    /// A copy of the oldest buffered value, if any.
    pub fn peek(&self) -> Option<Value> {
        self.cell
            .buffer
            .lock()
            .expect("port buffer poisoned")
            .front()
            .cloned()
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.cell.buffer.lock().expect("port buffer poisoned").len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Symmetrically connects this port with `peer`.
    ///
    /// One endpoint must be an output and the other an input. When the
    /// output endpoint is a workflow boundary, the input becomes one of its
    /// forward targets instead of a dataflow peer.
    pub fn connect(&self, peer: &Port) -> Result<(), FlowError> {
        let (out, inp) = match (self.direction(), peer.direction()) {
            (Direction::Output, Direction::Input) => (self, peer),
            (Direction::Input, Direction::Output) => (peer, self),
            _ => {
                return Err(FlowError::BadConnection {
                    from: self.name().to_owned(),
                    to: peer.name().to_owned(),
                })
            }
        };
        if out.is_boundary() {
            out.push_forward(inp);
        } else {
            out.push_connection(inp);
        }
        inp.push_connection(out);
        Ok(())
    }

    /// True when at least one live connection exists.
    pub fn is_connected(&self) -> bool {
        !self.connections().is_empty()
    }

    /// The live dataflow peers of this port.
    pub fn connections(&self) -> Vec<Port> {
        self.cell
            .links
            .lock()
            .expect("port links poisoned")
            .connections
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cell| Port { cell })
            .collect()
    }

    /// The actor owning this port, if it has been registered.
    pub fn owner_actor(&self) -> Option<ActorRef> {
        match self.cell.owner.get() {
            Some(Owner::Actor(slot)) => slot.upgrade().map(ActorRef::from_slot),
            _ => None,
        }
    }

    /// The registered owner's engine-unique id, if any.
    pub(crate) fn owner_id(&self) -> Option<usize> {
        self.owner_actor().map(|actor| actor.id())
    }

    pub(crate) fn is_boundary(&self) -> bool {
        matches!(self.cell.owner.get(), Some(Owner::Boundary))
    }

    pub(crate) fn bind_owner(&self, owner: Owner) {
        if self.cell.owner.set(owner).is_err() {
            // Rebinding happens only if an actor is registered twice.
            panic!("port {:?} already has an owner", self.cell.name);
        }
    }

    pub(crate) fn forward_targets(&self) -> Vec<Port> {
        self.cell
            .links
            .lock()
            .expect("port links poisoned")
            .forwards
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cell| Port { cell })
            .collect()
    }

    pub(crate) fn push_forward(&self, target: &Port) {
        self.cell
            .links
            .lock()
            .expect("port links poisoned")
            .forwards
            .push(Arc::downgrade(&target.cell));
    }

    pub(crate) fn push_connection(&self, peer: &Port) {
        self.cell
            .links
            .lock()
            .expect("port links poisoned")
            .connections
            .push(Arc::downgrade(&peer.cell));
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.cell.name)
            .field("direction", &self.cell.direction)
            .field("buffered", &self.len())
            .finish()
    }
}

/// An ordered, name-indexed collection of ports with one direction.
pub struct PortGroup {
    direction: Direction,
    ports: Vec<Port>,
}

impl PortGroup {
    /// An empty group of `direction` ports.
    pub fn new(direction: Direction) -> PortGroup {
        PortGroup { direction, ports: Vec::new() }
    }

    /// The direction every port in this group has.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Creates a port named `name` at the end of the group.
    pub fn append(&mut self, name: &str) -> Result<Port, FlowError> {
        if self.get(name).is_some() {
            return Err(FlowError::DuplicatePort { port: name.to_owned() });
        }
        let port = Port::new(name, self.direction);
        self.ports.push(port.clone());
        Ok(port)
    }

    /// Looks a port up by name.
    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|port| port.name() == name)
    }

    /// The port at position `index`, in insertion order.
    pub fn at(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    /// Number of ports in the group.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True when the group has no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterates the ports in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    /// The names of the ports, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.ports.iter().map(|port| port.name().to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_preserve_delivery_order() {
        let port = Port::new("in", Direction::Input);
        assert!(!port.put(Value::from(1)));
        assert!(!port.put(Value::from(2)));
        assert_eq!(port.peek(), Some(Value::from(1)));
        assert_eq!(port.pop().unwrap(), Value::from(1));
        assert_eq!(port.pop().unwrap(), Value::from(2));
        assert!(matches!(port.pop(), Err(FlowError::EmptyPort { .. })));
    }

    #[test]
    fn connect_rejects_matching_directions() {
        let a = Port::new("a", Direction::Input);
        let b = Port::new("b", Direction::Input);
        assert!(matches!(a.connect(&b), Err(FlowError::BadConnection { .. })));

        let out = Port::new("out", Direction::Output);
        let inp = Port::new("in", Direction::Input);
        out.connect(&inp).unwrap();
        assert!(out.is_connected());
        assert!(inp.is_connected());
        assert_eq!(out.connections().len(), 1);
    }

    #[test]
    fn groups_are_ordered_and_unique() {
        let mut group = PortGroup::new(Direction::Input);
        group.append("x").unwrap();
        group.append("y").unwrap();
        assert!(matches!(
            group.append("x"),
            Err(FlowError::DuplicatePort { .. })
        ));
        assert_eq!(group.names(), vec!["x".to_owned(), "y".to_owned()]);
        assert_eq!(group.at(1).unwrap().name(), "y");
        assert!(group.get("z").is_none());
    }
}
