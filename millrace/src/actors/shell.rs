//! An actor that executes an external command.

use std::process::Command;
use std::sync::Arc;

use crate::actor::{Actor, Node, RunResult, Task};
use crate::error::{ActorError, FlowError};
use crate::value::Value;

/// An actor running `base_command` with the inport value(s) appended.
///
/// One firing consumes one value from `inp` (a `Str` for a single
/// argument or a `List` of them) and emits the command's exit code on
/// `ret`, standard output on `stdout`, and standard error on `stderr`.
/// Text mode (the default) emits `Str` values; `binary` mode emits the raw
/// `Bytes`. `shell` mode joins the command line and runs it through
/// `sh -c`.
pub struct ShellRunner {
    node: Node,
    base_command: Vec<String>,
    shell: bool,
    binary: bool,
}

impl ShellRunner {
    /// A runner for `base_command`.
    pub fn new(name: &str, base_command: &[&str]) -> Result<ShellRunner, FlowError> {
        let mut node = Node::new(name);
        node.add_inport("inp")?;
        node.add_outport("stdout")?;
        node.add_outport("stderr")?;
        node.add_outport("ret")?;
        Ok(ShellRunner {
            node,
            base_command: base_command.iter().map(|s| (*s).to_owned()).collect(),
            shell: false,
            binary: false,
        })
    }

    /// Runs the joined command line through `sh -c`.
    pub fn shell(mut self, shell: bool) -> ShellRunner {
        self.shell = shell;
        self
    }

    /// Emits `Bytes` instead of text on `stdout` and `stderr`.
    pub fn binary(mut self, binary: bool) -> ShellRunner {
        self.binary = binary;
        self
    }
}

impl Actor for ShellRunner {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn task(&self) -> Task {
        let base = self.base_command.clone();
        let shell = self.shell;
        let binary = self.binary;
        Arc::new(move |args| {
            let mut command_line = base.clone();
            for value in args.args {
                match value {
                    Value::List(items) => {
                        command_line.extend(items.into_iter().map(|v| v.to_string()));
                    }
                    other => command_line.push(other.to_string()),
                }
            }
            let (program, rest) = command_line
                .split_first()
                .ok_or_else(|| ActorError::message("empty command line"))?;
            let output = if shell {
                Command::new("sh").arg("-c").arg(command_line.join(" ")).output()?
            } else {
                Command::new(program).args(rest).output()?
            };
            let ret = i64::from(output.status.code().unwrap_or(-1));
            let (stdout, stderr) = if binary {
                (Value::Bytes(output.stdout), Value::Bytes(output.stderr))
            } else {
                (
                    Value::Str(String::from_utf8_lossy(&output.stdout).into_owned()),
                    Value::Str(String::from_utf8_lossy(&output.stderr).into_owned()),
                )
            };
            Ok(RunResult::Emit(vec![
                ("ret".to_owned(), Value::Int(ret)),
                ("stdout".to_owned(), stdout),
                ("stderr".to_owned(), stderr),
            ]))
        })
    }
}
