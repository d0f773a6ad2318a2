//! The interactive loop: prompt, line splitting, command dispatch.

use crate::commands;
use crate::error::ShellError;
use crate::params::split_command_line;
use crate::session::DebugSession;
use std::io::{BufRead, Write};

/// Metadata for one shell command; the table drives dispatch, help and
/// completion.
pub struct CommandMeta {
    /// Command name as typed.
    pub name: &'static str,
    /// Usage line shown by `help`.
    pub usage: &'static str,
    /// One-line description.
    pub help: &'static str,
    /// Fewest accepted arguments.
    pub min_args: usize,
}

/// Every command the shell understands.
pub const COMMANDS: &[CommandMeta] = &[
    CommandMeta { name: "exit", usage: "exit", help: "Exit the VM prompt", min_args: 0 },
    CommandMeta { name: "help", usage: "help", help: "Show this help", min_args: 0 },
    CommandMeta { name: "ip", usage: "ip", help: "Show the current instruction", min_args: 0 },
    CommandMeta { name: "break", usage: "break <ip>", help: "Place a breakpoint", min_args: 1 },
    CommandMeta { name: "jump", usage: "jump <ip>", help: "Move the instruction pointer", min_args: 1 },
    CommandMeta { name: "estack", usage: "estack", help: "Show the evaluation stack", min_args: 0 },
    CommandMeta { name: "istack", usage: "istack", help: "Show the invocation stack", min_args: 0 },
    CommandMeta { name: "sslot", usage: "sslot", help: "Show the static slot", min_args: 0 },
    CommandMeta { name: "lslot", usage: "lslot", help: "Show the local slot", min_args: 0 },
    CommandMeta { name: "aslot", usage: "aslot", help: "Show the argument slot", min_args: 0 },
    CommandMeta {
        name: "loadhex",
        usage: "loadhex <hex> [--historic <h>] [--gas <g>] [-- <signer>...]",
        help: "Load a hex-encoded script",
        min_args: 1,
    },
    CommandMeta {
        name: "loadbase64",
        usage: "loadbase64 <base64> [--historic <h>] [--gas <g>] [-- <signer>...]",
        help: "Load a base64-encoded script",
        min_args: 1,
    },
    CommandMeta {
        name: "loadnef",
        usage: "loadnef <file.nef> [<file.manifest.json>] [--historic <h>] [--gas <g>] [-- <signer>...]",
        help: "Load a NEF file with its manifest",
        min_args: 1,
    },
    CommandMeta {
        name: "loadgo",
        usage: "loadgo <file> [--historic <h>] [--gas <g>] [-- <signer>...]",
        help: "Compile a source file and load it",
        min_args: 1,
    },
    CommandMeta {
        name: "loadtx",
        usage: "loadtx <hash|file> [--historic <h>] [--gas <g>]",
        help: "Load a transaction from the chain or a parameter context file",
        min_args: 1,
    },
    CommandMeta {
        name: "loaddeployed",
        usage: "loaddeployed <hash|address|id> [--historic <h>] [--gas <g>] [-- <signer>...]",
        help: "Load a deployed contract",
        min_args: 1,
    },
    CommandMeta { name: "reset", usage: "reset", help: "Unload the script", min_args: 0 },
    CommandMeta { name: "parse", usage: "parse <arg>", help: "Print possible interpretations", min_args: 1 },
    CommandMeta {
        name: "run",
        usage: "run [<method> [<parameter>...]]",
        help: "Execute the script, optionally from a manifest method",
        min_args: 0,
    },
    CommandMeta { name: "cont", usage: "cont", help: "Continue execution", min_args: 0 },
    CommandMeta { name: "step", usage: "step [<n>]", help: "Step <n> instructions (default 1)", min_args: 0 },
    CommandMeta { name: "stepinto", usage: "stepinto", help: "Step one instruction, entering calls", min_args: 0 },
    CommandMeta { name: "stepout", usage: "stepout", help: "Run until the current context returns", min_args: 0 },
    CommandMeta { name: "stepover", usage: "stepover", help: "Step one instruction, over calls", min_args: 0 },
    CommandMeta { name: "ops", usage: "ops", help: "Disassemble the loaded script", min_args: 0 },
    CommandMeta { name: "events", usage: "events", help: "Show accumulated events", min_args: 0 },
    CommandMeta { name: "env", usage: "env [-v]", help: "Show chain and debugger environment", min_args: 0 },
    CommandMeta {
        name: "storage",
        usage: "storage <contract> [<prefix>] [--backwards] [--diff]",
        help: "Dump contract storage",
        min_args: 1,
    },
    CommandMeta {
        name: "changes",
        usage: "changes [<contract> [<prefix>]]",
        help: "Show pending storage operations",
        min_args: 0,
    },
    CommandMeta { name: "history", usage: "history", help: "Show command history", min_args: 0 },
];

/// The interactive debugger shell.
pub struct Shell<R, W> {
    reader: R,
    /// Every command writes through here.
    pub writer: W,
    /// The chain and load state.
    pub session: DebugSession,
    history: Vec<String>,
    done: bool,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    /// Creates a shell over the given streams.
    pub fn new(session: DebugSession, reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            session,
            history: Vec::new(),
            done: false,
        }
    }

    /// Marks the loop for termination.
    pub fn request_exit(&mut self) {
        self.done = true;
    }

    /// The command history so far.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Command names matching a prefix, for completion.
    pub fn complete(&self, prefix: &str) -> Vec<&'static str> {
        COMMANDS
            .iter()
            .map(|meta| meta.name)
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    /// The prompt reflecting VM readiness.
    pub fn prompt(&self) -> String {
        match self.session.instruction_pointer() {
            Some(ip) => format!("NEO-GO-VM {ip} > "),
            None => "NEO-GO-VM > ".to_string(),
        }
    }

    /// Runs the loop until `exit` or EOF. Returns the process exit code.
    pub fn run(&mut self) -> std::io::Result<i32> {
        while !self.done {
            let prompt = self.prompt();
            write!(self.writer, "{prompt}")?;
            self.writer.flush()?;

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                break; // EOF exits cleanly
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.to_string());
            if let Err(error) = self.handle_line(line) {
                writeln!(self.writer, "Error: {error}")?;
            }
        }
        Ok(0)
    }

    /// Splits and dispatches one command line.
    pub fn handle_line(&mut self, line: &str) -> Result<(), ShellError> {
        let words = split_command_line(line)?;
        let Some((name, arguments)) = words.split_first() else {
            return Ok(());
        };
        let meta = COMMANDS
            .iter()
            .find(|meta| meta.name == name.as_str())
            .ok_or_else(|| ShellError::UnknownCommand(name.clone()))?;
        if arguments.len() < meta.min_args {
            return Err(ShellError::MissingArgument(meta.usage));
        }
        commands::dispatch(self, meta.name, arguments)
    }
}
