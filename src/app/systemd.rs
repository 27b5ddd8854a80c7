// Handles all interactions with `systemctl`, `ss` and the privilege wrapper.

use super::model::ControlAction;
use anyhow::{Context, Result};
use regex::Regex;
use std::process::Command;
use tracing::{debug, info};

/// Captured result of an external command that was able to start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Standard output, trimmed.
    pub stdout: String,
}

pub trait CommandRunner {
    /// Runs `program` to completion. Errors only when it could not be spawned.
    fn exec(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Trimmed stdout, or an empty string if the command could not run.
    ///
    /// A non-zero exit still yields whatever was printed: `systemctl is-active`
    /// reports `inactive` and `failed` that way.
    fn run(&self, program: &str, args: &[&str]) -> String {
        match self.exec(program, args) {
            Ok(output) => output.stdout,
            Err(e) => {
                debug!("{} {:?} unavailable: {:#}", program, args, e);
                String::new()
            }
        }
    }
}

/// Runs commands on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn exec(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .context(format!("Failed to execute {}", program))?;

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        };
        debug!(
            "{} {:?} -> {} ({} bytes)",
            program,
            args,
            output.status,
            result.stdout.len()
        );
        Ok(result)
    }
}

/// The narrow set of service-manager queries and actions the rows need.
pub trait ServiceManager {
    /// First unit file matching any prefix, prefixes tried in order.
    fn find_unit(&self, prefixes: &[String]) -> Option<String>;
    /// Raw activation state; empty when unknown.
    fn active_state(&self, unit: &str) -> String;
    fn main_pid(&self, unit: &str) -> Option<u32>;
    fn listening_port(&self, pid: u32) -> Option<u16>;
    /// Issues a privileged lifecycle command and reports whether it succeeded.
    fn control(&self, unit: &str, action: ControlAction) -> Result<()>;
}

/// `ServiceManager` backed by the `systemctl` and `ss` command-line tools.
#[derive(Debug, Clone)]
pub struct Systemctl<R> {
    runner: R,
    escalation: String,
}

impl<R: CommandRunner> Systemctl<R> {
    pub fn new(runner: R, escalation: impl Into<String>) -> Self {
        Self {
            runner,
            escalation: escalation.into(),
        }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> ServiceManager for Systemctl<R> {
    fn find_unit(&self, prefixes: &[String]) -> Option<String> {
        for prefix in prefixes {
            let pattern = format!("{}*.service", prefix);
            let out = self.runner.run(
                "systemctl",
                &["list-unit-files", &pattern, "-q", "--no-legend"],
            );
            if let Some(unit) = first_unit(&out) {
                info!("Found unit {} for prefix {}", unit, prefix);
                return Some(unit);
            }
        }
        None
    }

    fn active_state(&self, unit: &str) -> String {
        self.runner.run("systemctl", &["is-active", unit])
    }

    fn main_pid(&self, unit: &str) -> Option<u32> {
        parse_main_pid(
            &self
                .runner
                .run("systemctl", &["show", unit, "-p", "MainPID", "--value"]),
        )
    }

    fn listening_port(&self, pid: u32) -> Option<u16> {
        port_for_pid(&self.runner.run("ss", &["-lntup"]), &pid.to_string())
    }

    fn control(&self, unit: &str, action: ControlAction) -> Result<()> {
        info!("{} {} via {}", action.verb(), unit, self.escalation);
        let output = self
            .runner
            .exec(&self.escalation, &["systemctl", action.verb(), unit])
            .context(format!("Failed to {} {}", action.verb(), unit))?;

        if output.success {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} {} was denied or failed",
                action.verb(),
                unit
            ))
        }
    }
}

/// First whitespace-delimited token of the first line.
pub fn first_unit(list_output: &str) -> Option<String> {
    list_output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_string)
}

/// `MainPID` of `0` means the unit has no running process.
pub fn parse_main_pid(value: &str) -> Option<u32> {
    match value.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(pid) => Some(pid),
    }
}

/// Scrapes `ss -lntup` output for the port bound by `pid`.
///
/// Only lines carrying a `pid=<pid>` marker are considered; the first
/// `:<digits>` followed by whitespace on such a line wins.
pub fn port_for_pid(socket_table: &str, pid: &str) -> Option<u16> {
    if pid.is_empty() {
        return None;
    }
    let escaped = regex::escape(pid);
    let marker = Regex::new(&format!(r"\bpid={}\b", escaped)).ok()?;
    let port = Regex::new(&format!(r":(\d+)\s+.*\bpid={}\b", escaped)).ok()?;

    socket_table
        .lines()
        .filter(|line| marker.is_match(line))
        .find_map(|line| port.captures(line))
        .and_then(|caps| caps[1].parse::<u16>().ok())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CommandOutput, CommandRunner};
    use anyhow::Result;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Answers commands from a table and records every invocation.
    ///
    /// Clones share the table and the call log.
    #[derive(Default, Clone)]
    pub struct ScriptedRunner {
        responses: Rc<RefCell<HashMap<String, CommandOutput>>>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, command: &str, stdout: &str) -> &Self {
            self.respond_with(command, true, stdout)
        }

        pub fn respond_with(&self, command: &str, success: bool, stdout: &str) -> &Self {
            self.responses.borrow_mut().insert(
                command.to_string(),
                CommandOutput {
                    success,
                    stdout: stdout.trim().to_string(),
                },
            );
            self
        }

        /// Puts a marker into the call log.
        pub fn note(&self, marker: &str) {
            self.calls.borrow_mut().push(marker.to_string());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn exec(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.borrow_mut().push(line.clone());
            self.responses
                .borrow()
                .get(&line)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such command: {}", line))
        }
    }
}
