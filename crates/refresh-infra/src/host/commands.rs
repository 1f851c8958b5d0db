// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The host command table and deferred command buffer.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use refresh_core::host::{CommandArgs, CommandHandler, Commands, ConsoleVars, ExecWhen};

use super::cvars::CvarStore;

/// Splits command text into lines on newlines and on `;` outside quotes.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ';' if !quoted => lines.push(std::mem::take(&mut current)),
            '\n' | '\r' => {
                quoted = false;
                lines.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    lines.push(current);
    lines.retain(|line| !line.trim().is_empty());
    lines
}

/// Registered commands plus the text buffer feeding them.
///
/// Appended text travels through a `flume` channel so any thread may queue
/// it; inserted text goes to a front queue that is drained first. Lines that
/// do not name a command fall back to console variables (`name` prints,
/// `name value` sets).
pub struct CommandTable {
    handlers: RwLock<HashMap<String, CommandHandler>>,
    executing: Mutex<Vec<CommandArgs>>,
    inserted: Mutex<VecDeque<String>>,
    sender: flume::Sender<String>,
    receiver: flume::Receiver<String>,
    cvars: Arc<CvarStore>,
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("commands", &self.names())
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl CommandTable {
    /// Creates an empty table falling back to `cvars`.
    pub fn new(cvars: Arc<CvarStore>) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            handlers: RwLock::new(HashMap::new()),
            executing: Mutex::new(Vec::new()),
            inserted: Mutex::new(VecDeque::new()),
            sender,
            receiver,
            cvars,
        }
    }

    /// A sender that appends lines to the buffer from anywhere.
    pub fn sender(&self) -> flume::Sender<String> {
        self.sender.clone()
    }

    /// Sorted names of the registered commands.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&name.to_ascii_lowercase())
    }

    /// Runs one line right away. Returns `false` if nothing handled it.
    pub fn execute_line(&self, line: &str) -> bool {
        let args = CommandArgs::tokenize(line);
        let name = args.command();
        if name.is_empty() {
            return true;
        }
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&name)
            .cloned();
        if let Some(handler) = handler {
            self.executing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(args.clone());
            handler(&args);
            self.executing
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop();
            return true;
        }
        match self.cvars.find(&name) {
            Some(cvar) if args.argc() == 1 => {
                log::info!("\"{}\" is:\"{}\"", cvar.name(), cvar.string());
                true
            }
            Some(_) => self.cvars.set_from_console(&name, args.argv(1)),
            None => {
                log::warn!("Unknown command \"{}\"", args.argv(0));
                false
            }
        }
    }

    fn next_line(&self) -> Option<String> {
        let inserted = self
            .inserted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        inserted.or_else(|| self.receiver.try_recv().ok())
    }

    /// Drains the buffer. Returns the number of lines executed.
    pub fn execute_pending(&self) -> usize {
        let mut count = 0;
        while let Some(line) = self.next_line() {
            self.execute_line(&line);
            count += 1;
        }
        count
    }
}

impl Commands for CommandTable {
    fn add_command(&self, name: &str, handler: CommandHandler) {
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_ascii_lowercase(), handler);
        if previous.is_some() {
            log::debug!("Command '{name}' redefined");
        }
    }

    fn remove_command(&self, name: &str) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&name.to_ascii_lowercase());
    }

    fn argc(&self) -> usize {
        self.executing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map_or(0, CommandArgs::argc)
    }

    fn argv(&self, index: usize) -> String {
        self.executing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|args| args.argv(index).to_owned())
            .unwrap_or_default()
    }

    fn execute_text(&self, when: ExecWhen, text: &str) {
        let lines = split_lines(text);
        match when {
            ExecWhen::Now => {
                for line in lines {
                    self.execute_line(&line);
                }
            }
            ExecWhen::Insert => {
                let mut inserted = self.inserted.lock().unwrap_or_else(|e| e.into_inner());
                for line in lines.into_iter().rev() {
                    inserted.push_front(line);
                }
            }
            ExecWhen::Append => {
                for line in lines {
                    if self.sender.send(line).is_err() {
                        log::error!("Command buffer disconnected");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refresh_core::host::CvarFlags;

    fn recording_table() -> (CommandTable, Arc<Mutex<Vec<String>>>) {
        let table = CommandTable::new(Arc::new(CvarStore::new()));
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        table.add_command(
            "echo",
            Arc::new(move |args: &CommandArgs| {
                sink.lock().unwrap().push(args.argv(1).to_owned());
            }),
        );
        (table, log)
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(
            split_lines("echo \"a;b\"; echo c\necho d"),
            vec!["echo \"a;b\"", " echo c", "echo d"]
        );
    }

    #[test]
    fn insert_runs_before_appended_text() {
        let (table, log) = recording_table();
        table.execute_text(ExecWhen::Append, "echo 1; echo 2");
        table.execute_text(ExecWhen::Insert, "echo 0");
        assert_eq!(table.execute_pending(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn argv_reflects_the_executing_command() {
        let table = Arc::new(CommandTable::new(Arc::new(CvarStore::new())));
        let seen = Arc::new(Mutex::new((0, String::new())));
        let (inner, sink) = (table.clone(), seen.clone());
        table.add_command(
            "probe",
            Arc::new(move |_: &CommandArgs| {
                *sink.lock().unwrap() = (inner.argc(), inner.argv(1));
            }),
        );
        table.execute_text(ExecWhen::Now, "probe first second");
        assert_eq!(*seen.lock().unwrap(), (3, "first".to_owned()));
        assert_eq!(table.argc(), 0);
    }

    #[test]
    fn unknown_lines_fall_back_to_cvars() {
        let cvars = Arc::new(CvarStore::new());
        let cvar = cvars.get("r_gamma", "1", CvarFlags::ARCHIVE);
        let table = CommandTable::new(cvars);
        assert!(table.execute_line("r_gamma 1.5"));
        assert_eq!(cvar.value(), 1.5);
        assert!(!table.execute_line("no_such_thing"));
    }

    #[test]
    fn removed_commands_stop_running() {
        let (table, log) = recording_table();
        table.remove_command("ECHO");
        assert!(!table.contains("echo"));
        table.execute_text(ExecWhen::Now, "echo x");
        assert!(log.lock().unwrap().is_empty());
    }
}
