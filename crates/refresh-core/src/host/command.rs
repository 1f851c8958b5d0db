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

//! Console command registration and the command buffer.

use std::fmt;
use std::sync::Arc;

/// When a piece of command text should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecWhen {
    /// Right away, before the call returns.
    Now,
    /// At the front of the buffer.
    Insert,
    /// At the end of the buffer.
    Append,
}

/// Tokenized arguments of one command line. Argument `0` is the command name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    args: Vec<String>,
}

impl CommandArgs {
    /// Splits a single command line into arguments.
    ///
    /// Whitespace separates tokens, double quotes group them and `//` starts a
    /// comment that runs to the end of the line.
    pub fn tokenize(line: &str) -> Self {
        let mut args = Vec::new();
        let mut chars = line.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.peek() {
                None => break,
                Some('/') => {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        break;
                    }
                }
                _ => {}
            }
            let mut token = String::new();
            if chars.next_if_eq(&'"').is_some() {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    token.push(c);
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    token.push(c);
                }
            }
            args.push(token);
        }
        Self { args }
    }

    /// Number of arguments including the command name.
    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Argument `index`, or `""` when out of range.
    pub fn argv(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }

    /// The command name, lowercased. Empty for a blank line.
    pub fn command(&self) -> String {
        self.argv(0).to_ascii_lowercase()
    }

    /// Iterates over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(String::as_str)
    }
}

impl fmt::Display for CommandArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// A registered command callback.
pub type CommandHandler = Arc<dyn Fn(&CommandArgs) + Send + Sync>;

/// The host command table and text buffer.
pub trait Commands: Send + Sync {
    /// Registers `name`. Registering an existing name replaces its handler.
    fn add_command(&self, name: &str, handler: CommandHandler);

    /// Unregisters `name`. Unknown names are ignored.
    fn remove_command(&self, name: &str);

    /// Argument count of the command being executed, `0` outside a command.
    fn argc(&self) -> usize;

    /// Argument `index` of the command being executed.
    fn argv(&self, index: usize) -> String;

    /// Queues or runs command text. Lines are separated by `\n` or `;`.
    fn execute_text(&self, when: ExecWhen, text: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_handles_quotes_and_comments() {
        let args = CommandArgs::tokenize("  screenshotBMP  \"my shot\" clipboard // trailing");
        assert_eq!(args.argc(), 3);
        assert_eq!(args.argv(0), "screenshotBMP");
        assert_eq!(args.argv(1), "my shot");
        assert_eq!(args.argv(2), "clipboard");
        assert_eq!(args.argv(3), "");
        assert_eq!(args.command(), "screenshotbmp");
    }

    #[test]
    fn blank_line_has_no_arguments() {
        let args = CommandArgs::tokenize("   ");
        assert_eq!(args.argc(), 0);
        assert_eq!(args.command(), "");
    }

    #[test]
    fn single_slash_is_part_of_a_token() {
        let args = CommandArgs::tokenize("r_remap textures/a /b");
        assert_eq!(args.argc(), 3);
        assert_eq!(args.argv(2), "/b");
    }
}
