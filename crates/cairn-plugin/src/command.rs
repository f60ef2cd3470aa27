//! Slash-command extraction from free-text bodies.

const COMMAND_MARKER: char = '/';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// How the text after a command name becomes arguments.
pub enum ArgumentMode {
    /// Every whitespace-separated token is its own argument.
    #[default]
    Split,
    /// The rest of the line after the name is one verbatim argument.
    Remainder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Extracts one [`Command`] per line that starts with `/`.
///
/// Lines are trimmed first; every leading `/` is stripped. A line that leaves
/// no tokens (a bare `/`) is skipped. Mention markers such as `@` are kept.
pub fn parse_commands(body: &str, mode: ArgumentMode) -> Vec<Command> {
    body.lines()
        .filter_map(|line| parse_command_line(line, mode))
        .collect()
}

fn parse_command_line(line: &str, mode: ArgumentMode) -> Option<Command> {
    let line = line.trim();
    if !line.starts_with(COMMAND_MARKER) {
        return None;
    }
    let rest = line.trim_start_matches(COMMAND_MARKER).trim();
    match mode {
        ArgumentMode::Split => {
            let mut tokens = rest.split_whitespace().map(ToOwned::to_owned);
            let name = tokens.next()?;
            Some(Command::new(name, tokens.collect()))
        }
        ArgumentMode::Remainder => {
            if rest.is_empty() {
                return None;
            }
            match rest.split_once(char::is_whitespace) {
                Some((name, remainder)) => {
                    let remainder = remainder.trim();
                    let args = if remainder.is_empty() {
                        Vec::new()
                    } else {
                        vec![remainder.to_string()]
                    };
                    Some(Command::new(name, args))
                }
                None => Some(Command::new(rest, Vec::new())),
            }
        }
    }
}
