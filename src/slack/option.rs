//! `key:value` options in the invocation text.

use super::command::Metadata;
use super::error::SlackError;

/// Options understood by the commands in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOption {
    Branch,
    Repo,
    Version,
}

impl CommandOption {
    pub fn key(self) -> &'static str {
        match self {
            CommandOption::Branch => "branch",
            CommandOption::Repo => "repo",
            CommandOption::Version => "version",
        }
    }
}

impl Metadata {
    /// Value of `option` among the words after the first.
    pub fn option(&self, option: CommandOption) -> Option<&str> {
        self.option_named(option.key())
    }

    /// Value of the first `name:value` word after the first word.
    pub fn option_named(&self, name: &str) -> Option<&str> {
        self.words()
            .iter()
            .skip(1)
            .find_map(|word| word.strip_prefix(name)?.strip_prefix(':'))
    }

    pub fn require_option(&self, option: CommandOption) -> Result<&str, SlackError> {
        self.option(option).ok_or_else(|| SlackError::MissingParameter {
            key: option.key().to_string(),
        })
    }
}
