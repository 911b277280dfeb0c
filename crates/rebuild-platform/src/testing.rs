//! Scripted [`CommandRunner`] for tests that exercise code shelling out to
//! `reg`, `code`, `winget` and friends.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{CommandError, CommandOutput, CommandRunner};

type Handler = Box<dyn Fn(&[&str]) -> Result<CommandOutput, CommandError> + Send + Sync>;

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    handler: Handler,
}

impl Rule {
    fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.program.eq_ignore_ascii_case(program)
            && self.args_prefix.len() <= args.len()
            && self
                .args_prefix
                .iter()
                .zip(args)
                .all(|(expected, actual)| expected == actual)
    }
}

/// Answers commands from a list of rules, first match wins. Unmatched
/// programs behave as if they were not installed.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(self, program: &str, args_prefix: &[&str], output: CommandOutput) -> Self {
        self.handle(program, args_prefix, move |_| Ok(output.clone()))
    }

    #[must_use]
    pub fn fail(self, program: &str, args_prefix: &[&str], error: CommandError) -> Self {
        self.handle(program, args_prefix, move |_| Err(error.clone()))
    }

    #[must_use]
    pub fn handle<F>(mut self, program: &str, args_prefix: &[&str], handler: F) -> Self
    where
        F: Fn(&[&str]) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(ToString::to_string).collect(),
            handler: Box::new(handler),
        });
        self
    }

    /// Every invocation so far, program first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|call| call.first().is_some_and(|p| p.eq_ignore_ascii_case(program)))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(
                std::iter::once(program)
                    .chain(args.iter().copied())
                    .map(ToString::to_string)
                    .collect(),
            );

        match self.rules.iter().find(|rule| rule.matches(program, args)) {
            Some(rule) => (rule.handler)(args),
            None => Err(CommandError::not_found(program)),
        }
    }
}
