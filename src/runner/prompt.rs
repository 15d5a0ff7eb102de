//! Interactive input for parameters configured with a prompt

use crate::error::{Error, Result};
use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;

/// Source of interactive answers
pub trait Prompter {
    /// Ask for one line of text, offering `default` on empty input
    fn read_line(&self, text: &str, default: Option<&str>) -> Result<String>;

    /// Ask without echo; with `confirmation` the answer is asked twice
    fn read_hidden(&self, text: &str, confirmation: bool) -> Result<String>;

    /// Yes/no question
    fn confirm(&self, text: &str, default: Option<bool>) -> Result<bool>;

    /// Tell the user an answer was rejected before asking again
    fn report_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

fn aborted(err: dialoguer::Error) -> Error {
    debug!("prompt aborted: {}", err);
    Error::Abort
}

impl Prompter for TerminalPrompter {
    fn read_line(&self, text: &str, default: Option<&str>) -> Result<String> {
        let mut input = dialoguer::Input::<String>::new().with_prompt(text);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(aborted)
    }

    fn read_hidden(&self, text: &str, confirmation: bool) -> Result<String> {
        let mut password = dialoguer::Password::new().with_prompt(text);
        if confirmation {
            password = password.with_confirmation(
                "Repeat for confirmation",
                "Error: The two entered values do not match.",
            );
        }
        password.interact().map_err(aborted)
    }

    fn confirm(&self, text: &str, default: Option<bool>) -> Result<bool> {
        let mut confirm = dialoguer::Confirm::new().with_prompt(text);
        if let Some(default) = default {
            confirm = confirm.default(default);
        }
        confirm.interact().map_err(aborted)
    }
}

/// Replays canned answers; running out of answers behaves like end of
/// input and aborts
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
    errors: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompter {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Prompt texts in the order they were shown
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    /// Rejection messages reported so far
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    fn next(&self, text: &str) -> Result<String> {
        self.asked.borrow_mut().push(text.to_string());
        self.answers.borrow_mut().pop_front().ok_or(Error::Abort)
    }
}

impl Prompter for ScriptedPrompter {
    fn read_line(&self, text: &str, default: Option<&str>) -> Result<String> {
        let answer = self.next(text)?;
        match default {
            Some(default) if answer.is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn read_hidden(&self, text: &str, confirmation: bool) -> Result<String> {
        let answer = self.next(text)?;
        if confirmation {
            let again = self.next("Repeat for confirmation")?;
            if again != answer {
                return Err(Error::usage("The two entered values do not match."));
            }
        }
        Ok(answer)
    }

    fn confirm(&self, text: &str, default: Option<bool>) -> Result<bool> {
        let answer = self.next(text)?;
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            "" => default.ok_or_else(|| Error::usage("An answer is required.")),
            other => Err(Error::usage(format!("Invalid answer '{}'.", other))),
        }
    }

    fn report_error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}
