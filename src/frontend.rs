//! The frame port: how the engine talks back to whoever hosts it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Yes,
    No,
    Cancel,
}

pub trait Frontend {
    /// Show a status or result message.
    fn message(&mut self, text: &str);

    /// Ask a yes/no/cancel question; blocks until answered.
    fn confirm(&mut self, question: &str) -> Confirm;

    /// Ask for a line of text. `None` means the user cancelled.
    fn input(&mut self, prompt: &str, default: &str) -> Option<String>;
}

/// Non-interactive frontend: prints messages, confirms everything and
/// accepts every default.
#[derive(Debug, Default)]
pub struct BatchFrontend {
    pub messages: Vec<String>,
    pub echo: bool,
}

impl BatchFrontend {
    pub fn new(echo: bool) -> Self {
        Self {
            messages: Vec::new(),
            echo,
        }
    }
}

impl Frontend for BatchFrontend {
    fn message(&mut self, text: &str) {
        if self.echo {
            println!("{text}");
        }
        self.messages.push(text.to_string());
    }

    fn confirm(&mut self, _question: &str) -> Confirm {
        Confirm::Yes
    }

    fn input(&mut self, _prompt: &str, default: &str) -> Option<String> {
        Some(default.to_string())
    }
}

/// Everything a [`ScriptedFrontend`] was asked and what it answered.
#[derive(Debug, Default)]
pub struct ScriptLog {
    pub messages: Vec<String>,
    pub questions: Vec<String>,
    pub prompts: Vec<String>,
    pub confirms: VecDeque<Confirm>,
    pub inputs: VecDeque<Option<String>>,
}

/// Frontend replaying queued answers. Clone the handle to inspect the log
/// after the frontend has been handed to a session.
#[derive(Debug, Default, Clone)]
pub struct ScriptedFrontend {
    log: Rc<RefCell<ScriptLog>>,
}

impl ScriptedFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_confirm(&self, answer: Confirm) -> &Self {
        self.log.borrow_mut().confirms.push_back(answer);
        self
    }

    pub fn push_input(&self, answer: Option<&str>) -> &Self {
        self.log.borrow_mut().inputs.push_back(answer.map(str::to_string));
        self
    }

    pub fn messages(&self) -> Vec<String> {
        self.log.borrow().messages.clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.log.borrow().messages.last().cloned()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.log.borrow().prompts.clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.log.borrow().questions.clone()
    }
}

impl Frontend for ScriptedFrontend {
    fn message(&mut self, text: &str) {
        self.log.borrow_mut().messages.push(text.to_string());
    }

    /// Unanswered questions are cancelled.
    fn confirm(&mut self, question: &str) -> Confirm {
        let mut log = self.log.borrow_mut();
        log.questions.push(question.to_string());
        log.confirms.pop_front().unwrap_or(Confirm::Cancel)
    }

    /// Unanswered prompts take the default.
    fn input(&mut self, prompt: &str, default: &str) -> Option<String> {
        let mut log = self.log.borrow_mut();
        log.prompts.push(prompt.to_string());
        log.inputs.pop_front().unwrap_or_else(|| Some(default.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_in_order() {
        let handle = ScriptedFrontend::new();
        handle.push_confirm(Confirm::Yes).push_confirm(Confirm::No);
        let mut frontend = handle.clone();
        assert_eq!(frontend.confirm("first?"), Confirm::Yes);
        assert_eq!(frontend.confirm("second?"), Confirm::No);
        assert_eq!(frontend.confirm("third?"), Confirm::Cancel);
        assert_eq!(handle.questions().len(), 3);
    }

    #[test]
    fn scripted_input_defaults() {
        let handle = ScriptedFrontend::new();
        handle.push_input(None);
        let mut frontend = handle.clone();
        assert_eq!(frontend.input("Name", "x"), None);
        assert_eq!(frontend.input("Name", "x"), Some("x".into()));
    }

    #[test]
    fn batch_confirms_everything() {
        let mut frontend = BatchFrontend::new(false);
        frontend.message("hello");
        assert_eq!(frontend.confirm("?"), Confirm::Yes);
        assert_eq!(frontend.messages, vec!["hello"]);
    }
}
