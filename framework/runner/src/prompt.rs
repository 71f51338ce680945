use std::collections::VecDeque;
use std::io::{BufRead, Write};

/// What the orchestrator needs to ask about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// Pick one of `candidates` by its index.
    SimulationChoice { candidates: Vec<String> },
    /// Choose a run label, an empty answer means `default`.
    RunLabel { default: String },
    /// Free text, may be empty.
    RunDescription,
}

/// Interactive input for the orchestrator.
pub trait Prompt {
    /// Ask the question described by `kind` and return the raw answer.
    fn prompt_for(&mut self, kind: &PromptKind) -> std::io::Result<String>;

    /// Tell the user something, usually why their last answer was rejected.
    fn notify(&mut self, message: &str);
}

/// Prompts on a terminal, or anything else that reads and writes lines.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn question(&mut self, kind: &PromptKind) -> std::io::Result<()> {
        match kind {
            PromptKind::SimulationChoice { candidates } => {
                writeln!(self.output, "Choose a simulation number:")?;
                for (index, name) in candidates.iter().enumerate() {
                    writeln!(self.output, "     [{index}] {name}")?;
                }
            }
            PromptKind::RunLabel { default } => {
                writeln!(
                    self.output,
                    "Select run label (default is '{default}'). Accepted characters are a-z, A-Z, 0-9, - and _"
                )?;
            }
            PromptKind::RunDescription => {
                writeln!(self.output, "Select run description (optional)")?;
            }
        }
        self.output.flush()
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn prompt_for(&mut self, kind: &PromptKind) -> std::io::Result<String> {
        self.question(kind)?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }

        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }

    fn notify(&mut self, message: &str) {
        // Losing a hint is not worth failing the run for.
        let _ = writeln!(self.output, "{message}");
    }
}

/// Answers prompts from a fixed script, for tests and non-interactive embedding.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: Vec<PromptKind>,
    notices: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Every prompt that was asked, in order.
    pub fn asked(&self) -> &[PromptKind] {
        &self.asked
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn prompt_for(&mut self, kind: &PromptKind) -> std::io::Result<String> {
        self.asked.push(kind.clone());
        self.answers.pop_front().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("no scripted answer left for {kind:?}"),
            )
        })
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
