//! Retrieval-augmented chat loop.
//!
//! Each turn performs exactly one similarity search and one generation
//! call. Turns are independent: no conversation history is kept and the
//! answer is a function of the query and the retrieved chunks only.
//!
//! ```text
//!              non-exit query (turn ok or failed)
//!             ┌──────────────┐
//!             ▼              │
//!   ──▶ AwaitingQuery ───────┘
//!             │
//!             │ "exit" (any case/whitespace) or end of input
//!             ▼
//!         Terminated
//! ```

use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::embedding::QueryEmbeddingError;
use crate::error::PipelineError;
use crate::generation::GenerationProvider;
use crate::models::{ChatTurn, SearchHit};
use crate::store::VectorStore;

pub const QUERY_PROMPT: &str = "AI: What question do you have about your repo?";
pub const GOODBYE: &str = "Goodbye!";
pub const END_OF_CODE_MARKER: &str = "[END OF CODE FILE(S)]";

const EXIT_SENTINEL: &str = "exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    AwaitingQuery,
    Terminated,
}

/// Line-oriented terminal access, injectable for tests.
pub trait InteractiveIo {
    /// Show `prompt` and read one line. `Ok(None)` means end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
    fn write_line(&mut self, text: &str) -> Result<()>;
}

/// Terminal backed by a readline editor (line editing, in-session history).
///
/// When stdin is not a terminal the editor reads plain lines, so piped
/// input works the same way.
pub struct StdIo {
    editor: DefaultEditor,
}

impl StdIo {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
        Ok(Self { editor })
    }
}

impl InteractiveIo for StdIo {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        println!("{}", prompt);
        let line = readline_result(self.editor.readline("> "))?;
        if let Some(input) = &line {
            if !input.trim().is_empty() {
                let _ = self.editor.add_history_entry(input.as_str());
            }
        }
        Ok(line)
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Ctrl+D and Ctrl+C both end input; other readline failures propagate.
fn readline_result(result: Result<String, ReadlineError>) -> Result<Option<String>> {
    match result {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("Readline error: {}", e)),
    }
}

/// Ask a yes/no question. Only `y`/`yes` (any case) confirms; end of
/// input is a no.
pub fn confirm(io: &mut dyn InteractiveIo, question: &str) -> Result<bool> {
    let answer = io.read_line(&format!("? {} [y/N]", question))?;
    Ok(matches!(
        answer.map(|a| a.trim().to_ascii_lowercase()).as_deref(),
        Some("y") | Some("yes")
    ))
}

/// `exit`, ignoring surrounding whitespace and case.
pub fn is_exit_sentinel(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Concatenate hit contents, each followed by a blank line.
pub fn build_context(hits: &[SearchHit]) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&hit.content);
        context.push_str("\n\n");
    }
    context
}

/// Fill the system prompt with the user's question and retrieved code.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are Codebase AI. You are a superintelligent AI that answers questions about codebases.

You are:
- helpful & friendly
- good at answering complex questions in simple language
- an expert in all programming languages
- able to infer the intent of the user's question

The user will ask a question about their codebase, and you will answer it.

When the user asks their question, you will answer it by searching the codebase for the answer.

Here is the user's question and code file(s) you found to answer the question:

Question:
{query}

Code file(s):
{context}

{END_OF_CODE_MARKER}

Now answer the question using the code file(s) above.
"
    )
}

pub struct ChatLoop {
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    k: usize,
    state: ChatState,
}

impl ChatLoop {
    pub fn new(
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationProvider>,
        k: usize,
    ) -> Self {
        Self {
            store,
            generator,
            k,
            state: ChatState::AwaitingQuery,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// One retrieval plus one generation for `query`.
    pub async fn run_turn(&self, query: &str) -> Result<ChatTurn, PipelineError> {
        let hits = self
            .store
            .similarity_search(query, self.k)
            .await
            .map_err(|e| match e.downcast::<QueryEmbeddingError>() {
                Ok(QueryEmbeddingError(source)) => PipelineError::EmbeddingProvider(source),
                Err(e) => PipelineError::VectorStore(e),
            })?;
        debug!(
            hits = hits.len(),
            k = self.k,
            model = self.generator.model_name(),
            "retrieved context"
        );

        let prompt = build_prompt(query, &build_context(&hits));
        let answer = self
            .generator
            .complete(&prompt)
            .await
            .map_err(PipelineError::GenerationProvider)?;

        Ok(ChatTurn {
            query: query.to_string(),
            retrieved_chunks: hits,
            answer,
        })
    }

    /// Read one line and act on it. Turn failures are written to `io` and
    /// leave the loop awaiting the next query; only IO failures propagate.
    pub async fn step(&mut self, io: &mut dyn InteractiveIo) -> Result<ChatState> {
        if self.state == ChatState::Terminated {
            return Ok(self.state);
        }

        let Some(input) = io.read_line(QUERY_PROMPT)? else {
            debug!("end of input, leaving chat");
            self.state = ChatState::Terminated;
            return Ok(self.state);
        };

        if is_exit_sentinel(&input) {
            io.write_line(GOODBYE)?;
            self.state = ChatState::Terminated;
            return Ok(self.state);
        }

        match self.run_turn(&input).await {
            Ok(turn) => io.write_line(&turn.answer)?,
            Err(e) => {
                warn!(stage = e.stage(), "chat turn failed: {}", e);
                io.write_line(&format!("! {}", e))?;
            }
        }
        Ok(self.state)
    }

    /// Drive [`step`](Self::step) until the loop terminates.
    pub async fn run(&mut self, io: &mut dyn InteractiveIo) -> Result<()> {
        while self.step(io).await? != ChatState::Terminated {}
        Ok(())
    }
}
