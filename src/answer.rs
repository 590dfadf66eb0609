//! Answer synthesis: retrieve, assemble a grounded prompt, generate.
//!
//! The instruction template carries the answering policy (refusal phrase,
//! answer in the question's language). That policy is an instruction to the
//! generation model only; nothing here checks the model's output.

use std::sync::Arc;

use crate::config::{Config, DEFAULT_TOP_K};
use crate::error::AnswerError;
use crate::generation::Generator;
use crate::index::DocumentIndex;
use crate::models::Segment;

/// Built-in instruction template for the course assistant.
pub const DEFAULT_TEMPLATE: &str = "\
You are an intelligent AI assistant named DSMate. Your task is to carefully read the provided \
context from the selected document and then offer clear, accurate, and helpful answers to any \
questions based on that context. You will answer both theoretical and practical questions about \
Distributed Systems, a subject in the Computer Science Engineering program taught at the \
Polytechnic School of Gijón, University of Oviedo. If you cannot find sufficient relevant \
information in the context to answer a question, respond with: 'Sorry, I don't have enough \
information to answer that question.' If the question is asked in English, you must respond in \
English; if it is asked in Spanish, you must respond in Spanish. If you are asked to do something \
related to programming, prioritize the C language running on Ubuntu 20.04, the main language of \
the subject. There are also some lab sessions with Java.

Context: {context}

Question: {question}
";

/// A prompt template with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The configured override, or the built-in template.
    pub fn from_config(config: &Config) -> Self {
        config
            .prompt
            .template
            .as_deref()
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute both placeholders in a single pass.
    ///
    /// Placeholder-like text inside `context` or `question` is left alone.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + context.len() + question.len());
        let mut rest = self.text.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Everything that goes into one generation call.
#[derive(Debug, Clone)]
pub struct PreparedPrompt<'a> {
    /// Retrieved segments in retrieval order.
    pub segments: Vec<&'a Segment>,
    /// Segment texts joined by blank lines.
    pub context: String,
    /// The rendered template sent to the generation model.
    pub prompt: String,
}

/// Joins retrieved segments into the context block, preserving order.
pub fn build_context(segments: &[&Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answers questions against one document index at a time.
pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    top_k: usize,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn Generator>, template: PromptTemplate, top_k: usize) -> Self {
        Self {
            generator,
            template,
            top_k,
        }
    }

    pub fn from_config(config: &Config, generator: Arc<dyn Generator>) -> Self {
        Self::new(
            generator,
            PromptTemplate::from_config(config),
            config.retrieval.top_k,
        )
    }

    /// Retrieve context and render the prompt without calling the generator.
    pub async fn prepare<'a>(
        &self,
        index: &'a DocumentIndex,
        query: &str,
    ) -> Result<PreparedPrompt<'a>, AnswerError> {
        if query.trim().is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let segments = index.retrieve(query, self.top_k).await?;
        tracing::debug!(
            document = %index.document().path.display(),
            retrieved = segments.len(),
            ordinals = ?segments.iter().map(|s| s.ordinal).collect::<Vec<_>>(),
            "context retrieved"
        );

        let context = build_context(&segments);
        let prompt = self.template.render(&context, query);
        Ok(PreparedPrompt {
            segments,
            context,
            prompt,
        })
    }

    /// Answer `query` from `index`. The model output is returned unmodified.
    pub async fn answer(&self, index: &DocumentIndex, query: &str) -> Result<String, AnswerError> {
        let prepared = self.prepare(index, query).await?;
        tracing::debug!(
            model = self.generator.model_name(),
            prompt_chars = prepared.prompt.len(),
            "generating answer"
        );
        let answer = self.generator.generate(&prepared.prompt).await?;
        Ok(answer)
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(
            Arc::new(crate::generation::DisabledGenerator),
            PromptTemplate::default(),
            DEFAULT_TOP_K,
        )
    }
}
