//! Interface to the external text generator.
//!
//! The generator owns the model and its skill adapters. Every request names the
//! profile it must run under; backends whose active profile is shared mutable
//! state are wrapped in an [`ExclusiveGenerator`], which serializes the
//! select/generate/restore sequence.

use crate::dialogue::ChatMessage;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

mod lease;

pub use lease::{ExclusiveGenerator, ProfileBackend, ProfileLease};

/// Skill profile active during one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Emits tagged call blocks.
    ToolInvocation,
    /// Replies in persona after calls were made.
    PersonaReply,
    /// Base model without any skill adapter.
    Disabled,
}

impl Profile {
    /// Returns the profile name.
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::ToolInvocation => "tool-invocation",
            Profile::PersonaReply => "persona-reply",
            Profile::Disabled => "disabled",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters forwarded to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SamplingConfig {
    /// Maximum number of generated tokens.
    pub max_new_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Top-k cutoff.
    pub top_k: usize,
    /// Minimum token probability relative to the most likely token.
    pub min_p: f32,
    /// Whether to sample instead of decoding greedily.
    pub do_sample: bool,
    /// Beam count.
    pub num_beams: usize,
    /// Whether to reuse the key/value cache.
    pub use_cache: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 128,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 20,
            min_p: 0.0,
            do_sample: true,
            num_beams: 1,
            use_cache: true,
        }
    }
}

/// When generation stops.
///
/// Generation always stops at the end-of-generation token; `stop_sequences`
/// add early exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCondition {
    /// Extra sequences ending the completion.
    pub stop_sequences: Vec<String>,
}

impl StopCondition {
    /// Stops at the end of generation or at `sequence`.
    pub fn or_sequence(sequence: impl Into<String>) -> Self {
        Self {
            stop_sequences: vec![sequence.into()],
        }
    }
}

/// One generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Profile to run under.
    pub profile: Profile,
    /// System prompt followed by the conversation.
    pub messages: Vec<ChatMessage>,
    /// Text the completion is forced to start with.
    pub seed_text: Option<String>,
    /// Stop condition.
    pub stop: StopCondition,
    /// Sampling parameters.
    pub sampling: SamplingConfig,
    /// Whether the chat template opens a thinking section.
    pub enable_thinking: bool,
    /// Tokens that must never be produced.
    pub suppressed_tokens: Vec<String>,
}

impl GenerationRequest {
    /// Creates a request with default stop condition and no seed.
    pub fn new(profile: Profile, messages: Vec<ChatMessage>, sampling: SamplingConfig) -> Self {
        Self {
            profile,
            messages,
            seed_text: None,
            stop: StopCondition::default(),
            sampling,
            enable_thinking: false,
            suppressed_tokens: Vec::new(),
        }
    }

    /// Seeds the completion.
    pub fn seed(mut self, text: impl Into<String>) -> Self {
        self.seed_text = Some(text.into());
        self
    }

    /// Sets the stop condition.
    pub fn stop(mut self, stop: StopCondition) -> Self {
        self.stop = stop;
        self
    }

    /// Opens a thinking section.
    pub fn thinking(mut self) -> Self {
        self.enable_thinking = true;
        self
    }

    /// Suppresses the given tokens.
    pub fn suppress<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suppressed_tokens.extend(tokens.into_iter().map(Into::into));
        self
    }
}

/// Produces text for a prompt under a profile.
///
/// The returned text is the continuation only; it does not repeat the seed.
pub trait Generator {
    /// Generates a completion for `request`.
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

impl<G: Generator + ?Sized> Generator for &G {
    #[inline]
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request)
    }
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    #[inline]
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request)
    }
}

impl<G: Generator + ?Sized> Generator for Arc<G> {
    #[inline]
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        (**self).generate(request)
    }
}
