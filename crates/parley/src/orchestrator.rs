//! Per-turn orchestration of prompting, call extraction, execution and reply.
//!
//! One cycle moves through the states
//! `await-decision -> {executing | reply-direct} -> [reply-after-call] -> done`.
//! Failures after the calls were extracted never surface as errors: the cycle
//! degrades to a direct reply computed from the history as it was before the
//! calls, and reports the calls in [`TurnOutcome::FailedCall`].

use crate::JsonValue;
use crate::call::{CallValidator, ToolCall, ToolResult, extract_calls};
use crate::config::OrchestratorConfig;
use crate::dialogue::{ChatMessage, ConversationMetadata, DialogueTurn, to_messages};
use crate::error::Result;
use crate::executor::{Executor, correlate};
use crate::format::{format_calls, format_responses};
use crate::generator::{GenerationRequest, Generator, Profile, StopCondition};
use crate::prompt::PromptAssembler;
use crate::registry::{Registry, SchemaSet};

/// Inputs of one dialogue turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnInput<'a> {
    /// Role description of the character.
    pub role: &'a str,
    /// Structured context passed through to the prompts.
    pub metadata: &'a ConversationMetadata,
    /// Dialogue so far, ending with the turn to answer.
    pub history: &'a [DialogueTurn],
    /// Tools and actions available in this turn.
    pub registry: &'a Registry,
}

/// How a turn was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model chose not to call anything.
    DirectReply {
        /// Final reply.
        reply: String,
    },
    /// Calls were executed and the reply accounts for their results.
    CallReply {
        /// Final reply.
        reply: String,
        /// Calls extracted from the tool-invocation completion.
        calls: Vec<ToolCall>,
    },
    /// Calls were extracted but executing or answering them failed.
    FailedCall {
        /// Final reply, computed without the calls.
        reply: String,
        /// Calls extracted from the tool-invocation completion.
        calls: Vec<ToolCall>,
        /// What went wrong.
        reason: String,
    },
}

impl TurnOutcome {
    /// Returns the reply to show to the player.
    pub fn final_reply(&self) -> &str {
        match self {
            TurnOutcome::DirectReply { reply }
            | TurnOutcome::CallReply { reply, .. }
            | TurnOutcome::FailedCall { reply, .. } => reply,
        }
    }

    /// Returns the calls extracted in this turn.
    pub fn issued_calls(&self) -> &[ToolCall] {
        match self {
            TurnOutcome::DirectReply { .. } => &[],
            TurnOutcome::CallReply { calls, .. } | TurnOutcome::FailedCall { calls, .. } => calls,
        }
    }

    /// Consumes the outcome, returning the reply and the issued calls.
    pub fn into_parts(self) -> (String, Vec<ToolCall>) {
        match self {
            TurnOutcome::DirectReply { reply } => (reply, Vec::new()),
            TurnOutcome::CallReply { reply, calls }
            | TurnOutcome::FailedCall { reply, calls, .. } => (reply, calls),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    AwaitDecision,
    Executing,
    ReplyDirect,
    ReplyAfterCall,
    Done,
}

impl CycleState {
    fn as_str(self) -> &'static str {
        match self {
            CycleState::AwaitDecision => "await-decision",
            CycleState::Executing => "executing",
            CycleState::ReplyDirect => "reply-direct",
            CycleState::ReplyAfterCall => "reply-after-call",
            CycleState::Done => "done",
        }
    }

    fn advance(&mut self, next: CycleState) {
        tracing::debug!(from = self.as_str(), state = next.as_str(), "orchestrator transition");
        *self = next;
    }
}

/// Drives one dialogue turn end to end.
#[derive(Debug)]
pub struct DialogueOrchestrator<G, E> {
    generator: G,
    executor: E,
    prompts: PromptAssembler,
    config: OrchestratorConfig,
}

impl<G: Generator, E: Executor> DialogueOrchestrator<G, E> {
    /// Creates an orchestrator with the default configuration.
    pub fn new(generator: G, executor: E) -> Self {
        Self::with_config(generator, executor, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with a custom configuration.
    pub fn with_config(generator: G, executor: E, config: OrchestratorConfig) -> Self {
        Self {
            generator,
            executor,
            prompts: PromptAssembler::new(&config.reply_sentinel),
            config,
        }
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one turn.
    ///
    /// Errors are returned only when no reply at all could be produced, that is
    /// when the decision or the direct reply itself failed.
    pub fn run_turn(&self, input: &TurnInput<'_>) -> Result<TurnOutcome> {
        let mut state = CycleState::AwaitDecision;
        let schemas = input.registry.compile();
        let metadata = input.metadata.render()?;
        let history = to_messages(input.history);

        let calls = self.decide(input.role, &metadata, &history, &schemas)?;
        let sentinel = self.config.reply_sentinel.as_str();
        if calls.first().is_none_or(|call| call.is_sentinel(sentinel)) {
            state.advance(CycleState::ReplyDirect);
            let reply = self.reply_without_calls(input.role, &metadata, &history)?;
            state.advance(CycleState::Done);
            return Ok(TurnOutcome::DirectReply { reply });
        }

        CallValidator::new(&schemas)
            .with_sentinel(sentinel)
            .validate(&calls, None);
        state.advance(CycleState::Executing);
        let answered =
            self.reply_after_call(input.role, &metadata, &history, &schemas, &calls, &mut state);
        let outcome = match answered {
            Ok(Some(reply)) => TurnOutcome::CallReply { reply, calls },
            Ok(None) => {
                state.advance(CycleState::ReplyDirect);
                let reply = self.reply_without_calls(input.role, &metadata, &history)?;
                TurnOutcome::CallReply { reply, calls }
            }
            Err(err) => {
                tracing::warn!(
                    calls = calls.len(),
                    "fail to answer the calls, falling back to a direct reply: {err}"
                );
                state.advance(CycleState::ReplyDirect);
                let reply = self.reply_without_calls(input.role, &metadata, &history)?;
                TurnOutcome::FailedCall {
                    reply,
                    calls,
                    reason: err.to_string(),
                }
            }
        };
        state.advance(CycleState::Done);
        Ok(outcome)
    }

    /// Asks the tool-invocation profile which calls to make.
    fn decide(
        &self,
        role: &str,
        metadata: &str,
        history: &[ChatMessage],
        schemas: &SchemaSet,
    ) -> Result<Vec<ToolCall>> {
        let system = self.prompts.tool_invocation(role, metadata, schemas)?;
        let seed = self.config.call_seed.as_str();
        let request = GenerationRequest::new(
            Profile::ToolInvocation,
            with_system(system, history),
            self.config.sampling.clone(),
        )
        .seed(seed)
        .stop(StopCondition::or_sequence(&self.config.reply_sentinel));
        let completion = self.generator.generate(&request)?;
        let extraction = extract_calls(&format!("{seed}{completion}"));
        tracing::debug!(
            calls = extraction.calls.len(),
            malformed = extraction.failures.len(),
            "extracted calls from the completion"
        );
        Ok(extraction.calls)
    }

    /// Executes the calls and replies to their results.
    ///
    /// Returns `None` if no result is left to show after post-processing.
    fn reply_after_call(
        &self,
        role: &str,
        metadata: &str,
        history: &[ChatMessage],
        schemas: &SchemaSet,
        calls: &[ToolCall],
        state: &mut CycleState,
    ) -> Result<Option<String>> {
        let results = self.executor.execute(calls)?;
        let results = correlate(calls, results, schemas)?;
        let results = self.post_process(results);
        if results.is_empty() {
            tracing::info!("no call result is left to show");
            return Ok(None);
        }

        let issued = results.iter().map(ToolResult::call).collect::<Vec<_>>();
        let mut messages = history.to_vec();
        messages.push(ChatMessage::assistant(format_calls(&issued)?));
        messages.push(ChatMessage::user(format_responses(&results)?));

        state.advance(CycleState::ReplyAfterCall);
        let system = self.prompts.reply_after_call(role, metadata, schemas)?;
        let request = GenerationRequest::new(
            Profile::PersonaReply,
            with_system(system, &messages),
            self.config.sampling.clone(),
        )
        .seed(self.config.rationale_seed.as_str())
        .thinking()
        .suppress(self.config.suppressed_tokens.iter().cloned());
        let reply = self.generator.generate(&request)?;
        let reply = trim_reply(&reply);
        if self.config.naturalize_reply {
            return self.naturalize(role, metadata, &messages, &reply).map(Some);
        }
        Ok(Some(reply))
    }

    /// Replaces action returns with the success message and drops tool
    /// results carrying no information.
    fn post_process(&self, results: Vec<ToolResult>) -> Vec<ToolResult> {
        results
            .into_iter()
            .filter_map(|mut result| {
                if result.is_action {
                    result.output = JsonValue::String(self.config.action_message.clone());
                    Some(result)
                } else if result.output == self.config.no_information {
                    tracing::debug!(function = %result.name, "dropping a result without information");
                    None
                } else {
                    Some(result)
                }
            })
            .collect()
    }

    /// Replies with the no-tool profile.
    fn reply_without_calls(
        &self,
        role: &str,
        metadata: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        let system = self.prompts.no_tool_reply(role, metadata)?;
        let request = GenerationRequest::new(
            Profile::Disabled,
            with_system(system, history),
            self.config.sampling.clone(),
        );
        let reply = self.generator.generate(&request)?;
        Ok(trim_reply(&reply))
    }

    /// Rephrases `reply` in one more no-tool pass.
    fn naturalize(
        &self,
        role: &str,
        metadata: &str,
        messages: &[ChatMessage],
        reply: &str,
    ) -> Result<String> {
        let system = self.prompts.no_tool_reply(role, metadata)?;
        let seed = format!(
            "<think>\nI should reply with something like `{reply}`, \
             but sounding more natural, human-like and respecting persona.\n</think>\n\n"
        );
        let request = GenerationRequest::new(
            Profile::Disabled,
            with_system(system, messages),
            self.config.sampling.clone(),
        )
        .seed(seed)
        .thinking();
        let reply = self.generator.generate(&request)?;
        Ok(trim_reply(&reply))
    }
}

fn with_system(system: String, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut prompt = Vec::with_capacity(messages.len() + 1);
    prompt.push(ChatMessage::system(system));
    prompt.extend_from_slice(messages);
    prompt
}

fn trim_reply(reply: &str) -> String {
    reply.trim_matches('\n').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::Role;
    use crate::error::Error;
    use crate::executor::FunctionTable;
    use crate::registry::FunctionEntry;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedGenerator {
        completions: RefCell<VecDeque<&'static str>>,
        requests: RefCell<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn new(completions: &[&'static str]) -> Self {
            Self {
                completions: RefCell::new(completions.iter().copied().collect()),
                requests: RefCell::default(),
            }
        }

        fn request(&self, index: usize) -> GenerationRequest {
            self.requests.borrow()[index].clone()
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.borrow_mut().push(request.clone());
            self.completions
                .borrow_mut()
                .pop_front()
                .map(ToOwned::to_owned)
                .ok_or_else(|| Error::Generation("script exhausted".to_owned()))
        }
    }

    struct BrokenExecutor;

    struct SilentExecutor;

    impl Executor for SilentExecutor {
        fn execute(&self, _calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
            Ok(Vec::new())
        }
    }

    impl Executor for BrokenExecutor {
        fn execute(&self, _calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
            Err(Error::Execution("connection reset".to_owned()))
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::default();
        registry
            .register_tool(FunctionEntry::new(
                "check_price",
                "Check the price of an item.\n\nParameters\n----------\nitem_name: str\n    The item name.",
            ))
            .unwrap();
        registry
            .register_action(FunctionEntry::new(
                "sell",
                "Sell an item.\n\nParameters\n----------\nitem_name: str\n    The item name.",
            ))
            .unwrap();
        registry
    }

    fn shop() -> FunctionTable {
        let mut table = FunctionTable::new();
        table
            .register_tool("check_price", |args| {
                Ok(match args.get("item_name").and_then(JsonValue::as_str) {
                    Some("Iron Sword") => json!([{"price": 120}]),
                    _ => json!([{"information": "n/a"}]),
                })
            })
            .unwrap();
        table
            .register_action("sell", |_| Ok(json!({"inventory": []})))
            .unwrap();
        table
    }

    fn history() -> Vec<DialogueTurn> {
        vec![DialogueTurn::user("How much is this?").with_target("Iron Sword")]
    }

    fn run<E: Executor>(generator: &ScriptedGenerator, executor: E) -> TurnOutcome {
        run_with(generator, executor, OrchestratorConfig::default())
    }

    fn run_with<E: Executor>(
        generator: &ScriptedGenerator,
        executor: E,
        config: OrchestratorConfig,
    ) -> TurnOutcome {
        let registry = registry();
        let metadata = ConversationMetadata {
            persona: json!({"name": "Ada", "occupation": "merchant"}),
            ..Default::default()
        };
        let history = history();
        let input = TurnInput {
            role: "You are Ada, a merchant.",
            metadata: &metadata,
            history: &history,
            registry: &registry,
        };
        DialogueOrchestrator::with_config(generator, executor, config)
            .run_turn(&input)
            .unwrap()
    }

    #[test]
    fn stopping_at_the_sentinel_replies_directly() {
        let generator = ScriptedGenerator::new(&["reply", "\nWelcome, traveler!\n"]);
        let outcome = run(&generator, shop());
        assert_eq!(
            outcome,
            TurnOutcome::DirectReply {
                reply: "Welcome, traveler!".to_owned()
            }
        );
        assert!(outcome.issued_calls().is_empty());

        let decision = generator.request(0);
        assert_eq!(decision.profile, Profile::ToolInvocation);
        assert_eq!(decision.seed_text.as_deref(), Some("<tool_call>\n{\"name\": \""));
        assert_eq!(decision.stop.stop_sequences, ["reply"]);
        assert!(decision.messages[0].content.contains("<tools>"));
        assert_eq!(
            decision.messages[1].content,
            "How much is this? (Talking about Iron Sword)"
        );

        let reply = generator.request(1);
        assert_eq!(reply.profile, Profile::Disabled);
        assert!(!reply.messages[0].content.contains("<tools>"));
        assert_eq!(reply.messages.len(), 2);
    }

    #[test]
    fn an_explicit_sentinel_call_replies_directly() {
        let generator = ScriptedGenerator::new(&[
            "reply\", \"arguments\": {}}\n</tool_call>",
            "Hello there.",
        ]);
        let outcome = run(&generator, BrokenExecutor);
        assert_eq!(outcome.final_reply(), "Hello there.");
        assert!(matches!(outcome, TurnOutcome::DirectReply { .. }));
    }

    #[test]
    fn executes_calls_and_replies_to_results() {
        let generator = ScriptedGenerator::new(&[
            "check_price\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>\n\
             <tool_call>\n{\"name\": \"sell\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>",
            "That one is 120 gold, and it is yours now.",
        ]);
        let outcome = run(&generator, shop());
        let TurnOutcome::CallReply { reply, calls } = &outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(reply, "That one is 120 gold, and it is yours now.");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "check_price");
        assert_eq!(calls[1].name, "sell");

        let request = generator.request(1);
        assert_eq!(request.profile, Profile::PersonaReply);
        assert!(request.enable_thinking);
        assert!(request.seed_text.as_deref().is_some_and(|seed| seed.starts_with("<think>\n")));
        assert_eq!(request.suppressed_tokens, ["<tool_call>", "</tool_call>"]);
        assert!(!request.messages[0].content.contains("properties"));

        let [.., exchange_calls, exchange_responses] = request.messages.as_slice() else {
            panic!("missing exchange");
        };
        assert_eq!(exchange_calls.role, Role::Assistant);
        assert_eq!(
            exchange_calls.content,
            "<tool_call>\n{\"name\": \"check_price\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>\n\
             <tool_call>\n{\"name\": \"sell\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>"
        );
        assert_eq!(exchange_responses.role, Role::User);
        assert!(exchange_responses.content.contains("\"return\": [{\"price\": 120}]"));
        assert!(
            exchange_responses
                .content
                .contains("\"return\": \"The action was successfully executed.\"")
        );
        assert!(!exchange_responses.content.contains("inventory"));
    }

    #[test]
    fn failing_executor_falls_back_to_a_direct_reply() {
        let generator = ScriptedGenerator::new(&[
            "check_price\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>",
            "Let me think about that.",
        ]);
        let outcome = run(&generator, BrokenExecutor);
        assert!(!outcome.final_reply().is_empty());
        assert_eq!(outcome.issued_calls().len(), 1);
        assert_eq!(outcome.issued_calls()[0].name, "check_price");
        let TurnOutcome::FailedCall { reason, .. } = &outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert!(reason.contains("connection reset"));

        let fallback = generator.request(1);
        assert_eq!(fallback.profile, Profile::Disabled);
        assert_eq!(fallback.messages.len(), 2);
    }

    #[test]
    fn missing_result_falls_back_to_a_direct_reply() {
        let generator = ScriptedGenerator::new(&[
            "sell\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>",
            "Maybe later.",
        ]);
        let outcome = run(&generator, SilentExecutor);
        assert!(matches!(outcome, TurnOutcome::FailedCall { .. }));
        assert_eq!(outcome.final_reply(), "Maybe later.");
    }

    #[test]
    fn results_without_information_are_not_shown() {
        let generator = ScriptedGenerator::new(&[
            "check_price\", \"arguments\": {\"item_name\": \"Oak Shield\"}}\n</tool_call>",
            "I am not sure about that one.",
        ]);
        let outcome = run(&generator, shop());
        assert!(matches!(outcome, TurnOutcome::CallReply { .. }));
        assert_eq!(outcome.issued_calls().len(), 1);
        let request = generator.request(1);
        assert_eq!(request.profile, Profile::Disabled);
        assert_eq!(request.messages.len(), 2);
    }

    #[test]
    fn naturalize_pass_rephrases_the_reply() {
        let config = OrchestratorConfig {
            naturalize_reply: true,
            ..Default::default()
        };
        let generator = ScriptedGenerator::new(&[
            "check_price\", \"arguments\": {\"item_name\": \"Iron Sword\"}}\n</tool_call>",
            "Price is 120 gold.",
            "Ah, that fine blade? A mere 120 gold!",
        ]);
        let (reply, calls) = run_with(&generator, shop(), config).into_parts();
        assert_eq!(reply, "Ah, that fine blade? A mere 120 gold!");
        assert_eq!(calls.len(), 1);
        assert_eq!(generator.request_count(), 3);

        let request = generator.request(2);
        assert_eq!(request.profile, Profile::Disabled);
        assert!(request.enable_thinking);
        assert!(
            request
                .seed_text
                .as_deref()
                .is_some_and(|seed| seed.contains("`Price is 120 gold.`"))
        );
        assert_eq!(request.messages.len(), 4);
    }

    #[test]
    fn malformed_calls_are_skipped() {
        let generator = ScriptedGenerator::new(&[
            "check_price\", \"arguments\": {\"item_name\": }\n</tool_call>",
            "Hmm?",
        ]);
        let outcome = run(&generator, shop());
        assert_eq!(outcome, TurnOutcome::DirectReply { reply: "Hmm?".to_owned() });
    }
}
