//! TOML configuration.
//!
//! Every key is optional; an empty document yields the defaults.
//!
//! ```toml
//! [orchestrator]
//! reply-sentinel = "reply"
//! naturalize-reply = false
//!
//! [orchestrator.sampling]
//! max-new-tokens = 128
//! temperature = 0.7
//!
//! [lint]
//! checks = ["role-alternation", "tag-balance"]
//! exhaustive = false
//!
//! [tracing]
//! level = "info"
//! format = "compact"
//! ```

use crate::error::Result;
use crate::generator::SamplingConfig;
use crate::lint::Check;
use crate::JsonValue;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Turn orchestration.
    pub orchestrator: OrchestratorConfig,
    /// Offline linter.
    pub lint: LintConfig,
    /// Log output of the command line tools.
    pub tracing: TracingConfig,
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }
}

/// Settings of the [`DialogueOrchestrator`](crate::orchestrator::DialogueOrchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OrchestratorConfig {
    /// Reserved function name meaning "reply without calling anything".
    pub reply_sentinel: String,
    /// Text the tool-invocation completion is seeded with.
    pub call_seed: String,
    /// Reasoning the reply-after-call completion is seeded with.
    pub rationale_seed: String,
    /// Return value shown to the model for every executed action.
    pub action_message: String,
    /// Tool return value meaning "nothing to report"; such results are dropped.
    pub no_information: JsonValue,
    /// Tokens suppressed while replying after a call.
    pub suppressed_tokens: Vec<String>,
    /// Whether to rephrase the reply after a call in one more pass.
    pub naturalize_reply: bool,
    /// Sampling parameters shared by every generation.
    pub sampling: SamplingConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reply_sentinel: "reply".to_owned(),
            call_seed: "<tool_call>\n{\"name\": \"".to_owned(),
            rationale_seed: concat!(
                "<think>\n",
                "I should integrate all the factual data from <tool_response> to my response. ",
                "Additionally, I should sound more natural, human-like and respect my persona.\n",
                "</think>\n\n",
            )
            .to_owned(),
            action_message: "The action was successfully executed.".to_owned(),
            no_information: json!([{"information": "n/a"}]),
            suppressed_tokens: vec!["<tool_call>".to_owned(), "</tool_call>".to_owned()],
            naturalize_reply: false,
            sampling: SamplingConfig::default(),
        }
    }
}

/// Settings of the offline linter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LintConfig {
    /// Checks to run.
    pub checks: Vec<Check>,
    /// Whether to report every offending record instead of the first one.
    pub exhaustive: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            checks: Check::ALL.to_vec(),
            exhaustive: false,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TracingConfig {
    /// Maximum level, also the default directive of the env filter.
    pub level: String,
    /// Directives used when `RUST_LOG` is not set.
    pub filter: Option<String>,
    /// Event format: `compact`, `pretty`, `json` or `full`.
    pub format: String,
    /// Whether to emit ANSI colors.
    pub ansi: bool,
    /// Whether to display event targets.
    pub display_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            filter: None,
            format: "compact".to_owned(),
            ansi: true,
            display_target: false,
        }
    }
}
