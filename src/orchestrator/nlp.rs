//! Natural-language intent classification.
//!
//! Free-form messages go through the NLPProcessor agent, which holds no
//! tools and only classifies: an intent label, optionally the command the
//! message maps to, the suggested downstream agent, and extracted
//! parameters. The model is instructed to answer in strict JSON; anything
//! unparseable falls back to the MessageProcessor with the raw text.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::agents::{self, AgentKind};
use crate::domain::UserContext;
use crate::llm::{ChatMessage, ChatRequest, LlmClient, LlmError};

/// Classification of a free-form message.
#[derive(Debug, Clone, PartialEq)]
pub struct NlIntent {
    /// Short intent label, e.g. `get_phone_number`.
    pub intent: String,
    /// Known command the message maps to, when one fits.
    pub command: Option<String>,
    /// Suggested downstream agent.
    pub agent: AgentKind,
    /// Extracted parameters.
    pub parameters: serde_json::Value,
}

impl NlIntent {
    fn fallback() -> Self {
        Self {
            intent: "unclassified".to_owned(),
            command: None,
            agent: AgentKind::MessageProcessor,
            parameters: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: Option<String>,
    command: Option<String>,
    agent: Option<String>,
    #[serde(default)]
    parameters: serde_json::Value,
}

const CLASSIFY_INSTRUCTIONS: &str = "\
Classify the user's message. Respond with ONE JSON object and nothing else:\n\
{\"intent\": \"<short_label>\", \"command\": \"</command or null>\", \
\"agent\": \"<agent_name>\", \"parameters\": {}}\n\
Valid agents: message_processor, help_assistant, player_coordinator, \
team_administrator, squad_selector.\n\
Set \"command\" only when the message clearly asks for one of the team \
commands; otherwise use null.";

/// Maximum tokens for a classification reply.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Run the classifier.
///
/// # Errors
///
/// Propagates [`LlmError`] when the model is unreachable; malformed model
/// output is NOT an error and degrades to the fallback classification.
pub async fn classify(
    llm: &dyn LlmClient,
    ctx: &UserContext,
    text: &str,
    temperature: f32,
    timeout: Duration,
) -> Result<NlIntent, LlmError> {
    let definition = agents::definition(AgentKind::NlpProcessor);
    let system = format!(
        "{}\n\n{}",
        agents::system_prompt(definition, ctx),
        CLASSIFY_INSTRUCTIONS
    );

    let response = llm
        .complete(ChatRequest {
            system,
            messages: vec![ChatMessage::user(text.to_owned())],
            tools: Vec::new(),
            temperature,
            max_tokens: CLASSIFY_MAX_TOKENS,
            timeout,
        })
        .await?;

    Ok(parse_intent(&response.text))
}

/// Parse the model's JSON reply, tolerating prose around the object.
pub(crate) fn parse_intent(text: &str) -> NlIntent {
    let Some(json_str) = extract_json_object(text) else {
        warn!("nlp reply contained no JSON object, using fallback");
        return NlIntent::fallback();
    };

    let raw: RawIntent = match serde_json::from_str(json_str) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "nlp reply was not valid JSON, using fallback");
            return NlIntent::fallback();
        }
    };

    let agent = raw
        .agent
        .as_deref()
        .and_then(|name| name.parse::<AgentKind>().ok())
        // The classifier must not route back to itself.
        .filter(|kind| *kind != AgentKind::NlpProcessor)
        .unwrap_or(AgentKind::MessageProcessor);

    let command = raw
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("null"))
        .map(|c| {
            if c.starts_with('/') {
                c.to_lowercase()
            } else {
                format!("/{}", c.to_lowercase())
            }
        });

    let intent = raw
        .intent
        .map(|i| i.trim().to_owned())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| "unclassified".to_owned());

    debug!(intent = %intent, command = ?command, agent = %agent, "nlp classified");
    NlIntent {
        intent,
        command,
        agent,
        parameters: raw.parameters,
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let intent = parse_intent(
            r#"{"intent": "list_players", "command": "/list", "agent": "player_coordinator", "parameters": {}}"#,
        );
        assert_eq!(intent.intent, "list_players");
        assert_eq!(intent.command.as_deref(), Some("/list"));
        assert_eq!(intent.agent, AgentKind::PlayerCoordinator);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let intent = parse_intent(
            "Sure, here is the classification:\n{\"intent\": \"help\", \"command\": null, \"agent\": \"help_assistant\"}\nDone.",
        );
        assert_eq!(intent.agent, AgentKind::HelpAssistant);
        assert!(intent.command.is_none());
    }

    #[test]
    fn bare_command_name_gains_slash() {
        let intent = parse_intent(r#"{"intent": "x", "command": "list", "agent": "message_processor"}"#);
        assert_eq!(intent.command.as_deref(), Some("/list"));
    }

    #[test]
    fn garbage_degrades_to_fallback() {
        let intent = parse_intent("I have no idea what you mean");
        assert_eq!(intent.agent, AgentKind::MessageProcessor);
        assert!(intent.command.is_none());
        assert_eq!(intent.intent, "unclassified");
    }

    #[test]
    fn nlp_processor_suggestion_is_redirected() {
        let intent = parse_intent(r#"{"intent": "x", "agent": "nlp_processor"}"#);
        assert_eq!(intent.agent, AgentKind::MessageProcessor);
    }

    #[test]
    fn unknown_agent_degrades_to_message_processor() {
        let intent = parse_intent(r#"{"intent": "x", "agent": "coach_gpt"}"#);
        assert_eq!(intent.agent, AgentKind::MessageProcessor);
    }
}
