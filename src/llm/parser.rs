//! Turn natural language commands into candidate plans via an LLM
//!
//! The LLM only drafts the plan. Its reply is parsed leniently (surrounding
//! prose is ignored) and then handed to the schema validator like any other
//! untrusted input.

use crate::core::error::{ArmError, Result};
use crate::llm::client::LlmClient;
use crate::llm::{ActionModel, ModelRequest};
use crate::schema::{ActionVocabulary, CandidateAction, CandidatePlan};
use async_trait::async_trait;
use serde_json::Value;

/// `ActionModel` backed by a remote LLM
pub struct LlmActionModel {
    client: LlmClient,
    system_prompt: String,
}

impl LlmActionModel {
    pub fn new(client: LlmClient, vocabulary: &ActionVocabulary) -> Self {
        Self {
            client,
            system_prompt: system_prompt(vocabulary),
        }
    }
}

#[async_trait]
impl ActionModel for LlmActionModel {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn propose(&self, request: &ModelRequest) -> Result<CandidatePlan> {
        let user_prompt = user_prompt(request);
        let response = self.client.complete(&self.system_prompt, &user_prompt).await?;
        tracing::debug!(attempt = request.attempt, "model replied: {}", response);
        parse_candidate(&response)
    }
}

/// Build the per-attempt user message
pub fn user_prompt(request: &ModelRequest) -> String {
    let mut s = String::new();

    if !request.context.is_empty() {
        s.push_str(&format!("CONTEXT:\n{}\n", request.context));
    }
    if !request.known_objects.is_empty() {
        s.push_str(&format!(
            "KNOWN OBJECTS: {}\n\n",
            request.known_objects.join(", ")
        ));
    }

    s.push_str(&format!("COMMAND:\n{}\n\n", request.command));

    if let Some(reason) = &request.failure_reason {
        s.push_str(&format!(
            "ATTEMPT {} - the previous plan was refused or failed:\n{}\nRevise the plan to avoid this problem.\n\n",
            request.attempt, reason
        ));
    }

    s.push_str("Return the plan as JSON:");
    s
}

/// Parse a model reply into a candidate plan
///
/// Accepts either a full plan (`{"steps": [...], "globals": {...}}`) or a
/// single step object (`{"action": "pick", ...}`).
pub fn parse_candidate(response: &str) -> Result<CandidatePlan> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str).map_err(|e| {
        ArmError::ModelOutput(format!("Invalid JSON: {} - Response: {}", e, response))
    })?;

    let plan = if value.get("steps").is_some() {
        serde_json::from_value::<CandidatePlan>(value)
    } else if value.get("action").is_some() {
        serde_json::from_value::<CandidateAction>(value).map(CandidatePlan::single)
    } else {
        return Err(ArmError::ModelOutput(format!(
            "Reply has neither 'steps' nor 'action': {}",
            json_str
        )));
    };

    plan.map_err(|e| ArmError::ModelOutput(format!("Failed to parse plan: {}", e)))
}

/// Extract JSON object from LLM response (handles surrounding text)
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| ArmError::ModelOutput("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| ArmError::ModelOutput("No closing brace found in response".into()))?;
    if end < start {
        return Err(ArmError::ModelOutput("Unbalanced braces in response".into()));
    }
    Ok(&response[start..=end])
}

/// System prompt for plan drafting
fn system_prompt(vocabulary: &ActionVocabulary) -> String {
    format!(
        r#"You translate operator commands for a robot arm into a structured plan.
Output JSON only, no explanation.

AVAILABLE ACTIONS (arguments marked ? are optional):
{}
RULES:
- Use only the actions above, with only the listed arguments.
- Objects and targets are frame names; prefer names from KNOWN OBJECTS.
- "it", "that" and similar refer to the most recent object in CONTEXT.
- Poses are meters in the robot base frame.
- "keep vertical" / "upright" means constraints.keep_vertical = true.
- globals.vel_scale and globals.accel_scale are fractions of max speed (0-1].

OUTPUT FORMAT:
{{
  "steps": [{{"action": "pick", "object": "...", ...}}, ...],
  "globals": {{"vel_scale": 0.5, "accel_scale": 0.3}}
}}

Example:
"pick the red cube and place it on the blue box, keep it vertical" ->
{{"steps": [{{"action": "pick", "object": "red_cube", "grasp": {{"approach_axis": "z-", "pregrasp_m": 0.08}}, "constraints": {{"keep_vertical": true}}}}, {{"action": "place", "target": "blue_box", "offset_xyz": [0.0, 0.0, 0.10], "constraints": {{"keep_vertical": true}}}}], "globals": {{"vel_scale": 0.5, "accel_scale": 0.3}}}}
"#,
        vocabulary.describe()
    )
}
