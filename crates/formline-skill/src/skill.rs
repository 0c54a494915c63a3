//! The seam between a conversational runtime and Formline actions.

use async_trait::async_trait;

/// A callable action the chat agent can select.
///
/// Skills declare their parameters as a JSON Schema so a tool-calling model
/// can fill them in. `invoke` never fails: every outcome, success or not, is
/// a human-readable string handed back into the conversation.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique name of this skill.
    fn name(&self) -> &str;

    /// Human-readable description of what this skill does.
    fn description(&self) -> &str;

    /// JSON Schema for this skill's arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Invoke the skill.
    ///
    /// `credential` is the caller's access token, if any; skills that care
    /// about identity resolve it best-effort.
    async fn invoke(&self, args: serde_json::Value, credential: Option<&str>) -> String;
}
