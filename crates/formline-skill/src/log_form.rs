//! The form-logging skill.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use formline_auth::IdentityResolver;
use formline_hub::FanoutHub;
use formline_session::SessionStore;
use formline_store::FormsRepository;
use formline_types::{Form, FormCategory, FormUrgency, FormView, ValidationError};

use crate::skill::Skill;

#[derive(Debug, Error)]
enum SkillError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Session(#[from] formline_session::Error),

    #[error(transparent)]
    Store(#[from] formline_store::StoreError),
}

#[derive(Debug)]
struct LogFormArgs {
    session_id: String,
    description: String,
    category: FormCategory,
    urgency: FormUrgency,
}

impl TryFrom<&serde_json::Value> for LogFormArgs {
    type Error = SkillError;

    fn try_from(args: &serde_json::Value) -> Result<Self, Self::Error> {
        let session_id = args
            .get("session_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or(SkillError::Missing("session_id"))?;
        let description = args
            .get("description")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or(SkillError::Missing("description"))?;

        let category = match args.get("category").and_then(|v| v.as_str()) {
            Some(s) => s.parse()?,
            None => FormCategory::General,
        };
        let urgency = match args.get("urgency").and_then(|v| v.as_str()) {
            Some(s) => s.parse()?,
            None => FormUrgency::Low,
        };

        Ok(Self {
            session_id: session_id.to_string(),
            description: description.to_string(),
            category,
            urgency,
        })
    }
}

/// Logs a support form from the conversation.
///
/// Side effects happen in a fixed order: touch the session (a session shell
/// is guaranteed to exist afterwards), resolve the caller's identity
/// best-effort, persist the form with its session binding, then broadcast.
/// A failed identity resolution is logged and swallowed; anonymous forms are
/// valid. Everything past the persist is reported truthfully but cannot
/// un-log the form.
pub struct LogFormSkill {
    sessions: SessionStore,
    forms: Arc<dyn FormsRepository>,
    resolver: Arc<IdentityResolver>,
    hub: Arc<FanoutHub>,
}

impl LogFormSkill {
    pub fn new(
        sessions: SessionStore,
        forms: Arc<dyn FormsRepository>,
        resolver: Arc<IdentityResolver>,
        hub: Arc<FanoutHub>,
    ) -> Self {
        Self {
            sessions,
            forms,
            resolver,
            hub,
        }
    }

    /// Log a form with already-validated arguments.
    ///
    /// Same hard boundary as [`Skill::invoke`]: the outcome is a sentence for
    /// the conversation, never an error.
    pub async fn log_form(
        &self,
        session_id: &str,
        description: &str,
        category: FormCategory,
        urgency: FormUrgency,
        credential: Option<&str>,
    ) -> String {
        let args = LogFormArgs {
            session_id: session_id.to_string(),
            description: description.to_string(),
            category,
            urgency,
        };
        match self.log_form_inner(args, credential).await {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "failed to log support form");
                "Something went wrong while logging your support form. Please try again in a \
                 moment."
                    .to_string()
            }
        }
    }

    async fn log_form_inner(
        &self,
        args: LogFormArgs,
        credential: Option<&str>,
    ) -> Result<String, SkillError> {
        self.sessions.get_or_create(&args.session_id).await?;

        let user_id = credential.and_then(|token| match self.resolver.resolve_token(token) {
            Ok(identity) => Some(identity.user_id),
            Err(_) => {
                debug!("credential did not resolve, logging form anonymously");
                None
            }
        });

        let form = Form::new(args.description, args.category, args.urgency, user_id);
        let form = self.forms.save(form, Some(&args.session_id)).await?;

        let view = match self.forms.to_views(std::slice::from_ref(&form)).await {
            Ok(mut views) if !views.is_empty() => views.remove(0),
            Ok(_) => FormView::project(&form, None),
            Err(e) => {
                // The form is already persisted; deliver it without the
                // username rather than fail the whole call.
                warn!(form_id = form.id, error = %e, "username lookup failed for broadcast");
                FormView::project(&form, None)
            }
        };

        let report = self.hub.broadcast_new_form(Some(&args.session_id), &view);
        info!(
            form_id = form.id,
            session_id = %args.session_id,
            category = %form.category,
            urgency = %form.urgency,
            session_receivers = report.session_delivered,
            admin_receivers = report.admin_delivered,
            "support form logged"
        );

        Ok(format!(
            "Logged support form #{} ({}, {} urgency). The support team has been notified.",
            form.id, form.category, form.urgency
        ))
    }
}

#[async_trait]
impl Skill for LogFormSkill {
    fn name(&self) -> &str {
        "log_form"
    }

    fn description(&self) -> &str {
        "Log a support form (ticket) for the user's current issue. Use this once the user has \
         described a problem that needs follow-up from the support team."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "The current chat session id"
                },
                "description": {
                    "type": "string",
                    "description": "One or two sentences describing the user's issue"
                },
                "category": {
                    "type": "string",
                    "enum": ["General", "Technical", "Billing", "Feedback", "Account", "Request"],
                    "description": "Issue category (default General)"
                },
                "urgency": {
                    "type": "string",
                    "enum": ["Low", "Medium", "High", "Critical"],
                    "description": "How urgent the issue is (default Low)"
                }
            },
            "required": ["session_id", "description"]
        })
    }

    async fn invoke(&self, args: serde_json::Value, credential: Option<&str>) -> String {
        let args = match LogFormArgs::try_from(&args) {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "rejected log_form arguments");
                return format!("I couldn't log that form: {e}.");
            }
        };

        self.log_form(
            &args.session_id,
            &args.description,
            args.category,
            args.urgency,
            credential,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formline_auth::{AuthConfig, OAuthClient, TokenKind, TokenService};
    use formline_hub::HubEvent;
    use formline_session::{CacheConfig, FormIndex, MemoryCacheBackend};
    use formline_store::{MemoryStore, StoreError, UserStore};
    use serde_json::json;

    struct Fixture {
        skill: LogFormSkill,
        sessions: SessionStore,
        index: FormIndex,
        forms: Arc<dyn FormsRepository>,
        users: Arc<dyn UserStore>,
        hub: Arc<FanoutHub>,
        tokens: TokenService,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryCacheBackend::new(CacheConfig::new()));
        let sessions = SessionStore::new(backend.clone());
        let index = FormIndex::new(backend);

        let store = Arc::new(MemoryStore::new(index.clone()));
        let forms: Arc<dyn FormsRepository> = store.clone();
        let users: Arc<dyn UserStore> = store;

        let tokens = TokenService::new(AuthConfig::new("test-secret"));
        let oauth = OAuthClient::new(None, None).unwrap();
        let resolver = Arc::new(IdentityResolver::new(
            tokens.clone(),
            oauth,
            users.clone(),
        ));

        let hub = Arc::new(FanoutHub::new());
        let skill = LogFormSkill::new(
            sessions.clone(),
            forms.clone(),
            resolver,
            hub.clone(),
        );

        Fixture {
            skill,
            sessions,
            index,
            forms,
            users,
            hub,
            tokens,
        }
    }

    #[tokio::test]
    async fn test_anonymous_form_full_pipeline() {
        let fx = fixture();
        let (_s, mut session_rx) = fx.hub.join_session("sess-1");
        let (_a, mut admin_rx) = fx.hub.join_admins();

        let reply = fx
            .skill
            .invoke(
                json!({
                    "session_id": "sess-1",
                    "description": "the export button does nothing",
                    "category": "Technical",
                    "urgency": "High"
                }),
                None,
            )
            .await;

        assert!(reply.contains("#1"), "unexpected reply: {reply}");

        // Persisted with a session shell and an index entry.
        let form = fx.forms.get_by_id(1).await.unwrap();
        assert_eq!(form.category, FormCategory::Technical);
        assert!(form.user_id.is_none());
        assert!(fx.sessions.exists("sess-1").await.unwrap());
        assert_eq!(fx.index.form_ids("sess-1").await.unwrap(), vec![1]);

        // Broadcast to both groups.
        assert!(matches!(
            session_rx.try_recv().unwrap(),
            HubEvent::ReceiveUserForm { form } if form.id == 1
        ));
        assert!(matches!(
            admin_rx.try_recv().unwrap(),
            HubEvent::AdminReceiveForm { form } if form.id == 1
        ));
    }

    #[tokio::test]
    async fn test_authenticated_form_carries_username() {
        let fx = fixture();
        let user = fx.users.create_local("ada", "hash").await.unwrap();
        let token = fx.tokens.issue(&user, TokenKind::Access).unwrap();
        let (_a, mut admin_rx) = fx.hub.join_admins();

        fx.skill
            .invoke(
                json!({"session_id": "sess-1", "description": "billing looks double-charged"}),
                Some(&token),
            )
            .await;

        let form = fx.forms.get_by_id(1).await.unwrap();
        assert_eq!(form.user_id, Some(user.id));

        match admin_rx.try_recv().unwrap() {
            HubEvent::AdminReceiveForm { form } => {
                assert_eq!(form.username.as_deref(), Some("ada"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_credential_is_swallowed() {
        let fx = fixture();

        let reply = fx
            .skill
            .invoke(
                json!({"session_id": "sess-1", "description": "cannot log in"}),
                Some("garbage-token"),
            )
            .await;

        assert!(reply.contains("#1"));
        let form = fx.forms.get_by_id(1).await.unwrap();
        assert!(form.user_id.is_none());
    }

    #[tokio::test]
    async fn test_invalid_urgency_writes_nothing() {
        let fx = fixture();
        let (_a, mut admin_rx) = fx.hub.join_admins();

        let reply = fx
            .skill
            .invoke(
                json!({
                    "session_id": "sess-1",
                    "description": "hello",
                    "urgency": "urgent-ish"
                }),
                None,
            )
            .await;

        assert!(reply.contains("urgency"), "unexpected reply: {reply}");
        assert!(matches!(
            fx.forms.get_by_id(1).await.unwrap_err(),
            StoreError::FormNotFound(1)
        ));
        assert!(admin_rx.try_recv().is_err());
        // Validation happens before any write, so no session shell either.
        assert!(!fx.sessions.exists("sess-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_description_is_rejected() {
        let fx = fixture();
        let reply = fx
            .skill
            .invoke(json!({"session_id": "sess-1", "description": "  "}), None)
            .await;
        assert!(reply.contains("description"), "unexpected reply: {reply}");
    }

    #[test]
    fn test_schema_names_required_fields() {
        let fx = fixture();
        let schema = fx.skill.parameters();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, vec!["session_id", "description"]);
        assert_eq!(fx.skill.name(), "log_form");
    }

    #[tokio::test]
    async fn test_consecutive_forms_extend_session_index_in_order() {
        let fx = fixture();

        for description in ["first issue", "second issue"] {
            fx.skill
                .invoke(
                    json!({"session_id": "sess-1", "description": description}),
                    None,
                )
                .await;
        }

        assert_eq!(fx.index.form_ids("sess-1").await.unwrap(), vec![1, 2]);
    }
}
