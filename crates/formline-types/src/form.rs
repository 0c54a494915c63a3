//! Support form (ticket) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What a form is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormCategory {
    General,
    Technical,
    Billing,
    Feedback,
    Account,
    Request,
}

impl Default for FormCategory {
    fn default() -> Self {
        Self::General
    }
}

/// How urgent the submitter considers the issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormUrgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for FormUrgency {
    fn default() -> Self {
        Self::Low
    }
}

/// Lifecycle state of a form. New forms start `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormState {
    Open,
    InProgress,
    Closed,
}

impl Default for FormState {
    fn default() -> Self {
        Self::Open
    }
}

macro_rules! string_enum {
    ($ty:ident, $field:literal, [$(($variant:ident, $name:literal)),+ $(,)?]) => {
        impl $ty {
            /// Stable string name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ValidationError::new($field, s))
            }
        }
    };
}

string_enum!(
    FormCategory,
    "category",
    [
        (General, "General"),
        (Technical, "Technical"),
        (Billing, "Billing"),
        (Feedback, "Feedback"),
        (Account, "Account"),
        (Request, "Request"),
    ]
);

string_enum!(
    FormUrgency,
    "urgency",
    [
        (Low, "Low"),
        (Medium, "Medium"),
        (High, "High"),
        (Critical, "Critical"),
    ]
);

string_enum!(
    FormState,
    "state",
    [(Open, "Open"), (InProgress, "InProgress"), (Closed, "Closed")]
);

/// A submitted support form.
///
/// Owned by the forms repository; other components hold only its id.
/// Immutable once created except for `state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Repository-assigned identifier (0 until saved).
    pub id: i64,
    pub description: String,
    pub category: FormCategory,
    pub urgency: FormUrgency,
    pub state: FormState,
    pub created_at: DateTime<Utc>,
    /// Submitting user, if the session carried a valid credential.
    pub user_id: Option<i64>,
}

impl Form {
    /// Create a new unsaved form with `state = Open` and `created_at = now`.
    pub fn new(
        description: impl Into<String>,
        category: FormCategory,
        urgency: FormUrgency,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            id: 0,
            description: description.into(),
            category,
            urgency,
            state: FormState::Open,
            created_at: Utc::now(),
            user_id,
        }
    }
}

/// Denormalized projection of a form for clients.
///
/// Carries the owning user's username instead of a foreign key; this is the
/// only shape that crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormView {
    pub id: i64,
    pub description: String,
    pub category: FormCategory,
    pub urgency: FormUrgency,
    pub state: FormState,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl FormView {
    /// Project a form into its client-facing view.
    pub fn project(form: &Form, username: Option<String>) -> Self {
        Self {
            id: form.id,
            description: form.description.clone(),
            category: form.category,
            urgency: form.urgency,
            state: form.state,
            created_at: form.created_at,
            username,
        }
    }
}
