//! API routes.

pub mod auth;
pub mod forms;
pub mod health;
pub mod session;
pub mod skills;
pub mod ws;

pub use auth::{
    CallbackParams, CallbackResponse, LogoutParams, logout_handler, oauth_callback_handler,
    refresh_handler,
};
pub use forms::{
    AdminFormsParams, admin_forms_handler, session_forms_handler, update_state_handler,
};
pub use health::{HealthResponse, health_routes};
pub use session::{SessionValidResponse, create_session_handler, session_valid_handler};
pub use skills::{InvokeResponse, SkillInfo, invoke_skill_handler, list_skills_handler};
pub use ws::{AdminHubParams, FormsHubParams, admin_hub_handler, forms_hub_handler};
