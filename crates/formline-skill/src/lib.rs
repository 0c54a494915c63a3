//! Conversational skills over the Formline stores and hub.
//!
//! The one skill that matters here is [`LogFormSkill`]: it turns a chat
//! agent's decision to log a ticket into the persist-then-broadcast pipeline.
//! The [`Skill`] trait is the seam a tool-calling runtime registers against;
//! results cross that seam as plain strings, never as errors.

mod log_form;
mod registry;
mod skill;

pub use log_form::LogFormSkill;
pub use registry::SkillRegistry;
pub use skill::Skill;
