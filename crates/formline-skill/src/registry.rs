//! Registry of available skills.

use std::collections::HashMap;
use std::sync::Arc;

use crate::skill::Skill;

/// Holds the skills a conversational runtime may invoke, keyed by name.
#[derive(Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Register a skill.
    ///
    /// If a skill with the same name already exists, it will be replaced.
    pub fn register<S: Skill + 'static>(&mut self, skill: S) {
        let name = skill.name().to_string();
        self.skills.insert(name, Arc::new(skill));
    }

    /// Register a skill from an Arc.
    pub fn register_arc(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.name().to_string();
        self.skills.insert(name, skill);
    }

    /// Get a skill by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    /// Check if a skill exists.
    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    /// Iterate over all registered skills.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Skill>> {
        self.skills.values()
    }

    /// Get all skill names.
    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
