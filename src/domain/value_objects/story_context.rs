//! Story context shared by captions, placeholders and the title page

use serde::{Deserialize, Serialize};

const DEFAULT_PROTAGONIST: &str = "Our Hero";
const DEFAULT_SETTING: &str = "a magical land";
const DEFAULT_MISSION: &str = "a great adventure";
const DEFAULT_TITLE: &str = "My Story";

/// Who the story is about and where it happens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryContext {
    pub title: String,
    pub protagonist: String,
    pub setting: String,
    pub mission: String,
}

impl StoryContext {
    /// Build a context from optional request fields, filling blanks with defaults.
    ///
    /// Without an explicit title, one is derived from the protagonist and
    /// mission when both were supplied.
    pub fn new(
        title: Option<&str>,
        protagonist: Option<&str>,
        setting: Option<&str>,
        mission: Option<&str>,
    ) -> Self {
        let protagonist_given = non_blank(protagonist);
        let mission_given = non_blank(mission);

        let title = match (non_blank(title), protagonist_given, mission_given) {
            (Some(title), _, _) => title.to_string(),
            (None, Some(hero), Some(mission)) => format!("{} and {}", hero, mission),
            (None, Some(hero), None) => format!("The Adventures of {}", hero),
            _ => DEFAULT_TITLE.to_string(),
        };

        Self {
            title,
            protagonist: protagonist_given.unwrap_or(DEFAULT_PROTAGONIST).to_string(),
            setting: non_blank(setting).unwrap_or(DEFAULT_SETTING).to_string(),
            mission: mission_given.unwrap_or(DEFAULT_MISSION).to_string(),
        }
    }
}

impl Default for StoryContext {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
