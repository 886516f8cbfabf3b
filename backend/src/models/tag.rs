//! Prompt categories and the tag vocabulary.

use serde::{Deserialize, Serialize};

/// Category a prompt is filed under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PromptCategory {
    Assistant,
    Instruction,
    Persona,
    #[serde(rename = "Project Context")]
    ProjectContext,
    #[serde(rename = "Domain Knowledge")]
    DomainKnowledge,
    Utility,
    #[default]
    Other,
}

impl PromptCategory {
    pub const ALL: [PromptCategory; 7] = [
        PromptCategory::Assistant,
        PromptCategory::Instruction,
        PromptCategory::Persona,
        PromptCategory::ProjectContext,
        PromptCategory::DomainKnowledge,
        PromptCategory::Utility,
        PromptCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Assistant => "Assistant",
            PromptCategory::Instruction => "Instruction",
            PromptCategory::Persona => "Persona",
            PromptCategory::ProjectContext => "Project Context",
            PromptCategory::DomainKnowledge => "Domain Knowledge",
            PromptCategory::Utility => "Utility",
            PromptCategory::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Tags a prompt may carry, grouped the way the picker shows them.
pub const PROMPT_TAGS: &[&str] = &[
    // Prompt types
    "Template",
    "System Prompt",
    "User Prompt",
    "Chain Prompt",
    "One-Shot",
    "Few-Shot",
    "Zero-Shot",
    // Languages
    "Multi-Language",
    "English",
    "French",
    "Spanish",
    "German",
    "Italian",
    "Portuguese",
    "Russian",
    "Chinese",
    "Japanese",
    "Korean",
    // Programming languages
    "Python",
    "JavaScript/TypeScript",
    "HTML/CSS",
    "Java",
    "C#",
    "C++",
    "Ruby",
    "PHP",
    "Go",
    "Rust",
    "Swift",
    "Kotlin",
    "SQL",
    // Frameworks and technologies
    "React",
    "Angular",
    "Vue.js",
    "Next.js",
    "Express",
    "Django",
    "Spring",
    "Firebase",
    "Docker",
    "Kubernetes",
    // Use cases
    "Coding",
    "Writing",
    "Translation",
    "Summarization",
    "Data Analysis",
    "Creative",
    "Educational",
    "Business",
    "Debugging",
    "Refactoring",
    "Documentation",
    "Testing",
    // Complexity
    "Simple",
    "Intermediate",
    "Advanced",
];

pub fn is_known_tag(tag: &str) -> bool {
    PROMPT_TAGS.contains(&tag)
}
