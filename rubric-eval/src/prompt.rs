//! Rubric-generation instruction template
//!
//! The instruction text is a versioned asset kept outside the code. The
//! built-in version is compiled in; a replacement can be loaded from disk.

use std::path::{Path, PathBuf};

use crate::providers::Message;

/// Version tag of the built-in template
pub const PROTOCOL_VERSION: &str = "v1";

const BUILTIN_PROTOCOL: &str = include_str!("../prompts/rubric_protocol_v1.txt");

/// Label prefixed to the caller's task prompt
pub const PROMPT_LABEL: &str = "User Prompt: ";
/// Label prefixed to the candidate response
pub const RESPONSE_LABEL: &str = "LLM's Response: ";

/// Errors loading a template
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is empty")]
    Empty { path: PathBuf },
}

/// System instruction plus its version tag
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    version: String,
    text: String,
}

impl PromptTemplate {
    /// The compiled-in protocol
    pub fn builtin() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            text: BUILTIN_PROTOCOL.trim().to_string(),
        }
    }

    /// Load a replacement template; the file stem becomes its version tag
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PromptError::Empty {
                path: path.to_path_buf(),
            });
        }
        let version = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Ok(Self {
            version,
            text: text.to_string(),
        })
    }

    /// Built-in template unless a path is given
    pub fn load(path: Option<&Path>) -> Result<Self, PromptError> {
        match path {
            Some(path) => {
                let template = Self::from_file(path)?;
                tracing::info!("Loaded instruction template {} from {}", template.version, path.display());
                Ok(template)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Build the three-message evaluation conversation
    pub fn build_messages(&self, task_prompt: &str, response: &str) -> Vec<Message> {
        vec![
            Message::system(self.text.clone()),
            Message::user(format!("{}{}", PROMPT_LABEL, task_prompt)),
            Message::user(format!("{}{}", RESPONSE_LABEL, response)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Position of `needle` in the template, failing the test if absent
    fn position(text: &str, needle: &str) -> usize {
        text.find(needle)
            .unwrap_or_else(|| panic!("template is missing {:?}", needle))
    }

    #[test]
    fn test_builtin_protocol_steps_in_order() {
        let template = PromptTemplate::builtin();
        let text = template.text();

        let steps = [
            "Step 1: Analyze the Task and Domain",
            "Step 2: Generate Customized Evaluation Metrics",
            "Step 3: Evaluate the LLM's Response Using the Generated Metrics",
            "Step 4: Provide an Overall Assessment and Recommendations",
            "Template for the Evaluation Report:",
            "Example Evaluation Report:",
            "Guidelines for Using This Prompt:",
        ];
        let positions: Vec<usize> = steps.iter().map(|s| position(text, s)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "sections out of order");
    }

    #[test]
    fn test_builtin_protocol_worked_example() {
        let text = PromptTemplate::builtin().text().to_string();
        assert!(text.contains("Explain the process of mitosis in human cells."));
        assert!(text.contains("Metric 1: Scientific Accuracy"));
        assert!(text.contains("DNA replication occurs during interphase"));
        assert!(text.contains("Graded (0-5)"));
        assert!(text.contains("Binary (Pass/Fail)"));
        assert!(text.contains("between 3 and 10 evaluation metrics"));
    }

    #[test]
    fn test_builtin_version() {
        assert_eq!(PromptTemplate::builtin().version(), PROTOCOL_VERSION);
        assert!(!PromptTemplate::builtin().text().starts_with('\n'));
    }

    #[test]
    fn test_build_messages() {
        let messages = PromptTemplate::builtin().build_messages("What is 2+2?", "5");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.starts_with("Instructions:"));
        assert_eq!(messages[1], Message::user("User Prompt: What is 2+2?"));
        assert_eq!(messages[2], Message::user("LLM's Response: 5"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terse_v2.txt");
        std::fs::write(&path, "\nScore the response.\n").unwrap();

        let template = PromptTemplate::load(Some(&path)).unwrap();
        assert_eq!(template.version(), "terse_v2");
        assert_eq!(template.text(), "Score the response.");
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n").unwrap();

        assert!(matches!(
            PromptTemplate::from_file(&path),
            Err(PromptError::Empty { .. })
        ));
    }
}
