use serde::{Deserialize, Serialize};

/// Placeholder in a run command that expands to the staged source file name.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// How to execute source code of one language inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Identifier used in requests (e.g. `python`).
    pub id: String,
    /// Container image the code runs in.
    pub image: String,
    /// Command template; `{file}` expands to `main.<file_extension>`.
    pub run_command: Vec<String>,
    /// Extension of the staged source file, without the dot.
    pub file_extension: String,
}

impl LanguageConfig {
    /// Name of the file the source code is staged into.
    pub fn source_file_name(&self) -> String {
        format!("main.{}", self.file_extension)
    }

    /// Run command with the source file placeholder expanded.
    pub fn command(&self) -> Vec<String> {
        let file = self.source_file_name();
        self.run_command
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, &file))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_expands_file_placeholder() {
        let config = LanguageConfig {
            id: "go".into(),
            image: "golang:1.22-alpine".into(),
            run_command: vec!["go".into(), "run".into(), "{file}".into()],
            file_extension: "go".into(),
        };
        assert_eq!(config.source_file_name(), "main.go");
        assert_eq!(config.command(), vec!["go", "run", "main.go"]);
    }
}
