//! Prompt loader: built-in definitions with workspace YAML overrides.

use crate::types::PromptDefinition;
use docent_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompt used to synthesize the final answer.
pub const ANSWER_PROMPT_ID: &str = "answer";

/// Prompt used to paraphrase a question for multi-query retrieval.
pub const EXPAND_PROMPT_ID: &str = "expand_query";

const ANSWER_TEMPLATE: &str = "You are an expert assistant on the technical and regulatory documents \
provided below. Your goal is to give precise, useful answers grounded in the text extracted \
from those documents.

Use the following context to answer the user's question, replying in the language of the question.

Instructions:
1. Base your answer directly on the information in the context.
2. Synthesize the information from the different passages into a complete and coherent answer. \
If the text describes a general case, explain how it applies to the specific case in the question.
3. If the answer cannot be found in or reasonably inferred from the text, say that the specific \
information was not found in the documents.
4. Structure the answer clearly, using lists or paragraphs as needed.

Context:
{{context}}

Question: {{question}}

Answer:";

const EXPAND_TEMPLATE: &str = "You are helping search a collection of technical and regulatory documents. \
Generate {{count}} different rewordings of the user's question, using the vocabulary a normative \
document would use. Each rewording must keep the original meaning.

Return one rewording per line, without numbering or commentary.

Question: {{question}}";

/// Built-in prompt definitions, in listing order.
pub fn builtin_prompts() -> Vec<PromptDefinition> {
    vec![
        PromptDefinition {
            id: ANSWER_PROMPT_ID.to_string(),
            title: "Grounded answer".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            variables: vec!["context".to_string(), "question".to_string()],
            template: ANSWER_TEMPLATE.to_string(),
        },
        PromptDefinition {
            id: EXPAND_PROMPT_ID.to_string(),
            title: "Query expansion".to_string(),
            api_version: "1.0".to_string(),
            system: None,
            variables: vec!["count".to_string(), "question".to_string()],
            template: EXPAND_TEMPLATE.to_string(),
        },
    ]
}

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `.docent/prompts/` takes precedence over the
/// built-in definition with the same ID.
///
/// # Example
/// ```no_run
/// use docent_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to parse prompt YAML {:?}: {}",
                prompt_file, e
            ))
        })?;

        if definition.id != prompt_id {
            return Err(AppError::Prompt(format!(
                "Prompt file {:?} declares id '{}', expected '{}'",
                prompt_file, definition.id, prompt_id
            )));
        }

        validate_prompt(&definition)?;
        return Ok(definition);
    }

    builtin_prompts()
        .into_iter()
        .find(|p| p.id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))
}

/// List all available prompt IDs: built-ins first, then workspace-only files.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = builtin_prompts().into_iter().map(|p| p.id).collect();

    let dir = prompts_dir(workspace_path);
    if !dir.exists() {
        return Ok(prompt_ids);
    }

    let mut overrides = Vec::new();
    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !prompt_ids.iter().any(|id| id == stem) {
                    overrides.push(stem.to_string());
                }
            }
        }
    }
    overrides.sort();
    prompt_ids.extend(overrides);

    Ok(prompt_ids)
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".docent").join("prompts")
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for variable in &def.variables {
        if !def.template.contains(&format!("{{{{{}}}}}", variable)) {
            return Err(AppError::Prompt(format!(
                "Prompt '{}' declares variable '{}' but its template never uses it",
                def.id, variable
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, content: &str) {
        let prompts_dir = dir.join(".docent/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_builtins_validate() {
        for prompt in builtin_prompts() {
            validate_prompt(&prompt).unwrap();
        }
    }

    #[test]
    fn test_load_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.id, "answer");
        assert!(prompt.template.contains("{{context}}"));
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "answer",
            r#"
id: answer
title: "Terse answer"
apiVersion: "1.1"
variables: [context, question]
template: "{{context}} => {{question}}"
"#,
        );

        let prompt = load_prompt(temp_dir.path(), "answer").unwrap();
        assert_eq!(prompt.title, "Terse answer");
        assert_eq!(prompt.template, "{{context}} => {{question}}");
    }

    #[test]
    fn test_override_missing_variable_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "answer",
            r#"
id: answer
title: "Broken"
apiVersion: "1.0"
variables: [context, question]
template: "Only {{question}}"
"#,
        );

        assert!(load_prompt(temp_dir.path(), "answer").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "answer", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "answer").is_err());
    }

    #[test]
    fn test_load_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "summary",
            "id: summary\ntitle: S\napiVersion: \"1.0\"\ntemplate: \"{{question}}\"\n",
        );
        write_prompt(
            temp_dir.path(),
            "answer",
            "id: answer\ntitle: A\napiVersion: \"1.0\"\ntemplate: \"{{context}}{{question}}\"\n",
        );

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["answer", "expand_query", "summary"]);
    }
}
