use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::PromptConfig;

const BUILT_IN_PROMPTS: &str = include_str!("../../prompts/default.toml");

pub type PromptArguments = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt `{0}` not found")]
    NotFound(String),
    #[error("missing argument `{argument}` when rendering prompt `{key}`")]
    MissingArgument { key: String, argument: String },
    #[error("prompt `{key}` has an unclosed placeholder starting at byte {offset}")]
    Unclosed { key: String, offset: usize },
    #[error("prompt `{key}` declares required argument `{argument}` that never appears in the template")]
    InvalidRequired { key: String, argument: String },
    #[error("failed to read prompt file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse built-in prompts: {0}")]
    BuiltIn(#[source] toml::de::Error),
    #[error("failed to parse prompt file `{path}` as TOML: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse prompt file `{path}` as YAML: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(String),
}

/// A compiled `{placeholder}` template. `{{` and `}}` render as literal
/// braces.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    key: String,
    source: PromptSource,
    segments: Vec<Segment>,
    required: BTreeSet<String>,
}

impl PromptTemplate {
    pub fn compile(key: impl Into<String>, text: &str) -> Result<Self, PromptError> {
        Self::build(key.into(), text, Vec::new(), PromptSource::BuiltIn)
    }

    fn build(
        key: String,
        text: &str,
        required: Vec<String>,
        source: PromptSource,
    ) -> Result<Self, PromptError> {
        let segments = tokenize(&key, text)?;
        let slots: BTreeSet<String> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Slot(name) => Some(name.clone()),
                Segment::Text(_) => None,
            })
            .collect();

        let required = if required.is_empty() {
            slots
        } else {
            let mut declared = BTreeSet::new();
            for argument in required {
                let argument = argument.trim().to_string();
                if !slots.contains(&argument) {
                    return Err(PromptError::InvalidRequired { key, argument });
                }
                declared.insert(argument);
            }
            declared
        };

        Ok(Self {
            key,
            source,
            segments,
            required,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    /// Renders the template. Optional placeholders without a value render as
    /// nothing.
    pub fn render(&self, arguments: &PromptArguments) -> Result<String, PromptError> {
        if let Some(missing) = self
            .required
            .iter()
            .find(|name| !arguments.contains_key(name.as_str()))
        {
            return Err(PromptError::MissingArgument {
                key: self.key.clone(),
                argument: missing.clone(),
            });
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(name) => {
                    if let Some(value) = arguments.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn tokenize(key: &str, text: &str) -> Result<Vec<Segment>, PromptError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    let mut consumed = 0usize;

    while let Some(pos) = rest.find(['{', '}']) {
        literal.push_str(&rest[..pos]);
        let brace = &rest[pos..];

        if brace.starts_with("{{") {
            literal.push('{');
            rest = &brace[2..];
            consumed += pos + 2;
        } else if brace.starts_with("}}") {
            literal.push('}');
            rest = &brace[2..];
            consumed += pos + 2;
        } else if brace.starts_with('}') {
            literal.push('}');
            rest = &brace[1..];
            consumed += pos + 1;
        } else {
            let Some(close) = brace.find('}') else {
                return Err(PromptError::Unclosed {
                    key: key.to_string(),
                    offset: consumed + pos,
                });
            };
            let name = brace[1..close].trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                literal.push_str(&brace[..=close]);
            } else {
                if !literal.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(name.to_string()));
            }
            rest = &brace[close + 1..];
            consumed += pos + close + 1;
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    Ok(segments)
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    #[serde(default)]
    prompts: BTreeMap<String, PromptEntry>,
}

#[derive(Debug, Deserialize)]
struct PromptEntry {
    #[serde(alias = "text")]
    template: String,
    #[serde(default)]
    required: Vec<String>,
}

/// Built-in templates overlaid with user files from the configured
/// directories. Files are applied in sorted order, so a later file wins.
#[derive(Debug)]
pub struct PromptRegistry {
    templates: BTreeMap<String, PromptTemplate>,
    directories: Vec<PathBuf>,
}

impl PromptRegistry {
    pub fn new() -> Result<Self, PromptError> {
        Self::with_directories(Vec::new())
    }

    pub fn from_prompt_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Self::with_directories(config.custom_directories.clone())
    }

    pub fn with_directories(directories: Vec<PathBuf>) -> Result<Self, PromptError> {
        let mut registry = Self {
            templates: BTreeMap::new(),
            directories,
        };
        registry.reload()?;
        Ok(registry)
    }

    pub fn reload(&mut self) -> Result<(), PromptError> {
        let mut templates = BTreeMap::new();
        let built_in: PromptFile = toml::from_str(BUILT_IN_PROMPTS).map_err(PromptError::BuiltIn)?;
        insert_entries(&mut templates, built_in, &PromptSource::BuiltIn)?;

        for dir in &self.directories {
            for path in prompt_files(dir)? {
                let file = read_prompt_file(&path)?;
                insert_entries(&mut templates, file, &PromptSource::File(path))?;
            }
        }

        self.templates = templates;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.templates.get(key)
    }

    pub fn format(&self, key: &str, arguments: &PromptArguments) -> Result<String, PromptError> {
        self.get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?
            .render(arguments)
    }

    pub fn format_with<I, K, V>(&self, key: &str, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let arguments: PromptArguments = arguments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.format(key, &arguments)
    }
}

fn insert_entries(
    templates: &mut BTreeMap<String, PromptTemplate>,
    file: PromptFile,
    source: &PromptSource,
) -> Result<(), PromptError> {
    for (key, entry) in file.prompts {
        let template = PromptTemplate::build(
            key.clone(),
            &entry.template,
            entry.required,
            source.clone(),
        )?;
        templates.insert(key, template);
    }
    Ok(())
}

fn prompt_files(dir: &Path) -> Result<Vec<PathBuf>, PromptError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| PromptError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "toml" | "yaml" | "yml"))
            .unwrap_or(false);
        if supported && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_prompt_file(path: &Path) -> Result<PromptFile, PromptError> {
    let contents = fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(&contents).map_err(|source| PromptError::Toml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(&contents).map_err(|source| PromptError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(pairs: &[(&str, &str)]) -> PromptArguments {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn built_in_prompts_cover_every_stage() {
        let registry = PromptRegistry::new().unwrap();
        for key in [
            "outline",
            "outline_continue",
            "chapter_draft",
            "chapter_enhance",
            "chapter_deep_drill",
            "chapter_combine",
            "chapter_synthesis",
        ] {
            assert!(registry.get(key).is_some(), "missing built-in prompt {key}");
        }
    }

    #[test]
    fn renders_placeholders_and_escaped_braces() {
        let template =
            PromptTemplate::compile("t", "Return {{\"title\": ...}} for {title} ({ count })").unwrap();
        let out = template
            .render(&args(&[("title", "Dust"), ("count", "3")]))
            .unwrap();
        assert_eq!(out, "Return {\"title\": ...} for Dust (3)");
    }

    #[test]
    fn missing_argument_is_reported() {
        let template = PromptTemplate::compile("t", "{premise} in {genre}").unwrap();
        let err = template
            .render(&args(&[("premise", "a heist")]))
            .unwrap_err();
        match err {
            PromptError::MissingArgument { argument, .. } => assert_eq!(argument, "genre"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unclosed_placeholder_is_rejected() {
        let err = PromptTemplate::compile("broken", "Write {chapter").unwrap_err();
        assert!(matches!(err, PromptError::Unclosed { offset: 6, .. }));
    }

    #[test]
    fn declared_required_subset_allows_optional_slots() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("custom.yaml"),
            "prompts:\n  chapter_enhance:\n    template: \"Polish {chapter_text}{guidance}\"\n    required: [chapter_text]\n",
        )
        .unwrap();
        let registry = PromptRegistry::with_directories(vec![dir.path().into()]).unwrap();
        let out = registry
            .format("chapter_enhance", &args(&[("chapter_text", "draft")]))
            .unwrap();
        assert_eq!(out, "Polish draft");
        assert!(matches!(
            registry.get("chapter_enhance").unwrap().source(),
            PromptSource::File(_)
        ));
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[prompts.outline]\ntemplate = \"first {premise}\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.toml"),
            "[prompts.outline]\ntemplate = \"second {premise}\"\n",
        )
        .unwrap();
        let mut registry = PromptRegistry::with_directories(vec![dir.path().into()]).unwrap();
        let out = registry
            .format_with("outline", [("premise", "storm")])
            .unwrap();
        assert_eq!(out, "second storm");

        fs::remove_file(dir.path().join("b.toml")).unwrap();
        registry.reload().unwrap();
        let out = registry
            .format_with("outline", [("premise", "storm")])
            .unwrap();
        assert_eq!(out, "first storm");
    }

    #[test]
    fn invalid_required_declaration_fails() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("bad.toml"),
            "[prompts.x]\ntemplate = \"{a}\"\nrequired = [\"b\"]\n",
        )
        .unwrap();
        let err = PromptRegistry::with_directories(vec![dir.path().into()]).unwrap_err();
        assert!(matches!(err, PromptError::InvalidRequired { .. }));
    }
}
