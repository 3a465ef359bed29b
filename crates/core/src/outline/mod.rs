use std::cmp::min;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{invoke_with_cleaning, LanguageModel, LanguageModelError};
use crate::prompts::{PromptError, PromptRegistry};
use crate::text::strip_code_fences;

pub const OUTLINE_FILE_NAME: &str = "outline.json";
pub const OUTLINE_MARKDOWN_FILE_NAME: &str = "outline.md";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutlineEntry {
    pub chapter: u32,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub plot_direction: String,
}

/// Shape models actually produce: numbers as strings, alternative field names,
/// keywords as one delimited string.
#[derive(Debug, Deserialize)]
struct LooseEntry {
    #[serde(default, alias = "chapter_number", alias = "number", alias = "chapter_no")]
    chapter: Option<Value>,
    #[serde(default, alias = "name", alias = "chapter_title")]
    title: Option<String>,
    #[serde(default, alias = "tags", alias = "keyword")]
    keywords: Option<Value>,
    #[serde(
        default,
        alias = "plot",
        alias = "direction",
        alias = "summary",
        alias = "plotDirection"
    )]
    plot_direction: Option<String>,
}

impl LooseEntry {
    fn chapter_number(&self) -> Option<u32> {
        match self.chapter.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => FIRST_NUMBER_RE.find(s)?.as_str().parse().ok(),
            _ => None,
        }
    }

    fn keyword_list(&self) -> Vec<String> {
        let raw: Vec<String> = match &self.keywords {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
            Some(Value::String(s)) => s
                .split([',', ';', '·', '，', '、'])
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum OutlineParseError {
    #[error("no JSON array found in model output")]
    NoArray,
    #[error("outline JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("outline array is empty")]
    Empty,
}

static FIRST_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("valid chapter number regex"));

static FENCED_JSON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\[.*?\])\s*```").expect("valid fenced json regex")
});

/// Best-effort extraction of the first JSON array from free-form model output.
pub fn extract_json_array(text: &str) -> Option<String> {
    if let Some(caps) = FENCED_JSON_RE.captures(text) {
        let candidate = caps[1].to_string();
        if serde_json::from_str::<Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }

    let cleaned = strip_code_fences(text);
    let mut search_from = 0;
    while let Some(offset) = cleaned[search_from..].find('[') {
        let start = search_from + offset;
        if let Some(end) = matching_bracket(&cleaned, start) {
            let candidate = &cleaned[start..=end];
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return Some(candidate.to_string());
            }
        }
        search_from = start + 1;
    }

    // Some models wrap the array: {"chapters": [...]}
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&cleaned[start..=end]).ok()?;
    value
        .as_object()?
        .values()
        .find(|v| v.is_array())
        .map(Value::to_string)
}

/// Byte index of the `]` closing the `[` at `start`, skipping brackets inside
/// string literals.
fn matching_bracket(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts, deserializes and numbers outline entries. Entries without a
/// usable number, or repeating one already seen, continue from the previous
/// entry. An entry that would need a number past `u32::MAX` is dropped.
pub fn parse_outline(text: &str) -> Result<Vec<OutlineEntry>, OutlineParseError> {
    let json = extract_json_array(text).ok_or(OutlineParseError::NoArray)?;
    let loose: Vec<LooseEntry> = serde_json::from_str(&json)?;

    let mut entries: Vec<OutlineEntry> = Vec::with_capacity(loose.len());
    let mut previous = 0u32;
    for item in loose {
        let chapter = match item.chapter_number() {
            Some(n) if n > 0 && !is_numbered(&entries, n) => n,
            _ => match next_free_number(&entries, previous) {
                Some(n) => n,
                None => continue,
            },
        };
        previous = chapter;
        entries.push(OutlineEntry {
            chapter,
            title: item
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Chapter {chapter}")),
            keywords: item.keyword_list(),
            plot_direction: item.plot_direction.unwrap_or_default().trim().to_string(),
        });
    }

    if entries.is_empty() {
        return Err(OutlineParseError::Empty);
    }
    entries.sort_by_key(|e| e.chapter);
    Ok(entries)
}

fn is_numbered(entries: &[OutlineEntry], chapter: u32) -> bool {
    entries.iter().any(|e| e.chapter == chapter)
}

fn next_free_number(entries: &[OutlineEntry], previous: u32) -> Option<u32> {
    let mut next = previous.checked_add(1)?;
    while is_numbered(entries, next) {
        next = next.checked_add(1)?;
    }
    Some(next)
}

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read outline `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("outline `{path}` is not a valid outline array: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write outline `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize outline: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to render {stage} prompt: {source}")]
    Prompt {
        stage: OutlineStage,
        #[source]
        source: PromptError,
    },
    #[error("language model invocation failed for {stage}: {source}")]
    Model {
        stage: OutlineStage,
        #[source]
        source: LanguageModelError,
    },
    #[error("{stage}: model never returned a parsable outline after {attempts} attempts: {source}")]
    Unparsable {
        stage: OutlineStage,
        attempts: usize,
        #[source]
        source: OutlineParseError,
    },
    #[error("{stage}: model left out chapter(s) {missing:?} after {attempts} attempts")]
    Incomplete {
        stage: OutlineStage,
        attempts: usize,
        missing: Vec<u32>,
    },
    #[error("number of chapters must be greater than zero")]
    NoChapters,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutlineStage {
    Initial { start: u32, end: u32 },
    Continue { start: u32, end: u32 },
}

impl OutlineStage {
    fn prompt_key(&self) -> &'static str {
        match self {
            Self::Initial { .. } => "outline",
            Self::Continue { .. } => "outline_continue",
        }
    }

    fn range(&self) -> (u32, u32) {
        match *self {
            Self::Initial { start, end } | Self::Continue { start, end } => (start, end),
        }
    }
}

impl fmt::Display for OutlineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start, end) = self.range();
        match self {
            Self::Initial { .. } => write!(f, "outline chapters {start}-{end}"),
            Self::Continue { .. } => write!(f, "outline continuation {start}-{end}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    entries: Vec<OutlineEntry>,
}

impl Outline {
    pub fn new(mut entries: Vec<OutlineEntry>) -> Self {
        entries.sort_by_key(|e| e.chapter);
        entries.dedup_by_key(|e| e.chapter);
        Self { entries }
    }

    pub fn entries(&self) -> &[OutlineEntry] {
        &self.entries
    }

    pub fn entry(&self, chapter: u32) -> Option<&OutlineEntry> {
        self.entries.iter().find(|e| e.chapter == chapter)
    }

    pub fn title(&self, chapter: u32) -> Option<&str> {
        self.entry(chapter).map(|e| e.title.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_chapter(&self) -> u32 {
        self.entries.iter().map(|e| e.chapter).max().unwrap_or(0)
    }

    /// First chapter in `from..=to` without an entry.
    pub fn first_missing(&self, from: u32, to: u32) -> Option<u32> {
        (from..=to).find(|chapter| self.entry(*chapter).is_none())
    }

    pub fn missing(&self, from: u32, to: u32) -> Vec<u32> {
        (from..=to)
            .filter(|chapter| self.entry(*chapter).is_none())
            .collect()
    }

    /// Adds entries, replacing any existing entry with the same number.
    pub fn merge(&mut self, entries: Vec<OutlineEntry>) {
        for entry in entries {
            match self.entries.iter_mut().find(|e| e.chapter == entry.chapter) {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
        self.entries.sort_by_key(|e| e.chapter);
    }

    pub fn to_json(&self) -> Result<String, OutlineError> {
        serde_json::to_string_pretty(&self.entries).map_err(OutlineError::Serialize)
    }

    pub fn to_markdown(&self, title: &str) -> String {
        let heading = match title.trim() {
            "" => "Outline",
            trimmed => trimmed,
        };
        let mut out = format!("# {heading}\n");
        for entry in &self.entries {
            out.push_str(&format!("\n## Chapter {}: {}\n\n", entry.chapter, entry.title));
            if !entry.keywords.is_empty() {
                out.push_str(&format!("*Keywords:* {}\n\n", entry.keywords.join(", ")));
            }
            if !entry.plot_direction.is_empty() {
                out.push_str(&entry.plot_direction);
                out.push('\n');
            }
        }
        out
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Option<Self>, OutlineError> {
        let path = dir.as_ref().join(OUTLINE_FILE_NAME);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(OutlineError::Read { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        let entries: Vec<OutlineEntry> =
            serde_json::from_str(&text).map_err(|source| OutlineError::Parse { path, source })?;
        Ok(Some(Self::new(entries)))
    }

    /// Writes `outline.json` and a readable `outline.md` next to it.
    pub fn save(&self, dir: impl AsRef<Path>, title: &str) -> Result<PathBuf, OutlineError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| OutlineError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let json_path = dir.join(OUTLINE_FILE_NAME);
        fs::write(&json_path, self.to_json()?).map_err(|source| OutlineError::Write {
            path: json_path.clone(),
            source,
        })?;

        let md_path = dir.join(OUTLINE_MARKDOWN_FILE_NAME);
        fs::write(&md_path, self.to_markdown(title)).map_err(|source| OutlineError::Write {
            path: md_path,
            source,
        })?;
        Ok(json_path)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutlineRequest {
    pub title: String,
    pub premise: String,
    pub genre: String,
    pub number_of_chapters: u32,
    pub user_guidance: String,
    pub chunk_size: u32,
}

impl OutlineRequest {
    pub fn new(
        title: impl Into<String>,
        premise: impl Into<String>,
        number_of_chapters: u32,
    ) -> Self {
        Self {
            title: title.into(),
            premise: premise.into(),
            genre: String::new(),
            number_of_chapters,
            user_guidance: String::new(),
            chunk_size: 20,
        }
    }
}

pub struct OutlineService<'a> {
    prompts: &'a PromptRegistry,
    sink: &'a dyn LogSink,
    max_retries: usize,
}

impl<'a> OutlineService<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self {
            prompts,
            sink,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Generates the outline chunk by chunk, resuming at the first chapter
    /// missing from `outline.json`. The file is rewritten whenever a response
    /// adds entries, so an interrupted run picks up where it stopped.
    pub fn generate<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        output_dir: impl AsRef<Path>,
        request: &OutlineRequest,
    ) -> Result<Outline, OutlineError> {
        let total = request.number_of_chapters;
        if total == 0 {
            return Err(OutlineError::NoChapters);
        }
        let output_dir = output_dir.as_ref();
        let mut outline = Outline::load(output_dir)?.unwrap_or_default();
        let chunk_size = request.chunk_size.max(1);

        let Some(first) = outline.first_missing(1, total) else {
            self.log(
                LogLevel::Info,
                format!("Outline already covers {total} chapters; nothing to generate."),
            );
            return Ok(outline);
        };
        if !outline.is_empty() {
            self.log(
                LogLevel::Info,
                format!("Resuming outline at chapter {first}."),
            );
        }

        let mut next = Some(first);
        while let Some(start) = next {
            let end = min(start.saturating_add(chunk_size - 1), total);
            self.generate_chunk(model, &mut outline, output_dir, request, start, end)?;
            next = if end < total {
                outline.first_missing(end + 1, total)
            } else {
                None
            };
        }

        Ok(outline)
    }

    /// Fills every missing chapter in `start..=end`. A response that leaves
    /// chapters out keeps what it did return, and the next attempt asks again
    /// from the first chapter still missing.
    fn generate_chunk<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        outline: &mut Outline,
        output_dir: &Path,
        request: &OutlineRequest,
        start: u32,
        end: u32,
    ) -> Result<(), OutlineError> {
        let mut from = start;
        let mut stage = OutlineStage::Initial { start, end };
        let mut last_error = OutlineParseError::Empty;
        let mut progressed = false;

        for attempt in 1..=self.max_retries {
            stage = if outline.is_empty() {
                OutlineStage::Initial { start: from, end }
            } else {
                OutlineStage::Continue { start: from, end }
            };
            self.log(LogLevel::Info, format!("Generating {stage}..."));
            let prompt = self.render(outline, request, stage)?;
            let response = invoke_with_cleaning(model, self.sink, &stage.to_string(), &prompt, 1)
                .map_err(|source| OutlineError::Model { stage, source })?;

            let entries = match parse_outline(&response) {
                Ok(entries) => entries,
                Err(err) => {
                    self.log(
                        LogLevel::Warn,
                        format!("{stage}: {err} (attempt {attempt}/{})", self.max_retries),
                    );
                    last_error = err;
                    continue;
                }
            };

            let fresh: Vec<OutlineEntry> = entries
                .into_iter()
                .filter(|e| e.chapter >= from && e.chapter <= end)
                .filter(|e| outline.entry(e.chapter).is_none())
                .collect();
            if fresh.is_empty() {
                self.log(
                    LogLevel::Warn,
                    format!(
                        "{stage}: no new entries in range (attempt {attempt}/{})",
                        self.max_retries
                    ),
                );
                last_error = OutlineParseError::Empty;
                continue;
            }

            let count = fresh.len();
            outline.merge(fresh);
            outline.save(output_dir, &request.title)?;
            progressed = true;
            self.log(LogLevel::Info, format!("{stage}: {count} entries saved."));

            match outline.first_missing(from, end) {
                None => return Ok(()),
                Some(gap) => {
                    self.log(
                        LogLevel::Warn,
                        format!(
                            "{stage}: model left out chapter(s) {:?} (attempt {attempt}/{})",
                            outline.missing(from, end),
                            self.max_retries
                        ),
                    );
                    from = gap;
                }
            }
        }

        if progressed {
            return Err(OutlineError::Incomplete {
                stage,
                attempts: self.max_retries,
                missing: outline.missing(start, end),
            });
        }
        Err(OutlineError::Unparsable {
            stage,
            attempts: self.max_retries,
            source: last_error,
        })
    }

    fn render(
        &self,
        outline: &Outline,
        request: &OutlineRequest,
        stage: OutlineStage,
    ) -> Result<String, OutlineError> {
        let (start, end) = stage.range();
        let mut args = vec![
            ("title", request.title.trim().to_string()),
            ("premise", request.premise.trim().to_string()),
            ("genre", non_empty_or(&request.genre, "unspecified")),
            ("number_of_chapters", request.number_of_chapters.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("user_guidance", non_empty_or(&request.user_guidance, "none")),
        ];
        if let OutlineStage::Continue { .. } = stage {
            args.push(("existing_outline", outline.to_json()?));
        }
        self.prompts
            .format_with(stage.prompt_key(), args)
            .map_err(|source| OutlineError::Prompt { stage, source })
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message));
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
