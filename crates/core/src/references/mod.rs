//! Reference document ingestion.
//!
//! Source documents (notes, world bibles, research) are converted to plain
//! text, cut into overlapping chunks and stored as JSON under the manuscript's
//! `references/` folder. Chapter drafting later pulls the chunks whose text
//! mentions the chapter's keywords.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::logging::{LogLevel, LogRecord, LogSink, NullLogSink};
use crate::text::{tail_chars, word_count};

pub const DEFAULT_CHUNK_CHARS: usize = 1200;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Html,
    Json,
    Csv,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Converts raw file contents into plain prose.
    pub fn extract(&self, raw: &str) -> Result<String, serde_json::Error> {
        let text = match self {
            Self::Text => raw.to_string(),
            Self::Markdown => extract_markdown(raw),
            Self::Html => extract_html(raw),
            Self::Json => extract_json(raw)?,
            Self::Csv => extract_csv(raw),
        };
        Ok(tidy_lines(&text))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static MD_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("valid markdown image regex"));
static MD_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("valid markdown link regex"));
static HTML_HIDDEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid html script regex")
});
static HTML_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/h[1-6]|/li|/tr|/blockquote|/section|/article)\b[^>]*>")
        .expect("valid html block regex")
});
static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid html tag regex"));
static HTML_NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid entity regex"));

fn extract_markdown(raw: &str) -> String {
    let body = strip_front_matter(raw);
    let body = MD_IMAGE_RE.replace_all(body, "$1");
    MD_LINK_RE.replace_all(&body, "$1").into_owned()
}

fn strip_front_matter(raw: &str) -> &str {
    let trimmed = raw.trim_start_matches('\u{feff}');
    let Some(rest) = trimmed
        .strip_prefix("---\n")
        .or_else(|| trimmed.strip_prefix("---\r\n"))
    else {
        return trimmed;
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" {
            return &rest[offset..];
        }
    }
    trimmed
}

fn extract_html(raw: &str) -> String {
    let visible = HTML_HIDDEN_RE.replace_all(raw, "");
    let broken = HTML_BREAK_RE.replace_all(&visible, "\n");
    let stripped = HTML_TAG_RE.replace_all(&broken, "");
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    let numeric = HTML_NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&mdash;", "\u{2014}")
        .replace("&hellip;", "\u{2026}")
        .replace("&amp;", "&")
}

fn extract_json(raw: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    let mut strings = Vec::new();
    collect_strings(&value, &mut strings);
    Ok(strings.join("\n\n"))
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn extract_csv(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            split_csv_line(line)
                .into_iter()
                .map(|field| field.trim().to_string())
                .filter(|field| !field.is_empty())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|row| !row.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

/// Trims every line, collapses runs of blank lines to one.
fn tidy_lines(text: &str) -> String {
    let mut out = String::new();
    let mut blank_run = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = false;
    }
    out
}

fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '。' | '！' | '？')
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if is_sentence_end(ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Breaks text into pieces no longer than `budget` chars: whole paragraphs
/// when they fit, otherwise sentence runs, otherwise raw char slices.
fn pieces(text: &str, budget: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if paragraph.chars().count() <= budget {
            out.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        for sentence in split_sentences(paragraph) {
            let len = sentence.chars().count();
            if len > budget {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.extend(hard_split(&sentence, budget));
                continue;
            }
            let current_len = current.chars().count();
            if !current.is_empty() && current_len + 1 + len > budget {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

/// Packs text into chunks of at most `max_chars` characters.
///
/// Paragraphs are kept whole when they fit; longer paragraphs are split at
/// sentence ends and, failing that, at character boundaries. Every chunk
/// after the first begins with the last `overlap` characters of its
/// predecessor followed by a space. The overlap is capped below half the
/// chunk size.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars.saturating_sub(1) / 2);
    let budget = if overlap == 0 {
        max_chars
    } else {
        max_chars - overlap - 1
    };

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for piece in pieces(text, budget) {
        if current.is_empty() {
            current = open_chunk(chunks.last(), overlap, &piece);
            continue;
        }
        if current.chars().count() + 2 + piece.chars().count() <= max_chars {
            current.push_str("\n\n");
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = open_chunk(chunks.last(), overlap, &piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn open_chunk(previous: Option<&String>, overlap: usize, piece: &str) -> String {
    match previous {
        Some(previous) if overlap > 0 => format!("{} {}", tail_chars(previous, overlap), piece),
        _ => piece.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported reference format for `{path}` (expected txt, md, html, json or csv)")]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("`{path}` is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("`{path}` contains no readable text")]
    Empty { path: PathBuf },
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize reference chunks: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub index: usize,
    pub text: String,
    pub words: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IngestedDocument {
    pub source: String,
    pub format: DocumentFormat,
    pub chunks: Vec<DocumentChunk>,
}

impl IngestedDocument {
    pub fn word_count(&self) -> usize {
        self.chunks.iter().map(|c| c.words).sum()
    }

    /// Writes the document to `<dir>/<source stem>.json`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, IngestError> {
        fs::create_dir_all(dir).map_err(|source| IngestError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let stem = Path::new(&self.source)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("reference");
        let path = dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(self).map_err(IngestError::Serialize)?;
        fs::write(&path, json).map_err(|source| IngestError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

pub struct DocumentIngestor<'a> {
    sink: &'a dyn LogSink,
    chunk_chars: usize,
    chunk_overlap: usize,
}

impl Default for DocumentIngestor<'static> {
    fn default() -> Self {
        static NULL: NullLogSink = NullLogSink;
        DocumentIngestor::new(&NULL)
    }
}

impl<'a> DocumentIngestor<'a> {
    pub fn new(sink: &'a dyn LogSink) -> Self {
        Self {
            sink,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_chars: usize, chunk_overlap: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn ingest(&self, path: &Path) -> Result<IngestedDocument, IngestError> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let raw = fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = format
            .extract(&raw)
            .map_err(|source| IngestError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        if text.trim().is_empty() {
            return Err(IngestError::Empty {
                path: path.to_path_buf(),
            });
        }

        let chunks: Vec<DocumentChunk> = chunk_text(&text, self.chunk_chars, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| DocumentChunk {
                index,
                words: word_count(&text),
                text,
            })
            .collect();

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.sink.log(LogRecord::info(format!(
            "Ingested {source} ({format}): {} chunks",
            chunks.len()
        )));

        Ok(IngestedDocument {
            source,
            format,
            chunks,
        })
    }

    /// Ingests `path` and stores the result in `references_dir`.
    pub fn ingest_into(
        &self,
        path: &Path,
        references_dir: &Path,
    ) -> Result<(IngestedDocument, PathBuf), IngestError> {
        let document = self.ingest(path)?;
        let saved = document.save(references_dir)?;
        self.sink.log(LogRecord::new(
            LogLevel::Debug,
            format!("Reference chunks written to {}", saved.display()),
        ));
        Ok((document, saved))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceExcerpt {
    pub source: String,
    pub index: usize,
    pub text: String,
    pub score: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ReferenceLibrary {
    documents: Vec<IngestedDocument>,
    skipped: Vec<PathBuf>,
}

impl ReferenceLibrary {
    pub fn new(documents: Vec<IngestedDocument>) -> Self {
        Self {
            documents,
            skipped: Vec::new(),
        }
    }

    /// Loads every ingested document in `dir`. A missing directory is an
    /// empty library; JSON files that are not ingested documents are skipped.
    pub fn load(dir: &Path) -> Result<Self, IngestError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(IngestError::Read {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        paths.sort();

        let mut library = Self::default();
        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|source| IngestError::Read {
                path: path.clone(),
                source,
            })?;
            match serde_json::from_str::<IngestedDocument>(&raw) {
                Ok(document) => library.documents.push(document),
                Err(_) => library.skipped.push(path),
            }
        }
        Ok(library)
    }

    pub fn documents(&self) -> &[IngestedDocument] {
        &self.documents
    }

    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|d| d.chunks.is_empty())
    }

    /// Top `k` chunks ranked by case-insensitive keyword hits. Chunks without
    /// a hit are never returned.
    pub fn select<S: AsRef<str>>(&self, keywords: &[S], k: usize) -> Vec<ReferenceExcerpt> {
        let needles: Vec<String> = keywords
            .iter()
            .map(|kw| kw.as_ref().trim().to_lowercase())
            .filter(|kw| !kw.is_empty())
            .collect();
        if needles.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<ReferenceExcerpt> = self
            .documents
            .iter()
            .flat_map(|doc| doc.chunks.iter().map(move |chunk| (doc, chunk)))
            .filter_map(|(doc, chunk)| {
                let haystack = chunk.text.to_lowercase();
                let score: usize = needles
                    .iter()
                    .map(|needle| haystack.matches(needle.as_str()).count())
                    .sum();
                (score > 0).then(|| ReferenceExcerpt {
                    source: doc.source.clone(),
                    index: chunk.index,
                    text: chunk.text.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.index.cmp(&b.index))
        });
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::VecLogSink;
    use tempfile::tempdir;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/NOTES.MD")),
            Some(DocumentFormat::Markdown)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("x.htm")), Some(DocumentFormat::Html));
        assert_eq!(DocumentFormat::from_path(Path::new("x.pdf")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn markdown_drops_front_matter_and_link_syntax() {
        let raw = "---\ntitle: Atlas\n---\n# Harbor\nSee [the map](map.png) and ![a gull](gull.png).";
        let text = DocumentFormat::Markdown.extract(raw).unwrap();
        assert_eq!(text, "# Harbor\nSee the map and a gull.");
    }

    #[test]
    fn html_strips_scripts_tags_and_entities() {
        let raw = "<html><head><style>p{}</style><script>var x = '<p>';</script></head>\
                   <body><h1>Salt &amp; Iron</h1><p>The&nbsp;tide &lt;rose&gt;.</p><p>&#8220;Go.&#x201D;</p></body></html>";
        let text = DocumentFormat::Html.extract(raw).unwrap();
        assert_eq!(text, "Salt & Iron\nThe tide <rose>.\n\u{201C}Go.\u{201D}");
    }

    #[test]
    fn json_collects_nested_strings() {
        let raw = r#"{"a": "First", "b": [1, {"c": "Second"}, "  "], "d": null}"#;
        let text = DocumentFormat::Json.extract(raw).unwrap();
        assert_eq!(text, "First\n\nSecond");
        assert!(DocumentFormat::Json.extract("{oops").is_err());
    }

    #[test]
    fn csv_rows_join_fields() {
        let raw = "name,role\nMara,\"courier, reluctant\"\n\"Ede \"\"Old\"\"\",keeper\n";
        let text = DocumentFormat::Csv.extract(raw).unwrap();
        assert_eq!(
            text,
            "name | role\nMara | courier, reluctant\nEde \"Old\" | keeper"
        );
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("One.\n\nTwo.", 100, 10), vec!["One.\n\nTwo."]);
        assert!(chunk_text("   ", 100, 10).is_empty());
    }

    #[test]
    fn chunks_respect_limit_and_overlap() {
        let paragraph = "The harbor slept. Gulls argued over the nets. A bell rang twice. ";
        let text = paragraph.repeat(12);
        let chunks = chunk_text(&text, 120, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "chunk too long: {chunk:?}");
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].starts_with(tail_chars(&pair[0], 20)));
        }
    }

    #[test]
    fn unbroken_text_is_hard_split() {
        let text = "雨".repeat(50);
        let chunks = chunk_text(&text, 20, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn ingests_and_saves_document() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("world.md");
        let text = "# World\n\nThe [Salt Road](x) runs east.\n\nLighthouses mark it.";
        fs::write(&source, text).unwrap();

        let sink = VecLogSink::new();
        let (document, saved) = DocumentIngestor::new(&sink)
            .ingest_into(&source, &temp.path().join("references"))
            .unwrap();

        assert_eq!(document.source, "world.md");
        assert_eq!(document.format, DocumentFormat::Markdown);
        assert_eq!(document.chunks.len(), 1);
        assert!(document.chunks[0].text.contains("The Salt Road runs east."));
        assert_eq!(saved, temp.path().join("references").join("world.json"));
        assert!(sink.contains(LogLevel::Info, "world.md"));

        let library = ReferenceLibrary::load(&temp.path().join("references")).unwrap();
        assert_eq!(library.documents(), &[document]);
    }

    #[test]
    fn rejects_unsupported_and_empty_files() {
        let temp = tempdir().unwrap();
        let pdf = temp.path().join("scan.pdf");
        fs::write(&pdf, "%PDF").unwrap();
        assert!(matches!(
            DocumentIngestor::default().ingest(&pdf),
            Err(IngestError::UnsupportedFormat { .. })
        ));

        let blank = temp.path().join("blank.html");
        fs::write(&blank, "<p>  </p>").unwrap();
        assert!(matches!(
            DocumentIngestor::default().ingest(&blank),
            Err(IngestError::Empty { .. })
        ));
    }

    fn chunk(index: usize, text: &str) -> DocumentChunk {
        DocumentChunk {
            index,
            text: text.into(),
            words: word_count(text),
        }
    }

    #[test]
    fn selects_chunks_by_keyword_hits() {
        let doc = IngestedDocument {
            source: "notes.txt".into(),
            format: DocumentFormat::Text,
            chunks: vec![
                chunk(0, "The lighthouse keeper."),
                chunk(1, "Lighthouse, lighthouse, storm."),
                chunk(2, "Nothing relevant."),
            ],
        };
        let library = ReferenceLibrary::new(vec![doc]);

        let picked = library.select(&["LIGHTHOUSE", "storm"], 5);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].index, 1);
        assert_eq!(picked[0].score, 3);
        assert_eq!(picked[1].index, 0);

        assert_eq!(library.select(&["storm"], 0), vec![]);
        assert!(library.select::<&str>(&[], 3).is_empty());
    }

    #[test]
    fn missing_reference_dir_is_empty_library() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("junk.json"), "{\"not\": \"a document\"}").unwrap();
        let library = ReferenceLibrary::load(temp.path()).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.skipped().len(), 1);
        assert!(ReferenceLibrary::load(&temp.path().join("absent")).unwrap().is_empty());
    }
}
