//! On-disk layout of a manuscript directory.
//!
//! ```text
//! <dir>/outline.json
//! <dir>/outline.md
//! <dir>/chapters/chapter_01.md            original draft
//! <dir>/chapters/chapter_01_enhanced.md   other variants share the stem
//! <dir>/references/<document>.json        ingested reference chunks
//! <dir>/all.md                            compiled manuscript
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::text::word_count;

pub const CHAPTERS_DIR_NAME: &str = "chapters";
pub const REFERENCES_DIR_NAME: &str = "references";
pub const COMPILED_FILE_NAME: &str = "all.md";
const CHAPTER_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ChapterVariant {
    Original,
    Enhanced,
    Combined,
    DeepDrilled,
    Final,
}

impl ChapterVariant {
    pub const ALL: [ChapterVariant; 5] = [
        ChapterVariant::Original,
        ChapterVariant::Enhanced,
        ChapterVariant::Combined,
        ChapterVariant::DeepDrilled,
        ChapterVariant::Final,
    ];

    /// Preference used by `compile` when the caller gives none.
    pub const COMPILE_ORDER: [ChapterVariant; 5] = [
        ChapterVariant::Final,
        ChapterVariant::Combined,
        ChapterVariant::Enhanced,
        ChapterVariant::DeepDrilled,
        ChapterVariant::Original,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Original => "",
            Self::Enhanced => "_enhanced",
            Self::Combined => "_combined",
            Self::DeepDrilled => "_deep",
            Self::Final => "_final",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Enhanced => "enhanced",
            Self::Combined => "combined",
            Self::DeepDrilled => "deep-drilled",
            Self::Final => "final",
        }
    }

    pub fn file_name(&self, chapter: u32) -> String {
        format!("chapter_{chapter:02}{}.md", self.suffix())
    }

    /// Parses a comma separated list such as `final,enhanced`.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ParseVariantError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for ChapterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("unknown chapter variant `{0}` (expected original, enhanced, combined, deep or final)")]
pub struct ParseVariantError(String);

impl FromStr for ChapterVariant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "draft" => Ok(Self::Original),
            "enhanced" => Ok(Self::Enhanced),
            "combined" => Ok(Self::Combined),
            "deep" | "deep-drilled" | "deep_drilled" | "deepdrilled" => Ok(Self::DeepDrilled),
            "final" => Ok(Self::Final),
            other => Err(ParseVariantError(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ManuscriptError {
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("chapter numbers start at 1")]
    ZeroChapter,
}

/// True for text with nothing but an optional markdown heading, which is what
/// `Manuscript::create` leaves behind.
pub fn is_stub(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .all(|line| line.starts_with('#'))
        && text.lines().filter(|line| !line.trim().is_empty()).count() <= 1
}

pub fn chapter_heading(chapter: u32, title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("# Chapter {chapter}: {title}"),
        None => format!("# Chapter {chapter}"),
    }
}

/// Prepends a heading unless the text already opens with one.
pub fn ensure_heading(text: &str, chapter: u32, title: Option<&str>) -> String {
    let body = text.trim();
    let starts_with_heading = body
        .lines()
        .next()
        .map(|line| line.trim_start().starts_with('#'))
        .unwrap_or(false);
    if starts_with_heading {
        body.to_string()
    } else {
        format!("{}\n\n{}", chapter_heading(chapter, title), body)
    }
}

#[derive(Clone, Debug)]
pub struct ChapterStatus {
    pub chapter: u32,
    pub variants: Vec<(ChapterVariant, usize)>,
}

#[derive(Clone, Debug)]
pub struct CompileReport {
    pub path: PathBuf,
    pub chapters: Vec<(u32, ChapterVariant)>,
    pub missing: Vec<u32>,
    pub words: usize,
}

#[derive(Clone, Debug)]
pub struct Manuscript {
    root: PathBuf,
}

impl Manuscript {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the folder structure and a stub original file for every
    /// chapter that has none. Existing files are never touched. Returns the
    /// number of stubs written.
    pub fn create(
        root: impl Into<PathBuf>,
        chapter_count: u32,
    ) -> Result<(Self, usize), ManuscriptError> {
        let manuscript = Self::new(root);
        for dir in [
            manuscript.root.clone(),
            manuscript.chapters_dir(),
            manuscript.references_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|source| ManuscriptError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        let mut written = 0;
        for chapter in 1..=chapter_count {
            let path = manuscript.chapter_path(chapter, ChapterVariant::Original);
            if path.exists() {
                continue;
            }
            write_file(&path, &format!("{}\n", chapter_heading(chapter, None)))?;
            written += 1;
        }
        Ok((manuscript, written))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.root.join(CHAPTERS_DIR_NAME)
    }

    pub fn references_dir(&self) -> PathBuf {
        self.root.join(REFERENCES_DIR_NAME)
    }

    pub fn compiled_path(&self) -> PathBuf {
        self.root.join(COMPILED_FILE_NAME)
    }

    pub fn chapter_path(&self, chapter: u32, variant: ChapterVariant) -> PathBuf {
        self.chapters_dir().join(variant.file_name(chapter))
    }

    pub fn read_variant(
        &self,
        chapter: u32,
        variant: ChapterVariant,
    ) -> Result<Option<String>, ManuscriptError> {
        let path = self.chapter_path(chapter, variant);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ManuscriptError::Read { path, source }),
        }
    }

    /// Like `read_variant`, but treats stub files as absent.
    pub fn read_content(
        &self,
        chapter: u32,
        variant: ChapterVariant,
    ) -> Result<Option<String>, ManuscriptError> {
        Ok(self
            .read_variant(chapter, variant)?
            .filter(|text| !is_stub(text)))
    }

    pub fn write_variant(
        &self,
        chapter: u32,
        variant: ChapterVariant,
        text: &str,
    ) -> Result<PathBuf, ManuscriptError> {
        if chapter == 0 {
            return Err(ManuscriptError::ZeroChapter);
        }
        let dir = self.chapters_dir();
        fs::create_dir_all(&dir).map_err(|source| ManuscriptError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let path = self.chapter_path(chapter, variant);
        let mut body = text.trim().to_string();
        body.push('\n');
        write_file(&path, &body)?;
        Ok(path)
    }

    pub fn available_variants(&self, chapter: u32) -> Vec<ChapterVariant> {
        ChapterVariant::ALL
            .into_iter()
            .filter(|variant| self.chapter_path(chapter, *variant).is_file())
            .collect()
    }

    /// Highest chapter number with at least one file under `chapters/`.
    pub fn max_chapter_on_disk(&self) -> Result<u32, ManuscriptError> {
        let dir = self.chapters_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(ManuscriptError::Read { path: dir, source }),
        };

        let mut max = 0;
        for entry in entries {
            let entry = entry.map_err(|source| ManuscriptError::Read {
                path: dir.clone(),
                source,
            })?;
            if let Some(number) = entry
                .file_name()
                .to_str()
                .and_then(parse_chapter_number)
            {
                max = max.max(number);
            }
        }
        Ok(max)
    }

    pub fn status(&self, chapter_count: u32) -> Result<Vec<ChapterStatus>, ManuscriptError> {
        let upto = chapter_count.max(self.max_chapter_on_disk()?);
        let mut report = Vec::new();
        for chapter in 1..=upto {
            let mut variants = Vec::new();
            for variant in ChapterVariant::ALL {
                if let Some(text) = self.read_variant(chapter, variant)? {
                    let words = if is_stub(&text) { 0 } else { word_count(&text) };
                    variants.push((variant, words));
                }
            }
            report.push(ChapterStatus { chapter, variants });
        }
        Ok(report)
    }

    /// Concatenates the preferred variant of every chapter into `all.md`.
    /// `titles` supplies headings for chapters whose text lacks one.
    pub fn compile(
        &self,
        chapter_count: u32,
        order: &[ChapterVariant],
        titles: &dyn Fn(u32) -> Option<String>,
    ) -> Result<CompileReport, ManuscriptError> {
        let order: &[ChapterVariant] = if order.is_empty() {
            &ChapterVariant::COMPILE_ORDER
        } else {
            order
        };
        let upto = chapter_count.max(self.max_chapter_on_disk()?);

        let mut parts = Vec::new();
        let mut chapters = Vec::new();
        let mut missing = Vec::new();
        for chapter in 1..=upto {
            let mut picked = None;
            for variant in order {
                if let Some(text) = self.read_content(chapter, *variant)? {
                    picked = Some((*variant, text));
                    break;
                }
            }
            match picked {
                Some((variant, text)) => {
                    let title = titles(chapter);
                    parts.push(ensure_heading(&text, chapter, title.as_deref()));
                    chapters.push((chapter, variant));
                }
                None => missing.push(chapter),
            }
        }

        let mut compiled = parts.join(CHAPTER_SEPARATOR);
        compiled.push('\n');
        let path = self.compiled_path();
        write_file(&path, &compiled)?;

        Ok(CompileReport {
            path,
            chapters,
            missing,
            words: word_count(&compiled),
        })
    }
}

/// `chapter_07_final.md` -> 7
fn parse_chapter_number(file_name: &str) -> Option<u32> {
    let stem = file_name.strip_suffix(".md")?;
    let rest = stem.strip_prefix("chapter_")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ManuscriptError> {
    fs::write(path, contents).map_err(|source| ManuscriptError::Write {
        path: path.to_path_buf(),
        source,
    })
}
