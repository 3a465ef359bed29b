use std::fmt;
use std::path::PathBuf;

use crate::config::NovelConfig;
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::manuscript::{ensure_heading, is_stub, ChapterVariant, Manuscript, ManuscriptError};
use crate::model::{invoke_with_cleaning, LanguageModel, LanguageModelError};
use crate::outline::{Outline, OutlineEntry};
use crate::prompts::{PromptError, PromptRegistry};
use crate::references::{ReferenceExcerpt, ReferenceLibrary};
use crate::text::{tail_chars, word_count};

const NO_PREVIOUS_CHAPTER: &str = "(this is the opening chapter)";
const PREVIOUS_NOT_WRITTEN: &str = "(the previous chapter has not been written yet)";
const NO_NEXT_CHAPTER: &str = "(none: this is the final chapter)";
const NO_REFERENCES: &str = "(none)";
const NO_GUIDANCE: &str = "none";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChapterStage {
    Draft,
    Enhance,
    DeepDrill,
    Combine,
}

impl ChapterStage {
    fn label(&self) -> &'static str {
        match self {
            Self::Draft => "chapter draft",
            Self::Enhance => "chapter enhancement",
            Self::DeepDrill => "chapter deep drill",
            Self::Combine => "chapter combination",
        }
    }

    fn prompt_key(&self) -> &'static str {
        match self {
            Self::Draft => "chapter_draft",
            Self::Enhance => "chapter_enhance",
            Self::DeepDrill => "chapter_deep_drill",
            Self::Combine => "chapter_combine",
        }
    }
}

impl fmt::Display for ChapterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    #[error("the outline has no entry for chapter {chapter}")]
    MissingOutlineEntry { chapter: u32 },
    #[error("chapter {chapter} has no {variant} version on disk")]
    MissingVariant {
        chapter: u32,
        variant: ChapterVariant,
    },
    #[error("the {variant} version of chapter {chapter} is still an empty stub")]
    EmptyChapter {
        chapter: u32,
        variant: ChapterVariant,
    },
    #[error("invalid chapter range {from}..={to}")]
    InvalidRange { from: u32, to: u32 },
    #[error("model returned no text for {stage} of chapter {chapter}")]
    EmptyResponse { stage: ChapterStage, chapter: u32 },
    #[error(transparent)]
    Manuscript(#[from] ManuscriptError),
    #[error("failed to render {stage} prompt: {source}")]
    Prompt {
        stage: ChapterStage,
        #[source]
        source: PromptError,
    },
    #[error("language model invocation failed for {stage}: {source}")]
    Model {
        stage: ChapterStage,
        #[source]
        source: LanguageModelError,
    },
}

/// Book-level facts every chapter prompt repeats.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NovelBrief {
    pub title: String,
    pub genre: String,
    pub premise: String,
    pub word_number: u32,
}

impl From<&NovelConfig> for NovelBrief {
    fn from(novel: &NovelConfig) -> Self {
        Self {
            title: novel.title.clone(),
            genre: novel.genre.clone(),
            premise: novel.premise.clone(),
            word_number: novel.word_number,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FillRequest {
    pub brief: NovelBrief,
    pub from: Option<u32>,
    pub to: Option<u32>,
    pub force: bool,
    pub user_guidance: String,
    pub previous_excerpt_chars: usize,
    pub reference_k: usize,
}

impl FillRequest {
    pub fn new(brief: NovelBrief) -> Self {
        Self {
            brief,
            from: None,
            to: None,
            force: false,
            user_guidance: String::new(),
            previous_excerpt_chars: 1500,
            reference_k: 3,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FillReport {
    pub written: Vec<u32>,
    pub skipped: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct EnhanceRequest {
    pub chapter: u32,
    pub source: ChapterVariant,
    pub user_guidance: String,
    pub word_number: u32,
}

impl EnhanceRequest {
    pub fn new(chapter: u32, word_number: u32) -> Self {
        Self {
            chapter,
            source: ChapterVariant::Original,
            user_guidance: String::new(),
            word_number,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeepDrillRequest {
    pub chapter: u32,
    /// Scene or thread to expand; the outline's plot direction when unset.
    pub focus: Option<String>,
    pub word_number: u32,
}

/// A chapter variant written by one of the revision passes.
#[derive(Clone, Debug, PartialEq)]
pub struct ChapterOutput {
    pub chapter: u32,
    pub variant: ChapterVariant,
    pub path: PathBuf,
    pub words: usize,
}

pub struct ChapterService<'a> {
    prompts: &'a PromptRegistry,
    sink: &'a dyn LogSink,
    references: Option<&'a ReferenceLibrary>,
    max_retries: usize,
}

impl<'a> ChapterService<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self {
            prompts,
            sink,
            references: None,
            max_retries: 3,
        }
    }

    pub fn with_references(mut self, references: &'a ReferenceLibrary) -> Self {
        self.references = Some(references);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Drafts the original version of every chapter in the requested range.
    /// Chapters that already hold more than a stub are left alone unless
    /// `force` is set. Every outline entry in the range must exist before any
    /// model call is made.
    pub fn fill<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        outline: &Outline,
        request: &FillRequest,
    ) -> Result<FillReport, ChapterError> {
        let from = request.from.unwrap_or(1).max(1);
        let to = request.to.unwrap_or_else(|| outline.max_chapter());
        if outline.is_empty() {
            return Err(ChapterError::MissingOutlineEntry { chapter: from });
        }
        if to < from {
            return Err(ChapterError::InvalidRange { from, to });
        }
        let entries = (from..=to)
            .map(|chapter| {
                outline
                    .entry(chapter)
                    .ok_or(ChapterError::MissingOutlineEntry { chapter })
            })
            .collect::<Result<Vec<&OutlineEntry>, _>>()?;

        let mut report = FillReport::default();
        for entry in entries {
            let chapter = entry.chapter;
            if !request.force
                && manuscript
                    .read_content(chapter, ChapterVariant::Original)?
                    .is_some()
            {
                self.log(
                    LogLevel::Info,
                    format!("Chapter {chapter} already drafted; skipping."),
                );
                report.skipped.push(chapter);
                continue;
            }

            self.log(
                LogLevel::Info,
                format!("Drafting chapter {chapter}: {}", entry.title),
            );
            let prompt = self.draft_prompt(manuscript, outline, entry, request)?;
            let text = self.invoke(model, ChapterStage::Draft, chapter, &prompt)?;
            let text = ensure_heading(&text, chapter, Some(&entry.title));
            let path = manuscript.write_variant(chapter, ChapterVariant::Original, &text)?;
            self.log(
                LogLevel::Info,
                format!(
                    "Chapter {chapter} written ({} words) to {}",
                    word_count(&text),
                    path.display()
                ),
            );
            report.written.push(chapter);
        }
        Ok(report)
    }

    fn draft_prompt(
        &self,
        manuscript: &Manuscript,
        outline: &Outline,
        entry: &OutlineEntry,
        request: &FillRequest,
    ) -> Result<String, ChapterError> {
        let chapter = entry.chapter;
        let previous_excerpt = if chapter == 1 {
            NO_PREVIOUS_CHAPTER.to_string()
        } else {
            match best_text(manuscript, chapter - 1)? {
                Some(text) => tail_chars(text.trim(), request.previous_excerpt_chars).to_string(),
                None => PREVIOUS_NOT_WRITTEN.to_string(),
            }
        };
        let next_chapter = match outline.entry(chapter + 1) {
            Some(next) if next.plot_direction.is_empty() => {
                format!("Chapter {}: {}", next.chapter, next.title)
            }
            Some(next) => format!(
                "Chapter {}: {} ({})",
                next.chapter, next.title, next.plot_direction
            ),
            None => NO_NEXT_CHAPTER.to_string(),
        };
        let references = self
            .references
            .map(|library| library.select(&entry.keywords, request.reference_k))
            .unwrap_or_default();

        let brief = &request.brief;
        self.render(
            ChapterStage::Draft,
            [
                ("chapter_number", chapter.to_string()),
                ("title", brief.title.clone()),
                ("genre", or_default(&brief.genre, "fiction")),
                ("premise", brief.premise.clone()),
                ("chapter_title", entry.title.clone()),
                ("keywords", entry.keywords.join(", ")),
                ("plot_direction", entry.plot_direction.clone()),
                ("previous_excerpt", previous_excerpt),
                ("next_chapter", next_chapter),
                ("references", format_references(&references)),
                ("word_number", brief.word_number.to_string()),
                ("user_guidance", or_default(&request.user_guidance, NO_GUIDANCE)),
            ],
        )
    }

    /// Rewrites a chapter variant (the original by default) into the
    /// enhanced version.
    pub fn enhance<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        outline: &Outline,
        request: &EnhanceRequest,
    ) -> Result<ChapterOutput, ChapterError> {
        let chapter = request.chapter;
        let source_text = require_variant(manuscript, chapter, request.source)?;
        let (title, plot_direction) = outline_context(outline, chapter);

        self.log(
            LogLevel::Info,
            format!("Enhancing chapter {chapter} from the {} version", request.source),
        );
        let prompt = self.render(
            ChapterStage::Enhance,
            [
                ("chapter_number", chapter.to_string()),
                ("chapter_title", title),
                ("plot_direction", plot_direction),
                ("word_number", request.word_number.to_string()),
                ("user_guidance", or_default(&request.user_guidance, NO_GUIDANCE)),
                ("chapter_text", source_text),
            ],
        )?;
        self.produce(
            model,
            manuscript,
            ChapterStage::Enhance,
            chapter,
            outline.title(chapter),
            ChapterVariant::Enhanced,
            &prompt,
        )
    }

    /// Expands one scene of the chapter in depth. Works from the enhanced
    /// version when there is one, otherwise from the original.
    pub fn deep_drill<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        outline: &Outline,
        request: &DeepDrillRequest,
    ) -> Result<ChapterOutput, ChapterError> {
        let chapter = request.chapter;
        let source_text = match manuscript.read_content(chapter, ChapterVariant::Enhanced)? {
            Some(text) => text,
            None => require_variant(manuscript, chapter, ChapterVariant::Original)?,
        };
        let (title, plot_direction) = outline_context(outline, chapter);
        let focus = request
            .focus
            .as_deref()
            .map(str::trim)
            .filter(|focus| !focus.is_empty())
            .map(str::to_string)
            .unwrap_or(plot_direction);

        self.log(
            LogLevel::Info,
            format!("Deep drilling chapter {chapter}: {focus}"),
        );
        let prompt = self.render(
            ChapterStage::DeepDrill,
            [
                ("chapter_number", chapter.to_string()),
                ("chapter_title", title),
                ("focus", focus),
                ("word_number", request.word_number.to_string()),
                ("chapter_text", source_text),
            ],
        )?;
        self.produce(
            model,
            manuscript,
            ChapterStage::DeepDrill,
            chapter,
            outline.title(chapter),
            ChapterVariant::DeepDrilled,
            &prompt,
        )
    }

    /// Merges the original and enhanced versions into the combined version.
    pub fn combine<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        outline: &Outline,
        chapter: u32,
        word_number: u32,
    ) -> Result<ChapterOutput, ChapterError> {
        let first_text = require_variant(manuscript, chapter, ChapterVariant::Original)?;
        let second_text = require_variant(manuscript, chapter, ChapterVariant::Enhanced)?;
        let (title, _) = outline_context(outline, chapter);

        self.log(LogLevel::Info, format!("Combining chapter {chapter}"));
        let prompt = self.render(
            ChapterStage::Combine,
            [
                ("chapter_number", chapter.to_string()),
                ("chapter_title", title),
                ("word_number", word_number.to_string()),
                ("first_text", first_text),
                ("second_text", second_text),
            ],
        )?;
        self.produce(
            model,
            manuscript,
            ChapterStage::Combine,
            chapter,
            outline.title(chapter),
            ChapterVariant::Combined,
            &prompt,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn produce<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        stage: ChapterStage,
        chapter: u32,
        title: Option<&str>,
        variant: ChapterVariant,
        prompt: &str,
    ) -> Result<ChapterOutput, ChapterError> {
        let text = self.invoke(model, stage, chapter, prompt)?;
        let text = ensure_heading(&text, chapter, title);
        let path = manuscript.write_variant(chapter, variant, &text)?;
        let words = word_count(&text);
        self.log(
            LogLevel::Info,
            format!("{stage} of chapter {chapter} saved ({words} words) to {}", path.display()),
        );
        Ok(ChapterOutput {
            chapter,
            variant,
            path,
            words,
        })
    }

    fn render<const N: usize>(
        &self,
        stage: ChapterStage,
        arguments: [(&str, String); N],
    ) -> Result<String, ChapterError> {
        self.prompts
            .format_with(stage.prompt_key(), arguments)
            .map_err(|source| ChapterError::Prompt { stage, source })
    }

    fn invoke<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        stage: ChapterStage,
        chapter: u32,
        prompt: &str,
    ) -> Result<String, ChapterError> {
        let label = format!("{stage} {chapter}");
        let text = invoke_with_cleaning(model, self.sink, &label, prompt, self.max_retries)
            .map_err(|source| ChapterError::Model { stage, source })?;
        if text.trim().is_empty() {
            return Err(ChapterError::EmptyResponse { stage, chapter });
        }
        Ok(text)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message));
    }
}

/// Most finished non-stub text of a chapter, in compile order.
fn best_text(manuscript: &Manuscript, chapter: u32) -> Result<Option<String>, ManuscriptError> {
    for variant in ChapterVariant::COMPILE_ORDER {
        if let Some(text) = manuscript.read_content(chapter, variant)? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

fn require_variant(
    manuscript: &Manuscript,
    chapter: u32,
    variant: ChapterVariant,
) -> Result<String, ChapterError> {
    match manuscript.read_variant(chapter, variant)? {
        None => Err(ChapterError::MissingVariant { chapter, variant }),
        Some(text) if is_stub(&text) => Err(ChapterError::EmptyChapter { chapter, variant }),
        Some(text) => Ok(text),
    }
}

/// Title and plot direction for a chapter, with neutral stand-ins when the
/// outline does not cover it.
fn outline_context(outline: &Outline, chapter: u32) -> (String, String) {
    match outline.entry(chapter) {
        Some(entry) => (
            entry.title.clone(),
            or_default(&entry.plot_direction, "follow the chapter as written"),
        ),
        None => (
            format!("Chapter {chapter}"),
            "follow the chapter as written".to_string(),
        ),
    }
}

fn format_references(excerpts: &[ReferenceExcerpt]) -> String {
    if excerpts.is_empty() {
        return NO_REFERENCES.to_string();
    }
    excerpts
        .iter()
        .map(|excerpt| format!("[{} #{}]\n{}", excerpt.source, excerpt.index + 1, excerpt.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_default(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::VecLogSink;
    use crate::model::testing::ScriptedModel;
    use crate::references::{DocumentChunk, DocumentFormat, IngestedDocument};
    use tempfile::tempdir;

    fn outline() -> Outline {
        Outline::new(vec![
            OutlineEntry {
                chapter: 1,
                title: "Low Tide".into(),
                keywords: vec!["harbor".into()],
                plot_direction: "Mara finds the ledger.".into(),
            },
            OutlineEntry {
                chapter: 2,
                title: "The Ledger".into(),
                keywords: vec!["ledger".into()],
                plot_direction: "She decodes the first page.".into(),
            },
        ])
    }

    fn brief() -> NovelBrief {
        NovelBrief {
            title: "Salt".into(),
            genre: "fantasy".into(),
            premise: "A courier crosses a drowned empire.".into(),
            word_number: 800,
        }
    }

    #[test]
    fn fills_stubs_with_context_from_neighbours() {
        let temp = tempdir().unwrap();
        let (manuscript, _) = Manuscript::create(temp.path(), 2).unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let sink = VecLogSink::new();
        let library = ReferenceLibrary::new(vec![IngestedDocument {
            source: "bible.md".into(),
            format: DocumentFormat::Markdown,
            chunks: vec![DocumentChunk {
                index: 0,
                text: "The ledger is bound in eel skin.".into(),
                words: 7,
            }],
        }]);
        let model = ScriptedModel::new([
            "The harbor smelled of tar. Mara waited.",
            "# Chapter 2: The Ledger\n\nThe pages were wet.",
        ]);

        let report = ChapterService::new(&prompts, &sink)
            .with_references(&library)
            .fill(&model, &manuscript, &outline(), &FillRequest::new(brief()))
            .unwrap();

        assert_eq!(report.written, vec![1, 2]);
        assert!(report.skipped.is_empty());

        let first = manuscript
            .read_variant(1, ChapterVariant::Original)
            .unwrap()
            .unwrap();
        assert!(first.starts_with("# Chapter 1: Low Tide\n\nThe harbor smelled of tar."));

        let prompts_seen = model.prompts();
        assert!(prompts_seen[0].contains("opening chapter"));
        assert!(prompts_seen[0].contains("Chapter 2: The Ledger (She decodes the first page.)"));
        assert!(prompts_seen[0].contains("(none)"));
        assert!(prompts_seen[1].contains("Mara waited."));
        assert!(prompts_seen[1].contains("[bible.md #1]\nThe ledger is bound in eel skin."));
        assert!(prompts_seen[1].contains(NO_NEXT_CHAPTER));
    }

    #[test]
    fn skips_drafted_chapters_unless_forced() {
        let temp = tempdir().unwrap();
        let (manuscript, _) = Manuscript::create(temp.path(), 2).unwrap();
        manuscript
            .write_variant(1, ChapterVariant::Original, "# Chapter 1\n\nAlready here.")
            .unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let sink = VecLogSink::new();

        let model = ScriptedModel::new(["Second chapter text."]);
        let report = ChapterService::new(&prompts, &sink)
            .fill(&model, &manuscript, &outline(), &FillRequest::new(brief()))
            .unwrap();
        assert_eq!(report.written, vec![2]);
        assert_eq!(report.skipped, vec![1]);
        assert!(sink.contains(LogLevel::Info, "already drafted"));

        let model = ScriptedModel::new(["Rewritten."]);
        let mut request = FillRequest::new(brief());
        request.force = true;
        request.to = Some(1);
        let report = ChapterService::new(&prompts, &sink)
            .fill(&model, &manuscript, &outline(), &request)
            .unwrap();
        assert_eq!(report.written, vec![1]);
        assert!(manuscript
            .read_variant(1, ChapterVariant::Original)
            .unwrap()
            .unwrap()
            .contains("Rewritten."));
    }

    #[test]
    fn fill_checks_outline_before_calling_model() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new(["unused"]);
        let mut request = FillRequest::new(brief());
        request.to = Some(3);

        let err = ChapterService::new(&prompts, &VecLogSink::new())
            .fill(&model, &manuscript, &outline(), &request)
            .unwrap_err();
        assert!(matches!(err, ChapterError::MissingOutlineEntry { chapter: 3 }));
        assert!(model.prompts().is_empty());
    }

    #[test]
    fn enhance_reports_missing_and_stub_sources() {
        let temp = tempdir().unwrap();
        let (manuscript, _) = Manuscript::create(temp.path(), 1).unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let sink = VecLogSink::new();
        let service = ChapterService::new(&prompts, &sink);
        let model = ScriptedModel::new(Vec::<String>::new());

        let err = service
            .enhance(&model, &manuscript, &outline(), &EnhanceRequest::new(1, 800))
            .unwrap_err();
        assert!(matches!(err, ChapterError::EmptyChapter { chapter: 1, .. }));

        let err = service
            .enhance(&model, &manuscript, &outline(), &EnhanceRequest::new(2, 800))
            .unwrap_err();
        assert!(matches!(
            err,
            ChapterError::MissingVariant {
                chapter: 2,
                variant: ChapterVariant::Original
            }
        ));
    }

    #[test]
    fn enhance_writes_enhanced_variant() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        manuscript
            .write_variant(1, ChapterVariant::Original, "# Chapter 1: Low Tide\n\nShort draft.")
            .unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new(["A much richer telling of the tide."]);

        let mut request = EnhanceRequest::new(1, 800);
        request.user_guidance = "more salt".into();
        let output = ChapterService::new(&prompts, &VecLogSink::new())
            .enhance(&model, &manuscript, &outline(), &request)
            .unwrap();

        assert_eq!(output.variant, ChapterVariant::Enhanced);
        assert_eq!(output.path, manuscript.chapter_path(1, ChapterVariant::Enhanced));
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Short draft."));
        assert!(prompt.contains("more salt"));
        let written = manuscript
            .read_variant(1, ChapterVariant::Enhanced)
            .unwrap()
            .unwrap();
        assert!(written.starts_with("# Chapter 1: Low Tide"));
    }

    #[test]
    fn deep_drill_prefers_enhanced_and_defaults_focus() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        manuscript
            .write_variant(1, ChapterVariant::Original, "Original words.")
            .unwrap();
        manuscript
            .write_variant(1, ChapterVariant::Enhanced, "Enhanced words.")
            .unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new(["Deeper."]);

        let output = ChapterService::new(&prompts, &VecLogSink::new())
            .deep_drill(
                &model,
                &manuscript,
                &outline(),
                &DeepDrillRequest {
                    chapter: 1,
                    focus: None,
                    word_number: 800,
                },
            )
            .unwrap();

        assert_eq!(output.variant, ChapterVariant::DeepDrilled);
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Enhanced words."));
        assert!(!prompt.contains("Original words."));
        assert!(prompt.contains("Mara finds the ledger."));
    }

    #[test]
    fn combine_needs_both_versions_and_falls_back_on_title() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        manuscript
            .write_variant(5, ChapterVariant::Original, "First take.")
            .unwrap();
        let prompts = PromptRegistry::new().unwrap();
        let sink = VecLogSink::new();
        let service = ChapterService::new(&prompts, &sink);

        let model = ScriptedModel::new(["Both takes."]);
        let err = service
            .combine(&model, &manuscript, &outline(), 5, 800)
            .unwrap_err();
        assert!(matches!(
            err,
            ChapterError::MissingVariant {
                variant: ChapterVariant::Enhanced,
                ..
            }
        ));

        manuscript
            .write_variant(5, ChapterVariant::Enhanced, "Second take.")
            .unwrap();
        let output = service
            .combine(&model, &manuscript, &outline(), 5, 800)
            .unwrap();
        let text = manuscript
            .read_variant(5, ChapterVariant::Combined)
            .unwrap()
            .unwrap();
        assert_eq!(output.chapter, 5);
        assert!(text.starts_with("# Chapter 5\n\nBoth takes."));
    }

    #[test]
    fn failing_model_is_called_once_per_chapter() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::with_results([
            Err("endpoint down".to_string()),
            Ok("never read".to_string()),
        ]);
        let mut request = FillRequest::new(brief());
        request.to = Some(1);

        let err = ChapterService::new(&prompts, &VecLogSink::new())
            .fill(&model, &manuscript, &outline(), &request)
            .unwrap_err();
        assert!(matches!(
            err,
            ChapterError::Model {
                stage: ChapterStage::Draft,
                ..
            }
        ));
        assert_eq!(model.remaining(), 1);
    }

    #[test]
    fn blank_model_output_is_an_error() {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new(["", "   "]);
        let mut request = FillRequest::new(brief());
        request.to = Some(1);

        let err = ChapterService::new(&prompts, &VecLogSink::new())
            .with_max_retries(2)
            .fill(&model, &manuscript, &outline(), &request)
            .unwrap_err();
        assert!(matches!(
            err,
            ChapterError::EmptyResponse {
                stage: ChapterStage::Draft,
                chapter: 1
            }
        ));
    }
}
