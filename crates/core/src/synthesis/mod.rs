//! Final chapter synthesis.
//!
//! Every non-final version of a chapter that exists on disk is gathered,
//! near-duplicates are collapsed, and the model is asked to merge the rest
//! into one definitive text. The call is repeated until the result reaches
//! the word target or the attempts run out.

use std::path::PathBuf;

use thiserror::Error;

use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::manuscript::{ensure_heading, ChapterVariant, Manuscript, ManuscriptError};
use crate::model::{invoke_with_cleaning, LanguageModel, LanguageModelError};
use crate::outline::Outline;
use crate::prompts::{PromptError, PromptRegistry};
use crate::text::{overlap_ratio, word_count};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_MIN_WORD_RATIO: f64 = 0.9;
pub const DEFAULT_ATTEMPTS: usize = 3;

/// Versions used by `--mini`.
pub const MINI_VARIANTS: [ChapterVariant; 2] = [ChapterVariant::Original, ChapterVariant::Enhanced];

#[derive(Clone, Debug, PartialEq)]
pub struct VariantText {
    pub label: String,
    pub text: String,
}

impl VariantText {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Deduplicated {
    pub kept: Vec<VariantText>,
    pub dropped: Vec<String>,
}

/// Collapses near-identical variants.
///
/// Variants are visited in order. One whose overlap ratio with an already
/// kept variant reaches `threshold` is a duplicate of it; of the two, the
/// one with more words stays in the earlier slot and the other's label is
/// reported as dropped. Ties keep the earlier variant.
pub fn dedupe_variants(variants: Vec<VariantText>, threshold: f64) -> Deduplicated {
    let mut result = Deduplicated::default();
    for candidate in variants {
        let duplicate_of = result
            .kept
            .iter()
            .position(|kept| overlap_ratio(&kept.text, &candidate.text) >= threshold);
        match duplicate_of {
            Some(slot) => {
                let kept = &mut result.kept[slot];
                if word_count(&candidate.text) > word_count(&kept.text) {
                    let replaced = std::mem::replace(kept, candidate);
                    result.dropped.push(replaced.label);
                } else {
                    result.dropped.push(candidate.label);
                }
            }
            None => result.kept.push(candidate),
        }
    }
    result
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("chapter {chapter} has no written versions to synthesize")]
    NoVariants { chapter: u32 },
    #[error("synthesis of chapter {chapter} produced no text in {attempts} attempts")]
    EmptyResponse { chapter: u32, attempts: usize },
    #[error(transparent)]
    Manuscript(#[from] ManuscriptError),
    #[error("failed to render synthesis prompt: {0}")]
    Prompt(#[source] PromptError),
    #[error("language model invocation failed while synthesizing chapter {chapter}: {source}")]
    Model {
        chapter: u32,
        #[source]
        source: LanguageModelError,
    },
}

#[derive(Clone, Debug)]
pub struct SynthesisRequest {
    pub chapter: u32,
    /// Versions to merge. Empty means every non-final version on disk.
    pub variants: Vec<ChapterVariant>,
    pub mini: bool,
    pub target_words: u32,
    pub attempts: usize,
    pub min_word_ratio: f64,
    pub similarity_threshold: f64,
    pub user_guidance: String,
}

impl SynthesisRequest {
    pub fn new(chapter: u32, target_words: u32) -> Self {
        Self {
            chapter,
            variants: Vec::new(),
            mini: false,
            target_words,
            attempts: DEFAULT_ATTEMPTS,
            min_word_ratio: DEFAULT_MIN_WORD_RATIO,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            user_guidance: String::new(),
        }
    }

    /// Smallest accepted length.
    pub fn min_words(&self) -> usize {
        (f64::from(self.target_words) * self.min_word_ratio).ceil() as usize
    }

    fn candidates(&self) -> Vec<ChapterVariant> {
        if self.mini {
            MINI_VARIANTS.to_vec()
        } else if self.variants.is_empty() {
            ChapterVariant::ALL
                .into_iter()
                .filter(|v| *v != ChapterVariant::Final)
                .collect()
        } else {
            self.variants.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisReport {
    pub path: PathBuf,
    pub attempts_used: usize,
    /// Words in the chapter body, not counting the `# Chapter N` heading.
    pub words: usize,
    pub target_met: bool,
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

pub struct SynthesisService<'a> {
    prompts: &'a PromptRegistry,
    sink: &'a dyn LogSink,
}

impl<'a> SynthesisService<'a> {
    pub fn new(prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self { prompts, sink }
    }

    pub fn synthesize<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        manuscript: &Manuscript,
        outline: &Outline,
        request: &SynthesisRequest,
    ) -> Result<SynthesisReport, SynthesisError> {
        let chapter = request.chapter;

        let mut variants = Vec::new();
        for variant in request.candidates() {
            match manuscript.read_content(chapter, variant)? {
                Some(text) => variants.push(VariantText::new(variant.label(), text.trim())),
                None => self.log(
                    LogLevel::Debug,
                    format!("Chapter {chapter}: no {variant} version, skipping it."),
                ),
            }
        }
        if variants.is_empty() {
            return Err(SynthesisError::NoVariants { chapter });
        }

        let Deduplicated { kept, dropped } =
            dedupe_variants(variants, request.similarity_threshold);
        for label in &dropped {
            self.log(
                LogLevel::Info,
                format!("Chapter {chapter}: {label} version is a near-duplicate; dropped."),
            );
        }

        let entry = outline.entry(chapter);
        let title = entry
            .map(|e| e.title.clone())
            .unwrap_or_else(|| format!("Chapter {chapter}"));
        let plot_direction = entry
            .map(|e| e.plot_direction.clone())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "keep the events of the versions below".to_string());
        let variants_block = kept
            .iter()
            .map(|v| format!("### Variant: {}\n\n{}", v.label, v.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let guidance = request.user_guidance.trim();

        let prompt = self
            .prompts
            .format_with(
                "chapter_synthesis",
                [
                    ("chapter_number", chapter.to_string()),
                    ("chapter_title", title),
                    ("plot_direction", plot_direction),
                    ("variant_count", kept.len().to_string()),
                    ("word_number", request.target_words.to_string()),
                    (
                        "user_guidance",
                        if guidance.is_empty() { "none" } else { guidance }.to_string(),
                    ),
                    ("variants", variants_block),
                ],
            )
            .map_err(SynthesisError::Prompt)?;

        let attempts = request.attempts.max(1);
        let min_words = request.min_words();
        let mut best: Option<(String, usize)> = None;
        let mut last_error = None;
        let mut attempts_used = 0;

        for attempt in 1..=attempts {
            attempts_used = attempt;
            let stage = format!("synthesis {chapter}");
            match invoke_with_cleaning(model, self.sink, &stage, &prompt, 1) {
                Ok(text) if text.trim().is_empty() => {}
                Ok(text) => {
                    let words = word_count(&text);
                    if words >= min_words {
                        best = Some((text, words));
                        break;
                    }
                    self.log(
                        LogLevel::Warn,
                        format!(
                            "Chapter {chapter}: synthesis attempt {attempt}/{attempts} has {words} words, wanted at least {min_words}."
                        ),
                    );
                    if best.as_ref().map_or(true, |(_, longest)| words > *longest) {
                        best = Some((text, words));
                    }
                }
                Err(err) => last_error = Some(err),
            }
        }

        let Some((text, words)) = best else {
            return Err(match last_error {
                Some(source) => SynthesisError::Model { chapter, source },
                None => SynthesisError::EmptyResponse {
                    chapter,
                    attempts: attempts_used,
                },
            });
        };

        // Judged on the body the model wrote; the heading added below is not counted.
        let target_met = words >= min_words;
        let text = ensure_heading(&text, chapter, outline.title(chapter));
        let path = manuscript.write_variant(chapter, ChapterVariant::Final, &text)?;
        let level = if target_met { LogLevel::Info } else { LogLevel::Warn };
        self.log(
            level,
            format!(
                "Chapter {chapter} final version saved to {} ({words} words, target {}).",
                path.display(),
                request.target_words
            ),
        );

        Ok(SynthesisReport {
            path,
            attempts_used,
            words,
            target_met,
            kept: kept.into_iter().map(|v| v.label).collect(),
            dropped,
        })
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::VecLogSink;
    use crate::model::testing::ScriptedModel;
    use tempfile::tempdir;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn manuscript_with(variants: &[(ChapterVariant, &str)]) -> (tempfile::TempDir, Manuscript) {
        let temp = tempdir().unwrap();
        let manuscript = Manuscript::new(temp.path());
        for (variant, text) in variants {
            manuscript.write_variant(1, *variant, text).unwrap();
        }
        (temp, manuscript)
    }

    #[test]
    fn dedupe_drops_exact_copies() {
        let out = dedupe_variants(
            vec![
                VariantText::new("original", "the tide came in"),
                VariantText::new("enhanced", "The tide came in."),
                VariantText::new("combined", "a wholly different story"),
            ],
            0.85,
        );
        assert_eq!(out.dropped, vec!["enhanced"]);
        let labels: Vec<&str> = out.kept.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["original", "combined"]);
    }

    #[test]
    fn dedupe_keeps_longer_duplicate_in_earlier_slot() {
        let short = "a b c d e f g h i j";
        let long = "a b c d e f g h i j j";
        let out = dedupe_variants(
            vec![
                VariantText::new("original", short),
                VariantText::new("other", "x y z"),
                VariantText::new("enhanced", long),
            ],
            0.85,
        );
        assert_eq!(out.kept[0], VariantText::new("enhanced", long));
        assert_eq!(out.kept[1].label, "other");
        assert_eq!(out.dropped, vec!["original"]);
    }

    #[test]
    fn dedupe_respects_threshold() {
        // {a b c d} vs {a b c e}: three shared of four.
        let variants = vec![
            VariantText::new("one", "a b c d"),
            VariantText::new("two", "a b c e"),
        ];
        assert_eq!(dedupe_variants(variants.clone(), 0.75).kept.len(), 1);
        assert_eq!(dedupe_variants(variants, 0.8).kept.len(), 2);
    }

    #[test]
    fn accepts_first_attempt_meeting_target() {
        let (_temp, manuscript) = manuscript_with(&[
            (ChapterVariant::Original, "the original draft of the chapter"),
            (ChapterVariant::Enhanced, "an entirely reworked telling here"),
        ]);
        let prompts = PromptRegistry::new().unwrap();
        let sink = VecLogSink::new();
        let model = ScriptedModel::new([words(5), words(10), words(50)]);

        let report = SynthesisService::new(&prompts, &sink)
            .synthesize(&model, &manuscript, &Outline::default(), &SynthesisRequest::new(1, 10))
            .unwrap();

        assert_eq!(report.attempts_used, 2);
        assert!(report.target_met);
        assert_eq!(report.kept, vec!["original", "enhanced"]);
        assert_eq!(model.remaining(), 1);
        assert!(sink.contains(LogLevel::Warn, "attempt 1/3 has 5 words"));

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("### Variant: original\n\nthe original draft"));
        assert!(prompt.contains("### Variant: enhanced"));

        let final_text = manuscript
            .read_variant(1, ChapterVariant::Final)
            .unwrap()
            .unwrap();
        assert!(final_text.starts_with("# Chapter 1\n\nw0 w1"));
    }

    #[test]
    fn keeps_longest_when_target_is_never_met() {
        let (_temp, manuscript) = manuscript_with(&[(ChapterVariant::Original, "draft text")]);
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::with_results([
            Ok(words(4)),
            Err("connection reset".to_string()),
            Ok(words(3)),
        ]);

        let report = SynthesisService::new(&prompts, &VecLogSink::new())
            .synthesize(&model, &manuscript, &Outline::default(), &SynthesisRequest::new(1, 100))
            .unwrap();

        assert_eq!(report.attempts_used, 3);
        assert!(!report.target_met);
        let final_text = manuscript
            .read_variant(1, ChapterVariant::Final)
            .unwrap()
            .unwrap();
        assert!(final_text.contains("w3"));
    }

    #[test]
    fn short_attempts_stay_short_after_heading_is_added() {
        let (_temp, manuscript) = manuscript_with(&[(ChapterVariant::Original, "draft text")]);
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new([words(7), words(7), words(7)]);

        let report = SynthesisService::new(&prompts, &VecLogSink::new())
            .synthesize(&model, &manuscript, &Outline::default(), &SynthesisRequest::new(1, 10))
            .unwrap();

        assert_eq!(report.attempts_used, 3);
        assert_eq!(report.words, 7);
        assert!(!report.target_met);
        let final_text = manuscript
            .read_variant(1, ChapterVariant::Final)
            .unwrap()
            .unwrap();
        assert!(final_text.starts_with("# Chapter 1\n\n"));
    }

    #[test]
    fn fails_when_every_attempt_errors() {
        let (_temp, manuscript) = manuscript_with(&[(ChapterVariant::Original, "draft text")]);
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::with_results([Err("a".to_string()), Err("b".to_string())]);
        let mut request = SynthesisRequest::new(1, 100);
        request.attempts = 2;

        let err = SynthesisService::new(&prompts, &VecLogSink::new())
            .synthesize(&model, &manuscript, &Outline::default(), &request)
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Model { chapter: 1, .. }));
        assert!(manuscript
            .read_variant(1, ChapterVariant::Final)
            .unwrap()
            .is_none());
    }

    #[test]
    fn reports_missing_variants() {
        let (_temp, manuscript) = manuscript_with(&[(ChapterVariant::Original, "# Chapter 1")]);
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new(Vec::<String>::new());
        let err = SynthesisService::new(&prompts, &VecLogSink::new())
            .synthesize(&model, &manuscript, &Outline::default(), &SynthesisRequest::new(1, 10))
            .unwrap_err();
        assert!(matches!(err, SynthesisError::NoVariants { chapter: 1 }));
    }

    #[test]
    fn mini_mode_uses_original_and_enhanced_only() {
        let (_temp, manuscript) = manuscript_with(&[
            (ChapterVariant::Original, "first version alpha"),
            (ChapterVariant::Enhanced, "second version beta"),
            (ChapterVariant::DeepDrilled, "deep version gamma"),
        ]);
        let prompts = PromptRegistry::new().unwrap();
        let model = ScriptedModel::new([words(20)]);
        let mut request = SynthesisRequest::new(1, 10);
        request.mini = true;

        let report = SynthesisService::new(&prompts, &VecLogSink::new())
            .synthesize(&model, &manuscript, &Outline::default(), &request)
            .unwrap();
        assert_eq!(report.kept, vec!["original", "enhanced"]);
        assert!(!model.prompts()[0].contains("gamma"));
    }
}
