use std::collections::VecDeque;
use std::fs;
use std::io;
use std::sync::Mutex;

use quill_core::manuscript::COMPILED_FILE_NAME;
use quill_core::{
    ChapterService, ChapterVariant, Config, ConfigStore, DeepDrillRequest, DocumentIngestor,
    EnhanceRequest, FillRequest, LanguageModel, LanguageModelError, Manuscript, NovelBrief,
    Outline, OutlineRequest, OutlineService, PromptRegistry, ReferenceLibrary, SynthesisRequest,
    SynthesisService, VecLogSink, OUTLINE_FILE_NAME,
};
use tempfile::tempdir;

struct MockLanguageModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .expect("mock mutex poisoned")
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn assert_empty(&self) {
        let guard = self.responses.lock().expect("mock mutex poisoned");
        assert!(
            guard.is_empty(),
            "expected all mock responses to be consumed"
        );
    }
}

impl LanguageModel for MockLanguageModel {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        self.prompts
            .lock()
            .expect("mock mutex poisoned")
            .push(prompt.to_string());
        let mut guard = self.responses.lock().expect("mock mutex poisoned");
        guard.pop_front().ok_or_else(|| {
            LanguageModelError::new(io::Error::new(
                io::ErrorKind::Other,
                "mock language model has no remaining responses",
            ))
        })
    }
}

#[test]
fn full_generation_pipeline_produces_expected_artifacts() -> Result<(), Box<dyn std::error::Error>>
{
    const OUTLINE_JSON: &str = r#"Here is the outline:
```json
[
  {"chapter": 1, "title": "Low Tide", "keywords": ["harbor", "ledger"], "plot_direction": "Mara finds a drowned ledger."},
  {"chapter": 2, "title": "Ink", "keywords": "cipher, lamp", "plot_direction": "She deciphers the first page by lamplight."}
]
```"#;

    let temp = tempdir()?;
    let workspace = temp.path();

    let mut config = Config::starter();
    config.novel.title = "Salt".into();
    config.novel.premise = "A courier crosses a drowned empire.".into();
    config.novel.num_chapters = 2;
    config.novel.word_number = 12;
    let store = ConfigStore::create(workspace.join("quill.json"), config, false)?;
    let novel = store.config().novel.clone();

    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();
    let (manuscript, stubs) = Manuscript::create(workspace.join("book"), novel.num_chapters)?;
    assert_eq!(stubs, 2);

    let notes = workspace.join("harbor.txt");
    fs::write(
        &notes,
        "The harbor of Vel is ringed by drowned towers.\n\nEvery ledger from the old customs house is bound in eel skin.",
    )?;
    DocumentIngestor::new(&sink).ingest_into(&notes, &manuscript.references_dir())?;
    let library = ReferenceLibrary::load(&manuscript.references_dir())?;

    let mock = MockLanguageModel::new([
        OUTLINE_JSON.to_string(),
        "Mara waded through the harbor until her boots filled with silt.".to_string(),
        "# Chapter 2: Ink\n\nThe lamp hissed while she worked the cipher.".to_string(),
        "Mara waded through the black harbor, silt pouring into her boots as the bells tolled.".to_string(),
        "The bells tolled as Mara waded in. Silt filled her boots; a ledger floated by.".to_string(),
        "She lifted the ledger. Its eel-skin binding was cold and slick under her fingers.".to_string(),
        "# Chapter 1: Low Tide\n\nMara waded into the harbor at low tide and found the drowned ledger floating between towers, its binding slick.".to_string(),
    ]);

    let outline_request = OutlineRequest::new(&novel.title, &novel.premise, novel.num_chapters);
    let outline =
        OutlineService::new(&prompts, &sink).generate(&mock, manuscript.root(), &outline_request)?;
    assert_eq!(outline.len(), 2);
    assert_eq!(
        outline.entry(2).map(|e| e.keywords.clone()),
        Some(vec!["cipher".to_string(), "lamp".to_string()])
    );
    assert!(manuscript.root().join(OUTLINE_FILE_NAME).exists());
    assert_eq!(Outline::load(manuscript.root())?, Some(outline.clone()));

    let chapters = ChapterService::new(&prompts, &sink).with_references(&library);
    let fill_request = FillRequest::new(NovelBrief::from(&novel));
    let report = chapters.fill(&mock, &manuscript, &outline, &fill_request)?;
    assert_eq!(report.written, vec![1, 2]);
    assert!(mock.last_prompt().contains("boots filled with silt"));

    chapters.enhance(&mock, &manuscript, &outline, &EnhanceRequest::new(1, novel.word_number))?;
    chapters.combine(&mock, &manuscript, &outline, 1, novel.word_number)?;
    chapters.deep_drill(
        &mock,
        &manuscript,
        &outline,
        &DeepDrillRequest {
            chapter: 1,
            focus: Some("the ledger".into()),
            word_number: novel.word_number,
        },
    )?;
    assert_eq!(manuscript.available_variants(1).len(), 4);

    let synthesis = SynthesisService::new(&prompts, &sink).synthesize(
        &mock,
        &manuscript,
        &outline,
        &SynthesisRequest::new(1, novel.word_number),
    )?;
    assert!(synthesis.target_met);
    assert_eq!(synthesis.attempts_used, 1);
    assert!(mock.last_prompt().contains("### Variant: deep-drilled"));

    let titles = |n: u32| outline.title(n).map(str::to_string);
    let compiled = manuscript.compile(novel.num_chapters, &[], &titles)?;
    assert_eq!(
        compiled.chapters,
        vec![(1, ChapterVariant::Final), (2, ChapterVariant::Original)]
    );
    assert!(compiled.missing.is_empty());
    let all = fs::read_to_string(manuscript.root().join(COMPILED_FILE_NAME))?;
    assert!(all.contains("found the drowned ledger"));
    assert!(all.contains("# Chapter 2: Ink"));

    mock.assert_empty();

    Ok(())
}

#[test]
fn outline_generation_resumes_after_interruption() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let prompts = PromptRegistry::new()?;
    let sink = VecLogSink::new();

    let mut request = OutlineRequest::new("Salt", "A courier crosses a drowned empire.", 3);
    request.chunk_size = 2;

    let failing = MockLanguageModel::new([
        r#"[{"chapter": 1, "title": "One"}, {"chapter": 2, "title": "Two"}]"#,
    ]);
    let service = OutlineService::new(&prompts, &sink).with_max_retries(1);
    assert!(service.generate(&failing, temp.path(), &request).is_err());

    let partial = Outline::load(temp.path())?.expect("first chunk was saved");
    assert_eq!(partial.max_chapter(), 2);

    let resumed = MockLanguageModel::new([r#"[{"chapter": 3, "title": "Three"}]"#]);
    let outline = service.generate(&resumed, temp.path(), &request)?;
    assert_eq!(outline.len(), 3);
    assert!(resumed.last_prompt().contains("\"title\": \"Two\""));
    resumed.assert_empty();

    Ok(())
}
