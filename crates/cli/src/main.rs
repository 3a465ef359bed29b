mod logger;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use quill_adapters::{create_llm_adapter, AdapterError};
use quill_core::{
    ChapterError, ChapterService, ChapterVariant, Config, ConfigError, ConfigStore,
    DeepDrillRequest, DocumentIngestor, EnhanceRequest, FillRequest, IngestError,
    LanguageModel, LanguageModelError, LogLevel, LogRecord, LogSink, Manuscript,
    ManuscriptError, NovelBrief, Outline, OutlineError, OutlineRequest, OutlineService,
    ParseVariantError, PromptError, PromptRegistry, ReferenceLibrary, StdoutLogSink,
    SynthesisError, SynthesisRequest, SynthesisService, DEFAULT_CONFIG_FILE_NAME,
    OUTLINE_FILE_NAME,
};
use thiserror::Error;

use crate::logger::SinkLogger;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let sink = StdoutLogSink::with_min_level(cli.log_level());
    // A logger can only be installed once per process; a second install is harmless.
    let _ = SinkLogger::install(sink);

    let ctx = Context {
        config_path: cli.config.clone(),
        sink,
    };
    match cli.command {
        Commands::Config(command) => handle_config(&ctx, command),
        Commands::Init(args) => run_init(&ctx, args),
        Commands::Outline(command) => handle_outline(&ctx, command),
        Commands::Chapter(command) => handle_chapter(&ctx, command),
        Commands::Ingest(args) => run_ingest(&ctx, args),
        Commands::Compile(args) => run_compile(&ctx, args),
        Commands::Status => run_status(&ctx),
    }
}

struct Context {
    config_path: PathBuf,
    sink: StdoutLogSink,
}

impl Context {
    fn info(&self, message: impl Into<String>) {
        self.sink.log(LogRecord::info(message));
    }

    fn warn(&self, message: impl Into<String>) {
        self.sink.log(LogRecord::warn(message));
    }

    fn open_store(&self) -> Result<ConfigStore, CliError> {
        let mut store = ConfigStore::open(&self.config_path)?;
        store.ensure_recent_defaults();
        Ok(store)
    }
}

fn handle_config(ctx: &Context, command: ConfigCommand) -> Result<(), CliError> {
    match command {
        ConfigCommand::Init(args) => run_config_init(ctx, args),
        ConfigCommand::TestLlm(args) => run_test_llm(ctx, args),
    }
}

fn handle_outline(ctx: &Context, command: OutlineCommand) -> Result<(), CliError> {
    match command {
        OutlineCommand::Generate(args) => run_outline_generate(ctx, args),
        OutlineCommand::Show => run_outline_show(ctx),
    }
}

fn handle_chapter(ctx: &Context, command: ChapterCommand) -> Result<(), CliError> {
    match command {
        ChapterCommand::Fill(args) => run_chapter_fill(ctx, args),
        ChapterCommand::Enhance(args) => run_chapter_enhance(ctx, args),
        ChapterCommand::DeepDrill(args) => run_chapter_deep_drill(ctx, args),
        ChapterCommand::Combine(args) => run_chapter_combine(ctx, args),
        ChapterCommand::Synthesize(args) => run_chapter_synthesize(ctx, args),
    }
}

fn run_config_init(ctx: &Context, args: ConfigInitArgs) -> Result<(), CliError> {
    let store = ConfigStore::create(&ctx.config_path, Config::starter(), args.force)?;
    ctx.info(format!("Wrote starter config to {}", store.path().display()));
    Ok(())
}

fn run_test_llm(ctx: &Context, args: TestLlmArgs) -> Result<(), CliError> {
    let mut store = ctx.open_store()?;
    let selected = select_llm_interface(&store, args.interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;

    ctx.info(format!("Testing LLM interface '{selected}'..."));
    let reply = adapter.invoke("Please reply 'OK'")?;
    if reply.trim().is_empty() {
        return Err(CliError::TestFailed(format!(
            "interface '{selected}' returned an empty reply"
        )));
    }
    println!("{}", reply.trim());

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_init(ctx: &Context, args: InitArgs) -> Result<(), CliError> {
    let mut store = ctx.open_store()?;
    if let Some(dir) = &args.dir {
        store.config_mut().novel.filepath = dir.display().to_string();
    }
    if let Some(chapters) = args.chapters {
        store.config_mut().novel.num_chapters = chapters;
    }
    let dir = ensure_output_dir(store.config())?;
    let chapters = ensure_chapter_count(store.config())?;

    let (manuscript, written) = Manuscript::create(&dir, chapters)?;
    ctx.info(format!(
        "Manuscript ready at {} ({written} chapter stub(s) written)",
        manuscript.root().display()
    ));

    store.save()?;
    Ok(())
}

fn run_outline_generate(ctx: &Context, args: OutlineGenerateArgs) -> Result<(), CliError> {
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let novel = &store.config().novel;
    let title = ensure_novel_field(&novel.title, "novel.title")?.to_string();
    let premise = ensure_novel_field(&novel.premise, "novel.premise")?.to_string();
    let chapters = ensure_chapter_count(store.config())?;

    let mut request = OutlineRequest::new(title, premise, chapters);
    request.genre = novel.genre.clone();
    request.user_guidance = args.guidance.unwrap_or_default();
    request.chunk_size = args
        .chunk_size
        .unwrap_or(store.config().generation.outline_chunk_size)
        .max(1);

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let mut service = OutlineService::new(&prompts, &ctx.sink);
    if let Some(max_retries) = args.max_retries {
        service = service.with_max_retries(max_retries);
    }
    let outline = service.generate(adapter.as_ref(), &dir, &request)?;
    ctx.info(format!(
        "Outline holds {} chapter(s) in {}",
        outline.len(),
        dir.join(OUTLINE_FILE_NAME).display()
    ));

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_outline_show(ctx: &Context) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    for entry in outline.entries() {
        println!("Chapter {}: {}", entry.chapter, entry.title);
        if !entry.keywords.is_empty() {
            println!("  keywords: {}", entry.keywords.join(", "));
        }
        if !entry.plot_direction.is_empty() {
            println!("  {}", entry.plot_direction);
        }
    }
    Ok(())
}

fn run_chapter_fill(ctx: &Context, args: ChapterFillArgs) -> Result<(), CliError> {
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    let manuscript = Manuscript::new(&dir);
    let generation = store.config().generation.clone();

    let references = ReferenceLibrary::load(&manuscript.references_dir())?;
    for skipped in references.skipped() {
        ctx.warn(format!("Ignoring unreadable reference file {}", skipped.display()));
    }

    let mut request = FillRequest::new(NovelBrief::from(&store.config().novel));
    request.from = args.from;
    request.to = args.to;
    request.force = args.force;
    request.user_guidance = args.guidance.unwrap_or_default();
    request.previous_excerpt_chars = generation.previous_excerpt_chars;
    request.reference_k = generation.reference_k;

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let service = ChapterService::new(&prompts, &ctx.sink).with_references(&references);
    let report = service.fill(adapter.as_ref(), &manuscript, &outline, &request)?;
    ctx.info(format!(
        "Drafted {} chapter(s), skipped {} already written",
        report.written.len(),
        report.skipped.len()
    ));

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_chapter_enhance(ctx: &Context, args: ChapterEnhanceArgs) -> Result<(), CliError> {
    let chapter = ensure_chapter_id(args.id)?;
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    let manuscript = Manuscript::new(&dir);

    let mut request = EnhanceRequest::new(chapter, store.config().novel.word_number);
    if let Some(source) = args.source {
        request.source = source;
    }
    request.user_guidance = args.guidance.unwrap_or_default();

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let output = ChapterService::new(&prompts, &ctx.sink).enhance(
        adapter.as_ref(),
        &manuscript,
        &outline,
        &request,
    )?;
    ctx.info(format!(
        "Wrote {} version of chapter {} ({} words) to {}",
        output.variant,
        output.chapter,
        output.words,
        output.path.display()
    ));

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_chapter_deep_drill(ctx: &Context, args: ChapterDeepDrillArgs) -> Result<(), CliError> {
    let chapter = ensure_chapter_id(args.id)?;
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    let manuscript = Manuscript::new(&dir);

    let request = DeepDrillRequest {
        chapter,
        focus: args.focus,
        word_number: store.config().novel.word_number,
    };

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let output = ChapterService::new(&prompts, &ctx.sink).deep_drill(
        adapter.as_ref(),
        &manuscript,
        &outline,
        &request,
    )?;
    ctx.info(format!(
        "Wrote {} version of chapter {} ({} words)",
        output.variant, output.chapter, output.words
    ));

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_chapter_combine(ctx: &Context, args: ChapterCombineArgs) -> Result<(), CliError> {
    let chapter = ensure_chapter_id(args.id)?;
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    let manuscript = Manuscript::new(&dir);
    let word_number = store.config().novel.word_number;

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let output = ChapterService::new(&prompts, &ctx.sink).combine(
        adapter.as_ref(),
        &manuscript,
        &outline,
        chapter,
        word_number,
    )?;
    ctx.info(format!(
        "Wrote {} version of chapter {} ({} words)",
        output.variant, output.chapter, output.words
    ));

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_chapter_synthesize(ctx: &Context, args: ChapterSynthesizeArgs) -> Result<(), CliError> {
    let chapter = ensure_chapter_id(args.id)?;
    let mut store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let outline = require_outline(&dir)?;
    let manuscript = Manuscript::new(&dir);
    let generation = store.config().generation.clone();

    let target_words = args
        .target_words
        .unwrap_or(store.config().novel.word_number);
    let mut request = SynthesisRequest::new(chapter, target_words);
    if let Some(variants) = &args.variants {
        request.variants = ChapterVariant::parse_list(variants)?;
    }
    request.mini = args.mini;
    request.attempts = args.attempts.unwrap_or(generation.synthesis_attempts).max(1);
    request.min_word_ratio = generation.min_word_ratio;
    request.similarity_threshold = generation.similarity_threshold;
    request.user_guidance = args.guidance.unwrap_or_default();

    let selected = select_llm_interface(&store, args.llm.llm_interface.as_deref())?;
    let adapter = create_llm_adapter(store.config(), &selected)?;
    let prompts = PromptRegistry::from_prompt_config(&store.config().prompts)?;

    let report = SynthesisService::new(&prompts, &ctx.sink).synthesize(
        adapter.as_ref(),
        &manuscript,
        &outline,
        &request,
    )?;
    if !report.dropped.is_empty() {
        ctx.info(format!(
            "Skipped near-duplicate variant(s): {}",
            report.dropped.join(", ")
        ));
    }
    if report.target_met {
        ctx.info(format!(
            "Final version of chapter {chapter} written ({} words, {} attempt(s))",
            report.words, report.attempts_used
        ));
    } else {
        ctx.warn(format!(
            "Final version of chapter {chapter} is short of the target: {} of {} words after {} attempt(s)",
            report.words, request.min_words(), report.attempts_used
        ));
    }

    store.touch_llm_interface(selected);
    store.save()?;
    Ok(())
}

fn run_ingest(ctx: &Context, args: IngestArgs) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let manuscript = Manuscript::new(&dir);
    let generation = &store.config().generation;

    let ingestor = DocumentIngestor::new(&ctx.sink)
        .with_chunking(generation.chunk_chars, generation.chunk_overlap);
    let (document, saved) = ingestor.ingest_into(&args.file, &manuscript.references_dir())?;
    ctx.info(format!(
        "Stored {} chunk(s), {} words, at {}",
        document.chunks.len(),
        document.word_count(),
        saved.display()
    ));
    Ok(())
}

fn run_compile(ctx: &Context, args: CompileArgs) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let manuscript = Manuscript::new(&dir);
    let order = match &args.prefer {
        Some(prefer) => ChapterVariant::parse_list(prefer)?,
        None => Vec::new(),
    };

    let outline = Outline::load(&dir)?.unwrap_or_default();
    let chapter_count = store.config().novel.num_chapters.max(outline.max_chapter());
    let titles = |chapter: u32| outline.title(chapter).map(str::to_string);
    let report = manuscript.compile(chapter_count, &order, &titles)?;

    if !report.missing.is_empty() {
        let missing: Vec<String> = report.missing.iter().map(u32::to_string).collect();
        ctx.warn(format!("No text yet for chapter(s): {}", missing.join(", ")));
    }
    ctx.info(format!(
        "Compiled {} chapter(s), {} words, into {}",
        report.chapters.len(),
        report.words,
        report.path.display()
    ));
    Ok(())
}

fn run_status(ctx: &Context) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let dir = ensure_output_dir(store.config())?;
    let manuscript = Manuscript::new(&dir);
    let outline = Outline::load(&dir)?;

    match &outline {
        Some(outline) => println!("Outline: {} chapter(s)", outline.len()),
        None => println!("Outline: not generated"),
    }
    let planned = outline.as_ref().map(Outline::max_chapter).unwrap_or(0);
    let chapter_count = store.config().novel.num_chapters.max(planned);

    for status in manuscript.status(chapter_count)? {
        let variants: Vec<String> = status
            .variants
            .iter()
            .map(|(variant, words)| format!("{variant} ({words})"))
            .collect();
        let title = outline
            .as_ref()
            .and_then(|outline| outline.title(status.chapter))
            .unwrap_or("");
        let listed = if variants.is_empty() {
            "-".to_string()
        } else {
            variants.join(", ")
        };
        println!("{:>3} {:<32} {listed}", status.chapter, title);
    }
    Ok(())
}

fn select_llm_interface(store: &ConfigStore, preferred: Option<&str>) -> Result<String, CliError> {
    let config = store.config();
    if let Some(name) = normalize_preference(preferred) {
        if config.get_llm_profile(&name).is_some() {
            return Ok(name);
        }
        return Err(CliError::UnknownInterface(name));
    }
    if let Some(name) = store.last_llm_interface() {
        return Ok(name.to_string());
    }
    config
        .llm_profiles
        .keys()
        .next()
        .cloned()
        .ok_or(CliError::MissingLlmProfile)
}

fn normalize_preference(preferred: Option<&str>) -> Option<String> {
    preferred
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn ensure_output_dir(config: &Config) -> Result<PathBuf, CliError> {
    let filepath = config.novel.filepath.trim();
    if filepath.is_empty() {
        return Err(CliError::MissingOutputDir);
    }
    Ok(PathBuf::from(filepath))
}

fn ensure_novel_field<'a>(value: &'a str, field: &'static str) -> Result<&'a str, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CliError::MissingNovelField(field));
    }
    Ok(trimmed)
}

fn ensure_chapter_count(config: &Config) -> Result<u32, CliError> {
    match config.novel.num_chapters {
        0 => Err(CliError::MissingNovelField("novel.num_chapters")),
        count => Ok(count),
    }
}

fn ensure_chapter_id(id: u32) -> Result<u32, CliError> {
    if id == 0 {
        return Err(CliError::InvalidChapterNumber(id));
    }
    Ok(id)
}

fn require_outline(dir: &Path) -> Result<Outline, CliError> {
    Outline::load(dir)?.ok_or_else(|| CliError::MissingOutline(dir.join(OUTLINE_FILE_NAME)))
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Model(#[from] LanguageModelError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Manuscript(#[from] ManuscriptError),
    #[error(transparent)]
    Outline(#[from] OutlineError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Variant(#[from] ParseVariantError),
    #[error("no LLM profile is configured; run `quill config init` or add one to llm_profiles")]
    MissingLlmProfile,
    #[error("LLM interface '{0}' is not defined in llm_profiles")]
    UnknownInterface(String),
    #[error("novel.filepath is empty; run `quill init --dir <DIR>`")]
    MissingOutputDir,
    #[error("{0} must be set in the config")]
    MissingNovelField(&'static str),
    #[error("chapter numbers start at 1, got {0}")]
    InvalidChapterNumber(u32),
    #[error("no outline found at {0}; run `quill outline generate` first")]
    MissingOutline(PathBuf),
    #[error("LLM test failed: {0}")]
    TestFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Draft a novel chapter by chapter with an LLM")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,
    /// Show debug output.
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only show warnings and errors.
    #[arg(long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Warn
        } else {
            LogLevel::Info
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Create the manuscript folders and chapter stubs.
    Init(InitArgs),
    /// Generate or inspect the chapter outline.
    #[command(subcommand)]
    Outline(OutlineCommand),
    /// Draft and revise chapters.
    #[command(subcommand)]
    Chapter(ChapterCommand),
    /// Add a reference document to the manuscript.
    Ingest(IngestArgs),
    /// Concatenate the best version of every chapter into all.md.
    Compile(CompileArgs),
    /// List outline and chapter progress.
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a starter config file.
    Init(ConfigInitArgs),
    /// Send a short prompt to an LLM profile.
    TestLlm(TestLlmArgs),
}

#[derive(Args, Debug)]
struct ConfigInitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct TestLlmArgs {
    #[arg(long)]
    interface: Option<String>,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Manuscript directory; saved to novel.filepath.
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Number of chapter stubs; saved to novel.num_chapters.
    #[arg(long)]
    chapters: Option<u32>,
}

#[derive(Args, Debug, Default)]
struct LlmArgs {
    /// Name of the LLM profile to use. Defaults to the last one used.
    #[arg(long)]
    llm_interface: Option<String>,
}

#[derive(Subcommand, Debug)]
enum OutlineCommand {
    Generate(OutlineGenerateArgs),
    Show,
}

#[derive(Args, Debug)]
struct OutlineGenerateArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    guidance: Option<String>,
    /// Chapters requested per model call.
    #[arg(long)]
    chunk_size: Option<u32>,
    #[arg(long)]
    max_retries: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ChapterCommand {
    /// Draft the original version of chapters from the outline.
    Fill(ChapterFillArgs),
    Enhance(ChapterEnhanceArgs),
    DeepDrill(ChapterDeepDrillArgs),
    Combine(ChapterCombineArgs),
    /// Merge the chapter variants into the final version.
    Synthesize(ChapterSynthesizeArgs),
}

#[derive(Args, Debug)]
struct ChapterFillArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    from: Option<u32>,
    #[arg(long)]
    to: Option<u32>,
    /// Redraft chapters that already have text.
    #[arg(long)]
    force: bool,
    #[arg(long)]
    guidance: Option<String>,
}

#[derive(Args, Debug)]
struct ChapterEnhanceArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    id: u32,
    /// Variant to rewrite (original, combined, ...).
    #[arg(long)]
    source: Option<ChapterVariant>,
    #[arg(long)]
    guidance: Option<String>,
}

#[derive(Args, Debug)]
struct ChapterDeepDrillArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    id: u32,
    /// Scene or thread to expand; defaults to the outline's plot direction.
    #[arg(long)]
    focus: Option<String>,
}

#[derive(Args, Debug)]
struct ChapterCombineArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    id: u32,
}

#[derive(Args, Debug)]
struct ChapterSynthesizeArgs {
    #[command(flatten)]
    llm: LlmArgs,
    #[arg(long)]
    id: u32,
    /// Comma-separated variants to merge, e.g. `original,enhanced`.
    #[arg(long)]
    variants: Option<String>,
    /// Use only the original and enhanced versions.
    #[arg(long)]
    mini: bool,
    #[arg(long)]
    attempts: Option<usize>,
    #[arg(long)]
    target_words: Option<u32>,
    #[arg(long)]
    guidance: Option<String>,
}

#[derive(Args, Debug)]
struct IngestArgs {
    #[arg(long)]
    file: PathBuf,
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Comma-separated variant preference, best first.
    #[arg(long)]
    prefer: Option<String>,
}
