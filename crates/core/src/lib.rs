pub mod chapter;
pub mod config;
pub mod logging;
pub mod manuscript;
pub mod model;
pub mod outline;
pub mod prompts;
pub mod references;
pub mod synthesis;
pub mod text;

pub use chapter::{
    ChapterError, ChapterOutput, ChapterService, ChapterStage, DeepDrillRequest, EnhanceRequest,
    FillReport, FillRequest, NovelBrief,
};
pub use config::{
    Config, ConfigError, ConfigStore, GenerationConfig, LlmConfig, NovelConfig, PromptConfig,
    RecentUsage, DEFAULT_CONFIG_FILE_NAME,
};
pub use logging::{
    LogLevel, LogRecord, LogSink, NullLogSink, StdoutLogSink, VecLogSink,
};
pub use manuscript::{
    ChapterStatus, ChapterVariant, CompileReport, Manuscript, ManuscriptError, ParseVariantError,
};
pub use model::{invoke_with_cleaning, LanguageModel, LanguageModelError};
pub use outline::{
    Outline, OutlineEntry, OutlineError, OutlineRequest, OutlineService, OutlineStage,
    OUTLINE_FILE_NAME,
};
pub use prompts::{PromptArguments, PromptError, PromptRegistry, PromptSource, PromptTemplate};
pub use references::{
    DocumentChunk, DocumentFormat, DocumentIngestor, IngestError, IngestedDocument,
    ReferenceExcerpt, ReferenceLibrary,
};
pub use synthesis::{
    dedupe_variants, SynthesisError, SynthesisReport, SynthesisRequest, SynthesisService,
    VariantText,
};
