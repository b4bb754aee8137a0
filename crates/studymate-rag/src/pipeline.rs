//! Question-answering pipeline orchestrator

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use studymate_core::{
    AnswerResult, Chunk, Document, Embedder, Error, ErrorKind, Extractor, Generator, PipelineConfig,
    Result, RetrievalResult, Stage, VectorIndex,
};

use crate::chunker::TextChunker;
use crate::index::FlatIndex;
use crate::retriever::retrieve;

/// One question about one PDF
#[derive(Debug, Clone)]
pub struct QaRequest {
    pub pdf: Vec<u8>,
    pub question: String,
    pub model_hint: Option<String>,
}

impl QaRequest {
    pub fn new(pdf: Vec<u8>, question: impl Into<String>) -> Self {
        Self {
            pdf,
            question: question.into(),
            model_hint: None,
        }
    }

    /// Ask the generator to use a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }
}

/// Why a request failed, with the stage that was running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineFailure {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    fn from_error(stage: Stage, error: &Error) -> Self {
        Self::new(stage, error.classify(stage), error.to_string())
    }
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} while {}: {}", self.kind, self.stage, self.message)
    }
}

/// Terminal state of the pipeline
#[derive(Debug, Clone)]
pub enum PipelineState {
    Done(AnswerResult),
    Failed(PipelineFailure),
}

/// Result of running the pipeline, with the stages that were entered
#[derive(Debug, Clone)]
pub struct QaOutcome {
    pub state: PipelineState,
    pub stages: Vec<Stage>,
}

impl QaOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.state, PipelineState::Done(_))
    }

    pub fn answer(&self) -> Option<&AnswerResult> {
        match &self.state {
            PipelineState::Done(result) => Some(result),
            PipelineState::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match &self.state {
            PipelineState::Done(_) => None,
            PipelineState::Failed(failure) => Some(failure),
        }
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Collapse into an [`AnswerResult`], carrying the error kind on failure
    pub fn into_answer_result(self) -> AnswerResult {
        match self.state {
            PipelineState::Done(result) => result,
            PipelineState::Failed(failure) => AnswerResult::failed(failure.kind),
        }
    }
}

/// Join the retrieved chunk texts, best first, separated by a blank line
///
/// Relies on chunk indexes being contiguous so `chunk_index` is a position
/// in `chunks`.
pub fn build_context(chunks: &[Chunk], retrieval: &RetrievalResult) -> (String, Vec<Chunk>) {
    let used: Vec<Chunk> = retrieval
        .iter()
        .filter_map(|hit| chunks.get(hit.chunk_index).cloned())
        .collect();

    let context = used
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    (context, used)
}

/// Tracks the request deadline and the stages entered so far
struct StageRunner {
    deadline: Instant,
    stages: Vec<Stage>,
}

impl StageRunner {
    fn new(deadline: Instant) -> Self {
        Self {
            deadline,
            stages: Vec::new(),
        }
    }

    /// Run one stage under the request deadline
    ///
    /// No stage starts once the deadline has passed.
    async fn run<T, F>(&mut self, stage: Stage, work: F) -> std::result::Result<T, PipelineFailure>
    where
        F: Future<Output = Result<T>>,
    {
        if Instant::now() >= self.deadline {
            return Err(PipelineFailure::new(
                stage,
                ErrorKind::Timeout,
                format!("request deadline passed before {} started", stage),
            ));
        }

        self.stages.push(stage);
        debug!(stage = %stage, "entering stage");

        match timeout_at(self.deadline, work).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(PipelineFailure::from_error(stage, &error)),
            Err(_) => Err(PipelineFailure::new(
                stage,
                ErrorKind::Timeout,
                format!("request deadline passed while {}", stage),
            )),
        }
    }
}

/// Retrieval-augmented question answering over a single PDF
///
/// Each call to [`QaPipeline::run`] owns its document, chunks and index; the
/// pipeline itself only holds the shared backends and configuration.
pub struct QaPipeline<X: ?Sized, E: ?Sized, G: ?Sized, I = FlatIndex> {
    extractor: Arc<X>,
    embedder: Arc<E>,
    generator: Arc<G>,
    chunker: TextChunker,
    config: PipelineConfig,
    index: PhantomData<fn() -> I>,
}

impl<X, E, G> QaPipeline<X, E, G, FlatIndex>
where
    X: Extractor + ?Sized,
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
{
    /// Create a new pipeline backed by a [`FlatIndex`]
    pub fn new(extractor: Arc<X>, embedder: Arc<E>, generator: Arc<G>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let chunker = TextChunker::from_config(&config)?;

        Ok(Self {
            extractor,
            embedder,
            generator,
            chunker,
            config,
            index: PhantomData,
        })
    }
}

impl<X, E, G, I> QaPipeline<X, E, G, I>
where
    X: Extractor + ?Sized,
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
    I: VectorIndex,
{
    /// Swap the index implementation
    pub fn with_index<J: VectorIndex>(self) -> QaPipeline<X, E, G, J> {
        QaPipeline {
            extractor: self.extractor,
            embedder: self.embedder,
            generator: self.generator,
            chunker: self.chunker,
            config: self.config,
            index: PhantomData,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer one question about one PDF
    ///
    /// Never panics on component failure: every error is reported as
    /// [`PipelineState::Failed`] naming the stage that raised it.
    pub async fn run(&self, request: &QaRequest) -> QaOutcome {
        let deadline = Instant::now() + self.config.request_timeout;
        let mut runner = StageRunner::new(deadline);

        let state = match self.execute(request, &mut runner).await {
            Ok(result) => {
                runner.stages.push(Stage::Done);
                info!(
                    evidence_count = result.evidence_count(),
                    answer_len = result.answer.len(),
                    "question answered"
                );
                PipelineState::Done(result)
            }
            Err(failure) => {
                warn!(
                    stage = %failure.stage,
                    kind = %failure.kind,
                    message = %failure.message,
                    "question answering failed"
                );
                PipelineState::Failed(failure)
            }
        };

        QaOutcome {
            state,
            stages: runner.stages,
        }
    }

    async fn execute(
        &self,
        request: &QaRequest,
        runner: &mut StageRunner,
    ) -> std::result::Result<AnswerResult, PipelineFailure> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(PipelineFailure::new(
                Stage::Retrieving,
                ErrorKind::InvalidQuestion,
                "question must not be empty",
            ));
        }

        let extracted = runner
            .run(Stage::Extracting, self.extractor.extract(&request.pdf))
            .await?;

        let document = Document {
            id: format!("{:x}", md5::compute(&request.pdf)),
            raw_text: extracted.text,
            page_count: extracted.page_count,
        };

        if document.is_blank() {
            return Err(PipelineFailure::new(
                Stage::Extracting,
                ErrorKind::EmptyDocument,
                format!("no text could be extracted from {} page(s)", document.page_count),
            ));
        }

        let chunks = runner
            .run(Stage::Chunking, async { Ok::<_, Error>(self.chunker.chunk(&document.raw_text)) })
            .await?;
        info!(
            document.id = %document.id,
            page_count = document.page_count,
            char_count = document.char_len(),
            chunk_count = chunks.len(),
            "document chunked"
        );

        let index = runner.run(Stage::Indexing, self.build_index(&chunks)).await?;

        let retrieval = runner
            .run(
                Stage::Retrieving,
                retrieve(question, &index, &*self.embedder, self.config.top_k),
            )
            .await?;

        let (context, used_chunks) = build_context(&chunks, &retrieval);
        if used_chunks.is_empty() {
            info!(document.id = %document.id, "no relevant chunks, answering without evidence");
        }

        let answer = runner
            .run(
                Stage::Generating,
                self.generate_with_retry(&context, question, request.model_hint.as_deref()),
            )
            .await?;

        Ok(AnswerResult::answered(answer, used_chunks))
    }

    async fn build_index(&self, chunks: &[Chunk]) -> Result<I> {
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        I::build(self.embedder.space(), chunks, vectors)
    }

    /// Call the generator, retrying generation failures up to the configured attempts
    async fn generate_with_retry(&self, context: &str, question: &str, model_hint: Option<&str>) -> Result<String> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .generator
                .generate(context, question, model_hint)
                .await
                .and_then(|answer| {
                    if answer.trim().is_empty() {
                        Err(Error::Generation("generator returned an empty answer".to_string()))
                    } else {
                        Ok(answer)
                    }
                });

            match result {
                Ok(answer) => return Ok(answer),
                Err(e) if attempt < max_attempts && e.classify(Stage::Generating) == ErrorKind::Generation => {
                    warn!(attempt, max_attempts, error = %e, "generation failed, retrying");
                    tokio::time::sleep(self.config.retry.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
