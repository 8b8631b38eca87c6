//! Mock generation backend for testing.
//!
//! Configurable to return queued responses, inject errors mid-stream or
//! up front, simulate latency, and record calls for verification. Tests
//! run against the same `GenerationBackend` surface as real vendors.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time::sleep;

use crate::ports::{
    FinishReason, GenerationBackend, GenerationChunk, GenerationError, GenerationRequest,
    GenerationStream,
};

/// A configured mock outcome, consumed in order.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Stream the given chunks, then a final chunk.
    Success {
        chunks: Vec<String>,
        finish_reason: FinishReason,
    },
    /// Fail before any chunk is produced.
    Error(GenerationError),
    /// Stream some chunks, then fail mid-stream.
    PartialThenError {
        chunks: Vec<String>,
        error: GenerationError,
    },
}

impl MockResponse {
    /// A successful streamed response from the given chunks.
    pub fn success<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Success {
            chunks: chunks.into_iter().map(Into::into).collect(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// A response that fails before streaming starts.
    pub fn error(error: GenerationError) -> Self {
        Self::Error(error)
    }

    /// A response that streams some chunks, then fails.
    pub fn partial_then_error<I, S>(chunks: I, error: GenerationError) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PartialThenError {
            chunks: chunks.into_iter().map(Into::into).collect(),
            error,
        }
    }
}

/// Mock generation backend.
#[derive(Debug, Clone)]
pub struct MockBackend {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    probe_error: Arc<Mutex<Option<GenerationError>>>,
    models: Vec<String>,
    delay: Duration,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockBackend {
    /// Creates a mock with no queued responses.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            probe_error: Arc::new(Mutex::new(None)),
            models: vec!["mock-model-1".to_string()],
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a response.
    pub fn with_response(self, response: MockResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Makes `probe` fail with the given error.
    pub fn with_probe_error(self, error: GenerationError) -> Self {
        *self.probe_error.lock().unwrap() = Some(error);
        self
    }

    /// Sets the model names `probe` advertises.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Sets simulated latency per chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns all recorded generation requests.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the number of generation calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::success(["Mock", " response"]))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError> {
        self.calls.lock().unwrap().push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let delay = self.delay;
        match self.next_response() {
            MockResponse::Success {
                chunks,
                finish_reason,
            } => Ok(chunk_stream(chunks, Some(finish_reason), None, delay)),
            MockResponse::Error(error) => Err(error),
            MockResponse::PartialThenError { chunks, error } => {
                Ok(chunk_stream(chunks, None, Some(error), delay))
            }
        }
    }

    async fn probe(&self) -> Result<Vec<String>, GenerationError> {
        if let Some(error) = self.probe_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.models.clone())
    }
}

fn chunk_stream(
    chunks: Vec<String>,
    finish_reason: Option<FinishReason>,
    trailing_error: Option<GenerationError>,
    delay: Duration,
) -> GenerationStream {
    let items: Vec<Result<GenerationChunk, GenerationError>> = chunks
        .into_iter()
        .map(|c| Ok(GenerationChunk::content(c)))
        .chain(finish_reason.map(|r| Ok(GenerationChunk::final_chunk(r))))
        .chain(trailing_error.map(Err))
        .collect();

    if delay.is_zero() {
        return Box::pin(stream::iter(items));
    }
    Box::pin(stream::iter(items).then(move |item| async move {
        sleep(delay).await;
        item
    }))
}
