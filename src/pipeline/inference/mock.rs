use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::types::LlmClient;
use super::InferenceError;

/// Test double: answers from a script, then repeats the fallback. Counts calls.
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    fallback: String,
    calls: AtomicUsize,
    payloads: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: response.to_string(),
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue an answer that is returned before the fallback.
    pub fn then(self, answer: Result<String, InferenceError>) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_payload: &str,
        _model: &str,
    ) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(user_payload.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_answers_come_first() {
        let llm = MockLlmClient::new("fallback")
            .then(Err(InferenceError::Network("reset".into())))
            .then(Ok("second".into()));

        assert!(llm.complete("s", "a", "m").await.is_err());
        assert_eq!(llm.complete("s", "b", "m").await.unwrap(), "second");
        assert_eq!(llm.complete("s", "c", "m").await.unwrap(), "fallback");
        assert_eq!(llm.calls(), 3);
        assert_eq!(llm.payloads(), vec!["a", "b", "c"]);
    }
}
