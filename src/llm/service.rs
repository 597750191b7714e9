use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::error::LlmError;
use super::gateway::{ChatProvider, GatewayClient};
use super::types::{Completion, CompletionRequest};
use crate::core::config::{defaults, LlmConfig};

/// Chat completion with a single alternate-credential retry on rate limit.
#[derive(Clone)]
pub struct LlmService {
    providers: Vec<Arc<dyn ChatProvider>>,
    attempt_timeout: Duration,
}

impl LlmService {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self {
            providers,
            attempt_timeout: Duration::from_secs(defaults::llm_timeout_secs()),
        }
    }

    /// Deadline for each single provider call.
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let providers = GatewayClient::from_config(config)?
            .into_iter()
            .map(|client| Arc::new(client) as Arc<dyn ChatProvider>)
            .collect::<Vec<_>>();

        if providers.is_empty() {
            tracing::warn!("No LLM API key configured; every chat will use canned answers");
        }

        Ok(Self::new(providers)
            .with_attempt_timeout(Duration::from_secs(config.timeout_secs.max(1))))
    }

    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Longest time [`complete`](Self::complete) can take: the primary
    /// attempt plus at most one alternate attempt.
    pub fn max_duration(&self) -> Duration {
        let attempts = self.providers.len().clamp(1, 2) as u32;
        self.attempt_timeout * attempts
    }

    async fn attempt(
        &self,
        provider: &Arc<dyn ChatProvider>,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError> {
        timeout(self.attempt_timeout, provider.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(self.attempt_timeout))?
    }

    /// Runs the request on the primary credential.
    ///
    /// A rate-limited primary is retried once on the alternate credential,
    /// if one exists. Payment-required and transport failures are final.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let Some(primary) = self.providers.first() else {
            return Err(LlmError::NoCredentials);
        };

        let first = self.attempt(primary, request).await?;
        if first != Completion::RateLimited {
            return Ok(first);
        }

        let Some(alternate) = self.providers.get(1) else {
            tracing::warn!("{} rate limited and no alternate key is configured", primary.name());
            return Ok(Completion::RateLimited);
        };

        tracing::info!("{} rate limited, retrying on {}", primary.name(), alternate.name());
        match self.attempt(alternate, request).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!("Alternate key failed after rate limit: {}", err);
                Ok(Completion::RateLimited)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct ScriptedProvider {
        name: String,
        outcomes: Mutex<Vec<Result<Completion, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &str, outcomes: Vec<Result<Completion, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    /// Sleeps before answering, to exercise the per-attempt deadline.
    struct SlowProvider {
        delay: Duration,
        outcome: Completion,
    }

    impl SlowProvider {
        fn new(delay_secs: u64, outcome: Completion) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_secs(delay_secs),
                outcome,
            })
        }
    }

    #[async_trait]
    impl ChatProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.outcome.clone())
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("rules", "Mikor kezdődik?")
    }

    #[tokio::test]
    async fn rate_limit_retries_once_on_alternate() {
        let primary = ScriptedProvider::new("primary", vec![Ok(Completion::RateLimited)]);
        let alternate =
            ScriptedProvider::new("alternate", vec![Ok(Completion::Text("9:00".to_string()))]);
        let service = LlmService::new(vec![primary.clone(), alternate.clone()]);

        let outcome = service.complete(&request()).await.unwrap();

        assert_eq!(outcome, Completion::Text("9:00".to_string()));
        assert_eq!(primary.calls(), 1);
        assert_eq!(alternate.calls(), 1);
    }

    #[tokio::test]
    async fn payment_required_is_not_retried() {
        let primary = ScriptedProvider::new("primary", vec![Ok(Completion::PaymentRequired)]);
        let alternate = ScriptedProvider::new("alternate", vec![]);
        let service = LlmService::new(vec![primary.clone(), alternate.clone()]);

        let outcome = service.complete(&request()).await.unwrap();

        assert_eq!(outcome, Completion::PaymentRequired);
        assert_eq!(alternate.calls(), 0);
    }

    #[tokio::test]
    async fn rate_limit_without_alternate_is_reported() {
        let primary = ScriptedProvider::new("primary", vec![Ok(Completion::RateLimited)]);
        let service = LlmService::new(vec![primary]);

        assert_eq!(
            service.complete(&request()).await.unwrap(),
            Completion::RateLimited
        );
    }

    #[tokio::test]
    async fn alternate_rate_limit_is_final() {
        let primary = ScriptedProvider::new("primary", vec![Ok(Completion::RateLimited)]);
        let alternate = ScriptedProvider::new("alternate", vec![Ok(Completion::RateLimited)]);
        let third = ScriptedProvider::new("third", vec![]);
        let service = LlmService::new(vec![primary, alternate, third.clone()]);

        assert_eq!(
            service.complete(&request()).await.unwrap(),
            Completion::RateLimited
        );
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let primary = ScriptedProvider::new("primary", vec![Err(LlmError::Empty)]);
        let alternate = ScriptedProvider::new("alternate", vec![]);
        let service = LlmService::new(vec![primary, alternate.clone()]);

        assert!(service.complete(&request()).await.is_err());
        assert_eq!(alternate.calls(), 0);
    }

    #[tokio::test]
    async fn no_providers_is_an_error() {
        let service = LlmService::new(Vec::new());
        assert!(matches!(
            service.complete(&request()).await,
            Err(LlmError::NoCredentials)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_alternate_after_rate_limit_is_reported_as_rate_limited() {
        let primary = SlowProvider::new(20, Completion::RateLimited);
        let alternate = SlowProvider::new(60, Completion::Text("késő".to_string()));
        let service = LlmService::new(vec![primary, alternate])
            .with_attempt_timeout(Duration::from_secs(30));

        let outcome = service.complete(&request()).await.unwrap();

        assert_eq!(outcome, Completion::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_primary_times_out() {
        let primary = SlowProvider::new(60, Completion::Text("késő".to_string()));
        let service =
            LlmService::new(vec![primary]).with_attempt_timeout(Duration::from_secs(30));

        assert!(matches!(
            service.complete(&request()).await,
            Err(LlmError::Timeout(_))
        ));
    }

    #[test]
    fn max_duration_covers_primary_and_one_alternate() {
        let attempt = Duration::from_secs(30);
        let one = LlmService::new(vec![SlowProvider::new(0, Completion::RateLimited)])
            .with_attempt_timeout(attempt);
        let three = LlmService::new(vec![
            SlowProvider::new(0, Completion::RateLimited),
            SlowProvider::new(0, Completion::RateLimited),
            SlowProvider::new(0, Completion::RateLimited),
        ])
        .with_attempt_timeout(attempt);

        assert_eq!(one.max_duration(), attempt);
        assert_eq!(three.max_duration(), attempt * 2);
    }
}
