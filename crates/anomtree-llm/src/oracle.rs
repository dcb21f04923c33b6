//! The oracle: prompts in, validated replies out.

use crate::backend::{LlmBackend, LlmError, LlmResult};
use crate::prompt::{AdditionPrompt, PromptTemplate, RoutePrompt, SplitPrompt, TemplatePrompt};
use crate::reply::{parse_reply, ProtocolError};
use crate::types::{AdditionReply, OracleReply, QueryKind, RouteReply, SplitReply};
use anomtree_core::record::Record;
use anomtree_core::tree::RootView;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Asks a backend the four taxonomy questions.
///
/// Every call is bounded by a timeout. Expiry is reported as
/// [`LlmError::Timeout`] and is never mistaken for a negative answer.
#[derive(Clone)]
pub struct Oracle {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
}

impl Oracle {
    /// Wrap a backend, using its configured timeout.
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        let timeout = Duration::from_secs(u64::from(backend.config().timeout_secs.max(1)));
        Self { backend, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Model the backend is configured for.
    pub fn model(&self) -> &str {
        &self.backend.config().model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a prompt and parse the reply as `kind`.
    pub async fn query(
        &self,
        kind: QueryKind,
        prompt: &(dyn PromptTemplate + Sync),
    ) -> LlmResult<OracleReply> {
        let text = prompt.generate();
        let system = prompt.system_prompt();
        debug!(%kind, backend = self.backend.name(), "querying oracle");

        let call = self.backend.complete_with_system(&text, system.as_deref());
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                let secs = u32::try_from(self.timeout.as_secs()).unwrap_or(u32::MAX);
                warn!(%kind, secs, "oracle call timed out");
                return Err(LlmError::Timeout(secs));
            }
        };

        debug!(%kind, reply = %raw, "oracle replied");
        let reply = parse_reply(kind, &raw)?;
        Ok(reply)
    }

    /// One-sentence template for a record.
    pub async fn extract_template(&self, record: &Record) -> LlmResult<String> {
        match self.query(QueryKind::Template, &TemplatePrompt::new(record.clone())).await? {
            OracleReply::Template(reply) => Ok(reply.template),
            other => Err(unexpected(QueryKind::Template, &other)),
        }
    }

    /// Where `template` belongs in the tree shown by `view`.
    pub async fn select_route(&self, view: &RootView, template: &str) -> LlmResult<RouteReply> {
        match self.query(QueryKind::Route, &RoutePrompt::new(view.clone(), template)).await? {
            OracleReply::Route(reply) => Ok(reply),
            other => Err(unexpected(QueryKind::Route, &other)),
        }
    }

    /// A new branch for a template that has no home.
    pub async fn propose_addition(&self, view: &RootView, template: &str) -> LlmResult<AdditionReply> {
        match self
            .query(QueryKind::Addition, &AdditionPrompt::new(view.clone(), template))
            .await?
        {
            OracleReply::Addition(reply) => Ok(reply),
            other => Err(unexpected(QueryKind::Addition, &other)),
        }
    }

    /// Whether `leaf` should split given its templates and a newcomer.
    pub async fn decide_split(
        &self,
        leaf: &str,
        existing: &[String],
        incoming: &str,
    ) -> LlmResult<SplitReply> {
        let prompt = SplitPrompt::new(leaf, existing.to_vec(), incoming);
        match self.query(QueryKind::Split, &prompt).await? {
            OracleReply::Split(reply) => Ok(reply),
            other => Err(unexpected(QueryKind::Split, &other)),
        }
    }
}

fn unexpected(expected: QueryKind, got: &OracleReply) -> LlmError {
    ProtocolError::UnexpectedReply {
        expected,
        got: got.kind(),
    }
    .into()
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
