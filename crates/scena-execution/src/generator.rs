//! Cards generator seam for the closed loop.
//!
//! The optimizer side produces a cards document from stage definitions
//! and a script. Some backends keep mutable generation state, so the
//! adapter below serializes every call through one async mutex.

use async_trait::async_trait;
use scena_core::Result;
use tokio::sync::Mutex;

/// Produces a cards document from stage definitions and a raw script.
#[async_trait]
pub trait CardsGenerator: Send + Sync {
    async fn generate(&self, stages: &str, script: &str) -> Result<String>;
}

/// Wrapper that grants the inner generator exclusive use: concurrent
/// callers queue on one mutex, so configure-then-invoke backends never
/// interleave.
pub struct ExclusiveGenerator<G> {
    inner: G,
    gate: Mutex<()>,
}

impl<G: CardsGenerator> ExclusiveGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

#[async_trait]
impl<G: CardsGenerator> CardsGenerator for ExclusiveGenerator<G> {
    async fn generate(&self, stages: &str, script: &str) -> Result<String> {
        let _guard = self.gate.lock().await;
        self.inner.generate(stages, script).await
    }
}
