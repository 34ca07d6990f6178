//! Scripted labeler for tests and model-free deployments.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use common::analysis::FrameAnalysis;

use super::FrameLabeler;

pub enum ScriptedResponse {
    Analysis(FrameAnalysis),
    Error(String),
}

/// Returns scripted responses in order, then empty analyses once the
/// script runs out.
pub struct MockFrameLabeler {
    script: Mutex<VecDeque<ScriptedResponse>>,
}

impl MockFrameLabeler {
    pub fn empty() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_script(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl FrameLabeler for MockFrameLabeler {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn label(&self, _jpeg: &[u8]) -> anyhow::Result<FrameAnalysis> {
        let next = self
            .script
            .lock()
            .map_err(|e| anyhow::anyhow!("failed to lock script: {e}"))?
            .pop_front();

        match next {
            Some(ScriptedResponse::Analysis(analysis)) => Ok(analysis),
            Some(ScriptedResponse::Error(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(FrameAnalysis::default()),
        }
    }
}
