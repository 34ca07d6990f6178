//! Canned descriptor for tests.

use async_trait::async_trait;
use serde_json::Value;

use super::Descriptor;

pub struct MockDescriber {
    response: Value,
    fail: bool,
}

impl MockDescriber {
    pub fn with_response(response: Value) -> Self {
        Self {
            response,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: Value::Null,
            fail: true,
        }
    }
}

#[async_trait]
impl Descriptor for MockDescriber {
    async fn describe(&self, _jpeg: &[u8]) -> anyhow::Result<Value> {
        if self.fail {
            anyhow::bail!("describe unavailable");
        }
        Ok(self.response.clone())
    }
}
