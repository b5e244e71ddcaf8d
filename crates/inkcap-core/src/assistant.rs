use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteAnalysis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug)]
pub enum AssistantError {
    Http(Box<ureq::Error>),
    Io(std::io::Error),
}

impl From<ureq::Error> for AssistantError {
    fn from(err: ureq::Error) -> Self {
        Self::Http(Box::new(err))
    }
}

impl From<std::io::Error> for AssistantError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

// Opaque async collaborator, seen from the core as two blocking calls. The
// vault applies results atomically and never merges a failed call.
pub trait Assistant {
    fn analyze(
        &self,
        content: &str,
        note_names: &[String],
        known_tags: &[String],
    ) -> Result<NoteAnalysis, AssistantError>;

    fn chat(
        &self,
        context: &str,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, AssistantError>;
}

pub struct HttpAssistant {
    endpoint: String,
    api_key: String,
    retries: u32,
    backoff: Duration,
}

impl HttpAssistant {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            retries: 3,
            backoff: Duration::from_millis(2000),
        }
    }

    fn post(&self, body: Value) -> Result<Value, AssistantError> {
        let mut delay = self.backoff;
        let mut attempts = self.retries;
        loop {
            let result = ureq::post(&self.endpoint)
                .set("x-api-key", &self.api_key)
                .send_json(body.clone());
            match result {
                Ok(response) => return Ok(response.into_json::<Value>()?),
                Err(ureq::Error::Status(429, _)) if attempts > 0 => {
                    tracing::warn!("assistant rate limited, retrying in {delay:?}");
                    thread::sleep(delay);
                    delay *= 2;
                    attempts -= 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Assistant for HttpAssistant {
    fn analyze(
        &self,
        content: &str,
        note_names: &[String],
        known_tags: &[String],
    ) -> Result<NoteAnalysis, AssistantError> {
        let body = json!({
            "task": "analyze",
            "content": content,
            "noteNames": note_names,
            "knownTags": known_tags,
        });
        Ok(parse_analysis(self.post(body)?))
    }

    fn chat(
        &self,
        context: &str,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, AssistantError> {
        let body = json!({
            "task": "chat",
            "context": context,
            "message": message,
            "history": history,
        });
        let reply = self.post(body)?;
        Ok(reply
            .get("reply")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

// A malformed analysis body degrades to an empty result instead of failing
// the whole smart save.
pub fn parse_analysis(value: Value) -> NoteAnalysis {
    serde_json::from_value(value).unwrap_or_default()
}
