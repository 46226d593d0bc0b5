//! The `{ success, data, message }` wrapper every REST response follows, and
//! the mapping between wire records and [`Todo`].

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::todo::Todo;
use crate::error::{Result, TodoError};

/// Sent with every create. The client never reads it back.
pub const DEFAULT_PRIORITY: &str = "medium";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| TodoError::Malformed(e.to_string()))
    }

    fn into_failure(self) -> TodoError {
        TodoError::Application(
            self.message
                .unwrap_or_else(|| "backend reported failure".to_string()),
        )
    }
}

/// A record as the backend sends it. Different backends name the same
/// fields differently (`_id`/`id`, `title`/`text`).
#[derive(Debug, Deserialize)]
struct WireTodo {
    #[serde(rename = "_id", default)]
    object_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "createdAt", default)]
    created_at: Option<Value>,
}

impl WireTodo {
    fn into_todo(self, now: DateTime<Utc>) -> Option<Todo> {
        let id = id_string(self.object_id).or_else(|| id_string(self.id))?;
        let text = self
            .title
            .filter(|t| !t.is_empty())
            .or(self.text)
            .unwrap_or_default();
        let created_at = self
            .created_at
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(now);
        Some(Todo::new(id, text, created_at))
    }
}

fn id_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Zone-less formats SQL backends tend to send. Read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// RFC 3339 strings, naive `YYYY-MM-DD HH:MM:SS` datetimes, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NAIVE_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Decode a list response. Anything other than `success: true` with an
/// array in `data` is an error; the caller keeps its previous list.
pub fn parse_list(body: &str) -> Result<Vec<Todo>> {
    let envelope = Envelope::parse(body)?;
    if !envelope.success {
        return Err(envelope.into_failure());
    }
    let items = match envelope.data {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(TodoError::Malformed(format!(
                "expected data to be an array, got {}",
                json_kind(&other)
            )));
        }
        None => return Err(TodoError::Malformed("response has no data".into())),
    };

    let now = Utc::now();
    let todos = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WireTodo>(item) {
            Ok(wire) => {
                let todo = wire.into_todo(now);
                if todo.is_none() {
                    log::debug!("Skipping record without an id");
                }
                todo
            }
            Err(e) => {
                log::debug!("Skipping unparseable record: {}", e);
                None
            }
        })
        .collect();
    Ok(todos)
}

/// Decode the response to a write. Only `success` matters.
pub fn parse_ack(body: &str) -> Result<()> {
    let envelope = Envelope::parse(body)?;
    if envelope.success {
        Ok(())
    } else {
        Err(envelope.into_failure())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Serialize)]
pub struct CreatePayload<'a> {
    pub title: &'a str,
    pub priority: &'static str,
}

impl<'a> CreatePayload<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            title,
            priority: DEFAULT_PRIORITY,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdatePayload<'a> {
    pub title: &'a str,
}
