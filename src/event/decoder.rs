use super::{CompletionPayload, OrchestrationResponse, StreamEvent};
use crate::error::DecodeError;
use serde_json::{Map, Value};

/// Decodes raw stream payloads into `StreamEvent`s.
///
/// Decoding is pure; the decoder holds no state between messages.
pub struct EventDecoder;

impl EventDecoder {
    /// Decodes one message payload (the `data` of one server-sent event).
    ///
    /// Unknown event kinds decode to `StreamEvent::Unrecognized`. Only payloads that are not
    /// JSON objects with an `event` string, or lifecycle events missing the fields they need,
    /// produce a `DecodeError`.
    pub fn decode(raw: &str) -> Result<StreamEvent, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson {
            raw: raw.to_string(),
            message: e.to_string(),
        })?;

        let Value::Object(fields) = value else {
            return Err(DecodeError::MissingEvent {
                raw: raw.to_string(),
            });
        };

        let event = fields
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingEvent {
                raw: raw.to_string(),
            })?
            .to_string();

        let decoded = match event.as_str() {
            "workflow_start" => StreamEvent::WorkflowStart {
                message: optional_text(&fields, "message"),
            },
            "step_start" => StreamEvent::StepStart {
                step: required_text(&fields, &event, "step", raw)?,
                message: optional_text(&fields, "message"),
            },
            "progress" => StreamEvent::Progress {
                step: optional_text(&fields, "step"),
                progress: fields
                    .get("progress")
                    .and_then(percent)
                    .ok_or_else(|| missing_field(&event, "progress", raw))?,
                message: optional_text(&fields, "message"),
            },
            "step_complete" => StreamEvent::StepComplete {
                step: required_text(&fields, &event, "step", raw)?,
                result: fields.get("result").cloned(),
            },
            "workflow_complete" => StreamEvent::WorkflowComplete {
                payload: fields
                    .get("auto_orchestrate_response")
                    .filter(|v| v.is_object())
                    .map(|raw_response| CompletionPayload {
                        raw: raw_response.clone(),
                        response: OrchestrationResponse::from_value(raw_response),
                    }),
            },
            _ => StreamEvent::Unrecognized {
                event: event.clone(),
                payload: Value::Object(fields),
            },
        };

        Ok(decoded)
    }
}

fn optional_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Numbers pass through as-is; numeric strings such as `"45"` are parsed.
fn percent(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|p| p.is_finite())
}

fn required_text(
    fields: &Map<String, Value>,
    event: &str,
    key: &str,
    raw: &str,
) -> Result<String, DecodeError> {
    optional_text(fields, key).ok_or_else(|| missing_field(event, key, raw))
}

fn missing_field(event: &str, field: &str, raw: &str) -> DecodeError {
    DecodeError::MissingField {
        event: event.to_string(),
        field: field.to_string(),
        raw: raw.to_string(),
    }
}
