//! Reading events from JSON input.

use crate::error::{Error, Result};
use datastore::Event;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Events read from the command line: one object or an array of them.
#[derive(Debug, PartialEq)]
pub enum Batch {
    One(Event),
    Many(Vec<Event>),
}

impl Batch {
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(Batch::One(serde_json::from_value(value)?)),
            Value::Array(_) => Ok(Batch::Many(serde_json::from_value(value)?)),
            other => Err(Error::UnexpectedInput(json_kind(&other))),
        }
    }

    /// The single event of a batch, rejecting arrays.
    pub fn into_single(self) -> Result<Event> {
        match self {
            Batch::One(event) => Ok(event),
            Batch::Many(_) => Err(Error::UnexpectedInput("an array")),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::One(_) => 1,
            Batch::Many(events) => events.len(),
        }
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

/// Read JSON from `path`, or from stdin when no path is given.
pub fn read_json(path: Option<&Path>) -> Result<Value> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            content
        }
    };
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_event(app: &str) -> Value {
        json!({"timestamp": "2024-03-01T12:00:00Z", "duration": 2.0, "data": {"app": app}})
    }

    #[test]
    fn object_is_one_event() {
        let batch = Batch::from_json(raw_event("x")).unwrap();
        assert_eq!(batch.len(), 1);
        let event = batch.into_single().unwrap();
        assert_eq!(event.data["app"], "x");
    }

    #[test]
    fn array_is_many_events() {
        let batch = Batch::from_json(json!([raw_event("x"), raw_event("y")])).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.into_single(), Err(Error::UnexpectedInput(_))));
    }

    #[test]
    fn scalars_are_rejected() {
        let err = Batch::from_json(json!("hello")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected a JSON object or an array of objects, got a string"
        );
    }

    #[test]
    fn malformed_event_is_a_json_error() {
        let err = Batch::from_json(json!({"duration": 1})).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
