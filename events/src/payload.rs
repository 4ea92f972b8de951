//! Wire payloads carried by the backend's channels.
//!
//! Every payload arrives as a JSON string. Parsing goes through `FromStr` so
//! a message is validated once, at the boundary, and the rest of the client
//! only sees the typed value.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Data of a `message` event on the employees stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeCreated {
    #[serde(rename = "employeeName")]
    pub employee_name: String,
}

/// Chat text, both published to `/app/messages` and received on `/topic/employees`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatText {
    pub text: String,
}

/// Data of a `counter` event on the counter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTick {
    #[serde(alias = "value")]
    pub counter: i64,
}

impl ChatText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn to_json(&self) -> String {
        // A struct with a single String field always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl FromStr for EmployeeCreated {
    type Err = serde_json::Error;
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data)
    }
}

impl FromStr for ChatText {
    type Err = serde_json::Error;
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data)
    }
}

impl FromStr for CounterTick {
    type Err = serde_json::Error;
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_created_reads_camel_case_name() {
        let payload: EmployeeCreated = r#"{"employeeName":"Bob"}"#.parse().unwrap();
        assert_eq!(payload.employee_name, "Bob");
    }

    #[test]
    fn test_employee_created_ignores_extra_fields() {
        let payload: EmployeeCreated = r#"{"id":7,"employeeName":"Bob"}"#.parse().unwrap();
        assert_eq!(payload.employee_name, "Bob");
    }

    #[test]
    fn test_employee_created_rejects_missing_or_mistyped_name() {
        assert!(r#"{"name":"Bob"}"#.parse::<EmployeeCreated>().is_err());
        assert!(r#"{"employeeName":42}"#.parse::<EmployeeCreated>().is_err());
        assert!("not json".parse::<EmployeeCreated>().is_err());
    }

    #[test]
    fn test_chat_text_serializes_to_text_object() {
        assert_eq!(ChatText::new("hi").to_json(), r#"{"text":"hi"}"#);
        assert_eq!(ChatText::new("").to_json(), r#"{"text":""}"#);
    }

    #[test]
    fn test_chat_text_rejects_non_string_text() {
        assert!(r#"{"text":null}"#.parse::<ChatText>().is_err());
        assert_eq!(
            r#"{"text":"hello"}"#.parse::<ChatText>().unwrap(),
            ChatText::new("hello")
        );
    }

    #[test]
    fn test_counter_tick_accepts_value_alias() {
        assert_eq!(
            r#"{"counter":3}"#.parse::<CounterTick>().unwrap(),
            CounterTick { counter: 3 }
        );
        assert_eq!(
            r#"{"value":4}"#.parse::<CounterTick>().unwrap(),
            CounterTick { counter: 4 }
        );
    }
}
