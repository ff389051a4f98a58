//! In-memory gateway for command tests.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::client::{ClientError, Gateway, SetValue};

/// Serves values from a map and records every call.
#[derive(Default)]
pub struct FakeGateway {
    pub values: HashMap<String, Value>,
    pub gets: Vec<String>,
    /// Every attempted set as `(xpath, rendered value)`, failed ones included.
    pub sets: Vec<(String, String)>,
    pub fail_set: HashSet<String>,
}

impl FakeGateway {
    pub fn with(mut self, xpath: &str, value: Value) -> Self {
        self.values.insert(xpath.to_string(), value);
        self
    }
}

impl Gateway for FakeGateway {
    async fn get_value(&mut self, xpath: &str) -> Result<Value, ClientError> {
        self.gets.push(xpath.to_string());
        self.values
            .get(xpath)
            .cloned()
            .ok_or_else(|| ClientError::UnknownPath(xpath.to_string()))
    }

    async fn set_value(&mut self, xpath: &str, value: SetValue) -> Result<(), ClientError> {
        self.sets.push((xpath.to_string(), value.to_string()));
        if self.fail_set.contains(xpath) {
            return Err(ClientError::NonWritableParameter(xpath.to_string()));
        }
        Ok(())
    }
}
