// SPDX-License-Identifier: MIT

//! LLM-backed data extraction node
//!
//! Asks a chat model to pull named fields out of the state's free-text prompt
//! and merges the returned JSON object back into the state.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::adk::error::ModelError;
use crate::adk::model::{ChatRequest, Message, Model};
use crate::waypoint::context::NodeContext;
use crate::waypoint::error::NodeError;
use crate::waypoint::graph::{Node, NodeResult};

const DEFAULT_SYSTEM_PROMPT: &str = "ABSOLUTELY NO MARKDOWN SYNTAX.
IF REQUIRED DATA IS NOT AVAILABLE IN THE HUMAN PROMPT, ALWAYS RETURN A EMPTY STRING AGAINST THAT FIELD.
For the given human prompt, your job is to understand the context
and extract the required data in single line raw JSON.";

/// States that carry a free-text prompt for the model
pub trait Prompted {
    fn prompt(&self) -> &str;
}

/// JSON type of an extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    String,
    Boolean,
    Array,
    Object,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Array => "array",
            DataType::Object => "object",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds extracted values into the state
pub type MergeFn<S> = Arc<dyn Fn(S, &Map<String, Value>) -> S + Send + Sync>;

/// Node that extracts fields from `state.prompt()` with a chat model.
///
/// ```ignore
/// let node = DataExtraction::new(model, "llama3.2", json_merge::<Trip>)
///     .extract("origin", DataType::String)
///     .extract("destination", DataType::String);
/// ```
pub struct DataExtraction<S> {
    model: Arc<dyn Model>,
    model_name: String,
    system_prompt: String,
    fields: BTreeMap<String, DataType>,
    merge: MergeFn<S>,
}

impl<S> DataExtraction<S> {
    pub fn new<F>(model: Arc<dyn Model>, model_name: impl Into<String>, merge: F) -> Self
    where
        F: Fn(S, &Map<String, Value>) -> S + Send + Sync + 'static,
    {
        Self {
            model,
            model_name: model_name.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fields: BTreeMap::new(),
            merge: Arc::new(merge),
        }
    }

    /// Request a field. Requesting the same name again replaces its type.
    pub fn extract(mut self, field: impl Into<String>, data_type: DataType) -> Self {
        self.fields.insert(field.into(), data_type);
        self
    }

    /// Replace the instruction header placed before the field list
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, DataType> {
        &self.fields
    }

    fn system_message(&self) -> String {
        let mut prompt = format!("{}\nFollowing Fields are needed:\n", self.system_prompt);
        for (name, data_type) in &self.fields {
            let _ = writeln!(prompt, " - {}: {}", name, data_type);
        }
        prompt
    }

    /// JSON schema for the reply. Every requested field is required.
    fn format_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, data_type)| (name.clone(), json!({ "type": data_type })))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.fields.keys().collect::<Vec<_>>(),
        })
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        let mut request = ChatRequest::new(
            self.model_name.as_str(),
            vec![Message::system(self.system_message()), Message::user(prompt)],
        );
        request.format = Some(self.format_schema());
        request
    }
}

#[async_trait]
impl<S> Node<S> for DataExtraction<S>
where
    S: Prompted + Send + Sync + 'static,
{
    async fn execute(&self, ctx: &NodeContext, state: S) -> NodeResult<S> {
        let request = self.request(state.prompt());

        let response = tokio::select! {
            biased;
            _ = ctx.run().cancellation().cancelled() => {
                return Err(NodeError::failed("extraction cancelled"));
            }
            response = self.model.generate_content(&request) => response.map_err(NodeError::failed)?,
        };

        let choice = response
            .choices
            .first()
            .ok_or_else(|| NodeError::failed(ModelError::invalid_response("no choices in model response")))?;

        let values: Map<String, Value> =
            serde_json::from_str(&choice.message.content).map_err(|e| NodeError::failed(ModelError::Json(e)))?;
        log::debug!(
            "Extracted {} field(s) for node {}",
            values.len(),
            ctx.node_id().unwrap_or_default()
        );

        Ok((self.merge)(state, &values))
    }
}

/// Overlay extracted keys on the state's JSON form.
///
/// Returns the state unchanged if the merged object no longer deserializes.
pub fn json_merge<S>(state: S, values: &Map<String, Value>) -> S
where
    S: Serialize + DeserializeOwned,
{
    let mut current = match serde_json::to_value(&state) {
        Ok(Value::Object(map)) => map,
        _ => return state,
    };
    for (key, value) in values {
        current.insert(key.clone(), value.clone());
    }

    match serde_json::from_value(Value::Object(current)) {
        Ok(merged) => merged,
        Err(e) => {
            log::warn!("Extracted values do not fit the state, ignoring: {}", e);
            state
        }
    }
}
