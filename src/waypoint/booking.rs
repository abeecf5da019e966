// SPDX-License-Identifier: MIT

//! Flight-booking workflow used by the CLI
//!
//! ```text
//! ai_greet -> greet -> ai_gather -+-> manual_gather -> find_flights -> end
//!                                 +-------------------^
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::context::NodeContext;
use super::error::GraphBuildError;
use super::graph::{DecisionFn, FunctionNode, Graph, GraphBuilder, Node, NodeResult, Noop};
use super::interrupt::{self, Requirement, Requirements};
use crate::adk::extract::{DataExtraction, DataType, Prompted};
use crate::adk::model::Model;

pub const FLOW_NAME: &str = "book_flights";

/// Everything known about the booking so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub prompt: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub flights: Vec<String>,
    /// Lines for the user, appended by the nodes
    #[serde(default)]
    pub messages: Vec<String>,
}

impl Booking {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

impl Prompted for Booking {
    fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Greets the user, asking for a name when extraction found none
pub struct Greet {
    greeting: String,
}

impl Greet {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }
}

#[async_trait]
impl Node<Booking> for Greet {
    async fn execute(&self, ctx: &NodeContext, mut state: Booking) -> NodeResult<Booking> {
        if state.name.is_empty() {
            let requirements = Requirements::new().with("name", Requirement::custom());
            let values = interrupt::request_with_validation(
                ctx,
                "Before we continue, may I know your name?",
                "name_not_found",
                requirements.clone(),
                |values| requirements.validate(values),
            )?;
            state.name = values.get("name").cloned().unwrap_or_default();
        }

        state
            .messages
            .push(format!("{}, {}!", self.greeting, state.name));
        Ok(state)
    }
}

/// Asks for whichever journey details extraction missed
pub struct ManualGather;

#[async_trait]
impl Node<Booking> for ManualGather {
    async fn execute(&self, ctx: &NodeContext, mut state: Booking) -> NodeResult<Booking> {
        let mut requirements = Requirements::new();
        if state.origin.is_empty() {
            requirements.insert("origin", Requirement::custom());
        }
        if state.destination.is_empty() {
            requirements.insert("destination", Requirement::custom());
        }
        if requirements.is_empty() {
            return Ok(state);
        }

        let values = interrupt::request_with_validation(
            ctx,
            "Please input your journey details",
            "journey_details_not_found",
            requirements.clone(),
            |values| requirements.validate(values),
        )?;

        if state.origin.is_empty() {
            state.origin = values.get("origin").cloned().unwrap_or_default();
        }
        if state.destination.is_empty() {
            state.destination = values.get("destination").cloned().unwrap_or_default();
        }
        Ok(state)
    }
}

/// Routing label after `ai_gather`
pub fn route_after_gather(state: &Booking) -> String {
    if state.origin.is_empty() || state.destination.is_empty() {
        "manual_gather".to_string()
    } else {
        "skip_manual_gather".to_string()
    }
}

fn extracted_string(values: &Map<String, Value>, key: &str) -> Option<String> {
    values
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn merge_name(mut state: Booking, values: &Map<String, Value>) -> Booking {
    if let Some(name) = extracted_string(values, "username") {
        state.name = name;
    }
    state
}

fn merge_route(mut state: Booking, values: &Map<String, Value>) -> Booking {
    if let Some(origin) = extracted_string(values, "origin") {
        state.origin = origin;
    }
    if let Some(destination) = extracted_string(values, "destination") {
        state.destination = destination;
    }
    state
}

/// Build the booking graph on top of `model`
pub fn booking_graph(model: Arc<dyn Model>, model_name: &str) -> Result<Graph<Booking>, GraphBuildError> {
    let ai_greet = DataExtraction::new(Arc::clone(&model), model_name, merge_name)
        .extract("username", DataType::String);
    let ai_gather = DataExtraction::new(model, model_name, merge_route)
        .extract("origin", DataType::String)
        .extract("destination", DataType::String);

    let find_flights = FunctionNode::new(|_ctx: NodeContext, mut state: Booking| async move {
        state.messages.push(format!(
            "Finding flights from {} to {}",
            state.origin, state.destination
        ));
        state.flights = Vec::new();
        state.messages.push("No flights found".to_string());
        Ok(state)
    });

    GraphBuilder::new()
        .add_node("ai_greet", ai_greet)
        .add_node("greet", Greet::new("Hola"))
        .add_node("ai_gather", ai_gather)
        .add_node("manual_gather", ManualGather)
        .add_node("find_flights", find_flights)
        .add_node("end", Noop)
        .add_edge("ai_greet", "greet")
        .add_edge("greet", "ai_gather")
        .add_conditional_edge(
            "ai_gather",
            DecisionFn::new(route_after_gather),
            [
                ("manual_gather", "manual_gather"),
                ("skip_manual_gather", "find_flights"),
            ],
        )
        .add_edge("manual_gather", "find_flights")
        .add_edge("find_flights", "end")
        .set_start("ai_greet")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ModelError;
    use crate::adk::model::{ChatRequest, ChatResponse, Choice, Message, Usage};
    use crate::waypoint::context::RunContext;
    use crate::waypoint::pipe::{Pipe, ResumeConfig};
    use crate::waypoint::store::InMemoryStore;
    use serde_json::json;

    // Answers each extraction with the fields it asks for, when known
    struct ScriptedModel {
        known: Map<String, Value>,
    }

    impl ScriptedModel {
        fn knowing(pairs: &[(&str, &str)]) -> Arc<dyn Model> {
            let known = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            Arc::new(Self { known })
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn generate_content(&self, request: &ChatRequest) -> Result<ChatResponse, ModelError> {
            let asked = request
                .format
                .as_ref()
                .and_then(|f| f["properties"].as_object())
                .cloned()
                .unwrap_or_default();
            let reply: Map<String, Value> = asked
                .keys()
                .map(|k| (k.clone(), self.known.get(k).cloned().unwrap_or(json!(""))))
                .collect();

            Ok(ChatResponse {
                model: request.model.clone(),
                created: 0,
                choices: vec![Choice {
                    index: 0,
                    message: Message::new("assistant", Value::Object(reply).to_string()),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn pipe(model: Arc<dyn Model>) -> Pipe<Booking> {
        let graph = booking_graph(model, "test-model").unwrap();
        Pipe::new(FLOW_NAME, graph, Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn test_route_after_gather() {
        let mut state = Booking::new("p");
        assert_eq!(route_after_gather(&state), "manual_gather");
        state.origin = "Paris".to_string();
        state.destination = "Rome".to_string();
        assert_eq!(route_after_gather(&state), "skip_manual_gather");
    }

    #[tokio::test]
    async fn test_complete_prompt_runs_straight_through() {
        let model = ScriptedModel::knowing(&[
            ("username", "Ada"),
            ("origin", "Paris"),
            ("destination", "Rome"),
        ]);
        let outcome = pipe(model)
            .invoke(&RunContext::new(), "t1", Booking::new("I'm Ada, Paris to Rome"))
            .await
            .unwrap();

        assert!(outcome.is_completed());
        let state = outcome.state();
        assert_eq!(state.name, "Ada");
        assert_eq!(state.origin, "Paris");
        assert!(state.flights.is_empty());
        assert_eq!(state.messages[0], "Hola, Ada!");
    }

    #[tokio::test]
    async fn test_missing_details_are_asked_for() {
        let model = ScriptedModel::knowing(&[("origin", "Paris")]);
        let pipe = pipe(model);
        let ctx = RunContext::new();

        let outcome = pipe
            .invoke(&ctx, "t2", Booking::new("from Paris"))
            .await
            .unwrap();
        let interrupt = outcome.interrupt().unwrap();
        assert_eq!(interrupt.reason, "name_not_found");
        assert_eq!(interrupt.interrupt_id.node_id, "greet");

        let outcome = pipe
            .resume(&ctx, "t2", ResumeConfig::default().with("name", "Ada"))
            .await
            .unwrap();
        let interrupt = outcome.interrupt().unwrap();
        assert_eq!(interrupt.reason, "journey_details_not_found");
        assert_eq!(interrupt.requirements.keys().collect::<Vec<_>>(), vec!["destination"]);

        let outcome = pipe
            .resume(&ctx, "t2", ResumeConfig::default().with("destination", "Rome"))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.state().destination, "Rome");

        let stored = pipe.state("t2").await.unwrap().unwrap();
        assert_eq!(
            stored.checkpoint_state.visited,
            vec![
                "ai_greet",
                "greet",
                "greet",
                "ai_gather",
                "manual_gather",
                "manual_gather",
                "find_flights",
                "end"
            ]
        );
        assert_eq!(stored.checkpoint_state.interrupt_history.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_name_is_reasked_with_validation_error() {
        let pipe = pipe(ScriptedModel::knowing(&[]));
        let ctx = RunContext::new();
        let first = pipe.invoke(&ctx, "t3", Booking::new("hi")).await.unwrap();
        let first_id = first.interrupt().unwrap().interrupt_id.clone();

        let outcome = pipe
            .resume(&ctx, "t3", ResumeConfig::default().with("name", ""))
            .await
            .unwrap();
        let again = outcome.interrupt().unwrap();
        assert_eq!(again.interrupt_id, first_id);
        assert_eq!(
            again.validation_error.as_deref(),
            Some("requirement key 'name' not found")
        );
    }
}
