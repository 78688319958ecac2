//! Domain events broadcast on the dashboard event feed
//!
//! `type` is an open set. Known types are routed to a category; unknown
//! types are still delivered to catch-all subscribers, so new server-side
//! event types need no client change.

use serde::{Deserialize, Serialize};

/// One event from the domain event feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl DomainEvent {
    /// Category this event routes to, if its type is known
    pub fn category(&self) -> Option<EventCategory> {
        EventCategory::for_event_type(&self.event_type)
    }
}

/// Typed routing categories for domain events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    AgentLifecycle,
    PlanLifecycle,
    StepUpdate,
    WorkspaceLifecycle,
}

impl EventCategory {
    pub const ALL: [EventCategory; 4] = [
        EventCategory::AgentLifecycle,
        EventCategory::PlanLifecycle,
        EventCategory::StepUpdate,
        EventCategory::WorkspaceLifecycle,
    ];

    /// Fixed type -> category mapping
    pub fn for_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "agent_session_started"
            | "agent_session_completed"
            | "agent_handoff"
            | "handoff_started"
            | "handoff_completed"
            | "session_started"
            | "session_ended" => Some(EventCategory::AgentLifecycle),
            "plan_created"
            | "plan_updated"
            | "plan_archived"
            | "plan_resumed"
            | "plan_deleted"
            | "plan_imported" => Some(EventCategory::PlanLifecycle),
            "step_updated" | "steps_updated" | "step_added" | "step_deleted" => {
                Some(EventCategory::StepUpdate)
            }
            "workspace_registered" | "workspace_updated" | "workspace_indexed" => {
                Some(EventCategory::WorkspaceLifecycle)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::AgentLifecycle => "agent_lifecycle",
            EventCategory::PlanLifecycle => "plan_lifecycle",
            EventCategory::StepUpdate => "step_update",
            EventCategory::WorkspaceLifecycle => "workspace_lifecycle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_with_optional_fields() {
        let event: DomainEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"plan_created","timestamp":"2024-01-01T00:00:00Z","workspace_id":"ws_1","plan_id":"plan_9","data":{"title":"Refactor"}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "plan_created");
        assert_eq!(event.plan_id.as_deref(), Some("plan_9"));
        assert_eq!(event.agent_type, None);
        assert_eq!(event.data["title"], "Refactor");
        assert_eq!(event.category(), Some(EventCategory::PlanLifecycle));
    }

    #[test]
    fn test_missing_data_is_null() {
        let event: DomainEvent =
            serde_json::from_str(r#"{"id":"e","type":"x","timestamp":"t"}"#).unwrap();
        assert!(event.data.is_null());
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            EventCategory::for_event_type("handoff_completed"),
            Some(EventCategory::AgentLifecycle)
        );
        assert_eq!(
            EventCategory::for_event_type("step_updated"),
            Some(EventCategory::StepUpdate)
        );
        assert_eq!(
            EventCategory::for_event_type("workspace_registered"),
            Some(EventCategory::WorkspaceLifecycle)
        );
        assert_eq!(EventCategory::for_event_type("knowledge_file_saved"), None);
    }
}
