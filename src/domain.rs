use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, utoipa::ToSchema)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// A replayable input action
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MouseMove { x: i32, y: i32 },
    MouseDown { button: MouseButton, x: i32, y: i32 },
    MouseUp { button: MouseButton, x: i32, y: i32 },
    Wheel { delta_x: i32, delta_y: i32, x: i32, y: i32 },
    KeyPress { key: String },
}

impl Action {
    /// Stable discriminator stored next to the serialized action
    pub fn action_type(&self) -> &'static str {
        match self {
            Action::MouseMove { .. } => "MouseMove",
            Action::MouseDown { .. } => "MouseDown",
            Action::MouseUp { .. } => "MouseUp",
            Action::Wheel { .. } => "Wheel",
            Action::KeyPress { .. } => "KeyPress",
        }
    }
}

/// Raw input as delivered by a capture source, before the recorder attaches
/// the pointer position to button and wheel events
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    MouseMove { x: i32, y: i32 },
    ButtonPress { button: MouseButton },
    ButtonRelease { button: MouseButton },
    Wheel { delta_x: i32, delta_y: i32 },
    KeyPress { key: String },
}

/// One recorded action with its offset from the start of the recording
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, utoipa::ToSchema)]
pub struct EventRecord {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seq: Option<i64>,
    pub timestamp_ms: u64,
    pub action: Action,
}

impl EventRecord {
    pub fn new(timestamp_ms: u64, action: Action) -> Self {
        Self {
            seq: None,
            timestamp_ms,
            action,
        }
    }
}

/// A stored recording session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub event_count: i64,
    /// Seconds covered by the recorded events
    pub time_cost: f64,
}
