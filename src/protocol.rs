//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::Section;
use crate::session::View;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Select { question: String },
    Edit { section: Section, text: String },
    Grade,
    Snapshot,
}

impl ClientWsMessage {
    /// Message tag for logs; payloads may hold answer text and are not logged.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::Select { .. } => "select",
            ClientWsMessage::Edit { .. } => "edit",
            ClientWsMessage::Grade => "grade",
            ClientWsMessage::Snapshot => "snapshot",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    View { view: View },
    Grading { question: String },
    Error { message: String },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftIn {
    pub section: Section,
    pub text: String,
}

#[derive(Serialize)]
pub struct GradeOut {
    pub question: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct GlossaryQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct DefinitionOut {
    pub section: String,
    pub term: String,
    pub definition: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"edit","section":"scalability","text":"cdn"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Edit { section: Section::Scalability, ref text } if text == "cdn"));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"grade"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Grade));
        assert!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"edit","section":"summary","text":""}"#).is_err());
    }

    #[test]
    fn grading_reply_names_the_question() {
        let v = serde_json::to_value(ServerWsMessage::Grading { question: "Design a news feed".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"type": "grading", "question": "Design a news feed"}));
    }

    #[test]
    fn server_error_shape() {
        let v = serde_json::to_value(ServerWsMessage::Error { message: "busy".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"type": "error", "message": "busy"}));
    }
}
