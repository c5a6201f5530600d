//! Wire format for the diagram generation service.
//!
//! Requests are a tagged envelope `{"action": ..., "data": {...}}`; the
//! response body is `{"result": "..."}`. Field and action names are
//! camelCase on the wire.

use mermake_types::{DiagramKind, FileRecord};
use serde::{Deserialize, Serialize};

/// Request envelope. One variant per service action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum GatewayRequest<'a> {
    #[serde(rename_all = "camelCase")]
    UpdateMermaid {
        current_code: &'a str,
        instruction: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    GenerateDiagram {
        file_infos: &'a [FileRecord],
        diagram_type: DiagramKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_instruction: Option<&'a str>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateDiagram {
        current_code: &'a str,
        file_infos: &'a [FileRecord],
        #[serde(skip_serializing_if = "Option::is_none")]
        user_instruction: Option<&'a str>,
    },
}

impl GatewayRequest<'_> {
    /// Wire action name, for logging.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            GatewayRequest::UpdateMermaid { .. } => "updateMermaid",
            GatewayRequest::GenerateDiagram { .. } => "generateDiagram",
            GatewayRequest::UpdateDiagram { .. } => "updateDiagram",
        }
    }
}

/// Successful response body.
#[derive(Debug, Deserialize)]
pub struct GatewayResponse {
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::GatewayRequest;
    use mermake_types::{DiagramKind, FileRecord};

    fn record(path: &str) -> FileRecord {
        FileRecord {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            content: Some("fn main() {}".to_string()),
        }
    }

    #[test]
    fn update_mermaid_envelope_shape() {
        let request = GatewayRequest::UpdateMermaid {
            current_code: "graph TD",
            instruction: "add a node",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "updateMermaid");
        assert_eq!(json["data"]["currentCode"], "graph TD");
        assert_eq!(json["data"]["instruction"], "add a node");
    }

    #[test]
    fn generate_diagram_envelope_shape() {
        let files = vec![record("src/main.rs")];
        let request = GatewayRequest::GenerateDiagram {
            file_infos: &files,
            diagram_type: DiagramKind::Sequence,
            user_instruction: Some("login flow"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "generateDiagram");
        assert_eq!(json["data"]["diagramType"], "sequence");
        assert_eq!(json["data"]["userInstruction"], "login flow");
        assert_eq!(json["data"]["fileInfos"][0]["path"], "src/main.rs");
        assert_eq!(json["data"]["fileInfos"][0]["name"], "main.rs");
    }

    #[test]
    fn absent_instruction_is_omitted_from_wire() {
        let files = vec![record("lib.rs")];
        let request = GatewayRequest::GenerateDiagram {
            file_infos: &files,
            diagram_type: DiagramKind::Class,
            user_instruction: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["data"].get("userInstruction").is_none());
    }

    #[test]
    fn update_diagram_envelope_shape() {
        let files = vec![record("lib.rs")];
        let request = GatewayRequest::UpdateDiagram {
            current_code: "graph TD\nA-->B",
            file_infos: &files,
            user_instruction: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["action"], "updateDiagram");
        assert_eq!(json["data"]["currentCode"], "graph TD\nA-->B");
    }
}
