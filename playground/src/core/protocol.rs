//! Wire messages exchanged with the execution server.
//!
//! Outbound, the client sends one [`SubmitRequest`] per session. Inbound, the
//! server streams [`InboundFrame`]s: any number of `stdout`/`stderr` chunks,
//! then exactly one `result` or `error`. The non-streaming endpoint answers
//! with a single [`SubmitResponse`] instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tree::ProjectTree;

/// Body of the single outbound request: `{ "files": [...] }`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub files: &'a ProjectTree,
}

/// Frame streamed by the execution server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Stdout { data: String },
    Stderr { data: String },
    /// Terminal: the project as the run left it, with fresh ids.
    Result { files: ProjectTree },
    /// Terminal: the run could not complete.
    Error { message: String },
}

impl InboundFrame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InboundFrame::Result { .. } | InboundFrame::Error { .. })
    }
}

/// Response of the non-streaming submit endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub output: String,
    pub files: ProjectTree,
}

/// A frame that could not be turned into an [`InboundFrame`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("unknown frame type '{0}'")]
    UnknownType(String),
}

const KNOWN_TYPES: [&str; 4] = ["stdout", "stderr", "result", "error"];

/// Serialize the outbound request for `tree`.
pub fn encode_request(tree: &ProjectTree) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SubmitRequest { files: tree })
}

/// Parse and classify one inbound frame.
pub fn decode_frame(raw: &str) -> Result<InboundFrame, ProtocolError> {
    let value: Value = serde_json::from_str(raw)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Serialize a frame the way the execution server does.
pub fn encode_frame(frame: &InboundFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FileNode, Node, NodeId};

    #[test]
    fn request_wraps_roots_in_files() {
        let tree = ProjectTree::from_nodes(vec![Node::File(FileNode {
            id: NodeId::new("x"),
            name: "main.dingle".to_string(),
            content: "print 5;".to_string(),
        })]);
        let encoded = encode_request(&tree).expect("encode");
        let value: Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "files": [
                    {"id": "x", "name": "main.dingle", "type": "file", "content": "print 5;"}
                ]
            })
        );
    }

    #[test]
    fn decodes_output_frames() {
        assert_eq!(
            decode_frame(r#"{"type":"stdout","data":"5\n"}"#).expect("stdout"),
            InboundFrame::Stdout {
                data: "5\n".to_string()
            }
        );
        assert_eq!(
            decode_frame(r#"{"type":"stderr","data":"oops"}"#).expect("stderr"),
            InboundFrame::Stderr {
                data: "oops".to_string()
            }
        );
    }

    #[test]
    fn decodes_terminal_frames() {
        let result = decode_frame(
            r#"{"type":"result","files":[{"id":"x","name":"main.dingle","type":"file","content":"print 5;"}]}"#,
        )
        .expect("result");
        assert!(result.is_terminal());
        let InboundFrame::Result { files } = result else {
            panic!("expected result frame");
        };
        assert_eq!(files.len(), 1);
        assert_eq!(files.roots()[0].name(), "main.dingle");

        let error = decode_frame(r#"{"type":"error","message":"main.dingle not found"}"#)
            .expect("error");
        assert_eq!(
            error,
            InboundFrame::Error {
                message: "main.dingle not found".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_frames() {
        assert!(matches!(
            decode_frame(r#"{"type":"progress","pct":50}"#),
            Err(ProtocolError::UnknownType(kind)) if kind == "progress"
        ));
        assert!(matches!(
            decode_frame(r#"{"data":"x"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_frame("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_frame(r#"{"type":"stdout"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn frames_round_trip_through_encoder() {
        let frame = InboundFrame::Error {
            message: "boom".to_string(),
        };
        let raw = encode_frame(&frame).expect("encode");
        assert_eq!(raw, r#"{"type":"error","message":"boom"}"#);
        assert_eq!(decode_frame(&raw).expect("decode"), frame);
    }
}
