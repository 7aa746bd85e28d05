//! Step output and artifact types.

use serde::{Deserialize, Serialize};

/// Category of an artifact produced by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Generated image.
    Image,
    /// Generated document.
    Document,
    /// Structured data payload.
    Data,
    /// Reference to an external resource.
    Link,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Document => write!(f, "document"),
            ArtifactKind::Data => write!(f, "data"),
            ArtifactKind::Link => write!(f, "link"),
        }
    }
}

/// A deliverable produced by a step, surfaced in the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact category.
    pub kind: ArtifactKind,

    /// Display name.
    pub name: String,

    /// Location of the artifact, when stored externally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Inline payload, when the artifact is small enough to embed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Artifact {
    /// Create an artifact referencing an external location.
    pub fn external(kind: ArtifactKind, name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            uri: Some(uri.into()),
            payload: None,
        }
    }

    /// Create an artifact with an inline payload.
    pub fn inline(kind: ArtifactKind, name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            name: name.into(),
            uri: None,
            payload: Some(payload),
        }
    }
}

/// Result of a successful step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutput {
    /// Opaque result data. Written to the blackboard keyed by step id.
    pub data: serde_json::Value,

    /// Short human-readable summary of what the step produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Artifacts produced by the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Handler-measured execution duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StepOutput {
    /// Create an output from result data alone.
    pub fn from_value(data: serde_json::Value) -> Self {
        Self {
            data,
            summary: None,
            artifacts: Vec::new(),
            duration_ms: None,
        }
    }

    /// Attach a summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Attach an artifact.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Attach several artifacts.
    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts.extend(artifacts);
        self
    }

    /// Set the execution duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

impl Default for StepOutput {
    fn default() -> Self {
        Self::from_value(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_from_value() {
        let output = StepOutput::from_value(serde_json::json!({"count": 3}));
        assert_eq!(output.data["count"], 3);
        assert!(output.summary.is_none());
        assert!(output.artifacts.is_empty());
    }

    #[test]
    fn test_output_builder() {
        let output = StepOutput::from_value(serde_json::json!({}))
            .with_summary("generated one image")
            .with_artifact(Artifact::external(
                ArtifactKind::Image,
                "cover.png",
                "https://cdn.example.com/cover.png",
            ))
            .with_duration(1200);

        assert_eq!(output.summary.as_deref(), Some("generated one image"));
        assert_eq!(output.artifacts.len(), 1);
        assert_eq!(output.artifacts[0].kind, ArtifactKind::Image);
        assert_eq!(output.duration_ms, Some(1200));
    }

    #[test]
    fn test_output_serialization_skips_empty() {
        let output = StepOutput::from_value(serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"ok\":true"));
        assert!(!json.contains("artifacts"));
        assert!(!json.contains("summary"));
    }

    #[test]
    fn test_artifact_inline_roundtrip() {
        let artifact = Artifact::inline(
            ArtifactKind::Data,
            "metrics",
            serde_json::json!({"rows": 42}),
        );
        let json = serde_json::to_string(&artifact).unwrap();
        let back: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ArtifactKind::Data);
        assert_eq!(back.payload, Some(serde_json::json!({"rows": 42})));
    }
}
