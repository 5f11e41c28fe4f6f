//! Upstream model identifiers.

use serde::{Deserialize, Serialize};

/// Models the upstream answer API accepts.
///
/// A closed enum: the tool schemas advertise exactly these identifiers and
/// deserialization rejects anything else before an upstream call is made.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SonarModel {
    /// General-purpose answer model.
    #[default]
    #[serde(rename = "sonar-pro")]
    SonarPro,
    /// Reasoning-tuned variant.
    #[serde(rename = "sonar-reasoning-pro")]
    SonarReasoningPro,
}

impl SonarModel {
    /// Wire identifier sent in the chat-completions request.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SonarPro => "sonar-pro",
            Self::SonarReasoningPro => "sonar-reasoning-pro",
        }
    }
}

impl std::fmt::Display for SonarModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
