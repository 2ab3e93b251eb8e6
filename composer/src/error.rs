/// Composition failures
///
/// Every variant is detected while the app is being composed, before any
/// provisioning could happen. None of these are retried: an invalid
/// specification stays invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("construct id \"{id}\" is already taken in stack \"{stack}\"")]
    DuplicateId { stack: String, id: String },

    #[error("output \"{output}\" is already exported by stack \"{stack}\"")]
    DuplicateOutput { stack: String, output: String },

    #[error("stack \"{stack}\" is already registered")]
    DuplicateStack { stack: String },

    #[error("stack \"{stack}\" has no output \"{output}\"")]
    MissingOutput { stack: String, output: String },

    #[error("no stack \"{stack}\" has been constructed")]
    UnknownStack { stack: String },

    #[error("dependency cycle between stacks: {}", stacks.join(" -> "))]
    DependencyCycle { stacks: Vec<String> },

    #[error("{construct}: {reason}")]
    InvalidParameter { construct: String, reason: String },

    #[error(
        "security group \"{group}\" is {tier}-tier and must not allow ingress from \"{peer}\""
    )]
    OpenIngress {
        group: String,
        tier: String,
        peer: String,
    },
}

impl Error {
    /// Shortcut for construct parameter validation failures
    pub fn invalid(construct: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            construct: construct.to_string(),
            reason: reason.into(),
        }
    }
}
