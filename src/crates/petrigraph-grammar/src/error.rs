//! Grammar and build errors.

use petrigraph_net::NetError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrammarError>;

/// Everything that can go wrong between receiving an intent spec and
/// emitting a net. Conflict variants carry the offending ids so the
/// service layer can list them in its 409 response.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// An intent with no steps builds nothing.
    #[error("intent specification contains no steps")]
    EmptyIntent,

    #[error("duplicate step id '{id}'")]
    DuplicateStepId { id: String },

    /// A dependency names a step that does not exist.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// The step dependency graph contains a cycle (declared loops are
    /// expressed through loop metadata, never through dependencies).
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("choice step '{step}' declares no paths")]
    ChoiceWithoutPaths { step: String },

    #[error("parallel step '{step}' declares no branches")]
    ParallelWithoutBranches { step: String },

    /// A step depends on a parallel step without being one of its
    /// declared branches.
    #[error("step '{step}' depends on parallel '{parallel}' but is not a declared branch")]
    UnresolvedBranch { step: String, parallel: String },

    /// A sync step whose target is missing or is not a parallel step.
    #[error("sync step '{step}' has no matching parallel{}", target.as_ref().map(|t| format!(" (target '{t}')")).unwrap_or_default())]
    UnresolvedSync { step: String, target: Option<String> },

    #[error("loop step '{step}' declares no continuation condition")]
    LoopWithoutCondition { step: String },

    /// A loop's re-entry point must name an existing step.
    #[error("loop step '{step}' re-enters unknown step '{target}'")]
    UnknownLoopTarget { step: String, target: String },

    /// An error handler lists a step it cannot handle.
    #[error("error step '{step}' handles unknown step '{target}'")]
    UnknownHandledStep { step: String, target: String },

    /// Malformed intent or workflow document.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The assembled net broke a structural invariant. Indicates a
    /// compiler bug rather than bad input, but surfaced as a typed
    /// error all the same.
    #[error(transparent)]
    Net(#[from] NetError),
}

impl GrammarError {
    /// Ids involved in the conflict, for diagnostic payloads.
    pub fn offending_ids(&self) -> Vec<String> {
        match self {
            GrammarError::DuplicateStepId { id } => vec![id.clone()],
            GrammarError::UnknownDependency { step, dependency } => {
                vec![step.clone(), dependency.clone()]
            }
            GrammarError::DependencyCycle { cycle } => cycle.clone(),
            GrammarError::ChoiceWithoutPaths { step }
            | GrammarError::ParallelWithoutBranches { step }
            | GrammarError::LoopWithoutCondition { step } => vec![step.clone()],
            GrammarError::UnresolvedBranch { step, parallel } => {
                vec![step.clone(), parallel.clone()]
            }
            GrammarError::UnresolvedSync { step, target } => {
                let mut ids = vec![step.clone()];
                ids.extend(target.clone());
                ids
            }
            GrammarError::UnknownLoopTarget { step, target }
            | GrammarError::UnknownHandledStep { step, target } => {
                vec![step.clone(), target.clone()]
            }
            _ => Vec::new(),
        }
    }

    /// True for conflicts in the intent itself (as opposed to malformed
    /// input or internal failures); drives the 409-vs-400 split.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, GrammarError::Parse { .. } | GrammarError::Net(_))
    }
}
