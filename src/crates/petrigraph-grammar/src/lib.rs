//! # petrigraph-grammar - Intent to Petri-Net Compiler
//!
//! The automation grammar: turns an ordered list of workflow steps with
//! dependencies (an *intent specification*) into a structurally sound
//! Petri net ready for validation, simulation and projection.
//!
//! ## Pipeline Position
//!
//! ```text
//! Intent spec ──compile──▶ PetriNet + build notes
//!      ▲
//!      └── workflow YAML import (yaml module)
//! ```
//!
//! ## Step Kinds
//!
//! | Kind | Fragment |
//! |------|----------|
//! | `Action`/`Timer` | input places -> `t_<id>` -> `post_<id>` |
//! | `Choice` | shared inputs -> one guarded `t_<id>_<i>` per path -> `post_<id>` |
//! | `Parallel` | inputs -> `t_<id>_fork` -> one `branch_<id>_<i>` per branch |
//! | `Sync` | branch tails -> `t_<id>_join` -> `post_<id>` |
//! | `Loop` | guarded back transition to the body head plus a guarded exit |
//! | `Error` | error place fed by alternative error transitions of handled steps |
//! | `Compensation` | chain of fixed reverse actions |
//!
//! Steps are stitched by dependencies: a step's transitions consume the
//! output places of every declared dependency. Steps without
//! dependencies get their own `pre_<id>` place holding one initial
//! token.
//!
//! ## Determinism
//!
//! All generated ids derive from `(step_id, role)`, so compiling the
//! same intent twice yields byte-identical canonical JSON. This is a
//! tested property, not an accident.

pub mod compiler;
pub mod error;
pub mod intent;
pub mod naming;
pub mod yaml;

pub use compiler::{compile, BuildNote, BuildProduct};
pub use error::{GrammarError, Result};
pub use intent::{ChoicePath, IntentSpec, IntentStep, RetrySpec, StepKind, StepMetadata};
pub use yaml::intent_from_workflow_yaml;
