//! # petrigraph-net - Petri-Net Data Model
//!
//! Typed places, transitions, arcs and markings with the structural
//! invariants the rest of the petrigraph pipeline relies on. A net is
//! built once (normally by the grammar compiler), validated, and then
//! treated as immutable: the validator, simulator and projector all
//! borrow it read-only and may run against the same instance
//! concurrently.
//!
//! ## Core Concepts
//!
//! - **[`Place`]**: a state-holding node with an optional token capacity
//! - **[`Transition`]**: an action or synchronization node, optionally
//!   guarded by an opaque expression evaluated through [`GuardEvaluator`]
//! - **[`Arc`]**: a directed weighted edge between a place and a
//!   transition (the bipartite invariant is enforced, never
//!   place-to-place or transition-to-transition)
//! - **[`Marking`]**: the dynamic state, a total function from places to
//!   token counts with implicit zero for unlisted places
//! - **[`PetriNet`]**: the immutable bundle of the above plus the
//!   initial marking, optional terminal markings and build metadata
//!
//! ## Firing Semantics
//!
//! [`PetriNet::is_enabled`] and [`PetriNet::fire`] implement the arc
//! semantics used everywhere downstream:
//!
//! - `Normal`/`Read` input arcs require `M(p) >= weight`
//! - `Inhibitor` input arcs require `M(p) < weight`
//! - `Reset` input arcs are always satisfied and empty the place on fire
//! - output capacities are pre-checked: a firing that would overflow a
//!   bounded place is never offered
//!
//! Markings are value objects. Firing never mutates in place; it returns
//! a fresh [`Marking`].
//!
//! ## Canonical Serialization
//!
//! [`PetriNet::to_canonical_json`] emits a deterministic JSON form
//! (places and transitions sorted by id, arcs sorted by source, target,
//! kind) so two equivalent nets serialize to identical bytes. The
//! deserializer re-applies structural validation.

pub mod arc;
pub mod cancel;
pub mod canonical;
pub mod error;
pub mod guard;
pub mod marking;
pub mod net;
pub mod place;
pub mod transition;
pub mod viz;

pub use arc::{Arc, ArcKind};
pub use cancel::CancelFlag;
pub use error::{NetError, Result, StructuralViolation};
pub use guard::{
    DefaultGuardEvaluator, GuardContext, GuardError, GuardEvaluator, PermissiveGuardEvaluator,
};
pub use marking::Marking;
pub use net::{LoopBackArc, NetBuilder, NetMetadata, PetriNet, TransitionIo, SCHEMA_VERSION};
pub use place::{Place, PlaceKind};
pub use transition::{Transition, TransitionKind};

/// Place identifier, unique within a net.
pub type PlaceId = String;

/// Transition identifier, unique within a net (and disjoint from place ids).
pub type TransitionId = String;
