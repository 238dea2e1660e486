//! Deterministic wire form.
//!
//! Two equivalent nets must serialize to identical bytes so golden tests
//! can diff regressions. The canonical form sorts places and transitions
//! by id and arcs lexicographically by (source, target, kind); marking
//! maps are sorted by construction (`BTreeMap`).

use crate::error::Result;
use crate::net::PetriNet;

impl PetriNet {
    /// A copy of this net with all collections in canonical order.
    pub fn canonicalized(&self) -> PetriNet {
        let mut net = self.clone();
        net.places.sort_by(|a, b| a.id.cmp(&b.id));
        net.transitions.sort_by(|a, b| a.id.cmp(&b.id));
        net.arcs.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
        net.loop_back_arcs
            .sort_by(|a, b| (&a.transition, &a.place).cmp(&(&b.transition, &b.place)));
        net
    }

    /// Serialize to the canonical JSON string.
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.canonicalized())?)
    }

    /// Canonical form as a `serde_json::Value`, for embedding in response
    /// bodies.
    pub fn to_canonical_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.canonicalized())?)
    }

    /// Parse a net from JSON and re-apply structural validation.
    pub fn from_json(json: &str) -> Result<PetriNet> {
        let net: PetriNet = serde_json::from_str(json)?;
        net.validate_structure()?;
        Ok(net)
    }

    /// Validate a net received as an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<PetriNet> {
        let net: PetriNet = serde_json::from_value(value)?;
        net.validate_structure()?;
        Ok(net)
    }
}
