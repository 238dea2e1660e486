//! Property tests for the canonical wire form.

use petrigraph_net::{Arc, ArcKind, Marking, NetBuilder, PetriNet, Place, Transition};
use proptest::prelude::*;

/// Structurally valid random nets: `places` places in a row, each
/// transition consuming from one place and producing into another, so
/// every transition always has an input arc.
fn arb_net() -> impl Strategy<Value = PetriNet> {
    (2usize..6, 1usize..6).prop_flat_map(|(places, transitions)| {
        let arcs = proptest::collection::vec(
            (0..places, 0..places, 1u64..3, 0usize..3),
            transitions..=transitions,
        );
        let tokens = proptest::collection::vec(0u64..3, places..=places);
        (arcs, tokens).prop_map(move |(arc_specs, tokens)| {
            let mut builder = NetBuilder::new();
            for p in 0..places {
                builder.add_place(Place::new(format!("p{p}"), format!("place {p}")));
            }
            for (t, (input, output, weight, kind)) in arc_specs.into_iter().enumerate() {
                let tid = format!("t{t}");
                builder.add_transition(Transition::new(&tid, format!("transition {t}")));
                let kind = match kind {
                    0 => ArcKind::Normal,
                    1 => ArcKind::Read,
                    _ => ArcKind::Inhibitor,
                };
                builder.add_arc(
                    Arc::new(format!("p{input}"), &tid)
                        .with_weight(weight)
                        .with_kind(kind),
                );
                builder.add_arc(Arc::new(&tid, format!("p{output}")));
            }
            for (p, count) in tokens.into_iter().enumerate() {
                if count > 0 {
                    builder.mark_initial(format!("p{p}"), count);
                }
            }
            builder.build().expect("generated net is structurally valid")
        })
    })
}

proptest! {
    #[test]
    fn serialize_then_deserialize_is_identity(net in arb_net()) {
        let json = net.to_canonical_json().unwrap();
        let back = PetriNet::from_json(&json).unwrap();
        prop_assert_eq!(net.canonicalized(), back.clone());
        prop_assert_eq!(json, back.to_canonical_json().unwrap());
    }

    #[test]
    fn canonicalization_is_idempotent(net in arb_net()) {
        let once = net.canonicalized();
        let twice = once.canonicalized();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn marking_equality_ignores_zero_entries(tokens in proptest::collection::btree_map("p[0-9]", 0u64..4, 0..6)) {
        let sparse: Marking = tokens
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(id, &count)| (id.clone(), count))
            .collect();
        let padded: Marking = tokens.into_iter().collect();
        prop_assert_eq!(sparse, padded);
    }
}
