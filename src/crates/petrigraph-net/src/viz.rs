//! Graphviz DOT export of a net, for debugging and documentation.

use crate::net::PetriNet;
use crate::place::PlaceKind;

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl PetriNet {
    /// Render the net as a DOT digraph. Places are circles (doubled for
    /// sinks), transitions are boxes, arc labels carry weight and kind
    /// when not the default.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph petri_net {\n");
        output.push_str("    rankdir=LR;\n");

        for place in &self.places {
            let shape = match place.kind {
                PlaceKind::Sink => "doublecircle",
                _ => "circle",
            };
            let tokens = self.initial_marking.get(&place.id);
            let label = if tokens > 0 {
                format!("{}\\n({})", escape_dot(&place.name), tokens)
            } else {
                escape_dot(&place.name)
            };
            output.push_str(&format!(
                "    \"{}\" [shape={}, label=\"{}\"];\n",
                escape_dot(&place.id),
                shape,
                label
            ));
        }
        for transition in &self.transitions {
            let label = match &transition.guard {
                Some(guard) => format!(
                    "{}\\n[{}]",
                    escape_dot(&transition.name),
                    escape_dot(guard)
                ),
                None => escape_dot(&transition.name),
            };
            output.push_str(&format!(
                "    \"{}\" [shape=box, label=\"{}\"];\n",
                escape_dot(&transition.id),
                label
            ));
        }
        for arc in &self.arcs {
            let mut attrs = Vec::new();
            if arc.weight > 1 {
                attrs.push(format!("label=\"{}\"", arc.weight));
            }
            match arc.kind {
                crate::ArcKind::Inhibitor => attrs.push("arrowhead=odot".to_string()),
                crate::ArcKind::Reset => attrs.push("style=dashed".to_string()),
                crate::ArcKind::Read => attrs.push("dir=both".to_string()),
                crate::ArcKind::Normal => {}
            }
            let attr_str = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };
            output.push_str(&format!(
                "    \"{}\" -> \"{}\"{};\n",
                escape_dot(&arc.source),
                escape_dot(&arc.target),
                attr_str
            ));
        }
        output.push_str("}\n");
        output
    }
}
