//! Deterministic id generation.
//!
//! Every generated id derives from `(step_id, role)` so that compiling
//! the same intent always yields the same net, byte for byte. Nothing
//! here consults global state or randomness.

pub fn pre_place(step_id: &str) -> String {
    format!("pre_{step_id}")
}

pub fn post_place(step_id: &str) -> String {
    format!("post_{step_id}")
}

pub fn action_transition(step_id: &str) -> String {
    format!("t_{step_id}")
}

pub fn choice_transition(step_id: &str, path_index: usize) -> String {
    format!("t_{step_id}_{path_index}")
}

pub fn fork_transition(step_id: &str) -> String {
    format!("t_{step_id}_fork")
}

pub fn join_transition(step_id: &str) -> String {
    format!("t_{step_id}_join")
}

pub fn branch_place(step_id: &str, branch_index: usize) -> String {
    format!("branch_{step_id}_{branch_index}")
}

pub fn loop_back_transition(step_id: &str) -> String {
    format!("t_{step_id}_back")
}

pub fn loop_exit_transition(step_id: &str) -> String {
    format!("t_{step_id}_exit")
}

pub fn error_place(step_id: &str) -> String {
    format!("err_{step_id}")
}

pub fn error_transition(handled_step_id: &str, handler_step_id: &str) -> String {
    format!("t_{handled_step_id}_err_{handler_step_id}")
}

pub fn compensation_transition(step_id: &str, index: usize) -> String {
    format!("t_{step_id}_comp_{index}")
}

pub fn compensation_place(step_id: &str, index: usize) -> String {
    format!("comp_{step_id}_{index}")
}
