//! Identifier generation for front-end instances.

use uuid::Uuid;

fn short_token() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(8);
    hex
}

/// Fresh user identifier, e.g. `user_3f9a01bc`.
#[must_use]
pub fn new_user_id() -> String {
    format!("user_{}", short_token())
}

/// Fresh session identifier, e.g. `session_c0ffee12`.
#[must_use]
pub fn new_session_id() -> String {
    format!("session_{}", short_token())
}
