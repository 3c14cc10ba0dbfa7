// src/models/envelope.rs

use serde::{Deserialize, Serialize};

/// Response wrapper used by the user-facing endpoints: `{ err, msg, data }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub err: bool,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(msg: impl Into<String>, data: T) -> Self {
        Self {
            err: false,
            msg: msg.into(),
            data: Some(data),
        }
    }
}
