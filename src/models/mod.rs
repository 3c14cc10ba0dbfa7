// src/models/mod.rs

pub mod envelope;
pub mod flag;
pub mod question;
pub mod test_record;
pub mod topic;
pub mod user;
