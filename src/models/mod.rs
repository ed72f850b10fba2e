// src/models/mod.rs

pub mod attempt;
pub mod evaluation;
pub mod overall_score;
pub mod question;
pub mod response;
pub mod session;
