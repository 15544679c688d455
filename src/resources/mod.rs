// src/resources/mod.rs

pub mod appointments;
pub mod assessments;
pub mod billing;
pub mod checklists;
pub mod claims;
pub mod discharge;
pub mod exercises;
pub mod insurance;
pub mod patients;
pub mod protocols;
pub mod reports;
