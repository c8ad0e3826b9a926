//! Embedded sample data: the fallback scholarship catalog and the fixed student roster.
//!
//! Both are shared static resources; every caller sees the same parsed slice.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;

use crate::models::{Scholarship, StudentProfile};

const SCHOLARSHIPS_JSON: &str = include_str!("../data/scholarships.json");
const STUDENTS_JSON: &str = include_str!("../data/students.json");

static SCHOLARSHIPS: OnceLock<Vec<Scholarship>> = OnceLock::new();
static STUDENTS: OnceLock<Vec<StudentProfile>> = OnceLock::new();

pub fn fallback_scholarships() -> &'static [Scholarship] {
    SCHOLARSHIPS.get_or_init(|| parse_embedded(SCHOLARSHIPS_JSON, "scholarships.json"))
}

pub fn find_fallback(id: &str) -> Option<&'static Scholarship> {
    fallback_scholarships().iter().find(|s| s.id == id)
}

pub fn default_roster() -> &'static [StudentProfile] {
    STUDENTS.get_or_init(|| parse_embedded(STUDENTS_JSON, "students.json"))
}

fn parse_embedded<T: DeserializeOwned>(raw: &str, name: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(values) => values,
        Err(err) => {
            if cfg!(debug_assertions) {
                panic!("embedded {name} is malformed: {err}");
            }
            tracing::error!(file = name, error = %err, "embedded dataset failed to parse");
            Vec::new()
        }
    }
}
