//! Shared fixtures for aerodata-core integration tests.

#![allow(dead_code)]

use aerodata_core::catalog;
use aerodata_core::{Entity, Registry, Validator};
use std::sync::Arc;

pub fn catalog_registry() -> Arc<Registry> {
    Arc::new(catalog::registry().expect("embedded catalog schema builds"))
}

pub fn validator() -> Validator {
    Validator::with_astm(catalog_registry())
}

/// A Material instance with every required field filled in.
pub fn material(grade: &str, yield_strength: f64) -> Entity {
    Entity::new("Material")
        .with("id", 1)
        .with("name", format!("Aluminum {}", grade))
        .with("grade", grade)
        .with("density", 2.80)
        .with("tensile_strength", 600.0)
        .with("yield_strength", yield_strength)
        .with("elastic_modulus", 71.7)
}
