//! Built-in aerospace catalog: Aircraft, Engine, Material, FlightData.
//!
//! The schema ships as embedded TOML so it goes through the same
//! declaration path as user schemas. The typed records below mirror it and
//! carry unit-conversion accessors.

use serde::{Deserialize, Serialize};

use crate::entity::EntityRecord;
use crate::error::SchemaError;
use crate::registry::Registry;
use crate::schema::SchemaDeclaration;
use crate::units::Unit;

/// Embedded schema text.
pub const AEROSPACE_SCHEMA: &str = include_str!("aerospace.toml");

/// Parse the embedded schema.
pub fn declaration() -> Result<SchemaDeclaration, SchemaError> {
    SchemaDeclaration::from_toml_str(AEROSPACE_SCHEMA)
}

/// Registry built from the embedded schema.
pub fn registry() -> Result<Registry, SchemaError> {
    Registry::register(&declaration()?)
}

fn convert(value: f64, from: Unit, to: Unit) -> f64 {
    from.convert_within(value, to)
}

/// Aircraft specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    pub id: i64,
    pub model: String,
    pub manufacturer: String,
    /// knots
    pub max_speed: f64,
    pub cruise_speed: Option<f64>,
    /// feet
    pub max_altitude: f64,
    /// nautical miles
    pub range: Option<f64>,
    /// feet
    pub wingspan: f64,
    pub length: f64,
    pub height: Option<f64>,
    /// pounds
    pub mtow: f64,
    pub mlw: Option<f64>,
    pub oew: Option<f64>,
    pub passenger_capacity: Option<i64>,
    /// cubic feet
    pub cargo_capacity: Option<f64>,
    /// gallons
    pub fuel_capacity: Option<f64>,
    pub num_engines: Option<i64>,
    pub engine_type: Option<String>,
    pub first_flight: Option<String>,
    pub production_status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl EntityRecord for Aircraft {
    const ENTITY_TYPE: &'static str = "Aircraft";
}

impl Aircraft {
    pub fn wingspan_m(&self) -> f64 {
        convert(self.wingspan, Unit::Feet, Unit::Meters)
    }

    pub fn length_m(&self) -> f64 {
        convert(self.length, Unit::Feet, Unit::Meters)
    }

    pub fn mtow_kg(&self) -> f64 {
        convert(self.mtow, Unit::Pounds, Unit::Kilograms)
    }

    pub fn max_speed_ms(&self) -> f64 {
        convert(self.max_speed, Unit::Knots, Unit::MetersPerSecond)
    }

    pub fn max_altitude_m(&self) -> f64 {
        convert(self.max_altitude, Unit::Feet, Unit::Meters)
    }

    pub fn range_km(&self) -> Option<f64> {
        self.range
            .map(|r| convert(r, Unit::NauticalMiles, Unit::Kilometers))
    }

    pub fn fuel_capacity_liters(&self) -> Option<f64> {
        self.fuel_capacity
            .map(|f| convert(f, Unit::Gallons, Unit::Liters))
    }
}

/// Engine specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub id: i64,
    pub model: String,
    pub manufacturer: String,
    pub engine_type: String,
    /// pounds-force
    pub thrust: f64,
    pub specific_fuel_consumption: Option<f64>,
    pub bypass_ratio: Option<f64>,
    /// pounds
    pub weight: f64,
    /// inches
    pub length: Option<f64>,
    pub diameter: Option<f64>,
    pub max_rpm: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub first_run: Option<String>,
    pub production_status: Option<String>,
}

impl EntityRecord for Engine {
    const ENTITY_TYPE: &'static str = "Engine";
}

impl Engine {
    pub fn thrust_kn(&self) -> f64 {
        convert(self.thrust, Unit::PoundsForce, Unit::Kilonewtons)
    }

    pub fn weight_kg(&self) -> f64 {
        convert(self.weight, Unit::Pounds, Unit::Kilograms)
    }

    pub fn diameter_m(&self) -> Option<f64> {
        self.diameter.map(|d| convert(d, Unit::Inches, Unit::Meters))
    }
}

/// Certified aerospace material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub specification: Option<String>,
    pub grade: Option<String>,
    /// g/cm³
    pub density: f64,
    /// MPa
    pub tensile_strength: f64,
    /// MPa
    pub yield_strength: f64,
    /// GPa
    pub elastic_modulus: f64,
    /// °C
    pub melting_point: Option<f64>,
    pub thermal_conductivity: Option<f64>,
    pub thermal_expansion: Option<f64>,
    /// `[min, max]` in °C
    pub temperature_rating: Option<(f64, f64)>,
    pub primary_element: Option<String>,
    pub alloy_composition: Option<String>,
    pub category: Option<String>,
}

impl EntityRecord for Material {
    const ENTITY_TYPE: &'static str = "Material";
}

impl Material {
    pub fn density_kg_m3(&self) -> f64 {
        convert(
            self.density,
            Unit::GramsPerCubicCentimeter,
            Unit::KilogramsPerCubicMeter,
        )
    }

    pub fn tensile_strength_psi(&self) -> f64 {
        convert(self.tensile_strength, Unit::Megapascals, Unit::Psi)
    }

    pub fn yield_strength_psi(&self) -> f64 {
        convert(self.yield_strength, Unit::Megapascals, Unit::Psi)
    }

    pub fn elastic_modulus_mpa(&self) -> f64 {
        convert(self.elastic_modulus, Unit::Gigapascals, Unit::Megapascals)
    }
}

/// One flight and its telemetry summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    pub id: i64,
    pub flight_number: String,
    pub aircraft_id: i64,
    /// ICAO airport code
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub arrival_date: Option<String>,
    /// minutes
    pub flight_time: Option<i64>,
    /// nautical miles
    pub distance: Option<f64>,
    /// gallons
    pub fuel_used: Option<f64>,
    /// knots
    pub avg_speed: Option<f64>,
    pub max_altitude_reached: Option<f64>,
    pub passengers: Option<i64>,
    /// pounds
    pub cargo_weight: Option<f64>,
    pub status: String,
}

impl EntityRecord for FlightData {
    const ENTITY_TYPE: &'static str = "FlightData";
}

impl FlightData {
    pub fn distance_km(&self) -> Option<f64> {
        self.distance
            .map(|d| convert(d, Unit::NauticalMiles, Unit::Kilometers))
    }

    pub fn fuel_used_liters(&self) -> Option<f64> {
        self.fuel_used.map(|f| convert(f, Unit::Gallons, Unit::Liters))
    }

    pub fn flight_time_seconds(&self) -> Option<f64> {
        self.flight_time
            .map(|t| convert(t as f64, Unit::Minutes, Unit::Seconds))
    }
}
