//! Physical units carried by field specifications.
//!
//! Values are stored in the unit the schema declares (usually the unit the
//! aerospace industry quotes them in) and converted on demand.

use serde::{Deserialize, Serialize};

/// Physical dimension of a unit. Conversion is only defined within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Speed,
    Length,
    Mass,
    Force,
    Volume,
    Pressure,
    Density,
    Temperature,
    Time,
    ThermalConductivity,
    ThermalExpansion,
    FuelConsumption,
    RotationalSpeed,
}

/// A physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Knots,
    MetersPerSecond,
    Feet,
    Inches,
    Meters,
    NauticalMiles,
    Kilometers,
    Pounds,
    Kilograms,
    PoundsForce,
    Kilonewtons,
    Gallons,
    Liters,
    CubicFeet,
    Megapascals,
    Gigapascals,
    Psi,
    GramsPerCubicCentimeter,
    KilogramsPerCubicMeter,
    Celsius,
    Kelvin,
    Minutes,
    Seconds,
    WattsPerMeterKelvin,
    MicrometersPerMeterCelsius,
    PoundsPerPoundForceHour,
    Rpm,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        use Unit::*;
        match self {
            Knots | MetersPerSecond => Dimension::Speed,
            Feet | Inches | Meters | NauticalMiles | Kilometers => Dimension::Length,
            Pounds | Kilograms => Dimension::Mass,
            PoundsForce | Kilonewtons => Dimension::Force,
            Gallons | Liters | CubicFeet => Dimension::Volume,
            Megapascals | Gigapascals | Psi => Dimension::Pressure,
            GramsPerCubicCentimeter | KilogramsPerCubicMeter => Dimension::Density,
            Celsius | Kelvin => Dimension::Temperature,
            Minutes | Seconds => Dimension::Time,
            WattsPerMeterKelvin => Dimension::ThermalConductivity,
            MicrometersPerMeterCelsius => Dimension::ThermalExpansion,
            PoundsPerPoundForceHour => Dimension::FuelConsumption,
            Rpm => Dimension::RotationalSpeed,
        }
    }

    /// Short display symbol.
    pub fn symbol(self) -> &'static str {
        use Unit::*;
        match self {
            Knots => "kt",
            MetersPerSecond => "m/s",
            Feet => "ft",
            Inches => "in",
            Meters => "m",
            NauticalMiles => "nmi",
            Kilometers => "km",
            Pounds => "lb",
            Kilograms => "kg",
            PoundsForce => "lbf",
            Kilonewtons => "kN",
            Gallons => "gal",
            Liters => "L",
            CubicFeet => "ft³",
            Megapascals => "MPa",
            Gigapascals => "GPa",
            Psi => "psi",
            GramsPerCubicCentimeter => "g/cm³",
            KilogramsPerCubicMeter => "kg/m³",
            Celsius => "°C",
            Kelvin => "K",
            Minutes => "min",
            Seconds => "s",
            WattsPerMeterKelvin => "W/(m·K)",
            MicrometersPerMeterCelsius => "μm/(m·°C)",
            PoundsPerPoundForceHour => "lb/(lbf·h)",
            Rpm => "rpm",
        }
    }

    /// Multiplier and offset mapping this unit onto its dimension's base unit.
    fn to_base(self) -> (f64, f64) {
        use Unit::*;
        match self {
            Knots => (0.514444, 0.0),
            MetersPerSecond => (1.0, 0.0),
            Feet => (0.3048, 0.0),
            Inches => (0.0254, 0.0),
            Meters => (1.0, 0.0),
            NauticalMiles => (1852.0, 0.0),
            Kilometers => (1000.0, 0.0),
            Pounds => (0.453592, 0.0),
            Kilograms => (1.0, 0.0),
            PoundsForce => (0.00444822, 0.0),
            Kilonewtons => (1.0, 0.0),
            Gallons => (3.78541, 0.0),
            Liters => (1.0, 0.0),
            CubicFeet => (28.3168, 0.0),
            Megapascals => (1.0, 0.0),
            Gigapascals => (1000.0, 0.0),
            Psi => (1.0 / 145.038, 0.0),
            GramsPerCubicCentimeter => (1000.0, 0.0),
            KilogramsPerCubicMeter => (1.0, 0.0),
            Celsius => (1.0, 273.15),
            Kelvin => (1.0, 0.0),
            Minutes => (60.0, 0.0),
            Seconds => (1.0, 0.0),
            WattsPerMeterKelvin | MicrometersPerMeterCelsius | PoundsPerPoundForceHour | Rpm => {
                (1.0, 0.0)
            }
        }
    }

    /// Convert `value` from this unit into `target`.
    ///
    /// Returns `None` when the units measure different dimensions.
    pub fn convert(self, value: f64, target: Unit) -> Option<f64> {
        if self.dimension() != target.dimension() {
            return None;
        }
        if self == target {
            return Some(value);
        }
        Some(self.convert_within(value, target))
    }

    /// Convert between units known to share a dimension.
    pub(crate) fn convert_within(self, value: f64, target: Unit) -> f64 {
        debug_assert_eq!(self.dimension(), target.dimension());
        let (from_scale, from_offset) = self.to_base();
        let (to_scale, to_offset) = target.to_base();
        (value * from_scale + from_offset - to_offset) / to_scale
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
