use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::location::Coordinates;

#[derive(Debug, Display, PartialEq)]
pub enum ZoneError {
    #[display(fmt = "latitude {} is outside [-90, 90]", _0)]
    Latitude(f64),
    #[display(fmt = "longitude {} is outside [-180, 180]", _0)]
    Longitude(f64),
    #[display(fmt = "radius {} must be a positive number of meters", _0)]
    Radius(f64),
    #[display(fmt = "{} is not a number: {:?}", field, value)]
    NotANumber { field: &'static str, value: String },
}

impl std::error::Error for ZoneError {}

/// Circular geofence assigned to an employee.
///
/// Deserialization goes through [`StoredZone`], so a zone read from storage is already
/// validated and typed. Older entries that kept the numbers as strings are parsed there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "StoredZone")]
pub struct GeofenceZone {
    #[schema(example = "6f1c7a52-3c1d-4c55-9a7e-1f2a3b4c5d6e")]
    pub id: String,
    #[schema(example = "Head office")]
    pub name: String,
    #[schema(example = 37.0)]
    pub latitude: f64,
    #[schema(example = -122.0)]
    pub longitude: f64,
    /// Meters.
    #[schema(example = 100.0)]
    pub radius: f64,
}

impl GeofenceZone {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, radius: f64) -> Result<Self, ZoneError> {
        let zone = Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            latitude,
            longitude,
            radius,
        };
        zone.validate()?;
        Ok(zone)
    }

    pub fn validate(&self) -> Result<(), ZoneError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ZoneError::Latitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ZoneError::Longitude(self.longitude));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(ZoneError::Radius(self.radius));
        }
        Ok(())
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn parse(self, field: &'static str) -> Result<f64, ZoneError> {
        match self {
            Numeric::Number(n) => Ok(n),
            Numeric::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ZoneError::NotANumber { field, value: s }),
        }
    }
}

#[derive(Deserialize)]
struct StoredZone {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    latitude: Numeric,
    longitude: Numeric,
    radius: Numeric,
}

impl TryFrom<StoredZone> for GeofenceZone {
    type Error = ZoneError;

    fn try_from(raw: StoredZone) -> Result<Self, Self::Error> {
        let zone = GeofenceZone {
            id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: raw.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "Office".to_string()),
            latitude: raw.latitude.parse("latitude")?,
            longitude: raw.longitude.parse("longitude")?,
            radius: raw.radius.parse("radius")?,
        };
        zone.validate()?;
        Ok(zone)
    }
}
