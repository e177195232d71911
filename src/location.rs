//! Location extraction from edge geolocation metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::GeoMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    #[default]
    Country,
    Latlon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Country(String),
    LatLon { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("request has no country")]
    MissingCountry,
    #[error("request has no latitude/longitude")]
    MissingCoordinates,
}

impl Location {
    /// Data-cache key: the country code, or `{lat}_{lon}`.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Country(code) => write!(f, "{}", code),
            Location::LatLon { lat, lon } => write!(f, "{}_{}", lat, lon),
        }
    }
}

/// Resolve a location for the given mode.
///
/// `latlon` mode does not fall back to the country: missing coordinates are
/// an error.
pub fn get_location(geo: &GeoMetadata, mode: LocationMode) -> Result<Location, LocationError> {
    match mode {
        LocationMode::Country => geo
            .country
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(|code| Location::Country(code.to_string()))
            .ok_or(LocationError::MissingCountry),
        LocationMode::Latlon => match (geo.latitude, geo.longitude) {
            (Some(lat), Some(lon)) => Ok(Location::LatLon { lat, lon }),
            _ => Err(LocationError::MissingCoordinates),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_mode() {
        let geo = GeoMetadata {
            country: Some("DE".to_string()),
            ..Default::default()
        };
        assert_eq!(
            get_location(&geo, LocationMode::default()),
            Ok(Location::Country("DE".to_string()))
        );
    }

    #[test]
    fn test_missing_metadata_is_error() {
        let geo = GeoMetadata::default();
        assert_eq!(
            get_location(&geo, LocationMode::Country),
            Err(LocationError::MissingCountry)
        );
        assert_eq!(
            get_location(&geo, LocationMode::Latlon),
            Err(LocationError::MissingCoordinates)
        );
    }

    #[test]
    fn test_empty_country_is_error() {
        let geo = GeoMetadata {
            country: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(get_location(&geo, LocationMode::Country).is_err());
    }

    #[test]
    fn test_latlon_mode() {
        let geo = GeoMetadata {
            latitude: Some(1.0),
            longitude: Some(2.0),
            ..Default::default()
        };
        let location = get_location(&geo, LocationMode::Latlon).unwrap();
        assert_eq!(location, Location::LatLon { lat: 1.0, lon: 2.0 });
        assert_eq!(location.cache_key(), "1_2");
    }

    #[test]
    fn test_latlon_does_not_fall_back_to_country() {
        let geo = GeoMetadata {
            country: Some("FR".to_string()),
            latitude: Some(48.85),
            longitude: None,
        };
        assert_eq!(
            get_location(&geo, LocationMode::Latlon),
            Err(LocationError::MissingCoordinates)
        );
    }

    #[test]
    fn test_fractional_cache_key() {
        let location = Location::LatLon { lat: 52.52, lon: -13.4 };
        assert_eq!(location.cache_key(), "52.52_-13.4");
    }
}
