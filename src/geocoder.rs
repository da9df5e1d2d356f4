use crate::config::AppConfig;
use crate::error::{AppError, GeocodeError};
use crate::metadata::{Coordinates, PlaceLabel};
use serde::Deserialize;
use std::cell::Cell;
use std::time::{Duration, Instant};
use url::Url;

/// Looks up the full address text for a coordinate pair.
pub trait ReverseGeocoder {
    fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Nominatim reverse endpoint, paced so consecutive calls stay at least `delay` apart.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    endpoint: Url,
    language: String,
    delay: Duration,
    last_call: Cell<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let endpoint = Url::parse(&config.geocoder_url)?;
        log::debug!("Initializing reverse geocoder at {}", endpoint);
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.geocoder_user_agent.clone())
            .timeout(config.geocoder_timeout())
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("geocoder client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            language: config.geocoder_language.clone(),
            delay: config.geocoder_delay(),
            last_call: Cell::new(None),
        })
    }

    fn request_url(&self, coordinates: Coordinates) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("format", "jsonv2")
            .append_pair("lat", &coordinates.latitude.to_string())
            .append_pair("lon", &coordinates.longitude.to_string())
            .append_pair("accept-language", &self.language);
        url
    }

    fn wait_for_turn(&self) {
        if let Some(last) = self.last_call.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last_call.set(Some(Instant::now()));
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, coordinates: Coordinates) -> Result<String, GeocodeError> {
        self.wait_for_turn();
        let url = self.request_url(coordinates);
        log::trace!("Reverse geocoding {}", url);

        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        let body: ReverseResponse = response.json()?;
        address_from(body)
    }
}

fn address_from(body: ReverseResponse) -> Result<String, GeocodeError> {
    if let Some(error) = body.error {
        log::debug!("Geocoder reported: {}", error);
        return Err(GeocodeError::NoResult);
    }
    match body.display_name {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(GeocodeError::NoResult),
    }
}

/// Turns coordinates into a `{City}_{Country}` label.
pub struct LocationResolver {
    geocoder: Box<dyn ReverseGeocoder>,
    city_from_end: usize,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn ReverseGeocoder>, city_from_end: usize) -> Self {
        Self {
            geocoder,
            city_from_end,
        }
    }

    /// Never fails: missing coordinates and lookup failures both give `Sin_GPS`.
    pub fn resolve(&self, coordinates: Option<Coordinates>) -> PlaceLabel {
        let Some(coordinates) = coordinates else {
            return PlaceLabel::no_gps();
        };
        match self.try_resolve(coordinates) {
            Ok(label) => label,
            Err(e) => {
                log::warn!(
                    "Reverse geocoding failed for ({}, {}): {}",
                    coordinates.latitude,
                    coordinates.longitude,
                    e
                );
                PlaceLabel::no_gps()
            }
        }
    }

    pub fn try_resolve(&self, coordinates: Coordinates) -> Result<PlaceLabel, GeocodeError> {
        let address = self.geocoder.reverse(coordinates)?;
        place_from_address(&address, self.city_from_end)
    }
}

/// Picks the city `city_from_end` components from the end and the last component as country.
///
/// Address granularity varies by region, so the offset is an approximation; when the address
/// is shorter than the offset the first component is used.
pub fn place_from_address(address: &str, city_from_end: usize) -> Result<PlaceLabel, GeocodeError> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return Err(GeocodeError::MalformedAddress(address.to_string()));
    }
    let country = parts[parts.len() - 1];
    let city_index = parts.len().saturating_sub(city_from_end.max(2));
    Ok(PlaceLabel::new(parts[city_index], country))
}
