use anyhow::{bail, Result};

/// Map search for pharmacies around a position.
pub fn pharmacy_search_url(lat: f64, lng: f64) -> Result<String> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        bail!("latitude must be between -90 and 90, got {lat}");
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        bail!("longitude must be between -180 and 180, got {lng}");
    }
    Ok(format!(
        "https://www.google.com/maps/search/pharmacy/@{lat},{lng},15z"
    ))
}
