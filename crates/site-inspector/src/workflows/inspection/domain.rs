use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::catalog::{ComponentCatalog, ComponentDefinition, ComponentId};

/// Inspector-assigned quality value, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StarRating(u8);

impl StarRating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, RatingError> {
        if (Self::MIN..=Self::MAX).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(RatingError::OutOfRange(stars))
        }
    }

    pub const fn stars(self) -> u8 {
        self.0
    }

    /// 1 star maps to 20%, 5 stars to 100%.
    pub const fn percentage(self) -> u8 {
        self.0 * 20
    }
}

impl TryFrom<u8> for StarRating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for StarRating {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let stars = u8::deserialize(deserializer)?;
        StarRating::new(stars).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for StarRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRating {
    pub component: ComponentId,
    pub rating: StarRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl ComponentRating {
    pub fn new(component: ComponentId, rating: StarRating) -> Self {
        Self {
            component,
            rating,
            notes: None,
            photo_ref: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("rating {0} is outside the 1-5 star range")]
    OutOfRange(u8),
    #[error("component {0} is not part of the inspection template")]
    UnknownComponent(ComponentId),
    #[error("component {0} has not been rated yet")]
    NotRated(ComponentId),
}

/// One rating per catalog component, keyed by component id.
///
/// Every key is guaranteed to exist in the catalog the sheet was built for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingSheet {
    ratings: BTreeMap<ComponentId, ComponentRating>,
}

impl RatingSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sheet from a list of ratings, rejecting unknown ids. A later
    /// entry for the same component replaces the earlier one.
    pub fn from_ratings(
        catalog: &ComponentCatalog,
        ratings: impl IntoIterator<Item = ComponentRating>,
    ) -> Result<Self, RatingError> {
        let mut sheet = Self::new();
        for rating in ratings {
            ensure_known(catalog, &rating.component)?;
            sheet.ratings.insert(rating.component.clone(), rating);
        }
        Ok(sheet)
    }

    /// Sets the stars for a component, keeping any notes or photo already recorded.
    pub fn rate(
        &mut self,
        catalog: &ComponentCatalog,
        component: &ComponentId,
        rating: StarRating,
    ) -> Result<&ComponentRating, RatingError> {
        ensure_known(catalog, component)?;
        let entry = self
            .ratings
            .entry(component.clone())
            .and_modify(|existing| existing.rating = rating)
            .or_insert_with(|| ComponentRating::new(component.clone(), rating));
        Ok(entry)
    }

    pub fn annotate(
        &mut self,
        component: &ComponentId,
        notes: impl Into<String>,
    ) -> Result<(), RatingError> {
        let entry = self
            .ratings
            .get_mut(component)
            .ok_or_else(|| RatingError::NotRated(component.clone()))?;
        let notes = notes.into();
        entry.notes = if notes.trim().is_empty() {
            None
        } else {
            Some(notes)
        };
        Ok(())
    }

    /// Records the uploaded photo URL on a rated component. Unrated
    /// components are left untouched and reported back as `false`.
    pub fn attach_photo_ref(&mut self, component: &ComponentId, url: impl Into<String>) -> bool {
        match self.ratings.get_mut(component) {
            Some(entry) => {
                entry.photo_ref = Some(url.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, component: &ComponentId) -> Option<&ComponentRating> {
        self.ratings.get(component)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentRating> {
        self.ratings.values()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Required components without a rating, in catalog order.
    pub fn missing_required(&self, catalog: &ComponentCatalog) -> Vec<ComponentId> {
        catalog
            .required()
            .filter(|component| !self.ratings.contains_key(&component.id))
            .map(|component| component.id.clone())
            .collect()
    }

    pub fn into_ratings(self) -> Vec<ComponentRating> {
        self.ratings.into_values().collect()
    }
}

fn ensure_known<'a>(
    catalog: &'a ComponentCatalog,
    component: &ComponentId,
) -> Result<&'a ComponentDefinition, RatingError> {
    catalog
        .get(component)
        .ok_or_else(|| RatingError::UnknownComponent(component.clone()))
}

/// Facility being inspected; the name is burned into every watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityContext {
    pub location_id: String,
    pub location_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }

    /// Coordinates to six decimal places, as printed on watermarks.
    pub fn display_coordinates(&self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// Best-effort provenance attached to a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeoTag {
    pub fn new(point: GeoPoint, address: Option<String>) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
            address,
        }
    }

    /// The resolved address, or the raw coordinates when none resolved.
    pub fn display_line(&self) -> String {
        match &self.address {
            Some(address) => address.clone(),
            None => format!("{:.6}, {:.6}", self.lat, self.lng),
        }
    }
}

/// Where a photo belongs on the inspection form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "component", rename_all = "snake_case")]
pub enum PhotoSlot {
    /// Documentation photo of the facility as a whole.
    General,
    Component(ComponentId),
}

impl PhotoSlot {
    pub fn component(&self) -> Option<&ComponentId> {
        match self {
            PhotoSlot::General => None,
            PhotoSlot::Component(id) => Some(id),
        }
    }

    pub fn key_fragment(&self) -> String {
        match self {
            PhotoSlot::General => "general".to_string(),
            PhotoSlot::Component(id) => id.as_str().to_string(),
        }
    }
}

impl fmt::Display for PhotoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoSlot::General => f.write_str("general"),
            PhotoSlot::Component(id) => write!(f, "component:{id}"),
        }
    }
}

/// A photo as captured on the device, before any processing.
#[derive(Clone, PartialEq)]
pub struct PhotoCapture {
    pub slot: PhotoSlot,
    pub bytes: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl fmt::Debug for PhotoCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoCapture")
            .field("slot", &self.slot)
            .field("bytes", &self.bytes.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// How much of the pipeline a photo made it through before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PhotoProcessing {
    Watermarked,
    /// Processing failed, so the captured bytes are uploaded unchanged.
    OriginalFallback(String),
}

/// Finalised photo ready to upload. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct PhotoEvidence {
    slot: PhotoSlot,
    bytes: Vec<u8>,
    captured_at: DateTime<Utc>,
    geotag: Option<GeoTag>,
    processing: PhotoProcessing,
}

impl PhotoEvidence {
    pub(crate) fn new(
        slot: PhotoSlot,
        bytes: Vec<u8>,
        captured_at: DateTime<Utc>,
        geotag: Option<GeoTag>,
        processing: PhotoProcessing,
    ) -> Self {
        Self {
            slot,
            bytes,
            captured_at,
            geotag,
            processing,
        }
    }

    pub fn slot(&self) -> &PhotoSlot {
        &self.slot
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn geotag(&self) -> Option<&GeoTag> {
        self.geotag.as_ref()
    }

    pub fn processing(&self) -> &PhotoProcessing {
        &self.processing
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for PhotoEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoEvidence")
            .field("slot", &self.slot)
            .field("bytes", &self.bytes.len())
            .field("captured_at", &self.captured_at)
            .field("geotag", &self.geotag)
            .field("processing", &self.processing)
            .finish()
    }
}
