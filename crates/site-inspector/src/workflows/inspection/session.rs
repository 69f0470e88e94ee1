use chrono::{DateTime, Utc};
use tracing::debug;

use super::catalog::ComponentId;
use super::domain::{FacilityContext, PhotoCapture, PhotoSlot, RatingError, RatingSheet, StarRating};
use super::scoring::ScoreCard;
use super::template::InspectionTemplate;

/// Problems the inspector can fix before anything leaves the device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing ratings for required components: {}", join_ids(.0))]
    MissingRequiredRatings(Vec<ComponentId>),
    #[error("at least one general documentation photo is required")]
    MissingDocumentationPhoto,
    #[error("no inspection template is configured")]
    MissingTemplate,
    #[error("component {0} does not accept photo evidence")]
    PhotoNotAllowed(ComponentId),
    #[error("photo for {0} is empty")]
    EmptyPhoto(PhotoSlot),
    #[error(transparent)]
    Rating(#[from] RatingError),
}

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One inspection form from open to submit. Nothing here is shared with
/// other sessions; dropping it discards every buffered photo.
#[derive(Debug, Clone)]
pub struct InspectionSession {
    template: InspectionTemplate,
    facility: FacilityContext,
    user_id: String,
    started_at: DateTime<Utc>,
    sheet: RatingSheet,
    photos: Vec<PhotoCapture>,
    notes: Option<String>,
}

pub(crate) struct SessionParts {
    pub(crate) template: InspectionTemplate,
    pub(crate) facility: FacilityContext,
    pub(crate) user_id: String,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) sheet: RatingSheet,
    pub(crate) photos: Vec<PhotoCapture>,
    pub(crate) notes: Option<String>,
}

impl InspectionSession {
    pub fn new(
        template: InspectionTemplate,
        facility: FacilityContext,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            template,
            facility,
            user_id: user_id.into(),
            started_at: Utc::now(),
            sheet: RatingSheet::new(),
            photos: Vec::new(),
            notes: None,
        }
    }

    /// Backdates the session start, e.g. when the form was opened on a
    /// client before being posted.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn template(&self) -> &InspectionTemplate {
        &self.template
    }

    pub fn facility(&self) -> &FacilityContext {
        &self.facility
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn sheet(&self) -> &RatingSheet {
        &self.sheet
    }

    pub fn photos(&self) -> &[PhotoCapture] {
        &self.photos
    }

    /// Rates a component and returns the recomputed score card.
    pub fn rate(&mut self, component: &ComponentId, stars: u8) -> Result<ScoreCard, ValidationError> {
        let rating = StarRating::new(stars)?;
        self.sheet.rate(&self.template.catalog, component, rating)?;
        Ok(self.score_card())
    }

    pub fn annotate(
        &mut self,
        component: &ComponentId,
        notes: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.sheet.annotate(component, notes)?;
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
    }

    pub fn attach_photo(&mut self, capture: PhotoCapture) -> Result<(), ValidationError> {
        if capture.bytes.is_empty() {
            return Err(ValidationError::EmptyPhoto(capture.slot));
        }
        if let PhotoSlot::Component(component) = &capture.slot {
            let definition = self
                .template
                .catalog
                .get(component)
                .ok_or_else(|| RatingError::UnknownComponent(component.clone()))?;
            if !definition.allow_photo {
                return Err(ValidationError::PhotoNotAllowed(component.clone()));
            }
        }
        self.photos.push(capture);
        Ok(())
    }

    pub fn score_card(&self) -> ScoreCard {
        ScoreCard::from_sheet(&self.template.catalog, &self.sheet)
    }

    /// Submission preconditions. Pure; touches no collaborator.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.sheet.missing_required(&self.template.catalog);
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequiredRatings(missing));
        }
        if !self
            .photos
            .iter()
            .any(|photo| photo.slot == PhotoSlot::General)
        {
            return Err(ValidationError::MissingDocumentationPhoto);
        }
        Ok(())
    }

    /// Cancels the form without any network traffic.
    pub fn discard(self) {
        debug!(
            location_id = %self.facility.location_id,
            photos = self.photos.len(),
            "inspection session discarded"
        );
    }

    pub(crate) fn into_parts(self) -> SessionParts {
        SessionParts {
            template: self.template,
            facility: self.facility,
            user_id: self.user_id,
            started_at: self.started_at,
            sheet: self.sheet,
            photos: self.photos,
            notes: self.notes,
        }
    }
}
