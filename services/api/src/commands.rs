use crate::infra::{inspection_service, reverse_geocoder, InMemoryInspectionStore};
use chrono::Utc;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use site_inspector::config::AppConfig;
use site_inspector::error::AppError;
use site_inspector::workflows::inspection::{
    ComponentId, ComponentRating, FacilityContext, GeoPoint, InspectionRecordRequest,
    LocationAdapter, PhotoCapture, PhotoPipeline, PhotoProcessing, PhotoSlot, ReceiptView,
    ReportedPosition, StarRating, SubmissionError, SubmissionProgress, ValidationError,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Star rating as component=stars, e.g. odor=4 (repeatable)
    #[arg(long = "rating", value_parser = parse_rating, required = true)]
    pub(crate) ratings: Vec<(ComponentId, u8)>,
}

#[derive(Args, Debug)]
pub(crate) struct WatermarkArgs {
    /// Photo to process
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Where the watermarked JPEG is written
    #[arg(long)]
    pub(crate) output: PathBuf,
    /// Facility name printed on the photo
    #[arg(long)]
    pub(crate) location_name: String,
    /// Latitude of the capture position
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub(crate) lat: Option<f64>,
    /// Longitude of the capture position
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub(crate) lng: Option<f64>,
}

#[derive(Args, Debug)]
pub(crate) struct SubmitArgs {
    #[arg(long)]
    pub(crate) location_id: String,
    #[arg(long)]
    pub(crate) location_name: String,
    #[arg(long, default_value = "cli")]
    pub(crate) user_id: String,
    /// Star rating as component=stars (repeatable)
    #[arg(long = "rating", value_parser = parse_rating)]
    pub(crate) ratings: Vec<(ComponentId, u8)>,
    /// Photo as [component=]path; a bare path is the general photo (repeatable)
    #[arg(long = "photo", value_parser = parse_photo)]
    pub(crate) photos: Vec<(PhotoSlot, PathBuf)>,
    #[arg(long)]
    pub(crate) notes: Option<String>,
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub(crate) lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub(crate) lng: Option<f64>,
}

pub(crate) fn parse_rating(raw: &str) -> Result<(ComponentId, u8), String> {
    let (component, stars) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected component=stars, got '{raw}'"))?;
    let component = component.trim();
    if component.is_empty() {
        return Err(format!("missing component id in '{raw}'"));
    }
    let stars = stars
        .trim()
        .parse::<u8>()
        .map_err(|err| format!("invalid star count in '{raw}' ({err})"))?;
    Ok((ComponentId::new(component), stars))
}

pub(crate) fn parse_photo(raw: &str) -> Result<(PhotoSlot, PathBuf), String> {
    match raw.split_once('=') {
        Some((slot, path)) if !path.trim().is_empty() => {
            let slot = match slot.trim() {
                "" => return Err(format!("missing slot in '{raw}'")),
                "general" => PhotoSlot::General,
                component => PhotoSlot::Component(ComponentId::new(component)),
            };
            Ok((slot, PathBuf::from(path.trim())))
        }
        Some(_) => Err(format!("missing photo path in '{raw}'")),
        None => Ok((PhotoSlot::General, PathBuf::from(raw))),
    }
}

fn position(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, AppError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => GeoPoint::new(lat, lng).map(Some).ok_or_else(|| {
            AppError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("coordinates out of range: {lat}, {lng}"),
            ))
        }),
        _ => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) async fn run_catalog() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = inspection_service(&config, Arc::new(InMemoryInspectionStore::default()))?;
    let template = service.active_template().await?;

    println!("{} ({})", template.name, template.id);
    for definition in template.catalog.components() {
        println!(
            "  {:<22} {:<14} weight {:>4.2}{}{}",
            definition.id.as_str(),
            definition.category.label(),
            definition.weight,
            if definition.required { "  required" } else { "" },
            if definition.allow_photo { "  photo" } else { "" },
        );
    }
    Ok(())
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = inspection_service(&config, Arc::new(InMemoryInspectionStore::default()))?;

    let ratings = args
        .ratings
        .into_iter()
        .map(|(component, stars)| {
            StarRating::new(stars).map(|rating| ComponentRating::new(component, rating))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| SubmissionError::from(ValidationError::from(err)))?;

    let card = service.preview_score(ratings).await?;
    print_json(&card)
}

pub(crate) async fn run_watermark(args: WatermarkArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let point = position(args.lat, args.lng)?;
    let bytes = tokio::fs::read(&args.input).await?;

    let locations = LocationAdapter::from_config(reverse_geocoder(&config)?, &config.pipeline);
    let mut location = locations.locate(&ReportedPosition(point)).await;
    let mut pipeline = PhotoPipeline::new(&config.pipeline);
    let capture = PhotoCapture {
        slot: PhotoSlot::General,
        bytes,
        captured_at: Utc::now(),
    };
    let evidence = pipeline
        .process_photo(capture, &args.location_name, location.as_mut())
        .await;

    if let PhotoProcessing::OriginalFallback(reason) = evidence.processing() {
        eprintln!("watermark failed ({reason}); writing the original bytes");
    }
    tokio::fs::write(&args.output, evidence.bytes()).await?;
    println!("wrote {}", args.output.display());
    Ok(())
}

#[derive(Serialize)]
struct SubmitOutput {
    receipt: ReceiptView,
    record: Option<InspectionRecordRequest>,
}

pub(crate) async fn run_submit(args: SubmitArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let point = position(args.lat, args.lng)?;
    let store = Arc::new(InMemoryInspectionStore::default());
    let service = inspection_service(&config, store.clone())?;

    let facility = FacilityContext {
        location_id: args.location_id,
        location_name: args.location_name,
    };
    let mut session = service.open_session(facility, args.user_id).await?;
    for (component, stars) in &args.ratings {
        session
            .rate(component, *stars)
            .map_err(SubmissionError::from)?;
    }
    for (slot, path) in args.photos {
        let bytes = tokio::fs::read(&path).await?;
        session
            .attach_photo(PhotoCapture {
                slot,
                bytes,
                captured_at: Utc::now(),
            })
            .map_err(SubmissionError::from)?;
    }
    if let Some(notes) = args.notes {
        session.set_notes(notes);
    }

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let sink = |progress: SubmissionProgress| {
        bar.set_position(u64::from(progress.percentage));
        bar.set_message(format!(
            "{} {}/{}",
            progress.phase.label(),
            progress.current,
            progress.total
        ));
    };

    let outcome = service
        .submit(session, &ReportedPosition(point), &sink)
        .await;
    bar.finish_and_clear();
    let receipt = outcome?;

    let record = store
        .records()
        .into_iter()
        .find(|(id, _)| *id == receipt.record_id)
        .map(|(_, request)| request);
    print_json(&SubmitOutput {
        receipt: ReceiptView::from(&receipt),
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_component_ratings() {
        let (component, stars) = parse_rating("odor=4").expect("parsed");
        assert_eq!(component, ComponentId::new("odor"));
        assert_eq!(stars, 4);

        assert!(parse_rating("odor").is_err());
        assert!(parse_rating("=4").is_err());
        assert!(parse_rating("odor=many").is_err());
    }

    #[test]
    fn parses_photo_slots() {
        assert_eq!(
            parse_photo("shots/lobby.jpg").expect("parsed"),
            (PhotoSlot::General, PathBuf::from("shots/lobby.jpg"))
        );
        assert_eq!(
            parse_photo("floor_cleanliness=shots/floor.jpg").expect("parsed"),
            (
                PhotoSlot::Component(ComponentId::new("floor_cleanliness")),
                PathBuf::from("shots/floor.jpg")
            )
        );
        assert!(parse_photo("odor=").is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(position(Some(91.0), Some(0.0)).is_err());
        assert_eq!(position(None, None).expect("no position"), None);
    }
}
