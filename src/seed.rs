use chrono::{DateTime, Utc};

use crate::db::models::{NewTour, Tour};
use crate::db::tour_repository::TourRepository;
use crate::error::AppError;
use crate::models::tour_validator::validate_new_tour;

/// Parse a JSON array of tours and validate every entry.
///
/// Unknown keys (such as an `id` carried over from another store) are
/// ignored. The first invalid entry fails the whole file.
pub fn parse_tours(json: &str, now: DateTime<Utc>) -> Result<Vec<Tour>, AppError> {
    let inputs: Vec<NewTour> = serde_json::from_str(json)
        .map_err(|e| AppError::bad_request(format!("Invalid tours file: {e}")))?;

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            validate_new_tour(input, now)
                .map_err(|errors| AppError::bad_request(format!("Tour #{index}: {errors}")))
        })
        .collect()
}

/// Insert every tour in one batch. Returns the number inserted.
pub async fn import_tours(repo: &dyn TourRepository, tours: Vec<Tour>) -> Result<usize, AppError> {
    tracing::info!("Importing {} tours...", tours.len());
    let inserted = repo.insert_many(tours).await?;
    tracing::info!("Imported {} tours", inserted);
    Ok(inserted)
}

/// Remove every tour, secret ones included.
pub async fn delete_tours(repo: &dyn TourRepository) -> Result<u64, AppError> {
    let deleted = repo.delete_all().await?;
    tracing::info!("Deleted {} tours", deleted);
    Ok(deleted)
}
