use axum::extract::{Path, State};
use axum::http::StatusCode;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::envelope::Envelope;
use crate::api::errors::{AppJson, AppQuery};
use crate::app::AppState;
use crate::db::convert::{document_to_json, tour_to_json};
use crate::db::find_query::Projection;
use crate::db::models::{id_filter, NewTour, Tour, TourPatch};
use crate::db::pipelines::{monthly_plan_pipeline, parse_year, tour_stats_pipeline};
use crate::db::tour_repository::{visible_filter, visible_tours, TourRepository};
use crate::error::AppError;
use crate::models::tour_validator::{validate_new_tour, validate_tour_patch};
use crate::query::features::{QueryFeatures, QueryParams};

/// Parameters forced by the top-5-cheap alias.
const TOP_CHEAP_PRESET: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "price,ratingAverage"),
    ("fields", "price,ratingAverage,summary,duration,difficulty"),
];

fn parse_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::Cast {
        path: "_id".to_string(),
        value: raw.to_string(),
        expected: "ObjectId",
    })
}

fn tour_not_found(id: &str) -> AppError {
    AppError::not_found(format!("No tour found with ID {id}"))
}

/// List visible tours, narrowed by the query-string features.
pub async fn process_list_tours(
    repo: &dyn TourRepository,
    params: QueryParams,
) -> Result<Envelope, AppError> {
    let query = QueryFeatures::<Tour>::new(visible_tours(), params)
        .filter()?
        .sort()
        .limit_fields()?
        .paginate()
        .into_query();

    let tours = repo.find(&query).await?;
    Ok(Envelope::list(
        "tours",
        tours.into_iter().map(tour_to_json).collect(),
    ))
}

/// Override the caller's parameters with the top-5-cheap preset.
pub fn top_cheap_params(params: QueryParams) -> QueryParams {
    TOP_CHEAP_PRESET
        .iter()
        .fold(params, |params, (key, value)| params.with(key, *value))
}

pub async fn process_get_tour(repo: &dyn TourRepository, id: &str) -> Result<Envelope, AppError> {
    let object_id = parse_id(id)?;
    let tour = repo
        .find_one(visible_filter(id_filter(object_id)), Projection::All)
        .await?
        .ok_or_else(|| tour_not_found(id))?;
    Ok(Envelope::item("tour", tour_to_json(tour)))
}

pub async fn process_create_tour(
    repo: &dyn TourRepository,
    input: NewTour,
    now: DateTime<Utc>,
) -> Result<Envelope, AppError> {
    let tour = validate_new_tour(input, now).map_err(AppError::Validation)?;
    let created = repo.create(tour).await?;

    tracing::info!(name = %created.name, "Tour created");
    let document = bson::to_document(&created)?;
    Ok(Envelope::item("tour", tour_to_json(document)))
}

/// Apply a validated partial update. An empty patch returns the tour as is.
pub async fn process_update_tour(
    repo: &dyn TourRepository,
    id: &str,
    patch: TourPatch,
) -> Result<Envelope, AppError> {
    let object_id = parse_id(id)?;
    validate_tour_patch(&patch).map_err(AppError::Validation)?;

    let filter = visible_filter(id_filter(object_id));
    let set = patch.to_set_document();
    let updated = if set.is_empty() {
        repo.find_one(filter, Projection::All).await?
    } else {
        repo.update_one(filter, set).await?
    };

    let tour = updated.ok_or_else(|| tour_not_found(id))?;
    Ok(Envelope::item("tour", tour_to_json(tour)))
}

pub async fn process_delete_tour(repo: &dyn TourRepository, id: &str) -> Result<(), AppError> {
    let object_id = parse_id(id)?;
    if !repo.delete_one(visible_filter(id_filter(object_id))).await? {
        return Err(tour_not_found(id));
    }
    tracing::info!(id, "Tour deleted");
    Ok(())
}

pub async fn process_tour_stats(repo: &dyn TourRepository) -> Result<Envelope, AppError> {
    let stats = repo.aggregate(tour_stats_pipeline()).await?;
    Ok(Envelope::item(
        "stats",
        Value::Array(stats.into_iter().map(document_to_json).collect()),
    ))
}

pub async fn process_monthly_plan(
    repo: &dyn TourRepository,
    year: &str,
) -> Result<Envelope, AppError> {
    let year = parse_year(year)?;
    let monthly = repo.aggregate(monthly_plan_pipeline(year)?).await?;
    Ok(Envelope::list(
        "monthly",
        monthly.into_iter().map(document_to_json).collect(),
    ))
}

// -- Handlers --

/// GET /api/v1/tours
pub async fn list_tours_handler(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<Vec<(String, String)>>,
) -> Result<axum::Json<Envelope>, AppError> {
    let result = process_list_tours(state.tour_repo.as_ref(), params.into()).await?;
    Ok(axum::Json(result))
}

/// GET /api/v1/tours/top-5-cheap
pub async fn top_cheap_tours_handler(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<Vec<(String, String)>>,
) -> Result<axum::Json<Envelope>, AppError> {
    let params = top_cheap_params(params.into());
    let result = process_list_tours(state.tour_repo.as_ref(), params).await?;
    Ok(axum::Json(result))
}

/// GET /api/v1/tours/tour-stats
pub async fn tour_stats_handler(
    State(state): State<AppState>,
) -> Result<axum::Json<Envelope>, AppError> {
    let result = process_tour_stats(state.tour_repo.as_ref()).await?;
    Ok(axum::Json(result))
}

/// GET /api/v1/tours/monthly-plan/{year}
pub async fn monthly_plan_handler(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<axum::Json<Envelope>, AppError> {
    let result = process_monthly_plan(state.tour_repo.as_ref(), &year).await?;
    Ok(axum::Json(result))
}

/// GET /api/v1/tours/{id}
pub async fn get_tour_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::Json<Envelope>, AppError> {
    let result = process_get_tour(state.tour_repo.as_ref(), &id).await?;
    Ok(axum::Json(result))
}

/// POST /api/v1/tours
pub async fn create_tour_handler(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewTour>,
) -> Result<(StatusCode, axum::Json<Envelope>), AppError> {
    let result = process_create_tour(state.tour_repo.as_ref(), input, Utc::now()).await?;
    Ok((StatusCode::CREATED, axum::Json(result)))
}

/// PATCH /api/v1/tours/{id}
pub async fn update_tour_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(patch): AppJson<TourPatch>,
) -> Result<axum::Json<Envelope>, AppError> {
    let result = process_update_tour(state.tour_repo.as_ref(), &id, patch).await?;
    Ok(axum::Json(result))
}

/// DELETE /api/v1/tours/{id}
pub async fn delete_tour_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    process_delete_tour(state.tour_repo.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
