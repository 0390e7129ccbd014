use bson::{doc, Document};
use chrono::{NaiveDate, TimeZone, Utc};

use crate::db::tour_repository::not_secret;
use crate::error::AppError;

/// Minimum rating for a tour to count in the difficulty statistics.
pub const STATS_MIN_RATING: f64 = 4.5;

/// Difficulty group left out of the statistics.
pub const STATS_EXCLUDED_GROUP: &str = "DIFFICULT";

/// Months returned by the monthly plan.
pub const MONTHLY_PLAN_LIMIT: i64 = 5;

/// First stage of every tour pipeline.
pub fn visible_stage() -> Document {
    doc! { "$match": not_secret() }
}

/// Per-difficulty statistics over well-rated tours, cheapest group first.
pub fn tour_stats_pipeline() -> Vec<Document> {
    vec![
        visible_stage(),
        doc! { "$match": { "ratingAverage": { "$gte": STATS_MIN_RATING } } },
        doc! {
            "$group": {
                "_id": { "$toUpper": "$difficulty" },
                "numTours": { "$sum": 1 },
                "numRatings": { "$sum": "$ratingQuantity" },
                "avgRating": { "$avg": "$ratingAverage" },
                "avgPrice": { "$avg": "$price" },
                "minPrice": { "$min": "$price" },
                "maxPrice": { "$max": "$price" }
            }
        },
        doc! { "$sort": { "avgPrice": 1 } },
        doc! { "$match": { "_id": { "$ne": STATS_EXCLUDED_GROUP } } },
    ]
}

/// Tour starts per month of `year`, busiest months first.
pub fn monthly_plan_pipeline(year: i32) -> Result<Vec<Document>, AppError> {
    let start = year_start(year)?;
    let end = year_start(year + 1)?;

    Ok(vec![
        visible_stage(),
        doc! { "$unwind": "$startDates" },
        doc! {
            "$match": {
                "startDates": {
                    "$gte": bson::DateTime::from_chrono(start),
                    "$lt": bson::DateTime::from_chrono(end)
                }
            }
        },
        doc! {
            "$group": {
                "_id": { "$month": "$startDates" },
                "numToursStarts": { "$sum": 1 },
                "tours": { "$push": "$name" }
            }
        },
        doc! { "$addFields": { "month": "$_id" } },
        doc! { "$project": { "_id": 0 } },
        doc! { "$sort": { "numToursStarts": -1 } },
        doc! { "$limit": MONTHLY_PLAN_LIMIT },
    ])
}

/// Parse the `year` path segment. Only four-digit calendar years are accepted.
pub fn parse_year(raw: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|year| (1..=9999).contains(year))
        .ok_or_else(|| AppError::Cast {
            path: "year".to_string(),
            value: raw.to_string(),
            expected: "Number",
        })
}

fn year_start(year: i32) -> Result<chrono::DateTime<Utc>, AppError> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Utc.from_utc_datetime(&d))
        .ok_or_else(|| AppError::Internal(format!("Year {year} is out of range")))
}
