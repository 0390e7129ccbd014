use std::fmt;

use chrono::{DateTime, Utc};

use crate::db::models::{Difficulty, NewTour, Tour, TourPatch};
use crate::models::slug::slugify;

pub const NAME_MIN_LENGTH: usize = 10;
pub const NAME_MAX_LENGTH: usize = 30;
pub const DEFAULT_RATING_AVERAGE: f64 = 4.5;
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All field errors collected while validating one tour, in field order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tour validation failed: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Validate a creation request and build the tour to insert.
///
/// Applies defaults (`ratingAverage`, `ratingQuantity`, `createdAt`,
/// `secretTour`), trims text fields and derives the slug.
pub fn validate_new_tour(input: NewTour, now: DateTime<Utc>) -> Result<Tour, ValidationErrors> {
    let mut errors = Vec::new();

    let name = required(input.name.filter(|n| !n.is_empty()), "name", "Tour name is required", &mut errors);
    if let Some(name) = &name {
        check_name_length(name, &mut errors);
    }

    let duration = required(input.duration, "duration", "Tour duration is required", &mut errors);
    let max_group_size = required(
        input.max_group_size,
        "maxGroupSize",
        "Tour max group size is required",
        &mut errors,
    );

    let difficulty = required(
        input.difficulty,
        "difficulty",
        "Tour difficulty is required",
        &mut errors,
    )
    .and_then(|d| check_difficulty(&d, &mut errors));

    let rating_average = input.rating_average.unwrap_or(DEFAULT_RATING_AVERAGE);
    check_rating(rating_average, &mut errors);

    let price = required(input.price, "price", "Tour price is required", &mut errors);
    if let (Some(discount), Some(price)) = (input.price_discount, price) {
        if discount >= price {
            errors.push(FieldError::new(
                "priceDiscount",
                format!("Discount price ({discount}) must be below the regular price."),
            ));
        }
    }

    let summary = required_text(input.summary, "summary", "Tour summary is required", &mut errors);
    let description = required_text(
        input.description,
        "description",
        "Tour description is required",
        &mut errors,
    );
    let image_cover = required_text(
        input.image_cover,
        "imageCover",
        "Tour image cover is required",
        &mut errors,
    );
    let images = required(
        input.images.filter(|i| !i.is_empty()),
        "images",
        "Tour images are required",
        &mut errors,
    );

    match (
        name,
        duration,
        max_group_size,
        difficulty,
        price,
        summary,
        description,
        image_cover,
        images,
    ) {
        (
            Some(name),
            Some(duration),
            Some(max_group_size),
            Some(difficulty),
            Some(price),
            Some(summary),
            Some(description),
            Some(image_cover),
            Some(images),
        ) if errors.is_empty() => Ok(Tour {
            id: None,
            slug: slugify(&name),
            name,
            duration,
            max_group_size,
            difficulty,
            rating_average,
            rating_quantity: input.rating_quantity.unwrap_or(0.0),
            price,
            price_discount: input.price_discount,
            summary,
            description,
            image_cover,
            images,
            created_at: Some(bson::DateTime::from_chrono(input.created_at.unwrap_or(now))),
            start_dates: input
                .start_dates
                .unwrap_or_default()
                .into_iter()
                .map(bson::DateTime::from_chrono)
                .collect(),
            secret_tour: input.secret_tour.unwrap_or(false),
            version: Some(0),
        }),
        _ => Err(errors.into()),
    }
}

/// Re-run the field validators on the fields present in a patch.
///
/// The discount check only runs on creation, since a patch does not
/// necessarily carry the price it would be compared against.
pub fn validate_tour_patch(patch: &TourPatch) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if let Some(name) = &patch.name {
        if name.is_empty() {
            errors.push(FieldError::new("name", "Tour name is required"));
        } else {
            check_name_length(name, &mut errors);
        }
    }
    if let Some(difficulty) = &patch.difficulty {
        check_difficulty(difficulty, &mut errors);
    }
    if let Some(rating_average) = patch.rating_average {
        check_rating(rating_average, &mut errors);
    }
    for (value, field, message) in [
        (&patch.summary, "summary", "Tour summary is required"),
        (&patch.description, "description", "Tour description is required"),
        (&patch.image_cover, "imageCover", "Tour image cover is required"),
    ] {
        if matches!(value, Some(text) if text.trim().is_empty()) {
            errors.push(FieldError::new(field, message));
        }
    }
    if matches!(&patch.images, Some(images) if images.is_empty()) {
        errors.push(FieldError::new("images", "Tour images are required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

fn required<T>(
    value: Option<T>,
    field: &'static str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    if value.is_none() {
        errors.push(FieldError::new(field, message));
    }
    value
}

/// Trimmed text that must not be blank.
fn required_text(
    value: Option<String>,
    field: &'static str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let trimmed = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    required(trimmed, field, message, errors)
}

fn check_name_length(name: &str, errors: &mut Vec<FieldError>) {
    let length = name.chars().count();
    if length < NAME_MIN_LENGTH {
        errors.push(FieldError::new(
            "name",
            format!("Tour name should at least have {NAME_MIN_LENGTH} characters"),
        ));
    } else if length > NAME_MAX_LENGTH {
        errors.push(FieldError::new(
            "name",
            format!("Tour name should at most have {NAME_MAX_LENGTH} characters"),
        ));
    }
}

fn check_difficulty(value: &str, errors: &mut Vec<FieldError>) -> Option<Difficulty> {
    let difficulty = Difficulty::parse(value);
    if difficulty.is_none() {
        errors.push(FieldError::new(
            "difficulty",
            "Tour difficulty must be either: easy, medium, or difficult",
        ));
    }
    difficulty
}

fn check_rating(value: f64, errors: &mut Vec<FieldError>) {
    if value < MIN_RATING {
        errors.push(FieldError::new(
            "ratingAverage",
            "Tour should have a rating of at least 1.0",
        ));
    } else if value > MAX_RATING {
        errors.push(FieldError::new(
            "ratingAverage",
            "Tour should have a rating of at most 5.0",
        ));
    }
}
