use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::slug::slugify;

/// Tour difficulty levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Difficult];

    /// Parse the stored (lowercase) representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

/// A tour as stored in the `tours` collection.
///
/// `createdAt` is hidden from default projections, so it is optional on
/// documents read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    /// Derived from `name`, see [`slugify`].
    #[serde(default)]
    pub slug: String,
    pub duration: f64,
    pub max_group_size: f64,
    pub difficulty: Difficulty,
    pub rating_average: f64,
    pub rating_quantity: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: String,
    pub image_cover: String,
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<bson::DateTime>,
    #[serde(default)]
    pub start_dates: Vec<bson::DateTime>,
    /// Secret tours never show up on any read path.
    #[serde(default)]
    pub secret_tour: bool,
    /// Revision counter.
    #[serde(rename = "__v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

/// The request payload for creating a tour.
///
/// Every field is optional so that missing required fields are reported by
/// the validator with their own message instead of a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTour {
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub max_group_size: Option<f64>,
    pub difficulty: Option<String>,
    pub rating_average: Option<f64>,
    pub rating_quantity: Option<f64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

/// The request payload for a partial tour update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPatch {
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub max_group_size: Option<f64>,
    pub difficulty: Option<String>,
    pub rating_average: Option<f64>,
    pub rating_quantity: Option<f64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

impl TourPatch {
    /// Build the `$set` document for the fields present in the patch.
    ///
    /// A new name also refreshes the slug. Text fields are trimmed the same
    /// way they are on creation.
    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();

        if let Some(name) = &self.name {
            set.insert("name", name.as_str());
            set.insert("slug", slugify(name));
        }
        if let Some(duration) = self.duration {
            set.insert("duration", duration);
        }
        if let Some(max_group_size) = self.max_group_size {
            set.insert("maxGroupSize", max_group_size);
        }
        if let Some(difficulty) = &self.difficulty {
            set.insert("difficulty", difficulty.as_str());
        }
        if let Some(rating_average) = self.rating_average {
            set.insert("ratingAverage", rating_average);
        }
        if let Some(rating_quantity) = self.rating_quantity {
            set.insert("ratingQuantity", rating_quantity);
        }
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(price_discount) = self.price_discount {
            set.insert("priceDiscount", price_discount);
        }
        if let Some(summary) = &self.summary {
            set.insert("summary", summary.trim());
        }
        if let Some(description) = &self.description {
            set.insert("description", description.trim());
        }
        if let Some(image_cover) = &self.image_cover {
            set.insert("imageCover", image_cover.trim());
        }
        if let Some(images) = &self.images {
            set.insert("images", images.clone());
        }
        if let Some(start_dates) = &self.start_dates {
            let dates: Vec<Bson> = start_dates
                .iter()
                .map(|d| Bson::DateTime(bson::DateTime::from_chrono(*d)))
                .collect();
            set.insert("startDates", dates);
        }
        if let Some(secret_tour) = self.secret_tour {
            set.insert("secretTour", secret_tour);
        }

        set
    }

    pub fn is_empty(&self) -> bool {
        self.to_set_document().is_empty()
    }
}

/// Declared kind of a tour field, used to cast query-string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Boolean,
    Date,
    Id,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Number => "Number",
            FieldKind::Text => "String",
            FieldKind::Boolean => "Boolean",
            FieldKind::Date => "Date",
            FieldKind::Id => "ObjectId",
        }
    }
}

/// A collection whose fields have declared kinds.
pub trait Schema {
    /// Kind of the field at `path`. Unknown fields are treated as text.
    fn field_kind(path: &str) -> FieldKind;
}

impl Schema for Tour {
    fn field_kind(path: &str) -> FieldKind {
        match path {
            "_id" | "id" => FieldKind::Id,
            "duration" | "maxGroupSize" | "ratingAverage" | "ratingQuantity" | "price"
            | "priceDiscount" | "__v" => FieldKind::Number,
            "secretTour" => FieldKind::Boolean,
            "createdAt" | "startDates" => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }
}

/// Filter matching a single tour by id.
pub fn id_filter(id: ObjectId) -> Document {
    doc! { "_id": id }
}
