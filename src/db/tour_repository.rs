use async_trait::async_trait;
use bson::{doc, Document};

use crate::db::find_query::{FindQuery, Projection};
use crate::db::models::Tour;
use crate::error::AppError;

/// Fields never returned by read paths unless explicitly selected.
pub const HIDDEN_FIELDS: &[&str] = &["createdAt"];

/// Filter excluding secret tours.
pub fn not_secret() -> Document {
    doc! { "secretTour": { "$ne": true } }
}

/// Restrict `filter` to tours that are not secret.
pub fn visible_filter(filter: Document) -> Document {
    if filter.is_empty() {
        not_secret()
    } else {
        doc! { "$and": [filter, not_secret()] }
    }
}

/// Base find query for every tour listing.
pub fn visible_tours() -> FindQuery {
    FindQuery::new().find(not_secret())
}

/// Repository trait for tour persistence.
///
/// Reads return raw documents because projections may drop required fields.
/// Callers pass filters that already exclude secret tours.
#[async_trait]
pub trait TourRepository: Send + Sync {
    /// Run a find query and collect every matching document.
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, AppError>;

    /// Find the first document matching `filter`.
    async fn find_one(
        &self,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, AppError>;

    /// Insert a validated tour and return it with its new id.
    async fn create(&self, tour: Tour) -> Result<Tour, AppError>;

    /// Apply `set` to the first document matching `filter` and return the
    /// updated document, or `None` when nothing matched.
    async fn update_one(&self, filter: Document, set: Document)
        -> Result<Option<Document>, AppError>;

    /// Delete the first document matching `filter`. Returns whether one was
    /// removed.
    async fn delete_one(&self, filter: Document) -> Result<bool, AppError>;

    /// Run an aggregation pipeline.
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, AppError>;

    /// Bulk insert, used by the seed tool. Returns the number inserted.
    async fn insert_many(&self, tours: Vec<Tour>) -> Result<usize, AppError>;

    /// Remove every tour, secret ones included.
    async fn delete_all(&self) -> Result<u64, AppError>;

    /// Create the indexes the collection relies on.
    async fn ensure_indexes(&self) -> Result<(), AppError>;
}

/// MongoDB implementation of the TourRepository.
pub struct MongoTourRepository {
    collection: mongodb::Collection<Tour>,
}

impl MongoTourRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("tours"),
        }
    }

    fn raw(&self) -> mongodb::Collection<Document> {
        self.collection.clone_with_type()
    }
}

async fn collect(mut cursor: mongodb::Cursor<Document>) -> Result<Vec<Document>, AppError> {
    use futures::TryStreamExt;

    let mut documents = Vec::new();
    while let Some(doc) = cursor
        .try_next()
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
    {
        documents.push(doc);
    }
    Ok(documents)
}

#[async_trait]
impl TourRepository for MongoTourRepository {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, AppError> {
        use mongodb::options::FindOptions;

        let started = std::time::Instant::now();
        let filter = query.filter();

        let mut options = FindOptions::default();
        options.sort = query.sort_spec().cloned();
        options.projection = query.projection().clone().hiding(HIDDEN_FIELDS).to_document();
        options.skip = query.skip_count();
        options.limit = query.limit_count();

        let cursor = self
            .raw()
            .find(filter.clone())
            .with_options(options)
            .await
            .map_err(AppError::from)?;
        let documents = collect(cursor).await?;

        tracing::debug!(
            filter = %filter,
            results = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tour find finished"
        );
        Ok(documents)
    }

    async fn find_one(
        &self,
        filter: Document,
        projection: Projection,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::options::FindOneOptions;

        let started = std::time::Instant::now();

        let mut options = FindOneOptions::default();
        options.projection = projection.hiding(HIDDEN_FIELDS).to_document();

        let found = self
            .raw()
            .find_one(filter.clone())
            .with_options(options)
            .await
            .map_err(AppError::from)?;

        tracing::debug!(
            filter = %filter,
            found = found.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tour find_one finished"
        );
        Ok(found)
    }

    async fn create(&self, mut tour: Tour) -> Result<Tour, AppError> {
        let result = self
            .collection
            .insert_one(&tour)
            .await
            .map_err(AppError::from)?;

        tour.id = result.inserted_id.as_object_id();
        tracing::debug!(name = %tour.name, "Tour created");
        Ok(tour)
    }

    async fn update_one(
        &self,
        filter: Document,
        set: Document,
    ) -> Result<Option<Document>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let started = std::time::Instant::now();

        let mut options = FindOneAndUpdateOptions::default();
        options.return_document = Some(ReturnDocument::After);
        options.projection = Projection::All.hiding(HIDDEN_FIELDS).to_document();

        let updated = self
            .raw()
            .find_one_and_update(filter.clone(), doc! { "$set": set })
            .with_options(options)
            .await
            .map_err(AppError::from)?;

        tracing::debug!(
            filter = %filter,
            updated = updated.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tour update finished"
        );
        Ok(updated)
    }

    async fn delete_one(&self, filter: Document) -> Result<bool, AppError> {
        let result = self
            .collection
            .delete_one(filter)
            .await
            .map_err(AppError::from)?;
        Ok(result.deleted_count > 0)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, AppError> {
        let started = std::time::Instant::now();
        let stages = pipeline.len();

        let cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(AppError::from)?;
        let documents = collect(cursor).await?;

        tracing::debug!(
            stages,
            results = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tour aggregation finished"
        );
        Ok(documents)
    }

    async fn insert_many(&self, tours: Vec<Tour>) -> Result<usize, AppError> {
        if tours.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .insert_many(&tours)
            .await
            .map_err(AppError::from)?;
        Ok(result.inserted_ids.len())
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = self
            .collection
            .delete_many(doc! {})
            .await
            .map_err(AppError::from)?;
        Ok(result.deleted_count)
    }

    async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection
            .create_index(index)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
