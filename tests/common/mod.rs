#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bson::Document;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use natours::api::errors::ErrorMode;
use natours::app::{build_router, AppState};
use natours::db::find_query::{FindQuery, Projection};
use natours::db::models::Tour;
use natours::db::tour_repository::{MongoTourRepository, TourRepository};
use natours::error::AppError;
use natours::seed::parse_tours;

/// Static files served by the test router.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/public");

/// Sample tours: nine visible ones and one secret tour.
pub const SAMPLE_TOURS: &str = include_str!("../../dev-data/tours-simple.json");

pub const SECRET_TOUR_NAME: &str = "The Hidden Canyon Trail";

/// Holds the running MongoDB container and the Axum router wired to it.
///
/// The container is kept alive for as long as this struct lives.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    pub router: Router,
    pub repo: Arc<dyn TourRepository>,
}

impl TestEnv {
    /// Start MongoDB and build the router in production error mode.
    pub async fn start() -> Self {
        Self::start_with_mode(ErrorMode::Production).await
    }

    pub async fn start_with_mode(error_mode: ErrorMode) -> Self {
        let mongo_container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database(&format!("natours_test_{}", uuid::Uuid::new_v4().simple()));

        let repo: Arc<dyn TourRepository> = Arc::new(MongoTourRepository::new(&mongo_db));
        repo.ensure_indexes()
            .await
            .expect("Failed to create indexes");

        let app_state = AppState {
            tour_repo: repo.clone(),
            error_mode,
        };
        let router = build_router(app_state, STATIC_DIR);

        Self {
            _mongo: mongo_container,
            router,
            repo,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .try_build(self.router.clone())
            .expect("Failed to build TestServer")
    }

    /// Insert the sample tours directly through the repository.
    ///
    /// Each tour is created one minute after the previous one, so the last
    /// tour in the file is the newest.
    pub async fn seed(&self) -> usize {
        let now = chrono::Utc::now();
        let mut tours = parse_tours(SAMPLE_TOURS, now).expect("Sample tours are invalid");
        let count = tours.len() as i64;
        for (index, tour) in tours.iter_mut().enumerate() {
            let created = now - chrono::Duration::minutes(count - index as i64);
            tour.created_at = Some(bson::DateTime::from_chrono(created));
        }
        self.repo
            .insert_many(tours)
            .await
            .expect("Failed to seed tours")
    }

    /// Id of the first tour whose name matches, secret tours included.
    pub async fn tour_id(&self, name: &str) -> String {
        let tours = self
            .repo
            .find(&FindQuery::new().find(bson::doc! { "name": name }))
            .await
            .expect("Failed to look up tour");
        tours
            .first()
            .and_then(|t| t.get_object_id("_id").ok())
            .map(|id| id.to_hex())
            .unwrap_or_else(|| panic!("No tour named {name}"))
    }
}

/// Valid creation payload for a tour named `name`.
pub fn new_tour_json(name: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "duration": 8,
        "maxGroupSize": 12,
        "difficulty": "medium",
        "price": 1290,
        "summary": "A slow journey along the fjords of western Norway",
        "description": "Ferries, trains and a few long walks between them.",
        "imageCover": "tour-11-cover.jpg",
        "images": ["tour-11-1.jpg"],
        "startDates": ["2021-06-01T09:00:00Z"]
    })
}

// -- Stub repository for router tests that need no database --

/// What every stub repository call does.
#[derive(Clone)]
pub enum StubBehavior {
    Empty,
    Fail(AppError),
    Panic,
}

pub struct StubTourRepo {
    behavior: StubBehavior,
}

impl StubTourRepo {
    fn act<T: Default>(&self) -> Result<T, AppError> {
        match &self.behavior {
            StubBehavior::Empty => Ok(T::default()),
            StubBehavior::Fail(err) => Err(err.clone()),
            StubBehavior::Panic => panic!("stub repository exploded"),
        }
    }
}

#[async_trait]
impl TourRepository for StubTourRepo {
    async fn find(&self, _query: &FindQuery) -> Result<Vec<Document>, AppError> {
        self.act()
    }

    async fn find_one(
        &self,
        _filter: Document,
        _projection: Projection,
    ) -> Result<Option<Document>, AppError> {
        self.act()
    }

    async fn create(&self, tour: Tour) -> Result<Tour, AppError> {
        self.act::<()>()?;
        Ok(tour)
    }

    async fn update_one(
        &self,
        _filter: Document,
        _set: Document,
    ) -> Result<Option<Document>, AppError> {
        self.act()
    }

    async fn delete_one(&self, _filter: Document) -> Result<bool, AppError> {
        self.act()
    }

    async fn aggregate(&self, _pipeline: Vec<Document>) -> Result<Vec<Document>, AppError> {
        self.act()
    }

    async fn insert_many(&self, _tours: Vec<Tour>) -> Result<usize, AppError> {
        self.act()
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        self.act()
    }

    async fn ensure_indexes(&self) -> Result<(), AppError> {
        self.act()
    }
}

/// Router backed by a stub repository.
pub fn stub_server(error_mode: ErrorMode, behavior: StubBehavior) -> axum_test::TestServer {
    let app_state = AppState {
        tour_repo: Arc::new(StubTourRepo { behavior }),
        error_mode,
    };
    axum_test::TestServer::builder()
        .try_build(build_router(app_state, STATIC_DIR))
        .expect("Failed to build TestServer")
}
