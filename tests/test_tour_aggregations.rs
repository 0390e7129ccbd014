mod common;

use axum::http::StatusCode;
use common::{TestEnv, SECRET_TOUR_NAME};
use serde_json::Value;

#[tokio::test]
async fn tour_stats_by_difficulty() {
    let env = TestEnv::start().await;
    env.seed().await;
    let server = env.server();

    let body: Value = server.get("/api/v1/tours/tour-stats").await.json();

    assert_eq!(body["status"], "success");
    assert!(body.get("results").is_none());
    let stats = body["data"]["stats"].as_array().unwrap();

    let groups: Vec<&str> = stats.iter().map(|s| s["_id"].as_str().unwrap()).collect();
    assert_eq!(groups, vec!["EASY", "MEDIUM"]);

    let easy = &stats[0];
    assert_eq!(easy["numTours"], 4);
    assert_eq!(easy["minPrice"], 397.0);
    assert_eq!(easy["maxPrice"], 1997.0);
    assert_eq!(easy["avgPrice"], 1272.0);

    let medium = &stats[1];
    assert_eq!(medium["numTours"], 3);
    assert!(easy["avgPrice"].as_f64() < medium["avgPrice"].as_f64());
}

#[tokio::test]
async fn tour_stats_skip_low_ratings() {
    let env = TestEnv::start().await;
    env.seed().await;
    let server = env.server();

    let mut low_rated = common::new_tour_json("The Rainy Day Walk");
    low_rated["ratingAverage"] = serde_json::json!(3.2);
    low_rated["difficulty"] = serde_json::json!("easy");
    server.post("/api/v1/tours").json(&low_rated).await;

    let body: Value = server.get("/api/v1/tours/tour-stats").await.json();
    assert_eq!(body["data"]["stats"][0]["numTours"], 4);
}

#[tokio::test]
async fn monthly_plan_for_year() {
    let env = TestEnv::start().await;
    env.seed().await;
    let server = env.server();

    let body: Value = server.get("/api/v1/tours/monthly-plan/2021").await.json();

    assert_eq!(body["status"], "success");
    assert_eq!(body["results"], 5);
    let monthly = body["data"]["monthly"].as_array().unwrap();
    assert_eq!(monthly.len(), 5);

    for group in monthly {
        assert!(group.get("_id").is_none());
        assert!(group["month"].is_number());
    }

    let counts: Vec<i64> = monthly
        .iter()
        .map(|g| g["numToursStarts"].as_i64().unwrap())
        .collect();
    let mut sorted = counts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(counts, sorted);

    // July: three visible starts, the secret tour's July start is not counted.
    let july = &monthly[0];
    assert_eq!(july["month"], 7);
    assert_eq!(july["numToursStarts"], 3);
    let tours: Vec<&str> = july["tours"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert!(tours.contains(&"The Sports Lover"));
    assert!(!tours.contains(&SECRET_TOUR_NAME));
}

#[tokio::test]
async fn monthly_plan_for_year_without_starts() {
    let env = TestEnv::start().await;
    env.seed().await;
    let server = env.server();

    let body: Value = server.get("/api/v1/tours/monthly-plan/1999").await.json();

    assert_eq!(body["results"], 0);
    assert_eq!(body["data"]["monthly"], serde_json::json!([]));
}

#[tokio::test]
async fn monthly_plan_rejects_malformed_year() {
    let env = TestEnv::start().await;
    let server = env.server_permissive();

    let response = server.get("/api/v1/tours/monthly-plan/20x1").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Invalid year: 20x1");
}
