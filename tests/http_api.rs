mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use cinema_booking::cache::CacheService;
use cinema_booking::config::Config;
use cinema_booking::{app, AppState};

use common::{cinema, Cinema};

async fn router(price: i64) -> (Router, Cinema) {
    let cinema = cinema(price, 2, 4).await;
    let config = Config::from_lookup(|_| None).unwrap();
    let state = AppState::new(cinema.store.clone(), CacheService::disabled(), config);
    (app(state), cinema)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn booking_body(showtime_id: i64, seat_ids: &[i64]) -> Value {
    json!({
        "showtime_id": showtime_id,
        "customer_name": "Budi Santoso",
        "customer_email": "budi@example.com",
        "customer_phone": "+62 811 2222 3333",
        "seat_ids": seat_ids,
    })
}

#[tokio::test]
async fn create_then_fetch_booking() {
    let (app, cinema) = router(50_000).await;
    let seats = cinema.seat_ids(2);

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(booking_body(cinema.showtime.id, &seats)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["total_price"], 100_000);
    assert_eq!(created["status"], "confirmed");
    assert_eq!(created["showtime"]["movie"]["title"], "Laskar Pelangi");

    let code = created["booking_code"].as_str().unwrap().to_string();
    let (status, fetched) = send(&app, Method::GET, &format!("/api/bookings/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["booking"]["booking_code"], code.as_str());
    assert_eq!(fetched["seats"].as_array().unwrap().len(), 2);

    let (status, list) = send(&app, Method::GET, "/api/bookings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn taken_seats_return_conflict_body() {
    let (app, cinema) = router(50_000).await;
    let seats = cinema.seat_ids(3);
    let uri = "/api/bookings";

    let (status, _) = send(&app, Method::POST, uri, Some(booking_body(cinema.showtime.id, &seats[..2]))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::POST, uri, Some(booking_body(cinema.showtime.id, &seats[1..]))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
    assert_eq!(body["error"]["seat_ids"], json!([seats[1]]));
}

#[tokio::test]
async fn invalid_requests_are_bad_request() {
    let (app, cinema) = router(50_000).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(booking_body(cinema.showtime.id, &[])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
    assert!(body["error"].get("seat_ids").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(json!({ "showtime_id": "soon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, _) = send(&app, Method::GET, "/api/showtimes/abc/seats", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let (app, cinema) = router(50_000).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(booking_body(cinema.showtime.id + 7, &cinema.seat_ids(1))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "showtime not found");

    let (status, _) = send(&app, Method::GET, "/api/bookings/BK000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::PUT, "/api/bookings/whatever/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/api/showtimes/999/seats", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_frees_seats_in_seat_map() {
    let (app, cinema) = router(30_000).await;
    let seats = cinema.seat_ids(2);
    let seat_map = format!("/api/showtimes/{}/seats", cinema.showtime.id);

    let (_, created) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(booking_body(cinema.showtime.id, &seats)),
    )
    .await;
    let code = created["booking_code"].as_str().unwrap().to_lowercase();

    let (_, map) = send(&app, Method::GET, &seat_map, None).await;
    let taken = map
        .as_array()
        .unwrap()
        .iter()
        .filter(|seat| seat["is_available"] == false)
        .count();
    assert_eq!(taken, 2);

    let (status, body) = send(&app, Method::PUT, &format!("/api/bookings/{code}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");
    assert!(body["message"].is_string());

    let (_, map) = send(&app, Method::GET, &seat_map, None).await;
    assert!(map
        .as_array()
        .unwrap()
        .iter()
        .all(|seat| seat["is_available"] == true));
    assert_eq!(map[0]["seat_number"], "A1");
}

#[tokio::test]
async fn catalog_round_trip() {
    let (app, _) = router(50_000).await;

    let (status, venue) = send(
        &app,
        Method::POST,
        "/api/venues",
        Some(json!({ "name": "XXI Plaza Senayan", "location": "Jakarta" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(venue["rating"], 4.5);
    let venue_id = venue["id"].as_i64().unwrap();

    let (status, movie) = send(
        &app,
        Method::POST,
        "/api/movies",
        Some(json!({ "title": "Ada Apa Dengan Cinta?", "duration": 112, "rating": "PG-13" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let movie_id = movie["id"].as_i64().unwrap();

    let (status, showtime) = send(
        &app,
        Method::POST,
        "/api/showtimes",
        Some(json!({
            "movie_id": movie_id,
            "venue_id": venue_id,
            "show_date": "2025-07-04",
            "show_time": "21:15:00",
            "price": 45000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(showtime["venue"]["name"], "XXI Plaza Senayan");

    let (status, seats) = send(
        &app,
        Method::POST,
        "/api/seats",
        Some(json!([
            { "venue_id": venue_id, "seat_number": "B2", "row": "B", "column": 2 },
            { "venue_id": venue_id, "seat_number": "A1", "row": "A", "column": 1, "seat_type": "vip" }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(seats.as_array().unwrap().len(), 2);

    let (_, listed) = send(&app, Method::GET, &format!("/api/seats?venue_id={venue_id}"), None).await;
    assert_eq!(listed[0]["seat_number"], "A1");
    assert_eq!(listed[0]["seat_type"], "vip");
    assert_eq!(listed[1]["seat_type"], "regular");

    let (status, filtered) = send(
        &app,
        Method::GET,
        &format!("/api/showtimes?venue_id={venue_id}&date=2025-07-04"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/api/showtimes?date=July", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/showtimes",
        Some(json!({
            "movie_id": 424242,
            "venue_id": venue_id,
            "show_date": "2025-07-04",
            "show_time": "21:15:00",
            "price": 45000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn movie_list_reports_cache_miss_without_redis() {
    let (app, _) = router(50_000).await;
    let response = app
        .clone()
        .oneshot(Request::get("/api/movies").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache"], "MISS");
}

#[tokio::test]
async fn health_and_banner() {
    let (app, _) = router(50_000).await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"], "disabled");

    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn venue_and_movie_updates_and_deletes() {
    let (app, cinema) = router(50_000).await;
    let venue_uri = format!("/api/venues/{}", cinema.showtime.venue_id);

    let (status, venue) = send(
        &app,
        Method::PUT,
        &venue_uri,
        Some(json!({ "name": "CGV Pacific Place", "location": "Jakarta", "rating": 4.8 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(venue["name"], "CGV Pacific Place");
    let (_, venues) = send(&app, Method::GET, "/api/venues", None).await;
    assert_eq!(venues[0]["name"], "CGV Pacific Place");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/movies/4242",
        Some(json!({ "title": "Ghost", "duration": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(booking_body(cinema.showtime.id, &cinema.seat_ids(1))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::DELETE, &venue_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");
    assert!(body["error"].get("seat_ids").is_none());

    let (status, movie) = send(
        &app,
        Method::POST,
        "/api/movies",
        Some(json!({ "title": "Marlina", "duration": 95 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let movie_uri = format!("/api/movies/{}", movie["id"]);
    let (status, body) = send(&app, Method::DELETE, &movie_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    let (status, _) = send(&app, Method::GET, &movie_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_seat_number_conflict_has_no_seat_list() {
    let (app, cinema) = router(50_000).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/seats",
        Some(json!([{
            "venue_id": cinema.showtime.venue_id,
            "seat_number": "A1",
            "row": "A",
            "column": 1
        }])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].get("seat_ids").is_none());
}
