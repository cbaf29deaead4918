//! Drives the registration HTTP surface (spec.md \S4.2 exposed over
//! `coinjoin_node::http::router`) in-process with `tower::ServiceExt::oneshot`,
//! without binding a socket or spawning the binary.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use coinjoin_clients::HttpExchangeRateProvider;
use coinjoin_core::denomination::ExchangeRateSource;
use coinjoin_core::fee::FeeRateSource;
use coinjoin_core::round::RoundParams;
use coinjoin_core::{CoreError, Phase, PhaseBroadcaster, RoundState};
use coinjoin_node::http::{router, AppState};
use coinjoin_scheduler::PhaseScheduler;
use coinjoin_types::Amount;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct UnreachableFeeSource;

#[async_trait::async_trait]
impl FeeRateSource for UnreachableFeeSource {
    async fn estimate_btc_per_kvbyte(&self, _cancel: CancellationToken) -> coinjoin_core::error::Result<f64> {
        Err(CoreError::ExternalUnavailable("not wired up in this test".into()))
    }
}

fn test_scheduler() -> PhaseScheduler {
    PhaseScheduler::new(
        coinjoin_core::Config::default(),
        PhaseBroadcaster::default(),
        Arc::new(UnreachableFeeSource),
        // A real client type, never actually called — just proves the
        // router doesn't care which `ExchangeRateSource` impl backs it.
        Arc::new(HttpExchangeRateProvider::new("http://127.0.0.1:0/unused")) as Arc<dyn ExchangeRateSource>,
    )
}

fn app_with_round_in(phase: Phase) -> (axum::Router, Arc<RoundState>) {
    let scheduler = Arc::new(test_scheduler());
    let round = scheduler.round();
    round.begin_round(
        RoundParams {
            denomination: Amount::from_sat(100_000),
            fee_per_input: Amount::from_sat(100),
            fee_per_output: Amount::from_sat(50),
            anonymity_target: 2,
        },
        false,
    );
    round.set_phase(phase);
    round.set_accepting(true);
    (router(AppState { round: round.clone(), scheduler }), round)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn round_status_reports_the_current_phase() {
    let (app, _round) = app_with_round_in(Phase::InputRegistration);

    let response = app
        .oneshot(Request::builder().uri("/rounds/current").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], "InputRegistration");
    assert_eq!(body["a_entries"], 0);
}

#[tokio::test]
async fn register_a_then_find_a_round_trips_through_http() {
    let (app, _round) = app_with_round_in(Phase::InputRegistration);

    let register_request = Request::builder()
        .method("POST")
        .uri("/rounds/current/inputs")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "inputs": [{"txid_hex": "00".repeat(32), "vout": 0, "amount_sat": 200_000}],
                "change_output_hex": "aa"
            })
            .to_string(),
        ))
        .unwrap();
    let register_response = app.clone().oneshot(register_request).await.unwrap();
    assert_eq!(register_response.status(), StatusCode::OK);
    let registered = body_json(register_response).await;
    let id = registered["id"].as_str().unwrap().to_string();

    let find_response = app
        .oneshot(Request::builder().uri(format!("/rounds/current/inputs/{id}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(find_response.status(), StatusCode::OK);
    let entry = body_json(find_response).await;
    assert_eq!(entry["change_amount"], 99_850);
}

#[tokio::test]
async fn register_a_outside_input_registration_is_rejected_with_409() {
    let (app, _round) = app_with_round_in(Phase::Signing);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rounds/current/inputs")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "inputs": [{"txid_hex": "00".repeat(32), "vout": 0, "amount_sat": 200_000}],
                        "change_output_hex": "aa"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn find_a_for_an_unknown_id_is_404() {
    let (app, _round) = app_with_round_in(Phase::InputRegistration);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/rounds/current/inputs/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn advance_phase_cancels_the_schedulers_current_phase_wait() {
    let (app, _round) = app_with_round_in(Phase::InputRegistration);

    let response = app
        .oneshot(Request::builder().method("POST").uri("/rounds/current/advance").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
