//! Integration tests for the action protocol and the HTTP collaborators.
//!
//! Backends are in-process axum servers bound to 127.0.0.1:0.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kiosk_core::{
    load_board, ActionDispatcher, AgentTurnRequest, CatalogSource, DialogueClient,
    DialogueOutcome, HttpCatalog, HttpDialogueClient, HttpPayment, KioskError, MenuBoard,
    MenuItem, OrderCart, OrderRequest, PaymentGateway, ScreenState, Session,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("read local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

async fn closed_addr() -> SocketAddr {
    let reserved = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("reserve local addr");
    let addr = reserved.local_addr().expect("read reserved addr");
    drop(reserved);
    addr
}

fn board() -> MenuBoard {
    MenuBoard::new(vec![
        MenuItem::new("1", "불고기정식", 15000),
        MenuItem::new("2", "김치찌개", 12000),
        MenuItem::new("3", "냉면", 14000),
    ])
}

fn request(message: &str) -> AgentTurnRequest {
    AgentTurnRequest {
        session_id: "sess_test".into(),
        message: message.into(),
        store: "옥소반 마곡본점".into(),
        selected_names: vec![],
        profile: None,
    }
}

// ---------------------------------------------------------------------------
// Action protocol scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_select_and_set_quantity() {
    let dispatcher = ActionDispatcher::default();
    let mut session = Session::new("옥소반 마곡본점");
    let mut menu = board();

    let report = dispatcher.apply(
        &mut session,
        &mut menu,
        &[
            json!({"type": "SELECT_MENU_BY_NAME", "name": "불고기정식"}),
            json!({"type": "SET_QTY", "value": 2}),
        ],
    );

    assert_eq!(report.skipped, 0);
    assert_eq!(session.cart.len(), 1);
    let line = session.cart.get("1").expect("bulgogi in cart");
    assert_eq!(line.name, "불고기정식");
    assert_eq!(line.quantity, 2);
    assert_eq!(session.cart.total(), 30000);
}

#[test]
fn scenario_b_decrement_clamps_at_one() {
    let dispatcher = ActionDispatcher::default();
    let mut session = Session::new("옥소반 마곡본점");
    let mut menu = board();
    session.cart.add_or_set_quantity(&MenuItem::new("2", "김치찌개", 12000), 1);
    session.pending_item_id = Some("2".into());

    dispatcher.apply(&mut session, &mut menu, &[json!({"type": "DECREMENT_QTY"})]);
    assert_eq!(session.cart.get("2").map(|l| l.quantity), Some(1));

    dispatcher.apply(&mut session, &mut menu, &[json!({"type": "DECREMENT_QTY"})]);
    assert_eq!(session.cart.get("2").map(|l| l.quantity), Some(1));
    assert_eq!(session.cart.len(), 1);
}

#[test]
fn scenario_c_remove_missing_id_is_a_no_op() {
    let dispatcher = ActionDispatcher::default();
    let mut session = Session::new("옥소반 마곡본점");
    let mut menu = board();
    session.cart.add_or_set_quantity(&MenuItem::new("1", "불고기정식", 15000), 2);
    let before = session.cart.clone();

    let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "REMOVE_FROM_CART", "id": "X"})]);

    assert_eq!(report.skipped, 0);
    assert_eq!(session.cart, before);
}

#[test]
fn scenario_e_navigate_home_is_idempotent() {
    let dispatcher = ActionDispatcher::default();
    let mut session = Session::new("옥소반 마곡본점");
    let mut menu = board();
    session.screen.transition(ScreenState::Menu);

    let first = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "NAVIGATE", "target": "home"})]);
    assert!(first.navigated);
    assert_eq!(session.screen(), ScreenState::Intro);

    let second = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "NAVIGATE", "target": "home"})]);
    assert!(!second.navigated);
    assert_eq!(session.screen(), ScreenState::Intro);
}

#[test]
fn unknown_tags_are_transparent() {
    let valid = vec![
        json!({"type": "navigate", "target": "menu"}),
        json!({"type": "SELECT_MENU_BY_NAME", "name": "냉 면"}),
        json!({"type": "SET_QTY", "value": "3"}),
        json!({"type": "ADD_TO_CART"}),
    ];
    let mut with_unknown = valid.clone();
    with_unknown.insert(1, json!({"type": "CLARIFY", "question": "어떤 냉면이요?"}));
    with_unknown.push(json!({"type": "PLAY_JINGLE"}));

    let dispatcher = ActionDispatcher::default();

    let mut plain = Session::new("옥소반").with_id("sess_a");
    let mut plain_menu = board();
    dispatcher.apply(&mut plain, &mut plain_menu, &valid);

    let mut noisy = Session::new("옥소반").with_id("sess_a");
    let mut noisy_menu = board();
    let report = dispatcher.apply(&mut noisy, &mut noisy_menu, &with_unknown);

    assert_eq!(report.unknown, 2);
    assert_eq!(noisy.cart, plain.cart);
    assert_eq!(noisy.screen(), plain.screen());
    assert_eq!(noisy.cart.get("3").map(|l| l.quantity), Some(3));
}

#[test]
fn cart_total_survives_remove_and_readd() {
    let bulgogi = MenuItem::new("1", "불고기정식", 15000);
    let stew = MenuItem::new("2", "김치찌개", 12000);
    let mut cart = OrderCart::new();
    cart.add_or_set_quantity(&bulgogi, 2);
    cart.add_or_set_quantity(&stew, 1);
    let total = cart.total();

    cart.remove("1");
    assert_eq!(cart.total(), 12000);
    cart.add_or_set_quantity(&bulgogi, 2);
    assert_eq!(cart.total(), total);
    assert_eq!(cart.total(), cart.items().iter().map(|l| l.price * u64::from(l.quantity)).sum::<u64>());
}

// ---------------------------------------------------------------------------
// Dialogue client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dialogue_reply_round_trip() {
    let router = Router::new().route(
        "/agent/chat",
        post(|Json(body): Json<Value>| async move {
            let echoed = body["message"].as_str().unwrap_or_default().to_string();
            Json(json!({
                "reply": format!("{} 담았어요", echoed),
                "stage": "await_quantity",
                "actions": [{"type": "SELECT_MENU_BY_NAME", "name": "냉면"}],
                "sessionSeen": body["sessionId"],
            }))
        }),
    );
    let base = serve(router).await;
    let client = HttpDialogueClient::new(&base, "/agent/chat", Duration::from_secs(5)).unwrap();

    match client.send(&request("냉면")).await {
        DialogueOutcome::Reply(reply) => {
            assert_eq!(reply.speak, "냉면 담았어요");
            assert_eq!(reply.stage, "await_quantity");
            assert_eq!(reply.actions.len(), 1);
        }
        other => panic!("expected reply, got {:?}", other),
    }
}

#[tokio::test]
async fn dialogue_error_status_is_unreachable() {
    let router = Router::new().route(
        "/agent/chat",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = serve(router).await;
    let client = HttpDialogueClient::new(&base, "agent/chat", Duration::from_secs(5)).unwrap();
    assert!(matches!(client.send(&request("안녕")).await, DialogueOutcome::Unreachable(_)));
}

#[tokio::test]
async fn dialogue_closed_port_is_unreachable() {
    let addr = closed_addr().await;
    let client = HttpDialogueClient::new(&format!("http://{}", addr), "/agent/chat", Duration::from_secs(2)).unwrap();
    assert!(matches!(client.send(&request("안녕")).await, DialogueOutcome::Unreachable(_)));
}

#[tokio::test]
async fn dialogue_timeout_is_unreachable() {
    let router = Router::new().route(
        "/agent/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"reply": "too late"}))
        }),
    );
    let base = serve(router).await;
    let client = HttpDialogueClient::new(&base, "/agent/chat", Duration::from_millis(200)).unwrap();
    assert!(matches!(client.send(&request("안녕")).await, DialogueOutcome::Unreachable(_)));
}

#[tokio::test]
async fn dialogue_garbage_body_is_unreachable() {
    let router = Router::new().route("/agent/chat", post(|| async { "not json" }));
    let base = serve(router).await;
    let client = HttpDialogueClient::new(&base, "/agent/chat", Duration::from_secs(5)).unwrap();
    assert!(matches!(client.send(&request("안녕")).await, DialogueOutcome::Unreachable(_)));
}

// ---------------------------------------------------------------------------
// Catalog and payment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn catalog_fetches_by_store() {
    let router = Router::new().route(
        "/api/menu",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            let store = params.get("store").cloned().unwrap_or_default();
            Json(json!({
                "store": store,
                "menu": [
                    {"id": "b1", "name": format!("{} 불고기", store), "price": 15000},
                    {"name": "냉면", "price": 14000.0, "desc": "시원한"}
                ]
            }))
        }),
    );
    let base = serve(router).await;
    let catalog = HttpCatalog::new(base, Duration::from_secs(5)).unwrap();

    let items = catalog.fetch_menu("마곡").await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "마곡 불고기");
    assert_eq!(items[1].id, "냉면");
    assert_eq!(items[1].price, 14000);

    let board = load_board(&catalog, "마곡").await;
    assert_eq!(board.len(), 2);
}

#[tokio::test]
async fn catalog_failure_degrades_to_empty_board() {
    let router = Router::new().route(
        "/api/menu",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
    );
    let base = serve(router).await;
    let catalog = HttpCatalog::new(base, Duration::from_secs(5)).unwrap();

    assert!(matches!(
        catalog.fetch_menu("마곡").await,
        Err(KioskError::Status { status: 503, .. })
    ));
    assert!(load_board(&catalog, "마곡").await.is_empty());
}

fn order() -> OrderRequest {
    let mut cart = OrderCart::new();
    cart.add_or_set_quantity(&MenuItem::new("1", "불고기정식", 15000), 2);
    OrderRequest::from_cart("옥소반 마곡본점", &cart)
}

#[tokio::test]
async fn payment_accepts_success_status() {
    let router = Router::new().route(
        "/api/pay",
        post(|Json(body): Json<Value>| async move {
            let ok = body["items"][0]["quantity"] == 2 && body["store"] == "옥소반 마곡본점";
            let status = if ok { "success" } else { "bad_request" };
            Json(json!({ "status": status }))
        }),
    );
    let base = serve(router).await;
    let payment = HttpPayment::new(base, Duration::from_secs(5)).unwrap();
    assert!(payment.submit(&order()).await.is_ok());
}

#[tokio::test]
async fn payment_declines_and_errors() {
    let router = Router::new()
        .route("/api/pay", post(|| async { Json(json!({"success": false, "status": "declined"})) }));
    let base = serve(router).await;
    let payment = HttpPayment::new(base, Duration::from_secs(5)).unwrap();
    assert!(matches!(payment.submit(&order()).await, Err(KioskError::Payment(_))));

    let router = Router::new().route("/api/pay", post(|| async { StatusCode::BAD_GATEWAY }));
    let base = serve(router).await;
    let payment = HttpPayment::new(base, Duration::from_secs(5)).unwrap();
    assert!(matches!(payment.submit(&order()).await, Err(KioskError::Status { status: 502, .. })));
}

#[tokio::test]
async fn payment_empty_body_counts_as_success() {
    let router = Router::new().route("/api/pay", post(|| async { StatusCode::NO_CONTENT }));
    let base = serve(router).await;
    let payment = HttpPayment::new(base, Duration::from_secs(5)).unwrap();
    assert!(payment.submit(&order()).await.is_ok());
}
