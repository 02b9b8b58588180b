//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router,
    http::{
        HeaderValue, Method, StatusCode,
        header::{CONTENT_TYPE, InvalidHeaderValue},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    AppState,
    auth::{
        auth_guard, get_current_user, post_log_in, post_log_out, request_one_time_code, sign_up,
        verify_one_time_code,
    },
    endpoints,
    summary::get_monthly_summary_endpoint,
    transaction::{
        create_expense_endpoint, delete_expense_endpoint, edit_expense_endpoint,
        get_expenses_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::SIGN_UP, post(sign_up))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out))
        .route(
            endpoints::REQUEST_ONE_TIME_CODE,
            post(request_one_time_code),
        )
        .route(endpoints::VERIFY_ONE_TIME_CODE, post(verify_one_time_code))
        .route(
            endpoints::MONTHLY_SUMMARY,
            get(get_monthly_summary_endpoint),
        );

    let protected_routes = Router::new()
        .route(
            endpoints::EXPENSES,
            get(get_expenses_endpoint).post(create_expense_endpoint),
        )
        .route(endpoints::EXPENSE, put(edit_expense_endpoint))
        .route(endpoints::DELETE_EXPENSE, delete(delete_expense_endpoint))
        .route(endpoints::CURRENT_USER, get(get_current_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Build a CORS layer that lets the browser apps at `allowed_origins` send requests with
/// credentials.
///
/// # Errors
/// Returns an error if an origin is not a valid header value.
pub fn build_cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let origins = allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true))
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
        .into_response()
}


#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        app_state::get_test_app_state,
        auth::COOKIE_TOKEN,
        endpoints::{self, format_endpoint},
    };

    use super::build_router;

    const PASSWORD: &str = "correct horse battery staple";

    fn get_test_server() -> TestServer {
        TestServer::try_new(build_router(get_test_app_state())).expect("Could not create test server.")
    }

    async fn sign_up(server: &TestServer, name: &str) -> Cookie<'static> {
        let response = server
            .post(endpoints::SIGN_UP)
            .json(&json!({
                "name": name,
                "email": format!("{name}@example.com"),
                "password": PASSWORD,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        response.cookie(COOKIE_TOKEN)
    }

    #[tokio::test]
    async fn expenses_require_auth_cookie() {
        let server = get_test_server();

        let response = server.get(endpoints::EXPENSES).await;

        response.assert_status_unauthorized();
        response.assert_json(&json!({"error": "Unauthorized"}));
    }

    #[tokio::test]
    async fn tampered_cookie_is_forbidden() {
        let server = get_test_server();

        let response = server
            .get(endpoints::CURRENT_USER)
            .add_cookie(Cookie::new(COOKIE_TOKEN, "FOOBAR"))
            .await;

        response.assert_status_forbidden();
        response.assert_json(&json!({"error": "Invalid token"}));
    }

    #[tokio::test]
    async fn monthly_summary_does_not_require_auth() {
        let server = get_test_server();

        server
            .get(endpoints::MONTHLY_SUMMARY)
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nothing-here").await;

        response.assert_status_not_found();
        response.assert_json(&json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn shared_expense_flow() {
        let server = get_test_server();
        let alice_cookie = sign_up(&server, "alice").await;
        let bob_cookie = sign_up(&server, "bob").await;

        server
            .post(endpoints::EXPENSES)
            .add_cookie(alice_cookie.clone())
            .json(&json!({"amount": 30, "description": "Pizza @bob", "type": "give"}))
            .await
            .assert_json(&json!({"message": "Shared transaction recorded."}));

        let alice_expenses: Vec<Value> = server
            .get(endpoints::EXPENSES)
            .add_cookie(alice_cookie.clone())
            .await
            .json();
        let bob_expenses: Vec<Value> = server
            .get(endpoints::EXPENSES)
            .add_cookie(bob_cookie.clone())
            .await
            .json();
        assert_eq!(alice_expenses.len(), 1);
        assert_eq!(bob_expenses.len(), 1);
        assert_eq!(alice_expenses[0]["type"], "take");
        assert_eq!(alice_expenses[0]["amount"], 15.0);
        assert_eq!(bob_expenses[0]["type"], "give");
        assert_eq!(bob_expenses[0]["amount"], 15.0);
        assert_eq!(alice_expenses[0]["splitGroup"], bob_expenses[0]["splitGroup"]);

        let bob_transaction_id = bob_expenses[0]["_id"].as_i64().unwrap();
        server
            .delete(&format_endpoint(
                endpoints::DELETE_EXPENSE,
                bob_transaction_id,
            ))
            .add_cookie(alice_cookie.clone())
            .await
            .assert_status_not_found();
        server
            .delete(&format_endpoint(
                endpoints::DELETE_EXPENSE,
                bob_transaction_id,
            ))
            .add_cookie(bob_cookie)
            .await
            .assert_status_ok();

        let summary: Vec<Value> = server.get(endpoints::MONTHLY_SUMMARY).await.json();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0]["summary"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn current_user_after_log_in() {
        let server = get_test_server();
        sign_up(&server, "alice").await;

        let cookie = server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": "alice@example.com", "password": PASSWORD}))
            .await
            .cookie(COOKIE_TOKEN);
        let response = server
            .get(endpoints::CURRENT_USER)
            .add_cookie(cookie)
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"username": "alice"}));
    }
}
