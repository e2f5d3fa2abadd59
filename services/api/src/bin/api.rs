//! services/api/src/bin/api.rs

use api_lib::{
    adapters::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        books::{
            create_book_handler, delete_book_handler, get_book_handler, list_books_handler,
            my_books_handler,
        },
        contacts::{get_contact_handler, share_contact_handler},
        health_handler,
        middleware::require_auth,
        notifications::{
            list_notifications_handler, mark_all_notifications_read_handler,
            mark_notification_read_handler,
        },
        requests::{
            create_request_handler, incoming_requests_handler, outgoing_requests_handler,
            respond_request_handler,
        },
        rest::ApiDoc,
        state::AppState,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use bridgebook_core::{contact::ContactExchangeFlow, lifecycle::RequestLifecycle};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Wire the Core Flows Over the Adapter ---
    let lifecycle = Arc::new(RequestLifecycle::new(db.clone(), db.clone(), db.clone()));
    let contacts = Arc::new(ContactExchangeFlow::new(db.clone(), db.clone(), db.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        books: db.clone(),
        requests: db.clone(),
        notifications: db.clone(),
        auth: db.clone(),
        lifecycle,
        contacts,
        config: config.clone(),
    });

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/books", get(list_books_handler).post(create_book_handler))
        .route("/books/mine", get(my_books_handler))
        .route(
            "/books/{id}",
            get(get_book_handler).delete(delete_book_handler),
        )
        .route("/requests", post(create_request_handler))
        .route("/requests/incoming", get(incoming_requests_handler))
        .route("/requests/outgoing", get(outgoing_requests_handler))
        .route("/requests/{id}/respond", post(respond_request_handler))
        .route(
            "/requests/{id}/contact",
            get(get_contact_handler).put(share_contact_handler),
        )
        .route("/notifications", get(list_notifications_handler))
        .route(
            "/notifications/read-all",
            post(mark_all_notifications_read_handler),
        )
        .route(
            "/notifications/{id}/read",
            post(mark_notification_read_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
