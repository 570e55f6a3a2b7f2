//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, transactions};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Library circulation REST API: borrow requests, approvals, returns and fines",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Transactions
        transactions::list_transactions,
        transactions::get_transaction,
        transactions::create_transaction,
        transactions::approve_transaction,
        transactions::reject_transaction,
        transactions::return_transaction,
        transactions::extend_transaction,
        transactions::update_due_date,
        transactions::delete_transaction,
        transactions::clear_activities,
    ),
    components(
        schemas(
            // Transactions
            crate::models::transaction::Transaction,
            crate::models::transaction::TransactionDetails,
            crate::models::transaction::TransactionStatus,
            crate::models::transaction::BorrowRequest,
            transactions::TransactionListResponse,
            transactions::TransactionResponse,
            transactions::ReturnRequest,
            transactions::ReturnResponse,
            transactions::ExtendRequest,
            transactions::UpdateDueDateRequest,
            transactions::ClearActivitiesResponse,
            // Reference entities
            crate::models::book::Book,
            crate::models::user::User,
            crate::models::user::Role,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "transactions", description = "Borrow transaction lifecycle")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
