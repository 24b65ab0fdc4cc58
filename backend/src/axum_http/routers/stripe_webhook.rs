use crate::{
    axum_http::error_responses::AppError,
    usecases::{
        stripe_gateway::StripeGateway,
        stripe_webhook::{StripeWebhookUseCase, WebhookOutcome},
    },
};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use certlist_core::{
    domain::{
        repositories::{app_users::AppUserRepository, entitlements::EntitlementRepository},
        value_objects::plans::PlanCatalog,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{app_users::AppUserPostgres, entitlements::EntitlementPostgres},
    },
    payments::{stripe_client::StripeClient, webhook_signature::WebhookVerifier},
};
use std::sync::Arc;
use tracing::debug;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    verifier: WebhookVerifier,
    catalog: Arc<PlanCatalog>,
) -> Router {
    let entitlement_repository = EntitlementPostgres::new(Arc::clone(&db_pool));
    let app_user_repository = AppUserPostgres::new(Arc::clone(&db_pool));

    router(Arc::new(StripeWebhookUseCase::new(
        Arc::new(entitlement_repository),
        Arc::new(app_user_repository),
        stripe_client,
        verifier,
        catalog,
    )))
}

pub fn router<E, U, G>(usecase: Arc<StripeWebhookUseCase<E, U, G>>) -> Router
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    Router::new()
        .route("/webhook", post(handle_webhook::<E, U, G>))
        .with_state(usecase)
}

/// Takes the raw body: the signature covers the exact bytes Stripe sent.
pub async fn handle_webhook<E, U, G>(
    State(usecase): State<Arc<StripeWebhookUseCase<E, U, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: AppUserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = usecase.handle(&body, signature).await?;
    if let WebhookOutcome::Applied { user_id } = outcome {
        debug!(%user_id, "stripe_webhook: acknowledged applied event");
    }

    Ok(StatusCode::OK)
}
