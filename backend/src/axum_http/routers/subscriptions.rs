use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{
        checkout::CheckoutUseCase, plan_resolver::PlanResolver, stripe_gateway::StripeGateway,
    },
};
use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use certlist_core::{
    domain::{
        repositories::entitlements::EntitlementRepository,
        value_objects::{
            plans::PlanCatalog,
            subscriptions::{
                CheckoutRequestModel, CheckoutSessionDto, EffectivePlanDto, PlanListingDto,
            },
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::entitlements::EntitlementPostgres,
    },
    payments::stripe_client::StripeClient,
};
use std::sync::Arc;

pub struct SubscriptionUseCases<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    pub plan_resolver: PlanResolver<E, G>,
    pub checkout: CheckoutUseCase<E, G>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    catalog: Arc<PlanCatalog>,
) -> Router {
    let entitlement_repository = Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool)));

    router(Arc::new(SubscriptionUseCases {
        plan_resolver: PlanResolver::new(
            Arc::clone(&entitlement_repository),
            Arc::clone(&stripe_client),
            catalog,
        ),
        checkout: CheckoutUseCase::new(entitlement_repository, stripe_client),
    }))
}

pub fn router<E, G>(usecases: Arc<SubscriptionUseCases<E, G>>) -> Router
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    Router::new()
        .route("/current", get(current_plan::<E, G>))
        .route("/plans", get(list_plans::<E, G>))
        .route("/checkout", post(checkout::<E, G>))
        .with_state(usecases)
}

/// Anonymous callers and every failure path answer `{ "plan": "Free" }`.
pub async fn current_plan<E, G>(
    State(usecases): State<Arc<SubscriptionUseCases<E, G>>>,
    auth: Option<AuthUser>,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    let session = auth.map(|user| user.session());
    let plan = usecases
        .plan_resolver
        .get_effective_plan(session.as_ref())
        .await;

    Json(EffectivePlanDto::from(&plan))
}

pub async fn list_plans<E, G>(
    State(usecases): State<Arc<SubscriptionUseCases<E, G>>>,
    auth: Option<AuthUser>,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    let session = auth.map(|user| user.session());
    let current = usecases
        .plan_resolver
        .get_effective_plan(session.as_ref())
        .await;

    let plans: Vec<PlanListingDto> = usecases
        .plan_resolver
        .catalog()
        .tiers()
        .iter()
        .map(|tier| PlanListingDto::for_tier(tier, current.name))
        .collect();

    Json(plans)
}

pub async fn checkout<E, G>(
    State(usecases): State<Arc<SubscriptionUseCases<E, G>>>,
    auth: Option<AuthUser>,
    Json(checkout_request): Json<CheckoutRequestModel>,
) -> Result<impl IntoResponse, AppError>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    let session = auth.map(|user| user.session());
    let url = usecases
        .checkout
        .initiate_checkout(session.as_ref(), checkout_request.price_id.trim())
        .await?;

    Ok(Json(CheckoutSessionDto { url }))
}
