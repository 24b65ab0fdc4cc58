use super::*;
use axum::{Extension, Router, body::Body, http::Request, routing::get};
use jsonwebtoken::{EncodingKey, Header, encode};
use tower::ServiceExt;

pub(crate) const TEST_JWT_SECRET: &str = "supersecretjwtsecretforunittesting123";

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    aud: &'a str,
    email: Option<&'a str>,
    exp: usize,
}

fn token_with(secret: &str, sub: &str, email: Option<&str>, exp: usize) -> String {
    let claims = TestClaims {
        sub,
        role: "authenticated",
        aud: "authenticated",
        email,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// `Authorization` header value for a valid session.
pub(crate) fn bearer_for(user_id: Uuid, email: &str) -> String {
    format!(
        "Bearer {}",
        token_with(
            TEST_JWT_SECRET,
            &user_id.to_string(),
            Some(email),
            9_999_999_999
        )
    )
}

#[test]
fn test_validate_supabase_jwt_success() {
    let sub = "123e4567-e89b-12d3-a456-426614174000";
    let token = token_with(TEST_JWT_SECRET, sub, Some("test@example.com"), 9_999_999_999);

    let claims = validate_supabase_jwt(&token, TEST_JWT_SECRET).expect("Valid token should pass");
    assert_eq!(claims.sub, sub);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let token = token_with(
        TEST_JWT_SECRET,
        "123e4567-e89b-12d3-a456-426614174000",
        Some("test@example.com"),
        1,
    );

    assert!(validate_supabase_jwt(&token, TEST_JWT_SECRET).is_err());
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let token = token_with(
        "wrongsecret",
        "123e4567-e89b-12d3-a456-426614174000",
        Some("test@example.com"),
        9_999_999_999,
    );

    assert!(validate_supabase_jwt(&token, TEST_JWT_SECRET).is_err());
}

async fn whoami(auth: Option<AuthUser>) -> String {
    match auth {
        Some(user) => format!("{}|{}", user.user_id, user.email.unwrap_or_default()),
        None => "anonymous".to_string(),
    }
}

fn app() -> Router {
    Router::new()
        .route("/whoami", get(whoami))
        .layer(Extension(Arc::new(JwtSecret(TEST_JWT_SECRET.to_string()))))
}

async fn call(authorization: Option<String>) -> String {
    let mut request = Request::builder().uri("/whoami");
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }

    let response = app()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
async fn extractor_reads_user_from_bearer_token() {
    let user_id = Uuid::new_v4();

    let body = call(Some(bearer_for(user_id, "jane@example.com"))).await;
    assert_eq!(body, format!("{user_id}|jane@example.com"));
}

#[tokio::test]
async fn optional_extractor_degrades_to_anonymous() {
    assert_eq!(call(None).await, "anonymous");
    assert_eq!(call(Some("Bearer not-a-jwt".to_string())).await, "anonymous");
    assert_eq!(call(Some("Basic abc".to_string())).await, "anonymous");
}
