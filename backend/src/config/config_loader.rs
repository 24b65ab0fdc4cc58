use anyhow::{Context, Result, anyhow, bail};
use certlist_core::{
    domain::value_objects::plans::PaidPriceIds, payments::webhook_signature::DEFAULT_TOLERANCE_SECS,
};
use std::str::FromStr;

use super::config_model::{BackendServer, Database, DotEnvyConfig, Stripe, Supabase};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("{key} is invalid"))
    };
    let parsed = |key: &str| -> Result<u64> {
        let raw = required(key)?;
        u64::from_str(&raw).with_context(|| format!("{key} must be a number"))
    };

    let backend_server = BackendServer {
        port: u16::try_from(parsed("SERVER_PORT_BACKEND")?)
            .context("SERVER_PORT_BACKEND is out of range")?,
        body_limit: parsed("SERVER_BODY_LIMIT")?,
        timeout: parsed("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let webhook_tolerance_secs = match lookup("STRIPE_WEBHOOK_TOLERANCE_SECS") {
        Some(raw) if !raw.trim().is_empty() => u64::from_str(raw.trim())
            .context("STRIPE_WEBHOOK_TOLERANCE_SECS must be a non-negative number")?,
        _ => DEFAULT_TOLERANCE_SECS,
    };

    let prices = PaidPriceIds {
        basic: required("STRIPE_PRICE_BASIC")?,
        premium: required("STRIPE_PRICE_PREMIUM")?,
        enterprise: required("STRIPE_PRICE_ENTERPRISE")?,
    };
    if let Some(price_id) = prices.duplicate() {
        bail!("STRIPE_PRICE_* values must be distinct, {price_id} is used twice");
    }

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_secs,
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        prices,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        supabase,
        stripe,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT_BACKEND", "8080"),
            ("SERVER_BODY_LIMIT", "10"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost:5432/db"),
            ("SUPABASE_JWT_SECRET", "jwt-secret"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
            ("STRIPE_SUCCESS_URL", "https://app.example/success"),
            ("STRIPE_CANCEL_URL", "https://app.example/cancel"),
            ("STRIPE_PRICE_BASIC", "price_basic"),
            ("STRIPE_PRICE_PREMIUM", "price_premium"),
            ("STRIPE_PRICE_ENTERPRISE", "price_enterprise"),
        ])
    }

    fn load_from(vars: &HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn loads_complete_config() {
        let config = load_from(&base_vars()).unwrap();

        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.stripe.prices.premium, "price_premium");
        assert_eq!(config.stripe.webhook_tolerance_secs, DEFAULT_TOLERANCE_SECS);
    }

    #[test]
    fn missing_key_is_named_in_error() {
        let mut vars = base_vars();
        vars.remove("STRIPE_WEBHOOK_SECRET");

        let err = load_from(&vars).unwrap_err();
        assert!(err.to_string().contains("STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let mut vars = base_vars();
        vars.insert("SERVER_PORT_BACKEND", "http");

        let err = load_from(&vars).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT_BACKEND"));
    }

    #[test]
    fn custom_webhook_tolerance() {
        let mut vars = base_vars();
        vars.insert("STRIPE_WEBHOOK_TOLERANCE_SECS", "60");

        assert_eq!(load_from(&vars).unwrap().stripe.webhook_tolerance_secs, 60);
    }

    #[test]
    fn rejects_negative_webhook_tolerance() {
        let mut vars = base_vars();
        vars.insert("STRIPE_WEBHOOK_TOLERANCE_SECS", "-5");

        let err = load_from(&vars).unwrap_err();
        assert!(err.to_string().contains("STRIPE_WEBHOOK_TOLERANCE_SECS"));
    }

    #[test]
    fn rejects_price_shared_between_tiers() {
        let mut vars = base_vars();
        vars.insert("STRIPE_PRICE_ENTERPRISE", "price_premium");

        let err = load_from(&vars).unwrap_err();
        assert!(err.to_string().contains("price_premium"));
    }
}
