pub mod checkout;
pub mod plan_resolver;
pub mod stripe_gateway;
pub mod stripe_webhook;

#[cfg(test)]
pub(crate) mod test_support;
