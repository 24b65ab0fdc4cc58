pub mod app_users;
pub mod entitlements;
