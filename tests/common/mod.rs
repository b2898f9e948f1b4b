#![allow(dead_code)]

use std::sync::Arc;

use aws_cognito_auth::{
    IdpDispatcher, MemoryStorage, PoolConfig, Storage, UserPool,
};

pub mod idp;
pub mod jwt;

pub use idp::ScriptedIdp;

pub const POOL_ID: &str = "us-east-1_TestPool";
pub const CLIENT_ID: &str = "test-client-id";

/// A pool wired to a scripted identity provider and a private in-memory store.
pub fn pool(idp: &Arc<ScriptedIdp>) -> UserPool {
    pool_with_storage(idp, &Arc::new(MemoryStorage::new()))
}

/// A pool wired to a scripted identity provider and a shared store, for tests
/// that span several user handles.
pub fn pool_with_storage(idp: &Arc<ScriptedIdp>, storage: &Arc<MemoryStorage>) -> UserPool {
    UserPool::new(PoolConfig {
        user_pool_id: POOL_ID.to_string(),
        client_id: CLIENT_ID.to_string(),
        storage: Some(Arc::clone(storage) as Arc<dyn Storage>),
        dispatcher: Some(Arc::clone(idp) as Arc<dyn IdpDispatcher>),
        ..PoolConfig::default()
    })
    .expect("test pool configuration should be valid")
}

/// The storage key for one of a user's cached items.
pub fn user_key(username: &str, item: &str) -> String {
    format!("CognitoIdentityServiceProvider.{CLIENT_ID}.{username}.{item}")
}

pub fn last_auth_user_key() -> String {
    format!("CognitoIdentityServiceProvider.{CLIENT_ID}.LastAuthUser")
}
