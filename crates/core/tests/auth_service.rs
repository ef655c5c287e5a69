//! Authentication service behaviour: method loading, callbacks and token
//! refresh persistence.

mod support;

use std::sync::Arc;

use conduit_core::{
    AuthService, AuthenticationMethodRegistry, TokenRefresh, TokenRefreshListener, TypeRegistry,
};
use conduit_domain::ConduitError;
use serde_json::json;
use support::collaborators::{MockAuthenticationFactory, MockHttpFetcher, StaticDefinitionSource};
use support::repositories::MockCredentialsRepository;
use support::{catalogue_entities, oura_credentials, Harness, USER};

async fn registry_with_types(types: serde_json::Value) -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new(Arc::new(StaticDefinitionSource::new(types, catalogue_entities()))));
    registry.load().await.expect("catalogue loads");
    registry
}

#[tokio::test(flavor = "multi_thread")]
async fn load_builds_one_method_per_authenticated_type() {
    let h = Harness::builder().build().await;

    let created = h.auth_factory.created.lock().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0.get("clientId"), Some(&json!("client")));
    assert_eq!(created[0].1, "https://conduit.test/integrationTypes/oura/callback");
    assert!(h.auth.get_authentication_method("oura").is_some());
    assert!(h.auth.get_authentication_method("public").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_method_is_a_configuration_error() {
    let registry = registry_with_types(json!([
        {"integrationType": "oura", "name": "Oura", "authentication": {"method": "saml"}}
    ]))
    .await;
    let auth = AuthService::new(
        registry,
        Arc::new(MockCredentialsRepository::default()),
        AuthenticationMethodRegistry::new(),
        "https://conduit.test",
    );

    let err = auth.load().await.expect_err("saml is not registered");

    assert!(matches!(err, ConduitError::Config(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_settings_are_a_configuration_error() {
    let registry = registry_with_types(json!([
        {"integrationType": "oura", "name": "Oura", "authentication": {"method": "oauth", "settings": {"invalid": true}}}
    ]))
    .await;
    let mut factories = AuthenticationMethodRegistry::new();
    factories.register("oauth", MockAuthenticationFactory::new(MockHttpFetcher::status(200)));
    let auth =
        AuthService::new(registry, Arc::new(MockCredentialsRepository::default()), factories, "https://conduit.test");

    assert!(matches!(auth.load().await, Err(ConduitError::Config(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn redirect_url_carries_state_and_callback() {
    let h = Harness::builder().build().await;

    let url = h.auth.redirect_url("oura", USER).expect("redirect url");

    assert!(url.contains("state=user-1"));
    assert!(url.ends_with("redirect_uri=https://conduit.test/integrationTypes/oura/callback"));
    assert!(matches!(h.auth.redirect_url("public", USER), Err(ConduitError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn callback_inserts_then_updates_credentials() {
    let h = Harness::builder().build().await;

    h.auth.on_callback("oura", "first", USER).await.expect("first callback");
    let first = h.credentials.all();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].access_token, "access-first");
    assert_eq!(first[0].expiry, 1_700_000_000_000);

    h.auth.on_callback("oura", "second", USER).await.expect("second callback");
    let second = h.credentials.all();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].refresh_token, "refresh-second");
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_callback_stores_nothing() {
    let h = Harness::builder().build().await;

    let err = h.auth.on_callback("oura", "", USER).await.expect_err("empty code");

    assert!(matches!(err, ConduitError::Auth(_)));
    assert!(h.credentials.all().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn authenticated_means_credentials_or_no_auth_required() {
    let h = Harness::builder().build().await;

    assert_eq!(h.auth.is_integration_type_authenticated(USER, "public").await, Ok(true));
    assert_eq!(h.auth.is_integration_type_authenticated(USER, "oura").await, Ok(false));
    assert_eq!(h.auth.is_integration_type_authenticated(USER, "nope").await, Ok(false));

    h.auth.on_callback("oura", "code", USER).await.expect("callback");
    assert_eq!(h.auth.is_integration_type_authenticated(USER, "oura").await, Ok(true));
}

#[tokio::test(flavor = "multi_thread")]
async fn refreshed_tokens_are_written_back() {
    let h = Harness::builder().credentials(oura_credentials()).build().await;
    let listener = Arc::clone(&h.auth_factory.listeners.lock()[0]);

    listener
        .on_token_refreshed(TokenRefresh {
            old_access_token: "access-0".into(),
            new_access_token: "access-1".into(),
            new_refresh_token: String::new(),
            new_expiry: 42,
        })
        .await
        .expect("persisted");

    let stored = h.credentials.all();
    assert_eq!(stored[0].access_token, "access-1");
    assert_eq!(stored[0].refresh_token, "refresh-0");
    assert_eq!(stored[0].expiry, 42);

    // tokens that match nothing are ignored
    listener
        .on_token_refreshed(TokenRefresh {
            old_access_token: "stale".into(),
            new_access_token: "access-2".into(),
            new_refresh_token: "refresh-2".into(),
            new_expiry: 7,
        })
        .await
        .expect("ignored");
    assert_eq!(h.credentials.all()[0].access_token, "access-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn user_deletion_removes_all_credentials() {
    let h = Harness::builder().credentials(oura_credentials()).build().await;

    assert!(h.auth.create_client(&oura_credentials()).expect("client").is_some());
    h.auth.on_user_deleted(USER).await.expect("deleted");

    assert!(h.auth.get_credentials_by_user_id(USER).await.expect("listed").is_empty());
}
