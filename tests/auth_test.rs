use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;
use tmc_client::config::{AuthSettings, Settings};
use tmc_client::core::auth::{RefreshTokenExchange, StaticToken};
use tmc_client::core::TokenSource;
use tmc_client::{Client, TmcError, TransportConfig};

const AUTHORIZE: &str = "/csp/gateway/am/api/auth/api-tokens/authorize";

#[tokio::test]
async fn test_refresh_token_exchange_is_cached() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(AUTHORIZE)
                .x_www_form_urlencoded_tuple("refresh_token", "r-123");
            then.status(200)
                .json_body(json!({"access_token": "a-456", "expires_in": 1800, "token_type": "bearer"}));
        })
        .await;

    let exchange = RefreshTokenExchange::new(server.base_url(), "r-123")?;
    assert_eq!(exchange.access_token().await?, "a-456");
    assert_eq!(exchange.access_token().await?, "a-456");

    mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(AUTHORIZE);
            then.status(200)
                .json_body(json!({"access_token": "a-1", "expires_in": 30}));
        })
        .await;

    let exchange = RefreshTokenExchange::new(server.base_url(), "r-1")?;
    exchange.access_token().await?;
    exchange.access_token().await?;

    // Lifetime is below the refresh margin, so every call exchanges again.
    mock.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_refresh_token_is_auth_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(AUTHORIZE);
            then.status(400).body("invalid_grant");
        })
        .await;

    let exchange = RefreshTokenExchange::new(server.base_url(), "expired")?;
    match exchange.access_token().await {
        Err(TmcError::Auth { message }) => assert!(message.contains("invalid_grant")),
        other => panic!("expected auth error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_authorized_client_sends_bearer_token() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1alpha1/workspaces")
                .header("authorization", "Bearer static-1");
            then.status(200).json_body(json!({"workspaces": []}));
        })
        .await;

    let client = Client::new(TransportConfig::new(server.base_url()))?;
    client.authorize(&StaticToken::new("static-1")).await?;
    let _: serde_json::Value = client.get("v1alpha1/workspaces", &[]).await?;

    mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn test_settings_connect_exchanges_and_installs_headers() -> Result<()> {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path(AUTHORIZE);
            then.status(200)
                .json_body(json!({"access_token": "from-exchange", "expires_in": 1800}));
        })
        .await;
    let api = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1alpha1/clustergroups")
                .header("authorization", "Bearer from-exchange")
                .header("x-request-source", "ci");
            then.status(200).json_body(json!({"clusterGroups": []}));
        })
        .await;

    let settings = Settings {
        transport: TransportConfig::new(server.base_url()),
        auth: AuthSettings::RefreshToken {
            token: "r".to_string(),
            issuer: server.base_url(),
        },
        headers: [("X-Request-Source".to_string(), "ci".to_string())]
            .into_iter()
            .collect(),
    };

    let client = settings.connect().await?;
    let _: serde_json::Value = client.get("v1alpha1/clustergroups", &[]).await?;

    token.assert_hits_async(1).await;
    api.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn test_connect_with_source_reauthorizes_from_cache() -> Result<()> {
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST).path(AUTHORIZE);
            then.status(200)
                .json_body(json!({"access_token": "cached-1", "expires_in": 1800}));
        })
        .await;

    let settings = Settings {
        transport: TransportConfig::new(server.base_url()),
        auth: AuthSettings::RefreshToken {
            token: "r".to_string(),
            issuer: server.base_url(),
        },
        headers: Default::default(),
    };

    let (client, source) = settings.connect_with_source().await?;
    let source = source.expect("refresh token yields a source");
    client.authorize(source.as_ref()).await?;
    client.authorize(source.as_ref()).await?;

    token.assert_hits_async(1).await;
    assert_eq!(
        client.headers().get("authorization").unwrap(),
        "Bearer cached-1"
    );
    Ok(())
}

#[tokio::test]
async fn test_connect_without_auth_has_no_source() -> Result<()> {
    let settings = Settings {
        transport: TransportConfig::new("https://org.tmc.example.com"),
        auth: AuthSettings::None,
        headers: Default::default(),
    };

    let (client, source) = settings.connect_with_source().await?;
    assert!(source.is_none());
    assert!(client.headers().get("authorization").is_none());
    Ok(())
}

#[tokio::test]
async fn test_exchange_honours_transport_timeout() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(AUTHORIZE);
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({"access_token": "late", "expires_in": 1800}));
        })
        .await;

    let transport =
        TransportConfig::new(server.base_url()).with_timeout(Duration::from_millis(100));
    let exchange = RefreshTokenExchange::with_transport(server.base_url(), "r", &transport)?;

    match exchange.access_token().await {
        Err(TmcError::Transport(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
    Ok(())
}
