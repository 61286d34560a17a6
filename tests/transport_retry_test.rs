use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use std::time::{Duration, Instant};
use tmc_client::core::Empty;
use tmc_client::{Client, TmcError, TransportConfig};

fn client_for(server: &MockServer, retry_count: u32, interval_ms: u64) -> Client {
    Client::new(
        TransportConfig::new(server.base_url())
            .with_retry(retry_count, Duration::from_millis(interval_ms)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_get_returns_decoded_body() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1alpha1/clustergroups/team")
                .header("accept", "application/json");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"clusterGroup": {"fullName": {"name": "team"}}}));
        })
        .await;

    let client = client_for(&server, 3, 10);
    let body: serde_json::Value = client.get("v1alpha1/clustergroups/team", &[]).await?;

    mock.assert_hits_async(1).await;
    assert_eq!(body["clusterGroup"]["fullName"]["name"], "team");
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_retried_until_exhausted() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1alpha1/clusters");
            then.status(503)
                .json_body(json!({"error": "unavailable", "code": 14, "message": "try later"}));
        })
        .await;

    let client = client_for(&server, 2, 50);
    let started = Instant::now();
    let result: tmc_client::Result<serde_json::Value> = client.get("v1alpha1/clusters", &[]).await;

    mock.assert_hits_async(3).await;
    assert!(started.elapsed() >= Duration::from_millis(100));
    match result {
        Err(TmcError::Http { status, message }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "try later");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_zero_retry_count_sends_once() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1alpha1/clusters");
            then.status(500);
        })
        .await;

    let client = client_for(&server, 0, 10);
    let result: tmc_client::Result<serde_json::Value> = client.get("v1alpha1/clusters", &[]).await;

    mock.assert_hits_async(1).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_client_error_is_not_retried() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1alpha1/clustergroups");
            then.status(409)
                .json_body(json!({"error": "exists", "code": 6, "message": "cluster group team already exists"}));
        })
        .await;

    let client = client_for(&server, 3, 10);
    let result: tmc_client::Result<serde_json::Value> = client
        .create("v1alpha1/clustergroups", &json!({"clusterGroup": {}}))
        .await;

    mock.assert_hits_async(1).await;
    let err = result.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(409));
    assert!(err.to_string().contains("already exists"));
    Ok(())
}

#[tokio::test]
async fn test_not_found_is_classified() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1alpha1/workspaces/gone");
            then.status(404)
                .json_body(json!({"error": "not found", "code": 5, "message": "workspace gone not found"}));
        })
        .await;

    let client = client_for(&server, 3, 10);
    let result: tmc_client::Result<serde_json::Value> =
        client.get("v1alpha1/workspaces/gone", &[]).await;

    mock.assert_hits_async(1).await;
    assert!(result.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_request_body_is_replayed_on_every_attempt() -> Result<()> {
    let server = MockServer::start_async().await;
    let payload = json!({"clusterGroup": {"fullName": {"name": "team"}, "spec": {}}});
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/v1alpha1/clustergroups/team")
                .header("content-type", "application/json")
                .json_body(payload.clone());
            then.status(502);
        })
        .await;

    let client = client_for(&server, 2, 10);
    let result: tmc_client::Result<serde_json::Value> = client
        .update("v1alpha1/clustergroups/team", &payload)
        .await;

    // Only requests carrying the full body match, so three hits means the
    // body survived both retries.
    mock.assert_hits_async(3).await;
    assert_eq!(result.unwrap_err().status().map(|s| s.as_u16()), Some(502));
    Ok(())
}

#[tokio::test]
async fn test_recovers_after_transient_failure() -> Result<()> {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(httpmock::Method::PATCH).path("/v1alpha1/clusters/demo");
            then.status(503);
        })
        .await;

    let client = client_for(&server, 3, 300);
    let payload = json!({"cluster": {"meta": {"labels": {"env": "dev"}}}});
    let request = client.patch::<_, serde_json::Value>("v1alpha1/clusters/demo", &payload);

    let server_ref = &server;
    let swap = async move {
        while failing.hits_async().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        failing.delete_async().await;
        server_ref
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH).path("/v1alpha1/clusters/demo");
                then.status(200).json_body(json!({"cluster": {"fullName": {"name": "demo"}}}));
            })
            .await
    };

    let (result, succeeding) = tokio::join!(request, swap);

    succeeding.assert_hits_async(1).await;
    assert_eq!(result?["cluster"]["fullName"]["name"], "demo");
    Ok(())
}

#[tokio::test]
async fn test_connection_failure_is_retried() -> Result<()> {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };

    let client = Client::new(
        TransportConfig::new(format!("http://127.0.0.1:{}", port))
            .with_retry(2, Duration::from_millis(50)),
    )?;

    let started = Instant::now();
    let result: tmc_client::Result<serde_json::Value> = client.get("v1alpha1/clusters", &[]).await;

    assert!(started.elapsed() >= Duration::from_millis(100));
    match result {
        Err(TmcError::Transport(e)) => assert!(e.is_connect()),
        other => panic!("expected transport error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_timeout_is_retried() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1alpha1/clusters/slow");
            then.status(200).delay(Duration::from_millis(500)).body("{}");
        })
        .await;

    let client = Client::new(
        TransportConfig::new(server.base_url())
            .with_retry(1, Duration::from_millis(10))
            .with_timeout(Duration::from_millis(100)),
    )?;
    let result: tmc_client::Result<serde_json::Value> =
        client.get("v1alpha1/clusters/slow", &[]).await;

    mock.assert_hits_async(2).await;
    match result {
        Err(TmcError::Transport(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_json_on_success_is_not_retried() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1alpha1/clusters/demo");
            then.status(200).body("<html>proxy login</html>");
        })
        .await;

    let client = client_for(&server, 3, 10);
    let result: tmc_client::Result<serde_json::Value> =
        client.get("v1alpha1/clusters/demo", &[]).await;

    mock.assert_hits_async(1).await;
    assert!(matches!(result, Err(TmcError::Serialization(_))));
    Ok(())
}

#[tokio::test]
async fn test_delete_accepts_empty_body() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/v1alpha1/clustergroups/team")
                .query_param("force", "true");
            then.status(200);
        })
        .await;

    let client = client_for(&server, 3, 10);
    let _: Empty = client
        .delete(
            "v1alpha1/clustergroups/team",
            &[("force".to_string(), "true".to_string())],
        )
        .await?;

    mock.assert_hits_async(1).await;
    Ok(())
}

#[tokio::test]
async fn test_non_200_success_status_is_an_error() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1alpha1/workspaces");
            then.status(202).body("accepted");
        })
        .await;

    let client = client_for(&server, 3, 10);
    let result: tmc_client::Result<Empty> = client
        .create("v1alpha1/workspaces", &json!({"workspace": {}}))
        .await;

    mock.assert_hits_async(1).await;
    assert_eq!(result.unwrap_err().status().map(|s| s.as_u16()), Some(202));
    Ok(())
}
