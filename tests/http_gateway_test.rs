//! Request shape and error mapping of the HTTP mutation gateway.

use std::time::Duration;

use identity_sync::webhooks::{
    GatewayError, HttpMutationGateway, MutationFunctions, UserDeleteCommand, UserPatchCommand,
    UserSyncGateway, UserUpsertCommand,
};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn success() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": "success", "value": null}))
}

fn gateway(server: &MockServer) -> HttpMutationGateway {
    HttpMutationGateway::new(server.uri()).unwrap()
}

#[tokio::test]
async fn test_create_posts_sync_user_mutation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .and(body_json(json!({
            "path": "users:syncUser",
            "args": {"clerkId": "u1", "email": "a@b.com", "name": "A B"},
            "format": "json"
        })))
        .respond_with(success())
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .create_or_sync_user(UserUpsertCommand {
            external_id: "u1".to_string(),
            email: "a@b.com".to_string(),
            display_name: "A B".to_string(),
            avatar_url: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_patch_omits_absent_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .and(body_json(json!({
            "path": "users:updateUserWebhook",
            "args": {"clerkId": "u1", "image": "https://img.example/u1.png"},
            "format": "json"
        })))
        .respond_with(success())
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .patch_user(UserPatchCommand {
            external_id: "u1".to_string(),
            avatar_url: Some("https://img.example/u1.png".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_sends_deploy_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .and(header("authorization", "Convex prod:test-key"))
        .and(body_json(json!({
            "path": "users:deleteUserWebhook",
            "args": {"clerkId": "u1"},
            "format": "json"
        })))
        .respond_with(success())
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .with_deploy_key(SecretString::from("prod:test-key"))
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_custom_function_paths() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .and(body_json(json!({
            "path": "accounts:remove",
            "args": {"clerkId": "u1"},
            "format": "json"
        })))
        .respond_with(success())
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .with_functions(MutationFunctions {
            delete_user: "accounts:remove".to_string(),
            ..Default::default()
        })
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_status_in_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "errorMessage": "Uncaught Error: user not found"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        GatewayError::Rejected { status, message } => {
            assert_eq!(status, None);
            assert_eq!(message, "Uncaught Error: user not found");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad deploy key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway(&server)
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Rejected { status: Some(401), .. }));
}

#[tokio::test]
async fn test_timeout_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mutation"))
        .respond_with(success().set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = HttpMutationGateway::with_timeout(server.uri(), Duration::from_millis(100))
        .unwrap()
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Unavailable(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    // Bind then drop a server so the port is closed.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let err = HttpMutationGateway::new(uri)
        .unwrap()
        .delete_user(UserDeleteCommand {
            external_id: "u1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Unavailable(_)));
}
