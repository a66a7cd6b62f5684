use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RocketChatClient {
    RocketChatClient::new(&server.uri(), "tok", "uid")
}

fn message_json(id: &str, text: &str) -> Value {
    json!({
        "_id": id,
        "rid": "R1",
        "msg": text,
        "u": {"_id": "U1", "username": "alice", "name": "Alice"},
        "ts": "2024-05-01T10:00:00.000Z",
    })
}

#[tokio::test]
async fn test_resolve_channel_sends_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/channels.info"))
        .and(query_param("roomName", "general"))
        .and(header("X-Auth-Token", "tok"))
        .and(header("X-User-Id", "uid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channel": {"_id": "R1", "name": "general"},
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let room = client(&server).resolve_channel("#general").await.unwrap();
    assert_eq!(room.room_id, "R1");
}

#[tokio::test]
async fn test_resolve_channel_not_found_is_remote_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/channels.info"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"success": false, "error": "error-room-not-found"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).resolve_channel("nope").await.unwrap_err();
    match err {
        ClientError::RemoteApi(e) => {
            assert_eq!(e.method, "GET");
            assert_eq!(e.path, "channels.info");
            assert_eq!(e.status, 400);
            assert!(e.body.contains("error-room-not-found"));
        }
        other => panic!("expected RemoteApi, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_api_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let err = client(&server)
        .fetch_channel_history("R1", 50)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
    let ClientError::RemoteApi(e) = err else {
        panic!("expected RemoteApi");
    };
    assert!(e.body.chars().count() <= MAX_ERROR_BODY_CHARS + 3);
}

#[tokio::test]
async fn test_success_false_with_ok_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat.getMessage"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "nope"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_message("M1").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { ref message, .. } if message == "nope"));
}

#[tokio::test]
async fn test_fetch_channel_history_passes_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/channels.history"))
        .and(query_param("roomId", "R1"))
        .and(query_param("count", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [message_json("M2", "second"), message_json("M1", "first")],
            "success": true,
        })))
        .mount(&server)
        .await;

    let messages = client(&server)
        .fetch_channel_history("R1", 50)
        .await
        .unwrap();
    let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["M2", "M1"]);
    assert_eq!(messages[0].sender.username, "alice");
}

#[tokio::test]
async fn test_fetch_thread_replies_paginates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/chat.getThreadMessages"))
        .and(query_param("tmid", "T1"))
        .and(query_param("count", "100"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [message_json("M5", "reply")],
            "total": 120,
            "success": true,
        })))
        .mount(&server)
        .await;

    let replies = client(&server)
        .fetch_thread_replies(
            "T1",
            ThreadQuery {
                count: 100,
                offset: 20,
            },
        )
        .await
        .unwrap();
    assert_eq!(replies.total, Some(120));
    assert_eq!(replies.messages.len(), 1);
}

#[tokio::test]
async fn test_post_message_with_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.postMessage"))
        .and(body_json(json!({"roomId": "R1", "text": "hi", "tmid": "T1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"_id": "NEW"},
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let posted = client(&server)
        .post_message(PostMessage {
            room_id: "R1",
            text: "hi",
            thread_id: Some("T1"),
        })
        .await
        .unwrap();
    assert_eq!(posted.message_id, "NEW");
}

#[tokio::test]
async fn test_post_message_without_thread_omits_tmid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.postMessage"))
        .and(body_json(json!({"roomId": "R1", "text": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"_id": "NEW"},
            "success": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .post_message(PostMessage {
            room_id: "R1",
            text: "hi",
            thread_id: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_reaction_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat.react"))
        .and(body_json(json!({
            "messageId": "M1",
            "emoji": ":x:",
            "shouldReact": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_reaction("M1", ":x:", false)
        .await
        .unwrap();
}

#[test]
fn test_attachment_url_encodes_name() {
    let client = RocketChatClient::new("https://chat.example.com/", "t", "u");
    let file = FileRef {
        id: "F1".into(),
        name: "my report.pdf".into(),
        mime_type: None,
    };
    assert_eq!(
        client.attachment_url(&file),
        "https://chat.example.com/file-upload/F1/my%20report.pdf"
    );
}

#[tokio::test]
async fn test_download_attachment_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file-upload/F1/a.txt"))
        .and(header("X-Auth-Token", "tok"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("a.txt");
    client(&server)
        .download_attachment("/file-upload/F1/a.txt", &dest)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
}

#[tokio::test]
async fn test_download_attachment_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = client(&server)
        .download_attachment("/file-upload/F1/a.txt", &dir.path().join("a.txt"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_probe_identity_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "uid",
            "username": "bot",
            "success": true,
        })))
        .mount(&server)
        .await;

    let probe = client(&server).probe_identity().await;
    assert!(probe.ok);
    assert_eq!(probe.username.as_deref(), Some("bot"));
    assert_eq!(probe.user_id.as_deref(), Some("uid"));
}

#[tokio::test]
async fn test_probe_identity_unauthorized_is_not_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let probe = client(&server).probe_identity().await;
    assert_eq!(probe, IdentityProbe::default());
}

#[tokio::test]
async fn test_probe_identity_unreachable_is_not_ok() {
    let client = RocketChatClient::new("http://127.0.0.1:1", "t", "u");
    assert!(!client.probe_identity().await.ok);
}
