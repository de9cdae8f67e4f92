use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header;
use serde_json::json;

use muxi_server::routes::UPLOAD_BODY_LIMIT;

use crate::integration::common::{
    ADMIN_PASSWORD, ADMIN_USERNAME, multipart_body, multipart_content_type, request,
    setup_test_app,
};

const HEAD_IMAGE_URI: &str = "/api/profile/update/headimage";

fn stored_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn health_reports_database_ok() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 200);
    assert_eq!(json["message"], "I'm OK.");
    assert_eq!(json["data"]["database"], "ok");
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/api/nowhere", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], 404);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let (status, json) = app.get("/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/auth/login"].is_object());
}

#[tokio::test]
async fn register_then_login_and_fetch_profile() {
    let app = setup_test_app().await;

    let (token, user_id) = app.register("alice", "secret-pw").await;
    let (status, json) = app.get("/api/profile/get/self", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], user_id);
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["group"], "user");
    assert_eq!(json["data"]["head_image_path"], "static/DefaultHeadImg.jpeg");
    assert!(json["data"].get("password_hash").is_none());

    let (status, json) = app.login("alice", "secret-pw").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn register_rejects_bad_input_and_duplicates() {
    let app = setup_test_app().await;
    app.register("alice", "secret-pw").await;

    let cases = [
        (json!({ "username": "al", "password": "secret-pw" }), StatusCode::BAD_REQUEST),
        (json!({ "username": "bob", "password": "short" }), StatusCode::BAD_REQUEST),
        (json!({ "username": "bob" }), StatusCode::BAD_REQUEST),
        (json!({ "username": "alice", "password": "other-pw" }), StatusCode::CONFLICT),
    ];
    for (body, expected) in cases {
        let (status, json) = app.json("POST", "/api/auth/register", None, body).await;
        assert_eq!(status, expected, "{json}");
        assert_eq!(json["code"], expected.as_u16());
    }
}

#[tokio::test]
async fn login_failures_are_forbidden() {
    let app = setup_test_app().await;
    app.register("alice", "secret-pw").await;

    let (status, _) = app.login("alice", "wrong-pw").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.login("nobody", "secret-pw").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.login("", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_or_garbage_token_is_401() {
    let app = setup_test_app().await;

    let (status, _) = app.get("/api/profile/get/self", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app.get("/api/profile/get/self", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], 401);
}

#[tokio::test]
async fn logout_revokes_every_token() {
    let app = setup_test_app().await;
    let (first, _) = app.register("alice", "secret-pw").await;
    let (_, json) = app.login("alice", "secret-pw").await;
    let second = json["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = app.get("/api/profile/operation/logout", Some(&first)).await;
    assert_eq!(status, StatusCode::OK);

    for token in [&first, &second] {
        let (status, json) = app.get("/api/profile/get/self", Some(token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "token expired, please log in again");
    }

    let (status, _) = app.login("alice", "secret-pw").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn password_change_revokes_tokens_and_enforces_rules() {
    let app = setup_test_app().await;
    let (token, _) = app.register("alice", "secret-pw").await;

    let change = |old: &str, new: &str| json!({ "old_password": old, "new_password": new });

    let (status, _) = app
        .json("PUT", "/api/profile/update/password", Some(&token), change("secret-pw", "secret-pw"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("PUT", "/api/profile/update/password", Some(&token), change("wrong-pw", "new-secret"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("PUT", "/api/profile/update/password", Some(&token), change("secret-pw", "new-secret"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/profile/get/self", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("alice", "secret-pw").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, json) = app.login("alice", "new-secret").await;
    assert_eq!(status, StatusCode::OK);

    // A second change inside the cooldown window.
    let token = json["data"]["token"].as_str().unwrap();
    let (status, json) = app
        .json("PUT", "/api/profile/update/password", Some(token), change("new-secret", "third-secret"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], 403);
}

#[tokio::test]
async fn username_change_checks_conflicts_and_cooldown() {
    let app = setup_test_app().await;
    let (token, _) = app.register("alice", "secret-pw").await;
    app.register("bob", "secret-pw").await;

    let rename = |name: &str| json!({ "new_username": name });

    let (status, _) = app
        .json("PUT", "/api/profile/update/username", Some(&token), rename("bob"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = app
        .json("PUT", "/api/profile/update/username", Some(&token), rename("alicia"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "alicia");

    let (status, _) = app
        .json("PUT", "/api/profile/update/username", Some(&token), rename("alicja"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn head_image_upload_replaces_file() {
    let app = setup_test_app().await;
    let (token, user_id) = app.register("alice", "secret-pw").await;

    let (status, _) = app
        .multipart("PUT", "/api/profile/update/headimage", &token, &[], None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .multipart(
            "PUT",
            "/api/profile/update/headimage",
            &token,
            &[],
            Some(("new_head_image", "evil.sh", b"#!/bin/sh")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .multipart(
            "PUT",
            "/api/profile/update/headimage",
            &token,
            &[],
            Some(("new_head_image", "me.png", b"\x89PNG fake")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");

    let path = json["data"]["head_image_path"].as_str().unwrap().to_string();
    let file_name = path.strip_prefix("uploads/").unwrap();
    assert!(file_name.starts_with("HeadImg_"));
    assert!(file_name.ends_with(".png"));
    assert!(app.uploads.path().join(file_name).exists());

    let user = app.db.user_repo().get(user_id).await.unwrap().unwrap();
    assert_eq!(user.head_image_path, path);

    // Cooldown blocks an immediate second upload without leaving a file behind.
    let (status, _) = app
        .multipart(
            "PUT",
            "/api/profile/update/headimage",
            &token,
            &[],
            Some(("new_head_image", "again.png", b"\x89PNG fake")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(std::fs::read_dir(app.uploads.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn admin_routes_require_admin_group() {
    let app = setup_test_app().await;
    let (token, _) = app.register("alice", "secret-pw").await;

    let (status, json) = app.get("/api/admin/get/getusers", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], 403);

    let (status, _) = app.get("/api/admin/get/getusers", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = app.admin_token().await;
    let (status, json) = app
        .get("/api/admin/get/getusers?group=admin", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["list"][0]["username"], ADMIN_USERNAME);
    assert_eq!(json["data"]["page"], 1);
    assert_eq!(json["data"]["page_size"], 20);

    let (status, json) = app
        .get("/api/admin/get/getusers?username=LIC", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["list"][0]["username"], "alice");

    let (status, _) = app
        .get("/api/admin/get/getusers?group=root", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_lookup_by_id_and_coin_adjustment() {
    let app = setup_test_app().await;
    let (_, user_id) = app.register("alice", "secret-pw").await;
    let admin = app.admin_token().await;

    let (status, json) = app
        .get(&format!("/api/admin/get/getusers?id={user_id}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 1);

    let (status, json) = app.get("/api/admin/get/getusers?id=999999", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 0);

    let uri = format!("/api/admin/users/{user_id}/coins");
    let (status, json) = app
        .json("PUT", &uri, Some(&admin), json!({ "strength_coin": 250, "select_coin": 30 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["strength_coin"], 250);
    assert_eq!(json["data"]["select_coin"], 30);

    let (status, _) = app
        .json("PUT", &uri, Some(&admin), json!({ "select_coin": -31 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.json("PUT", &uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seeded_admin_logs_in_with_admin_group() {
    let app = setup_test_app().await;

    let (status, json) = app.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["group"], "admin");
}

#[tokio::test]
async fn second_head_image_removes_the_first() {
    let app = setup_test_app().await;
    let (token, user_id) = app.register("alice", "secret-pw").await;

    let (status, json) = app
        .multipart(
            "PUT",
            HEAD_IMAGE_URI,
            &token,
            &[],
            Some(("new_head_image", "first.png", b"\x89PNG one")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let first = json["data"]["head_image_path"].as_str().unwrap().to_string();

    // Open the cooldown window again.
    sqlx::query("UPDATE users SET head_image_updated_at = NULL WHERE id = $1")
        .bind(user_id)
        .execute(app.db.pool())
        .await
        .unwrap();

    let (status, json) = app
        .multipart(
            "PUT",
            HEAD_IMAGE_URI,
            &token,
            &[],
            Some(("new_head_image", "second.jpg", b"\xff\xd8 two")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let second = json["data"]["head_image_path"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let files = stored_files(app.uploads.path());
    assert_eq!(files, vec![second.strip_prefix("uploads/").unwrap().to_string()]);

    let user = app.db.user_repo().get(user_id).await.unwrap().unwrap();
    assert_eq!(user.head_image_path, second);
}

#[tokio::test]
async fn failed_head_image_update_leaves_no_file() {
    let app = setup_test_app().await;
    let (token, user_id) = app.register("alice", "secret-pw").await;

    // Any uploaded path now violates the row check, so the update fails after the write.
    sqlx::query(
        "ALTER TABLE users ADD CONSTRAINT reject_uploaded_head CHECK (head_image_path NOT LIKE 'uploads/%')",
    )
    .execute(app.db.pool())
    .await
    .unwrap();

    let (status, json) = app
        .multipart(
            "PUT",
            HEAD_IMAGE_URI,
            &token,
            &[],
            Some(("new_head_image", "me.png", b"\x89PNG fake")),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], 500);
    assert!(stored_files(app.uploads.path()).is_empty());

    let user = app.db.user_repo().get(user_id).await.unwrap().unwrap();
    assert!(user.head_image_updated_at.is_none());
}

#[tokio::test]
async fn concurrent_head_images_keep_one_file() {
    let app = setup_test_app().await;
    let (token, user_id) = app.register("alice", "secret-pw").await;

    let (app, token) = (&app, token.as_str());
    let upload = move |name: &'static str| {
        app.multipart(
            "PUT",
            HEAD_IMAGE_URI,
            token,
            &[],
            Some(("new_head_image", name, b"\x89PNG fake")),
        )
    };
    let ((first, _), (second, _)) = tokio::join!(upload("a.png"), upload("b.png"));

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::FORBIDDEN]);

    // The loser either failed the early check or had its file removed after the locked check.
    let user = app.db.user_repo().get(user_id).await.unwrap().unwrap();
    let files = stored_files(app.uploads.path());
    assert_eq!(
        files,
        vec![user.head_image_path.strip_prefix("uploads/").unwrap().to_string()]
    );
}

#[tokio::test]
async fn oversized_upload_is_enveloped_413() {
    let app = setup_test_app().await;
    let (token, _) = app.register("alice", "secret-pw").await;
    let huge = vec![0u8; UPLOAD_BODY_LIMIT + 1];

    // Rejected up front from the declared length.
    let (status, json) = app
        .multipart(
            "PUT",
            HEAD_IMAGE_URI,
            &token,
            &[],
            Some(("new_head_image", "huge.png", huge.as_slice())),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], 413);
    assert_eq!(json["message"], "upload exceeds the 8 MiB limit");

    // Rejected while streaming when no length is declared.
    let streamed = request("PUT", HEAD_IMAGE_URI, Some(&token))
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(multipart_body(
            &[],
            Some(("new_head_image", "huge.png", huge.as_slice())),
        )))
        .unwrap();
    let (status, json) = app.send(streamed).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], 413);

    assert!(stored_files(app.uploads.path()).is_empty());
}

#[tokio::test]
async fn wrong_method_is_enveloped_405() {
    let app = setup_test_app().await;
    let (token, _) = app.register("alice", "secret-pw").await;

    let (status, json) = app
        .call("DELETE", "/api/profile/update/password", &token)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["code"], 405);
    assert_eq!(json["message"], "Method not allowed");

    let (status, json) = app.call("PATCH", "/api/auth/login", &token).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["code"], 405);
}

#[tokio::test]
async fn username_may_contain_inner_spaces() {
    let app = setup_test_app().await;
    let (token, _) = app.register("john doe", "secret-pw").await;

    let (status, json) = app.get("/api/profile/get/self", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "john doe");

    let (status, _) = app
        .json(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "tab\there", "password": "secret-pw" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
