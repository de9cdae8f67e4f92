use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::integration::common::{TestApp, setup_test_app};

async fn create_entry(app: &TestApp, admin: &str, kind: &str, body: Value) -> i64 {
    let (status, json) = app
        .json("POST", &format!("/api/admin/catalog/{kind}"), Some(admin), body)
        .await;
    assert_eq!(status, StatusCode::OK, "create {kind} failed: {json}");
    json["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn catalog_crud_and_validation() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let (token, _) = app.register("player", "secret-pw").await;

    let skill = create_entry(&app, &admin, "skills", json!({ "name": "Fireball" })).await;
    create_entry(
        &app,
        &admin,
        "cards",
        json!({ "name": "Dragon", "description": "Big", "rarity": "legendary" }),
    )
    .await;

    let (status, json) = app.get("/api/catalog/skills", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["list"][0]["max_level"], 10);
    assert_eq!(json["data"]["list"][0]["kind"], "skill");

    let (_, json) = app.get("/api/catalog/cards", Some(&token)).await;
    assert_eq!(json["data"]["list"][0]["rarity"], "legendary");

    let (status, _) = app.get("/api/catalog/potions", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/catalog/skillsss", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let invalid = [
        ("skills", json!({ "name": "" })),
        ("skills", json!({ "name": "Ice", "max_level": 0 })),
        ("items", json!({ "name": "Sword", "rarity": "rare" })),
        ("cards", json!({ "name": "Elf", "rarity": "mythic" })),
    ];
    for (kind, body) in invalid {
        let (status, json) = app
            .json("POST", &format!("/api/admin/catalog/{kind}"), Some(&admin), body)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    }

    let (status, _) = app
        .json(
            "POST",
            "/api/admin/catalog/skills",
            Some(&admin),
            json!({ "name": "Fireball" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            "POST",
            "/api/admin/catalog/skills",
            Some(&token),
            json!({ "name": "Heal" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/admin/catalog/skills/{skill}");
    let (status, _) = app.call("DELETE", &uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("DELETE", &uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grants_show_up_in_profile() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let (token, user_id) = app.register("player", "secret-pw").await;

    let badge = create_entry(&app, &admin, "achievements", json!({ "name": "First Steps" })).await;
    let potion = create_entry(&app, &admin, "items", json!({ "name": "Potion" })).await;
    let grant_uri = format!("/api/admin/users/{user_id}/grant");

    for _ in 0..2 {
        let (status, json) = app
            .json(
                "POST",
                &grant_uri,
                Some(&admin),
                json!({ "kind": "achievement", "target_id": badge }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{json}");
    }
    let (status, json) = app
        .json(
            "POST",
            &grant_uri,
            Some(&admin),
            json!({ "kind": "item", "target_id": potion, "amount": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["quantity"], 3);

    let (_, json) = app
        .json(
            "POST",
            &grant_uri,
            Some(&admin),
            json!({ "kind": "item", "target_id": potion }),
        )
        .await;
    assert_eq!(json["data"]["quantity"], 4);

    let (status, json) = app.get("/api/profile/get/achievements", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["name"], "First Steps");

    let (_, json) = app.get("/api/profile/get/items", Some(&token)).await;
    assert_eq!(json["data"][0]["quantity"], 4);

    let (_, json) = app.get("/api/profile/get/cards", Some(&token)).await;
    assert_eq!(json["data"], json!([]));

    let failures = [
        (json!({ "kind": "pet", "target_id": 1 }), StatusCode::BAD_REQUEST),
        (json!({ "kind": "item", "target_id": potion, "amount": 0 }), StatusCode::BAD_REQUEST),
        (json!({ "kind": "item", "target_id": 999999 }), StatusCode::NOT_FOUND),
    ];
    for (body, expected) in failures {
        let (status, json) = app.json("POST", &grant_uri, Some(&admin), body).await;
        assert_eq!(status, expected, "{json}");
    }

    let (status, _) = app
        .json(
            "POST",
            "/api/admin/users/999999/grant",
            Some(&admin),
            json!({ "kind": "item", "target_id": potion }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn skill_upgrade_spends_strength_coins() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let (token, user_id) = app.register("player", "secret-pw").await;
    let skill = create_entry(
        &app,
        &admin,
        "skills",
        json!({ "name": "Fireball", "max_level": 3 }),
    )
    .await;
    let upgrade_uri = format!("/api/game/skills/{skill}/upgrade");

    let (status, _) = app.call("POST", &upgrade_uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.json(
        "POST",
        &format!("/api/admin/users/{user_id}/grant"),
        Some(&admin),
        json!({ "kind": "skill", "target_id": skill }),
    )
    .await;

    let (status, _) = app.call("POST", &upgrade_uri, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.json(
        "PUT",
        &format!("/api/admin/users/{user_id}/coins"),
        Some(&admin),
        json!({ "strength_coin": 1000 }),
    )
    .await;

    // Level 1 -> 2 costs 100, 2 -> 3 costs 200.
    let (status, json) = app.call("POST", &upgrade_uri, &token).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["skill"]["level"], 2);
    assert_eq!(json["data"]["strength_coin"], 900);

    let (_, json) = app.call("POST", &upgrade_uri, &token).await;
    assert_eq!(json["data"]["skill"]["level"], 3);
    assert_eq!(json["data"]["strength_coin"], 700);

    let (status, _) = app.call("POST", &upgrade_uri, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = app.get("/api/profile/get/skills", Some(&token)).await;
    assert_eq!(json["data"][0]["level"], 3);
    assert_eq!(json["data"][0]["max_level"], 3);
}

#[tokio::test]
async fn card_draw_needs_coins_and_cards() {
    let app = setup_test_app().await;
    let admin = app.admin_token().await;
    let (token, user_id) = app.register("player", "secret-pw").await;

    let (status, _) = app.call("POST", "/api/game/cards/draw", &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.json(
        "PUT",
        &format!("/api/admin/users/{user_id}/coins"),
        Some(&admin),
        json!({ "select_coin": 25 }),
    )
    .await;

    let (status, _) = app.call("POST", "/api/game/cards/draw", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let card = create_entry(&app, &admin, "cards", json!({ "name": "Goblin" })).await;

    let (status, json) = app.call("POST", "/api/game/cards/draw", &token).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["card"]["id"], card);
    assert_eq!(json["data"]["quantity"], 1);
    assert_eq!(json["data"]["select_coin"], 15);

    let (_, json) = app.call("POST", "/api/game/cards/draw", &token).await;
    assert_eq!(json["data"]["quantity"], 2);
    assert_eq!(json["data"]["select_coin"], 5);

    let (status, _) = app.call("POST", "/api/game/cards/draw", &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = app.get("/api/profile/get/cards", Some(&token)).await;
    assert_eq!(json["data"][0]["quantity"], 2);
    assert_eq!(json["data"][0]["rarity"], "common");
}
