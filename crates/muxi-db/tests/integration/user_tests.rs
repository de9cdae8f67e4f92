use muxi_core::AppError;
use muxi_core::models::{Group, UserFilter};
use muxi_core::pagination::Pagination;

use crate::integration::common::{create_user, expire_cooldowns, setup_test_db};

#[tokio::test]
async fn create_user_defaults() {
    let (db, _container) = setup_test_db().await;

    let user = create_user(&db, "alice", "secret123").await;

    assert_eq!(user.username, "alice");
    assert_eq!(user.group, Group::User);
    assert_eq!(user.strength_coin, 0);
    assert_eq!(user.select_coin, 0);
    assert_eq!(user.token_version, 0);
    assert_eq!(user.head_image_path, "static/DefaultHeadImg.jpeg");
    assert!(user.password_updated_at.is_none());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let (db, _container) = setup_test_db().await;
    create_user(&db, "alice", "secret123").await;

    let err = db
        .user_repo()
        .create("alice", "hash", Group::User)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn change_password_bumps_token_version() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let repo = db.user_repo();

    repo.change_password(user.id, "secret123", "newsecret")
        .await
        .unwrap();

    let updated = repo.get(user.id).await.unwrap().unwrap();
    assert_eq!(updated.token_version, user.token_version + 1);
    assert!(updated.password_updated_at.is_some());
}

#[tokio::test]
async fn change_password_rejects_wrong_old_password() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;

    let err = db
        .user_repo()
        .change_password(user.id, "wrong-one", "newsecret")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let unchanged = db.user_repo().get(user.id).await.unwrap().unwrap();
    assert_eq!(unchanged.token_version, 0);
}

#[tokio::test]
async fn change_password_within_cooldown_is_refused() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let repo = db.user_repo();

    repo.change_password(user.id, "secret123", "second1")
        .await
        .unwrap();
    let err = repo
        .change_password(user.id, "second1", "third1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::TooSoon {
            field: "password",
            ..
        }
    ));

    expire_cooldowns(&db, user.id).await;
    repo.change_password(user.id, "second1", "third1")
        .await
        .unwrap();
}

#[tokio::test]
async fn change_username_checks_uniqueness_and_cooldown() {
    let (db, _container) = setup_test_db().await;
    let alice = create_user(&db, "alice", "secret123").await;
    create_user(&db, "bob", "secret123").await;
    let repo = db.user_repo();

    let err = repo.change_username(alice.id, "bob").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = repo.change_username(alice.id, "alice").await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let renamed = repo.change_username(alice.id, "alicia").await.unwrap();
    assert_eq!(renamed.username, "alicia");

    let err = repo.change_username(alice.id, "ally").await.unwrap_err();
    assert!(matches!(err, AppError::TooSoon { .. }));
}

#[tokio::test]
async fn change_head_image_returns_previous_path() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let repo = db.user_repo();

    let old = repo
        .change_head_image(user.id, "uploads/HeadImg_1_abcd.png")
        .await
        .unwrap();
    assert_eq!(old, "static/DefaultHeadImg.jpeg");

    expire_cooldowns(&db, user.id).await;
    let old = repo
        .change_head_image(user.id, "uploads/HeadImg_2_ef01.png")
        .await
        .unwrap();
    assert_eq!(old, "uploads/HeadImg_1_abcd.png");
}

#[tokio::test]
async fn adjust_coins_never_goes_negative() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let repo = db.user_repo();

    let updated = repo.adjust_coins(user.id, 500, 30).await.unwrap();
    assert_eq!(updated.strength_coin, 500);
    assert_eq!(updated.select_coin, 30);

    let err = repo.adjust_coins(user.id, -501, 0).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = repo.adjust_coins(9999, 1, 1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_users_filters_and_paginates() {
    let (db, _container) = setup_test_db().await;
    for name in ["alice", "alina", "bob"] {
        create_user(&db, name, "secret123").await;
    }
    db.user_repo()
        .create("root_admin", "hash", Group::Admin)
        .await
        .unwrap();
    let repo = db.user_repo();

    let filter = UserFilter {
        username: Some("AL".into()),
        group: None,
    };
    let page = repo
        .list(&filter, Pagination::from_raw(Some("1"), Some("1")))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.list.len(), 1);
    assert_eq!(page.list[0].username, "alice");

    let admins = UserFilter {
        username: None,
        group: Some(Group::Admin),
    };
    let page = repo.list(&admins, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.list[0].username, "root_admin");
}

#[tokio::test]
async fn bump_token_version_reports_missing_user() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let repo = db.user_repo();

    assert!(repo.bump_token_version(user.id).await.unwrap());
    assert!(!repo.bump_token_version(424242).await.unwrap());
    assert_eq!(repo.get(user.id).await.unwrap().unwrap().token_version, 1);
}
