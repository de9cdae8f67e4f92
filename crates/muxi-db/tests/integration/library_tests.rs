use muxi_core::AppError;
use muxi_core::models::{BookFilter, BookPatch, BorrowStatus, NewBook, RecordFilter};
use muxi_core::pagination::Pagination;
use muxi_db::Database;

use crate::integration::common::{create_user, setup_test_db};

fn new_book(title: &str, author: &str, stock: i32) -> NewBook {
    NewBook {
        title: title.into(),
        author: author.into(),
        summary: "Nothing here yet".into(),
        cover_path: "uploads/default.png".into(),
        initial_stock: stock,
    }
}

async fn book_with_stock(db: &Database, stock: i32) -> i64 {
    db.book_repo()
        .create(&new_book("Dune", "Frank Herbert", stock))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn create_book_fills_all_stock_counters() {
    let (db, _container) = setup_test_db().await;

    let book = db
        .book_repo()
        .create(&new_book("Dune", "Frank Herbert", 3))
        .await
        .unwrap();

    assert_eq!(book.initial_stock, 3);
    assert_eq!(book.stock, 3);
    assert_eq!(book.total_stock, 3);
    assert!(db.book_repo().exists("Dune", "Frank Herbert").await.unwrap());
}

#[tokio::test]
async fn duplicate_title_and_author_conflicts() {
    let (db, _container) = setup_test_db().await;
    let repo = db.book_repo();
    repo.create(&new_book("Dune", "Frank Herbert", 1))
        .await
        .unwrap();

    let err = repo
        .create(&new_book("Dune", "Frank Herbert", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same title by another author is a different book.
    repo.create(&new_book("Dune", "Someone Else", 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn search_is_case_insensitive_and_paginated() {
    let (db, _container) = setup_test_db().await;
    let repo = db.book_repo();
    for (title, author) in [
        ("The Rust Book", "Klabnik"),
        ("Rust in Action", "McNamara"),
        ("Go in Action", "Kennedy"),
    ] {
        repo.create(&new_book(title, author, 1)).await.unwrap();
    }

    let filter = BookFilter {
        title: Some("rust".into()),
        ..Default::default()
    };
    let page = repo
        .list(&filter, Pagination::from_raw(Some("2"), Some("1")))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.page, 2);
    assert_eq!(page.list.len(), 1);
    assert_eq!(page.list[0].title, "Rust in Action");

    let filter = BookFilter {
        title: Some("action".into()),
        author: Some("kenn".into()),
        summary: None,
    };
    let page = repo.list(&filter, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.list[0].title, "Go in Action");
}

#[tokio::test]
async fn borrow_and_return_move_stock() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let book_id = book_with_stock(&db, 1).await;
    let borrows = db.borrow_repo();

    let record = borrows.borrow(user.id, book_id).await.unwrap();
    assert_eq!(record.status, BorrowStatus::Borrowed);
    assert!(record.return_at.is_none());
    assert_eq!(db.book_repo().get(book_id).await.unwrap().unwrap().stock, 0);

    let returned = borrows.return_book(user.id, record.id).await.unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert!(returned.return_at.is_some());
    assert_eq!(db.book_repo().get(book_id).await.unwrap().unwrap().stock, 1);

    let err = borrows.return_book(user.id, record.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn borrow_out_of_stock_conflicts() {
    let (db, _container) = setup_test_db().await;
    let alice = create_user(&db, "alice", "secret123").await;
    let bob = create_user(&db, "bob", "secret123").await;
    let book_id = book_with_stock(&db, 1).await;
    let borrows = db.borrow_repo();

    borrows.borrow(alice.id, book_id).await.unwrap();
    let err = borrows.borrow(bob.id, book_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = borrows.borrow(bob.id, 4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn one_active_loan_per_user_and_book() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let book_id = book_with_stock(&db, 5).await;
    let borrows = db.borrow_repo();

    let first = borrows.borrow(user.id, book_id).await.unwrap();
    let err = borrows.borrow(user.id, book_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    borrows.return_book(user.id, first.id).await.unwrap();
    borrows.borrow(user.id, book_id).await.unwrap();
}

#[tokio::test]
async fn concurrent_borrows_never_oversell() {
    let (db, _container) = setup_test_db().await;
    let book_id = book_with_stock(&db, 2).await;
    let mut users = Vec::new();
    for i in 0..5 {
        users.push(create_user(&db, &format!("reader{i}"), "secret123").await);
    }

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let borrows = db.borrow_repo();
            let user_id = user.id;
            tokio::spawn(async move { borrows.borrow(user_id, book_id).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            granted += 1;
        }
    }

    assert_eq!(granted, 2);
    assert_eq!(db.book_repo().get(book_id).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
async fn return_of_foreign_record_is_not_found() {
    let (db, _container) = setup_test_db().await;
    let alice = create_user(&db, "alice", "secret123").await;
    let bob = create_user(&db, "bob", "secret123").await;
    let book_id = book_with_stock(&db, 1).await;

    let record = db.borrow_repo().borrow(alice.id, book_id).await.unwrap();
    let err = db
        .borrow_repo()
        .return_book(bob.id, record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn update_total_stock_keeps_loans() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let book_id = book_with_stock(&db, 3).await;
    db.borrow_repo().borrow(user.id, book_id).await.unwrap();

    let patch = BookPatch {
        total_stock: Some(5),
        cover_path: Some("uploads/Cover_1_aaaa.png".into()),
        ..Default::default()
    };
    let update = db.book_repo().update(book_id, &patch).await.unwrap();
    assert_eq!(update.book.total_stock, 5);
    assert_eq!(update.book.stock, 4);
    assert_eq!(update.book.initial_stock, 3);
    assert_eq!(update.replaced_cover.as_deref(), Some("uploads/default.png"));

    let patch = BookPatch {
        total_stock: Some(0),
        ..Default::default()
    };
    let err = db.book_repo().update(book_id, &patch).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn delete_refuses_while_borrowed() {
    let (db, _container) = setup_test_db().await;
    let user = create_user(&db, "alice", "secret123").await;
    let book_id = book_with_stock(&db, 2).await;
    let record = db.borrow_repo().borrow(user.id, book_id).await.unwrap();

    let err = db.book_repo().delete(book_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    db.borrow_repo().return_book(user.id, record.id).await.unwrap();
    let deleted = db.book_repo().delete(book_id).await.unwrap();
    assert_eq!(deleted.id, book_id);
    assert!(db.book_repo().get(book_id).await.unwrap().is_none());
    assert!(db.borrow_repo().get(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_records_filters_by_user_and_status() {
    let (db, _container) = setup_test_db().await;
    let alice = create_user(&db, "alice", "secret123").await;
    let bob = create_user(&db, "bob", "secret123").await;
    let book_id = book_with_stock(&db, 5).await;
    let borrows = db.borrow_repo();

    let first = borrows.borrow(alice.id, book_id).await.unwrap();
    borrows.return_book(alice.id, first.id).await.unwrap();
    borrows.borrow(alice.id, book_id).await.unwrap();
    borrows.borrow(bob.id, book_id).await.unwrap();

    let alice_open = RecordFilter {
        user_id: Some(alice.id),
        status: Some(BorrowStatus::Borrowed),
        ..Default::default()
    };
    let page = borrows
        .list(alice_open, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let everything = borrows
        .list(RecordFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(everything.total, 3);
}
