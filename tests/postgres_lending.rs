//! Lending against a real PostgreSQL database
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres_lending -- --ignored --test-threads=1

use sqlx::{postgres::PgPoolOptions, PgPool};

use lending_server::{
    models::{book::CreateBook, loan::ReturnTarget, reader::CreateReader},
    repository::Repository,
    services::lending::LendingService,
    AppError,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    sqlx::query("TRUNCATE borrowed_books, books, readers, users RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to reset tables");
    pool
}

fn book(isbn: &str, copies: i32) -> CreateBook {
    CreateBook {
        title: format!("Book {}", isbn),
        author: "Author".to_string(),
        publication_year: Some(1965),
        isbn: Some(isbn.to_string()),
        copies,
        description: None,
    }
}

fn reader(email: &str) -> CreateReader {
    CreateReader {
        name: "Reader".to_string(),
        email: email.to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_return_round() {
    let repository = Repository::new(pool().await);
    let service = LendingService::new(repository.clone());
    let book_id = repository.books.create(&book("PG-1", 1)).await.unwrap().id;
    let reader_id = repository
        .readers
        .create(&reader("pg@example.com"))
        .await
        .unwrap()
        .id;

    let loan = service.borrow(book_id, reader_id).await.unwrap();
    assert_eq!(repository.books.get(book_id).await.unwrap().copies, 0);

    let err = service.borrow(book_id, reader_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidOperation(_)));

    service.return_book(ReturnTarget::Loan(loan.id)).await.unwrap();
    let err = service
        .return_book(ReturnTarget::Loan(loan.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(repository.books.get(book_id).await.unwrap().copies, 1);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_is_conflict() {
    let repository = Repository::new(pool().await);
    repository.books.create(&book("PG-DUP", 1)).await.unwrap();
    let err = repository.books.create(&book("PG-DUP", 1)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(msg) if msg == "ISBN already exists"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_racing_borrows_never_oversell() {
    let repository = Repository::new(pool().await);
    let service = LendingService::new(repository.clone());
    let book_id = repository.books.create(&book("PG-RACE", 2)).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let reader_id = repository
            .readers
            .create(&reader(&format!("race{}@example.com", i)))
            .await
            .unwrap()
            .id;
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.borrow(book_id, reader_id).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            granted += 1;
        }
    }

    assert_eq!(granted, 2);
    assert_eq!(repository.books.get(book_id).await.unwrap().copies, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_racing_borrows_respect_reader_limit() {
    let repository = Repository::new(pool().await);
    let service = LendingService::new(repository.clone());
    let reader_id = repository
        .readers
        .create(&reader("limit@example.com"))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for i in 0..6 {
        let book_id = repository
            .books
            .create(&book(&format!("PG-LIMIT-{}", i), 1))
            .await
            .unwrap()
            .id;
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.borrow(book_id, reader_id).await
        }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::InvalidOperation(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(service.active_loans(reader_id).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_racing_returns_restore_one_copy() {
    let repository = Repository::new(pool().await);
    let service = LendingService::new(repository.clone());
    let book_id = repository.books.create(&book("PG-RET", 1)).await.unwrap().id;
    let reader_id = repository
        .readers
        .create(&reader("ret@example.com"))
        .await
        .unwrap()
        .id;
    let loan_id = service.borrow(book_id, reader_id).await.unwrap().id;

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.return_book(ReturnTarget::Loan(loan_id)).await }
    });
    let second = tokio::spawn({
        let service = service.clone();
        async move { service.return_book(ReturnTarget::Loan(loan_id)).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::NotFound(_)))));
    assert_eq!(repository.books.get(book_id).await.unwrap().copies, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_borrow_racing_return_of_same_pair() {
    let repository = Repository::new(pool().await);
    let service = LendingService::new(repository.clone());

    for round in 0..50 {
        let book_id = repository
            .books
            .create(&book(&format!("PG-PAIR-{}", round), 1))
            .await
            .unwrap()
            .id;
        let reader_id = repository
            .readers
            .create(&reader(&format!("pair{}@example.com", round)))
            .await
            .unwrap()
            .id;
        service.borrow(book_id, reader_id).await.unwrap();

        let borrow = tokio::spawn({
            let service = service.clone();
            async move { service.borrow(book_id, reader_id).await }
        });
        let give_back = tokio::spawn({
            let service = service.clone();
            async move {
                service
                    .return_book(ReturnTarget::BookAndReader { book_id, reader_id })
                    .await
            }
        });

        let borrowed = borrow.await.unwrap();
        give_back.await.unwrap().unwrap();

        let copies = repository.books.get(book_id).await.unwrap().copies;
        match borrowed {
            // Borrow ran after the return committed
            Ok(_) => assert_eq!(copies, 0),
            // Borrow ran first and found the only copy out
            Err(AppError::InvalidOperation(_)) => assert_eq!(copies, 1),
            Err(e) => panic!("round {}: unexpected error: {}", round, e),
        }
    }
}
