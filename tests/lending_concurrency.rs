//! Concurrent borrow/return against the in-memory store

use lending_server::{
    models::{book::CreateBook, loan::ReturnTarget, reader::CreateReader},
    repository::Repository,
    services::lending::{LendingService, MAX_ACTIVE_LOANS},
    AppError,
};

fn book(isbn: &str, copies: i32) -> CreateBook {
    CreateBook {
        title: format!("Book {}", isbn),
        author: "Author".to_string(),
        publication_year: None,
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

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_borrows_never_oversell() {
    let repository = Repository::in_memory();
    let service = LendingService::new(repository.clone());
    let book_id = repository.books.create(&book("ISBN1", 3)).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..10 {
        let reader_id = repository
            .readers
            .create(&reader(&format!("reader{}@example.com", i)))
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
            Err(AppError::InvalidOperation(msg)) => assert_eq!(msg, "No copies available"),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(granted, 3);
    assert_eq!(repository.books.get(book_id).await.unwrap().copies, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_borrows_respect_reader_limit() {
    let repository = Repository::in_memory();
    let service = LendingService::new(repository.clone());
    let reader_id = repository
        .readers
        .create(&reader("busy@example.com"))
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for i in 0..8 {
        let book_id = repository
            .books
            .create(&book(&format!("ISBN{}", i), 1))
            .await
            .unwrap()
            .id;
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.borrow(book_id, reader_id).await
        }));
    }

    let granted = count_ok(handles).await;
    assert_eq!(granted as i64, MAX_ACTIVE_LOANS);
    assert_eq!(
        service.active_loans(reader_id).await.unwrap().len() as i64,
        MAX_ACTIVE_LOANS
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_returns_restore_one_copy() {
    let repository = Repository::in_memory();
    let service = LendingService::new(repository.clone());
    let book = repository.books.create(&book("ISBN1", 1)).await.unwrap();
    let reader = repository
        .readers
        .create(&reader("reader@example.com"))
        .await
        .unwrap();
    let loan_id = service.borrow(book.id, reader.id).await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.return_book(ReturnTarget::Loan(loan_id)).await
        }));
    }

    assert_eq!(count_ok(handles).await, 1);
    assert_eq!(repository.books.get(book.id).await.unwrap().copies, 1);
}

async fn count_ok<T>(
    handles: Vec<tokio::task::JoinHandle<Result<T, AppError>>>,
) -> usize {
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    ok
}
