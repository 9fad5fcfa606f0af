//! Data models for the lending server

pub mod book;
pub mod loan;
pub mod reader;
pub mod user;

// Re-export commonly used types
pub use book::{Book, CreateBook};
pub use loan::{BorrowRequest, Loan, ReturnRequest, ReturnTarget};
pub use reader::{CreateReader, Reader};
pub use user::{User, UserClaims};
