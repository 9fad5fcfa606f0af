//! Reader registry service

use validator::Validate;

use crate::{
    error::AppResult,
    models::reader::{CreateReader, Reader},
    repository::Repository,
};

#[derive(Clone)]
pub struct ReadersService {
    repository: Repository,
}

impl ReadersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_readers(&self) -> AppResult<Vec<Reader>> {
        self.repository.readers.list().await
    }

    pub async fn get_reader(&self, id: i32) -> AppResult<Reader> {
        self.repository.readers.get(id).await
    }

    pub async fn create_reader(&self, reader: CreateReader) -> AppResult<Reader> {
        reader.validate()?;
        self.repository.readers.create(&reader).await
    }

    pub async fn update_reader(&self, id: i32, reader: CreateReader) -> AppResult<Reader> {
        reader.validate()?;
        self.repository.readers.get(id).await?;
        self.repository.readers.update(id, &reader).await
    }

    pub async fn delete_reader(&self, id: i32) -> AppResult<()> {
        self.repository.readers.get(id).await?;
        self.repository.readers.delete(id).await
    }
}
