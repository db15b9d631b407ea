//! Book Query Handlers

use std::sync::Arc;

use crate::application::context::RequestContext;
use crate::application::error::ApplicationError;
use crate::application::ports::BookRepositoryPort;
use crate::application::queries::{GetBook, ListBooks};
use crate::domain::book::Book;

/// GetBook Handler
pub struct GetBookHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
}

impl GetBookHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>) -> Self {
        Self { book_repo }
    }

    pub async fn handle(&self, ctx: &RequestContext, query: GetBook) -> Result<Book, ApplicationError> {
        let book = self
            .book_repo
            .find_by_id(query.book_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Book", query.book_id))?;
        ctx.ensure_can_access(&book)?;
        Ok(book)
    }
}

/// ListBooks Handler
pub struct ListBooksHandler {
    book_repo: Arc<dyn BookRepositoryPort>,
}

impl ListBooksHandler {
    pub fn new(book_repo: Arc<dyn BookRepositoryPort>) -> Self {
        Self { book_repo }
    }

    pub async fn handle(&self, ctx: &RequestContext, _query: ListBooks) -> Result<Vec<Book>, ApplicationError> {
        let books = if ctx.is_admin() {
            self.book_repo.find_all().await?
        } else {
            self.book_repo.find_by_owner(&ctx.user_id).await?
        };
        Ok(books)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteBookRepository,
    };

    #[tokio::test]
    async fn test_members_only_see_their_books() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteBookRepository::new(pool));
        for owner in ["u1", "u1", "u2"] {
            let book = Book::new(
                owner,
                BookTitle::new("Field Notes").unwrap(),
                BookType::Guide,
                Niche::Travel,
                BookContext::default(),
                false,
            )
            .unwrap();
            repo.save(&book).await.unwrap();
        }
        let handler = ListBooksHandler::new(repo.clone());

        let mine = handler.handle(&RequestContext::member("u1"), ListBooks).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|b| b.owner_id == "u1"));

        let all = handler.handle(&RequestContext::admin("root"), ListBooks).await.unwrap();
        assert_eq!(all.len(), 3);

        let err = GetBookHandler::new(repo)
            .handle(&RequestContext::member("u3"), GetBook { book_id: mine[0].id })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Forbidden(_)));
    }
}
