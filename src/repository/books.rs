//! Books repository: reference reads plus the inventory ledger.
//!
//! The ledger operations run inside the caller's open database transaction
//! so a status change and its inventory settlement commit together.

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Lock the book row and return its available copy count.
    ///
    /// Callers that go on to decrement must hold this lock for the rest of
    /// their transaction.
    pub async fn available_copies_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
    ) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "SELECT available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    /// Reserve `quantity` copies of a book. The update is conditional on
    /// enough copies remaining, so concurrent reservations cannot drive the
    /// count negative.
    pub async fn decrement_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        quantity: i32,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - $1
            WHERE id = $2 AND available_copies >= $1
            "#,
        )
        .bind(quantity)
        .bind(book_id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::InsufficientInventory(format!(
                "Book {} does not have {} available copies",
                book_id, quantity
            )));
        }

        Ok(())
    }

    /// Release `quantity` copies back to the shelf. Total copies are not
    /// tracked here, so there is no upper bound on the count.
    pub async fn increment_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        quantity: i32,
    ) -> AppResult<()> {
        let updated = sqlx::query(
            "UPDATE books SET available_copies = available_copies + $1 WHERE id = $2",
        )
        .bind(quantity)
        .bind(book_id)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                book_id
            )));
        }

        Ok(())
    }
}
