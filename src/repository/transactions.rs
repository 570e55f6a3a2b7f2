//! Transactions repository: persistence for the borrow lifecycle.
//!
//! Every state transition runs as a single database transaction. The
//! transaction row is locked first (`SELECT ... FOR UPDATE`), preconditions
//! are checked against live data, and the status write and its inventory
//! settlement commit together. Concurrent approvals of the last copy
//! therefore serialize on the row locks and the conditional decrement, and
//! at most one of them succeeds.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    fine,
    models::transaction::{
        CreateTransaction, Transaction, TransactionDetails, TransactionQuery, TransactionStatus,
    },
    repository::books::BooksRepository,
};

const DETAILS_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.book_id, t.quantity, t.status, t.borrow_date,
           t.due_date, t.return_date, t.fine_amount, t.created_at,
           u.name AS user_name, u.email AS user_email, u.role AS user_role,
           b.title AS book_title, b.author AS book_author
    FROM transactions t
    LEFT JOIN users u ON t.user_id = u.id
    LEFT JOIN books b ON t.book_id = b.id
"#;

#[derive(Clone)]
pub struct TransactionsRepository {
    pool: Pool<Postgres>,
    books: BooksRepository,
}

impl TransactionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: BooksRepository::new(pool.clone()),
            pool,
        }
    }

    /// Get transaction by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Transaction> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Get transaction with joined user and book fields
    pub async fn get_details(&self, id: i32) -> AppResult<TransactionDetails> {
        sqlx::query_as::<_, TransactionDetails>(&format!("{} WHERE t.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// List transactions with filters and pagination.
    ///
    /// `restrict_to_user` scopes the result to one user's rows on top of
    /// whatever filters the query carries (student visibility).
    pub async fn list(
        &self,
        query: &TransactionQuery,
        restrict_to_user: Option<i32>,
    ) -> AppResult<(Vec<TransactionDetails>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
        let status = query.status.map(|s| s.as_str().to_string());

        let filter = r#"
            WHERE ($1::text IS NULL OR t.status = $1)
              AND ($2::int4 IS NULL OR t.user_id = $2)
              AND ($3::int4 IS NULL OR t.book_id = $3)
              AND ($4::int4 IS NULL OR t.user_id = $4)
        "#;

        let rows = sqlx::query_as::<_, TransactionDetails>(&format!(
            "{} {} ORDER BY t.created_at DESC LIMIT $5 OFFSET $6",
            DETAILS_SELECT, filter
        ))
        .bind(&status)
        .bind(query.user_id)
        .bind(query.book_id)
        .bind(restrict_to_user)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM transactions t {}",
            filter
        ))
        .bind(&status)
        .bind(query.user_id)
        .bind(query.book_id)
        .bind(restrict_to_user)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }

    /// Create a new borrow request in `pending` status.
    ///
    /// Inventory and quota are deliberately not checked here; both are
    /// evaluated against live counts at approval time.
    pub async fn create(
        &self,
        input: &CreateTransaction,
        borrow_date: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<TransactionDetails> {
        if self.has_active_borrow(input.user_id, input.book_id).await? {
            return Err(AppError::Conflict(
                "User already has this book borrowed".to_string(),
            ));
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO transactions (user_id, book_id, quantity, status, borrow_date, due_date, fine_amount)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING id
            "#,
        )
        .bind(input.user_id)
        .bind(input.book_id)
        .bind(input.quantity)
        .bind(TransactionStatus::Pending)
        .bind(borrow_date)
        .bind(due_date)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(transaction_id = id, user_id = input.user_id, book_id = input.book_id,
            "Borrow request created");

        self.get_details(id).await
    }

    /// Approve a pending request and move it to `borrowed`.
    ///
    /// Preconditions are checked in order, each with its own failure mode:
    /// pending status, no duplicate active borrow, copies available, quota
    /// not reached. This is the only place inventory is decremented.
    pub async fn approve(
        &self,
        id: i32,
        today: NaiveDate,
        default_limit: i64,
    ) -> AppResult<TransactionDetails> {
        let mut tx = self.pool.begin().await?;

        let t = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if t.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(
                "Only pending borrow requests can be approved".to_string(),
            ));
        }

        let duplicate: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM transactions
                WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            )
            "#,
        )
        .bind(t.user_id)
        .bind(t.book_id)
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Err(AppError::Conflict(
                "User already has this book borrowed".to_string(),
            ));
        }

        let available = self.books.available_copies_for_update(&mut tx, t.book_id).await?;
        if available <= 0 {
            return Err(AppError::InsufficientInventory(format!(
                "Book {} has no available copies",
                t.book_id
            )));
        }

        // Locking the user row serializes concurrent approvals for the same
        // borrower, so the quota count below stays accurate.
        let limit: Option<i64> = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT max_borrow_limit FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(t.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", t.user_id)))?;
        let limit = limit.unwrap_or(default_limit);

        let borrowed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND status = 'borrowed'",
        )
        .bind(t.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if borrowed >= limit {
            return Err(AppError::QuotaExceeded(format!(
                "User has reached the maximum borrow limit ({} books)",
                limit
            )));
        }

        // The book leaves the shelf now, so the borrow date is re-stamped
        // here rather than kept from request time.
        sqlx::query("UPDATE transactions SET status = $1, borrow_date = $2 WHERE id = $3")
            .bind(TransactionStatus::Borrowed)
            .bind(today)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        self.books.decrement_available(&mut tx, t.book_id, t.quantity).await?;

        tx.commit().await?;

        tracing::info!(transaction_id = id, user_id = t.user_id, book_id = t.book_id,
            "Borrow request approved");

        self.get_details(id).await
    }

    /// Reject a pending request. The record is retained for audit.
    pub async fn reject(&self, id: i32) -> AppResult<TransactionDetails> {
        let mut tx = self.pool.begin().await?;

        let t = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if t.status != TransactionStatus::Pending {
            return Err(AppError::InvalidState(
                "Only pending borrow requests can be rejected".to_string(),
            ));
        }

        sqlx::query("UPDATE transactions SET status = $1 WHERE id = $2")
            .bind(TransactionStatus::Rejected)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_details(id).await
    }

    /// Close a borrowed or overdue transaction and restore its copies.
    ///
    /// The increment exactly offsets the approve-time decrement, quantity
    /// for quantity. This is the only place inventory is incremented.
    pub async fn return_transaction(
        &self,
        id: i32,
        return_timestamp: DateTime<Utc>,
    ) -> AppResult<TransactionDetails> {
        let mut tx = self.pool.begin().await?;

        let t = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if t.status == TransactionStatus::Returned {
            return Err(AppError::AlreadyReturned("Book already returned".to_string()));
        }
        if !t.status.is_active() {
            return Err(AppError::InvalidState(
                "Only borrowed or overdue books can be returned".to_string(),
            ));
        }

        let fine_amount = fine::compute_fine(t.due_date, return_timestamp.date_naive());

        sqlx::query(
            "UPDATE transactions SET status = $1, return_date = $2, fine_amount = $3 WHERE id = $4",
        )
        .bind(TransactionStatus::Returned)
        .bind(return_timestamp)
        .bind(fine_amount)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        self.books.increment_available(&mut tx, t.book_id, t.quantity).await?;

        tx.commit().await?;

        tracing::info!(transaction_id = id, fine_amount, "Book returned");

        self.get_details(id).await
    }

    /// Extend the due date by a relative number of days
    pub async fn extend(&self, id: i32, days: i64, today: NaiveDate) -> AppResult<TransactionDetails> {
        self.reschedule(id, today, |t| t.due_date + Duration::days(days)).await
    }

    /// Set an absolute due date
    pub async fn set_due_date(
        &self,
        id: i32,
        new_due_date: NaiveDate,
        today: NaiveDate,
    ) -> AppResult<TransactionDetails> {
        self.reschedule(id, today, |_| new_due_date).await
    }

    /// Shared recompute-on-write path for due-date changes: after the new
    /// due date is known, fine and status are rederived from today's date,
    /// so an extension past today clears the overdue state and its fine.
    async fn reschedule(
        &self,
        id: i32,
        today: NaiveDate,
        new_due: impl FnOnce(&Transaction) -> NaiveDate,
    ) -> AppResult<TransactionDetails> {
        let mut tx = self.pool.begin().await?;

        let t = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if !t.status.is_active() {
            return Err(AppError::InvalidState(
                "Only borrowed or overdue transactions can be rescheduled".to_string(),
            ));
        }

        let due_date = new_due(&t);
        let fine_amount = fine::compute_fine(due_date, today);
        let status = if fine_amount > 0 {
            TransactionStatus::Overdue
        } else {
            TransactionStatus::Borrowed
        };
        debug_assert!(t.status == status || t.status.can_transition_to(status));

        sqlx::query(
            "UPDATE transactions SET due_date = $1, fine_amount = $2, status = $3 WHERE id = $4",
        )
        .bind(due_date)
        .bind(fine_amount)
        .bind(status)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_details(id).await
    }

    /// Delete a settled record. Active (`pending`/`borrowed`) records are
    /// refused; `overdue` ones are allowed as a data-retention measure even
    /// though their reserved copies were never returned.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let t = self.get_by_id(id).await?;

        if !t.status.is_deletable() {
            return Err(AppError::Conflict(
                "Only returned, rejected or overdue transactions can be deleted".to_string(),
            ));
        }

        if t.status == TransactionStatus::Overdue {
            tracing::warn!(
                transaction_id = id,
                book_id = t.book_id,
                quantity = t.quantity,
                "Deleting an unreturned overdue transaction; its reserved copies are not restored"
            );
        }

        let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Transaction with id {} not found",
                id
            )));
        }

        Ok(())
    }

    /// Delete all returned/rejected records plus overdue records created
    /// before `overdue_cutoff`. Scoped to one user when `user_id` is set.
    pub async fn clear_activities(
        &self,
        user_id: Option<i32>,
        overdue_cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE ($1::int4 IS NULL OR user_id = $1)
              AND (status IN ('returned', 'rejected')
                   OR (status = 'overdue' AND created_at < $2))
            "#,
        )
        .bind(user_id)
        .bind(overdue_cutoff)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected())
    }

    // Sweep support ---------------------------------------------------------

    /// Borrowed transactions whose due date has passed
    pub async fn borrowed_past_due(&self, today: NaiveDate) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE status = 'borrowed' AND due_date < $1",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All transactions currently marked overdue
    pub async fn all_overdue(&self) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE status = 'overdue'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Move a borrowed transaction to `overdue` with the given fine.
    ///
    /// Conditional on the row still being `borrowed`, so a concurrent
    /// return or extension simply wins; returns whether the write landed.
    pub async fn mark_overdue(&self, id: i32, fine_amount: i64) -> AppResult<bool> {
        let updated = sqlx::query(
            "UPDATE transactions SET status = 'overdue', fine_amount = $1 WHERE id = $2 AND status = 'borrowed'",
        )
        .bind(fine_amount)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    /// Refresh the accrued fine on a record that is still overdue
    pub async fn refresh_overdue_fine(&self, id: i32, fine_amount: i64) -> AppResult<bool> {
        let updated = sqlx::query(
            "UPDATE transactions SET fine_amount = $1 WHERE id = $2 AND status = 'overdue'",
        )
        .bind(fine_amount)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    async fn has_active_borrow(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM transactions
                WHERE user_id = $1 AND book_id = $2 AND status = 'borrowed'
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
