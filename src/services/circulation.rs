//! Circulation service: borrow workflow orchestration and policy.
//!
//! Input validation and caller authorization live here; the state machine
//! itself is enforced by the transactions repository.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use validator::Validate;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        transaction::{BorrowRequest, CreateTransaction, TransactionDetails, TransactionQuery},
        user::{Role, UserClaims},
    },
    repository::Repository,
};

/// Accepted relative extension durations, in days
pub const EXTENSION_DAYS: [i64; 3] = [1, 3, 7];

/// Extension applied when the request names no duration
pub const DEFAULT_EXTENSION_DAYS: i64 = 7;

/// Overdue records older than this many days are swept by a bulk clear
pub const OVERDUE_RETENTION_DAYS: i64 = 30;

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    config: CirculationConfig,
}

impl CirculationService {
    pub fn new(repository: Repository, config: CirculationConfig) -> Self {
        Self { repository, config }
    }

    /// Create a borrow request. Always lands in `pending`: every borrow
    /// goes through approval for accountability, admin-initiated ones
    /// included.
    pub async fn create(
        &self,
        actor: &UserClaims,
        request: BorrowRequest,
    ) -> AppResult<TransactionDetails> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let user_id = match actor.role {
            Role::Student => match request.user_id {
                Some(id) if id != actor.user_id => {
                    return Err(AppError::Authorization(
                        "Students can only borrow books for themselves".to_string(),
                    ))
                }
                _ => actor.user_id,
            },
            Role::Admin => request.user_id.ok_or_else(|| {
                AppError::Validation("user_id is required".to_string())
            })?,
        };

        // Verify both references exist before anything is written
        self.repository.users.get_by_id(user_id).await?;
        self.repository.books.get_by_id(request.book_id).await?;

        let today = Utc::now().date_naive();
        let due_date = match request.due_date.as_deref() {
            Some(raw) => {
                let date = parse_date(raw)?;
                if date < today {
                    return Err(AppError::Validation(
                        "Due date must not be in the past".to_string(),
                    ));
                }
                date
            }
            None => today + Duration::days(self.config.loan_period_days),
        };

        let input = CreateTransaction {
            user_id,
            book_id: request.book_id,
            quantity: request.quantity.unwrap_or(1),
        };

        self.repository.transactions.create(&input, today, due_date).await
    }

    /// Get one transaction; students may only see their own
    pub async fn get(&self, actor: &UserClaims, id: i32) -> AppResult<TransactionDetails> {
        let details = self.repository.transactions.get_details(id).await?;
        actor.require_admin_or_self(details.user_id)?;
        Ok(details)
    }

    /// List transactions; students are scoped to their own rows
    pub async fn list(
        &self,
        actor: &UserClaims,
        query: &TransactionQuery,
    ) -> AppResult<(Vec<TransactionDetails>, i64)> {
        let restrict_to_user = (!actor.is_admin()).then_some(actor.user_id);
        self.repository.transactions.list(query, restrict_to_user).await
    }

    /// Approve a pending request against live inventory and quota
    pub async fn approve(&self, id: i32) -> AppResult<TransactionDetails> {
        let today = Utc::now().date_naive();
        self.repository
            .transactions
            .approve(id, today, self.config.default_max_borrow_limit)
            .await
    }

    /// Reject a pending request
    pub async fn reject(&self, id: i32) -> AppResult<TransactionDetails> {
        self.repository.transactions.reject(id).await
    }

    /// Return a book; allowed for admins and the borrower
    pub async fn return_book(
        &self,
        actor: &UserClaims,
        id: i32,
        return_timestamp: Option<DateTime<Utc>>,
    ) -> AppResult<TransactionDetails> {
        let transaction = self.repository.transactions.get_by_id(id).await?;
        actor.require_admin_or_self(transaction.user_id)?;

        let return_timestamp = return_timestamp.unwrap_or_else(Utc::now);
        self.repository
            .transactions
            .return_transaction(id, return_timestamp)
            .await
    }

    /// Extend the due date by 1, 3 or 7 days (7 when unspecified)
    pub async fn extend(&self, id: i32, days: Option<i64>) -> AppResult<TransactionDetails> {
        let days = validate_extension_days(days)?;
        let today = Utc::now().date_naive();
        self.repository.transactions.extend(id, days, today).await
    }

    /// Set an absolute due date and recompute fine/status against today
    pub async fn update_due_date(
        &self,
        id: i32,
        due_date: Option<&str>,
    ) -> AppResult<TransactionDetails> {
        let raw = due_date
            .ok_or_else(|| AppError::Validation("due_date is required".to_string()))?;
        let date = parse_date(raw)?;
        let today = Utc::now().date_naive();
        self.repository.transactions.set_due_date(id, date, today).await
    }

    /// Delete a settled transaction
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.transactions.delete(id).await
    }

    /// Clear settled activity: all returned/rejected records plus overdue
    /// records past retention. Admins clear everything, students their own.
    pub async fn clear_activities(&self, actor: &UserClaims) -> AppResult<u64> {
        let scope = (!actor.is_admin()).then_some(actor.user_id);
        let cutoff = Utc::now() - Duration::days(OVERDUE_RETENTION_DAYS);
        self.repository.transactions.clear_activities(scope, cutoff).await
    }
}

fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date format: {}", raw)))
}

fn validate_extension_days(days: Option<i64>) -> AppResult<i64> {
    let days = days.unwrap_or(DEFAULT_EXTENSION_DAYS);
    if EXTENSION_DAYS.contains(&days) {
        Ok(days)
    } else {
        Err(AppError::Validation(
            "Invalid extension duration; use 1, 3 or 7 days".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_granular_dates() {
        assert_eq!(
            parse_date("2024-01-04").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()
        );
        assert!(parse_date("04/01/2024").is_err());
        assert!(parse_date("not-a-date").is_err());
    }

    #[test]
    fn extension_accepts_only_the_fixed_durations() {
        assert_eq!(validate_extension_days(Some(1)).unwrap(), 1);
        assert_eq!(validate_extension_days(Some(3)).unwrap(), 3);
        assert_eq!(validate_extension_days(Some(7)).unwrap(), 7);
        assert_eq!(validate_extension_days(None).unwrap(), DEFAULT_EXTENSION_DAYS);
        assert!(validate_extension_days(Some(2)).is_err());
        assert!(validate_extension_days(Some(0)).is_err());
        assert!(validate_extension_days(Some(-7)).is_err());
    }
}
