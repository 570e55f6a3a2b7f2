//! Borrow transaction model and status state machine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::user::Role;

/// Lifecycle status of a borrow transaction.
///
/// The legal transitions are:
///
/// ```text
/// pending  -> borrowed | rejected
/// borrowed -> overdue  | returned
/// overdue  -> returned | borrowed   (back to borrowed only via a due-date change)
/// ```
///
/// `returned` and `rejected` are terminal. [`TransactionStatus::can_transition_to`]
/// is the authoritative edge list; each operation checks its required source
/// status before writing, so an illegal transition is a checked failure
/// rather than a stray string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Borrowed,
    Overdue,
    Returned,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Borrowed => "borrowed",
            TransactionStatus::Overdue => "overdue",
            TransactionStatus::Returned => "returned",
            TransactionStatus::Rejected => "rejected",
        }
    }

    /// The explicit transition table
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Borrowed)
                | (Pending, Rejected)
                | (Borrowed, Overdue)
                | (Borrowed, Returned)
                | (Overdue, Returned)
                | (Overdue, Borrowed)
        )
    }

    /// A copy of the book is out under this transaction
    pub fn is_active(self) -> bool {
        matches!(self, TransactionStatus::Borrowed | TransactionStatus::Overdue)
    }

    /// No further transitions exist from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Returned | TransactionStatus::Rejected)
    }

    /// Records in these states may be deleted. Overdue records are included
    /// as a data-retention allowance even though they are not terminal.
    pub fn is_deletable(self) -> bool {
        matches!(
            self,
            TransactionStatus::Returned | TransactionStatus::Rejected | TransactionStatus::Overdue
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "borrowed" => Ok(TransactionStatus::Borrowed),
            "overdue" => Ok(TransactionStatus::Overdue),
            "returned" => Ok(TransactionStatus::Returned),
            "rejected" => Ok(TransactionStatus::Rejected),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

// SQLx conversion for TransactionStatus (stored as text)
impl sqlx::Type<Postgres> for TransactionStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for TransactionStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for TransactionStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Transaction model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transaction {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    /// Copies covered by this single transaction
    pub quantity: i32,
    pub status: TransactionStatus,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
    /// Currency units; always the fine calculator's output
    pub fine_amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Transaction with joined user and book fields for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TransactionDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub quantity: i32,
    pub status: TransactionStatus,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: i64,
    pub created_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<Role>,
    pub book_title: Option<String>,
    pub book_author: Option<String>,
}

/// Borrow request body.
///
/// `user_id` may be omitted by students (they borrow for themselves);
/// admins must name the borrower. `due_date` is `YYYY-MM-DD`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    pub user_id: Option<i32>,
    pub book_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub due_date: Option<String>,
}

/// Resolved input for creating a borrow request
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: i32,
    pub book_id: i32,
    pub quantity: i32,
}

/// Transaction list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::TransactionStatus::*;
    use super::*;

    const ALL: [TransactionStatus; 5] = [Pending, Borrowed, Overdue, Returned, Rejected];

    #[test]
    fn transition_table_admits_only_the_enumerated_edges() {
        let legal = [
            (Pending, Borrowed),
            (Pending, Rejected),
            (Borrowed, Overdue),
            (Borrowed, Returned),
            (Overdue, Returned),
            (Overdue, Borrowed),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Returned, Rejected] {
            for to in ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn deletable_covers_terminal_states_and_overdue() {
        assert!(Returned.is_deletable());
        assert!(Rejected.is_deletable());
        assert!(Overdue.is_deletable());
        assert!(!Pending.is_deletable());
        assert!(!Borrowed.is_deletable());
    }

    #[test]
    fn only_borrowed_and_overdue_are_active() {
        assert!(Borrowed.is_active());
        assert!(Overdue.is_active());
        assert!(!Pending.is_active());
        assert!(!Returned.is_active());
        assert!(!Rejected.is_active());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ALL {
            assert_eq!(s.as_str().parse::<TransactionStatus>().unwrap(), s);
        }
        assert!("lost".parse::<TransactionStatus>().is_err());
    }
}
