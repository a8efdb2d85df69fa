pub mod route;
pub mod stats;
pub mod store;
pub mod transaction;
pub mod user;

use chrono::{DateTime, Utc};

use crate::status::Status;

pub use route::{Difficulty, RouteRecord};
pub use stats::DashboardStats;
pub use store::StoreRecord;
pub use transaction::{TransactionRecord, TransactionType};
pub use user::{NewUser, UserRecord, UserUpdate};

/// A record with an administrator-controlled status
pub trait Moderated {
    fn id(&self) -> &str;
    fn status(&self) -> Status;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Admin lists are shown newest first
pub fn sort_newest_first<T: Moderated>(records: &mut [T]) {
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}
