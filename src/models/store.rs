use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Moderated;
use crate::status::{Status, StoreStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: StoreStatus,
    #[serde(default)]
    pub total_orders: i64,
    #[serde(default)]
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

impl Moderated for StoreRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        Status::Store(self.status)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
