use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Moderated;
use crate::status::{PaymentStatus, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// A rider buying a route
    #[serde(rename = "compra_ruta")]
    RoutePurchase,
    /// A pickup order placed with a store
    #[serde(rename = "pedido_comercio")]
    StoreOrder,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::RoutePurchase => "compra_ruta",
            TransactionType::StoreOrder => "pedido_comercio",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compra_ruta" | "route" => Ok(TransactionType::RoutePurchase),
            "pedido_comercio" | "order" => Ok(TransactionType::StoreOrder),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Moderated for TransactionRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        Status::Payment(self.payment_status)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
