use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate counts behind the dashboard; every moderation invalidates it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_cyclists: i64,
    pub total_merchants: i64,
    pub total_route_creators: i64,
    pub total_routes: i64,
    pub pending_routes: i64,
    pub total_stores: i64,
    pub pending_stores: i64,
    pub total_revenue: Decimal,
    pub total_transactions: i64,
}
