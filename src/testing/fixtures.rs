//! Sample records for tests and demos

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::auth::{issue, Credential, Identity, Role};
use crate::error::ConsoleResult;
use crate::models::{
    Difficulty, RouteRecord, StoreRecord, TransactionRecord, TransactionType, UserRecord,
};
use crate::status::{PaymentStatus, RouteStatus, StoreStatus};

pub const TEST_SECRET: &str = "pedal-test-secret";

/// Whole seconds, matching what survives a JWT round trip
fn at_second(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(at.timestamp(), 0).single().unwrap_or(at)
}

pub fn identity(id: &str, role: Role, ttl: Duration) -> Identity {
    Identity {
        id: id.to_string(),
        name: format!("Admin {}", id),
        email: format!("{}@pedal.example", id),
        role,
        expires_at: at_second(Utc::now() + ttl),
    }
}

pub fn credential(identity: &Identity) -> ConsoleResult<Credential> {
    issue(identity, TEST_SECRET)
}

pub fn user(id: &str, is_active: bool) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: format!("{}@pedal.example", id),
        full_name: format!("Ciclista {}", id),
        role: Role::Rider,
        phone: None,
        is_active,
        email_verified: true,
        created_at: Utc::now(),
        last_login: None,
    }
}

pub fn route(id: &str, status: RouteStatus) -> RouteRecord {
    RouteRecord {
        id: id.to_string(),
        creator_id: "c1".to_string(),
        creator_name: Some("Carla Creadora".to_string()),
        title: format!("Ruta {}", id),
        description: Some("Vuelta por la sierra".to_string()),
        distance_km: 42.5,
        difficulty: Difficulty::Moderate,
        price: Decimal::new(1500, 2),
        status,
        total_sales: 0,
        view_count: 0,
        average_rating: 0.0,
        created_at: Utc::now(),
        published_at: None,
    }
}

pub fn store(id: &str, status: StoreStatus) -> StoreRecord {
    StoreRecord {
        id: id.to_string(),
        owner_id: "m1".to_string(),
        owner_name: Some("Mario Comerciante".to_string()),
        name: format!("Taller {}", id),
        description: None,
        address: Some("Calle Mayor 1".to_string()),
        phone: None,
        status,
        total_orders: 0,
        average_rating: 0.0,
        created_at: Utc::now(),
        approved_at: None,
    }
}

/// A pending route purchase
pub fn transaction(id: &str) -> TransactionRecord {
    TransactionRecord {
        id: id.to_string(),
        user_id: "u1".to_string(),
        user_name: Some("Ciclista u1".to_string()),
        transaction_type: TransactionType::RoutePurchase,
        amount: Decimal::new(1500, 2),
        payment_status: PaymentStatus::Pending,
        route_id: Some("r1".to_string()),
        order_id: None,
        payment_method: Some("tarjeta".to_string()),
        created_at: Utc::now(),
        completed_at: None,
    }
}
