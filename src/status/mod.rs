pub mod controller;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::QueryScope;
use crate::error::{ConsoleError, ConsoleResult};

pub use controller::{StatusController, TransitionOutcome};

/// Entity types whose status an administrator moderates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Route,
    Store,
    Transaction,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Route => "route",
            EntityKind::Store => "store",
            EntityKind::Transaction => "transaction",
            EntityKind::User => "user",
        }
    }

    /// Collection segment in admin endpoints and table name in the relational store
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Route => "routes",
            EntityKind::Store => "stores",
            EntityKind::Transaction => "transactions",
            EntityKind::User => "users",
        }
    }

    /// Reads that must be refetched after this kind is mutated
    pub fn dependent_scopes(&self) -> [QueryScope; 2] {
        let list = match self {
            EntityKind::Route => QueryScope::Routes,
            EntityKind::Store => QueryScope::Stores,
            EntityKind::Transaction => QueryScope::Transactions,
            EntityKind::User => QueryScope::Users,
        };
        [list, QueryScope::DashboardStats]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "route" | "routes" | "ruta" | "rutas" => Ok(EntityKind::Route),
            "store" | "stores" | "comercio" | "comercios" => Ok(EntityKind::Store),
            "transaction" | "transactions" | "payment" | "payments" | "transaccion" => {
                Ok(EntityKind::Transaction)
            }
            "user" | "users" | "usuario" | "usuarios" => Ok(EntityKind::User),
            other => Err(ConsoleError::config(format!("unknown entity type '{}'", other))),
        }
    }
}

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident, $kind:tt { $($variant:ident => $wire:tt),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConsoleError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ConsoleError::InvalidStatus {
                        kind: $kind.to_string(),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

status_enum! {
    RouteStatus, "route" {
        Draft => "borrador",
        PendingApproval => "pendiente_aprobacion",
        Approved => "aprobada",
        Rejected => "rechazada",
        Inactive => "inactiva",
    }
}

status_enum! {
    StoreStatus, "store" {
        PendingApproval => "pendiente_aprobacion",
        Approved => "aprobado",
        Suspended => "suspendido",
        Rejected => "rechazado",
    }
}

status_enum! {
    /// Observed only; the console never moves a payment
    PaymentStatus, "transaction" {
        Pending => "pendiente",
        Completed => "completado",
        Failed => "fallido",
        Refunded => "reembolsado",
    }
}

status_enum! {
    /// Stored as the `is_active` flag
    UserState, "user" {
        Active => "activo",
        Suspended => "suspendido",
    }
}

impl UserState {
    pub fn from_flag(is_active: bool) -> Self {
        if is_active {
            UserState::Active
        } else {
            UserState::Suspended
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UserState::Active)
    }

    pub fn toggled(&self) -> Self {
        UserState::from_flag(!self.is_active())
    }
}

/// Status of any moderated entity, tagged by entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Route(RouteStatus),
    Store(StoreStatus),
    Payment(PaymentStatus),
    User(UserState),
}

impl Status {
    pub fn kind(&self) -> EntityKind {
        match self {
            Status::Route(_) => EntityKind::Route,
            Status::Store(_) => EntityKind::Store,
            Status::Payment(_) => EntityKind::Transaction,
            Status::User(_) => EntityKind::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Route(s) => s.as_str(),
            Status::Store(s) => s.as_str(),
            Status::Payment(s) => s.as_str(),
            Status::User(s) => s.as_str(),
        }
    }

    /// Parse a wire value within the closed enumeration of `kind`
    pub fn parse(kind: EntityKind, value: &str) -> ConsoleResult<Status> {
        Ok(match kind {
            EntityKind::Route => Status::Route(value.parse()?),
            EntityKind::Store => Status::Store(value.parse()?),
            EntityKind::Transaction => Status::Payment(value.parse()?),
            EntityKind::User => Status::User(value.parse()?),
        })
    }

    /// Every value of the same enumeration
    pub fn siblings(&self) -> Vec<Status> {
        match self {
            Status::Route(_) => RouteStatus::ALL.iter().copied().map(Status::Route).collect(),
            Status::Store(_) => StoreStatus::ALL.iter().copied().map(Status::Store).collect(),
            Status::Payment(_) => PaymentStatus::ALL.iter().copied().map(Status::Payment).collect(),
            Status::User(_) => UserState::ALL.iter().copied().map(Status::User).collect(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamp column written together with a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampField {
    PublishedAt,
    ApprovedAt,
}

impl StampField {
    pub fn column(&self) -> &'static str {
        match self {
            StampField::PublishedAt => "published_at",
            StampField::ApprovedAt => "approved_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stamp {
    pub field: StampField,
    pub at: DateTime<Utc>,
}

/// One validated status write. Backends apply it as a single-row
/// compare-and-set: status and stamp together, only while the row still holds `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: Status,
    pub to: Status,
    pub stamp: Option<Stamp>,
}

/// The transition table. Returns the stamp the move implies, or
/// `IllegalTransition` for any pair not listed.
pub fn plan(from: Status, to: Status) -> ConsoleResult<Option<StampField>> {
    use Status::{Route, Store, User};

    match (from, to) {
        (Route(RouteStatus::PendingApproval), Route(RouteStatus::Approved)) => {
            Ok(Some(StampField::PublishedAt))
        }
        (Route(RouteStatus::PendingApproval), Route(RouteStatus::Rejected))
        | (Route(RouteStatus::Approved), Route(RouteStatus::Inactive)) => Ok(None),

        (Store(StoreStatus::PendingApproval), Store(StoreStatus::Approved)) => {
            Ok(Some(StampField::ApprovedAt))
        }
        (Store(StoreStatus::PendingApproval), Store(StoreStatus::Rejected))
        | (Store(StoreStatus::Approved), Store(StoreStatus::Suspended)) => Ok(None),

        (User(UserState::Active), User(UserState::Suspended))
        | (User(UserState::Suspended), User(UserState::Active)) => Ok(None),

        _ => Err(ConsoleError::IllegalTransition {
            kind: from.kind().to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Statuses an administrator may move `from` into
pub fn legal_targets(from: Status) -> Vec<Status> {
    from.siblings()
        .into_iter()
        .filter(|to| plan(from, *to).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_statuses() -> Vec<Status> {
        [
            Status::Route(RouteStatus::Draft),
            Status::Store(StoreStatus::PendingApproval),
            Status::Payment(PaymentStatus::Pending),
            Status::User(UserState::Active),
        ]
        .iter()
        .flat_map(|s| s.siblings())
        .collect()
    }

    #[test]
    fn table_lists_exactly_the_admin_edges() {
        let legal: Vec<(Status, Status)> = all_statuses()
            .into_iter()
            .flat_map(|from| all_statuses().into_iter().map(move |to| (from, to)))
            .filter(|(from, to)| plan(*from, *to).is_ok())
            .collect();

        let expected = vec![
            (Status::Route(RouteStatus::PendingApproval), Status::Route(RouteStatus::Approved)),
            (Status::Route(RouteStatus::PendingApproval), Status::Route(RouteStatus::Rejected)),
            (Status::Route(RouteStatus::Approved), Status::Route(RouteStatus::Inactive)),
            (Status::Store(StoreStatus::PendingApproval), Status::Store(StoreStatus::Approved)),
            (Status::Store(StoreStatus::PendingApproval), Status::Store(StoreStatus::Rejected)),
            (Status::Store(StoreStatus::Approved), Status::Store(StoreStatus::Suspended)),
            (Status::User(UserState::Active), Status::User(UserState::Suspended)),
            (Status::User(UserState::Suspended), Status::User(UserState::Active)),
        ];

        assert_eq!(legal.len(), expected.len());
        for edge in expected {
            assert!(legal.contains(&edge), "missing {:?}", edge);
        }
    }

    #[test]
    fn approvals_carry_their_stamp() {
        assert_eq!(
            plan(
                Status::Route(RouteStatus::PendingApproval),
                Status::Route(RouteStatus::Approved)
            )
            .unwrap(),
            Some(StampField::PublishedAt)
        );
        assert_eq!(
            plan(
                Status::Store(StoreStatus::PendingApproval),
                Status::Store(StoreStatus::Approved)
            )
            .unwrap(),
            Some(StampField::ApprovedAt)
        );
    }

    #[test]
    fn suspended_store_cannot_return_to_pending() {
        let err = plan(
            Status::Store(StoreStatus::Suspended),
            Status::Store(StoreStatus::PendingApproval),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "ILLEGAL_TRANSITION");
    }

    #[test]
    fn payments_have_no_admin_edges() {
        for from in PaymentStatus::ALL {
            assert!(legal_targets(Status::Payment(*from)).is_empty());
        }
    }

    #[test]
    fn cross_kind_moves_are_illegal() {
        assert!(plan(
            Status::Route(RouteStatus::PendingApproval),
            Status::Store(StoreStatus::Approved)
        )
        .is_err());
    }

    #[test]
    fn parses_within_the_declared_enumeration() {
        assert_eq!(
            Status::parse(EntityKind::Store, "aprobado").unwrap(),
            Status::Store(StoreStatus::Approved)
        );
        // "aprobada" is the route spelling
        assert!(matches!(
            Status::parse(EntityKind::Store, "aprobada"),
            Err(ConsoleError::InvalidStatus { .. })
        ));
        assert_eq!(
            Status::parse(EntityKind::User, "suspendido").unwrap(),
            Status::User(UserState::Suspended)
        );
    }

    #[test]
    fn serde_uses_wire_values() {
        assert_eq!(
            serde_json::to_value(RouteStatus::PendingApproval).unwrap(),
            "pendiente_aprobacion"
        );
        let parsed: StoreStatus = serde_json::from_value(serde_json::json!("suspendido")).unwrap();
        assert_eq!(parsed, StoreStatus::Suspended);
    }

    #[test]
    fn entity_kind_accepts_spanish_names() {
        assert_eq!("comercio".parse::<EntityKind>().unwrap(), EntityKind::Store);
        assert_eq!("routes".parse::<EntityKind>().unwrap(), EntityKind::Route);
        assert!("order".parse::<EntityKind>().is_err());
    }

    #[test]
    fn user_state_toggles() {
        assert_eq!(UserState::Active.toggled(), UserState::Suspended);
        assert_eq!(UserState::from_flag(false).toggled(), UserState::Active);
    }
}
