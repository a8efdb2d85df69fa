use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Role;
use crate::models::{
    Difficulty, RouteRecord, StoreRecord, TransactionRecord, TransactionType, UserRecord,
};
use crate::status::{PaymentStatus, RouteStatus, StoreStatus};

/// Inclusive creation-time window; open on either side when unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    fn push_query(&self, pairs: &mut Vec<(&'static str, String)>) {
        if let Some(from) = self.from {
            pairs.push(("from", from.to_rfc3339()));
        }
        if let Some(to) = self.to {
            pairs.push(("to", to.to_rfc3339()));
        }
    }
}

/// Free-text search term, ignored when blank
fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UserFilter {
    pub fn search(&self) -> Option<&str> {
        search_term(&self.search)
    }

    /// Name or email
    pub fn matches(&self, user: &UserRecord) -> bool {
        if let Some(term) = self.search() {
            if !contains_ci(Some(&user.full_name), term) && !contains_ci(Some(&user.email), term) {
                return false;
            }
        }
        self.role.map_or(true, |role| user.role == role)
            && self.active.map_or(true, |active| user.is_active == active)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(term) = self.search() {
            pairs.push(("search", term.to_string()));
        }
        if let Some(role) = self.role {
            pairs.push(("role", role.as_str().to_string()));
        }
        if let Some(active) = self.active {
            pairs.push(("is_active", active.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RouteStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "DateRange::is_open")]
    pub created: DateRange,
}

impl RouteFilter {
    pub fn search(&self) -> Option<&str> {
        search_term(&self.search)
    }

    /// Title or creator name
    pub fn matches(&self, route: &RouteRecord) -> bool {
        if let Some(term) = self.search() {
            if !contains_ci(Some(&route.title), term) && !contains_ci(route.creator_name.as_deref(), term) {
                return false;
            }
        }
        self.status.map_or(true, |status| route.status == status)
            && self.difficulty.map_or(true, |d| route.difficulty == d)
            && self.created.contains(route.created_at)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(term) = self.search() {
            pairs.push(("search", term.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(difficulty) = self.difficulty {
            pairs.push(("difficulty", difficulty.as_str().to_string()));
        }
        self.created.push_query(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StoreStatus>,
    #[serde(skip_serializing_if = "DateRange::is_open")]
    pub created: DateRange,
}

impl StoreFilter {
    pub fn search(&self) -> Option<&str> {
        search_term(&self.search)
    }

    /// Store name or owner name
    pub fn matches(&self, store: &StoreRecord) -> bool {
        if let Some(term) = self.search() {
            if !contains_ci(Some(&store.name), term) && !contains_ci(store.owner_name.as_deref(), term) {
                return false;
            }
        }
        self.status.map_or(true, |status| store.status == status) && self.created.contains(store.created_at)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(term) = self.search() {
            pairs.push(("search", term.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        self.created.push_query(&mut pairs);
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(skip_serializing_if = "DateRange::is_open")]
    pub created: DateRange,
}

impl TransactionFilter {
    pub fn search(&self) -> Option<&str> {
        search_term(&self.search)
    }

    /// Buyer name or transaction id
    pub fn matches(&self, tx: &TransactionRecord) -> bool {
        if let Some(term) = self.search() {
            if !contains_ci(tx.user_name.as_deref(), term) && !contains_ci(Some(&tx.id), term) {
                return false;
            }
        }
        self.status.map_or(true, |status| tx.payment_status == status)
            && self.transaction_type.map_or(true, |t| tx.transaction_type == t)
            && self.created.contains(tx.created_at)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(term) = self.search() {
            pairs.push(("search", term.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("payment_status", status.as_str().to_string()));
        }
        if let Some(kind) = self.transaction_type {
            pairs.push(("transaction_type", kind.as_str().to_string()));
        }
        self.created.push_query(&mut pairs);
        pairs
    }
}
