use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Moderated;
use crate::status::{RouteStatus, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "facil")]
    Easy,
    #[serde(rename = "moderado")]
    Moderate,
    #[serde(rename = "dificil")]
    Hard,
    #[serde(rename = "experto")]
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "facil",
            Difficulty::Moderate => "moderado",
            Difficulty::Hard => "dificil",
            Difficulty::Expert => "experto",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "facil" | "fácil" | "easy" => Ok(Difficulty::Easy),
            "moderado" | "moderate" => Ok(Difficulty::Moderate),
            "dificil" | "difícil" | "hard" => Ok(Difficulty::Hard),
            "experto" | "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// A published or pending cycling route, with its creator's name denormalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub creator_id: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub distance_km: f64,
    pub difficulty: Difficulty,
    pub price: Decimal,
    pub status: RouteStatus,
    #[serde(default)]
    pub total_sales: i64,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Moderated for RouteRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Status {
        Status::Route(self.status)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
