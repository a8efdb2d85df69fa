pub mod client;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

pub use client::{AuthClient, RegisterRequest};

/// Marketplace roles. Wire values follow the relational schema; the display
/// labels sent by older registration forms are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ciclista", alias = "Ciclista")]
    Rider,
    #[serde(rename = "comerciante", alias = "Comerciante")]
    Merchant,
    #[serde(rename = "creador_ruta", alias = "Creador de Rutas", alias = "Creador de Ruta")]
    RouteCreator,
    #[serde(rename = "administrador", alias = "Administrador")]
    Administrator,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Rider, Role::Merchant, Role::RouteCreator, Role::Administrator];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "ciclista",
            Role::Merchant => "comerciante",
            Role::RouteCreator => "creador_ruta",
            Role::Administrator => "administrador",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Rider => "Ciclista",
            Role::Merchant => "Comerciante",
            Role::RouteCreator => "Creador de Rutas",
            Role::Administrator => "Administrador",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s || role.label().eq_ignore_ascii_case(s))
            .or(match s {
                "rider" => Some(Role::Rider),
                "merchant" => Some(Role::Merchant),
                "route-creator" | "route_creator" => Some(Role::RouteCreator),
                _ if s.eq_ignore_ascii_case("Creador de Ruta") => Some(Role::RouteCreator),
                "admin" | "administrator" => Some(Role::Administrator),
                _ => None,
            })
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// JWT body issued by the authentication endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "id", alias = "user_id", deserialize_with = "string_or_number")]
    pub sub: String,
    #[serde(alias = "nombre", alias = "full_name")]
    pub name: String,
    pub email: String,
    #[serde(alias = "rol")]
    pub role: Role,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid subject: {}", other))),
    }
}

/// The authenticated principal decoded from a Credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Valid only while `now` is strictly before the expiry instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

impl TryFrom<Claims> for Identity {
    type Error = ConsoleError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| ConsoleError::decode(format!("invalid exp claim: {}", claims.exp)))?;

        if claims.sub.trim().is_empty() {
            return Err(ConsoleError::decode("credential has no subject"));
        }

        Ok(Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            expires_at,
        })
    }
}

impl From<&Identity> for Claims {
    fn from(identity: &Identity) -> Self {
        Self {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            exp: identity.expires_at.timestamp(),
            iat: Some(Utc::now().timestamp()),
        }
    }
}

/// Opaque bearer token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Credential({}...)", prefix)
    }
}

/// Recovers an Identity from a Credential without a network call.
/// Expiry is left to the session layer.
#[derive(Debug, Clone, Default)]
pub struct CredentialDecoder {
    secret: Option<String>,
}

impl CredentialDecoder {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::config().session.jwt_secret.clone())
    }

    pub fn decode(&self, credential: &Credential) -> ConsoleResult<Identity> {
        let token = credential.as_str().trim();
        if token.is_empty() {
            return Err(ConsoleError::decode("empty credential"));
        }

        let data = match &self.secret {
            Some(secret) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.validate_exp = false;
                validation.validate_aud = false;
                decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?
            }
            None => {
                let mut validation = Validation::default();
                validation.insecure_disable_signature_validation();
                validation.validate_exp = false;
                validation.validate_aud = false;
                decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?
            }
        };

        Identity::try_from(data.claims)
    }
}

/// Mint an HS256 credential for an Identity
pub fn issue(identity: &Identity, secret: &str) -> ConsoleResult<Credential> {
    if secret.is_empty() {
        return Err(ConsoleError::config("JWT secret is empty"));
    }
    let claims = Claims::from(identity);
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ConsoleError::config(format!("JWT generation error: {}", e)))?;
    Ok(Credential::new(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn admin(expires_in: Duration) -> Identity {
        Identity {
            id: "a1".to_string(),
            name: "Ana Admin".to_string(),
            email: "ana@pedal.example".to_string(),
            role: Role::Administrator,
            expires_at: Utc.timestamp_opt((Utc::now() + expires_in).timestamp(), 0).unwrap(),
        }
    }

    fn raw_token(body: serde_json::Value) -> Credential {
        let token = encode(&Header::default(), &body, &EncodingKey::from_secret(b"k")).unwrap();
        Credential::new(token)
    }

    #[test]
    fn decodes_issued_credential() {
        let identity = admin(Duration::hours(1));
        let credential = issue(&identity, "secret").unwrap();

        let decoded = CredentialDecoder::default().decode(&credential).unwrap();
        assert_eq!(decoded, identity);
        assert!(decoded.is_valid_at(Utc::now()));
    }

    #[test]
    fn accepts_spanish_field_aliases_and_numeric_ids() {
        let credential = raw_token(json!({
            "id": 7,
            "nombre": "Rita",
            "email": "rita@pedal.example",
            "rol": "Creador de Rutas",
            "exp": 4102444800i64,
        }));

        let identity = CredentialDecoder::default().decode(&credential).unwrap();
        assert_eq!(identity.id, "7");
        assert_eq!(identity.name, "Rita");
        assert_eq!(identity.role, Role::RouteCreator);
    }

    #[test]
    fn registration_form_singular_route_creator_label_decodes() {
        let credential = raw_token(json!({
            "id": "c9",
            "nombre": "Rosa",
            "email": "rosa@pedal.example",
            "rol": "Creador de Ruta",
            "exp": 4102444800i64,
        }));

        let identity = CredentialDecoder::default().decode(&credential).unwrap();
        assert_eq!(identity.role, Role::RouteCreator);
        assert_eq!("Creador de Ruta".parse::<Role>(), Ok(Role::RouteCreator));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let decoder = CredentialDecoder::default();
        for token in ["", "not-a-token", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30.sig"] {
            let err = decoder.decode(&Credential::new(token)).unwrap_err();
            assert!(matches!(err, ConsoleError::Decode(_)), "token {:?} gave {:?}", token, err);
        }
    }

    #[test]
    fn rejects_unknown_role() {
        let credential = raw_token(json!({
            "sub": "u1", "name": "X", "email": "x@y", "role": "superuser", "exp": 4102444800i64,
        }));
        assert!(matches!(
            CredentialDecoder::default().decode(&credential),
            Err(ConsoleError::Decode(_))
        ));
    }

    #[test]
    fn verifies_signature_when_secret_configured() {
        let credential = issue(&admin(Duration::hours(1)), "right").unwrap();

        assert!(CredentialDecoder::new(Some("right".into())).decode(&credential).is_ok());
        assert!(matches!(
            CredentialDecoder::new(Some("wrong".into())).decode(&credential),
            Err(ConsoleError::Decode(_))
        ));
    }

    #[test]
    fn decodes_expired_credentials_without_judging_them() {
        let identity = admin(Duration::seconds(-5));
        let credential = issue(&identity, "secret").unwrap();

        let decoded = CredentialDecoder::default().decode(&credential).unwrap();
        assert!(!decoded.is_valid_at(Utc::now()));
    }

    #[test]
    fn parses_roles_from_cli_input() {
        assert_eq!("administrador".parse::<Role>(), Ok(Role::Administrator));
        assert_eq!("Comerciante".parse::<Role>(), Ok(Role::Merchant));
        assert_eq!("route-creator".parse::<Role>(), Ok(Role::RouteCreator));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn credential_debug_is_masked() {
        let credential = Credential::new("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(format!("{:?}", credential), "Credential(abcdefgh...)");
    }
}
