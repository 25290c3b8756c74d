use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Membership role carried in access tokens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }

    /// Staff and admins may use the admin console
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(Role::Customer),
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("unknown role {}", other))),
        }
    }
}

/// Corporate customers are billed by invoice instead of paying up front
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Personal,
    Corporate,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Personal => "PERSONAL",
            CustomerType::Corporate => "CORPORATE",
        }
    }
}

impl std::str::FromStr for CustomerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSONAL" => Ok(CustomerType::Personal),
            "CORPORATE" => Ok(CustomerType::Corporate),
            other => Err(CoreError::ValidationError(format!("unknown customer type {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub customer_type: CustomerType,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_corporate(&self) -> bool {
        self.customer_type == CustomerType::Corporate
    }
}

/// Registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(default = "default_customer_type")]
    pub customer_type: CustomerType,
    pub company_name: Option<String>,
}

fn default_customer_type() -> CustomerType {
    CustomerType::Personal
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl NewUser {
    pub fn validate(&self) -> Result<(), CoreError> {
        normalize_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.full_name.trim().is_empty() {
            return Err(CoreError::ValidationError("full name is required".into()));
        }
        if self.customer_type == CustomerType::Corporate
            && self.company_name.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(CoreError::ValidationError(
                "corporate customers must provide a company name".into(),
            ));
        }
        Ok(())
    }

    /// Validate, hash the password and build a customer account
    pub fn into_user(self) -> Result<User, CoreError> {
        self.validate()?;
        let password_hash = hash_password(&self.password)
            .map_err(|e| CoreError::InternalError(format!("password hashing failed: {}", e)))?;

        Ok(User {
            id: Uuid::new_v4(),
            email: normalize_email(&self.email)?,
            password_hash,
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            role: Role::Customer,
            customer_type: self.customer_type,
            company_name: self.company_name.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        })
    }
}

/// Lower-case and trim an e-mail, rejecting anything without a local part and domain
pub fn normalize_email(email: &str) -> Result<String, CoreError> {
    let email = email.trim().to_lowercase();
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(CoreError::ValidationError(format!("invalid e-mail address: {}", email))),
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
