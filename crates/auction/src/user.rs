use serde::{Deserialize, Serialize};

use gavel_core::{DomainError, DomainResult, Entity, UserId};

/// A registered user: owns auctions and places bids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: Option<UserId>,
    name: String,
    email: String,
}

impl User {
    /// Create a user that has not been persisted yet.
    ///
    /// The name must not be blank and the email must contain an `@`, the
    /// same rules `rename` and `change_email` apply.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let email = email.into();
        check_name(&name)?;
        check_email(&email)?;
        Ok(Self::unvalidated(name, email))
    }

    /// Build from literals known to be well-formed.
    pub(crate) fn unvalidated(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Rehydrate a user loaded from storage.
    pub fn restore(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into();
        check_name(&name)?;
        self.name = name;
        Ok(())
    }

    pub fn change_email(&mut self, email: impl Into<String>) -> DomainResult<()> {
        let email = email.into();
        check_email(&email)?;
        self.email = email;
        Ok(())
    }

    /// Record the identity handed out by the store on first persist.
    pub fn assign_id(&mut self, id: UserId) {
        self.id = Some(id);
    }
}

fn check_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("user name cannot be empty"));
    }
    Ok(())
}

fn check_email(email: &str) -> DomainResult<()> {
    if !email.contains('@') {
        return Err(DomainError::validation(format!("malformed email: {email}")));
    }
    Ok(())
}

impl Entity for User {
    type Id = UserId;
    const KIND: &'static str = "user";

    fn id(&self) -> Option<UserId> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_users_are_not_persisted() {
        let user = User::new("Tobias", "tobias@email.com").unwrap();
        assert!(!user.is_persisted());
        assert_eq!(user.id(), None);
    }

    #[test]
    fn new_applies_the_same_rules_as_the_setters() {
        assert!(matches!(
            User::new("  ", "blank@email.com"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            User::new("Durval", "durval.email.com"),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn rename_rejects_blank_names() {
        let mut user = User::new("Durval", "durval@email.com").unwrap();
        assert!(user.rename("   ").is_err());
        assert_eq!(user.name(), "Durval");

        user.rename("Supremo Durval").unwrap();
        assert_eq!(user.name(), "Supremo Durval");
    }

    #[test]
    fn change_email_requires_an_at_sign() {
        let mut user = User::new("Durval", "durval@email.com").unwrap();
        assert!(matches!(
            user.change_email("durval.email.com"),
            Err(DomainError::Validation(_))
        ));
        user.change_email("d@email.com").unwrap();
        assert_eq!(user.email(), "d@email.com");
    }
}
