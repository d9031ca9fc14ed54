//! Validated account inputs: registration, login, profile edits, and
//! password changes.
//!
//! Each constructor checks its fields in a fixed order and stops at the
//! first failure with a message naming the field.

use std::fmt;

use super::{ProfileUpdate, Role};
use crate::error::ApiError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const PASSWORD_MIN: usize = 6;
const EMAIL_MAX: usize = 254;

fn invalid(field: &str, rule: &str) -> ApiError {
    ApiError::Validation(format!("\"{field}\" {rule}"))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    match value {
        None => Err(invalid(field, "is required")),
        Some("") => Err(invalid(field, "is not allowed to be empty")),
        Some(v) => Ok(v),
    }
}

fn check_username(value: &str) -> Result<(), ApiError> {
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("username", "must only contain alpha-numeric characters"));
    }
    let len = value.chars().count();
    if len < USERNAME_MIN {
        return Err(invalid(
            "username",
            &format!("length must be at least {USERNAME_MIN} characters long"),
        ));
    }
    if len > USERNAME_MAX {
        return Err(invalid(
            "username",
            &format!("length must be less than or equal to {USERNAME_MAX} characters long"),
        ));
    }
    Ok(())
}

/// Shape check: one `@`, a non-empty local part, and a dotted domain whose
/// labels are alphanumeric or hyphenated with an alphabetic TLD of two or
/// more letters.
fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.chars().any(|c| c.is_whitespace() || c == '@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    let Some(tld) = labels.last() else {
        return false;
    };
    labels.len() >= 2
        && labels.iter().all(|l| {
            !l.is_empty()
                && !l.starts_with('-')
                && !l.ends_with('-')
                && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

fn check_email(value: &str) -> Result<(), ApiError> {
    if value.chars().count() <= EMAIL_MAX && is_email(value) {
        Ok(())
    } else {
        Err(invalid("email", "must be a valid email"))
    }
}

fn check_password(field: &str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() < PASSWORD_MIN {
        return Err(invalid(
            field,
            &format!("length must be at least {PASSWORD_MIN} characters long"),
        ));
    }
    Ok(())
}

fn parse_role(value: Option<&str>) -> Result<Role, ApiError> {
    match value {
        None => Ok(Role::default()),
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid("role", "must be one of [admin, user, viewer]")),
    }
}

/// A validated self-service registration.
#[derive(Clone)]
pub struct Registration {
    /// Alphanumeric, 3 to 30 characters.
    pub username: String,
    /// Shape-checked address.
    pub email: String,
    /// Plaintext, at least 6 characters.
    pub password: String,
    /// Requested role, `user` when omitted.
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Validates raw registration fields.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn parse(
        username: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, ApiError> {
        let username = required("username", username)?;
        check_username(username)?;
        let email = required("email", email)?;
        check_email(email)?;
        let password = required("password", password)?;
        check_password("password", password)?;
        let role = parse_role(role)?;
        Ok(Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        })
    }
}

/// Login credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Validates raw login fields.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn parse(email: Option<&str>, password: Option<&str>) -> Result<Self, ApiError> {
        let email = required("email", email)?;
        check_email(email)?;
        let password = required("password", password)?;
        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }
}

/// A request to replace the caller's password.
#[derive(Clone)]
pub struct PasswordChange {
    /// Password the caller claims to have.
    pub current: String,
    /// Replacement, at least 6 characters.
    pub new: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

impl PasswordChange {
    /// Validates raw password-change fields.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn parse(current: Option<&str>, new: Option<&str>) -> Result<Self, ApiError> {
        let current = required("currentPassword", current)?;
        let new = required("newPassword", new)?;
        check_password("newPassword", new)?;
        Ok(Self {
            current: current.to_string(),
            new: new.to_string(),
        })
    }
}

impl ProfileUpdate {
    /// Validates the fields of a partial profile update. Absent fields are
    /// left untouched; supplying neither is allowed here and rejected by
    /// the auth service.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn parse(username: Option<&str>, email: Option<&str>) -> Result<Self, ApiError> {
        if let Some(username) = username {
            if username.is_empty() {
                return Err(invalid("username", "is not allowed to be empty"));
            }
            check_username(username)?;
        }
        if let Some(email) = email {
            if email.is_empty() {
                return Err(invalid("email", "is not allowed to be empty"));
            }
            check_email(email)?;
        }
        Ok(Self {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn message(err: ApiError) -> String {
        match err {
            ApiError::Validation(msg) => msg,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn registration_defaults_role_to_user() {
        let Ok(reg) = Registration::parse(Some("pilot1"), Some("p@example.com"), Some("secret"), None)
        else {
            panic!("valid registration rejected");
        };
        assert_eq!(reg.role, Role::User);
    }

    #[test]
    fn registration_reports_first_failure_in_field_order() {
        let Err(err) = Registration::parse(None, Some("not-an-email"), Some("x"), None) else {
            panic!("missing username accepted");
        };
        assert_eq!(message(err), "\"username\" is required");

        let Err(err) = Registration::parse(Some("pilot"), Some("not-an-email"), Some("x"), None)
        else {
            panic!("bad email accepted");
        };
        assert_eq!(message(err), "\"email\" must be a valid email");

        let long = format!("{}@example.com", "a".repeat(250));
        let Err(err) = Registration::parse(Some("pilot"), Some(&long), Some("secret1"), None)
        else {
            panic!("overlong email accepted");
        };
        assert_eq!(message(err), "\"email\" must be a valid email");
    }

    #[test]
    fn username_rules() {
        let cases = [
            ("ab", "\"username\" length must be at least 3 characters long"),
            ("has space", "\"username\" must only contain alpha-numeric characters"),
            (
                "a234567890123456789012345678901",
                "\"username\" length must be less than or equal to 30 characters long",
            ),
        ];
        for (username, expected) in cases {
            let Err(err) =
                Registration::parse(Some(username), Some("p@example.com"), Some("secret"), None)
            else {
                panic!("{username} accepted");
            };
            assert_eq!(message(err), expected);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let Err(err) = Registration::parse(
            Some("pilot"),
            Some("p@example.com"),
            Some("secret"),
            Some("root"),
        ) else {
            panic!("unknown role accepted");
        };
        assert_eq!(message(err), "\"role\" must be one of [admin, user, viewer]");
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("ops@drones.example.org"));
        assert!(is_email("first.last+tag@example.io"));
        assert!(!is_email("no-at-sign"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("user@localhost"));
        assert!(!is_email("user@example.c"));
        assert!(!is_email("user@-bad.com"));
        assert!(!is_email("us er@example.com"));
    }

    #[test]
    fn short_new_password_is_rejected() {
        let Err(err) = PasswordChange::parse(Some("old-secret"), Some("123")) else {
            panic!("short password accepted");
        };
        assert_eq!(
            message(err),
            "\"newPassword\" length must be at least 6 characters long"
        );
    }

    #[test]
    fn login_requires_password() {
        let Err(err) = Credentials::parse(Some("p@example.com"), None) else {
            panic!("missing password accepted");
        };
        assert_eq!(message(err), "\"password\" is required");
    }

    #[test]
    fn profile_update_fields_are_optional() {
        let Ok(update) = ProfileUpdate::parse(None, Some("new@example.com")) else {
            panic!("valid update rejected");
        };
        assert!(update.username.is_none());
        assert!(!update.is_empty());

        let Ok(empty) = ProfileUpdate::parse(None, None) else {
            panic!("empty update rejected at parse time");
        };
        assert!(empty.is_empty());
    }
}
