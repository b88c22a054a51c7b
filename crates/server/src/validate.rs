// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request payload validation. All violations are reported together.

use regex::Regex;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 100;

/// A registration payload that passed validation, with normalized fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// A login payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLogin {
    pub email: String,
    pub password: String,
}

pub struct Validator {
    email: Regex,
}

impl Validator {
    pub fn new() -> anyhow::Result<Self> {
        let email = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")?;
        Ok(Self { email })
    }

    fn check_email(&self, raw: Option<&str>, errors: &mut Vec<String>) -> String {
        let email = crate::store::normalize_email(raw.unwrap_or_default());
        if email.is_empty() {
            errors.push("email is required".to_owned());
        } else if email.len() > MAX_EMAIL_LEN {
            errors.push(format!("email must be at most {MAX_EMAIL_LEN} characters"));
        } else if !self.email.is_match(&email) {
            errors.push("email must be a valid email address".to_owned());
        }
        email
    }

    pub fn registration(
        &self,
        email: Option<&str>,
        password: Option<&str>,
        name: Option<&str>,
    ) -> Result<ValidRegistration, Vec<String>> {
        let mut errors = Vec::new();
        let email = self.check_email(email, &mut errors);

        let password = password.unwrap_or_default();
        let len = password.chars().count();
        if len == 0 {
            errors.push("password is required".to_owned());
        } else if len < MIN_PASSWORD_LEN {
            errors.push(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
        } else if len > MAX_PASSWORD_LEN {
            errors.push(format!("password must be at most {MAX_PASSWORD_LEN} characters"));
        }

        // A blank name is the same as no name.
        let name = match name.map(str::trim) {
            None | Some("") => None,
            Some(n) if n.chars().count() > MAX_NAME_LEN => {
                errors.push(format!("name must be at most {MAX_NAME_LEN} characters"));
                None
            }
            Some(n) => Some(n.to_owned()),
        };

        if errors.is_empty() {
            Ok(ValidRegistration { email, password: password.to_owned(), name })
        } else {
            Err(errors)
        }
    }

    /// Login only checks presence; format rules would leak which accounts exist.
    pub fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<ValidLogin, Vec<String>> {
        let mut errors = Vec::new();
        let email = crate::store::normalize_email(email.unwrap_or_default());
        if email.is_empty() {
            errors.push("email is required".to_owned());
        }
        let password = password.unwrap_or_default();
        if password.is_empty() {
            errors.push("password is required".to_owned());
        }
        if errors.is_empty() {
            Ok(ValidLogin { email, password: password.to_owned() })
        } else {
            Err(errors)
        }
    }
}

/// Join violations into the single message returned to callers.
pub fn join_errors(errors: &[String]) -> String {
    errors.join("; ")
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
