//! Field validation for the submitted forms.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use quill_types::api::{FeedbackForm, LoginForm, RegisterForm};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Field name -> messages, in field-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

pub trait Validate {
    fn validate(&self) -> FormErrors;
}

impl Validate for RegisterForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        check_length(&mut errors, "username", &self.username, 1, 20);
        check_password(&mut errors, &self.password);
        if check_length(&mut errors, "email", &self.email, 1, 50) && !valid_email(&self.email) {
            errors.add("email", "Invalid email address.");
        }
        check_length(&mut errors, "first_name", &self.first_name, 1, 30);
        check_length(&mut errors, "last_name", &self.last_name, 1, 30);
        errors
    }
}

impl Validate for LoginForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        check_length(&mut errors, "username", &self.username, 1, 20);
        check_password(&mut errors, &self.password);
        errors
    }
}

impl Validate for FeedbackForm {
    fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        check_length(&mut errors, "title", &self.title, 1, 100);
        check_required(&mut errors, "content", &self.content);
        errors
    }
}

const REQUIRED: &str = "This field is required.";

fn check_required(errors: &mut FormErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        return false;
    }
    true
}

/// Required, with a length in chars between `min` and `max` inclusive.
fn check_length(
    errors: &mut FormErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> bool {
    check_required(errors, field, value) && check_bounds(errors, field, value, min, max)
}

/// Whitespace is a legitimate password, so only a truly empty one is missing.
fn check_password(errors: &mut FormErrors, value: &str) -> bool {
    if value.is_empty() {
        errors.add("password", REQUIRED);
        return false;
    }
    check_bounds(errors, "password", value, 6, 20)
}

fn check_bounds(
    errors: &mut FormErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> bool {
    let len = value.chars().count();
    if len < min || len > max {
        if min <= 1 {
            errors.add(field, format!("Must be at most {max} characters."));
        } else {
            errors.add(field, format!("Must be between {min} and {max} characters."));
        }
        return false;
    }
    true
}

fn valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}
