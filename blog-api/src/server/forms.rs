use blog_common::model::comment::CreateComment;
use lettre::Address;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_owned())
}

/// Accepts exactly the addresses the mailer can deliver to.
fn mail_address(address: &str) -> Result<(), ValidationError> {
    match address.parse::<Address>() {
        Ok(_) => Ok(()),
        Err(_) => Err(
            ValidationError::new("email").with_message("Enter a valid email address.".into()),
        ),
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 80, message = "Enter a name of 1 to 80 characters."))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(custom(function = "mail_address"))]
    pub email: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "This field is required."))]
    pub body: String,
}

impl From<CommentForm> for CreateComment {
    fn from(form: CommentForm) -> Self {
        Self {
            name: form.name,
            email: form.email,
            body: form.body,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Validate)]
pub struct SharePostForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 25, message = "Enter a name of 1 to 25 characters."))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(custom(function = "mail_address"))]
    pub email: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(custom(function = "mail_address"))]
    pub to: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub comments: String,
}

/// Validation messages keyed by field name.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0.get(field)?.first().map(String::as_str)
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|error| {
                        error
                            .message
                            .as_ref()
                            .map_or_else(|| error.code.to_string(), ToString::to_string)
                    })
                    .collect();

                (field.to_string(), messages)
            })
            .collect();

        Self(fields)
    }
}

/// Submitted form data together with its validation result, for re-rendering.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct BoundForm<T> {
    pub data: T,
    pub errors: FieldErrors,
}

impl<T: Validate> BoundForm<T> {
    pub fn bind(data: T) -> Self {
        let errors = data
            .validate()
            .map_or_else(FieldErrors::from, |()| FieldErrors::default());

        Self { data, errors }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
