use std::collections::BTreeMap;

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::AppError;

/// Field name -> message, rendered next to the offending input.
pub type FormErrors = BTreeMap<&'static str, String>;

const MIN_PASSWORD_LEN: usize = 8;

fn require(errors: &mut FormErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field, message.to_string());
    }
}

fn check_passwords(errors: &mut FormErrors, first: &str, second: &str) {
    if first.len() < MIN_PASSWORD_LEN {
        errors.insert(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    } else if first != second {
        errors.insert("password", "the two password fields didn't match".into());
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "username", &self.username, "enter a username");
        if !self.email.contains('@') {
            errors.insert("email", "enter a valid email address".into());
        }
        check_passwords(&mut errors, &self.password1, &self.password2);
        errors
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "text", &self.text, "enter the comment text");
        errors
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        check_passwords(&mut errors, &self.new_password1, &self.new_password2);
        errors
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetForm {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirmForm {
    pub token: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordResetConfirmForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        check_passwords(&mut errors, &self.new_password1, &self.new_password2);
        errors
    }
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The create/edit post form, decoded from a multipart body.
#[derive(Debug, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Uuid>,
    group_invalid: bool,
    pub image: Option<UploadedImage>,
}

impl PostForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        require(&mut errors, "text", &self.text, "enter the post text");
        if self.group_invalid {
            errors.insert("group", "select a valid group".into());
        }
        if let Some(image) = &self.image {
            if !image.content_type.starts_with("image/") {
                errors.insert("image", "upload a valid image".into());
            }
        }
        errors
    }
}

pub async fn read_post_form(mut payload: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Invalid(format!("bad multipart body: {e}")))?
    {
        let name = field.name().to_string();
        match name.as_str() {
            "text" => form.text = read_text(&mut field).await?,
            "group" => {
                let raw = read_text(&mut field).await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    form.group = Uuid::parse_str(raw).ok();
                    form.group_invalid = form.group.is_none();
                }
            }
            "image" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .map(|s| s.to_string());
                let content_type = field
                    .content_type()
                    .map(|m| m.essence_str().to_string())
                    .unwrap_or_default();
                let bytes = read_bytes(&mut field).await?;
                // an empty file input still submits a nameless part
                if let Some(filename) = filename.filter(|f| !f.is_empty()) {
                    if !bytes.is_empty() {
                        form.image = Some(UploadedImage {
                            filename,
                            content_type,
                            bytes,
                        });
                    }
                }
            }
            _ => {
                read_bytes(&mut field).await?;
            }
        }
    }
    Ok(form)
}

async fn read_bytes(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::Invalid(format!("bad multipart body: {e}")))?
    {
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let bytes = read_bytes(field).await?;
    String::from_utf8(bytes).map_err(|_| AppError::Invalid("form field is not utf-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_post_text_is_an_error() {
        let form = PostForm {
            text: "   ".into(),
            ..Default::default()
        };
        let errors = form.validate();
        assert!(errors.contains_key("text"));
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let form = PostForm {
            text: "ok".into(),
            image: Some(UploadedImage {
                filename: "notes.txt".into(),
                content_type: "text/plain".into(),
                bytes: b"hello".to_vec(),
            }),
            ..Default::default()
        };
        assert!(form.validate().contains_key("image"));

        let form = PostForm {
            text: "ok".into(),
            image: Some(UploadedImage {
                filename: "small.gif".into(),
                content_type: "image/gif".into(),
                bytes: b"GIF89a".to_vec(),
            }),
            ..Default::default()
        };
        assert!(form.validate().is_empty());
    }

    #[test]
    fn signup_passwords_must_match_and_be_long_enough() {
        let base = SignupForm {
            first_name: String::new(),
            last_name: String::new(),
            username: "auth".into(),
            email: "auth@example.com".into(),
            password1: "longenough1".into(),
            password2: "longenough1".into(),
        };
        assert!(base.validate().is_empty());

        let mismatch = SignupForm {
            password2: "different123".into(),
            ..base
        };
        assert!(mismatch.validate().contains_key("password"));

        let short = SignupForm {
            first_name: String::new(),
            last_name: String::new(),
            username: "auth".into(),
            email: "auth@example.com".into(),
            password1: "short".into(),
            password2: "short".into(),
        };
        assert!(short.validate().contains_key("password"));
    }

    #[test]
    fn blank_comment_is_an_error() {
        let form = CommentForm { text: "".into() };
        assert!(form.validate().contains_key("text"));
        let ok = CommentForm { text: "hi".into() };
        assert!(ok.validate().is_empty());
    }
}
