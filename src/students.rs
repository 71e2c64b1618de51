//! Student records: list, view, add, edit, delete
//!
//! Adds and edits go out as multipart forms because the backend derives the
//! face embedding from the uploaded photo.

use crate::api::{ApiClient, Student};
use crate::error::ApiError;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::path::Path;
use tracing::info;

/// Image file attached to a student form
#[derive(Debug, Clone)]
pub struct Photo {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Photo {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read photo {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo.jpg".to_string());

        Ok(Self { file_name, bytes })
    }

    fn mime(&self) -> &'static str {
        let lower = self.file_name.to_ascii_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else {
            "image/jpeg"
        }
    }

    fn into_part(self) -> Result<Part, ApiError> {
        let mime = self.mime();
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(mime)
            .map_err(ApiError::from)
    }
}

/// Fields for add/edit. On edit, `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub full_name: Option<String>,
    pub class_name: Option<String>,
    /// Links (or creates) the parent account with this email
    pub parent_email: Option<String>,
    pub photo: Option<Photo>,
}

impl StudentForm {
    fn into_multipart(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (name, value) in [
            ("full_name", self.full_name),
            ("class_name", self.class_name),
            ("parent_email", self.parent_email),
        ] {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }
        if let Some(photo) = self.photo {
            form = form.part("photo", photo.into_part()?);
        }
        Ok(form)
    }
}

pub async fn list(client: &ApiClient) -> Result<Vec<Student>, ApiError> {
    client.get_json("/students").await
}

pub async fn get(client: &ApiClient, id: i64) -> Result<Student, ApiError> {
    client.get_json(&format!("/students/{}", id)).await
}

/// `POST /students`. A name is required; the backend also insists on a photo.
pub async fn add(client: &ApiClient, form: StudentForm) -> Result<Student, ApiError> {
    if form.full_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(ApiError::Validation {
            detail: Some("full name required".to_string()),
        });
    }

    let builder = client
        .authed(Method::POST, "/students")?
        .multipart(form.into_multipart()?);
    let student: Student = client.send_json(builder).await?;
    info!("Added student {} ({})", student.id, student.full_name);
    Ok(student)
}

/// `PUT /students/{id}` with only the fields that are set
pub async fn update(client: &ApiClient, id: i64, form: StudentForm) -> Result<Student, ApiError> {
    let builder = client
        .authed(Method::PUT, &format!("/students/{}", id))?
        .multipart(form.into_multipart()?);
    let student: Student = client.send_json(builder).await?;
    info!("Updated student {}", student.id);
    Ok(student)
}

pub async fn delete(client: &ApiClient, id: i64) -> Result<(), ApiError> {
    client.delete(&format!("/students/{}", id)).await?;
    info!("Deleted student {}", id);
    Ok(())
}
