//! Multipart form reading

use axum::extract::Multipart;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::services::attendance::PhotoUpload;

/// Text fields and files of a multipart request
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, PhotoUpload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.files.insert(
                            name,
                            PhotoUpload {
                                filename,
                                bytes: bytes.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Non-blank text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn decimal(&self, name: &str) -> AppResult<Option<Decimal>> {
        self.text(name)
            .map(|v| {
                Decimal::from_str(&v)
                    .map_err(|_| AppError::validation(name, format!("{} must be a number", name)))
            })
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<PhotoUpload> {
        self.files.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_decimal_fields() {
        let mut form = FormData::default();
        form.fields.insert("latitude".into(), " -6.175392 ".into());
        form.fields.insert("notes".into(), "   ".into());
        form.fields.insert("longitude".into(), "east".into());

        assert_eq!(
            form.decimal("latitude").unwrap(),
            Some(Decimal::from_str("-6.175392").unwrap())
        );
        assert_eq!(form.text("notes"), None);
        assert!(form.decimal("longitude").is_err());
        assert_eq!(form.decimal("missing").unwrap(), None);
    }
}
