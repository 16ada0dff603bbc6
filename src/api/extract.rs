/// Request body extractors reporting failures through the error envelope
use crate::error::PlazaError;
use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        rejection::JsonRejection,
        FromRequest,
    },
    http::StatusCode,
};

/// `axum::Json` with rejections mapped to `PlazaError`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(PlazaError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for PlazaError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return PlazaError::PayloadTooLarge("Request body is too large".to_string());
        }
        PlazaError::invalid("body", rejection.body_text())
    }
}

impl From<MultipartError> for PlazaError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return PlazaError::PayloadTooLarge("Image exceeds the upload size limit".to_string());
        }
        PlazaError::invalid("body", err.body_text())
    }
}

/// Fields of an image upload form (`image` file, optional `caption`)
#[derive(Debug, Default)]
pub struct ImageForm {
    pub caption: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl ImageForm {
    /// Drain a multipart body; unknown fields are ignored
    pub async fn read(mut multipart: Multipart, max_image_bytes: usize) -> Result<Self, PlazaError> {
        let mut form = ImageForm::default();

        while let Some(field) = multipart.next_field().await? {
            match field.name() {
                Some("image") => {
                    let data = field.bytes().await?;
                    if data.len() > max_image_bytes {
                        return Err(PlazaError::PayloadTooLarge(format!(
                            "Image exceeds the {} byte upload limit",
                            max_image_bytes
                        )));
                    }
                    if !data.is_empty() {
                        form.image = Some(data.to_vec());
                    }
                }
                Some("caption") => form.caption = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// The image, or a validation error naming the field
    pub fn require_image(&mut self) -> Result<Vec<u8>, PlazaError> {
        self.image
            .take()
            .ok_or_else(|| PlazaError::invalid("image", "An image file is required"))
    }
}
