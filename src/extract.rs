use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};

use crate::{dto::products::ProductPayload, error::AppError};

/// `Json` whose rejections are rendered through [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug)]
pub enum ImageInput {
    /// Raw file received in a multipart form, not yet stored.
    Upload { file_name: String, bytes: Vec<u8> },
    /// Path of an image that is already stored.
    Path(String),
}

/// Product create/update input, decoded from either JSON or `multipart/form-data`.
/// Absent and blank fields are `None`.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<i64>,
    /// Set by a JSON `null` or a form value of `null`; wins over `category_id`.
    pub clear_category: bool,
    pub image: Option<ImageInput>,
}

impl From<ProductPayload> for ProductForm {
    fn from(payload: ProductPayload) -> Self {
        Self {
            name: non_blank(payload.name),
            price: payload.price,
            category_id: payload.category_id.flatten(),
            clear_category: matches!(payload.category_id, Some(None)),
            image: non_blank(payload.image).map(ImageInput::Path),
        }
    }
}

impl<S> FromRequest<S> for ProductForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(payload) = Json::<ProductPayload>::from_request(req, state).await?;
            return Ok(payload.into());
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut form = ProductForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "image" {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
                if !bytes.is_empty() {
                    form.image = Some(ImageInput::Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read field: {e}")))?;
            let Some(value) = non_blank(Some(text)) else {
                continue;
            };
            match name.as_str() {
                "name" => form.name = Some(value),
                "price" => form.price = Some(parse_number(&value, "price")?),
                "category_id" if value.eq_ignore_ascii_case("null") => form.clear_category = true,
                "category_id" => form.category_id = Some(parse_number(&value, "category_id")?),
                _ => {}
            }
        }

        Ok(form)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number(value: &str, field: &str) -> Result<i64, AppError> {
    value
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{field} must be a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn multipart_form_is_decoded() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nMug\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"price\"\r\n\r\n1200\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"category_id\"\r\n\r\n \r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"mug.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let form = ProductForm::from_request(req, &()).await.unwrap();

        assert_eq!(form.name.as_deref(), Some("Mug"));
        assert_eq!(form.price, Some(1200));
        assert_eq!(form.category_id, None);
        match form.image {
            Some(ImageInput::Upload { file_name, bytes }) => {
                assert_eq!(file_name, "mug.png");
                assert_eq!(bytes, b"PNGDATA");
            }
            other => panic!("unexpected image: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_numeric_price_is_rejected() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"price\"\r\n\r\ncheap\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let err = ProductForm::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.to_string(), "Bad Request: price must be a number");
    }

    #[tokio::test]
    async fn json_body_is_decoded() {
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Mug","price":900,"image":"/uploads/a.png"}"#))
            .unwrap();

        let form = ProductForm::from_request(req, &()).await.unwrap();

        assert_eq!(form.name.as_deref(), Some("Mug"));
        assert_eq!(form.price, Some(900));
        assert!(matches!(form.image, Some(ImageInput::Path(p)) if p == "/uploads/a.png"));
        assert!(!form.clear_category);
    }

    #[tokio::test]
    async fn null_category_requests_removal() {
        let req = Request::builder()
            .method("PUT")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"category_id":null}"#))
            .unwrap();
        let form = ProductForm::from_request(req, &()).await.unwrap();
        assert!(form.clear_category);
        assert_eq!(form.category_id, None);

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"category_id\"\r\n\r\nnull\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("PUT")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let form = ProductForm::from_request(req, &()).await.unwrap();
        assert!(form.clear_category);
    }
}
