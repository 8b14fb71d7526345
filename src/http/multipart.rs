//! multipart/form-data framing
//!
//! The body is assembled from three pieces: a head holding every text field
//! plus the file part's headers, the file bytes copied verbatim, and a tail
//! carrying the closing boundary. File sources on disk are streamed rather
//! than read into memory.

use std::io;
use std::path::PathBuf;

use bytes::{BufMut, Bytes, BytesMut};
use futures::{StreamExt, stream};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const CRLF: &str = "\r\n";
const OSM_CONTENT_TYPE: &str = "application/xml";

/// Where the file part's bytes come from
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Bytes),
}

/// The single file attached to a form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub source: FileSource,
}

impl FilePart {
    /// OSM XML file part, the only kind the upload endpoint accepts
    pub fn osm_xml(field_name: impl Into<String>, file_name: impl Into<String>, source: FileSource) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type: OSM_CONTENT_TYPE.to_string(),
            source,
        }
    }
}

/// Ordered text fields plus an optional file part
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    fields: Vec<(String, String)>,
    file: Option<FilePart>,
}

/// A ready-to-send body
pub struct MultipartBody {
    pub content_type: String,
    pub content_length: u64,
    pub body: reqwest::Body,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// New form with a boundary unique to this request
    pub fn new() -> Self {
        Self::with_boundary(format!("----VerdictBoundary{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
            file: None,
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add a text field only when a value is present
    pub fn optional_text(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn head(&self) -> Bytes {
        let mut buf = BytesMut::new();

        for (name, value) in &self.fields {
            buf.put_slice(format!("--{}{CRLF}", self.boundary).as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"{CRLF}{CRLF}",
                    escape_quotes(name)
                )
                .as_bytes(),
            );
            buf.put_slice(value.as_bytes());
            buf.put_slice(CRLF.as_bytes());
        }

        if let Some(file) = &self.file {
            buf.put_slice(format!("--{}{CRLF}", self.boundary).as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{CRLF}",
                    escape_quotes(&file.field_name),
                    escape_quotes(&file.file_name)
                )
                .as_bytes(),
            );
            buf.put_slice(format!("Content-Type: {}{CRLF}{CRLF}", file.content_type).as_bytes());
        }

        buf.freeze()
    }

    fn tail(&self) -> Bytes {
        let closing = format!("--{}--{CRLF}", self.boundary);
        if self.file.is_some() {
            Bytes::from(format!("{CRLF}{closing}"))
        } else {
            Bytes::from(closing)
        }
    }

    /// The complete body, when no part has to be read from disk
    pub fn render(&self) -> Option<Bytes> {
        let file_bytes = match self.file.as_ref().map(|f| &f.source) {
            None => Bytes::new(),
            Some(FileSource::Bytes(bytes)) => bytes.clone(),
            Some(FileSource::Path(_)) => return None,
        };

        let head = self.head();
        let tail = self.tail();
        let mut buf = BytesMut::with_capacity(head.len() + file_bytes.len() + tail.len());
        buf.put(head);
        buf.put(file_bytes);
        buf.put(tail);
        Some(buf.freeze())
    }

    /// Build the request body, streaming a file source from disk
    pub async fn into_body(self) -> io::Result<MultipartBody> {
        let content_type = self.content_type();

        if let Some(rendered) = self.render() {
            return Ok(MultipartBody {
                content_type,
                content_length: rendered.len() as u64,
                body: reqwest::Body::from(rendered),
            });
        }

        let path = match self.file.as_ref().map(|f| &f.source) {
            Some(FileSource::Path(path)) => path.clone(),
            _ => return Err(io::Error::other("multipart form has no file source")),
        };

        let file = tokio::fs::File::open(&path).await?;
        let file_len = file.metadata().await?.len();
        let head = self.head();
        let tail = self.tail();
        let content_length = head.len() as u64 + file_len + tail.len() as u64;

        let stream = stream::once(async move { Ok::<Bytes, io::Error>(head) })
            .chain(ReaderStream::new(file))
            .chain(stream::once(async move { Ok::<Bytes, io::Error>(tail) }));

        Ok(MultipartBody {
            content_type,
            content_length,
            body: reqwest::Body::wrap_stream(stream),
        })
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "%22").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(form: &MultipartForm) -> String {
        String::from_utf8(form.render().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_text_field_framing() {
        let form = MultipartForm::with_boundary("B").text("validation_log_id", "12");
        assert_eq!(
            rendered(&form),
            "--B\r\nContent-Disposition: form-data; name=\"validation_log_id\"\r\n\r\n12\r\n--B--\r\n"
        );
    }

    #[test]
    fn test_file_part_framing() {
        let form = MultipartForm::with_boundary("B").file(FilePart::osm_xml(
            "file",
            "task.osm",
            FileSource::Bytes(Bytes::from_static(b"<osm/>")),
        ));
        assert_eq!(
            rendered(&form),
            "--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"task.osm\"\r\n\
             Content-Type: application/xml\r\n\r\n<osm/>\r\n--B--\r\n"
        );
    }

    #[test]
    fn test_optional_field_omitted() {
        let form = MultipartForm::with_boundary("B")
            .text("validation_log_id", "1")
            .optional_text("task_id", None::<String>);
        assert!(!rendered(&form).contains("name=\"task_id\""));
    }

    #[test]
    fn test_optional_field_present_once() {
        let form = MultipartForm::with_boundary("B").optional_text("task_id", Some("T-1"));
        let body = rendered(&form);
        assert_eq!(body.matches("name=\"task_id\"").count(), 1);
        assert!(body.contains("name=\"task_id\"\r\n\r\nT-1\r\n"));
    }

    #[test]
    fn test_boundaries_are_unique() {
        let a = MultipartForm::new();
        let b = MultipartForm::new();
        assert_ne!(a.boundary(), b.boundary());
        assert!(a.content_type().starts_with("multipart/form-data; boundary=----VerdictBoundary"));
    }

    #[test]
    fn test_path_source_is_not_rendered() {
        let form = MultipartForm::new().file(FilePart::osm_xml(
            "file",
            "x.osm",
            FileSource::Path(PathBuf::from("/nonexistent/x.osm")),
        ));
        assert!(form.render().is_none());
    }

    #[tokio::test]
    async fn test_streamed_body_length() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.osm");
        std::fs::write(&path, b"<osm version=\"0.6\"/>").unwrap();

        let form = MultipartForm::with_boundary("B")
            .text("a", "1")
            .file(FilePart::osm_xml("file", "data.osm", FileSource::Path(path)));
        let expected = form.head().len() + 20 + form.tail().len();

        let body = form.into_body().await.unwrap();
        assert_eq!(body.content_length, expected as u64);
    }
}
