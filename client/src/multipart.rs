//! Hand-built `multipart/form-data` bodies.
//!
//! The upload endpoints want classic form uploads: boundary string,
//! `Content-Disposition` headers, CRLF framing. Built in memory; delivered
//! files are tile-source vectors and style sheets, not bulk archives.

use std::fs;
use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::ApiError;

pub struct MultipartBody {
    boundary: String,
    buf: BytesMut,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("----EntrepotClientBoundary{}", Uuid::new_v4().simple()),
            buf: BytesMut::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn add_field(&mut self, name: &str, value: &str) {
        self.buf.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.put_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.buf.put_slice(format!("{value}\r\n").as_bytes());
    }

    /// List-valued fields repeat the field once per value.
    pub fn add_fields(&mut self, name: &str, values: &[String]) {
        for value in values {
            self.add_field(name, value);
        }
    }

    pub fn add_file_field(&mut self, name: &str, path: &Path) -> Result<(), ApiError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::Io(format!("no file name in {}", path.display())))?
            .to_string();
        let content = fs::read(path)?;
        self.add_bytes_field(name, &filename, &guess_content_type(path), &content);
        Ok(())
    }

    /// File part from an in-memory buffer (md5 sidecars are synthesized, not
    /// read from disk).
    pub fn add_bytes_field(&mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) {
        self.buf.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.put_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        self.buf
            .put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        self.buf.put_slice(content);
        self.buf.put_slice(b"\r\n");
    }

    /// Close the body. Nothing can be added afterwards.
    pub fn finish(mut self) -> Bytes {
        self.buf
            .put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.buf.freeze()
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn plain_fields_are_framed() {
        let mut body = MultipartBody::new();
        let boundary = body.boundary().to_string();
        body.add_field("srs", "EPSG:4326");
        let bytes = body.finish();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(
            text,
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"srs\"\r\n\r\nEPSG:4326\r\n--{boundary}--\r\n"
            )
        );
    }

    #[test]
    fn list_fields_repeat() {
        let mut body = MultipartBody::new();
        body.add_fields(
            "metadata",
            &["a.xml".to_string(), "b.xml".to_string()],
        );
        let text = String::from_utf8(body.finish().to_vec()).unwrap();
        assert_eq!(text.matches("name=\"metadata\"").count(), 2);
        assert!(text.contains("a.xml\r\n"));
        assert!(text.contains("b.xml\r\n"));
    }

    #[test]
    fn file_field_carries_filename_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("communes.json");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"{\"type\":\"FeatureCollection\"}").unwrap();
        drop(f);

        let mut body = MultipartBody::new();
        body.add_file_field("file", &path).unwrap();
        let text = String::from_utf8(body.finish().to_vec()).unwrap();
        assert!(text.contains("name=\"file\"; filename=\"communes.json\""));
        assert!(text.contains("Content-Type: application/json\r\n\r\n{\"type\""));
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(
            guess_content_type(Path::new("levels.tippecanoe")),
            "application/octet-stream"
        );
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut body = MultipartBody::new();
        let err = body
            .add_file_field("file", Path::new("/nonexistent/data.gpkg"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
    }

    #[test]
    fn boundaries_are_unique_per_body() {
        assert_ne!(MultipartBody::new().boundary(), MultipartBody::new().boundary());
    }
}
