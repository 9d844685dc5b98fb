use axum::{
    body::Body,
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use kernel::FileRecord;

/// Binary download reply: the file bytes as an octet-stream attachment
/// named after the record's display name.
pub struct FileReply {
    data: Vec<u8>,
    file: FileRecord,
}

impl FileReply {
    #[must_use]
    pub fn new(data: Vec<u8>, file: FileRecord) -> Self {
        Self { data, file }
    }

    fn attachment_name(&self) -> &str {
        let name = &self.file.name;
        if let Some(ix) = name.rfind(['\\', '/']) {
            &name[ix + 1..]
        } else {
            name
        }
    }
}

impl IntoResponse for FileReply {
    fn into_response(self) -> Response {
        let file_name = self.attachment_name().to_owned();
        let len = self.data.len().to_string();
        let mut res = Body::from(self.data).into_response();
        res.headers_mut().insert(
            "content-type",
            HeaderValue::from_static("application/octet-stream"),
        );
        let attachment = format!(r#"attachment; filename="{file_name}""#);
        if let Ok(val) = HeaderValue::from_str(attachment.as_str()) {
            res.headers_mut().insert("content-disposition", val);
        }
        if let Ok(val) = HeaderValue::from_str(len.as_str()) {
            res.headers_mut().insert("Content-Length", val);
        }

        res
    }
}
