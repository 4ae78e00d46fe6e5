//! Receipt images in Google Drive, under `Monthly Expenses/Images`.

use crate::api::{Receipts, TokenProvider};
use crate::error::Res;
use anyhow::{bail, Context};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, trace, warn};
use url::Url;

const FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const ROOT_FOLDER: &str = "Monthly Expenses";
const IMAGES_FOLDER: &str = "Images";
const BOUNDARY: &str = "-------314159265358979323846";

/// The public URL of an uploaded image.
pub(crate) fn image_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={file_id}")
}

/// Finds the Drive file ID in the URL shapes Drive hands out:
/// - `https://drive.google.com/uc?export=view&id=<id>` (and `export=download`)
/// - `https://drive.google.com/thumbnail?id=<id>`
/// - `https://drive.usercontent.google.com/download?id=<id>`
/// - `https://drive.google.com/file/d/<id>/view`
/// - `https://drive.google.com/open?id=<id>`
pub(crate) fn extract_file_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    if host != "drive.google.com" && host != "drive.usercontent.google.com" {
        return None;
    }
    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
        return (!id.is_empty()).then(|| id.into_owned());
    }
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .find(|pair| pair[0] == "d" && !pair[1].is_empty())
        .map(|pair| pair[1].to_string())
}

/// Guesses the MIME type of an image from its file name.
fn mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// A `multipart/related` body holding the file metadata and its bytes.
fn multipart_body(metadata: &Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{BOUNDARY}\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--").as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileId>,
}

#[derive(Debug, Deserialize)]
struct FileId {
    id: String,
}

/// Stores receipts in the signed-in user's Drive.
pub(crate) struct GoogleDrive {
    token_provider: TokenProvider,
    client: reqwest::Client,
    folder_id: Option<String>,
}

impl GoogleDrive {
    pub(crate) fn new(token_provider: TokenProvider) -> Self {
        Self {
            token_provider,
            client: reqwest::Client::new(),
            folder_id: None,
        }
    }

    async fn request(&mut self, method: Method, url: &str) -> Res<reqwest::RequestBuilder> {
        let token = self.token_provider.token_with_refresh().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn check(response: reqwest::Response, what: &str) -> Res<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        bail!("Google Drive API failed to {what} with status {status}: {text}")
    }

    async fn find_folder(&mut self, name: &str, parent: Option<&str>) -> Res<Option<String>> {
        let mut query = format!("name='{name}' and mimeType='{FOLDER_MIME}' and trashed=false");
        if let Some(parent) = parent {
            query.push_str(&format!(" and '{parent}' in parents"));
        }
        let response = self
            .request(Method::GET, FILES_API)
            .await?
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("orderBy", "createdTime"),
                ("pageSize", "10"),
            ])
            .send()
            .await
            .context("Failed to search Google Drive")?;
        let list: FileList = Self::check(response, "search for a folder")
            .await?
            .json()
            .await
            .context("Failed to parse the folder search response")?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&mut self, name: &str, parent: Option<&str>) -> Res<String> {
        let mut metadata = json!({ "name": name, "mimeType": FOLDER_MIME });
        if let Some(parent) = parent {
            metadata["parents"] = json!([parent]);
        }
        let response = self
            .request(Method::POST, FILES_API)
            .await?
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await
            .context("Failed to create a Google Drive folder")?;
        let file: FileId = Self::check(response, "create a folder")
            .await?
            .json()
            .await
            .context("Failed to parse the folder creation response")?;
        Ok(file.id)
    }

    /// The ID of `Monthly Expenses/Images`, creating the folders as needed.
    async fn images_folder(&mut self) -> Res<String> {
        if let Some(id) = &self.folder_id {
            return Ok(id.clone());
        }
        let root = match self.find_folder(ROOT_FOLDER, None).await? {
            Some(id) => id,
            None => {
                debug!("Creating the '{ROOT_FOLDER}' folder in Google Drive");
                self.create_folder(ROOT_FOLDER, None).await?
            }
        };
        let images = match self.find_folder(IMAGES_FOLDER, Some(&root)).await? {
            Some(id) => id,
            None => self.create_folder(IMAGES_FOLDER, Some(&root)).await?,
        };
        self.folder_id = Some(images.clone());
        Ok(images)
    }

    async fn make_public(&mut self, file_id: &str) -> Res<()> {
        let url = format!("{FILES_API}/{file_id}/permissions");
        let response = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .context("Failed to share the uploaded image")?;
        Self::check(response, "share the uploaded image").await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Receipts for GoogleDrive {
    async fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Res<String> {
        let folder = self.images_folder().await?;
        let mime = mime_type(file_name);
        let metadata = json!({ "name": file_name, "mimeType": mime, "parents": [folder] });
        trace!("Uploading {file_name} ({} bytes)", bytes.len());
        let response = self
            .request(Method::POST, UPLOAD_API)
            .await?
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary=\"{BOUNDARY}\""),
            )
            .body(multipart_body(&metadata, mime, &bytes))
            .send()
            .await
            .with_context(|| format!("Failed to upload {file_name}"))?;
        let file: FileId = Self::check(response, "upload the image")
            .await?
            .json()
            .await
            .context("Failed to parse the upload response")?;
        self.make_public(&file.id).await?;
        Ok(image_url(&file.id))
    }

    async fn delete(&mut self, url: &str) -> Res<()> {
        let Some(file_id) = extract_file_id(url) else {
            warn!("Could not find a Drive file ID in '{url}'");
            return Ok(());
        };
        let response = self
            .request(Method::DELETE, &format!("{FILES_API}/{file_id}"))
            .await?
            .send()
            .await
            .with_context(|| format!("Failed to delete the image {file_id}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("The image {file_id} was already gone");
            return Ok(());
        }
        Self::check(response, "delete the image").await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use test_drive::TestDrive;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_file_id_shapes() {
        let urls = [
            "https://drive.google.com/uc?export=view&id=ABC_123-x",
            "https://drive.google.com/uc?export=download&id=ABC_123-x",
            "https://drive.google.com/thumbnail?id=ABC_123-x&sz=w400",
            "https://drive.usercontent.google.com/download?id=ABC_123-x&export=view",
            "https://drive.google.com/file/d/ABC_123-x/view?usp=sharing",
            "https://drive.google.com/open?id=ABC_123-x",
        ];
        for url in urls {
            assert_eq!(extract_file_id(url).as_deref(), Some("ABC_123-x"), "{url}");
        }
    }

    #[test]
    fn test_extract_file_id_unrecognized() {
        assert_eq!(extract_file_id("https://example.com/uc?id=ABC"), None);
        assert_eq!(extract_file_id("https://drive.google.com/drive/my-drive"), None);
        assert_eq!(extract_file_id("not a url"), None);
        assert_eq!(extract_file_id(""), None);
    }

    #[test]
    fn test_image_url_round_trips() {
        assert_eq!(extract_file_id(&image_url("xyz")).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type("receipt.JPG"), "image/jpeg");
        assert_eq!(mime_type("scan.png"), "image/png");
        assert_eq!(mime_type("noext"), "application/octet-stream");
    }

    #[test]
    fn test_multipart_body() {
        let body = multipart_body(&json!({"name": "a.png"}), "image/png", b"PNGDATA");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{BOUNDARY}\r\n")));
        assert!(text.contains("{\"name\":\"a.png\"}"));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNGDATA"));
        assert!(text.ends_with(&format!("\r\n--{BOUNDARY}--")));
    }

    #[tokio::test]
    async fn test_test_drive() {
        let mut drive = TestDrive::default();
        let url = drive.upload("r.jpg", vec![1, 2, 3]).await.unwrap();
        assert_eq!(drive.file_ids().len(), 1);
        drive.delete(&url).await.unwrap();
        assert!(drive.file_ids().is_empty());
        drive.delete("https://example.com/nothing").await.unwrap();
        assert!(TestDrive::failing().upload("r.jpg", vec![]).await.is_err());
    }
}
