use std::path::PathBuf;

use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Attribute, Cell, ContentArrangement, Table};
use kernel::FileRecord;
use reqwest::Client;
use resource::Resource;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

pub mod resource;

pub struct UploadParams {
    pub uri: String,
    pub file: String,
    pub owner: String,
}

pub async fn upload_file(params: UploadParams) {
    let path = PathBuf::from(&params.file);
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        println!("invalid file path: {}", params.file);
        return;
    };
    let file_url = url_escape::encode_component(file_name);

    let mut resource = match Resource::new(&params.uri) {
        Some(r) => r,
        None => {
            println!("invalid server uri: {}", params.uri);
            return;
        }
    };
    resource
        .append_path("api")
        .append_path(&params.owner)
        .append_path("files")
        .append_path(&file_url);

    let error_message = format!("no such file {}", &params.file);
    let f = File::open(&params.file).await.expect(&error_message);
    let stream = ReaderStream::new(f);
    let stream = reqwest::Body::wrap_stream(stream);

    let client = Client::new();
    let result = client.post(resource.to_string()).body(stream).send().await;
    match result {
        Ok(x) => {
            println!("file {} uploaded. Status: {}", params.file, x.status());
        }
        Err(e) => {
            println!("upload error: {e}");
        }
    }
}

pub async fn list_files(uri: &str, owner: &str, trash: bool) {
    let Some(mut resource) = Resource::new(uri) else {
        println!("invalid server uri: {uri}");
        return;
    };
    resource
        .append_path("api")
        .append_path(owner)
        .append_path(if trash { "trash" } else { "files" });

    let client = Client::new();

    match client.get(resource.to_string()).send().await {
        Ok(response) => match response.json().await {
            Ok(r) => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_HORIZONTAL_ONLY)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_width(120)
                    .set_header(vec![
                        Cell::new("Id").add_attribute(Attribute::Bold),
                        Cell::new("Name").add_attribute(Attribute::Bold),
                        Cell::new("Size").add_attribute(Attribute::Bold),
                        Cell::new("Favourite").add_attribute(Attribute::Bold),
                        Cell::new("Remote").add_attribute(Attribute::Bold),
                    ]);

                let files: Vec<FileRecord> = r;
                for f in files {
                    let remote = if f.is_remote() { "yes" } else { "no" };
                    let favourite = if f.favourite { "yes" } else { "no" };
                    table.add_row(vec![
                        Cell::new(f.id),
                        Cell::new(f.name),
                        Cell::new(f.size),
                        Cell::new(favourite),
                        Cell::new(remote),
                    ]);
                }
                println!("{table}");
            }
            Err(e) => println!("JSON decode error: {e}"),
        },
        Err(e) => {
            println!("error: {e}");
        }
    }
}
