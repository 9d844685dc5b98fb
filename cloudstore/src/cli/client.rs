use client::UploadParams;

pub async fn upload_single_file(params: UploadParams) {
    client::upload_file(params).await;
}

pub async fn list_owner_files(uri: &str, owner: &str, trash: bool) {
    client::list_files(uri, owner, trash).await;
}
