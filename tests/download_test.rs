mod common;

use std::time::Duration;

use common::{ARTIFACT_SIZE, MockServer};
use remini::Error;
use remini::download::ArtifactDownloader;
use tempfile::TempDir;

fn downloader() -> ArtifactDownloader {
    ArtifactDownloader::new(reqwest::Client::new(), Duration::from_secs(10))
}

#[tokio::test]
async fn streams_every_byte_in_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out.jpg");

    let written = downloader()
        .fetch(&server.state.url("/files/result.jpg"), &dest)
        .await
        .unwrap();

    assert_eq!(written, ARTIFACT_SIZE as u64);
    let data = std::fs::read(&dest).unwrap();
    assert_eq!(data.len(), ARTIFACT_SIZE);
    assert_eq!(data, server.state.artifact);
}

#[tokio::test]
async fn overwrites_existing_destination() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out.jpg");
    std::fs::write(&dest, vec![0xAA; ARTIFACT_SIZE * 2]).unwrap();

    downloader()
        .fetch(&server.state.url("/files/result.jpg"), &dest)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), server.state.artifact);
}

#[tokio::test]
async fn http_error_is_download_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("out.jpg");

    let err = downloader()
        .fetch(&server.state.url("/files/missing.jpg"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Download(ref m) if m.contains("404")), "{err:?}");
    assert!(!dest.exists());
}

#[tokio::test]
async fn unreachable_host_is_download_error() {
    let dir = TempDir::new().unwrap();
    let err = downloader()
        .fetch("http://127.0.0.1:9/nothing.jpg", &dir.path().join("out.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Download(_)), "{err:?}");
}

#[tokio::test]
async fn unwritable_destination_is_left_alone() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("keep.jpg");
    std::fs::write(&dest, b"user data").unwrap();
    let mut perms = std::fs::metadata(&dest).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&dest, perms).unwrap();

    // Privileged users can write through the read-only bit.
    if std::fs::OpenOptions::new().write(true).open(&dest).is_ok() {
        return;
    }

    let err = downloader()
        .fetch(&server.state.url("/files/result.jpg"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Download(_)), "{err:?}");
    assert_eq!(std::fs::read(&dest).unwrap(), b"user data");
}

#[tokio::test]
async fn directory_destination_is_download_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("taken");
    std::fs::create_dir(&dest).unwrap();
    std::fs::write(dest.join("inside.txt"), b"x").unwrap();

    let err = downloader()
        .fetch(&server.state.url("/files/result.jpg"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Download(ref m) if m.contains("cannot create")), "{err:?}");
    assert!(dest.join("inside.txt").exists());
}
