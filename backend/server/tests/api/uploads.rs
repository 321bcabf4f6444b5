use std::io::Cursor;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use image::{DynamicImage, ImageFormat, RgbImage};

use crate::TestApp;

const BOUNDARY: &str = "sharewear-test-boundary";

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn multipart(files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn stores_resized_image_and_thumbnail() {
    let app = TestApp::new();
    let wide = png(2048, 512);

    let reply = app.send(multipart(&[("wide.png", "image/png", wide.as_slice())])).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["message"], "Images Uploaded");

    let links = &reply.body["images"][0];
    let image = links["image"].as_str().unwrap();
    let thumbnail = links["thumbnail"].as_str().unwrap();
    assert!(image.starts_with("http://files.test/uploads/images-"));
    assert!(thumbnail.ends_with("-thumb.png"));

    let stored = image.rsplit('/').next().unwrap();
    let resized = image::open(app.upload_dir().join(stored)).unwrap();
    assert_eq!((resized.width(), resized.height()), (1024, 256));

    let thumb = image::open(app.upload_dir().join(thumbnail.rsplit('/').next().unwrap())).unwrap();
    assert_eq!(thumb.width(), 300);
}

#[tokio::test]
async fn served_back_under_uploads() {
    let app = TestApp::new();
    let small = png(40, 20);

    let reply = app.send(multipart(&[("small.png", "image/png", small.as_slice())])).await;
    let image = reply.body["images"][0]["image"].as_str().unwrap();
    let path = image.trim_start_matches("http://files.test");

    let served = app
        .send(Request::get(path).body(Body::empty()).unwrap())
        .await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.headers[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn rejects_missing_and_foreign_files() {
    let app = TestApp::new();

    let empty = app.send(multipart(&[])).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["message"], "No files uploaded");

    let text = app
        .send(multipart(&[("notes.txt", "text/plain", &b"hello"[..])]))
        .await;
    assert_eq!(text.status, StatusCode::BAD_REQUEST);
    assert_eq!(text.body["message"], "Images only! (jpg, jpeg, png)");

    let disguised = app
        .send(multipart(&[("photo.png", "image/png", &b"definitely not a png"[..])]))
        .await;
    assert_eq!(disguised.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_batch_leaves_nothing_behind() {
    let app = TestApp::new();
    let good = png(400, 200);

    let reply = app
        .send(multipart(&[
            ("good.png", "image/png", good.as_slice()),
            ("broken.png", "image/png", &b"definitely not a png"[..]),
        ]))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let left: Vec<_> = std::fs::read_dir(app.upload_dir()).unwrap().collect();
    assert!(left.is_empty(), "{left:?}");
}

#[tokio::test]
async fn caps_the_number_of_files() {
    let app = TestApp::new();
    let small = png(10, 10);
    let files: Vec<_> = (0..6)
        .map(|_| ("tiny.png", "image/png", small.as_slice()))
        .collect();

    let reply = app.send(multipart(&files)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
