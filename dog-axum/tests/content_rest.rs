use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::Router;
use dog_axum::axum;
use dog_blob::{BlobConfig, MemoryStore};
use dog_content::{
    ContentBinder, ContentTypeDescriptor, DeclaredType, EntityRepository, EntitySchema, MemoryRepository,
    StoreRegistry,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "dogrs-boundary";

fn build() -> (Arc<MemoryRepository>, Router) {
    build_with(MemoryStore::new())
}

fn build_with(files: MemoryStore) -> (Arc<MemoryRepository>, Router) {
    let schema = EntitySchema::builder("documents")
        .property("attachment", DeclaredType::value("File"))
        .property("renditions", DeclaredType::list("File"))
        .property("pages", DeclaredType::fixed_array("File"))
        .property("tags", DeclaredType::set("File"))
        .property("poster", DeclaredType::value("Video"))
        .build()
        .unwrap();
    let repository = Arc::new(MemoryRepository::new().with_collection("documents", schema));
    repository
        .insert(
            "documents",
            json!({"id": "42", "attachment": null, "renditions": [], "pages": [], "tags": null, "poster": null}),
        )
        .unwrap();

    let registry = StoreRegistry::builder()
        .register(ContentTypeDescriptor::standard("File"), files)
        .build()
        .unwrap();
    let binder = ContentBinder::new(repository.clone(), Arc::new(registry));

    let router = axum(binder).service("/health", || async { "ok" }).into_router();
    (repository, router)
}

async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

async fn body_bytes(res: axum::response::Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn json_body(res: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

async fn put_text(router: &Router, uri: &str, text: &'static str) -> Value {
    let res = send(
        router,
        request("PUT", uri)
            .header("content-type", "text/plain")
            .body(Body::from(text))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 201);
    json_body(res).await
}

fn multipart(field: &str, content_type: &str, data: &str) -> Body {
    Body::from(format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\n\
         Content-Type: {content_type}\r\n\r\n\
         {data}\r\n\
         --{BOUNDARY}--\r\n"
    ))
}

fn multipart_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

#[tokio::test]
async fn put_get_delete_get() {
    let (_, router) = build();

    let res = send(
        &router,
        request("PUT", "/documents/42/attachment")
            .header("host", "files.example.com")
            .header("content-type", "text/plain")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 201);
    let location = res.headers().get("location").unwrap().to_str().unwrap().to_string();
    let created = json_body(res).await;

    let content_id = created["contentId"].as_str().unwrap();
    assert!(!content_id.is_empty());
    assert_eq!(created["mimeType"], "text/plain");
    let href = created["_links"]["self"]["href"].as_str().unwrap();
    assert_eq!(href, format!("http://files.example.com/documents/42/attachment/{content_id}"));
    assert_eq!(location, href);

    let res = send(&router, request("GET", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(res.headers().get("content-length").unwrap(), "5");
    assert_eq!(res.headers().get("accept-ranges").unwrap(), "bytes");
    assert!(res.headers().get("etag").is_some());
    assert!(res.headers().get("last-modified").is_some());
    assert_eq!(body_bytes(res).await, b"hello");

    let res = send(&router, request("DELETE", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 204);

    let res = send(&router, request("GET", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 404);
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["className"], "not-found");
}

#[tokio::test]
async fn second_put_overwrites_the_same_content() {
    let (_, router) = build();

    let first = put_text(&router, "/documents/42/attachment", "one").await;
    let second = put_text(&router, "/documents/42/attachment", "two").await;
    assert_eq!(first["contentId"], second["contentId"]);

    let res = send(&router, request("GET", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(body_bytes(res).await, b"two");
}

#[tokio::test]
async fn multi_valued_properties_reject_get_and_delete() {
    let (_, router) = build();

    for property in ["renditions", "pages", "tags"] {
        for method in ["GET", "DELETE"] {
            let uri = format!("/documents/42/{property}");
            let res = send(&router, request(method, &uri).body(Body::empty()).unwrap()).await;
            assert_eq!(res.status().as_u16(), 405, "{method} {uri}");
            let body = json_body(res).await;
            assert_eq!(body["className"], "method-not-allowed");
        }
    }
}

#[tokio::test]
async fn ranges_and_conditional_reads() {
    let (_, router) = build();
    put_text(&router, "/documents/42/attachment", "hello world").await;

    let res = send(
        &router,
        request("GET", "/documents/42/attachment")
            .header("range", "bytes=6-")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 206);
    assert_eq!(res.headers().get("content-range").unwrap(), "bytes 6-10/11");
    assert_eq!(res.headers().get("content-length").unwrap(), "5");
    let etag = res.headers().get("etag").unwrap().clone();
    assert_eq!(body_bytes(res).await, b"world");

    let res = send(
        &router,
        request("GET", "/documents/42/attachment")
            .header("range", "bytes=50-")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 416);
    assert_eq!(res.headers().get("content-range").unwrap(), "bytes */11");

    let res = send(
        &router,
        request("GET", "/documents/42/attachment")
            .header("range", "bytes=0-1,3-4")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(body_bytes(res).await, b"hello world");

    let res = send(
        &router,
        request("GET", "/documents/42/attachment")
            .header("if-none-match", etag.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 304);
    assert_eq!(res.headers().get("etag").unwrap(), &etag);
}

#[tokio::test]
async fn multipart_post_appends_to_a_collection() {
    let (repository, router) = build();

    let res = send(
        &router,
        request("POST", "/documents/42/renditions")
            .header("content-type", multipart_type())
            .body(multipart("file", "image/png", "not really a png"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 201);
    let created = json_body(res).await;
    assert_eq!(created["mimeType"], "image/png");

    let entity = repository.find_one("documents", "42").await.unwrap().unwrap();
    let renditions = entity["renditions"].as_array().unwrap();
    assert_eq!(renditions.len(), 1);
    assert_eq!(renditions[0]["contentId"], created["contentId"]);
}

fn chunked_multipart(payload: &[u8]) -> Body {
    let head = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
         scan of page one\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"scan.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    );
    let tail = format!("\r\n--{BOUNDARY}--\r\n");

    let mut parts = vec![head.into_bytes()];
    parts.extend(payload.chunks(16 * 1024).map(<[u8]>::to_vec));
    parts.push(tail.into_bytes());
    Body::from_stream(futures::stream::iter(parts.into_iter().map(Ok::<_, std::io::Error>)))
}

#[tokio::test]
async fn multipart_file_streams_through_in_chunks() {
    let (_, router) = build();
    let payload: Vec<u8> = (0..512 * 1024u32).map(|i| (i % 251) as u8).collect();

    let res = send(
        &router,
        request("POST", "/documents/42/attachment")
            .header("content-type", multipart_type())
            .body(chunked_multipart(&payload))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 201);
    assert_eq!(json_body(res).await["mimeType"], "application/octet-stream");

    let res = send(&router, request("GET", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(body_bytes(res).await, payload);
}

#[tokio::test]
async fn oversized_multipart_upload_is_rejected() {
    let (repository, router) = build_with(MemoryStore::with_config(BlobConfig::new().with_max_blob_bytes(1024)));
    let payload = vec![7u8; 64 * 1024];

    let res = send(
        &router,
        request("POST", "/documents/42/renditions")
            .header("content-type", multipart_type())
            .body(chunked_multipart(&payload))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 400);

    let entity = repository.find_one("documents", "42").await.unwrap().unwrap();
    assert_eq!(entity["renditions"], json!([]));
}

#[tokio::test]
async fn raw_post_grows_an_array() {
    let (repository, router) = build();

    for page in ["p1", "p2"] {
        let res = send(
            &router,
            request("POST", "/documents/42/pages")
                .header("content-type", "image/jpeg")
                .body(Body::from(page))
                .unwrap(),
        )
        .await;
        assert_eq!(res.status().as_u16(), 201);
    }

    let entity = repository.find_one("documents", "42").await.unwrap().unwrap();
    assert_eq!(entity["pages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bad_uploads_are_400() {
    let (_, router) = build();

    let res = send(
        &router,
        request("POST", "/documents/42/attachment")
            .header("content-type", multipart_type())
            .body(multipart("document", "text/plain", "x"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert!(body["message"].as_str().unwrap().contains("'file'"));

    let res = send(
        &router,
        request("PUT", "/documents/42/attachment")
            .header("content-type", multipart_type())
            .body(multipart("file", "text/plain", "x"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn missing_things_are_404_with_distinct_messages() {
    let (_, router) = build();

    let res = send(
        &router,
        request("PUT", "/documents/7/attachment")
            .body(Body::from("x"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 404);

    let res = send(&router, request("GET", "/documents/42/cover").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 404);
    let no_property = json_body(res).await;
    assert!(no_property["message"].as_str().unwrap().contains("No such content property"));

    let res = send(&router, request("DELETE", "/documents/42/attachment").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 404);
    let no_content = json_body(res).await;
    assert_ne!(no_property["message"], no_content["message"]);
}

#[tokio::test]
async fn unmapped_type_is_500_and_nil_collection_is_501() {
    let (repository, router) = build();
    let before = repository.find_one("documents", "42").await.unwrap();

    let res = send(
        &router,
        request("PUT", "/documents/42/poster")
            .header("content-type", "video/mp4")
            .body(Body::from("frames"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 500);
    assert_eq!(json_body(res).await["className"], "general-error");

    let res = send(
        &router,
        request("POST", "/documents/42/tags")
            .body(Body::from("x"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 501);
    assert_eq!(json_body(res).await["name"], "NotImplemented");

    assert_eq!(repository.find_one("documents", "42").await.unwrap(), before);
}

#[tokio::test]
async fn request_id_is_generated_or_preserved() {
    let (_, router) = build();

    let res = send(&router, request("GET", "/health").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status().as_u16(), 200);
    assert!(res.headers().get("x-request-id").is_some());

    let provided = HeaderValue::from_static("req-1234");
    let res = send(
        &router,
        request("GET", "/documents/42/attachment")
            .header("x-request-id", provided.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status().as_u16(), 404);
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}
