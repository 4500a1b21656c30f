use axum::{
    body::Body,
    extract::{FromRequest, Multipart, OriginalUri, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing, Router,
};
use bytes::Bytes;
use dog_blob::ByteStream;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt, TryStreamExt,
};

use crate::{
    params::RequestUrl,
    serve::{created, serve_content},
    ContentState, DogAxumError,
};

/// Name of the multipart form field carrying the upload.
pub const FILE_FIELD: &str = "file";

// Chunks of an upload in flight between the form reader and the store
const UPLOAD_BUFFER: usize = 8;

type Chunk = std::io::Result<Bytes>;
type FieldFound = Result<Option<String>, DogAxumError>;

type PropertyPath = Path<(String, String, String)>;

/// `GET | PUT | POST | DELETE /{collection}/{id}/{property}`
pub fn content_router(state: ContentState) -> Router<()> {
    Router::new()
        .route(
            "/{collection}/{id}/{property}",
            routing::get(get_content)
                .put(put_content)
                .post(post_content)
                .delete(delete_content),
        )
        .with_state(state)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

fn body_stream(body: Body) -> ByteStream {
    Box::pin(body.into_data_stream().map_err(std::io::Error::other))
}

async fn get_content(
    State(state): State<ContentState>,
    Path((collection, id, property)): PropertyPath,
    headers: HeaderMap,
) -> Result<Response, DogAxumError> {
    let read = state.binder.read(&collection, &id, &property).await?;
    serve_content(read, &headers).await
}

async fn put_content(
    State(state): State<ContentState>,
    Path((collection, id, property)): PropertyPath,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, DogAxumError> {
    if is_multipart(&headers) {
        return Err(DogAxumError::bad_request("Multipart uploads must use POST"));
    }
    let mime = content_type(&headers);
    let bound = state
        .binder
        .write(&collection, &id, &property, mime, body_stream(body))
        .await?;
    Ok(created(&bound, &RequestUrl::from_parts(&headers, &uri)))
}

async fn post_content(
    State(state): State<ContentState>,
    Path((collection, id, property)): PropertyPath,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Result<Response, DogAxumError> {
    let headers = request.headers().clone();
    let url = RequestUrl::from_parts(&headers, &uri);

    let (mime, stream) = if is_multipart(&headers) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| DogAxumError::bad_request(e.body_text()))?;
        file_field(multipart).await?
    } else {
        let mime = content_type(&headers).map(str::to_string);
        (mime, body_stream(request.into_body()))
    };

    let bound = state
        .binder
        .write(&collection, &id, &property, mime.as_deref(), stream)
        .await?;
    Ok(created(&bound, &url))
}

/// Mime type and body of the `file` field. The form is read on its own task
/// and the field's chunks reach the store through a bounded channel, so the
/// upload is never held in memory as a whole.
async fn file_field(multipart: Multipart) -> Result<(Option<String>, ByteStream), DogAxumError> {
    let (found_tx, found_rx) = oneshot::channel();
    let (chunks_tx, chunks_rx) = mpsc::channel(UPLOAD_BUFFER);
    tokio::spawn(forward_file_field(multipart, found_tx, chunks_tx));

    let mime = found_rx
        .await
        .map_err(|_| DogAxumError::bad_request("Multipart form ended unexpectedly"))??;
    let body: ByteStream = Box::pin(chunks_rx);
    Ok((mime, body))
}

async fn forward_file_field(
    mut multipart: Multipart,
    found: oneshot::Sender<FieldFound>,
    mut chunks: mpsc::Sender<Chunk>,
) {
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(FILE_FIELD) => field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                let message = format!("Missing multipart field '{FILE_FIELD}'");
                let _ = found.send(Err(DogAxumError::bad_request(message)));
                return;
            }
            Err(e) => {
                let _ = found.send(Err(DogAxumError::bad_request(e.body_text())));
                return;
            }
        };

        if found.send(Ok(field.content_type().map(str::to_string))).is_err() {
            return;
        }
        loop {
            let (chunk, last) = match field.chunk().await {
                Ok(Some(data)) => (Ok(data), false),
                Ok(None) => return,
                Err(e) => (Err(std::io::Error::other(e.body_text())), true),
            };
            // A closed receiver means the store stopped reading
            if chunks.send(chunk).await.is_err() || last {
                return;
            }
        }
    }
}

async fn delete_content(
    State(state): State<ContentState>,
    Path((collection, id, property)): PropertyPath,
) -> Result<Response, DogAxumError> {
    state.binder.delete(&collection, &id, &property).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
