use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use dog_content::ContentBinder;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::{rest, ContentState};

/// HTTP front for a [`ContentBinder`]: the content routes plus whatever extra
/// routers the application mounts. Request tracing and `x-request-id`
/// layers are applied by [`ContentApp::into_router`].
#[derive(Clone)]
pub struct ContentApp {
    pub binder: Arc<ContentBinder>,
    router: Router<()>,
    body_limit: Option<usize>,
}

impl ContentApp {
    pub fn new(binder: ContentBinder) -> Self {
        let state = ContentState::new(binder);
        Self {
            binder: Arc::clone(&state.binder),
            router: rest::content_router(state),
            body_limit: None,
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub fn service<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// Cap request bodies, typically at the store's `max_blob_bytes`
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = Some(bytes);
        self
    }

    pub fn into_router(self) -> Router<()> {
        let router = match self.body_limit {
            Some(limit) => self.router.layer(DefaultBodyLimit::max(limit)),
            None => self.router,
        };
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "content server listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

pub fn axum(binder: ContentBinder) -> ContentApp {
    ContentApp::new(binder)
}
