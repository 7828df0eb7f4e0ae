use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::{self, BufReader, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio;
use tokio::sync::oneshot::Receiver;

use hyper::{Body, Method, Request, Response, Server, StatusCode, Uri};
use hyper::service::{make_service_fn, service_fn};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use image::ImageOutputFormat;
use log::{debug, error, info};

use crate::config::VersionResources;
use crate::res::ResResult;


#[derive(Debug, Error)]
pub enum ServerError {
    #[error("runtime error: {0}")]
    Runtime(#[from] io::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("server thread panicked")]
    Panicked,
}


#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ApiResponse {
    Message { message: String },
    Error { error: String },
}


/// Reply of a media request before it becomes an http response.
#[derive(Debug)]
enum MediaReply {
    Json(StatusCode, ApiResponse),
    Media { content_type: &'static str, bytes: Vec<u8> },
}

impl MediaReply {
    fn not_found(err: impl ToString) -> Self {
        Self::Json(StatusCode::NOT_FOUND, ApiResponse::Error { error: err.to_string() })
    }

    fn failed(err: impl ToString) -> Self {
        Self::Json(StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::Error { error: err.to_string() })
    }
}


#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MediaQuery {
    id: Option<i32>,
    map_id: Option<i32>,
    action: Option<usize>,
}

impl MediaQuery {
    fn parse(query: Option<&str>) -> Result<Self, String> {
        let mut result = Self::default();
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let bad = |_| format!("invalid {key}: {value}");
            match key {
                "id" => result.id = Some(value.parse().map_err(bad)?),
                "map_id" => result.map_id = Some(value.parse().map_err(bad)?),
                "action" => result.action = Some(value.parse().map_err(bad)?),
                _ => {}
            }
        }
        Ok(result)
    }
}


#[derive(Clone)]
struct MediaHandler {
    versions: Arc<BTreeMap<String, VersionResources>>,
}


impl MediaHandler {
    pub fn new(versions: Arc<BTreeMap<String, VersionResources>>) -> Self {
        Self { versions }
    }

    async fn handle_request(&self, uri: &Uri) -> MediaReply {
        let path = uri.path().trim_end_matches('/');
        let query = match MediaQuery::parse(uri.query()) {
            Ok(query) => query,
            Err(err) => return MediaReply::not_found(err),
        };

        match path.split('/').skip(1).collect::<Vec<_>>().as_slice() {
            ["ping"] => MediaReply::Json(StatusCode::OK, ApiResponse::Message { message: "pong".to_string() }),
            ["graphic", version] => self.handle_graphic(version, query).await,
            ["anime", version] => self.handle_anime(version, query).await,
            _ => MediaReply::not_found("not found"),
        }
    }


    fn version(&self, version: &str) -> Result<&VersionResources, MediaReply> {
        self.versions.get(version).ok_or_else(|| MediaReply::not_found(format!("invalid version: {version}")))
    }


    async fn handle_graphic(&self, version: &str, query: MediaQuery) -> MediaReply {
        info!("Api::graphic {version} {query:?}");
        let res = match self.version(version) {
            Ok(res) => res,
            Err(reply) => return reply,
        };

        let index = res.graphics.index();
        let info = match (query.id, query.map_id) {
            (Some(id), _) => index.get(id),
            (None, Some(map_id)) => index.by_map_id(map_id),
            (None, None) => return MediaReply::not_found("missing id or map_id"),
        };
        let Some(&info) = info else {
            return MediaReply::not_found("id not found");
        };

        let graphics = res.graphics.clone();
        let palette = res.palette.clone();
        let task = tokio::task::spawn_blocking(move || -> ResResult<Vec<u8>> {
            let graphic = info.load(&mut BufReader::new(graphics.open_data()?))?;
            let image = graphic.rgba(palette.as_ref())?;

            let mut write_buffer = Cursor::new(Vec::with_capacity(image.width() as usize * image.height() as usize));
            image.write_to(&mut write_buffer, ImageOutputFormat::Png)?;
            Ok(write_buffer.into_inner())
        });

        Self::media_reply("image/png", task.await)
    }


    async fn handle_anime(&self, version: &str, query: MediaQuery) -> MediaReply {
        info!("Api::anime {version} {query:?}");
        let res = match self.version(version) {
            Ok(res) => res,
            Err(reply) => return reply,
        };
        let Some(animes) = res.animes.clone() else {
            return MediaReply::not_found(format!("no animes in version {version}"));
        };
        let Some(id) = query.id else {
            return MediaReply::not_found("missing id");
        };
        let Some(&info) = animes.index().get(id) else {
            return MediaReply::not_found("id not found");
        };

        let action = query.action.unwrap_or(0);
        if action >= info.action_count.max(0) as usize {
            return MediaReply::not_found(format!("action {action} not found"));
        }

        let graphics = res.graphics.clone();
        let palette = res.palette.clone();
        let task = tokio::task::spawn_blocking(move || -> ResResult<Vec<u8>> {
            let mut actions = info.load_actions(
                &mut BufReader::new(animes.open_data()?),
                graphics.index(),
                &mut BufReader::new(graphics.open_data()?),
            )?;
            let animation = actions.swap_remove(action).compose(palette.as_ref())?;

            let mut bytes = Vec::new();
            animation.encode_gif(&mut bytes)?;
            Ok(bytes)
        });

        Self::media_reply("image/gif", task.await)
    }


    fn media_reply(content_type: &'static str, result: Result<ResResult<Vec<u8>>, tokio::task::JoinError>) -> MediaReply {
        match result {
            Ok(Ok(bytes)) => MediaReply::Media { content_type, bytes },
            Ok(Err(err)) => {
                error!("Api::error {err}");
                MediaReply::failed(err)
            }
            Err(err) => {
                error!("Api::error task failed - {err}");
                MediaReply::failed(err)
            }
        }
    }


    fn serialize_response(reply: MediaReply) -> Response<Body> {
        let response = match reply {
            MediaReply::Json(status, body) => {
                let response_body = serde_json::to_string(&body).unwrap_or_default();
                Response::builder()
                    .status(status)
                    .header("Content-Type", "application/json")
                    .body(Body::from(response_body))
            }
            MediaReply::Media { content_type, bytes } => {
                Response::builder()
                    .header("Content-Type", content_type)
                    .header("Content-Length", bytes.len())
                    .body(Body::from(bytes))
            }
        };

        response.unwrap_or_else(|err| {
            error!("Api::error response building - {err}");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
    }
}


async fn handle_request(api: Arc<MediaHandler>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    debug!("{} {}", req.method(), req.uri());
    if req.method() != Method::GET {
        let response = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::empty())
            .unwrap_or_default();
        return Ok(response);
    }

    let reply = api.handle_request(req.uri()).await;
    Ok(MediaHandler::serialize_response(reply))
}


async fn http_svc(addr: SocketAddr, versions: Arc<BTreeMap<String, VersionResources>>, http_stop: Receiver<()>) -> Result<(), ServerError> {
    let api_handler = Arc::new(MediaHandler::new(versions));

    let make_service = make_service_fn(move |_conn| {
        let api = api_handler.clone();
        let service = service_fn(move |req| {
            handle_request(api.clone(), req)
        });

        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::try_bind(&addr)?
        .serve(make_service)
        .with_graceful_shutdown(async {
            http_stop.await.ok();
        });

    info!("Listening on http://{}", addr);
    server.await?;
    info!("server stopped successfully");
    Ok(())
}


/// Serves media of all `versions` on `addr` until `http_stop` fires. Blocks the calling thread.
pub fn http_server_service(addr: SocketAddr, versions: BTreeMap<String, VersionResources>, http_stop: Receiver<()>) -> Result<(), ServerError> {
    // start http service in single thread runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("http_server_thread")
        .build()?;

    // block thread while service is running
    rt.block_on(http_svc(addr, Arc::new(versions), http_stop))
}
