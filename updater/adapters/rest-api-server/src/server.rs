use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Form, Json, Router};
use axum::extract::{DefaultBodyLimit, FromRef, Multipart, Query, State};
use axum::extract::Path as PathParam;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::http::header::SET_COOKIE;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use domain_model::PluginDescriptor;
use updater_core_api::{RegistryApi, RegistryError};
use updater_rest_api::dto::{CredentialsDto, PluginVersionDto, RejectionDto, UploadReportDto};
use updater_rest_api::endpoints::{GET_INDEX, GET_LOGIN, GET_LOGOUT, GET_PLUGIN_BY_NAME, GET_PLUGINS, POST_AUTH, POST_PLUGINS, POST_UPLOAD};
use updater_rest_api::path_query::{PluginsQuery, UploadResultQuery};

use crate::pages;
pub use crate::session::Credentials;
use crate::session::{login_cookie, logout_cookie};

const UPLOAD_FIELD: &str = "files";

pub struct ServerSettings {
    pub port: u16,
    pub credentials: Credentials,
    pub public_dir: PathBuf,
    pub temp_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

#[derive(Clone, FromRef)]
struct AppState {
    registry: Arc<dyn RegistryApi>,
    settings: Arc<ServerSettings>,
}

pub async fn run(settings: ServerSettings, registry: impl RegistryApi) -> Result<()> {
    let address = SocketAddr::new(IpAddr::from([0, 0, 0, 0]), settings.port);
    let listener = TcpListener::bind(address)
        .with_context(|| format!("Cannot bind {address}"))?;
    serve(listener, settings, registry).await
}

pub async fn serve(listener: TcpListener, settings: ServerSettings, registry: impl RegistryApi) -> Result<()> {
    pages::extract(&settings.public_dir).await?;
    listener.set_nonblocking(true)?;
    info!("Listening on {}", listener.local_addr()?);

    let router = router(settings, Arc::new(registry));
    axum::Server::from_tcp(listener)?
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

pub fn router(settings: ServerSettings, registry: Arc<dyn RegistryApi>) -> Router {
    let max_upload_bytes = settings.max_upload_bytes;
    let state = AppState {
        registry,
        settings: Arc::new(settings),
    };
    Router::new()
        .route(GET_INDEX, get(index))
        .route(GET_LOGIN, get(login))
        .route(GET_LOGOUT, get(logout))
        .route(POST_AUTH, post(auth))
        .route(POST_UPLOAD, post(upload))
        .route(GET_PLUGINS, get(get_plugins))
        .route(GET_PLUGIN_BY_NAME, get(get_plugin))
        .route(POST_PLUGINS, post(create_plugin))
        .layer(middleware::from_fn_with_state(state.clone(), access_manager))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// GET pages are public except the index; every POST but `/auth` needs a session.
async fn access_manager<B>(State(settings): State<Arc<ServerSettings>>, headers: HeaderMap, request: Request<B>, next: Next<B>) -> Response {
    let authenticated = settings.credentials.is_authenticated(&headers);
    let path = request.uri().path().to_string();
    if request.method() == Method::GET {
        if authenticated && path == GET_LOGIN {
            return Redirect::to(GET_INDEX).into_response();
        }
        if !authenticated && path == GET_INDEX {
            return Redirect::to(GET_LOGIN).into_response();
        }
        return next.run(request).await;
    }
    if path == POST_AUTH || authenticated {
        return next.run(request).await;
    }
    warn!("Unauthorized {} {path}", request.method());
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

async fn index(State(settings): State<Arc<ServerSettings>>) -> Html<String> {
    pages::render(&settings.public_dir, pages::INDEX).await
}

async fn login(State(settings): State<Arc<ServerSettings>>) -> Html<String> {
    pages::render(&settings.public_dir, pages::LOGIN).await
}

async fn logout() -> impl IntoResponse {
    ([(SET_COOKIE, logout_cookie())], Redirect::to(GET_LOGIN))
}

async fn auth(State(settings): State<Arc<ServerSettings>>, Form(form): Form<CredentialsDto>) -> Response {
    if settings.credentials.matches(&form.username, &form.password) {
        info!("User '{}' logged in", form.username);
        ([(SET_COOKIE, login_cookie(&form.username, &form.password))], Redirect::to(GET_INDEX)).into_response()
    } else {
        warn!("Failed login attempt for user '{}'", form.username);
        Redirect::to(&format!("{GET_LOGIN}?success=false")).into_response()
    }
}

async fn get_plugins(State(settings): State<Arc<ServerSettings>>,
                     State(registry): State<Arc<dyn RegistryApi>>,
                     Query(query): Query<PluginsQuery>) -> Response {
    if query.gui {
        pages::render(&settings.public_dir, pages::PLUGINS).await.into_response()
    } else {
        Json(registry.get_versions().await).into_response()
    }
}

async fn get_plugin(State(registry): State<Arc<dyn RegistryApi>>, PathParam(name): PathParam<String>) -> Result<Json<PluginVersionDto>, (StatusCode, String)> {
    registry.get_version(&name).await
        .map(|version| Json(PluginVersionDto { version }))
        .ok_or((StatusCode::NOT_FOUND, format!("cannot find plugin {name}")))
}

async fn upload(State(settings): State<Arc<ServerSettings>>,
                State(registry): State<Arc<dyn RegistryApi>>,
                mut multipart: Multipart) -> Response {
    let archive = match receive_archive(&mut multipart, settings.temp_dir.as_deref()).await {
        Ok(Some(archive)) => archive,
        Ok(None) => return Redirect::to(&format!("{GET_INDEX}?success=false&reason=")).into_response(),
        Err(err) => {
            warn!("Error during upload receiving: {err:#}");
            return upload_result(Err(format!("{err:#}")));
        }
    };
    match registry.add_plugin(archive.path()).await {
        Ok(descriptor) => upload_result(Ok(descriptor)),
        Err(RegistryError::Storage(err)) => storage_failure(err),
        Err(err) => upload_result(Err(err.to_string())),
    }
}

async fn create_plugin(State(settings): State<Arc<ServerSettings>>,
                       State(registry): State<Arc<dyn RegistryApi>>,
                       mut multipart: Multipart) -> Response {
    let archive = match receive_archive(&mut multipart, settings.temp_dir.as_deref()).await {
        Ok(Some(archive)) => archive,
        Ok(None) => return rejection(format!("Missing multipart field '{UPLOAD_FIELD}'")),
        Err(err) => return rejection(format!("{err:#}")),
    };
    match registry.add_plugin(archive.path()).await {
        Ok(descriptor) => Json(UploadReportDto::from(descriptor)).into_response(),
        Err(RegistryError::Storage(err)) => storage_failure(err),
        Err(err) => rejection(err.to_string()),
    }
}

/// Copies the uploaded archive into a temp file that keeps the uploaded extension.
/// `None` when the field is absent or empty. The file is deleted on drop.
async fn receive_archive(multipart: &mut Multipart, temp_dir: Option<&Path>) -> Result<Option<NamedTempFile>> {
    while let Some(field) = multipart.next_field().await.context("Malformed multipart body")? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let suffix = field.file_name()
            .and_then(|file_name| Path::new(file_name).extension())
            .and_then(|extension| extension.to_str())
            .map(|extension| format!(".{extension}"))
            .unwrap_or_default();
        let data = field.bytes().await.context("Upload was interrupted")?;
        if data.is_empty() {
            return Ok(None);
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("tmp").suffix(&suffix);
        let archive = match temp_dir {
            Some(temp_dir) => builder.tempfile_in(temp_dir),
            None => builder.tempfile(),
        }.context("Cannot create temp file for upload")?;
        tokio::fs::write(archive.path(), &data)
            .await
            .context("Cannot store upload")?;
        return Ok(Some(archive));
    }
    Ok(None)
}

fn upload_result(result: Result<PluginDescriptor, String>) -> Response {
    let query = match result {
        Ok(descriptor) => UploadResultQuery {
            success: true,
            name: Some(descriptor.name),
            version: Some(descriptor.version),
            reason: None,
        },
        Err(reason) => UploadResultQuery {
            success: false,
            reason: Some(reason),
            ..Default::default()
        },
    };
    match serde_urlencoded::to_string(&query) {
        Ok(query) => Redirect::to(&format!("{GET_INDEX}?{query}")).into_response(),
        Err(err) => {
            error!("Error during redirect creation: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn rejection(reason: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(RejectionDto { reason })).into_response()
}

fn storage_failure(err: anyhow::Error) -> Response {
    error!("Error during plugin version saving: {err:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Failed to record plugin version").into_response()
}
