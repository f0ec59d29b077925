use std::path::Path;

use anyhow::{Context, Result};
use axum::response::Html;
use tokio::fs;
use tracing::{debug, warn};

pub const INDEX: &str = "index.html";
pub const LOGIN: &str = "login.html";
pub const PLUGINS: &str = "plugins.html";

const NOT_FOUND: &str = "<p>404 Not Found</p>";

const BUNDLED: [(&str, &str); 3] = [
    (INDEX, include_str!("../public/index.html")),
    (LOGIN, include_str!("../public/login.html")),
    (PLUGINS, include_str!("../public/plugins.html")),
];

/// Writes the bundled pages into `public_dir`, keeping any page that is already there.
pub async fn extract(public_dir: &Path) -> Result<()> {
    fs::create_dir_all(public_dir)
        .await
        .with_context(|| format!("Cannot create '{}'", public_dir.display()))?;
    for (name, content) in BUNDLED {
        let path = public_dir.join(name);
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Page '{}' exists, skip saving", path.display());
            continue;
        }
        fs::write(&path, content)
            .await
            .with_context(|| format!("Cannot save '{}'", path.display()))?;
    }
    Ok(())
}

pub async fn render(public_dir: &Path, name: &str) -> Html<String> {
    let path = public_dir.join(name);
    match fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(err) => {
            warn!("Cannot render '{}': {err}", path.display());
            Html(NOT_FOUND.to_string())
        }
    }
}
