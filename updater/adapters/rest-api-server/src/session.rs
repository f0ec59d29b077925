use axum::http::header::COOKIE;
use axum::http::HeaderMap;

use updater_rest_api::session::{decode_token, encode_token, TOKEN_COOKIE, TOKEN_MAX_AGE_SECS};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }

    pub fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        session_token(headers)
            .and_then(|token| decode_token(&token))
            .map(|(username, password)| self.matches(&username, &password))
            .unwrap_or(false)
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers.get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, token)| token.to_string())
}

pub fn login_cookie(username: &str, password: &str) -> String {
    let token = encode_token(username, password);
    format!("{TOKEN_COOKIE}={token}; Max-Age={TOKEN_MAX_AGE_SECS}; Path=/; HttpOnly")
}

pub fn logout_cookie() -> String {
    format!("{TOKEN_COOKIE}=; Max-Age=0; Path=/; HttpOnly")
}
