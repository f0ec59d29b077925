pub mod endpoints {
    pub const GET_INDEX: &str = "/";
    pub const GET_LOGIN: &str = "/login";
    pub const GET_LOGOUT: &str = "/logout";
    pub const POST_AUTH: &str = "/auth";
    pub const POST_UPLOAD: &str = "/upload";
    pub const GET_PLUGINS: &str = "/plugins";
    pub const GET_PLUGIN_BY_NAME: &str = "/plugin/:name";
    pub const POST_PLUGINS: &str = "/api/v1/plugins";
}

pub mod dto {
    use serde::{Deserialize, Serialize};

    use domain_model::PluginDescriptor;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PluginVersionDto {
        pub version: String,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct UploadReportDto {
        pub name: String,
        pub version: String,
    }

    impl From<PluginDescriptor> for UploadReportDto {
        fn from(value: PluginDescriptor) -> Self {
            Self {
                name: value.name,
                version: value.version,
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RejectionDto {
        pub reason: String,
    }

    /// Missing form fields read as empty strings and fail the credentials check.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CredentialsDto {
        pub username: String,
        pub password: String,
    }
}

pub mod path_query {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct PluginsQuery {
        #[serde(default)]
        pub gui: bool,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct UploadResultQuery {
        pub success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub version: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
    }
}

pub mod session {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    /// Name of the cookie carrying the session token.
    pub const TOKEN_COOKIE: &str = "token";
    pub const TOKEN_MAX_AGE_SECS: u64 = 86400;

    /// Token is `base64(username:password)`.
    pub fn encode_token(username: &str, password: &str) -> String {
        STANDARD.encode(format!("{username}:{password}"))
    }

    pub fn decode_token(token: &str) -> Option<(String, String)> {
        let decoded = STANDARD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        decoded.split_once(':')
            .map(|(username, password)| (username.to_string(), password.to_string()))
    }

}
