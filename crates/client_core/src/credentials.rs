use percent_encoding::percent_decode_str;
use shared::protocol::CSRF_COOKIE_NAME;

/// Supplies the anti-forgery token echoed on every price request.
pub trait CredentialProvider: Send + Sync {
    fn csrf_token(&self) -> Option<String>;

    /// Cookie header to send with the request when the transport does not keep its
    /// own cookie store.
    fn cookie_header(&self) -> Option<String> {
        None
    }
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for std::sync::Arc<T> {
    fn csrf_token(&self) -> Option<String> {
        (**self).csrf_token()
    }

    fn cookie_header(&self) -> Option<String> {
        (**self).cookie_header()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn csrf_token(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn csrf_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the token out of a browser-style cookie string (`a=1; csrftoken=...`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJarCredentials {
    jar: String,
}

impl CookieJarCredentials {
    pub fn from_cookie_header(raw: impl Into<String>) -> Self {
        Self { jar: raw.into() }
    }

    /// Keeps the `name=value` pair of each `Set-Cookie` value and drops attributes.
    pub fn from_set_cookie<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let jar = values
            .into_iter()
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('='))
            .collect::<Vec<_>>()
            .join("; ");
        Self { jar }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| percent_decode_str(value).decode_utf8().ok())
            .map(|value| value.into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.jar.is_empty()
    }
}

impl CredentialProvider for CookieJarCredentials {
    fn csrf_token(&self) -> Option<String> {
        self.cookie(CSRF_COOKIE_NAME)
    }

    fn cookie_header(&self) -> Option<String> {
        (!self.jar.is_empty()).then(|| self.jar.clone())
    }
}

#[cfg(test)]
#[path = "tests/credentials_tests.rs"]
mod tests;
