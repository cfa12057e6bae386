use std::fmt;
use url::Url;

use crate::osu::TokenForm;

/// Scopes requested for the application token.
const APP_SCOPE: &str = "public";
/// Scopes requested from a signed-in user.
const USER_SCOPE: &str = "identify public";

/// Process-wide OAuth application credential. Immutable after startup.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Credential {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    fn form(&self, grant_type: &str) -> TokenForm {
        TokenForm {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            grant_type: grant_type.to_string(),
            scope: None,
            code: None,
            redirect_uri: None,
            refresh_token: None,
        }
    }

    pub fn client_credentials_form(&self) -> TokenForm {
        TokenForm {
            scope: Some(APP_SCOPE.to_string()),
            ..self.form("client_credentials")
        }
    }

    pub fn authorization_code_form(&self, code: &str) -> TokenForm {
        TokenForm {
            code: Some(code.to_string()),
            redirect_uri: Some(self.redirect_uri.clone()),
            ..self.form("authorization_code")
        }
    }

    pub fn refresh_form(&self, refresh_token: &str) -> TokenForm {
        TokenForm {
            refresh_token: Some(refresh_token.to_string()),
            ..self.form("refresh_token")
        }
    }

    /// Browser redirect target for the authorization-code flow.
    pub fn authorize_url(&self, oauth_base: &Url, state: &str) -> Url {
        let mut url = oauth_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("authorize");
        }
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", USER_SCOPE)
            .append_pair("state", state);
        url
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}
