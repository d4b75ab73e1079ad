use crate::io::USER_AGENT;
use crate::types::{ChlError, ChlResult};
use serde::Deserialize;

/// Earthdata Login host
pub const URS_HOST: &str = "urs.earthdata.nasa.gov";

/// Environment variables checked before falling back to ~/.netrc
pub const USERNAME_VAR: &str = "EARTHDATA_USERNAME";
pub const PASSWORD_VAR: &str = "EARTHDATA_PASSWORD";

/// Earthdata Login username/password pair
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read credentials from the environment, if both variables are set
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(USERNAME_VAR).ok()?;
        let password = std::env::var(PASSWORD_VAR).ok()?;
        Some(Self { username, password })
    }

    /// Read credentials for the URS machine from ~/.netrc, if present
    pub fn from_netrc() -> ChlResult<Option<Self>> {
        let home = match dirs::home_dir() {
            Some(home) => home,
            None => return Ok(None),
        };
        let path = home.join(".netrc");
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(Self::parse_netrc(&content, URS_HOST))
    }

    /// Locate credentials, preferring the environment over ~/.netrc
    pub fn discover() -> ChlResult<Self> {
        if let Some(creds) = Self::from_env() {
            log::info!("Using Earthdata credentials from environment");
            return Ok(creds);
        }
        if let Some(creds) = Self::from_netrc()? {
            log::info!("Using Earthdata credentials from ~/.netrc");
            return Ok(creds);
        }
        Err(ChlError::Auth(format!(
            "No Earthdata credentials found: set {} and {} or add a {} entry to ~/.netrc",
            USERNAME_VAR, PASSWORD_VAR, URS_HOST
        )))
    }

    /// Scan netrc tokens for the requested machine
    ///
    /// Handles multi-machine files, a `default` entry, and the
    /// login/password keywords in either order. Line breaks are not
    /// significant in netrc.
    fn parse_netrc(content: &str, machine: &str) -> Option<Self> {
        let mut tokens = content.split_whitespace();
        let mut current: Option<String> = None;
        let mut username: Option<String> = None;
        let mut password: Option<String> = None;

        while let Some(tok) = tokens.next() {
            match tok {
                "machine" | "default" => {
                    // An earlier complete entry for the machine wins
                    if current.as_deref() == Some(machine)
                        && username.is_some()
                        && password.is_some()
                    {
                        break;
                    }
                    current = if tok == "default" {
                        Some(machine.to_string())
                    } else {
                        tokens.next().map(|s| s.to_string())
                    };
                }
                "login" if current.as_deref() == Some(machine) => {
                    username = tokens.next().map(|s| s.to_string());
                }
                "password" if current.as_deref() == Some(machine) => {
                    password = tokens.next().map(|s| s.to_string());
                }
                _ => {}
            }
        }

        match (username, password) {
            (Some(username), Some(password)) => Some(Self { username, password }),
            _ => None,
        }
    }
}

/// EDL user token as returned by the URS users API
#[derive(Debug, Deserialize)]
struct UserToken {
    access_token: String,
}

/// Authenticated Earthdata session holding an EDL bearer token
pub struct EarthdataAuth {
    client: reqwest::blocking::Client,
    token: String,
    username: String,
}

impl EarthdataAuth {
    /// Log in with automatically discovered credentials
    pub fn login() -> ChlResult<Self> {
        Self::login_with(Credentials::discover()?)
    }

    /// Log in with explicit credentials
    ///
    /// Reuses an existing EDL token when the account has one, otherwise
    /// mints a fresh token. Bad credentials surface as an `Auth` error.
    pub fn login_with(creds: Credentials) -> ChlResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChlError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        let token = Self::obtain_token(&client, &creds)?;
        log::info!("Logged in to Earthdata as {}", creds.username);

        Ok(Self {
            client,
            token,
            username: creds.username,
        })
    }

    /// Use a pre-issued EDL bearer token directly, skipping the login round trip
    pub fn from_token(token: impl Into<String>) -> ChlResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChlError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token: token.into(),
            username: String::new(),
        })
    }

    /// Fetch the first token on file, or mint one when none exists
    fn obtain_token(client: &reqwest::blocking::Client, creds: &Credentials) -> ChlResult<String> {
        let url = format!("https://{}/api/users/tokens", URS_HOST);
        let response = client
            .get(&url)
            .basic_auth(&creds.username, Some(&creds.password))
            .send()?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChlError::Auth(
                "Earthdata rejected the supplied credentials".to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(ChlError::Auth(format!(
                "Token listing failed with HTTP {}",
                response.status().as_u16()
            )));
        }

        let tokens: Vec<UserToken> = response.json()?;
        if let Some(token) = tokens.into_iter().next() {
            log::debug!("Reusing existing Earthdata token");
            return Ok(token.access_token);
        }

        log::debug!("No Earthdata token on file, requesting a new one");
        let url = format!("https://{}/api/users/token", URS_HOST);
        let response = client
            .post(&url)
            .basic_auth(&creds.username, Some(&creds.password))
            .send()?;

        if !response.status().is_success() {
            return Err(ChlError::Auth(format!(
                "Token creation failed with HTTP {}",
                response.status().as_u16()
            )));
        }

        let token: UserToken = response.json()?;
        Ok(token.access_token)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Start a GET request with the bearer token attached
    pub fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client.get(url).bearer_auth(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_netrc_basic() {
        let content = "machine urs.earthdata.nasa.gov login jdoe password hunter2\n";
        let creds = Credentials::parse_netrc(content, URS_HOST).unwrap();
        assert_eq!(creds.username, "jdoe");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_parse_netrc_multiline_and_other_machines() {
        let content = "machine example.com\n  login other\n  password nope\n\
                       machine urs.earthdata.nasa.gov\n  login jdoe\n  password hunter2\n\
                       machine ftp.example.org login x password y\n";
        let creds = Credentials::parse_netrc(content, URS_HOST).unwrap();
        assert_eq!(creds.username, "jdoe");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_parse_netrc_password_before_login() {
        let content = "machine urs.earthdata.nasa.gov password hunter2 login jdoe";
        let creds = Credentials::parse_netrc(content, URS_HOST).unwrap();
        assert_eq!(creds.username, "jdoe");
    }

    #[test]
    fn test_parse_netrc_missing_machine() {
        let content = "machine example.com login other password nope";
        assert!(Credentials::parse_netrc(content, URS_HOST).is_none());
    }

    #[test]
    fn test_parse_netrc_default_entry() {
        let content = "machine example.com login other password nope\n\
                       default login jdoe password hunter2\n";
        let creds = Credentials::parse_netrc(content, URS_HOST).unwrap();
        assert_eq!(creds.username, "jdoe");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn test_credentials_from_env() {
        std::env::set_var(USERNAME_VAR, "jdoe");
        std::env::set_var(PASSWORD_VAR, "hunter2");
        let creds = Credentials::from_env().unwrap();
        assert_eq!(creds.username, "jdoe");

        std::env::remove_var(USERNAME_VAR);
        std::env::remove_var(PASSWORD_VAR);
        assert!(Credentials::from_env().is_none());
    }
}
