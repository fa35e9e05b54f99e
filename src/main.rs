use anyhow::Result;
use clap::Parser;
use eventix::commands::{self, Credentials, Options};
use eventix::config::ClientConfig;
use std::time::Duration;

/// eventix - event ticketing API client
///
/// Calls the ticketing backend with a bearer token, renewing the session
/// through the refresh endpoint when the token expires.
///
/// Examples:
///   eventix --token TOKEN get /users/me/bookings
///   eventix -u alice --password secret request POST /bookings --data '{"event_id": 3}'
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL (defaults to http://localhost:8000)
    #[arg(long = "api-url", env = "EVENTIX_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "EVENTIX_TIMEOUT_SECS", value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Access token to start with
    #[arg(long, env = "EVENTIX_TOKEN", value_name = "TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Username to log in with before running the command
    #[arg(long, short = 'u', env = "EVENTIX_USERNAME", global = true, requires = "password")]
    pub username: Option<String>,

    /// Password for --username
    #[arg(long, env = "EVENTIX_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Log in and print the (masked) access token
    Login,

    /// GET a backend path and print the response
    Get(GetArgs),

    /// Send an arbitrary request
    Request(RequestArgs),
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Backend-relative path, e.g. /events
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Backend-relative path
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON request body
    #[arg(long, short = 'd', value_name = "JSON")]
    pub data: Option<String>,
}

impl Cli {
    fn options(&self) -> Options {
        let mut config = ClientConfig::new(self.api_url.clone());
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Options {
            config,
            token: self.token.clone(),
            credentials,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let options = cli.options();

    match &cli.command {
        Commands::Login => commands::login(&options).await?,
        Commands::Get(args) => commands::get(&options, &args.path).await?,
        Commands::Request(args) => {
            commands::request(&options, &args.method, &args.path, args.data.as_deref()).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_get_parsing() {
        let cli = Cli::try_parse_from(&["eventix", "get", "/events"]).unwrap();
        match cli.command {
            Commands::Get(args) => assert_eq!(args.path, "/events"),
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_cli_request_parsing() {
        let cli = Cli::try_parse_from(&[
            "eventix",
            "request",
            "post",
            "/bookings",
            "--data",
            r#"{"event_id":1}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, "post");
                assert_eq!(args.path, "/bookings");
                assert_eq!(args.data.as_deref(), Some(r#"{"event_id":1}"#));
            }
            _ => panic!("Expected Request command"),
        }
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from(&[
            "eventix",
            "get",
            "/events",
            "--api-url",
            "http://api.test",
            "--timeout",
            "5",
            "-u",
            "alice",
            "--password",
            "pw",
        ])
        .unwrap();
        let options = cli.options();
        assert_eq!(options.config.api_url, "http://api.test");
        assert_eq!(options.config.timeout, Duration::from_secs(5));
        let credentials = options.credentials.unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "pw");
    }

    #[test]
    fn test_cli_username_requires_password() {
        let result = Cli::try_parse_from(&["eventix", "-u", "alice", "login"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(&["eventix", "/events"]);
        assert!(result.is_err());
    }
}
