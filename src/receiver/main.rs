mod channels;
mod config;
mod dispatcher;
mod error;
mod gitlab;
mod lifecycle;
mod slack;
mod types;
mod version;

use std::sync::Arc;

use chrono::Utc;
use lambda_http::http::{HeaderValue, Method, StatusCode};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use tracing::{info, info_span, warn, Instrument};

use channels::{ChannelResolver, StaticChannelMap, UnlinkedChannels};
use config::Config;
use dispatcher::Dispatcher;
use gitlab::GitLabClient;
use lifecycle::Lifecycle;
use types::SlackCommand;

const SLACK_COMMAND_PATH: &str = "/slack/command";
const HEALTHZ_PATH: &str = "/healthz";
const REQUEST_ID_HEADER: &str = "x-request-id";

struct App {
    dispatcher: Dispatcher,
    lifecycle: Lifecycle,
}

impl App {
    fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let gitlab = GitLabClient::new(config.gitlab_url.clone(), config.gitlab_timeout)?;
        let channels: Arc<dyn ChannelResolver> = if config.channel_projects.is_empty() {
            Arc::new(UnlinkedChannels)
        } else {
            Arc::new(StaticChannelMap::new(config.channel_projects.clone()))
        };

        Ok(Self {
            dispatcher: Dispatcher::new(gitlab, channels),
            lifecycle: Lifecycle::new(),
        })
    }
}

async fn function_handler(app: &App, event: Request) -> Result<Response<Body>, Error> {
    let request_id = request_id(&event);
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    let user_agent = event
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let span = info_span!("request", %request_id);
    let mut response = route(app, event).instrument(span.clone()).await?;

    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&request_id)?);
    span.in_scope(|| {
        info!(
            %method,
            %path,
            status = response.status().as_u16(),
            %user_agent,
            "Handled request"
        )
    });

    Ok(response)
}

/// Inbound `X-Request-Id`, or a nanosecond timestamp when Slack sent none.
fn request_id(event: &Request) -> String {
    event
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_string()
        })
}

/// Matches on the path suffix: REST API Gateway prefixes the stage
/// (`/prod/slack/command`) unless `AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH` is set.
async fn route(app: &App, event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path().trim_end_matches('/');
    if path.ends_with(SLACK_COMMAND_PATH) {
        slack_command(app, event).await
    } else if path.ends_with(HEALTHZ_PATH) {
        healthz(app)
    } else {
        not_found()
    }
}

async fn slack_command(app: &App, event: Request) -> Result<Response<Body>, Error> {
    if *event.method() != Method::POST {
        return not_found();
    }

    let command = SlackCommand::from_urlencoded(event.body()).unwrap_or_else(|err| {
        warn!(error = %err, "Malformed slash command form, treating it as empty");
        SlackCommand::default()
    });

    let reply = app.dispatcher.dispatch(command).await;

    // Slack only renders the reply on a 200, whatever happened upstream.
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(json_body(reply.into_body()))?)
}

fn healthz(app: &App) -> Result<Response<Body>, Error> {
    let status = if app.lifecycle.is_ready() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(Response::builder().status(status).body(Body::Empty)?)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from("Not Found"))?)
}

fn json_body(bytes: Vec<u8>) -> Body {
    match String::from_utf8(bytes) {
        Ok(text) => Body::Text(text),
        Err(err) => Body::Binary(err.into_bytes()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if std::env::args().skip(1).any(|arg| arg == "--version") {
        println!("{}", version::describe());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let app = Arc::new(App::from_config(&config)?);
    info!(
        version = version::VERSION,
        gitlab_url = %config.gitlab_url,
        timeout_ms = config.gitlab_timeout.as_millis() as u64,
        "Server is starting..."
    );

    app.lifecycle.mark_ready();
    let handler_app = Arc::clone(&app);
    let result = run(service_fn(move |event: Request| {
        let app = Arc::clone(&handler_app);
        async move { function_handler(&app, event).await }
    }))
    .await;

    app.lifecycle.mark_stopping();
    info!("Server stopped");
    result
}
