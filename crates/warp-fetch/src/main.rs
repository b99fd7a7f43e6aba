use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use warpgrid_fetch::{
    Body, Context, FetchConfig, ReadCloser, Request, ReqwestHost, Response, Transport,
    parse_duration,
};

#[derive(Parser)]
#[command(
    name = "warp-fetch",
    about = "WarpGrid fetch: issue one blocking HTTP request",
    version
)]
struct Cli {
    /// Request URL
    url: String,
    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
    /// Request body
    #[arg(short = 'd', long)]
    data: Option<String>,
    /// Give up after this long, e.g. "500ms", "30s", "2m"
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,
    /// TOML config with credentials, timeout and default headers
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the status line and response headers before the body
    #[arg(short, long)]
    include: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).ok_or_else(|| format!("invalid duration {raw:?}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warp_fetch=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FetchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FetchConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let host = ReqwestHost::new(runtime.handle().clone())?;
    let transport = Transport::new(Arc::new(host), runtime.handle().clone()).with_config(&config);

    let mut ctx = Context::new();
    if let Some(timeout) = cli.timeout.or_else(|| config.timeout()) {
        ctx = ctx.with_timeout(timeout);
    }

    let interrupt = ctx.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling request");
            interrupt.cancel();
        }
        // A second interrupt gets out of a stalled body read.
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let mut req = Request::new(cli.method.to_uppercase(), &cli.url).with_context(ctx.clone());
    for (name, value) in &cli.headers {
        req.headers_mut().append(name, value.clone());
    }
    if let Some(data) = cli.data {
        req = req.with_bytes(data);
    }

    tracing::info!(method = %req.method(), url = %req.url(), "sending request");
    let response = transport
        .round_trip(req)
        .with_context(|| format!("request to {} failed", cli.url))?;
    tracing::info!(status = response.status(), "response received");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.include {
        print_head(&mut out, &response)?;
    }

    let mut body = Interruptible {
        body: response.into_body(),
        ctx: &ctx,
    };
    let copied = io::copy(&mut body, &mut out);
    let closed = body.body.close();
    let copied = copied.context("reading response body")?;
    closed.context("closing response body")?;
    out.flush()?;

    tracing::debug!(bytes = copied, "response body written");
    Ok(())
}

fn print_head(out: &mut impl Write, response: &Response) -> io::Result<()> {
    writeln!(out, "HTTP {}", response.status_text())?;
    for header in response.headers().iter() {
        writeln!(out, "{}: {}", header.name, header.value)?;
    }
    writeln!(out)
}

/// Stops body reads once the request context is cancelled.
struct Interruptible<'a> {
    body: Body,
    ctx: &'a Context,
}

impl Read for Interruptible<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.ctx.is_done() {
            return Err(io::Error::other("canceled"));
        }
        self.body.read(buf)
    }
}
