use std::io::Write;

use anyhow::{Context, bail};
use exerlog_fetch::config::parse_duration;
use exerlog_fetch::{AbortController, FetchConfig, HyperTransport, Redirect, Request, fetch};
use tracing::info;

pub struct FetchArgs {
    pub url: String,
    pub method: Option<String>,
    pub headers: Vec<String>,
    pub data: Option<String>,
    pub max_size: Option<u64>,
    pub timeout: Option<String>,
    pub no_follow: bool,
    pub include: bool,
}

pub async fn run(config: &FetchConfig, args: FetchArgs) -> anyhow::Result<()> {
    let method = effective_method(args.method.as_deref(), args.data.is_some());
    let mut init = config.request_init()?.method(method);
    for raw in &args.headers {
        let (name, value) = split_header(raw)?;
        init = init.header(name, value);
    }
    if let Some(data) = args.data {
        init = init.body(data);
    }
    if let Some(size) = args.max_size {
        init = init.size(size);
    }
    if let Some(raw) = args.timeout.as_deref() {
        let timeout = parse_duration(raw).with_context(|| format!("invalid timeout {raw:?}"))?;
        init = init.timeout(timeout);
    }
    if args.no_follow {
        init = init.redirect(Redirect::Manual);
    }

    let controller = AbortController::new();
    init = init.signal(controller.signal());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, aborting request");
            controller.abort();
        }
    });

    let request = Request::new(args.url.as_str(), init)?;
    let transport = HyperTransport::new().map_err(|e| anyhow::anyhow!(e))?;
    let mut response = fetch(&transport, request).await?;

    if args.include {
        println!("HTTP {} {}", response.status(), response.status_text());
        for header in response.headers().entries() {
            println!("{}: {}", header.name, header.value);
        }
        println!();
    }

    let body = response.bytes().await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;

    if !response.ok() && !args.include {
        info!(status = response.status(), url = %response.url(), "non-success status");
    }
    Ok(())
}

fn effective_method(method: Option<&str>, has_data: bool) -> &str {
    match method {
        Some(method) => method,
        None if has_data => "POST",
        None => "GET",
    }
}

fn split_header(raw: &str) -> anyhow::Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("header must look like \"Name: value\", got {raw:?}"),
    }
}
