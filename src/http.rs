//! The `http` script module: blocking GET helpers over reqwest.

use std::time::Duration;

use indexmap::IndexMap;
use reqwest::Client;

use crate::{
    diagnostics::Result,
    fetch,
    stdlib::{Exports, expect_array, expect_int, expect_string, runtime_error},
    value::{Arity, Value},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = concat!("playpen/", env!("CARGO_PKG_VERSION"));

pub(crate) fn module() -> IndexMap<String, Value> {
    Exports::default()
        .function("get_text", Arity::Exact(1), get_text)
        .function("get_json", Arity::Exact(1), get_json)
        .function("get_many_json", Arity::Range(1, 2), get_many_json)
        .build()
}

fn client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|err| runtime_error(format!("failed to build HTTP client: {err}")))
}

/// Each call drives its own single-threaded runtime; scripts are synchronous.
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

async fn fetch_text(client: &Client, url: &str) -> std::result::Result<String, reqwest::Error> {
    log::debug!("GET {url}");
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

async fn fetch_json(
    client: &Client,
    url: &str,
) -> std::result::Result<serde_json::Value, reqwest::Error> {
    log::debug!("GET {url}");
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

fn get_text(args: &[Value]) -> Result<Value> {
    let url = expect_string(&args[0], "http.get_text")?;
    let client = client()?;
    let body = block_on(fetch_text(&client, &url))?
        .map_err(|err| runtime_error(format!("http.get_text: {err}")))?;
    Ok(Value::string(body))
}

fn get_json(args: &[Value]) -> Result<Value> {
    let url = expect_string(&args[0], "http.get_json")?;
    let client = client()?;
    let body = block_on(fetch_json(&client, &url))?
        .map_err(|err| runtime_error(format!("http.get_json: {err}")))?;
    Ok(Value::from_json(&body))
}

/// Fetches every URL with bounded parallelism. Failed requests are dropped;
/// the rest keep the order of `urls`.
fn get_many_json(args: &[Value]) -> Result<Value> {
    let urls = expect_array(&args[0], "http.get_many_json")?
        .iter()
        .map(|url| expect_string(url, "http.get_many_json"))
        .collect::<Result<Vec<_>>>()?;
    let workers = match args.get(1) {
        Some(workers) => expect_int(workers, "http.get_many_json")?.max(1) as usize,
        None => 4,
    };
    let client = client()?;
    let shared = &client;
    let items = block_on(fetch::fetch_ordered(urls, workers, move |url: String| async move {
        fetch_json(shared, &url).await
    }))?;
    Ok(Value::array(items.iter().map(Value::from_json).collect()))
}
