use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pure_client::{
    ApiVersion, BlockingApiClient, Client, ClientConfig, Credential, DEV_VERSION, ListParams,
    Product, Response, TransportConfig, fetch_api_versions, registry,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pure-cli",
    version,
    about = "Small CLI for querying FlashArray, FlashBlade and Pure1 REST APIs"
)]
struct Cli {
    /// Base URL of the target, e.g. https://array.example.com.
    #[arg(long, env = "PURE_TARGET")]
    target: Option<String>,

    /// API token exchanged for a session at login.
    #[arg(long, env = "PURE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Signed identity assertion (JWT), used instead of an API token.
    #[arg(
        long,
        env = "PURE_ID_TOKEN",
        hide_env_values = true,
        conflicts_with = "api_token"
    )]
    id_token: Option<String>,

    /// Product family of the target: flasharray, flashblade or pure1.
    #[arg(long, env = "PURE_PRODUCT", default_value = "flasharray")]
    product: Product,

    /// API version to use instead of negotiating one. `dev` picks the newest.
    #[arg(long, env = "PURE_API_VERSION")]
    api_version: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Emit compact JSON instead of pretty-printed output.
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the API versions the target advertises and the client supports.
    Versions,
    /// List operations registered for the product at one API version.
    Operations {
        /// Filter operations by substring match on operation id (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
    },
    /// Iterate every item of a paged endpoint.
    List(ListArgs),
    /// Call an endpoint once by operation id.
    Call(CallArgs),
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Operation id (for example: getVolumes).
    operation_id: String,

    /// Filter expression passed to the target.
    #[arg(long)]
    filter: Option<String>,

    /// Sort key; repeat for multiple keys. Switches paging to offsets.
    #[arg(long)]
    sort: Vec<String>,

    /// Stop after this many items.
    #[arg(long)]
    limit: Option<u64>,

    /// Resource names to select; repeat as needed.
    #[arg(long = "name")]
    names: Vec<String>,

    /// Extra query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Operation id (for example: patchVolumes).
    operation_id: String,

    /// Query parameter in form key=value. Repeat as needed.
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    #[command(flatten)]
    body: BodyInput,
}

#[derive(Debug, Args)]
struct BodyInput {
    /// JSON request body literal.
    #[arg(long, conflicts_with = "body_file")]
    body_json: Option<String>,

    /// Path to a file containing a JSON request body.
    #[arg(long, value_name = "PATH", conflicts_with = "body_json")]
    body_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::Operations { filter } = &cli.command {
        print_operations(cli.product, cli.api_version.as_deref(), filter.as_deref())?;
        return Ok(());
    }

    let target = cli
        .target
        .clone()
        .context("missing --target (or PURE_TARGET)")?;
    let transport = TransportConfig::default().with_verify_ssl(!cli.insecure);

    let output = match &cli.command {
        Command::Operations { .. } => unreachable!("handled above"),
        Command::Versions => versions(&target, cli.product, &transport)
            .with_context(|| format!("failed to probe API versions of '{target}'"))?,
        Command::List(args) => {
            let client = connect(&cli, target, transport)?;
            list(&client, args)
                .with_context(|| format!("listing failed: '{}'", args.operation_id))?
        }
        Command::Call(args) => {
            let client = connect(&cli, target, transport)?;
            call(&client, args)
                .with_context(|| format!("operation call failed: '{}'", args.operation_id))?
        }
    };

    print_json(&output, cli.compact).context("failed to print JSON output")?;
    Ok(())
}

/// Logs go to stderr so stdout stays valid JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn connect(cli: &Cli, target: String, transport: TransportConfig) -> Result<Client> {
    let credential = match (&cli.api_token, &cli.id_token) {
        (Some(token), None) => Credential::ApiToken(token.clone()),
        (None, Some(jwt)) => Credential::IdentityAssertion(jwt.clone()),
        (None, None) => bail!("missing credential: set --api-token or --id-token"),
        (Some(_), Some(_)) => bail!("use only one of --api-token or --id-token"),
    };

    let mut config = ClientConfig::new(target, cli.product, credential).with_transport(transport);
    if let Some(version) = &cli.api_version {
        config = config.with_version(version.clone());
    }
    Client::connect(config).context("failed to connect")
}

fn versions(target: &str, product: Product, transport: &TransportConfig) -> Result<Value> {
    let transport = BlockingApiClient::new(target, transport)?;
    let advertised = fetch_api_versions(&transport)?;
    let supported: Vec<String> = registry::supported_versions(product)
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok(serde_json::json!({
        "product": product.to_string(),
        "advertised": advertised,
        "supported": supported,
    }))
}

/// Prints the registered operations for `product` at `version`.
///
/// Without a version (or with `dev`) the newest registered version is used.
fn print_operations(product: Product, version: Option<&str>, filter: Option<&str>) -> Result<()> {
    let version = match version {
        None | Some(DEV_VERSION) => registry::supported_versions(product)
            .last()
            .copied()
            .context("product registers no API versions")?,
        Some(raw) => raw
            .parse::<ApiVersion>()
            .with_context(|| format!("invalid --api-version '{raw}'"))?,
    };
    let module = registry::module(product, version)
        .with_context(|| format!("no operations registered for {product} {version}"))?;

    let filter = filter.map(str::to_ascii_lowercase);
    let operations: Vec<_> = module
        .endpoints()
        .iter()
        .filter(|endpoint| {
            filter
                .as_ref()
                .is_none_or(|needle| endpoint.operation_id.to_ascii_lowercase().contains(needle))
        })
        .collect();

    let (operation_id_width, method_width) =
        operations
            .iter()
            .fold((0usize, 0usize), |(id_max, method_max), endpoint| {
                (
                    id_max.max(endpoint.operation_id.len()),
                    method_max.max(endpoint.method.len()),
                )
            });

    for endpoint in operations {
        println!(
            "{:<operation_id_width$}  {:<method_width$}  /api/{version}/{}",
            endpoint.operation_id, endpoint.method, endpoint.path
        );
    }
    Ok(())
}

fn list(client: &Client, args: &ListArgs) -> Result<Value> {
    let mut params = ListParams::new().names(args.names.iter().cloned());
    if let Some(filter) = &args.filter {
        params = params.filter(filter.clone());
    }
    if !args.sort.is_empty() {
        params = params.sort(args.sort.iter().cloned());
    }
    if let Some(limit) = args.limit {
        params = params.limit(limit);
    }
    for (key, value) in parse_pairs(&args.query, "--query")? {
        params = params.param(key, value);
    }

    let response = client.list::<Value>(&args.operation_id, params)?;
    collect_items(response)
}

fn call(client: &Client, args: &CallArgs) -> Result<Value> {
    let mut params = ListParams::new();
    for (key, value) in
        parse_pairs(&args.query, "--query").context("failed to parse --query arguments")?
    {
        params = params.param(key, value);
    }
    let body = parse_body(&args.body).context("failed to parse request body input")?;

    let response = client.call::<Value>(&args.operation_id, params, body)?;
    collect_items(response)
}

/// Drains the item iterator, or turns an error response into a CLI error.
fn collect_items(response: Response<Value>) -> Result<Value> {
    let valid = response.into_result()?;
    let items = valid
        .items
        .collect::<Result<Vec<_>, _>>()
        .context("failed to fetch a follow-up page")?;
    Ok(Value::Array(items))
}

/// Parses repeated `key=value` arguments into owned key/value pairs.
///
/// Returns an error when a value does not include `=` or has an empty key.
fn parse_pairs(values: &[String], flag_name: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(values.len());
    for item in values {
        let Some((key, value)) = item.split_once('=') else {
            bail!("invalid {flag_name} value '{item}': expected key=value");
        };
        if key.is_empty() {
            bail!("invalid {flag_name} value '{item}': empty key");
        }
        pairs.push((key.to_owned(), value.to_owned()));
    }
    Ok(pairs)
}

/// Parses an optional JSON body from inline text or a file path.
fn parse_body(body: &BodyInput) -> Result<Option<Value>> {
    match (&body.body_json, &body.body_file) {
        (Some(raw), None) => serde_json::from_str(raw)
            .context("failed to parse JSON from --body-json")
            .map(Some),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read --body-file '{}'", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| {
                    format!("failed to parse JSON in --body-file '{}'", path.display())
                })
                .map(Some)
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => bail!("use only one of --body-json or --body-file"),
    }
}

fn print_json(value: &Value, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    println!("{}", rendered.context("failed to render JSON")?);
    Ok(())
}
