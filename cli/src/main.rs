use clap::Parser;
use clap_derive::{Args, Parser, Subcommand};
use docstore::{
    DocumentDescriptor, DocumentStoreClient, HttpTransport, Payload, StoreConfig, StoreError,
    load_env_file,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Store and fetch documents in a content service", long_about = None)]
struct Cli {
    /// TOML file with base_url, base_path and default_store
    #[arg(long, env = "DOCSTORE_CONFIG")]
    config: Option<PathBuf>,

    /// Scheme and host of the content service [env: DOCSTORE_BASE_URL]
    #[arg(long)]
    base_url: Option<String>,

    /// Path prefix of document URLs [env: DOCSTORE_BASE_PATH]
    #[arg(long)]
    base_path: Option<String>,

    /// Store used when --store is not given [env: DOCSTORE_DEFAULT_STORE]
    #[arg(long)]
    default_store: Option<String>,

    /// Extra request header sent with every request, as `Name: value`
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    headers: Vec<(HeaderName, HeaderValue)>,

    #[arg(long, short)]
    tracing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a document; data comes from DATA, --file or stdin
    Put {
        #[command(flatten)]
        target: Target,

        /// Explicit content type, otherwise inferred
        #[arg(long)]
        content_type: Option<String>,

        /// Parse the data as JSON instead of sending it as text
        #[arg(long)]
        json: bool,

        #[arg(long, conflicts_with = "data")]
        file: Option<PathBuf>,

        data: Option<String>,
    },
    /// Print a document
    Get {
        #[command(flatten)]
        target: Target,
    },
    /// Print the path of a document without fetching it
    Url {
        #[command(flatten)]
        target: Target,
    },
    /// Delete a document
    Delete {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args, Debug)]
struct Target {
    #[arg(long)]
    store: Option<String>,

    #[arg(long)]
    id: Option<String>,

    #[arg(long)]
    rev: Option<String>,
}

impl From<Target> for DocumentDescriptor {
    fn from(target: Target) -> Self {
        DocumentDescriptor {
            store: target.store,
            id: target.id,
            rev: target.rev,
            content_type: None,
        }
    }
}

fn setup_tracing(enable: bool) -> anyhow::Result<()> {
    let subscriber = if enable {
        FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_writer(io::stderr)
            .finish()
    } else {
        FmtSubscriber::builder()
            .with_max_level(Level::WARN)
            .with_writer(io::stderr)
            .finish()
    };
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("Expected `Name: value`, got: {}", raw))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| format!("Invalid header name: {}", e))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| format!("Invalid header value: {}", e))?;
    Ok((name, value))
}

/// Config file (or defaults), then `DOCSTORE_*` env vars, then flags.
fn build_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?.overlay_env(),
        None => StoreConfig::from_env(),
    };
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(base_path) = &cli.base_path {
        config = config.with_base_path(base_path);
    }
    if let Some(store) = &cli.default_store {
        config = config.with_default_store(store);
    }
    Ok(config)
}

fn build_client(cli: &Cli) -> anyhow::Result<DocumentStoreClient<HttpTransport>> {
    let config = build_config(cli)?;
    let headers: HeaderMap = cli.headers.iter().cloned().collect();
    let transport = HttpTransport::with_headers(&config.base_url, headers)?;
    Ok(DocumentStoreClient::new(transport, config))
}

fn document_url(
    client: &DocumentStoreClient<HttpTransport>,
    descriptor: &DocumentDescriptor,
) -> Result<String, StoreError> {
    let path = client
        .get_url(Some(descriptor))
        .ok_or(StoreError::MissingId("get"))?;
    Ok(format!("{}{}", client.config().base_url, path))
}

fn read_payload(data: Option<String>, file: Option<PathBuf>, json: bool) -> anyhow::Result<Payload> {
    let text = match (data, file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    if json {
        Ok(Payload::Json(serde_json::from_str(&text)?))
    } else {
        Ok(Payload::Text(text))
    }
}

fn print_payload(payload: &Payload) -> anyhow::Result<()> {
    match payload {
        Payload::Text(text) => print!("{}", text),
        Payload::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let cli = Cli::parse();
    setup_tracing(cli.tracing)?;

    let client = build_client(&cli)?;

    match cli.command {
        Command::Put {
            target,
            content_type,
            json,
            file,
            data,
        } => {
            let payload = read_payload(data, file, json)?;
            let mut descriptor = DocumentDescriptor::from(target);
            descriptor.content_type = content_type;
            let result = client.store(payload, Some(&descriptor)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Get { target } => {
            let descriptor = DocumentDescriptor::from(target);
            let document = client.get(Some(&descriptor)).await?;
            print_payload(&document.data)?;
        }
        Command::Url { target } => {
            let descriptor = DocumentDescriptor::from(target);
            println!("{}", document_url(&client, &descriptor)?);
        }
        Command::Delete { target } => {
            let descriptor = DocumentDescriptor::from(target);
            client.delete(Some(&descriptor)).await?;
        }
    }

    Ok(())
}
