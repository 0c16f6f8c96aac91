use std::io::{stderr, IsTerminal};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::{pin_mut, StreamExt};
use kdam::{
    term::{self, Colorizer},
    tqdm, BarExt, Column, RichProgress, Spinner,
};

use common::data::ConfigurationType;
use common::payloads::{CreateKey, UpdateKey};
use common::tags::tags_from_pairs;
use entrepot_client::pipeline::{Pipeline, PipelineEvent, PublishRequest, UploadRequest};
use entrepot_client::{settings, ApiClient, Settings};

#[derive(Parser, Debug)]
#[command(version, about = "Client for the Géoplateforme Entrepôt platform", long_about = None)]
struct Cli {
    #[arg(long, env = "ENTREPOT_URL", default_value = settings::DEFAULT_BASE_URL)]
    base_url: String,

    /// Bearer token; get one from the platform's SSO.
    #[arg(long, env = "ENTREPOT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deliver files and integrate them as a vector database
    Upload {
        #[arg(long)]
        datastore: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "EPSG:4326")]
        srs: String,
        files: Vec<PathBuf>,
        /// Chain pyramid generation and a WMTS-TMS publication once the
        /// database is generated
        #[arg(long)]
        publish: bool,
        #[arg(long)]
        layer_name: Option<String>,
    },
    /// Report on a stored data: details, tables, executions
    Status {
        #[arg(long)]
        datastore: String,
        stored_data: String,
    },
    /// Full logs of a processing execution
    Logs {
        #[arg(long)]
        datastore: String,
        execution: String,
    },
    /// Storage and upload quotas of a datastore
    Datastore { datastore: String },
    /// Publish a generated stored data as an OGC service
    Publish {
        #[arg(long)]
        datastore: String,
        stored_data: String,
        /// wmts-tms, wfs or wms-vector
        #[arg(long)]
        service: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        layer_name: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "abstract")]
        summary: Option<String>,
        /// Table to publish; repeat for several, omit for all
        #[arg(long = "table")]
        tables: Vec<String>,
        /// SLD style file (WMS-VECTOR only)
        #[arg(long)]
        style: Option<PathBuf>,
        /// key=value tag stamped on the configuration; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        attribution_title: Option<String>,
        #[arg(long)]
        attribution_url: Option<String>,
    },
    /// Delete every offering and configuration built on a stored data
    Unpublish {
        #[arg(long)]
        datastore: String,
        stored_data: String,
    },
    /// Manage the user's API keys
    Keys {
        #[command(subcommand)]
        action: KeyCommand,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommand {
    List,
    Create {
        name: String,
        #[arg(long, default_value = "HASH")]
        kind: String,
    },
    Rename {
        key: String,
        name: String,
    },
    Delete {
        key: String,
    },
}

fn parse_service(raw: &str) -> Result<ConfigurationType> {
    match raw.to_ascii_lowercase().as_str() {
        "wmts" | "wmts-tms" => Ok(ConfigurationType::WmtsTms),
        "wfs" => Ok(ConfigurationType::Wfs),
        "wms" | "wms-vector" => Ok(ConfigurationType::WmsVector),
        other => bail!("unknown service type {other:?}, expected wmts-tms, wfs or wms-vector"),
    }
}

fn format_bytes(value: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = value as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn describe_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::UploadCreated { upload_id } => format!("upload {upload_id} created"),
        PipelineEvent::FileSent { name } => format!("sent {name}"),
        PipelineEvent::UploadClosing => "upload closed, checks running".to_string(),
        PipelineEvent::UploadStatus { status } => format!("upload {status}"),
        PipelineEvent::ChecksProgress { passed, failed, total } => {
            format!("checks {passed}/{total} passed, {failed} failed")
        }
        PipelineEvent::IntegrationStarted { execution_id, .. } => {
            format!("database integration {execution_id} started")
        }
        PipelineEvent::IntegrationStatus { status } => format!("integration {status}"),
        PipelineEvent::StoredDataStatus { status } => format!("stored data {status}"),
        PipelineEvent::DataReady { stored_data_id } => {
            format!("stored data {stored_data_id} generated")
        }
    }
}

fn status_bar() -> RichProgress {
    RichProgress::new(
        tqdm!(total = 0),
        vec![
            Column::Spinner(Spinner::new(
                &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
                80.0,
                1.0,
            )),
            Column::Text("[bold blue]uploading".to_owned()),
        ],
    )
}

async fn run_upload(
    api: &ApiClient,
    datastore: &str,
    name: &str,
    srs: &str,
    files: Vec<PathBuf>,
    publish: bool,
    layer_name: Option<String>,
    tty: bool,
) -> Result<()> {
    if files.is_empty() {
        bail!("Must have one or more files");
    }
    let pipeline = Pipeline::new(api, datastore);
    let mut bar = tty.then(status_bar);
    let mut stored_data_id = None;
    let mut prev = String::new();
    {
        let stream = pipeline.run(UploadRequest::new(name, srs, files));
        pin_mut!(stream);
        while let Some(event) = stream.next().await {
            let event = event?;
            if let PipelineEvent::DataReady { stored_data_id: id } = &event {
                stored_data_id = Some(id.clone());
            }
            let line = describe_event(&event);
            if let Some(&mut ref mut bar) = bar.as_mut() {
                bar.columns.truncate(2);
                bar.columns.push(Column::Text(line.colorize("green")));
                let _ = bar.refresh();
            } else if line != prev {
                eprintln!("{line}");
                prev = line;
            }
        }
    }
    if let Some(mut bar) = bar {
        let _ = bar.clear();
    }
    let stored_data_id = stored_data_id.context("pipeline ended before the data was generated")?;
    eprintln!("Vector database ready: {stored_data_id}");

    if publish {
        eprintln!("Generating pyramid...");
        let pyramid = pipeline
            .generate_pyramid(&stored_data_id, &format!("{name} pyramid"))
            .await?;
        let layer_name = layer_name.unwrap_or_else(|| name.to_string());
        let request = PublishRequest::new(ConfigurationType::WmtsTms, name, &layer_name);
        let offering = pipeline.publish(&pyramid, &request).await?;
        match offering.first_url() {
            Some(url) => println!("{url}"),
            None => println!("{}", offering.id),
        }
    } else {
        println!("{stored_data_id}");
    }
    Ok(())
}

async fn run_status(api: &ApiClient, datastore: &str, stored_data: &str) -> Result<()> {
    let sd = api.stored_data().get(datastore, stored_data).await?;
    println!("{} ({})", sd.name, sd.id);
    println!("type: {}  status: {}", sd.kind, sd.status);
    if !sd.tags.is_empty() {
        println!("tags:");
        for (key, value) in &sd.tags {
            println!("  {key} = {value}");
        }
    }
    let tables = sd.tables();
    if !tables.is_empty() {
        println!("tables:");
        for table in tables {
            println!("  {} ({} attributes)", table.name, table.attributes.len());
        }
    }
    if !sd.zoom_levels().is_empty() {
        println!("zoom levels: {}", sd.zoom_levels().join(", "));
    }
    let executions = api
        .processings()
        .executions_for_stored_data(datastore, stored_data)
        .await?;
    if !executions.is_empty() {
        println!("executions:");
        for execution in executions {
            println!(
                "  {} {} {} (created {})",
                execution.id,
                execution.processing.name,
                execution.status,
                execution.creation.as_deref().unwrap_or("-"),
            );
        }
    }
    Ok(())
}

async fn run_datastore(api: &ApiClient, datastore: &str) -> Result<()> {
    let ds = api.datastores().get(datastore).await?;
    println!("{} ({})", ds.name, ds.technical_name);
    for kind in ["POSTGRESQL", "FILESYSTEM", "S3"] {
        let (used, quota) = ds.storage_use_and_quota(kind);
        if quota > 0 {
            println!("{kind:<12} {} / {}", format_bytes(used), format_bytes(quota));
        }
    }
    let (used, quota) = ds.upload_use_and_quota();
    if quota > 0 {
        println!("{:<12} {} / {}", "UPLOADS", format_bytes(used), format_bytes(quota));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_publish(
    api: &ApiClient,
    datastore: &str,
    stored_data: &str,
    service: &str,
    name: &str,
    layer_name: &str,
    title: Option<String>,
    summary: Option<String>,
    tables: Vec<String>,
    style: Option<PathBuf>,
    tags: Vec<String>,
    attribution: Option<(String, String)>,
) -> Result<()> {
    let mut request = PublishRequest::new(parse_service(service)?, name, layer_name);
    if let Some(title) = title {
        request.title = title;
    }
    if let Some(summary) = summary {
        request.summary = summary;
    }
    request.tables = tables;
    request.style = style;
    request.attribution = attribution;
    request.tags = tags_from_pairs(tags.iter().map(String::as_str));

    let pipeline = Pipeline::new(api, datastore);
    let offering = pipeline.publish(stored_data, &request).await?;
    eprintln!("offering {} created", offering.id);
    for url in &offering.urls {
        println!("{}", url.url());
    }
    Ok(())
}

async fn run_keys(api: &ApiClient, action: KeyCommand) -> Result<()> {
    let users = api.users();
    match action {
        KeyCommand::List => {
            for key in users.keys().await? {
                println!("{}  {}  {}", key.id, key.name, key.kind.as_deref().unwrap_or("-"));
            }
        }
        KeyCommand::Create { name, kind } => {
            let key = users
                .create_key(&CreateKey {
                    name,
                    kind,
                    user_agent: None,
                    whitelist: Vec::new(),
                })
                .await?;
            println!("{}", key.id);
        }
        KeyCommand::Rename { key, name } => {
            users
                .update_key(
                    &key,
                    &UpdateKey {
                        name: Some(name),
                        ..Default::default()
                    },
                )
                .await?;
        }
        KeyCommand::Delete { key } => {
            users.delete_key(&key).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let is_tty = stderr().is_terminal();
    term::init(is_tty);
    let cli = Cli::parse();

    let settings = Settings::new(&cli.base_url).with_token(cli.token.clone());
    let api = ApiClient::new(settings)?;

    match cli.command {
        Command::Upload {
            datastore,
            name,
            srs,
            files,
            publish,
            layer_name,
        } => {
            run_upload(&api, &datastore, &name, &srs, files, publish, layer_name, is_tty).await
        }
        Command::Status { datastore, stored_data } => {
            run_status(&api, &datastore, &stored_data).await
        }
        Command::Logs { datastore, execution } => {
            let logs = api.processings().execution_logs(&datastore, &execution).await?;
            print!("{logs}");
            Ok(())
        }
        Command::Datastore { datastore } => run_datastore(&api, &datastore).await,
        Command::Publish {
            datastore,
            stored_data,
            service,
            name,
            layer_name,
            title,
            summary,
            tables,
            style,
            tags,
            attribution_title,
            attribution_url,
        } => {
            let attribution = attribution_title.zip(attribution_url);
            run_publish(
                &api,
                &datastore,
                &stored_data,
                &service,
                &name,
                &layer_name,
                title,
                summary,
                tables,
                style,
                tags,
                attribution,
            )
            .await
        }
        Command::Unpublish { datastore, stored_data } => {
            let deleted = api
                .offerings()
                .unpublish_stored_data(&datastore, &stored_data)
                .await?;
            for id in deleted {
                eprintln!("offering {id} deleted");
            }
            Ok(())
        }
        Command::Keys { action } => run_keys(&api, action).await,
    }
}
