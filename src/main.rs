use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use filedeck::transfer::ProgressFn;
use filedeck::web::WebServer;
use filedeck::{
    session, CancelToken, Config, FileSource, HttpTransferExecutor, LogNotifier,
    Result, UploadController, UploadOutcome,
};

#[derive(Parser)]
#[command(name = "filedeck", version, about = "Signed-URL file manager")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker and object store service
    Serve,
    /// List stored objects
    List,
    /// Upload a file (Ctrl-C cancels)
    Upload {
        /// Path to the file to upload
        path: PathBuf,
        /// MIME type (guessed from the extension by default)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Download an object
    Download {
        /// Object key
        key: String,
        /// Output file (defaults to the object's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one or more objects
    Delete {
        /// Object keys
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    if let Err(e) = filedeck::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        filedeck::logging::init_console_only(&config.logging.level);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Serve => {
            info!("FileDeck broker starting");
            WebServer::new(&config).await?.run().await
        }
        Commands::List => {
            for object in controller(&config)?.refresh().await {
                println!(
                    "{}\t{}\t{}",
                    object.key,
                    object.size.map(|s| s.to_string()).unwrap_or_default(),
                    object.last_modified.unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::Upload { path, mime } => upload(&controller(&config)?, path, mime).await,
        Commands::Download { key, output } => {
            let controller = controller(&config)?;
            download(&controller, &config, &key, output).await
        }
        Commands::Delete { keys } => {
            let results = controller(&config)?.delete_files(&keys).await;
            let mut first_error = None;
            for (key, result) in results {
                match result {
                    Ok(()) => println!("deleted\t{key}"),
                    Err(e) => {
                        println!("failed\t{key}\t{e}");
                        first_error.get_or_insert(e);
                    }
                }
            }
            match first_error {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
    }
}

fn controller(config: &Config) -> Result<Arc<UploadController>> {
    config.validate()?;
    let session = session::from_token(&config.client.api_token);
    let controller =
        UploadController::from_config(&config.client, session, Arc::new(LogNotifier))?;
    Ok(Arc::new(controller))
}

async fn upload(
    controller: &Arc<UploadController>,
    path: PathBuf,
    mime: Option<String>,
) -> Result<()> {
    let mut source = FileSource::from_path(&path).await?;
    if let Some(mime) = mime {
        source = FileSource::new(source.name(), mime, source.content().clone());
    }
    controller.select_file(source)?;
    let transfer = controller.start_transfer()?;

    let mut status = controller.subscribe();
    let reporter = tokio::spawn(async move {
        let mut last = 0.0;
        while status.changed().await.is_ok() {
            let progress = status.borrow_and_update().progress();
            if progress > last {
                last = progress;
                println!("{:.2}% uploaded", progress);
            }
        }
    });

    let canceller = tokio::spawn({
        let controller = controller.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.cancel_transfer();
            }
        }
    });

    let outcome = transfer.await;
    canceller.abort();
    reporter.abort();

    match outcome {
        UploadOutcome::Uploaded { name, size } => {
            println!("uploaded\t{name}\t{size}");
            Ok(())
        }
        UploadOutcome::Cancelled { name } => {
            println!("cancelled\t{name}");
            Ok(())
        }
        UploadOutcome::Failed { error, .. } => Err(error),
    }
}

async fn download(
    controller: &UploadController,
    config: &Config,
    key: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let location = controller.download_location(key).await?;
    let executor = HttpTransferExecutor::new(&config.client)?;

    let cancel = CancelToken::new();
    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let on_progress: ProgressFn = Arc::new(|percent: f64| {
        tracing::debug!(percent, "download progress");
    });
    let fetched = executor.fetch(location, on_progress, &cancel).await;
    canceller.abort();
    let content = fetched?;

    let output = output.unwrap_or_else(|| PathBuf::from(key.rsplit('/').next().unwrap_or(key)));
    tokio::fs::write(&output, &content).await?;

    info!(key, bytes = content.len(), "Downloaded to {}", output.display());
    println!("downloaded\t{key}\t{}\t{}", output.display(), content.len());
    Ok(())
}
