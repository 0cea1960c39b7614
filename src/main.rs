//! Shelfscan CLI
//!
//! Command-line front end for the inventory and the barcode scanner.
//! Without the `camera` feature, scanning runs against a simulated camera
//! and decoder.

use clap::{Parser, Subcommand};
use shelfscan::{
    capture::{probe_cameras, CameraPlatform, DeviceClass},
    config::FileConfig,
    inventory::{FileStorage, ImportOutcome, Product, ProductDraft, ProductStore},
    metrics::{MetricsRegistry, MetricsSnapshot},
    scanner::{
        CameraSessionManager, DecodeScript, ResultLog, ScanEvent, ScriptedDecoderFactory,
        SessionConfig,
    },
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "shelfscan", version, about = "Small-shop inventory with barcode scanning")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the product data
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a product
    Add {
        #[arg(long)]
        barcode: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        purchase_price: f64,
        #[arg(long)]
        selling_price: f64,
        #[arg(long)]
        quantity: u32,
    },
    /// List all products
    List,
    /// Look up a product by barcode
    Find { barcode: String },
    /// Merge products from a JSON export
    Import { file: PathBuf },
    /// Write all products to a dated JSON file
    Export {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Remove every product
    Clear,
    /// List cameras and their capabilities
    Cameras,
    /// Scan a barcode
    Scan {
        /// Code the simulated decoder will recognize
        #[arg(long)]
        code: Option<String>,
        /// Override the device class (desktop, mobile, high-frequency-mobile)
        #[arg(long)]
        device_class: Option<DeviceClass>,
        /// Camera id to use when present
        #[arg(long)]
        device: Option<String>,
        /// Look the decoded barcode up in the inventory
        #[arg(long)]
        lookup: bool,
        /// Keep scanning after each result until interrupted
        #[arg(long)]
        continuous: bool,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    debug!("Shelfscan v{}", shelfscan::VERSION);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.data_dir.clone());
    let mut store = ProductStore::load(FileStorage::new(data_dir));

    match cli.command {
        Command::Add {
            barcode,
            name,
            purchase_price,
            selling_price,
            quantity,
        } => {
            if store.find_by_barcode(barcode.trim()).is_some() {
                warn!(barcode = %barcode, "A product with this barcode already exists");
            }
            let product = store.add(ProductDraft {
                barcode,
                name,
                purchase_price,
                selling_price,
                quantity,
            })?;
            println!("Added {} ({})", product.name, product.barcode);
        }
        Command::List => {
            if store.is_empty() {
                println!("No products yet.");
            }
            for product in store.products() {
                println!(
                    "{:<16} {:<30} buy {:>8.2}  sell {:>8.2}  qty {:>5}",
                    product.barcode,
                    product.name,
                    product.purchase_price,
                    product.selling_price,
                    product.quantity
                );
            }
            if !store.is_empty() {
                let total: f64 = store.products().iter().map(Product::stock_value).sum();
                println!("{} products, stock value {:.2}", store.len(), total);
            }
        }
        Command::Find { barcode } => match store.find_by_barcode(&barcode) {
            Some(product) => print_product(product),
            None => println!("No product with barcode \"{}\"", barcode),
        },
        Command::Import { file } => match store.import_file(&file)? {
            ImportOutcome::Added(n) => println!("Imported {} new products", n),
            ImportOutcome::NoNewData => println!("No new data to import"),
        },
        Command::Export { out } => {
            let path = store.export_to_dir(&out)?;
            println!("Exported {} products to {}", store.len(), path.display());
        }
        Command::Clear => {
            store.clear()?;
            println!("All products removed");
        }
        Command::Cameras => {
            let mut platform = camera_platform();
            for info in probe_cameras(&mut platform)? {
                println!(
                    "{}  [{}]  facing: {:?}",
                    info.device.display_label(),
                    info.device.id,
                    info.device.facing
                );
                if let Some(settings) = info.settings {
                    println!(
                        "    {}x{} @ {} fps",
                        settings.width, settings.height, settings.frame_rate
                    );
                }
                if let Some(caps) = info.capabilities {
                    if !caps.focus_modes.is_empty() {
                        println!("    focus: {}", caps.focus_modes.join(", "));
                    }
                }
            }
        }
        Command::Scan {
            code,
            device_class,
            device,
            lookup,
            continuous,
            timeout_secs,
        } => {
            let mut session_config = config.session_config();
            if let Some(class) = device_class {
                session_config.device_class = class;
            }
            if device.is_some() {
                session_config.preferred_device = device;
            }

            let options = ScanOptions {
                script: DecodeScript {
                    code,
                    misses: 3,
                    frame_interval: None,
                },
                lookup,
                continuous,
                timeout: Duration::from_secs(timeout_secs),
                log_capacity: config.scanner.result_log_capacity,
                metrics_port: config.output.metrics_port,
            };
            run_scan(camera_platform(), session_config, options, &store)?;
        }
    }

    Ok(())
}

struct ScanOptions {
    script: DecodeScript,
    lookup: bool,
    continuous: bool,
    timeout: Duration,
    log_capacity: usize,
    metrics_port: u16,
}

fn run_scan<P: CameraPlatform>(
    platform: P,
    session_config: SessionConfig,
    options: ScanOptions,
    store: &ProductStore<FileStorage>,
) -> Result<(), Box<dyn Error>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
    }

    let registry = MetricsRegistry::new()?;
    let publish = metrics_publisher(registry, options.metrics_port);

    let decoders = ScriptedDecoderFactory::new(options.script);
    let mut scanner = CameraSessionManager::new(platform, decoders, session_config);
    let events = scanner.subscribe();
    let mut results = ResultLog::new(options.log_capacity);

    info!(class = %scanner.config().device_class, "Starting scanner (Ctrl-C to stop)");
    if let Err(e) = scanner.start_scanning() {
        eprintln!("{}", e.status_message());
        return Err(e.into());
    }
    debug!(cameras = scanner.available_cameras().len(), "Cameras enumerated");
    if let (Some(device), Some(constraints)) =
        (scanner.active_device(), scanner.active_constraints())
    {
        println!(
            "Scanning with {} at {}x{} ({} fps)",
            device.display_label(),
            constraints.width.ideal,
            constraints.height.ideal,
            constraints.frame_rate
        );
    }
    scanner.nudge_focus();

    let deadline = Instant::now() + options.timeout;
    let mut failure = None;

    'scan: loop {
        scanner.pump_timeout(Duration::from_millis(100));
        publish(&MetricsSnapshot::from_components(
            scanner.state(),
            scanner.stats(),
            store.len(),
        ));

        for event in events.try_iter() {
            match event {
                ScanEvent::Decoded(result) => {
                    println!("Scanned: {}", result.code);
                    if !results.record(&result.code) {
                        debug!(code = %result.code, "Code already in results");
                    }
                    if options.lookup {
                        match store.find_by_barcode(&result.code) {
                            Some(product) => print_product(product),
                            None => println!("No product with barcode \"{}\"", result.code),
                        }
                    }
                    if !options.continuous {
                        break 'scan;
                    }
                    if let Err(e) = scanner.start_scanning() {
                        failure = Some(e);
                        break 'scan;
                    }
                }
                ScanEvent::Failed(e) => {
                    failure = Some(e);
                    break 'scan;
                }
                ScanEvent::StateChanged(state) => debug!(?state, "Scanner state"),
            }
        }

        if interrupted.load(Ordering::SeqCst) {
            info!("Scan cancelled");
            break;
        }
        if Instant::now() >= deadline {
            warn!(timeout_secs = options.timeout.as_secs(), "Scan timed out");
            break;
        }
    }

    scanner.dispose();

    if results.len() > 1 {
        println!("Results (newest first):");
        for code in results.iter() {
            println!("  {}", code);
        }
    }

    match failure {
        Some(e) => {
            eprintln!("{}", e.status_message());
            Err(e.into())
        }
        None => Ok(()),
    }
}

fn print_product(product: &Product) {
    println!("Name:           {}", product.name);
    println!("Barcode:        {}", product.barcode);
    println!("Selling price:  {:.2}", product.selling_price);
    println!("Purchase price: {:.2}", product.purchase_price);
    println!("Quantity:       {}", product.quantity);
    println!("Stock value:    {:.2}", product.stock_value());
    match product.gross_margin() {
        Some(margin) => println!("Gross margin:   {:.1}%", margin * 100.0),
        None => println!("Gross margin:   n/a"),
    }
}

#[cfg(feature = "camera")]
fn camera_platform() -> shelfscan::capture::NokhwaPlatform {
    shelfscan::capture::NokhwaPlatform::new()
}

#[cfg(not(feature = "camera"))]
fn camera_platform() -> shelfscan::capture::MockCameraPlatform {
    use shelfscan::capture::{CameraDevice, MockCameraPlatform};

    info!("Using simulated cameras (build with --features camera for real hardware)");
    MockCameraPlatform::with_devices(vec![
        CameraDevice::new("3f9a1c7e2b", "FaceTime HD Camera (Front)"),
        CameraDevice::new("8d2e6b0a41", "Back Camera"),
    ])
    .hide_labels_until_granted()
    .with_focus_capability()
}

#[cfg(feature = "metrics")]
fn metrics_publisher(registry: MetricsRegistry, port: u16) -> Box<dyn Fn(&MetricsSnapshot)> {
    use shelfscan::metrics::MetricsServer;

    if port == 0 {
        return Box::new(move |snapshot| registry.update(snapshot));
    }

    let server = MetricsServer::localhost(port, registry);
    let state = server.state();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                warn!(error = %e, "Could not start metrics runtime");
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!(error = %e, "Metrics server stopped");
        }
    });

    Box::new(move |snapshot| state.blocking_write().update(snapshot))
}

#[cfg(not(feature = "metrics"))]
fn metrics_publisher(registry: MetricsRegistry, port: u16) -> Box<dyn Fn(&MetricsSnapshot)> {
    if port != 0 {
        warn!(port, "Metrics port configured but the metrics feature is disabled");
    }
    Box::new(move |snapshot| registry.update(snapshot))
}
