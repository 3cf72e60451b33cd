use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;

use satdrip::repositories::accrual::AccrualEngine;
use satdrip::repositories::ledger::LedgerRepository;
use satdrip::repositories::snapshot::FileBackend;
use satdrip::services;
use satdrip::settings::Settings;
use satdrip::utils::SystemClock;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args.config).expect("Could not load config file.");

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting satdrip dealer.");

    let engine = AccrualEngine::new(
        Box::new(SystemClock),
        settings.earning.base_amount_per_tick,
    );
    let backend = Box::new(FileBackend::new(&settings.storage.path));
    let mut repository =
        LedgerRepository::open(backend, engine.now()).expect("Could not open ledger snapshot.");

    repository.init(
        &settings.admin.username,
        &settings.admin.email,
        &settings.admin.password,
        engine.now(),
    );

    log::info!("Running offline catch-up.");
    repository
        .catch_up(&engine)
        .expect("Could not persist caught-up ledger.");

    services::start_services(repository, engine, settings, &args.listen).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
