use std::path::Path;

use tracing::{info, warn};

use kabala::config::{Config, LlmBackend};
use kabala::ingest;
use kabala::llm_extract::{GeminiClient, ModelClient};
use kabala::review::ReceiptReview;
use kabala::store::SqliteStore;
use kabala::RuleSet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input_path) = args.next() else {
        eprintln!("usage: kabala <receipt-file> [config.toml]");
        std::process::exit(2);
    };
    let config_path = args
        .next()
        .unwrap_or_else(|| ".config/kabala.toml".to_string());

    let cfg = Config::load_or_default(&config_path);
    let db = SqliteStore::open(&cfg.db_path)?;
    let rules = RuleSet::israeli_retail();

    let client: Option<GeminiClient> = match cfg.llm.backend {
        LlmBackend::Disabled => None,
        LlmBackend::Gemini => match cfg.llm.resolve() {
            Ok(endpoint) => Some(GeminiClient::new(endpoint)),
            Err(e) => {
                warn!(error = %e, "Model unavailable, heuristics only");
                None
            }
        },
    };
    let model: Option<&dyn ModelClient> = client.as_ref().map(|c| c as &dyn ModelClient);

    let path = Path::new(&input_path);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let outcome = match ext.as_deref() {
        Some("pdf") => {
            let bytes = std::fs::read(path)?;
            ingest::parse_media(model, &rules, "application/pdf", &bytes).await
        }
        Some("jpg") | Some("jpeg") => {
            let bytes = std::fs::read(path)?;
            ingest::parse_media(model, &rules, "image/jpeg", &bytes).await
        }
        Some("png") => {
            let bytes = std::fs::read(path)?;
            ingest::parse_media(model, &rules, "image/png", &bytes).await
        }
        _ => {
            let text = std::fs::read_to_string(path)?;
            ingest::parse_text(model, &rules, &text).await
        }
    };
    info!(
        source = ?outcome.source,
        items = outcome.receipt.items.len(),
        store = outcome.receipt.store_name.as_deref().unwrap_or("?"),
        "Receipt parsed"
    );

    let mut review = ReceiptReview::new(cfg.owner_id.clone(), outcome.receipt);
    review.resolve(&db, &db)?;

    let matched: Vec<_> = review.items().iter().map(|i| &i.matched).collect();
    println!("{}", serde_json::to_string_pretty(&matched)?);

    let summary = review.save(&db, &db);
    info!(
        receipt_uid = %summary.receipt_uid,
        purchases = summary.purchases_saved,
        aliases = summary.aliases_saved,
        "Saved"
    );

    let (aliases, items, purchases) = db.counts()?;
    info!(
        aliases_total = aliases,
        list_items_total = items,
        purchases_total = purchases,
        "Database statistics"
    );

    Ok(())
}
