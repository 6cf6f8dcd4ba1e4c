use entitlement_engine::{
    services::{
        entitlement_service::ReloadOutcome,
        store::{FileReceiptSource, OfflineStore},
    },
    Config, EntitlementEngine, Feature, Product, Provider, StoreBindings,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entitlement_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load()?;

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.receipt.path.clone())
        .ok_or_else(|| anyhow::anyhow!("usage: entitlement-engine <receipt-path>"))?;

    let source = FileReceiptSource::new(path, config.receipt.encoding);
    tracing::info!("Inspecting receipt at {}", source.path().display());

    let engine = EntitlementEngine::new(
        &config,
        StoreBindings {
            receipt_source: Arc::new(source),
            product_store: Arc::new(OfflineStore),
            transaction_store: Arc::new(OfflineStore),
        },
    );

    let (status, fingerprint, error) = match engine.reload() {
        ReloadOutcome::Resolved { fingerprint, .. } => ("resolved", Some(fingerprint), None),
        ReloadOutcome::Unavailable => ("unavailable", None, None),
        ReloadOutcome::Rejected(e) => (
            "rejected",
            None,
            Some(json!({ "code": e.code(), "message": e.to_string() })),
        ),
    };

    let features: serde_json::Map<_, _> = Feature::ALL
        .iter()
        .map(|f| {
            let product = Product::Feature(*f);
            (
                engine.catalog().identifier(&product),
                json!(engine.is_eligible(&product)),
            )
        })
        .collect();

    let providers: serde_json::Map<_, _> = Provider::ALL
        .iter()
        .map(|p| (p.name().to_string(), json!(engine.is_eligible_for_provider(p.name()))))
        .collect();

    let entitlements = engine.entitlements();
    let report = json!({
        "status": status,
        "fingerprint": fingerprint,
        "error": error,
        "entitlements": entitlements.as_ref(),
        "fullVersion": engine.is_full_version(),
        "features": features,
        "providers": providers,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
