// INICIO DEL ARCHIVO [apps/orchestrator/src/bin/seed.rs]
//! =================================================================
//! APARATO: GENESIS FORGE SEEDER (V3.3)
//! CLASIFICACIÓN: INFRASTRUCTURE UTILITY (ESTRATO L3)
//! RESPONSABILIDAD: SEMBRADO DEL DICCIONARIO DE COMPONENTES, DEL FEED
//!                  CVE DE REFERENCIA Y DE UN TENANT DE DEMOSTRACIÓN
//! =================================================================

use chrono::{DateTime, Utc};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use sentinel_domain_models::cve::CveRecord;
use sentinel_infra_db::repositories::{CveRepository, TenantRepository};
use sentinel_infra_db::StoreClient;
use tracing::{error, info, warn};

/// Columnas del feed CVE: cve_id, description, severity, cvss_score,
/// published_at, modified_at, affected_components (separadas por '|').
fn parse_cve_row(record: &csv::StringRecord) -> Option<CveRecord> {
    let parse_stamp = |raw: &str| raw.parse::<DateTime<Utc>>().ok();

    Some(CveRecord {
        cve_id: record.get(0)?.to_string(),
        description: record.get(1)?.to_string(),
        severity: record.get(2)?.to_string(),
        cvss_score: record.get(3)?.parse().ok()?,
        published_at: parse_stamp(record.get(4)?)?,
        modified_at: parse_stamp(record.get(5)?)?,
        affected_components: record
            .get(6)?
            .split('|')
            .filter(|component| !component.is_empty())
            .map(|component| component.to_string())
            .collect(),
    })
}

fn forge_progress_bar(total: u64, label: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("FAULT: Progress template malformed.")
            .progress_chars("##-"),
    );
    bar.set_message(label);
    bar
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("info,sentinel_infra_db=debug")
        .with_target(false)
        .init();

    info!("💠 [GENESIS_FORGE]: Initiating Sovereign Infrastructure Hydration...");

    let database_url = std::env::var("DATABASE_URL")
        .expect("CRITICAL_FAULT: DATABASE_URL is missing in environment.");
    let database_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

    let database_client = match StoreClient::connect(&database_url, database_token).await {
        Ok(client) => client,
        Err(connection_fault) => {
            error!("❌ [FORGE_FAULT]: UPLINK_COLLAPSE: {}", connection_fault);
            return Err(anyhow::anyhow!(connection_fault));
        }
    };

    let cve_repository = CveRepository::new(database_client.clone());

    // --- FASE 1: DICCIONARIO OFICIAL DE COMPONENTES ---
    let dictionary_path = std::env::var("SEED_DICTIONARY_CSV")
        .unwrap_or_else(|_| "dist/feeds/component_dictionary.csv".to_string());

    match csv::Reader::from_path(&dictionary_path) {
        Ok(mut dictionary_reader) => {
            let rows: Vec<csv::StringRecord> = dictionary_reader
                .records()
                .filter_map(|row| row.ok())
                .collect();

            let progress = forge_progress_bar(rows.len() as u64, "🧬 Dictionary");

            for row in &rows {
                if let (Some(vendor), Some(product), Some(version)) = (row.get(0), row.get(1), row.get(2)) {
                    cve_repository.insert_dictionary_entry(vendor, product, version).await?;
                }
                progress.inc(1);
            }

            progress.finish();
            info!("🧬 [FORGE]: {} dictionary entries crystallized.", rows.len());
        }
        Err(_) => warn!("📭 [FORGE]: Dictionary feed absent at [{}]; skipping.", dictionary_path),
    }

    // --- FASE 2: FEED CVE DE REFERENCIA ---
    let cve_feed_path = std::env::var("SEED_CVE_FEED_CSV")
        .unwrap_or_else(|_| "dist/feeds/cve_feed.csv".to_string());

    match csv::Reader::from_path(&cve_feed_path) {
        Ok(mut feed_reader) => {
            let records: Vec<CveRecord> = feed_reader
                .records()
                .filter_map(|row| row.ok())
                .filter_map(|row| parse_cve_row(&row))
                .collect();

            let progress = forge_progress_bar(records.len() as u64, "🦠 CVE feed");

            for record in &records {
                cve_repository.upsert_cve_records(std::slice::from_ref(record)).await?;
                progress.inc(1);
            }

            progress.finish();
            info!("🦠 [FORGE]: {} CVE reference records crystallized.", records.len());
        }
        Err(_) => warn!("📭 [FORGE]: CVE feed absent at [{}]; skipping.", cve_feed_path),
    }

    // --- FASE 3: TENANT DE DEMOSTRACIÓN (OPCIONAL) ---
    if let Ok(demo_tenant_id) = std::env::var("SEED_DEMO_TENANT") {
        let tenant_repository = TenantRepository::new(database_client.clone());

        tenant_repository
            .create_tenant(&demo_tenant_id, "Demonstration Tenant")
            .await?;

        let enrollment_token = tenant_repository
            .mint_enrollment_token(&demo_tenant_id, 24 * 3600)
            .await?;

        // El secreto se imprime UNA única vez; jamás es recuperable después.
        info!("🎫 [FORGE]: Demo tenant [{}] ready. Enrollment token: {}", demo_tenant_id, enrollment_token);
    }

    info!("✅ [GENESIS_COMPLETE]: Strata synchronized. Pipeline ready for agent enrollment.");
    Ok(())
}
// FIN DEL ARCHIVO [apps/orchestrator/src/bin/seed.rs]
