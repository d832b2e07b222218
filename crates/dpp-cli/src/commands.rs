use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use dpp_crypto::{commit_all, verify_document, IntegrityReport, SectionStatus};
use dpp_engine::{disclose, Backoff, CycleReport, EngineResult, Projection, Reconciler};
use dpp_server::{AppState, DppServer};
use dpp_store::DocumentStore;
use dpp_types::{Document, Tier};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cli::*;
use crate::config::AppConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Sync(args) => cmd_sync(&config, args, format).await,
        Command::Register(args) => cmd_register(&config, args),
        Command::Show(args) => cmd_show(&config, args, format),
        Command::Verify(args) => cmd_verify(&config, args, format),
        Command::Cursor => cmd_cursor(&config, format),
    }
}

async fn cmd_serve(config: AppConfig, args: ServeArgs) -> anyhow::Result<()> {
    let mut server_config = config.server.clone();
    if let Some(bind) = args.bind {
        server_config.bind_addr = bind;
    }

    let store = config.document_store()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut state = AppState::new(Arc::clone(&store));

    let engine_task = if args.no_engine {
        None
    } else {
        let mut engine = Reconciler::new(
            config.ledger(),
            Arc::clone(&store),
            config.cursor_store()?,
            config.engine.clone(),
        )?;
        state = state.with_engine(engine.status());
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move { engine.run(rx).await }))
    };

    let server = DppServer::new(server_config, state);
    let mut server_shutdown = shutdown_rx;
    let mut server_task = tokio::spawn(server.serve(async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
    }));

    let server_done = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing ctrl-c handler")?;
            info!("shutdown requested");
            false
        }
        result = &mut server_task => {
            result??;
            true
        }
    };

    shutdown_tx.send_replace(true);
    if let Some(task) = engine_task {
        if let Err(e) = task.await? {
            error!(error = %e, "engine exited with error");
        }
    }
    if !server_done {
        server_task.await??;
    }
    println!("{} Stopped.", "✓".green());
    Ok(())
}

async fn cmd_sync(config: &AppConfig, args: SyncArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut engine = Reconciler::new(
        config.ledger(),
        config.document_store()?,
        config.cursor_store()?,
        config.engine.clone(),
    )?;
    engine.requeue_unanchored()?;
    let (total, cycles) = sync_until_drained(&mut engine, args.max_cycles).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&total)?),
        OutputFormat::Text => {
            println!("{} Synced {} cycle(s)", "✓".green().bold(), cycles);
            println!(
                "  Events: {} fetched, {} applied, {} duplicate, {} invalid, {} unknown entity",
                total.fetched, total.applied, total.duplicates, total.invalid, total.unknown_entities
            );
            println!(
                "  Anchors: {} submitted, {} failed, {} pending",
                total.anchored.to_string().green(),
                total.anchor_failures.to_string().red(),
                engine.pending_anchors()
            );
            match total.position {
                Some(position) => println!("  Cursor: {}", position.to_string().cyan()),
                None => println!("  Cursor: {}", "not started".dimmed()),
            }
        }
    }
    Ok(())
}

/// Run cycles until a batch comes back short or `max_cycles` is spent.
///
/// Retryable failures back off with the engine's fetch backoff and count
/// against the budget; the last one is returned if the budget runs out.
pub async fn sync_until_drained(
    engine: &mut Reconciler,
    max_cycles: u32,
) -> EngineResult<(CycleReport, u32)> {
    let batch_size = engine.config().batch_size;
    let mut backoff = Backoff::new(engine.config().fetch_backoff.clone());
    let mut total = CycleReport::default();
    let mut cycles = 0;
    while cycles < max_cycles {
        cycles += 1;
        match engine.run_cycle().await {
            Ok(report) => {
                backoff.reset();
                accumulate(&mut total, &report);
                if report.fetched < batch_size {
                    break;
                }
            }
            Err(e) if e.is_retryable() && cycles < max_cycles => {
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "sync cycle failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((total, cycles))
}

fn accumulate(total: &mut CycleReport, report: &CycleReport) {
    total.fetched += report.fetched;
    total.applied += report.applied;
    total.duplicates += report.duplicates;
    total.invalid += report.invalid;
    total.unknown_entities += report.unknown_entities;
    total.anchored += report.anchored;
    total.anchor_failures += report.anchor_failures;
    total.position = report.position.or(total.position);
}

fn cmd_register(config: &AppConfig, args: RegisterArgs) -> anyhow::Result<()> {
    if args.id.is_some() && args.paths.len() > 1 {
        bail!("--id can only be used with a single file");
    }
    let store = config.document_store()?;
    for path in &args.paths {
        let document = register_file(store.as_ref(), path, args.id.as_deref())?;
        println!(
            "{} Registered {} ({} sections)",
            "✓".green().bold(),
            document.entity_id.yellow(),
            document.sections.len()
        );
    }
    Ok(())
}

/// Parse a passport file, commit its section hashes, and insert it.
pub fn register_file(
    store: &dyn DocumentStore,
    path: &Path,
    entity_id: Option<&str>,
) -> anyhow::Result<Document> {
    let entity_id = match entity_id {
        Some(id) => id.to_string(),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive an entity id from {}", path.display()))?,
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let mut document = Document::from_passport_json(entity_id, value)?;
    commit_all(&mut document)?;
    Ok(store.insert(document)?)
}

fn cmd_show(config: &AppConfig, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let tier: Tier = args
        .tier
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid tier: {}", args.tier))?;
    let store = config.document_store()?;
    let projection = disclose(store.as_ref(), &args.entity_id, tier)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&projection)?),
        OutputFormat::Text => print_projection(&projection)?,
    }
    Ok(())
}

fn print_projection(projection: &Projection) -> anyhow::Result<()> {
    println!(
        "Passport {} at {}",
        projection.entity_id.yellow().bold(),
        projection.tier.to_string().cyan()
    );
    if projection.is_empty() {
        println!("  {}", "(nothing disclosed at this tier)".dimmed());
    }
    for (name, section) in &projection.sections {
        println!("\n{} [{}]", name.bold(), section.access_tier.to_string().dimmed());
        for line in serde_json::to_string_pretty(&section.payload)?.lines() {
            println!("  {line}");
        }
    }
    for warning in &projection.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning.message);
    }
    Ok(())
}

fn cmd_verify(config: &AppConfig, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = config.document_store()?;
    let ids = match args.entity_id {
        Some(id) => vec![id],
        None => store.list_ids()?,
    };

    let mut reports = Vec::with_capacity(ids.len());
    for id in &ids {
        let document = store.get(id)?;
        reports.push(verify_document(&document)?);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => reports.iter().for_each(print_report),
    }

    let broken = reports.iter().filter(|r| !r.is_intact()).count();
    if broken > 0 {
        bail!("integrity mismatch in {broken} of {} passport(s)", reports.len());
    }
    Ok(())
}

fn print_report(report: &IntegrityReport) {
    let mark = if report.is_intact() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!(
        "{} {} {}",
        mark,
        report.entity_id.yellow(),
        report.document_hash.short_hex().dimmed()
    );
    for section in &report.sections {
        let status = match section.status {
            SectionStatus::Verified => "verified".green(),
            SectionStatus::Pending => "pending".yellow(),
            SectionStatus::Uncommitted => "uncommitted".dimmed(),
            SectionStatus::Mismatch => "MISMATCH".red().bold(),
        };
        println!("  {:<28} {}", section.section, status);
    }
}

fn cmd_cursor(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    let source_id = &config.ledger.source_id;
    let position = config.cursor_store()?.load(source_id)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "source_id": source_id, "position": position })
        ),
        OutputFormat::Text => match position {
            Some(position) => println!("{} at {}", source_id.bold(), position.to_string().cyan()),
            None => println!("{} {}", source_id.bold(), "not started".dimmed()),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpp_engine::{BackoffConfig, EngineConfig};
    use dpp_ledger::InMemoryLedger;
    use dpp_store::{InMemoryCursorStore, InMemoryDocumentStore};
    use dpp_types::{Position, RawEvent, OPERATION_LOG};
    use serde_json::json;

    fn write_passport(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let passport = json!({
            "factory_registration": {"Access_Tier": "Public", "manufacturer": "Helio"},
            "material_composition": {"Access_Tier": "Tier 1", "silicon_pct": 92},
            "digital_twin_status": {"Access_Tier": "Public", "current_visual_status": "GREEN"},
            "_comment": "dropped"
        });
        fs::write(&path, serde_json::to_string_pretty(&passport).unwrap()).unwrap();
        path
    }

    #[test]
    fn register_uses_file_stem_as_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_passport(dir.path(), "PANEL-7.json");
        let store = InMemoryDocumentStore::new();

        let document = register_file(&store, &path, None).unwrap();
        assert_eq!(document.entity_id, "PANEL-7");
        assert!(!document.sections.contains_key("_comment"));
        assert!(store.exists("PANEL-7").unwrap());

        let report = verify_document(&store.get("PANEL-7").unwrap()).unwrap();
        assert!(report.is_intact());
        assert!(report
            .sections
            .iter()
            .all(|s| s.status == SectionStatus::Pending));
    }

    #[test]
    fn register_with_explicit_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_passport(dir.path(), "passport.json");
        let store = InMemoryDocumentStore::new();
        let document = register_file(&store, &path, Some("P1")).unwrap();
        assert_eq!(document.entity_id, "P1");
    }

    #[test]
    fn register_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_passport(dir.path(), "P1.json");
        let store = InMemoryDocumentStore::new();
        register_file(&store, &path, None).unwrap();
        assert!(register_file(&store, &path, None).is_err());
    }

    #[test]
    fn register_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let store = InMemoryDocumentStore::new();
        assert!(register_file(&store, &path, None).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn registered_passport_discloses_by_tier() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_passport(dir.path(), "P1.json");
        let store = InMemoryDocumentStore::new();
        register_file(&store, &path, None).unwrap();

        let public = disclose(&store, "P1", Tier::Public).unwrap();
        assert!(public.sections.contains_key("factory_registration"));
        assert!(!public.sections.contains_key("material_composition"));

        let tier1 = disclose(&store, "P1", Tier::Tier1).unwrap();
        assert!(tier1.sections.contains_key("material_composition"));
    }

    fn sync_engine(ledger: Arc<InMemoryLedger>) -> (Reconciler, Arc<InMemoryDocumentStore>) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_passport(dir.path(), "P1.json");
        let store = Arc::new(InMemoryDocumentStore::new());
        register_file(store.as_ref(), &path, None).unwrap();

        let config = EngineConfig {
            fetch_backoff: BackoffConfig {
                base_ms: 1,
                max_ms: 2,
                multiplier: 2.0,
                jitter: 0.0,
            },
            ..EngineConfig::default()
        };
        let engine = Reconciler::new(
            ledger,
            store.clone(),
            Arc::new(InMemoryCursorStore::new()),
            config,
        )
        .unwrap();
        (engine, store)
    }

    fn fault(block: u64, event_id: &str) -> RawEvent {
        RawEvent {
            block,
            log_index: 0,
            entity_id: Some("P1".into()),
            event_id: Some(event_id.into()),
            event_type: Some("operation".into()),
            fault_type: Some("overheat".into()),
            severity: Some(2),
            timestamp: Some(1_700_000_000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sync_backs_off_through_ledger_outages() {
        let ledger = Arc::new(InMemoryLedger::new("feed"));
        ledger.push(fault(1, "e1"));
        ledger.fail_next_fetches(2);
        let (mut engine, store) = sync_engine(ledger);

        let (total, cycles) = sync_until_drained(&mut engine, 10).await.unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(total.applied, 1);
        assert_eq!(total.position, Some(Position::new(1, 0)));
        assert_eq!(store.get("P1").unwrap().log(OPERATION_LOG).len(), 1);
    }

    #[tokio::test]
    async fn sync_gives_up_when_the_budget_is_spent() {
        let ledger = Arc::new(InMemoryLedger::new("feed"));
        ledger.fail_next_fetches(5);
        let (mut engine, _) = sync_engine(ledger);

        let err = sync_until_drained(&mut engine, 3).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn accumulate_keeps_latest_position() {
        let mut total = CycleReport::default();
        accumulate(
            &mut total,
            &CycleReport {
                fetched: 3,
                applied: 2,
                duplicates: 1,
                position: Some(Position::new(10, 0)),
                ..CycleReport::default()
            },
        );
        accumulate(
            &mut total,
            &CycleReport {
                fetched: 0,
                ..CycleReport::default()
            },
        );
        assert_eq!(total.fetched, 3);
        assert_eq!(total.applied, 2);
        assert_eq!(total.position, Some(Position::new(10, 0)));
    }
}
