use crate::project::{load_manager, save_manager};
use crate::validation::{parse_specific_culture, validate_output_path};
use resxsync::{SyncOptions as LibSyncOptions, SyncReport};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub root: String,
    pub lang: String,
    pub prune: bool,
    pub no_import: bool,
    pub report_json: Option<String>,
}

fn write_report(path: &str, options: &SyncOptions, reports: &[SyncReport], saved: usize) -> Result<(), String> {
    let payload = json!({
        "root": options.root,
        "lang": options.lang,
        "prune": options.prune,
        "import": !options.no_import,
        "saved_native_files": saved,
        "entities": reports,
    });

    let text = serde_json::to_string_pretty(&payload)
        .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
    std::fs::write(path, text).map_err(|e| format!("Failed to write report JSON '{}': {}", path, e))
}

pub fn run_sync_command(opts: SyncOptions) -> Result<(), String> {
    let culture = parse_specific_culture(&opts.lang)?;
    if let Some(report_path) = &opts.report_json {
        validate_output_path(report_path)?;
    }

    let mut manager = load_manager(&opts.root)?;
    let config = manager.config();
    let options = LibSyncOptions {
        prune_orphans: opts.prune || config.prune_orphans,
        import_targets: !opts.no_import && config.import_interchange_targets,
    };

    let reports = manager
        .synchronize(&culture, options)
        .map_err(|e| format!("Sync failed: {}", e))?;

    for report in &reports {
        println!(
            "{}: {} units, {} added, {} sources updated, {} exported, {} imported, {} orphans{}",
            report.entity,
            report.total,
            report.added,
            report.sources_updated,
            report.targets_exported,
            report.targets_imported,
            report.orphans + report.pruned,
            if report.written { "" } else { " (unchanged)" }
        );
    }

    let saved = save_manager(&mut manager)?;
    let written = reports.iter().filter(|report| report.written).count();
    println!(
        "Synchronized {} entities: {} interchange files written, {} native files saved",
        reports.len(),
        written,
        saved
    );

    if let Some(report_path) = &opts.report_json {
        write_report(report_path, &opts, &reports, saved)?;
        println!("Report JSON written: {}", report_path);
    }

    if reports.len() < manager.entities().len() {
        return Err(format!(
            "{} entities could not be synchronized",
            manager.entities().len() - reports.len()
        ));
    }
    Ok(())
}
