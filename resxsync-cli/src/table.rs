use crate::project::{load_manager, save_manager};
use crate::validation::{parse_cultures, validate_file_path, validate_format, validate_output_path};
use resxsync::{FormatType, ResourceScope, export_csv, import_csv};
use std::fs::File;
use std::io::BufWriter;

pub fn run_export_command(root: &str, output: &str, langs: &[String]) -> Result<(), String> {
    let cultures = parse_cultures(langs)?;
    validate_format(output, FormatType::Csv)?;
    validate_output_path(output)?;
    let manager = load_manager(root)?;

    let mut scope = ResourceScope::all(&manager);
    if !cultures.is_empty() {
        scope = scope.with_languages(&cultures);
    }

    let file = File::create(output).map_err(|e| format!("Cannot create '{}': {}", output, e))?;
    export_csv(&manager, &scope, BufWriter::new(file)).map_err(|e| format!("Export failed: {}", e))?;
    println!("Exported {} entries to {}", scope.entries.len(), output);
    Ok(())
}

pub fn run_import_command(root: &str, input: &str) -> Result<(), String> {
    validate_format(input, FormatType::Csv)?;
    validate_file_path(input)?;
    let mut manager = load_manager(root)?;

    let file = File::open(input).map_err(|e| format!("Cannot open '{}': {}", input, e))?;
    let report = import_csv(&mut manager, file).map_err(|e| format!("Import failed: {}", e))?;
    let saved = save_manager(&mut manager)?;

    println!(
        "Imported {} rows ({} unchanged, {} unknown, {} failed), {} files saved",
        report.applied, report.unchanged, report.unknown, report.failed, saved
    );
    if report.failed > 0 {
        return Err(format!("{} rows could not be applied", report.failed));
    }
    Ok(())
}
