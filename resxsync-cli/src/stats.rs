use resxsync::{CultureKey, ResourceManager};
use serde_json::json;

#[derive(Default)]
struct LangStats {
    entities: usize,
    files: usize,
    entries: usize,
    missing: usize,
    invariant_mismatches: usize,
}

impl LangStats {
    fn completion_percent(&self) -> f64 {
        if self.entries == 0 {
            100.0
        } else {
            let translated = self.entries - self.missing;
            (translated as f64) * 100.0 / (self.entries as f64)
        }
    }
}

fn collect(manager: &ResourceManager, culture: &CultureKey) -> LangStats {
    let mut stats = LangStats::default();
    for entity in manager.entities() {
        stats.entities += 1;
        if entity.language(culture).is_some() {
            stats.files += 1;
        }
        stats.entries += entity.entries().len();
        stats.missing += entity.missing_translations(culture).len();
        stats.invariant_mismatches += entity.invariant_mismatches(culture).len();
    }
    stats
}

pub fn print_stats(manager: &ResourceManager, cultures: &[CultureKey], json_output: bool) {
    let cultures: Vec<CultureKey> = if cultures.is_empty() {
        manager
            .cultures()
            .into_iter()
            .filter(|culture| !culture.is_neutral())
            .collect()
    } else {
        cultures.to_vec()
    };
    let entries: usize = manager.entities().iter().map(|e| e.entries().len()).sum();
    let duplicate_keys = manager.duplicate_keys();

    if json_output {
        let per_lang: Vec<_> = cultures
            .iter()
            .map(|culture| {
                let stats = collect(manager, culture);
                json!({
                    "language": culture.name(),
                    "files": stats.files,
                    "entries": stats.entries,
                    "missing": stats.missing,
                    "invariant_mismatches": stats.invariant_mismatches,
                    "completion_percent": (stats.completion_percent() * 100.0).round() / 100.0,
                })
            })
            .collect();
        let body = json!({
            "summary": {
                "entities": manager.entities().len(),
                "entries": entries,
                "languages": cultures.len(),
                "duplicate_keys": duplicate_keys,
            },
            "languages": per_lang,
        });
        match serde_json::to_string_pretty(&body) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
        return;
    }

    println!("=== Stats ===");
    println!("Entities: {}", manager.entities().len());
    println!("Entries: {}", entries);
    println!("Languages: {}", cultures.len());
    println!("Duplicate keys: {}", duplicate_keys.len());
    for duplicate in &duplicate_keys {
        println!(
            "  {}.{} in {}",
            duplicate.project,
            duplicate.key,
            duplicate.entities.join(", ")
        );
    }

    for culture in &cultures {
        let stats = collect(manager, culture);
        println!("\nLanguage: {}", culture.name().unwrap_or_default());
        println!("  Files: {}/{}", stats.files, stats.entities);
        println!("  Missing translations: {}", stats.missing);
        println!("  Invariant mismatches: {}", stats.invariant_mismatches);
        println!("  Completion: {:.2}%", stats.completion_percent());
    }
}
