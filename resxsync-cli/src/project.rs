use crate::validation::validate_root;
use resxsync::{CancellationToken, Configuration, ResourceManager};

/// Load every entity below `root`, honoring `<root>/resxsync.json`.
pub fn load_manager(root: &str) -> Result<ResourceManager, String> {
    validate_root(root)?;
    let config = Configuration::discover(root).map_err(|e| format!("Failed to read configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    let mut manager = ResourceManager::new(config);
    manager
        .load(root, &CancellationToken::new())
        .map_err(|e| format!("Failed to load '{}': {}", root, e))?;
    tracing::debug!(
        "{} entities, cultures: {:?}",
        manager.entities().len(),
        manager
            .cultures()
            .iter()
            .map(|culture| culture.to_string_or("neutral"))
            .collect::<Vec<_>>()
    );
    Ok(manager)
}

/// Save every dirty native file, failing if any file could not be written.
pub fn save_manager(manager: &mut ResourceManager) -> Result<usize, String> {
    let outcome = manager.save();
    if !outcome.is_success() {
        let failed: Vec<String> = outcome
            .failed
            .iter()
            .map(|(path, e)| format!("{}: {}", path.display(), e))
            .collect();
        return Err(format!("Failed to save {} file(s): {}", failed.len(), failed.join("; ")));
    }
    Ok(outcome.written.len())
}
