use resxsync::{CultureKey, FormatType};
use std::path::Path;

/// Validate the root folder exists and is a directory
pub fn validate_root(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("Root folder does not exist: {}", path));
    }

    if !path_obj.is_dir() {
        return Err(format!("Root is not a directory: {}", path));
    }

    Ok(())
}

/// Validate file path exists and is readable
pub fn validate_file_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("File does not exist: {}", path));
    }

    if !path_obj.is_file() {
        return Err(format!("Path is not a file: {}", path));
    }

    Ok(())
}

/// Validate output directory exists or can be created
pub fn validate_output_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if let Some(parent) = path_obj.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Err(format!("Cannot create output directory: {}", e));
            }
        }
    }

    Ok(())
}

/// Validate the path has an extension of `format`
pub fn validate_format(path: &str, format: FormatType) -> Result<(), String> {
    if FormatType::from_path(path) != Some(format) {
        return Err(format!(
            "Expected a {} file (.{}): {}",
            format,
            format.extensions().join(", ."),
            path
        ));
    }
    Ok(())
}

/// Parse a culture argument. The neutral culture is rejected.
pub fn parse_specific_culture(lang: &str) -> Result<CultureKey, String> {
    let culture = CultureKey::parse(lang).map_err(|e| e.to_string())?;
    if culture.is_neutral() {
        return Err("A specific culture is required, e.g. `de` or `fr-FR`".to_string());
    }
    Ok(culture)
}

/// Parse a list of culture arguments.
pub fn parse_cultures(langs: &[String]) -> Result<Vec<CultureKey>, String> {
    langs.iter().map(|lang| parse_specific_culture(lang)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_specific_culture() {
        assert_eq!(parse_specific_culture("de-de").unwrap().name(), Some("de-DE"));
        assert!(parse_specific_culture("").is_err());
        assert!(parse_specific_culture("not a culture").is_err());
    }

    #[test]
    fn test_validate_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_root(dir.path().to_str().unwrap()).is_ok());
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "").unwrap();
        assert!(validate_root(file.to_str().unwrap()).is_err());
        assert!(validate_root(dir.path().join("missing").to_str().unwrap()).is_err());
    }

    #[test]
    fn test_validate_output_path_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("out.csv");
        validate_output_path(output.to_str().unwrap()).unwrap();
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format("out/table.csv", FormatType::Csv).is_ok());
        assert!(validate_format("TABLE.CSV", FormatType::Csv).is_ok());
        let err = validate_format("table.xlsx", FormatType::Csv).unwrap_err();
        assert!(err.starts_with("Expected a csv file (.csv)"), "{}", err);
        assert!(validate_format("Resources.de.xlf", FormatType::Csv).is_err());
    }
}
