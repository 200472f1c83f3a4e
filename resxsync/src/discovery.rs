//! Finding native resource files below a root folder and grouping them into
//! entities.
//!
//! Discovery is a free function so it can run on a worker thread; the
//! [`ResourceManager`](crate::ResourceManager) consumes the result.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use ignore::WalkBuilder;

use crate::{
    config::Configuration,
    culture::CultureKey,
    error::Error,
    formats::FormatType,
    host::CancellationToken,
};

const PROJECT_EXTENSIONS: [&str; 3] = ["csproj", "vbproj", "fsproj"];
const SKIPPED_DIRECTORIES: [&str; 2] = ["bin", "obj"];

/// One native resource file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub project: String,
    /// Directory relative to the discovery root.
    pub directory: PathBuf,
    pub base_name: String,
    pub culture: CultureKey,
    pub extension: String,
}

impl ProjectFile {
    /// Describes `path`, or returns `None` if it is not a native resource file.
    pub fn new(root: &Path, path: &Path, project: &str) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let (base_name, culture, extension) = split_file_name(file_name)?;
        let directory = path
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Some(Self {
            path: path.to_path_buf(),
            project: project.to_string(),
            directory,
            base_name,
            culture,
            extension,
        })
    }

    /// `relative/dir/Base`, with `/` separators on every platform.
    pub fn unique_name(&self) -> String {
        unique_name(&self.directory, &self.base_name)
    }
}

/// All files of one entity: same project, directory, base name and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub project: String,
    pub directory: PathBuf,
    pub base_name: String,
    pub extension: String,
    pub files: Vec<ProjectFile>,
}

impl FileGroup {
    pub fn unique_name(&self) -> String {
        unique_name(&self.directory, &self.base_name)
    }

    pub fn neutral_file(&self) -> Option<&ProjectFile> {
        self.files.iter().find(|file| file.culture.is_neutral())
    }
}

fn unique_name(directory: &Path, base_name: &str) -> String {
    let mut parts: Vec<String> = directory
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.push(base_name.to_string());
    parts.join("/")
}

/// Splits `<base>[.<culture>].<ext>`.
///
/// The middle part is only taken as a culture if it parses as one; otherwise
/// it stays part of the base name.
///
/// # Example
/// ```rust
/// use resxsync::discovery::split_file_name;
/// let (base, culture, ext) = split_file_name("Resources.de-DE.resx").unwrap();
/// assert_eq!((base.as_str(), culture.to_string().as_str(), ext.as_str()), ("Resources", ".de-DE", "resx"));
/// let (base, culture, _) = split_file_name("My.Resources.resw").unwrap();
/// assert_eq!(base, "My.Resources");
/// assert!(culture.is_neutral());
/// assert!(split_file_name("Resources.Designer.cs").is_none());
/// ```
pub fn split_file_name(file_name: &str) -> Option<(String, CultureKey, String)> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || FormatType::from_path(file_name) != Some(FormatType::Resx) {
        return None;
    }

    if let Some((base, suffix)) = stem.rsplit_once('.') {
        if !base.is_empty() && CultureKey::is_culture_name(suffix) {
            if let Ok(culture) = CultureKey::parse(suffix) {
                return Some((base.to_string(), culture, extension.to_string()));
            }
        }
    }

    Some((stem.to_string(), CultureKey::neutral(), extension.to_string()))
}

/// Walks `root` and returns every native resource file, sorted by path.
///
/// Hidden directories, `bin`/`obj` and paths matching the configured file
/// filter are skipped, as are files excluded by `.gitignore`.
pub fn discover_files(
    root: &Path,
    config: &Configuration,
    cancel: &CancellationToken,
) -> Result<Vec<ProjectFile>, Error> {
    if !root.is_dir() {
        return Err(Error::invalid_input(format!(
            "`{}` is not a directory",
            root.display()
        )));
    }

    let filter = config.file_filter_regex()?;
    let fallback_project = root_project_name(root);
    let mut projects: HashMap<PathBuf, String> = HashMap::new();
    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .ignore(true)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry.depth() > 0
                && SKIPPED_DIRECTORIES
                    .iter()
                    .any(|skipped| entry.file_name().eq_ignore_ascii_case(skipped)))
        })
        .build();

    for entry in walker {
        cancel.check()?;

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if let Some(filter) = &filter {
            let relative = path.strip_prefix(root).unwrap_or(path);
            let relative = relative.to_string_lossy().replace('\\', "/");
            if filter.is_match(&relative) {
                tracing::debug!("{} excluded by file filter", relative);
                continue;
            }
        }

        let Some(directory) = path.parent() else {
            continue;
        };
        let project = projects
            .entry(directory.to_path_buf())
            .or_insert_with(|| find_project_name(root, directory, &fallback_project))
            .clone();

        if let Some(file) = ProjectFile::new(root, path, &project) {
            tracing::debug!("found {} ({})", file.path.display(), file.culture.to_string_or("neutral"));
            files.push(file);
        }
    }

    tracing::info!("discovered {} resource files in {}", files.len(), root.display());
    Ok(files)
}

/// Groups files into entities, keeping discovery order.
///
/// Base names and extensions compare case-insensitively.
pub fn group_files(files: Vec<ProjectFile>) -> Vec<FileGroup> {
    let mut groups: BTreeMap<(String, PathBuf, String, String), FileGroup> = BTreeMap::new();
    for file in files {
        let key = (
            file.project.clone(),
            file.directory.clone(),
            file.base_name.to_lowercase(),
            file.extension.to_lowercase(),
        );
        groups
            .entry(key)
            .or_insert_with(|| FileGroup {
                project: file.project.clone(),
                directory: file.directory.clone(),
                base_name: file.base_name.clone(),
                extension: file.extension.clone(),
                files: Vec::new(),
            })
            .files
            .push(file);
    }

    groups
        .into_values()
        .map(|mut group| {
            group.files.sort_by(|a, b| a.culture.cmp(&b.culture));
            group
        })
        .collect()
}

// Stem of the nearest project file between `directory` and `root`.
fn find_project_name(root: &Path, directory: &Path, fallback: &str) -> String {
    for dir in directory.ancestors() {
        if let Some(name) = project_file_in(dir) {
            return name;
        }
        if dir == root || !dir.starts_with(root) {
            break;
        }
    }
    fallback.to_string()
}

fn project_file_in(dir: &Path) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| PROJECT_EXTENSIONS.iter().any(|p| p.eq_ignore_ascii_case(e)))
        })
        .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
        .collect();
    names.sort();
    names.into_iter().next()
}

fn root_project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Resources".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<root/>").unwrap();
    }

    #[test]
    fn test_split_file_name() {
        let (base, culture, ext) = split_file_name("Strings.zh-Hans.resw").unwrap();
        assert_eq!(base, "Strings");
        assert_eq!(culture.name(), Some("zh-Hans"));
        assert_eq!(ext, "resw");

        let (base, culture, _) = split_file_name("Resources.resx").unwrap();
        assert_eq!(base, "Resources");
        assert!(culture.is_neutral());

        let (base, culture, _) = split_file_name("Form1.Designer.resx").unwrap();
        assert_eq!(base, "Form1.Designer");
        assert!(culture.is_neutral());

        assert!(split_file_name(".resx").is_none());
        assert!(split_file_name("Resources.xlf").is_none());
    }

    #[test]
    fn test_discover_groups_and_projects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("App.csproj"), "").unwrap();
        touch(root, "Properties/Resources.resx");
        touch(root, "Properties/Resources.de.resx");
        touch(root, "Properties/Resources.fr.resx");
        touch(root, "Lib/Lib.csproj");
        touch(root, "Lib/Strings.resx");
        touch(root, "bin/Debug/Resources.resx");
        touch(root, "obj/Resources.resx");
        touch(root, ".hidden/Resources.resx");

        let files = discover_files(root, &Configuration::default(), &CancellationToken::new()).unwrap();
        assert_eq!(files.len(), 4);

        let groups = group_files(files);
        let names: Vec<(String, String)> = groups
            .iter()
            .map(|g| (g.project.clone(), g.unique_name()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("App".to_string(), "Properties/Resources".to_string()),
                ("Lib".to_string(), "Lib/Strings".to_string()),
            ]
        );

        let cultures: Vec<String> = groups[0]
            .files
            .iter()
            .map(|f| f.culture.to_string_or("neutral"))
            .collect();
        assert_eq!(cultures, vec!["neutral", ".de", ".fr"]);
        assert!(groups[0].neutral_file().is_some());
    }

    #[test]
    fn test_file_filter_excludes_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Tests/Resources.resx");
        touch(dir.path(), "Src/Resources.resx");
        let config = Configuration {
            file_filter: Some("^Tests/".to_string()),
            ..Default::default()
        };
        let files = discover_files(dir.path(), &config, &CancellationToken::new()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].unique_name(), "Src/Resources");
    }

    #[test]
    fn test_discover_honors_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Resources.resx");
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            discover_files(dir.path(), &Configuration::default(), &token),
            Err(Error::Canceled)
        ));
    }
}
