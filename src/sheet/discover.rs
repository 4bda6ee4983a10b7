use std::path::{Component, Path, PathBuf};

use super::types::{SheetKind, SheetSource};
use crate::error::{CompileError, Result};

/// Folder holding ENUM sheets
pub const DIR_ENUMS: &str = "enums";
/// Folder holding KV sheets
pub const DIR_KVS: &str = "kvs";

/// Directories never scanned for sheets
pub const IGNORED_DIRS: &[&str] = &[".vscode", ".git", "_log", "__Temps", "__Datas"];

/// File extensions the readers understand
pub const SHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods", "csv"];

/// Classify a sheet file by the reserved folder it lives under.
pub fn classify(root: &Path, path: &Path) -> SheetKind {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut kind = SheetKind::Data;
    if let Some(parent) = relative.parent() {
        for component in parent.components() {
            if let Component::Normal(name) = component {
                if name.eq_ignore_ascii_case(DIR_ENUMS) {
                    kind = SheetKind::Enum;
                } else if name.eq_ignore_ascii_case(DIR_KVS) {
                    kind = SheetKind::Kv;
                }
            }
        }
    }
    kind
}

/// Find every sheet file under `root`, sorted by path.
pub fn discover_workspace(root: &Path) -> Result<Vec<SheetSource>> {
    if !root.is_dir() {
        return Err(CompileError::read_error(format!(
            "Workspace is not a directory: {}",
            root.display()
        )));
    }

    let pattern = root.join("**").join("*");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| CompileError::read_error(format!("Invalid workspace pattern: {}", e)))?;

    let mut sources: Vec<SheetSource> = Vec::new();
    for entry in entries {
        let path: PathBuf = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("skipping unreadable workspace entry: {}", e);
                continue;
            }
        };
        if !path.is_file() || is_ignored(root, &path) || !is_sheet_file(&path) {
            continue;
        }
        let kind = classify(root, &path);
        sources.push(SheetSource {
            path,
            kind,
            anchor: None,
        });
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

fn is_ignored(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|d| name == *d),
        _ => false,
    })
}

fn is_sheet_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    // Office lock files
    if name.starts_with("~$") {
        return false;
    }
    path.extension()
        .map(|ext| {
            SHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_reserved_folder() {
        let root = Path::new("/ws");
        assert_eq!(classify(root, Path::new("/ws/Player.xlsx")), SheetKind::Data);
        assert_eq!(classify(root, Path::new("/ws/enums/EPlayerType.csv")), SheetKind::Enum);
        assert_eq!(classify(root, Path::new("/ws/game/kvs/Const.xlsx")), SheetKind::Kv);
        assert_eq!(classify(root, Path::new("/ws/enums.xlsx")), SheetKind::Data);
    }

    #[test]
    fn test_discover_skips_ignored_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("enums")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("Player.csv"), "a\n").unwrap();
        std::fs::write(root.join("enums/EPlayerType.csv"), "a\n").unwrap();
        std::fs::write(root.join(".git/Hidden.csv"), "a\n").unwrap();
        std::fs::write(root.join("notes.txt"), "a\n").unwrap();
        std::fs::write(root.join("~$Player.xlsx"), "a\n").unwrap();

        let sources = discover_workspace(root).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| (s.path.file_name().unwrap().to_string_lossy().to_string(), s.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Player.csv".to_string(), SheetKind::Data),
                ("EPlayerType.csv".to_string(), SheetKind::Enum),
            ]
        );
    }
}
