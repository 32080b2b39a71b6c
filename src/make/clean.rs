use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use super::Layout;
use crate::error::Result;

/// Remove generated docs, API stubs and downloaded fixtures. Missing
/// directories are skipped.
pub fn clean(layout: &Layout) -> Result<()> {
    for dir in [
        layout.build_dir(),
        layout.api_dir(),
        layout.data_dir(),
        layout.analysis_dir(),
    ] {
        remove_dir(&dir)?;
    }
    Ok(())
}

pub(crate) fn remove_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            info!("Removed {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_generated_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.build_dir().join("doc")).unwrap();
        std::fs::create_dir_all(layout.api_dir()).unwrap();
        std::fs::create_dir_all(layout.analysis_dir()).unwrap();
        std::fs::create_dir_all(layout.docs_dir().join("source").join("conf")).unwrap();

        clean(&layout).unwrap();

        assert!(!layout.build_dir().exists());
        assert!(!layout.api_dir().exists());
        assert!(!layout.data_dir().exists());
        assert!(layout.docs_dir().join("source").join("conf").exists());
        assert!(layout.tests_dir().exists());
    }

    #[test]
    fn test_clean_without_dirs_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());

        assert!(clean(&layout).is_ok());
        assert!(clean(&layout).is_ok());
    }
}
