// container/workspace.rs
//! Private, single-use scratch directory for one sandboxed run.
//!
//! Layout under `<scratch_root>/sandbox-XXXXXX/`:
//! - `src/<file>`: the submitted source, mounted read-only at `/workspace`.
//! - `build/`: compiler output, writable only while the compile container runs.
//! - `*.cid`: container id files written by `docker run --cidfile`.
//!
//! The directory is removed when the [`Workspace`] is dropped, on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use util::languages::LanguageRecipe;

pub struct Workspace {
    dir: TempDir,
    source_dir: PathBuf,
    build_dir: PathBuf,
}

impl Workspace {
    /// Creates the directory tree and writes `source` under the recipe's file name.
    pub fn create(root: &Path, recipe: &LanguageRecipe, source: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("sandbox-").tempdir_in(root)?;

        let source_dir = dir.path().join("src");
        let build_dir = dir.path().join("build");
        fs::create_dir(&source_dir)?;
        fs::create_dir(&build_dir)?;

        let source_file = source_dir.join(recipe.file_name());
        fs::write(&source_file, source)?;

        // The guest runs as an unprivileged user: it must be able to read the
        // source and, while compiling, write into build/.
        set_mode(dir.path(), 0o755)?;
        set_mode(&source_dir, 0o755)?;
        set_mode(&source_file, 0o644)?;
        set_mode(&build_dir, 0o777)?;

        Ok(Self {
            dir,
            source_dir,
            build_dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Path for a `--cidfile`; docker refuses to overwrite, so one per stage.
    pub fn cidfile(&self, stage: &str) -> PathBuf {
        self.dir.path().join(format!("{stage}.cid"))
    }

    /// Removes the directory now, logging rather than returning any failure.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove sandbox workspace");
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::languages::LanguageRegistry;

    #[test]
    fn writes_source_under_recipe_file_name() {
        let root = tempfile::tempdir().unwrap();
        let registry = LanguageRegistry::builtin();
        let java = registry.resolve("java").unwrap();

        let ws = Workspace::create(root.path(), java, "class Main {}").unwrap();
        let written = fs::read_to_string(ws.source_dir().join("Main.java")).unwrap();
        assert_eq!(written, "class Main {}");
        assert!(ws.build_dir().is_dir());
        assert!(ws.cidfile("run").starts_with(ws.path()));
    }

    #[test]
    fn workspaces_are_private_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let registry = LanguageRegistry::builtin();
        let python = registry.resolve("python").unwrap();

        let a = Workspace::create(root.path(), python, "print(1)").unwrap();
        let b = Workspace::create(root.path(), python, "print(2)").unwrap();
        assert_ne!(a.path(), b.path());

        let a_path = a.path().to_path_buf();
        a.close();
        assert!(!a_path.exists());

        let b_path = b.path().to_path_buf();
        drop(b);
        assert!(!b_path.exists());
    }
}
