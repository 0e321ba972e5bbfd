//! Files picked by the user for one upload.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

const SHAPEFILE_REQUIRED_SIDECARS: &[&str] = &["shx", "prj"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub async fn read(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("path has no usable file name: {}", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read selected file '{}'", path.display()))?;
        Ok(Self::new(name, bytes))
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
}

impl FileSelection {
    pub fn new(files: Vec<SelectedFile>) -> Self {
        Self { files }
    }

    pub async fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(SelectedFile::read(path).await?);
        }
        Ok(Self { files })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn into_files(self) -> Vec<SelectedFile> {
        self.files
    }

    /// Sidecar extensions missing for a shapefile selection.
    ///
    /// Empty when no `.shp` is selected; the backend rejects a `.shp` sent
    /// without its `.shx` and `.prj`.
    pub fn missing_shapefile_sidecars(&self) -> Vec<&'static str> {
        let extensions: Vec<String> = self.files.iter().filter_map(|f| f.extension()).collect();
        if !extensions.iter().any(|ext| ext == "shp") {
            return Vec::new();
        }
        SHAPEFILE_REQUIRED_SIDECARS
            .iter()
            .copied()
            .filter(|required| !extensions.iter().any(|ext| ext == required))
            .collect()
    }
}
