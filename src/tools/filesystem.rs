//! File tools confined to a single sandbox directory.
//!
//! Filenames are reduced to their last path component before use. Traversal
//! attempts such as `../../etc/passwd` are not rejected; they are rewritten to
//! `passwd` inside the sandbox. Files registered with [`Sandbox::reserve`]
//! (the demo database when it shares the directory) are off limits.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{failure, ParamType, ParameterSchema, Tool};

/// The only directory file tools may touch.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    reserved: Vec<String>,
}

impl Sandbox {
    /// Open the sandbox, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create sandbox directory: {}", root.display()))?;
        Ok(Self {
            root,
            reserved: Vec::new(),
        })
    }

    /// Hide `path` from the file tools if it lives directly in the sandbox.
    ///
    /// Both the sandbox and the parent of `path` must already exist.
    pub fn reserve(mut self, path: &Path) -> Self {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let inside = match (parent.canonicalize(), self.root.canonicalize()) {
            (Ok(parent), Ok(root)) => parent == root,
            _ => false,
        };
        if let (true, Some(name)) = (inside, path.file_name()) {
            tracing::info!("Reserving {} inside the sandbox", path.display());
            self.reserved.push(name.to_string_lossy().into_owned());
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a requested filename to a path inside the sandbox.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, String> {
        let base = base_name(filename).ok_or_else(|| format!("Invalid filename: {:?}", filename))?;
        if self.is_reserved(base) {
            return Err(format!("File '{}' is not accessible", base));
        }
        Ok(self.root.join(base))
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.reserved.iter().any(|reserved| reserved == name)
    }
}

/// Last component of `filename`, treating both `/` and `\` as separators.
fn base_name(filename: &str) -> Option<&str> {
    let base = filename.trim().rsplit(|c: char| c == '/' || c == '\\').next()?;
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

fn describe_io_error(filename: &str, e: &std::io::Error) -> String {
    match e.kind() {
        ErrorKind::NotFound => format!("File '{}' does not exist", filename),
        _ => e.to_string(),
    }
}

/// Read the contents of a file.
pub struct ReadFile {
    sandbox: Arc<Sandbox>,
}

impl ReadFile {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read contents of a file from the sandbox directory"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().required(
            "filename",
            ParamType::String,
            "Name of the file to read (must be in sandbox directory)",
        )
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let filename = args["filename"].as_str().unwrap_or_default();
        let path = match self.sandbox.resolve(filename) {
            Ok(path) => path,
            Err(e) => return Ok(failure(e)),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(json!({ "success": true, "content": content })),
            Err(e) => Ok(failure(describe_io_error(filename, &e))),
        }
    }
}

/// Write content to a file, replacing any existing content.
pub struct WriteFile {
    sandbox: Arc<Sandbox>,
}

impl WriteFile {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the sandbox directory"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required("filename", ParamType::String, "Name of the file to write")
            .required("content", ParamType::String, "Content to write to the file")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let filename = args["filename"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();
        let path = match self.sandbox.resolve(filename) {
            Ok(path) => path,
            Err(e) => return Ok(failure(e)),
        };

        match tokio::fs::write(&path, content).await {
            Ok(()) => {
                tracing::info!("Wrote {} bytes to {}", content.len(), path.display());
                Ok(json!({ "success": true, "path": path.to_string_lossy() }))
            }
            Err(e) => Ok(failure(describe_io_error(filename, &e))),
        }
    }
}

/// List the files in the sandbox.
pub struct ListFiles {
    sandbox: Arc<Sandbox>,
}

impl ListFiles {
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List all files in the sandbox directory"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        let mut entries = match tokio::fs::read_dir(self.sandbox.root()).await {
            Ok(entries) => entries,
            Err(e) => return Ok(failure(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.sandbox.is_reserved(&name) {
                files.push(name);
            }
        }
        files.sort();

        Ok(json!({ "success": true, "files": files }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Database, QueryDatabase};
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, Arc<Sandbox>) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::open(dir.path().join("sandbox")).unwrap();
        (dir, Arc::new(sandbox))
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("notes.txt"), Some("notes.txt"));
        assert_eq!(base_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(base_name("/abs/path/report.md"), Some("report.md"));
        assert_eq!(base_name("..\\..\\boot.ini"), Some("boot.ini"));
        assert_eq!(base_name(".."), None);
        assert_eq!(base_name("dir/"), None);
        assert_eq!(base_name(""), None);
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, sandbox) = sandbox();
        let write = WriteFile::new(Arc::clone(&sandbox));
        let read = ReadFile::new(Arc::clone(&sandbox));
        let content = "Tokyo: 15°C, Partly cloudy\nsecond line\n";

        let written = write
            .execute(json!({"filename": "weather.txt", "content": content}))
            .await
            .unwrap();
        assert_eq!(written["success"], true);

        let read_back = read
            .execute(json!({"filename": "weather.txt"}))
            .await
            .unwrap();
        assert_eq!(read_back["success"], true);
        assert_eq!(read_back["content"], content);
    }

    #[tokio::test]
    async fn traversal_is_confined_to_the_sandbox() {
        let (dir, sandbox) = sandbox();
        let write = WriteFile::new(Arc::clone(&sandbox));

        let result = write
            .execute(json!({"filename": "../../escape.txt", "content": "gotcha"}))
            .await
            .unwrap();

        assert_eq!(result["success"], true);
        assert!(sandbox.root().join("escape.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(
            std::fs::read_to_string(sandbox.root().join("escape.txt")).unwrap(),
            "gotcha"
        );
    }

    #[tokio::test]
    async fn reading_a_missing_file_is_a_failure_value() {
        let (_dir, sandbox) = sandbox();
        let read = ReadFile::new(sandbox);

        let result = read.execute(json!({"filename": "users.txt"})).await.unwrap();

        assert_eq!(result["success"], false);
        assert_eq!(result["error"], "File 'users.txt' does not exist");
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_without_touching_disk() {
        let (_dir, sandbox) = sandbox();
        let write = WriteFile::new(Arc::clone(&sandbox));

        let result = write
            .execute(json!({"filename": "..", "content": "x"}))
            .await
            .unwrap();

        assert_eq!(result["success"], false);
        assert!(std::fs::read_dir(sandbox.root()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn database_sharing_the_sandbox_cannot_be_clobbered() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sandbox");
        let db_path = root.join("demo.db");
        let database = Arc::new(Database::open(&db_path).unwrap());
        let sandbox = Arc::new(Sandbox::open(&root).unwrap().reserve(&db_path));
        let query = QueryDatabase::new(Arc::clone(&database));
        let sql = json!({"query": "SELECT COUNT(*) AS n FROM users"});

        let written = WriteFile::new(Arc::clone(&sandbox))
            .execute(json!({"filename": "demo.db", "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(written["success"], false);

        let read = ReadFile::new(Arc::clone(&sandbox))
            .execute(json!({"filename": "../demo.db"}))
            .await
            .unwrap();
        assert_eq!(read["success"], false);

        let listed = ListFiles::new(sandbox).execute(json!({})).await.unwrap();
        assert_eq!(listed["files"], json!([]));

        let result = query.execute(sql).await.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["results"][0]["n"], 4);
        drop(database);
        assert!(Database::open(&db_path).is_ok());
    }

    #[test]
    fn reserve_ignores_paths_outside_the_sandbox() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::open(dir.path().join("sandbox"))
            .unwrap()
            .reserve(&dir.path().join("demo.db"));

        assert!(sandbox.resolve("demo.db").is_ok());
    }

    #[tokio::test]
    async fn list_files_is_sorted() {
        let (_dir, sandbox) = sandbox();
        std::fs::write(sandbox.root().join("b.txt"), "b").unwrap();
        std::fs::write(sandbox.root().join("a.txt"), "a").unwrap();

        let result = ListFiles::new(sandbox).execute(json!({})).await.unwrap();

        assert_eq!(result, json!({"success": true, "files": ["a.txt", "b.txt"]}));
    }
}
