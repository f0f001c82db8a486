//! Command line renderer (jasperstarter-compatible)
//!
//! Each render runs in its own temporary work directory holding the inline
//! data file and the produced `report.<ext>`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use reportdesk_core::models::{DataSourceKind, DbConnection, ResolvedData};
use reportdesk_core::{CoreError, RenderRequest, RenderedReport};

use super::{RenderError, ReportRenderer};

/// Base name of the output file inside the work directory
const OUTPUT_STEM: &str = "report";

const DATA_FILE: &str = "data.json";

/// Renderer that shells out to a Jasper command line tool
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for one render into `work_dir`.
    pub fn build_args(&self, request: &RenderRequest, work_dir: &Path) -> Result<Vec<OsString>, RenderError> {
        let mut args: Vec<OsString> = vec![
            "process".into(),
            request.template.clone().into(),
            "-f".into(),
            request.format.as_str().into(),
            "-o".into(),
            work_dir.join(OUTPUT_STEM).into(),
            "-r".into(),
            request.resource_dir.clone().into(),
        ];

        match &request.data {
            ResolvedData::Inline(_) => {
                args.extend(["-t".into(), "json".into(), "--data-file".into()]);
                args.push(work_dir.join(DATA_FILE).into());
            }
            ResolvedData::Database(conn) => args.extend(database_args(conn)?),
        }

        let params = request.parameter_pairs();
        if !params.is_empty() {
            args.push("-P".into());
            args.extend(params.into_iter().map(|(k, v)| OsString::from(format!("{k}={v}"))));
        }

        Ok(args)
    }
}

fn database_args(conn: &DbConnection) -> Result<Vec<OsString>, RenderError> {
    let kind = DataSourceKind::parse(&conn.driver)
        .map_err(|_| RenderError::UnsupportedDriver(conn.driver.clone()))?;

    let mut args: Vec<OsString> = Vec::new();
    let mut push = |flag: &str, value: Option<String>| {
        if let Some(value) = value {
            args.push(flag.into());
            args.push(value.into());
        }
    };

    match kind {
        DataSourceKind::Mysql | DataSourceKind::Pgsql | DataSourceKind::Oracle => {
            let db_type = match kind {
                DataSourceKind::Mysql => "mysql",
                DataSourceKind::Pgsql => "postgres",
                _ => "oracle",
            };
            push("-t", Some(db_type.to_owned()));
            push("-H", conn.host.clone());
            push("--db-port", conn.port.map(|p| p.to_string()));
            if kind == DataSourceKind::Oracle {
                push("--db-sid", conn.database.clone());
            } else {
                push("-n", conn.database.clone());
            }
        }
        DataSourceKind::Sqlsrv => {
            let host = conn.host.as_deref().unwrap_or("localhost");
            let port = conn.port.unwrap_or(1433);
            let mut url = format!("jdbc:sqlserver://{host}:{port}");
            if let Some(db) = &conn.database {
                url.push_str(&format!(";databaseName={db}"));
            }
            push("-t", Some("generic".to_owned()));
            push("--db-driver", Some("com.microsoft.sqlserver.jdbc.SQLServerDriver".to_owned()));
            push("--db-url", Some(url));
        }
        DataSourceKind::Sqlite => {
            let database = conn.database.clone().unwrap_or_default();
            push("-t", Some("generic".to_owned()));
            push("--db-driver", Some("org.sqlite.JDBC".to_owned()));
            push("--db-url", Some(format!("jdbc:sqlite:{database}")));
        }
        DataSourceKind::Json | DataSourceKind::Array => {
            return Err(RenderError::UnsupportedDriver(conn.driver.clone()));
        }
    }

    push("-u", conn.username.clone());
    push("-p", conn.password.clone());
    Ok(args)
}

/// Command line for logs, with the password value masked.
fn redacted(args: &[OsString]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("****".to_string());
            mask_next = false;
            continue;
        }
        let text = arg.to_string_lossy().into_owned();
        mask_next = text == "-p";
        out.push(text);
    }
    out.join(" ")
}

/// Find `report.<ext>` in the work directory, preferring `preferred`.
async fn read_output(work_dir: &Path, preferred: &str) -> Result<RenderedReport, RenderError> {
    let mut found: Option<(PathBuf, String)> = None;
    let mut entries = tokio::fs::read_dir(work_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let stem = path.file_stem().and_then(|s| s.to_str());
        let ext = path.extension().and_then(|s| s.to_str());
        if let (Some(OUTPUT_STEM), Some(ext)) = (stem, ext) {
            let is_preferred = ext.eq_ignore_ascii_case(preferred);
            let ext = ext.to_owned();
            found = Some((path, ext));
            if is_preferred {
                break;
            }
        }
    }

    let (path, extension) = found.ok_or(RenderError::NoOutput)?;
    let bytes = tokio::fs::read(&path).await?;
    Ok(RenderedReport { bytes, extension })
}

#[async_trait]
impl ReportRenderer for CommandRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedReport, RenderError> {
        let work_dir = tempfile::Builder::new()
            .prefix("reportdesk-render-")
            .tempdir()?;

        if let ResolvedData::Inline(data) = &request.data {
            let bytes = serde_json::to_vec(data).map_err(|e| CoreError::json("inline data", e))?;
            tokio::fs::write(work_dir.path().join(DATA_FILE), bytes).await?;
        }

        let args = self.build_args(&request, work_dir.path())?;
        if request.debug {
            tracing::info!(
                program = %self.program.display(),
                args = %redacted(&args),
                "running renderer"
            );
        } else {
            tracing::debug!(program = %self.program.display(), "running renderer");
        }

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(work_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    RenderError::EngineMissing(self.program.display().to_string())
                }
                _ => RenderError::Io(e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if request.debug {
            tracing::info!(
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %stderr,
                "renderer output"
            );
        }

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        read_output(work_dir.path(), request.format.as_str()).await
    }
}
