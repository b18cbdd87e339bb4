use crate::{game::GameId, host::RemoteFile};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

const API_BASE: &str = "https://api.nexusmods.com/v1";
const USER_AGENT: &str = concat!("smpc-modder/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct FilesResponse {
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    file_id: u64,
    file_name: String,
    #[serde(default)]
    version: Option<String>,
    category_id: u32,
    uploaded_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLink {
    pub name: String,
    pub short_name: String,
    #[serde(rename = "URI")]
    pub uri: String,
}

/// Minimal Nexus Mods API client. Download links need a premium key.
pub struct NexusClient {
    agent: ureq::Agent,
    api_key: String,
}

impl NexusClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(10))
            .build();
        Self {
            agent,
            api_key: api_key.into(),
        }
    }

    fn get(&self, url: &str) -> Result<ureq::Response> {
        self.agent
            .get(url)
            .set("User-Agent", USER_AGENT)
            .set("apikey", &self.api_key)
            .call()
            .with_context(|| format!("request {url}"))
    }

    pub fn mod_files(&self, game: GameId, mod_id: u32) -> Result<Vec<RemoteFile>> {
        let url = format!("{API_BASE}/games/{game}/mods/{mod_id}/files.json");
        let body = self.get(&url)?.into_string().context("read files.json")?;
        parse_files(&body)
    }

    pub fn download_links(&self, game: GameId, mod_id: u32, file_id: u64) -> Result<Vec<DownloadLink>> {
        let url = format!("{API_BASE}/games/{game}/mods/{mod_id}/files/{file_id}/download_link.json");
        self.get(&url)?
            .into_json()
            .context("decode download_link.json")
    }

    /// Downloads `file` into `dir` and returns the local path.
    pub fn download(&self, game: GameId, mod_id: u32, file: &RemoteFile, dir: &Path) -> Result<PathBuf> {
        let links = self.download_links(game, mod_id, file.file_id)?;
        let link = links
            .first()
            .with_context(|| format!("no download link for file {}", file.file_id))?;
        fs::create_dir_all(dir).context("create downloads dir")?;
        let path = dir.join(&file.name);
        let temp = dir.join(format!("{}.part", file.name));

        info!(%game, mod_id, file_id = file.file_id, cdn = %link.short_name, "downloading");
        let response = self
            .agent
            .get(&link.uri)
            .set("User-Agent", USER_AGENT)
            .call()
            .context("download file")?;
        let mut reader = response.into_reader();
        let mut out = File::create(&temp).context("create download file")?;
        io::copy(&mut reader, &mut out).context("write download file")?;
        drop(out);
        fs::rename(&temp, &path).context("finalize download")?;
        Ok(path)
    }
}

pub fn parse_files(body: &str) -> Result<Vec<RemoteFile>> {
    let response: FilesResponse = serde_json::from_str(body).context("parse files.json")?;
    Ok(response
        .files
        .into_iter()
        .map(|file| RemoteFile {
            file_id: file.file_id,
            name: file.file_name,
            version: file.version,
            category_id: file.category_id,
            uploaded_timestamp: file.uploaded_timestamp,
        })
        .collect())
}
