use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::info;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::flow::snapshot::{Edge, Node, Snapshot, Viewport};

// The JSON object crossing the storage and import/export boundary. `nodes`
// and `edges` must be present as sequences; a missing viewport defaults to
// the origin at zoom 1. Unknown keys are ignored.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlowFile {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl FlowFile {
    pub fn from_runtime(snapshot: &Snapshot, viewport: Viewport) -> Self {
        FlowFile {
            nodes: snapshot.nodes.clone(),
            edges: snapshot.edges.clone(),
            viewport,
        }
    }

    /// Convert a parsed FlowFile into runtime structures.
    ///
    /// This intentionally consumes `self` to avoid cloning the node and edge
    /// buffers. Keeping the existing API preserves behavior; allow clippy's
    /// naming lint.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_runtime(self) -> (Snapshot, Viewport) {
        (Snapshot { nodes: self.nodes, edges: self.edges }, self.viewport)
    }
}

// Validate raw import text. On any shape problem the caller gets a format
// error and must apply nothing.
pub fn parse_flow_file(text: &str) -> Result<FlowFile> {
    match serde_json::from_str::<FlowFile>(text) {
        Ok(flow) => Ok(flow),
        Err(e) => Err(anyhow!("invalid flow file: {}", e)),
    }
}

pub fn flow_file_to_string(flow: &FlowFile) -> Result<String> {
    Ok(serde_json::to_string_pretty(flow)?)
}

// Named flow slots in one directory, written atomically.
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    pub fn new(dir: PathBuf) -> Self {
        SlotStore { dir }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn slot_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn save(&self, name: &str, flow: &FlowFile) -> Result<PathBuf> {
        if name.is_empty() {
            return Err(anyhow!("empty slot name"));
        }
        self.ensure_dir()?;
        let s = flow_file_to_string(flow)?;
        let path = self.slot_path(name);
        atomic_write(&path, s.as_bytes())?;
        info!("saved flow slot {}", path.display());
        Ok(path)
    }

    // Timestamped slot for point-in-time checkpoints
    pub fn save_checkpoint(&self, flow: &FlowFile) -> Result<PathBuf> {
        let now = OffsetDateTime::now_utc();
        let fmt = format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
        self.save(&format!("flow_{}", stamp), flow)
    }

    pub fn load(&self, name: &str) -> Result<FlowFile> {
        self.load_from_path(&self.slot_path(name))
    }

    pub fn try_load(&self, name: &str) -> Result<Option<FlowFile>> {
        let path = self.slot_path(name);
        if !path.exists() {
            return Ok(None);
        }
        self.load_from_path(&path).map(Some)
    }

    fn load_from_path(&self, path: &Path) -> Result<FlowFile> {
        let mut f = File::open(path)?;
        let mut buf = String::new();
        f.read_to_string(&mut buf)?;
        parse_flow_file(&buf)
    }

    pub fn list_slots(&self) -> Result<Vec<String>> {
        let mut entries: Vec<String> = Vec::new();
        if self.dir.exists() {
            for e in fs::read_dir(&self.dir)? {
                let p = e?.path();
                if let Some(name) = p.file_name().and_then(|s| s.to_str())
                    && let Some(slot) = name.strip_suffix(".json")
                {
                    entries.push(slot.to_string());
                }
            }
        }
        // sort descending so flow_{stamp} checkpoints list newest first
        entries.sort();
        entries.reverse();
        Ok(entries)
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
