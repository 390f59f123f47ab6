//! Zip archive codec for packages.
//!
//! Each node at logical path `P` becomes up to two archive entries:
//! `P/.array.npy` holding the array and `P/.attrs.json` holding the
//! attributes. Nodes with neither are groups and are implied by their
//! children, so they are not written.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{split_path, Attrs, Node};
use crate::data::DataArray;
use crate::error::CortexError;

pub(crate) const ARRAY_ENTRY: &str = ".array.npy";
pub(crate) const ATTRS_ENTRY: &str = ".attrs.json";

/// Parses archive bytes into a flat map of node path to node.
pub(crate) fn read_archive(
    bytes: &[u8],
    origin: &Path,
) -> Result<BTreeMap<String, Node>, CortexError> {
    let read_err = |message: String| CortexError::PackageRead {
        path: origin.to_path_buf(),
        message,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| read_err(e.to_string()))?;
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| read_err(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        // The declared size is untrusted; cap the preallocation.
        let mut buf = Vec::with_capacity((file.size() as usize).min(bytes.len()));
        file.read_to_end(&mut buf)?;

        let (node_path, leaf) = name
            .rsplit_once('/')
            .ok_or_else(|| read_err(format!("entry '{}' is not inside a node", name)))?;
        let segments = split_path(node_path);
        if segments.is_empty() || segments.join("/") != node_path {
            return Err(read_err(format!("entry '{}' has a malformed node path", name)));
        }

        let node = nodes.entry(node_path.to_string()).or_default();
        match leaf {
            ARRAY_ENTRY => node.array = Some(DataArray::from_npy_bytes(&name, &buf)?),
            ATTRS_ENTRY => {
                node.attrs = serde_json::from_slice::<Attrs>(&buf).map_err(|source| {
                    CortexError::Json {
                        context: name.clone(),
                        source,
                    }
                })?
            }
            other => return Err(read_err(format!("unexpected entry '{}' in '{}'", other, name))),
        }
    }

    Ok(nodes)
}

/// Writes all nodes into a zip archive, in path order.
pub(crate) fn write_archive<W: Write + Seek>(
    nodes: &BTreeMap<String, Node>,
    writer: W,
    origin: &Path,
) -> Result<W, CortexError> {
    let zip_err = |source: zip::result::ZipError| CortexError::PackageWrite {
        path: origin.to_path_buf(),
        source,
    };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    for (path, node) in nodes {
        if let Some(array) = &node.array {
            let entry = format!("{}/{}", path, ARRAY_ENTRY);
            let bytes = array.to_npy_bytes(&entry)?;
            zip.start_file(entry, options).map_err(zip_err)?;
            zip.write_all(&bytes)?;
        }
        if !node.attrs.is_empty() {
            let entry = format!("{}/{}", path, ATTRS_ENTRY);
            let bytes = serde_json::to_vec(&node.attrs).map_err(|source| CortexError::Json {
                context: entry.clone(),
                source,
            })?;
            zip.start_file(entry, options).map_err(zip_err)?;
            zip.write_all(&bytes)?;
        }
    }

    zip.finish().map_err(zip_err)
}
