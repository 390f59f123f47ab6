//! Reading and writing brain data and views as package nodes.
//!
//! Brain data node (`data/<id>`, or a stray top-level entry):
//! the array, plus attributes `subject`, `xfmname` (volume data only) and
//! `mask` (name of a stored mask). An inline mask is the child node
//! `data/<id>/mask`.
//!
//! View node (`views/<name>`): attributes `type`, `priority`, `data`
//! (ordered list of data ids), `display` and `position` (insertion index,
//! so views with equal priority come back in the order they were added).

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::{BrainData, DataId, DataKind, Mask, View, ViewKind, DEFAULT_PRIORITY};
use crate::database::Resolver;
use crate::error::CortexError;
use crate::package::{Node, Package, DATA, VIEWS};

pub(crate) const SUBJECT: &str = "subject";
pub(crate) const XFMNAME: &str = "xfmname";
pub(crate) const MASK: &str = "mask";
pub(crate) const TYPE: &str = "type";
pub(crate) const PRIORITY: &str = "priority";
pub(crate) const REFS: &str = "data";
pub(crate) const DISPLAY: &str = "display";
pub(crate) const POSITION: &str = "position";

pub(crate) fn data_path(id: &DataId) -> String {
    format!("{}/{}", DATA, id)
}

pub(crate) fn view_path(name: &str) -> String {
    format!("{}/{}", VIEWS, name)
}

/// Writes one brain data under `data/<id>`.
pub(crate) fn write_brain_data(
    package: &mut Package,
    id: &DataId,
    data: &BrainData,
) -> Result<(), CortexError> {
    let path = data_path(id);
    let mut node = Node::with_array(data.data().clone());
    node.set_attr(SUBJECT, data.subject());
    if let Some(xfmname) = data.xfmname() {
        node.set_attr(XFMNAME, xfmname);
    }
    match data.mask() {
        Some(Mask::Named(name)) => node.set_attr(MASK, name.as_str()),
        Some(Mask::Inline(mask)) => {
            package.insert(
                &format!("{}/{}", path, MASK),
                Node::with_array(mask.as_ref().clone()),
            )?;
        }
        None => {}
    }
    package.insert(&path, node)
}

/// Rebuilds brain data from the node at `path`.
///
/// # Errors
/// Returns [`CortexError::IncompleteMetadata`] when the node has no array or
/// no `subject` attribute. Callers loading stray or orphaned entries treat
/// that as "skip this entry".
pub(crate) fn read_brain_data(
    package: &Package,
    path: &str,
    resolver: &Resolver<'_>,
) -> Result<BrainData, CortexError> {
    let incomplete = |missing| CortexError::IncompleteMetadata {
        entry: path.to_string(),
        missing,
    };

    let node = package.get(path).ok_or_else(|| incomplete("array"))?;
    let array = node.array.clone().ok_or_else(|| incomplete("array"))?;
    let subject = node
        .attr_str(SUBJECT)
        .ok_or_else(|| incomplete("subject attribute"))?;

    let kind = match node.attr_str(XFMNAME) {
        Some(xfmname) => DataKind::Volume {
            xfmname: xfmname.to_string(),
        },
        None => DataKind::Vertex,
    };
    let mask = match node.attr_str(MASK) {
        Some(name) => Some(Mask::Named(name.to_string())),
        None => package
            .get(&format!("{}/{}", path, MASK))
            .and_then(|child| child.array.clone())
            .map(|array| Mask::Inline(Arc::new(array))),
    };

    let data = BrainData::from_parts(Arc::new(array), subject.to_string(), kind, mask);
    resolver.check_shape(&data)?;
    Ok(data)
}

/// Writes one view under `views/<name>`, referring to already-written data.
pub(crate) fn write_view(
    package: &mut Package,
    name: &str,
    view: &View,
    refs: &[DataId],
    position: usize,
) -> Result<(), CortexError> {
    let mut node = Node::default();
    node.set_attr(TYPE, view.kind().as_str());
    node.set_attr(PRIORITY, view.priority());
    node.set_attr(POSITION, position);
    node.set_attr(
        REFS,
        refs.iter()
            .map(|id| serde_json::Value::from(id.as_str()))
            .collect::<Vec<_>>(),
    );
    let display = serde_json::to_value(view.display()).map_err(|source| CortexError::Json {
        context: view_path(name),
        source,
    })?;
    node.set_attr(DISPLAY, display);
    package.insert(&view_path(name), node)
}

/// Names under `views`, in stored insertion order. Views without a
/// position (written by hand) follow, sorted by name.
pub(crate) fn view_names(package: &Package) -> Vec<String> {
    let mut names = package.children(VIEWS);
    names.sort_by_key(|name| {
        package
            .get(&view_path(name))
            .and_then(|node| node.attrs.get(POSITION))
            .and_then(|v| v.as_u64())
            .unwrap_or(u64::MAX)
    });
    names
}

/// Rebuilds the view `views/<name>`.
///
/// Data already loaded through another view is taken from `loaded`, so
/// views that shared a stored entry share one [`BrainData`] again. Newly
/// read data is added to `loaded`.
pub(crate) fn read_view(
    package: &Package,
    name: &str,
    loaded: &mut HashMap<DataId, BrainData>,
    resolver: &Resolver<'_>,
) -> Result<View, CortexError> {
    let path = view_path(name);
    let incomplete = |missing| CortexError::IncompleteMetadata {
        entry: path.clone(),
        missing,
    };

    let node = package.get(&path).ok_or_else(|| incomplete("view attributes"))?;
    let kind = node
        .attr_str(TYPE)
        .and_then(ViewKind::from_tag)
        .ok_or_else(|| incomplete("type attribute"))?;
    let priority = node
        .attrs
        .get(PRIORITY)
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_PRIORITY);
    let refs = node
        .attrs
        .get(REFS)
        .and_then(|v| v.as_array())
        .ok_or_else(|| incomplete("data attribute"))?;

    let mut channels = Vec::with_capacity(refs.len());
    for entry in refs {
        let id = entry
            .as_str()
            .map(DataId::from_name)
            .ok_or_else(|| incomplete("data attribute"))?;
        if let Some(data) = loaded.get(&id) {
            tracing::debug!(view = name, id = %id, "reusing shared data");
            channels.push(data.clone());
            continue;
        }
        if package.get(&data_path(&id)).is_none() {
            return Err(CortexError::DanglingReference {
                view: name.to_string(),
                id: id.to_string(),
            });
        }
        let data = read_brain_data(package, &data_path(&id), resolver)?;
        loaded.insert(id, data.clone());
        channels.push(data);
    }

    let display = match node.attrs.get(DISPLAY) {
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|source| CortexError::Json {
                context: path.clone(),
                source,
            })?
        }
        None => Default::default(),
    };

    Ok(View::from_channels(kind, channels)?
        .with_priority(priority)
        .with_display(display))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_brain_data_node_roundtrip() {
        let mut pkg = Package::new();
        let data = BrainData::masked_volume(
            arr1(&[1.0f32, 2.0]),
            "S1",
            "fullhead",
            Mask::inline(arr1(&[true, true, false])),
        );
        write_brain_data(&mut pkg, data.id(), &data).expect("write");

        let node = pkg.get(&data_path(data.id())).expect("node");
        assert_eq!(node.attr_str("subject"), Some("S1"));
        assert_eq!(node.attr_str("xfmname"), Some("fullhead"));
        assert!(node.attr_str("mask").is_none());

        let restored =
            read_brain_data(&pkg, &data_path(data.id()), &Resolver::new()).expect("read");
        assert_eq!(restored, data);
    }

    #[test]
    fn test_vertex_data_has_no_xfmname() {
        let mut pkg = Package::new();
        let data = BrainData::vertex(arr1(&[1.0f32, 2.0]), "S1");
        write_brain_data(&mut pkg, data.id(), &data).expect("write");
        let node = pkg.get(&data_path(data.id())).expect("node");
        assert!(node.attr_str("xfmname").is_none());
    }

    #[test]
    fn test_missing_subject_is_incomplete() {
        let mut pkg = Package::new();
        pkg.insert("stray", Node::with_array(arr1(&[1.0f64]).into()))
            .expect("insert");
        let err = read_brain_data(&pkg, "stray", &Resolver::new()).unwrap_err();
        assert!(matches!(
            err,
            CortexError::IncompleteMetadata {
                missing: "subject attribute",
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_view_reference() {
        let mut pkg = Package::new();
        let data = BrainData::vertex(arr1(&[1.0f32]), "S1");
        let view = View::new(data.clone());
        write_view(&mut pkg, "v", &view, &[data.id().clone()], 0).expect("write view");

        let err = read_view(&pkg, "v", &mut HashMap::new(), &Resolver::new()).unwrap_err();
        assert!(matches!(err, CortexError::DanglingReference { .. }));
    }

    #[test]
    fn test_view_names_follow_position() {
        let mut pkg = Package::new();
        let data = BrainData::vertex(arr1(&[1.0f32]), "S1");
        let view = View::new(data.clone());
        for (position, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
            write_view(&mut pkg, name, &view, &[data.id().clone()], position).expect("write");
        }
        assert_eq!(view_names(&pkg), vec!["zeta", "alpha", "mid"]);
    }
}
