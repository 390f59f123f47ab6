//! The dataset aggregate: named views plus the package that stores them.
//!
//! A [`Dataset`] maps unique names to [`View`]s. Iteration follows view
//! priority (lower first), keeping insertion order between equal priorities.
//!
//! # Persistence
//!
//! [`Dataset::save`] writes every view under `views/<name>` and every
//! distinct brain data once under `data/<id>`. With a subject database it
//! also packs the referenced surfaces, transforms and named masks under
//! `subjects/`, making the file self-contained.
//!
//! [`Dataset::from_file`] reverses this. It also picks up stray top-level
//! arrays that carry enough metadata, and data entries no view refers to;
//! entries without metadata are skipped with a warning.

pub(crate) mod codec;
mod normalize;
mod pack;

pub use normalize::{normalize, Input, Normalized};
pub use pack::{pack_masks, pack_subjects, pack_transforms, MaskKey, XfmKey};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::ops::Index;
use std::path::Path;

use crate::data::{BrainData, DataArray, DataId, Hemisphere, Mask, Surface, Transform, View, XfmKind};
use crate::database::{PackedSubjects, Resolver, SubjectDatabase, SubjectPaths};
use crate::error::CortexError;
use crate::package::{validate_name, Package, DATA, RESERVED, SUBJECTS};

/// An entry left out while loading because it lacks required metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Package path of the entry.
    pub path: String,
    /// What was missing, e.g. `"subject attribute"`.
    pub missing: &'static str,
}

/// Named views, optionally bound to a package file.
#[derive(Debug, Default)]
pub struct Dataset {
    views: Vec<(String, View)>,
    package: Option<Package>,
}

impl Dataset {
    /// Creates an empty dataset not bound to any file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from named inputs, as if appended one by one.
    pub fn from_inputs<I, S>(inputs: I) -> Result<Self, CortexError>
    where
        I: IntoIterator<Item = (S, Input)>,
        S: Into<String>,
    {
        let mut ds = Self::new();
        for (name, input) in inputs {
            ds.append(name, input)?;
        }
        Ok(ds)
    }

    /// Normalizes `input` and adds it under `name`.
    ///
    /// A nested dataset contributes all of its views under their own names
    /// and `name` is ignored. Existing views with the same name are
    /// replaced (last write wins) and keep their original position.
    ///
    /// # Errors
    /// Returns [`CortexError::InvalidName`] for names that can't be stored
    /// and any error from [`normalize`].
    pub fn append(
        &mut self,
        name: impl Into<String>,
        input: impl Into<Input>,
    ) -> Result<&mut Self, CortexError> {
        let name = name.into();
        match normalize(input.into())? {
            Normalized::View(view) => {
                validate_name(&name)?;
                self.insert_view(name, view);
            }
            Normalized::Dataset(other) => {
                for (name, view) in other.views {
                    self.insert_view(name, view);
                }
            }
        }
        Ok(self)
    }

    fn insert_view(&mut self, name: String, view: View) {
        match self.views.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => {
                tracing::debug!(view = %name, "replacing view");
                slot.1 = view;
            }
            None => self.views.push((name, view)),
        }
    }

    /// Removes and returns the view called `name`.
    pub fn remove(&mut self, name: &str) -> Option<View> {
        let idx = self.views.iter().position(|(n, _)| n == name)?;
        Some(self.views.remove(idx).1)
    }

    pub fn get(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Like [`get`](Self::get), but a missing view is an error.
    pub fn view(&self, name: &str) -> Result<&View, CortexError> {
        self.get(name)
            .ok_or_else(|| CortexError::NoSuchView(name.to_string()))
    }

    /// `(name, view)` pairs by ascending priority.
    pub fn iter(&self) -> std::vec::IntoIter<(&str, &View)> {
        let mut sorted: Vec<(&str, &View)> = self
            .views
            .iter()
            .map(|(name, view)| (name.as_str(), view))
            .collect();
        sorted.sort_by_key(|(_, view)| view.priority());
        sorted.into_iter()
    }

    /// View names in iteration order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(name, _)| name).collect()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// The distinct brain data referenced by any view.
    pub fn uniques(&self) -> HashSet<&BrainData> {
        self.views
            .iter()
            .flat_map(|(_, view)| view.iter())
            .collect()
    }

    /// Returns a new, unbound dataset with every view renamed to
    /// `prefix + name`. Brain data arrays are shared, not copied.
    pub fn prepend(&self, prefix: &str) -> Result<Dataset, CortexError> {
        let mut ds = Dataset::new();
        for (name, view) in self.iter() {
            let renamed = format!("{}{}", prefix, name);
            validate_name(&renamed)?;
            ds.insert_view(renamed, view.clone());
        }
        Ok(ds)
    }

    /// The package this dataset was loaded from or last saved to.
    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.package.as_ref().and_then(Package::path)
    }

    /// Loads a package file, resolving references against its own
    /// `subjects` region only.
    pub fn from_file(path: &Path) -> Result<Dataset, CortexError> {
        let (ds, _) = Self::from_file_with(path, None)?;
        Ok(ds)
    }

    /// Loads a package file, falling back to `external` for references the
    /// package doesn't pack. Also returns the entries skipped for missing
    /// metadata.
    pub fn from_file_with(
        path: &Path,
        external: Option<&dyn SubjectDatabase>,
    ) -> Result<(Dataset, Vec<SkippedEntry>), CortexError> {
        let package = Package::open(path)?;
        let loaded = Self::from_package(package, external)?;
        tracing::info!(
            path = %path.display(),
            views = loaded.0.len(),
            skipped = loaded.1.len(),
            "loaded dataset"
        );
        Ok(loaded)
    }

    /// Rebuilds a dataset from an in-memory package, which becomes its
    /// backing package.
    pub fn from_package(
        package: Package,
        external: Option<&dyn SubjectDatabase>,
    ) -> Result<(Dataset, Vec<SkippedEntry>), CortexError> {
        let mut ds = Dataset::new();
        let mut skipped = Vec::new();
        {
            let packed = PackedSubjects::new(&package);
            let mut resolver = Resolver::new().with_source(&packed);
            if let Some(db) = external {
                resolver = resolver.with_source(db);
            }

            for name in package.children("") {
                if RESERVED.contains(&name.as_str()) {
                    continue;
                }
                if let Some(data) = tolerate(codec::read_brain_data(&package, &name, &resolver), &mut skipped)? {
                    ds.insert_view(name, View::new(data));
                }
            }

            let mut loaded: HashMap<DataId, BrainData> = HashMap::new();
            for name in codec::view_names(&package) {
                let view = codec::read_view(&package, &name, &mut loaded, &resolver)?;
                ds.insert_view(name, view);
            }

            for name in package.children(DATA) {
                if loaded.contains_key(&DataId::from_name(name.as_str())) {
                    continue;
                }
                let path = format!("{}/{}", DATA, name);
                if let Some(data) = tolerate(codec::read_brain_data(&package, &path, &resolver), &mut skipped)? {
                    tracing::debug!(id = %name, "recovered orphaned data");
                    ds.insert_view(name, View::new(data));
                }
            }
        }
        ds.package = Some(package);
        Ok((ds, skipped))
    }

    /// Writes the dataset to its package and flushes it to disk.
    ///
    /// With `filename`, the dataset is (re)bound to that file; an existing
    /// file is opened so its packed subjects are kept. Without one, the
    /// dataset must already be bound. Saving to a different file carries
    /// the previously packed subject resources along.
    ///
    /// With `pack`, every subject, transform and named mask the views refer
    /// to is copied from that database (or from what is already packed)
    /// into `subjects/`. Inline masks travel with their data and need no
    /// packing. Resources are all gathered before anything is written.
    ///
    /// # Errors
    /// - [`CortexError::UnboundFile`] without a filename on an unbound dataset
    /// - [`CortexError::PackingResource`] if a resource to pack is missing
    /// - [`CortexError::ShapeMismatch`] if packed data doesn't fit its subject
    pub fn save(
        &mut self,
        filename: Option<&Path>,
        pack: Option<&dyn SubjectDatabase>,
    ) -> Result<(), CortexError> {
        let fresh = match (filename, &self.package) {
            (Some(path), Some(current)) if current.path() == Some(path) => None,
            (Some(path), _) => Some(Package::open_or_create(path)?),
            (None, Some(_)) => None,
            (None, None) => return Err(CortexError::UnboundFile),
        };

        let mut staged = Vec::new();
        if let Some(current) = &self.package {
            if fresh.is_some() {
                staged.extend(
                    current
                        .paths()
                        .filter(|path| {
                            path.strip_prefix(SUBJECTS)
                                .is_some_and(|rest| rest.starts_with('/'))
                        })
                        .filter(|path| fresh.as_ref().and_then(|p| p.get(path)).is_none())
                        .filter_map(|path| current.get(path).map(|node| (path.to_string(), node.clone()))),
                );
            }
        }
        if let Some(db) = pack {
            // Only the database; packed subjects are never a source.
            let resolver = Resolver::new().with_source(db);
            staged.extend(self.stage_pack(&resolver)?);
        }

        let mut package = match fresh {
            Some(package) => package,
            None => self.package.take().ok_or(CortexError::UnboundFile)?,
        };
        let written = self.write_views(&mut package, staged);
        self.package = Some(package);
        let (unique, refs) = written?;

        let package = self.package.as_ref().ok_or(CortexError::UnboundFile)?;
        package.flush()?;
        tracing::info!(
            path = %package.path().map(|p| p.display().to_string()).unwrap_or_default(),
            views = self.views.len(),
            unique,
            refs,
            packed = pack.is_some(),
            "saved dataset"
        );
        Ok(())
    }

    /// Collects every subject resource the views need, checking shapes
    /// against the resolved transforms, masks and surfaces.
    fn stage_pack(&self, resolver: &Resolver<'_>) -> Result<pack::Staged, CortexError> {
        let mut subjects = BTreeSet::new();
        let mut xfms: BTreeSet<XfmKey> = BTreeSet::new();
        let mut masks: BTreeSet<MaskKey> = BTreeSet::new();
        for data in self.uniques() {
            subjects.insert(data.subject().to_string());
            if let Some(xfmname) = data.xfmname() {
                xfms.insert((data.subject().to_string(), xfmname.to_string()));
                if let Some(mask) = data.mask().and_then(Mask::name) {
                    masks.insert((
                        data.subject().to_string(),
                        xfmname.to_string(),
                        mask.to_string(),
                    ));
                }
            }
        }

        let mut staged = pack::stage_subjects(&subjects, resolver)?;
        staged.extend(pack::stage_transforms(&xfms, resolver)?);
        staged.extend(pack::stage_masks(&masks, resolver)?);
        for data in self.uniques() {
            resolver.check_shape(data)?;
        }
        tracing::info!(
            subjects = subjects.len(),
            transforms = xfms.len(),
            masks = masks.len(),
            "packing subject resources"
        );
        Ok(staged)
    }

    /// Replaces everything but `subjects/` with the current views and their
    /// data. Returns the number of unique data written and of references.
    fn write_views(
        &self,
        package: &mut Package,
        staged: pack::Staged,
    ) -> Result<(usize, usize), CortexError> {
        for name in package.children("") {
            if name != SUBJECTS {
                package.remove_subtree(&name);
            }
        }

        let mut ids: HashMap<&BrainData, DataId> = HashMap::new();
        let mut taken: HashSet<DataId> = HashSet::new();
        let mut refs_total = 0;
        for (position, (name, view)) in self.views.iter().enumerate() {
            let mut refs = Vec::with_capacity(view.channels().len());
            for data in view {
                let id = match ids.get(data) {
                    Some(id) => {
                        tracing::debug!(view = %name, id = %id, "data already written");
                        id.clone()
                    }
                    None => {
                        let mut id = data.id().clone();
                        let mut n = 1;
                        while taken.contains(&id) {
                            id = data.id().with_suffix(n);
                            n += 1;
                        }
                        codec::write_brain_data(package, &id, data)?;
                        taken.insert(id.clone());
                        ids.insert(data, id.clone());
                        id
                    }
                };
                refs.push(id);
            }
            refs_total += refs.len();
            codec::write_view(package, name, view, &refs, position)?;
        }

        pack::commit(package, staged)?;
        Ok((ids.len(), refs_total))
    }

    fn packed(&self) -> Result<PackedSubjects<'_>, CortexError> {
        self.package
            .as_ref()
            .map(PackedSubjects::new)
            .ok_or_else(|| CortexError::missing("Package", "dataset is not bound to a package"))
    }

    /// Left and right hemisphere surfaces, optionally nudged apart at the
    /// midline.
    pub fn get_surf_pair(
        &self,
        subject: &str,
        surftype: &str,
        nudge: bool,
    ) -> Result<(Surface, Surface), CortexError> {
        let packed = self.packed()?;
        let mut pair = Vec::with_capacity(2);
        for hemi in Hemisphere::BOTH {
            let surf = packed.get_surf(subject, surftype, hemi)?;
            pair.push(if nudge { surf.nudged(hemi) } else { surf });
        }
        let right = pair.pop();
        let left = pair.pop();
        match (left, right) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err(CortexError::missing("Surface", format!("{}/{}", subject, surftype))),
        }
    }

    /// Both hemispheres joined into one mesh.
    pub fn get_surf_merged(
        &self,
        subject: &str,
        surftype: &str,
        nudge: bool,
    ) -> Result<Surface, CortexError> {
        let (left, right) = self.get_surf_pair(subject, surftype, nudge)?;
        Surface::merge(&left, &right)
    }
}

/// Turns missing metadata into a skipped entry and passes other errors on.
fn tolerate(
    result: Result<BrainData, CortexError>,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<Option<BrainData>, CortexError> {
    match result {
        Ok(data) => Ok(Some(data)),
        Err(CortexError::IncompleteMetadata { entry, missing }) => {
            tracing::warn!(entry = %entry, missing, "no metadata found, skipping");
            skipped.push(SkippedEntry {
                path: entry,
                missing,
            });
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl SubjectDatabase for Dataset {
    fn get_overlay(&self, subject: &str, kind: &str) -> Result<String, CortexError> {
        self.packed()?.get_overlay(subject, kind)
    }

    fn get_surf(
        &self,
        subject: &str,
        surftype: &str,
        hemi: Hemisphere,
    ) -> Result<Surface, CortexError> {
        self.packed()?.get_surf(subject, surftype, hemi)
    }

    fn get_paths(&self, subject: &str) -> Result<SubjectPaths, CortexError> {
        self.packed()?.get_paths(subject)
    }

    fn get_xfm(
        &self,
        subject: &str,
        xfmname: &str,
        kind: XfmKind,
    ) -> Result<Transform, CortexError> {
        self.packed()?.get_xfm(subject, xfmname, kind)
    }

    fn get_mask(
        &self,
        subject: &str,
        xfmname: &str,
        maskname: &str,
    ) -> Result<DataArray, CortexError> {
        self.packed()?.get_mask(subject, xfmname, maskname)
    }
}

impl Index<&str> for Dataset {
    type Output = View;

    /// # Panics
    /// Panics if there is no view called `name`; use [`Dataset::view`] to
    /// get an error instead.
    fn index(&self, name: &str) -> &View {
        match self.get(name) {
            Some(view) => view,
            None => panic!("no view named '{}'", name),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = (&'a str, &'a View);
    type IntoIter = std::vec::IntoIter<(&'a str, &'a View)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset with views [{}]", self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn vertex(v: f32) -> BrainData {
        BrainData::vertex(arr1(&[v, v]), "S1")
    }

    #[test]
    fn test_iteration_is_stable_by_priority() {
        let mut ds = Dataset::new();
        for (name, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 3)] {
            ds.append(name, View::new(vertex(priority as f32)).with_priority(priority))
                .expect("append");
        }
        assert_eq!(ds.names(), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_append_last_write_wins_in_place() {
        let mut ds = Dataset::new();
        ds.append("a", vertex(1.0)).expect("append");
        ds.append("b", vertex(2.0)).expect("append");
        ds.append("a", vertex(3.0)).expect("append");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.names(), vec!["a", "b"]);
        assert_eq!(ds["a"].channels()[0], vertex(3.0));
    }

    #[test]
    fn test_append_dataset_merges_views() {
        let inner = Dataset::from_inputs([("x", Input::from(vertex(1.0))), ("y", vertex(2.0).into())])
            .expect("inner");
        let mut ds = Dataset::new();
        ds.append("ignored", inner).expect("append");
        assert_eq!(ds.names(), vec!["x", "y"]);
        assert!(ds.get("ignored").is_none());
    }

    #[test]
    fn test_uniques_collapses_identical_data() {
        let ds = Dataset::from_inputs([("a", Input::from(vertex(1.0))), ("b", vertex(1.0).into())])
            .expect("dataset");
        assert_eq!(ds.uniques().len(), 1);
    }

    #[test]
    fn test_prepend_shares_data() {
        let ds = Dataset::from_inputs([("x", Input::from(vertex(1.0)))]).expect("dataset");
        let renamed = ds.prepend("a_").expect("prepend");
        assert!(renamed["a_x"].channels()[0].shares_data_with(&ds["x"].channels()[0]));
        assert_eq!(ds.names(), vec!["x"]);
        assert!(renamed.package().is_none());
    }

    #[test]
    fn test_missing_view_is_an_error() {
        let ds = Dataset::new();
        assert!(matches!(ds.view("nope").unwrap_err(), CortexError::NoSuchView(_)));
    }

    #[test]
    fn test_invalid_view_name() {
        let mut ds = Dataset::new();
        assert!(matches!(
            ds.append("a/b", vertex(1.0)).unwrap_err(),
            CortexError::InvalidName { .. }
        ));
    }

    #[test]
    fn test_unbound_save_fails() {
        let mut ds = Dataset::from_inputs([("x", Input::from(vertex(1.0)))]).expect("dataset");
        assert!(matches!(ds.save(None, None).unwrap_err(), CortexError::UnboundFile));
    }

    #[test]
    fn test_unbound_accessors_are_missing() {
        let ds = Dataset::new();
        assert!(ds
            .get_xfm("S1", "fullhead", XfmKind::Coord)
            .unwrap_err()
            .is_missing_resource());
    }

    #[test]
    fn test_display_lists_views_in_order() {
        let mut ds = Dataset::new();
        ds.append("late", View::new(vertex(1.0)).with_priority(9)).expect("append");
        ds.append("early", View::new(vertex(2.0)).with_priority(0)).expect("append");
        assert_eq!(ds.to_string(), "Dataset with views [early, late]");
    }

    #[test]
    fn test_package_roundtrip_in_memory() {
        let shared = vertex(1.0);
        let ds = Dataset::from_inputs([
            ("a", Input::from(shared.clone())),
            ("b", Input::from(shared)),
        ])
        .expect("dataset");

        let mut pkg = Package::new();
        ds.write_views(&mut pkg, Vec::new()).expect("write");
        assert_eq!(pkg.children(DATA).len(), 1);

        let (restored, skipped) = Dataset::from_package(pkg, None).expect("load");
        assert!(skipped.is_empty());
        assert_eq!(restored.names(), vec!["a", "b"]);
        assert!(restored["a"].channels()[0].shares_data_with(&restored["b"].channels()[0]));
    }
}
