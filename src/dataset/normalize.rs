//! Turning heterogeneous inputs into views and datasets.

use std::path::{Path, PathBuf};

use super::Dataset;
use crate::data::{BrainData, DataArray, Mask, View};
use crate::error::CortexError;

/// Anything a [`Dataset`] can ingest.
#[derive(Debug)]
pub enum Input {
    /// Merged view by view.
    Dataset(Dataset),
    View(View),
    /// Wrapped as a single-channel view.
    BrainData(BrainData),
    /// Named inputs, normalized recursively into a nested dataset.
    Mapping(Vec<(String, Input)>),
    /// A package file, loaded with [`Dataset::from_file`].
    Path(PathBuf),
    /// A raw array with its subject. With a transform name this is volume
    /// data, without one it is vertex data.
    Tuple {
        data: DataArray,
        subject: String,
        xfmname: Option<String>,
        mask: Option<Mask>,
    },
    /// Exactly three single-channel inputs form an RGB view.
    List(Vec<Input>),
    /// Never valid; kept so callers get a typed error instead of a panic.
    Scalar(f64),
}

impl Input {
    pub fn volume_tuple(
        data: impl Into<DataArray>,
        subject: impl Into<String>,
        xfmname: impl Into<String>,
    ) -> Self {
        Input::Tuple {
            data: data.into(),
            subject: subject.into(),
            xfmname: Some(xfmname.into()),
            mask: None,
        }
    }

    pub fn masked_tuple(
        data: impl Into<DataArray>,
        subject: impl Into<String>,
        xfmname: impl Into<String>,
        mask: Mask,
    ) -> Self {
        Input::Tuple {
            data: data.into(),
            subject: subject.into(),
            xfmname: Some(xfmname.into()),
            mask: Some(mask),
        }
    }

    pub fn vertex_tuple(data: impl Into<DataArray>, subject: impl Into<String>) -> Self {
        Input::Tuple {
            data: data.into(),
            subject: subject.into(),
            xfmname: None,
            mask: None,
        }
    }

    pub fn mapping<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Input)>,
        S: Into<String>,
    {
        Input::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn describe(&self) -> &'static str {
        match self {
            Input::Dataset(_) => "dataset",
            Input::View(_) => "view",
            Input::BrainData(_) => "brain data",
            Input::Mapping(_) => "mapping",
            Input::Path(_) => "path",
            Input::Tuple { .. } => "tuple",
            Input::List(_) => "list",
            Input::Scalar(_) => "number",
        }
    }
}

impl From<Dataset> for Input {
    fn from(value: Dataset) -> Self {
        Input::Dataset(value)
    }
}

impl From<View> for Input {
    fn from(value: View) -> Self {
        Input::View(value)
    }
}

impl From<BrainData> for Input {
    fn from(value: BrainData) -> Self {
        Input::BrainData(value)
    }
}

impl From<PathBuf> for Input {
    fn from(value: PathBuf) -> Self {
        Input::Path(value)
    }
}

impl From<&Path> for Input {
    fn from(value: &Path) -> Self {
        Input::Path(value.to_path_buf())
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Path(PathBuf::from(value))
    }
}

impl From<f64> for Input {
    fn from(value: f64) -> Self {
        Input::Scalar(value)
    }
}

impl From<i64> for Input {
    fn from(value: i64) -> Self {
        Input::Scalar(value as f64)
    }
}

impl From<Vec<Input>> for Input {
    fn from(value: Vec<Input>) -> Self {
        Input::List(value)
    }
}

/// Result of [`normalize`].
#[derive(Debug)]
pub enum Normalized {
    View(View),
    Dataset(Dataset),
}

/// Converts any supported input into a view or a dataset.
///
/// # Errors
/// Returns [`CortexError::UnsupportedType`] for inputs with no view form:
/// numbers, lists that are not exactly three single-channel items, and
/// masks on vertex data. Loading a path propagates its I/O errors.
pub fn normalize(input: Input) -> Result<Normalized, CortexError> {
    match input {
        Input::Dataset(ds) => Ok(Normalized::Dataset(ds)),
        Input::View(view) => Ok(Normalized::View(view)),
        Input::BrainData(data) => Ok(Normalized::View(View::new(data))),
        Input::Mapping(entries) => Dataset::from_inputs(entries).map(Normalized::Dataset),
        Input::Path(path) => Dataset::from_file(&path).map(Normalized::Dataset),
        Input::Tuple {
            data,
            subject,
            xfmname,
            mask,
        } => brain_data(data, subject, xfmname, mask).map(|bd| Normalized::View(View::new(bd))),
        Input::List(items) => rgb(items).map(Normalized::View),
        Input::Scalar(value) => Err(CortexError::UnsupportedType(format!(
            "cannot build a view from the number {}",
            value
        ))),
    }
}

fn brain_data(
    data: DataArray,
    subject: String,
    xfmname: Option<String>,
    mask: Option<Mask>,
) -> Result<BrainData, CortexError> {
    match (xfmname, mask) {
        (Some(xfmname), None) => Ok(BrainData::volume(data, subject, xfmname)),
        (Some(xfmname), Some(mask)) => Ok(BrainData::masked_volume(data, subject, xfmname, mask)),
        (None, None) => Ok(BrainData::vertex(data, subject)),
        (None, Some(_)) => Err(CortexError::UnsupportedType(
            "vertex data cannot carry a mask".to_string(),
        )),
    }
}

fn rgb(items: Vec<Input>) -> Result<View, CortexError> {
    if items.len() != 3 {
        return Err(CortexError::UnsupportedType(format!(
            "a list needs exactly 3 channels to form an RGB view, got {}",
            items.len()
        )));
    }

    let mut channels = Vec::with_capacity(3);
    for item in items {
        let data = match item {
            Input::BrainData(data) => data,
            Input::Tuple {
                data,
                subject,
                xfmname,
                mask,
            } => brain_data(data, subject, xfmname, mask)?,
            Input::View(view) if view.channels().len() == 1 => view.channels()[0].clone(),
            other => {
                return Err(CortexError::UnsupportedType(format!(
                    "RGB channel must be brain data or an array tuple, got {}",
                    other.describe()
                )))
            }
        };
        channels.push(data);
    }

    let mut channels = channels.into_iter();
    match (channels.next(), channels.next(), channels.next()) {
        (Some(r), Some(g), Some(b)) => View::rgb(r, g, b),
        _ => Err(CortexError::UnsupportedType("RGB view needs 3 channels".to_string())),
    }
}
