#![allow(dead_code)]

use cortexpack::data::{BrainData, View};
use cortexpack::Dataset;
use ndarray::Array1;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(32);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One `append` call: view name, priority and vertex values.
///
/// Names and values come from small domains so generated datasets
/// regularly replace views and share data.
#[derive(Clone, Debug, PartialEq)]
pub struct AppendSpec {
    pub name: String,
    pub priority: i64,
    pub values: Vec<u8>,
    pub volume: bool,
}

impl AppendSpec {
    pub fn data(&self) -> BrainData {
        let values = Array1::from_iter(self.values.iter().map(|v| *v as f32));
        if self.volume {
            BrainData::volume(values, "S1", "fullhead")
        } else {
            BrainData::vertex(values, "S1")
        }
    }

    pub fn view(&self) -> View {
        View::new(self.data()).with_priority(self.priority)
    }
}

pub fn arb_append() -> BoxedStrategy<AppendSpec> {
    (
        "[a-e]{1,2}",
        0i64..4,
        prop::collection::vec(0u8..3, 1..4),
        any::<bool>(),
    )
        .prop_map(|(name, priority, values, volume)| AppendSpec {
            name,
            priority,
            values,
            volume,
        })
        .boxed()
}

pub fn arb_appends(max: usize) -> BoxedStrategy<Vec<AppendSpec>> {
    prop::collection::vec(arb_append(), 0..=max).boxed()
}

pub fn build(specs: &[AppendSpec]) -> Dataset {
    let mut ds = Dataset::new();
    for spec in specs {
        ds.append(spec.name.as_str(), spec.view())
            .expect("generated names are valid");
    }
    ds
}

/// The view order a dataset built from `specs` should iterate in: first
/// insertion position, last write for content, stable by priority.
pub fn expected_order(specs: &[AppendSpec]) -> Vec<String> {
    let mut slots: Vec<(String, i64)> = Vec::new();
    for spec in specs {
        match slots.iter_mut().find(|(name, _)| *name == spec.name) {
            Some(slot) => slot.1 = spec.priority,
            None => slots.push((spec.name.clone(), spec.priority)),
        }
    }
    slots.sort_by_key(|(_, priority)| *priority);
    slots.into_iter().map(|(name, _)| name).collect()
}
