use std::collections::BTreeSet;

/// A numeric sample with identifying tags.
///
/// Points carry no timestamp; the emitter stamps them when they are sent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub tags: BTreeSet<String>,
}

impl MetricPoint {
    pub fn new<N, I, T>(name: N, value: f64, tags: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}
