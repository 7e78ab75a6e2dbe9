//! One-or-many element targets
//!
//! Public entry points accept either a single element or an ordered sequence
//! of elements. The caller picks the variant; nothing is probed at runtime.

/// Elements a sensor operation applies to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Targets<N> {
    /// A single element
    One(N),
    /// An ordered sequence of elements, visited in order
    Many(Vec<N>),
}

impl<N> Targets<N> {
    /// Iterate the elements in order
    pub fn iter(&self) -> std::slice::Iter<'_, N> {
        self.as_slice().iter()
    }

    pub fn as_slice(&self) -> &[N] {
        match self {
            Targets::One(node) => std::slice::from_ref(node),
            Targets::Many(nodes) => nodes,
        }
    }

    /// Invoke `f` once per element, in order
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&N),
    {
        self.iter().for_each(f);
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<N> From<Vec<N>> for Targets<N> {
    fn from(nodes: Vec<N>) -> Self {
        Targets::Many(nodes)
    }
}

impl<N: Clone> From<&[N]> for Targets<N> {
    fn from(nodes: &[N]) -> Self {
        Targets::Many(nodes.to_vec())
    }
}

impl<N> FromIterator<N> for Targets<N> {
    fn from_iter<I: IntoIterator<Item = N>>(iter: I) -> Self {
        Targets::Many(iter.into_iter().collect())
    }
}

impl<'a, N> IntoIterator for &'a Targets<N> {
    type Item = &'a N;
    type IntoIter = std::slice::Iter<'a, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
