/// Disjoint sets over 0..n, with path compression and union by size.
#[derive(Debug, Clone)]
pub struct FindUnion {
    parents: Vec<usize>,
    /// Valid only for the representatives.
    sizes: Vec<usize>,
}

impl FindUnion {
    pub fn new(size: usize) -> Self {
        Self {
            parents: (0..size).collect(),
            sizes: vec![1; size],
        }
    }
    pub fn len(&self) -> usize {
        self.parents.len()
    }
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
    /// The representative of the component `index` belongs to. None if out of range.
    pub fn find(&mut self, index: usize) -> Option<usize> {
        if self.len() <= index {
            return None;
        }
        let mut root = index;
        while root != self.parents[root] {
            root = self.parents[root];
        }
        let mut index = index;
        while index != root {
            let next = self.parents[index];
            self.parents[index] = root;
            index = next;
        }
        Some(root)
    }
    /// Merge the components of `node1` and `node2`. None if either is out of range.
    pub fn unite(&mut self, node1: usize, node2: usize) -> Option<()> {
        let (root1, root2) = (self.find(node1)?, self.find(node2)?);
        if root1 == root2 {
            return Some(());
        }
        let (large, small) = match self.sizes[root1] < self.sizes[root2] {
            true => (root2, root1),
            false => (root1, root2),
        };
        self.parents[small] = large;
        self.sizes[large] += self.sizes[small];
        Some(())
    }
    /// Component labels 0,1,2,... in the order of first appearance.
    pub fn labels(&mut self) -> Vec<usize> {
        let mut relabel: Vec<Option<usize>> = vec![None; self.len()];
        let mut next = 0;
        (0..self.len())
            .filter_map(|i| self.find(i))
            .map(|root| {
                *relabel[root].get_or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }
}
