//! Partition of the mutations into clusters.
//!
//! Clusters live in a dense arena. A cluster losing its last member is released
//! and its slot is reused by the next new cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Cellular prevalence for each sample.
    pub params: Vec<f64>,
    size: usize,
}

impl Cluster {
    fn new(params: Vec<f64>) -> Self {
        Self { params, size: 0 }
    }
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Clone)]
pub struct Partition {
    // assignments[i] = the slot of the cluster of the i-th mutation.
    assignments: Vec<usize>,
    slots: Vec<Option<Cluster>>,
    free: Vec<usize>,
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes: Vec<_> = self.clusters().map(|(_, c)| format!("{}", c.size)).collect();
        write!(f, "{}\t[{}]", self.cluster_num(), sizes.join(","))
    }
}

impl Partition {
    /// All the mutations in one cluster.
    pub fn connected(mutation_num: usize, params: Vec<f64>) -> Self {
        let mut cluster = Cluster::new(params);
        cluster.size = mutation_num;
        Self {
            assignments: vec![0; mutation_num],
            slots: vec![Some(cluster)],
            free: vec![],
        }
    }
    /// Each mutation in its own cluster.
    pub fn disconnected(params: Vec<Vec<f64>>) -> Self {
        let assignments = (0..params.len()).collect();
        let slots = params
            .into_iter()
            .map(|p| {
                let mut cluster = Cluster::new(p);
                cluster.size = 1;
                Some(cluster)
            })
            .collect();
        Self {
            assignments,
            slots,
            free: vec![],
        }
    }
    pub fn mutation_num(&self) -> usize {
        self.assignments.len()
    }
    pub fn cluster_num(&self) -> usize {
        self.slots.len() - self.free.len()
    }
    /// The slot of the cluster of the `mutation`.
    pub fn assignment(&self, mutation: usize) -> usize {
        self.assignments[mutation]
    }
    pub fn cluster(&self, slot: usize) -> Option<&Cluster> {
        self.slots.get(slot).and_then(|c| c.as_ref())
    }
    pub fn cluster_mut(&mut self, slot: usize) -> Option<&mut Cluster> {
        self.slots.get_mut(slot).and_then(|c| c.as_mut())
    }
    /// Parameters of the cluster `mutation` belongs to.
    pub fn params_of(&self, mutation: usize) -> &[f64] {
        match self.cluster(self.assignments[mutation]) {
            Some(cluster) => &cluster.params,
            None => unreachable!("mutation {} is detached", mutation),
        }
    }
    /// Active clusters with their slots.
    pub fn clusters(&self) -> impl Iterator<Item = (usize, &Cluster)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }
    /// (slot, members) for each active cluster.
    pub fn members(&self) -> Vec<(usize, Vec<usize>)> {
        let mut members: Vec<Vec<usize>> = vec![vec![]; self.slots.len()];
        for (mutation, &slot) in self.assignments.iter().enumerate() {
            members[slot].push(mutation);
        }
        members
            .into_iter()
            .enumerate()
            .filter(|(slot, _)| self.slots[*slot].is_some())
            .collect()
    }
    /// Remove `mutation` from its cluster. If the cluster becomes empty, it is released.
    /// The mutation should be attached again before anything else reads the partition.
    pub fn detach(&mut self, mutation: usize) {
        let slot = self.assignments[mutation];
        let released = match self.slots[slot].as_mut() {
            Some(cluster) => {
                cluster.size -= 1;
                cluster.size == 0
            }
            None => unreachable!("slot {} is not active", slot),
        };
        if released {
            self.slots[slot] = None;
            self.free.push(slot);
        }
    }
    /// Put `mutation` into the cluster at `slot`.
    pub fn attach(&mut self, mutation: usize, slot: usize) {
        match self.slots[slot].as_mut() {
            Some(cluster) => cluster.size += 1,
            None => unreachable!("slot {} is not active", slot),
        }
        self.assignments[mutation] = slot;
    }
    /// Put `mutation` into a new cluster with the given parameters. Return the slot.
    pub fn attach_new(&mut self, mutation: usize, params: Vec<f64>) -> usize {
        let mut cluster = Cluster::new(params);
        cluster.size = 1;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(cluster);
                slot
            }
            None => {
                self.slots.push(Some(cluster));
                self.slots.len() - 1
            }
        };
        self.assignments[mutation] = slot;
        slot
    }
    /// Labels 0,1,2,... in the order of the first appearance.
    pub fn labels(&self) -> Vec<usize> {
        let mut relabel: Vec<Option<usize>> = vec![None; self.slots.len()];
        let mut next = 0;
        self.assignments
            .iter()
            .map(|&slot| {
                *relabel[slot].get_or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }
    /// `cellular_frequencies[s][m]`: prevalence of the m-th mutation in the s-th sample.
    pub fn cellular_frequencies(&self, sample_num: usize) -> Vec<Vec<f64>> {
        (0..sample_num)
            .map(|s| {
                (0..self.mutation_num())
                    .map(|m| self.params_of(m)[s])
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn connected() {
        let partition = Partition::connected(4, vec![0.5]);
        assert_eq!(partition.cluster_num(), 1);
        assert_eq!(partition.labels(), vec![0; 4]);
        assert_eq!(partition.members(), vec![(0, vec![0, 1, 2, 3])]);
    }
    #[test]
    fn singleton_vanishes() {
        let mut partition = Partition::disconnected(vec![vec![0.1], vec![0.2], vec![0.3]]);
        assert_eq!(partition.cluster_num(), 3);
        partition.detach(1);
        assert_eq!(partition.cluster_num(), 2);
        assert!(partition.cluster(1).is_none());
        partition.attach(1, 2);
        assert_eq!(partition.cluster_num(), 2);
        assert_eq!(partition.cluster(2).unwrap().size(), 2);
        assert_eq!(partition.labels(), vec![0, 1, 1]);
        assert_eq!(partition.members(), vec![(0, vec![0]), (2, vec![1, 2])]);
    }
    #[test]
    fn slot_reuse() {
        let mut partition = Partition::disconnected(vec![vec![0.1], vec![0.2], vec![0.3]]);
        partition.detach(0);
        partition.attach(0, 2);
        partition.detach(1);
        let slot = partition.attach_new(1, vec![0.9]);
        assert_eq!(slot, 1);
        assert_eq!(partition.cluster_num(), 2);
        assert_eq!(partition.params_of(1), &[0.9]);
        partition.detach(2);
        let slot = partition.attach_new(2, vec![0.5]);
        assert_eq!(slot, 0);
        assert_eq!(partition.cluster_num(), 3);
        assert_eq!(partition.labels(), vec![0, 1, 2]);
    }
    #[test]
    fn frequencies() {
        let mut partition = Partition::disconnected(vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        partition.detach(1);
        partition.attach(1, 0);
        assert_eq!(
            partition.cellular_frequencies(2),
            vec![vec![0.1, 0.1], vec![0.2, 0.2]]
        );
    }
}
