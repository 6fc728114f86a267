use std::collections::{HashMap, HashSet};

use crate::cascade::{self, CascadeResult};
use crate::component::{Component, ComponentId};
use crate::error::{BudgetError, BudgetResult};
use crate::spec::Direction;

/// Components plus the per-direction successor edges drawn between them.
/// Each component has at most one outgoing edge per direction, so a
/// drawn-up lineup reduces to an ordered chain by a plain walk.
#[derive(Clone, Debug, Default)]
pub struct Lineup {
    components: Vec<Component>,
    forward_edges: HashMap<ComponentId, ComponentId>,
    reverse_edges: HashMap<ComponentId, ComponentId>,
}

impl Lineup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component and return its handle.
    pub fn add(&mut self, component: Component) -> ComponentId {
        let id = component.id();
        self.components.push(component);
        id
    }

    /// Remove a component along with every edge touching it, in both
    /// directions. Returns the component if it was present.
    pub fn remove(&mut self, id: ComponentId) -> Option<Component> {
        let index = self.components.iter().position(|c| c.id() == id)?;
        let component = self.components.remove(index);
        for edges in [&mut self.forward_edges, &mut self.reverse_edges] {
            edges.remove(&id);
            edges.retain(|_, to| *to != id);
        }
        Some(component)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id() == id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id() == id)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn edges(&self, direction: Direction) -> &HashMap<ComponentId, ComponentId> {
        match direction {
            Direction::Forward => &self.forward_edges,
            Direction::Reverse => &self.reverse_edges,
        }
    }

    fn edges_mut(&mut self, direction: Direction) -> &mut HashMap<ComponentId, ComponentId> {
        match direction {
            Direction::Forward => &mut self.forward_edges,
            Direction::Reverse => &mut self.reverse_edges,
        }
    }

    /// Draw an edge `from -> to` for one direction, replacing any
    /// previous outgoing edge of `from`.
    pub fn connect(
        &mut self,
        direction: Direction,
        from: ComponentId,
        to: ComponentId,
    ) -> BudgetResult<()> {
        for id in [from, to] {
            if self.component(id).is_none() {
                return Err(BudgetError::UnknownComponent(id));
            }
        }
        self.edges_mut(direction).insert(from, to);
        Ok(())
    }

    pub fn disconnect(&mut self, direction: Direction, from: ComponentId) {
        self.edges_mut(direction).remove(&from);
    }

    pub fn successor(&self, direction: Direction, id: ComponentId) -> Option<ComponentId> {
        self.edges(direction).get(&id).copied()
    }

    pub fn predecessor(&self, direction: Direction, id: ComponentId) -> Option<ComponentId> {
        self.edges(direction)
            .iter()
            .find(|(_, to)| **to == id)
            .map(|(from, _)| *from)
    }

    /// Reduce the drawn edges of one direction to the ordered chain they
    /// describe: a single start, followed one successor at a time.
    ///
    /// Built once per calculation; the cascade engine itself never
    /// re-derives order.
    pub fn ordered_chain(&self, direction: Direction) -> BudgetResult<Vec<&Component>> {
        let edges = self.edges(direction);
        if edges.is_empty() {
            return Err(BudgetError::BrokenChain(format!(
                "no {direction} connections drawn"
            )));
        }

        let destinations: HashSet<ComponentId> = edges.values().copied().collect();
        let mut starts: Vec<ComponentId> = edges
            .keys()
            .filter(|from| !destinations.contains(*from))
            .copied()
            .collect();
        match starts.len() {
            0 => {
                return Err(BudgetError::BrokenChain(
                    "no start component; the connections form a loop".to_string(),
                ))
            }
            1 => {}
            n => {
                return Err(BudgetError::BrokenChain(format!(
                    "{n} start components; the chain must be a single path"
                )))
            }
        }

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = starts.pop();
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(BudgetError::BrokenChain(format!(
                    "component {id} is visited twice; the connections form a loop"
                )));
            }
            let component = self
                .component(id)
                .ok_or(BudgetError::UnknownComponent(id))?;
            chain.push(component);
            current = self.successor(direction, id);
        }
        Ok(chain)
    }

    /// Walk the drawn chain for one direction through the cascade engine.
    pub fn calculate(
        &self,
        frequency: &str,
        direction: Direction,
        input_power_dbm: f64,
    ) -> BudgetResult<CascadeResult> {
        let chain = self.ordered_chain(direction)?;
        cascade::calculate(&chain, frequency, direction, input_power_dbm)
    }
}
