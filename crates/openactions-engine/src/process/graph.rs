//! Immutable in-memory representation of one governance action process

use std::collections::HashMap;

use uuid::Uuid;

use openactions_contracts::{NextStepLink, ProcessDefinition, ProcessStep};

use crate::error::GovernanceError;
use crate::persistence::GovernanceStore;

/// The steps and links of one process, validated and loaded once
///
/// Steps live in an arena indexed by GUID; links are stored as per-step
/// adjacency lists in declaration order. The graph is immutable after
/// loading and is shared via `Arc` across concurrently executing actions.
#[derive(Debug)]
pub struct ProcessGraph {
    definition: ProcessDefinition,
    steps: Vec<ProcessStep>,
    step_index: HashMap<Uuid, usize>,
    outgoing: Vec<Vec<NextStepLink>>,
    entry: usize,
}

impl ProcessGraph {
    /// Load and validate the graph of one process from the store
    ///
    /// Fails with a configuration error if the process has no entry step,
    /// a link references a step outside the process, or the graph reachable
    /// from the entry step contains a cycle. Cycles are rejected here, at
    /// load time, so a bad definition can never start executing.
    pub async fn load(
        store: &dyn GovernanceStore,
        process_guid: Uuid,
    ) -> Result<Self, GovernanceError> {
        let definition = store.get_process_definition(process_guid).await?;
        let steps = store.get_process_steps(process_guid).await?;
        let links = store.get_next_step_links(process_guid).await?;

        Self::from_parts(definition, steps, links)
    }

    /// Build and validate a graph from already-fetched parts
    pub fn from_parts(
        definition: ProcessDefinition,
        steps: Vec<ProcessStep>,
        links: Vec<NextStepLink>,
    ) -> Result<Self, GovernanceError> {
        let first_step = definition.first_step.as_ref().ok_or_else(|| {
            GovernanceError::config(format!(
                "process {} has no first step",
                definition.qualified_name
            ))
        })?;

        let step_index: HashMap<Uuid, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.guid, i))
            .collect();

        let entry = *step_index.get(&first_step.step_guid).ok_or_else(|| {
            GovernanceError::config(format!(
                "first step {} of process {} is not one of its steps",
                first_step.step_guid, definition.qualified_name
            ))
        })?;

        let mut outgoing: Vec<Vec<NextStepLink>> = vec![Vec::new(); steps.len()];
        for link in links {
            let source = *step_index.get(&link.source_step_guid).ok_or_else(|| {
                GovernanceError::config(format!(
                    "link {} starts at unknown step {}",
                    link.guid, link.source_step_guid
                ))
            })?;
            if !step_index.contains_key(&link.target_step_guid) {
                return Err(GovernanceError::config(format!(
                    "link {} ends at unknown step {}",
                    link.guid, link.target_step_guid
                )));
            }
            outgoing[source].push(link);
        }

        let graph = Self {
            definition,
            steps,
            step_index,
            outgoing,
            entry,
        };
        graph.reject_cycles()?;
        Ok(graph)
    }

    /// The process definition this graph was loaded from
    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    /// The unique entry step
    pub fn entry_step(&self) -> &ProcessStep {
        &self.steps[self.entry]
    }

    /// Look up a step by GUID
    pub fn step(&self, step_guid: Uuid) -> Option<&ProcessStep> {
        self.step_index.get(&step_guid).map(|&i| &self.steps[i])
    }

    /// Outgoing links of a step, in declaration order
    ///
    /// Declaration order matters only for deterministic fallback selection;
    /// it never expresses priority between matching guarded links.
    pub fn outgoing_links(&self, step_guid: Uuid) -> &[NextStepLink] {
        self.step_index
            .get(&step_guid)
            .map(|&i| self.outgoing[i].as_slice())
            .unwrap_or(&[])
    }

    /// Number of steps in the process
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    // Iterative three-color depth-first search from the entry step.
    fn reject_cycles(&self) -> Result<(), GovernanceError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.steps.len()];
        // (step index, next outgoing link to examine)
        let mut stack: Vec<(usize, usize)> = vec![(self.entry, 0)];
        marks[self.entry] = Mark::OnPath;

        while let Some(&mut (node, ref mut edge)) = stack.last_mut() {
            if *edge < self.outgoing[node].len() {
                let link = &self.outgoing[node][*edge];
                *edge += 1;

                let target = self.step_index[&link.target_step_guid];
                match marks[target] {
                    Mark::OnPath => {
                        return Err(GovernanceError::config(format!(
                            "process {} contains a cycle through step {}",
                            self.definition.qualified_name, self.steps[target].qualified_name
                        )));
                    }
                    Mark::Unvisited => {
                        marks[target] = Mark::OnPath;
                        stack.push((target, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    use openactions_contracts::{FirstStepLink, ProcessStatus};

    fn step(name: &str) -> ProcessStep {
        ProcessStep {
            guid: Uuid::now_v7(),
            qualified_name: format!("gap:test:{name}"),
            display_name: name.to_string(),
            engine_name: "AssetSurvey".to_string(),
            request_type: "survey".to_string(),
            request_parameters: StdHashMap::new(),
            ignore_multiple_triggers: true,
            wait_time: None,
        }
    }

    fn link(source: &ProcessStep, target: &ProcessStep, guard: Option<&str>) -> NextStepLink {
        NextStepLink {
            guid: Uuid::now_v7(),
            source_step_guid: source.guid,
            target_step_guid: target.guid,
            guard: guard.map(str::to_string),
            mandatory_guard: guard.is_some(),
        }
    }

    fn definition(first_step: Option<Uuid>) -> ProcessDefinition {
        ProcessDefinition {
            guid: Uuid::now_v7(),
            qualified_name: "gap:test".to_string(),
            display_name: "Test process".to_string(),
            description: None,
            status: ProcessStatus::Active,
            first_step: first_step.map(|step_guid| FirstStepLink {
                step_guid,
                guard: None,
            }),
        }
    }

    #[test]
    fn test_linear_process_loads() {
        let (a, b, c) = (step("a"), step("b"), step("c"));
        let links = vec![link(&a, &b, Some("DONE")), link(&b, &c, None)];
        let graph = ProcessGraph::from_parts(
            definition(Some(a.guid)),
            vec![a.clone(), b.clone(), c],
            links,
        )
        .unwrap();

        assert_eq!(graph.step_count(), 3);
        assert_eq!(graph.entry_step().guid, a.guid);
        assert_eq!(graph.outgoing_links(a.guid).len(), 1);
        assert_eq!(graph.outgoing_links(b.guid).len(), 1);
    }

    #[test]
    fn test_no_entry_step_rejected() {
        let a = step("a");
        let result = ProcessGraph::from_parts(definition(None), vec![a], vec![]);
        assert!(matches!(result, Err(GovernanceError::Configuration(_))));
    }

    #[test]
    fn test_entry_step_outside_process_rejected() {
        let a = step("a");
        let result = ProcessGraph::from_parts(definition(Some(Uuid::now_v7())), vec![a], vec![]);
        assert!(matches!(result, Err(GovernanceError::Configuration(_))));
    }

    #[test]
    fn test_dangling_link_rejected() {
        let (a, orphan) = (step("a"), step("orphan"));
        let links = vec![link(&a, &orphan, None)];
        let result = ProcessGraph::from_parts(definition(Some(a.guid)), vec![a], links);
        assert!(matches!(result, Err(GovernanceError::Configuration(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        let (a, b, c) = (step("a"), step("b"), step("c"));
        let links = vec![
            link(&a, &b, None),
            link(&b, &c, None),
            link(&c, &a, None), // closes the loop
        ];
        let result =
            ProcessGraph::from_parts(definition(Some(a.guid)), vec![a, b, c], links);
        assert!(matches!(result, Err(GovernanceError::Configuration(_))));
    }

    #[test]
    fn test_self_loop_rejected() {
        let a = step("a");
        let links = vec![link(&a, &a, Some("AGAIN"))];
        let result = ProcessGraph::from_parts(definition(Some(a.guid)), vec![a], links);
        assert!(matches!(result, Err(GovernanceError::Configuration(_))));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let (a, b, c, d) = (step("a"), step("b"), step("c"), step("d"));
        let links = vec![
            link(&a, &b, Some("LEFT")),
            link(&a, &c, Some("RIGHT")),
            link(&b, &d, None),
            link(&c, &d, None),
        ];
        let graph =
            ProcessGraph::from_parts(definition(Some(a.guid)), vec![a, b, c, d], links).unwrap();
        assert_eq!(graph.step_count(), 4);
    }

    #[tokio::test]
    async fn test_load_from_store() {
        use crate::persistence::InMemoryGovernanceStore;

        let store = InMemoryGovernanceStore::new();
        let def = definition(None);
        let process_guid = def.guid;
        let (a, b) = (step("a"), step("b"));

        store.create_process_definition(def).await.unwrap();
        store
            .create_process_step(process_guid, a.clone())
            .await
            .unwrap();
        store
            .create_process_step(process_guid, b.clone())
            .await
            .unwrap();
        store
            .create_next_step_link(link(&a, &b, Some("DONE")))
            .await
            .unwrap();
        store
            .set_first_step(process_guid, a.guid, None)
            .await
            .unwrap();

        let graph = ProcessGraph::load(&store, process_guid).await.unwrap();
        assert_eq!(graph.entry_step().guid, a.guid);
        assert_eq!(graph.outgoing_links(a.guid).len(), 1);
    }
}
