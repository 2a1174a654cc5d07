/// State carried through a workflow run.
///
/// Each graph owns exactly one state value for the duration of a run. Nodes
/// never mutate it directly; they return a `Patch` that the executor applies.
/// Patches are additive: a `None` field leaves the current value untouched,
/// so a node only overwrites fields it owns.
pub trait WorkflowState: Send + 'static {
    type Patch: Send;

    /// Merge a patch into this state.
    fn apply(&mut self, patch: Self::Patch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        count: u32,
        label: Option<String>,
    }

    #[derive(Default)]
    struct CounterPatch {
        add: u32,
        label: Option<String>,
    }

    impl WorkflowState for Counter {
        type Patch = CounterPatch;

        fn apply(&mut self, patch: CounterPatch) {
            self.count += patch.add;
            if let Some(label) = patch.label {
                self.label = Some(label);
            }
        }
    }

    #[test]
    fn test_patch_is_additive() {
        let mut state = Counter::default();
        state.apply(CounterPatch {
            add: 2,
            label: Some("first".into()),
        });
        state.apply(CounterPatch { add: 1, label: None });

        assert_eq!(state.count, 3);
        // None leaves the previously set field alone
        assert_eq!(state.label.as_deref(), Some("first"));
    }
}
