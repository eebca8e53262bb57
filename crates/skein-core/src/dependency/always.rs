use super::{ALWAYS_RUN, Dependency, DependencyState, DependencyType, Scope};

/// Unconditional policy: ready until the owning job has completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysRun;

impl AlwaysRun {
    pub fn new() -> Self {
        Self
    }
}

impl Dependency for AlwaysRun {
    fn dependency_type(&self) -> DependencyType {
        DependencyType::new(ALWAYS_RUN)
    }

    fn state(&self, scope: &Scope<'_>) -> DependencyState {
        if scope.owner_completed() {
            DependencyState::Passed
        } else {
            DependencyState::Ready
        }
    }

    fn clone_box(&self) -> Box<dyn Dependency> {
        Box::new(*self)
    }
}
