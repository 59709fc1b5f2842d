use crate::BacklogError;
use crate::checklist::ChecklistRepository;
use crate::initiatives::InitiativeRepository;
use crate::tasks::TaskRepository;

pub trait Store {
    type Initiatives<'a>: InitiativeRepository
    where
        Self: 'a;
    type Tasks<'a>: TaskRepository
    where
        Self: 'a;
    type Checklist<'a>: ChecklistRepository
    where
        Self: 'a;

    fn initiatives(&self) -> Self::Initiatives<'_>;
    fn tasks(&self) -> Self::Tasks<'_>;
    fn checklist(&self) -> Self::Checklist<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, BacklogError>
    where
        F: FnOnce(&Self) -> Result<T, BacklogError>;
}
