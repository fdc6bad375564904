use crate::project::Project;
use crate::project::SyncSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectableItem {
    Project { project: usize },
    Spec { project: usize, spec: usize },
}

impl SelectableItem {
    pub fn project_index(self) -> usize {
        match self {
            Self::Project { project } | Self::Spec { project, .. } => project,
        }
    }
}

/// Flattened, foldable view over the project tree plus a raw cursor.
///
/// The cursor is clamped into range after every rebuild and pinned to 0 when
/// the list is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionManager {
    items: Vec<SelectableItem>,
    selected: usize,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild_from_projects(&mut self, projects: &[Project]) {
        self.items.clear();
        for (project_index, project) in projects.iter().enumerate() {
            self.items.push(SelectableItem::Project {
                project: project_index,
            });
            if !project.folded {
                self.items
                    .extend((0..project.specs.len()).map(|spec| SelectableItem::Spec {
                        project: project_index,
                        spec,
                    }));
            }
        }

        if self.items.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.items.len() {
            self.selected = self.items.len() - 1;
        }
    }

    pub fn select_next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.selected = (self.selected + 1) % self.items.len();
    }

    pub fn select_previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.selected = if self.selected == 0 {
            self.items.len() - 1
        } else {
            self.selected - 1
        };
    }

    pub fn set_index(&mut self, index: usize) {
        self.selected = index.min(self.items.len().saturating_sub(1));
    }

    /// Moves the cursor onto the header of `project`, if it is listed.
    pub fn select_project(&mut self, project: usize) {
        if let Some(position) = self
            .items
            .iter()
            .position(|item| *item == SelectableItem::Project { project })
        {
            self.selected = position;
        }
    }

    pub fn selected_item(&self) -> Option<SelectableItem> {
        self.items.get(self.selected).copied()
    }

    /// Owning project of the selection, whether a header or a spec is selected.
    pub fn selected_project_index(&self) -> Option<usize> {
        self.selected_item().map(SelectableItem::project_index)
    }

    pub fn selected_spec(&self) -> Option<(usize, usize)> {
        match self.selected_item()? {
            SelectableItem::Spec { project, spec } => Some((project, spec)),
            SelectableItem::Project { .. } => None,
        }
    }

    pub fn selected_spec_in<'a>(&self, projects: &'a [Project]) -> Option<&'a SyncSpec> {
        let (project, spec) = self.selected_spec()?;
        projects.get(project)?.specs.get(spec)
    }

    pub fn is_project_selected(&self) -> bool {
        matches!(self.selected_item(), Some(SelectableItem::Project { .. }))
    }

    pub fn is_spec_selected(&self) -> bool {
        matches!(self.selected_item(), Some(SelectableItem::Spec { .. }))
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn raw_index(&self) -> usize {
        self.selected
    }

    pub fn items(&self) -> &[SelectableItem] {
        &self.items
    }

    pub fn item_at(&self, index: usize) -> Option<SelectableItem> {
        self.items.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::project::ProjectFile;

    fn project(name: &str, specs: usize, folded: bool) -> Project {
        let mut text = String::from("sync:\n");
        for i in 0..specs {
            text.push_str(&format!("  s{i}:\n    alpha: /a\n    beta: /b\n"));
        }
        let path = format!("/work/{name}/mutagen.yml");
        let mut project =
            Project::new(ProjectFile::parse(Path::new(&path), &text).expect("parse"));
        project.folded = folded;
        project
    }

    fn manager(projects: &[Project]) -> SelectionManager {
        let mut selection = SelectionManager::new();
        selection.rebuild_from_projects(projects);
        selection
    }

    #[test]
    fn unfolded_projects_list_specs_in_order() {
        let projects = vec![project("a", 2, false), project("b", 3, true)];
        let selection = manager(&projects);
        assert_eq!(
            selection.items(),
            &[
                SelectableItem::Project { project: 0 },
                SelectableItem::Spec { project: 0, spec: 0 },
                SelectableItem::Spec { project: 0, spec: 1 },
                SelectableItem::Project { project: 1 },
            ]
        );
    }

    #[test]
    fn rebuild_clamps_index_to_last_item() {
        let mut projects = vec![project("a", 5, false)];
        let mut selection = manager(&projects);
        selection.set_index(5);
        assert_eq!(selection.raw_index(), 5);

        projects[0] = project("a", 2, false);
        selection.rebuild_from_projects(&projects);
        assert_eq!(selection.total_items(), 3);
        assert_eq!(selection.raw_index(), 2);
    }

    #[test]
    fn rebuild_preserves_index_in_range() {
        let projects = vec![project("a", 3, false)];
        let mut selection = manager(&projects);
        selection.set_index(2);
        selection.rebuild_from_projects(&projects);
        assert_eq!(selection.raw_index(), 2);
    }

    #[test]
    fn navigation_wraps_around() {
        let projects = vec![project("a", 3, false)];
        let mut selection = manager(&projects);
        selection.set_index(3);
        selection.select_next();
        assert_eq!(selection.raw_index(), 0);
        selection.select_previous();
        assert_eq!(selection.raw_index(), 3);
    }

    #[test]
    fn empty_list_reports_nothing_selected() {
        let mut selection = manager(&[]);
        selection.select_next();
        selection.select_previous();
        selection.set_index(7);
        assert_eq!(selection.raw_index(), 0);
        assert_eq!(selection.selected_item(), None);
        assert_eq!(selection.selected_project_index(), None);
        assert_eq!(selection.selected_spec(), None);
        assert!(!selection.is_project_selected());
        assert!(!selection.is_spec_selected());
    }

    #[test]
    fn spec_selection_reports_owning_project() {
        let projects = vec![project("a", 1, true), project("b", 2, false)];
        let mut selection = manager(&projects);
        selection.set_index(3);
        assert!(selection.is_spec_selected());
        assert_eq!(selection.selected_project_index(), Some(1));
        assert_eq!(selection.selected_spec(), Some((1, 1)));
        assert_eq!(
            selection.selected_spec_in(&projects).map(|s| s.name.as_str()),
            Some("s1")
        );
    }

    #[test]
    fn fold_changes_count_by_spec_count_only() {
        let mut projects = vec![
            project("a", 2, false),
            project("b", 4, true),
            project("c", 1, false),
        ];
        let before = manager(&projects);

        projects[1].toggle_fold();
        let after = manager(&projects);
        assert_eq!(after.total_items(), before.total_items() + 4);

        let others = |selection: &SelectionManager| -> Vec<SelectableItem> {
            selection
                .items()
                .iter()
                .copied()
                .filter(|item| item.project_index() != 1)
                .collect()
        };
        assert_eq!(others(&after), others(&before));
    }
}
