use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::ListAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeymapProfile {
    #[default]
    Default,
    Vim,
    Arrows,
}

#[derive(Clone, Copy, Debug)]
pub struct ListKeyBindings {
    profile: KeymapProfile,
}

impl Default for ListKeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl ListKeyBindings {
    pub const fn new() -> Self {
        Self {
            profile: KeymapProfile::Default,
        }
    }

    pub const fn with_profile(profile: KeymapProfile) -> Self {
        Self { profile }
    }

    pub const fn profile(&self) -> KeymapProfile {
        self.profile
    }

    pub const fn set_profile(&mut self, profile: KeymapProfile) {
        self.profile = profile;
    }

    pub fn resolve<C>(&self, key: KeyEvent) -> Option<ListAction<C>> {
        if key.modifiers.contains(KeyModifiers::SHIFT) {
            match key.code {
                KeyCode::Up => return Some(ListAction::MoveUp),
                KeyCode::Down => return Some(ListAction::MoveDown),
                _ => {}
            }
        }

        let nav_action = match self.profile {
            KeymapProfile::Default => Self::resolve_default_nav(key),
            KeymapProfile::Vim => Self::resolve_vim_nav(key),
            KeymapProfile::Arrows => Self::resolve_arrow_nav(key),
        };
        if nav_action.is_some() {
            return nav_action;
        }

        Self::resolve_common(key)
    }

    pub fn resolve_with<C, F>(&self, key: KeyEvent, custom: F) -> Option<ListAction<C>>
    where
        F: Fn(KeyEvent) -> Option<C>,
    {
        if let Some(action) = custom(key) {
            return Some(ListAction::Custom(action));
        }

        self.resolve(key)
    }

    const fn resolve_default_nav<C>(key: KeyEvent) -> Option<ListAction<C>> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(ListAction::SelectPrev),
            KeyCode::Down | KeyCode::Char('j') => Some(ListAction::SelectNext),
            KeyCode::Left | KeyCode::Char('h') => Some(ListAction::SelectParent),
            KeyCode::Right | KeyCode::Char('l') => Some(ListAction::ToggleExpansion),
            _ => None,
        }
    }

    const fn resolve_vim_nav<C>(key: KeyEvent) -> Option<ListAction<C>> {
        match key.code {
            KeyCode::Char('k') => Some(ListAction::SelectPrev),
            KeyCode::Char('j') => Some(ListAction::SelectNext),
            KeyCode::Char('h') => Some(ListAction::SelectParent),
            KeyCode::Char('l') => Some(ListAction::ToggleExpansion),
            _ => None,
        }
    }

    const fn resolve_arrow_nav<C>(key: KeyEvent) -> Option<ListAction<C>> {
        match key.code {
            KeyCode::Up => Some(ListAction::SelectPrev),
            KeyCode::Down => Some(ListAction::SelectNext),
            KeyCode::Left => Some(ListAction::SelectParent),
            KeyCode::Right => Some(ListAction::ToggleExpansion),
            _ => None,
        }
    }

    const fn resolve_common<C>(key: KeyEvent) -> Option<ListAction<C>> {
        match key.code {
            KeyCode::Char(' ') => Some(ListAction::ToggleSelection),
            KeyCode::Enter => Some(ListAction::ToggleExpansion),
            KeyCode::Char('a') => Some(ListAction::SelectAll),
            KeyCode::Esc => Some(ListAction::ClearSelection),
            KeyCode::Delete | KeyCode::Char('d') => Some(ListAction::Delete),
            KeyCode::Char('u') => Some(ListAction::Undo),
            KeyCode::Char('c') => Some(ListAction::Commit),
            KeyCode::Char('+') => Some(ListAction::ExpandAll),
            KeyCode::Char('-') => Some(ListAction::CollapseAll),
            KeyCode::Home => Some(ListAction::SelectFirst),
            KeyCode::End => Some(ListAction::SelectLast),
            _ => None,
        }
    }
}
