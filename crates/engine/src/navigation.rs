use checklist_core::ids::ParameterId;
use checklist_core::schema::Zone;

/// Supplied by the enclosing screen sequence for the current zone tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabBounds {
    pub is_first_tab: bool,
    pub is_last_tab: bool,
}

impl TabBounds {
    pub fn for_zone(zone_index: usize, zone_count: usize) -> Self {
        Self {
            is_first_tab: zone_index == 0,
            is_last_tab: zone_index + 1 >= zone_count,
        }
    }
}

/// The screen sequence that hosts one tab per zone.
pub trait ScreenSequence: Send {
    fn bounds(&self, zone_index: usize, zone_count: usize) -> TabBounds {
        TabBounds::for_zone(zone_index, zone_count)
    }

    fn on_next_tab(&mut self, _from_zone: usize) {}

    fn on_previous_tab(&mut self, _from_zone: usize) {}

    fn on_reload(&mut self) {}
}

/// Sequence with default bounds and no callbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSequence;

impl ScreenSequence for StaticSequence {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Parameter(usize),
    NextTab,
    PreviousTab,
    /// First or last parameter of the first or last tab.
    Stay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub step: Step,
    /// The parameter being left was incomplete and the warning was shown.
    pub warned: bool,
}

/// Where to land when a zone is entered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ZoneEntry {
    #[default]
    First,
    Last,
    /// Deep link; falls back to the first parameter when the id is unknown.
    Parameter(ParameterId),
}

impl ZoneEntry {
    pub fn index_in(&self, zone: &Zone) -> usize {
        match self {
            Self::First => 0,
            Self::Last => zone.parameters().len().saturating_sub(1),
            Self::Parameter(id) => zone.position_of(id).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub zone_index: usize,
    pub parameter_index: usize,
}

impl NavigationState {
    pub fn next_step(&self, parameter_count: usize, bounds: TabBounds) -> Step {
        if self.parameter_index + 1 < parameter_count {
            Step::Parameter(self.parameter_index + 1)
        } else if !bounds.is_last_tab {
            Step::NextTab
        } else {
            Step::Stay
        }
    }

    pub fn previous_step(&self, bounds: TabBounds) -> Step {
        if self.parameter_index > 0 {
            Step::Parameter(self.parameter_index - 1)
        } else if !bounds.is_first_tab {
            Step::PreviousTab
        } else {
            Step::Stay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(zone_index: usize, parameter_index: usize) -> NavigationState {
        NavigationState {
            zone_index,
            parameter_index,
        }
    }

    #[test]
    fn next_walks_parameters_then_tabs() {
        let middle = TabBounds::for_zone(1, 3);
        assert_eq!(state(1, 0).next_step(2, middle), Step::Parameter(1));
        assert_eq!(state(1, 1).next_step(2, middle), Step::NextTab);
        assert_eq!(state(2, 1).next_step(2, TabBounds::for_zone(2, 3)), Step::Stay);
    }

    #[test]
    fn previous_is_symmetric() {
        assert_eq!(state(0, 1).previous_step(TabBounds::for_zone(0, 2)), Step::Parameter(0));
        assert_eq!(state(1, 0).previous_step(TabBounds::for_zone(1, 2)), Step::PreviousTab);
        assert_eq!(state(0, 0).previous_step(TabBounds::for_zone(0, 2)), Step::Stay);
    }

    #[test]
    fn static_sequence_uses_zone_position() {
        let sequence = StaticSequence;
        assert_eq!(sequence.bounds(0, 1), TabBounds { is_first_tab: true, is_last_tab: true });
        assert_eq!(sequence.bounds(1, 3), TabBounds::for_zone(1, 3));
        assert!(!sequence.bounds(1, 3).is_first_tab);
    }

    #[test]
    fn empty_zone_has_no_next_parameter() {
        assert_eq!(state(0, 0).next_step(0, TabBounds::for_zone(0, 1)), Step::Stay);
    }

    #[test]
    fn entry_resolves_target_parameter() {
        let zone: Zone = serde_json::from_value(json!({
            "id": 1,
            "param": [{"id": 10}, {"id": 11}, {"id": 12}]
        }))
        .unwrap();
        assert_eq!(ZoneEntry::First.index_in(&zone), 0);
        assert_eq!(ZoneEntry::Last.index_in(&zone), 2);
        assert_eq!(ZoneEntry::Parameter(ParameterId::from(11u64)).index_in(&zone), 1);
        assert_eq!(ZoneEntry::Parameter(ParameterId::from(99u64)).index_in(&zone), 0);
    }
}
